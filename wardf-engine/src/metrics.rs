//! Engine counters

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cycle and throughput counters of one engine
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Windows closed
    pub cycles: u64,
    /// Successful estimates emitted
    pub estimates_emitted: u64,
    /// Windows that closed with too few antennas
    pub degraded_cycles: u64,
    /// Computations that failed
    pub failed_cycles: u64,
    /// Measurements added to a batch or calibration session
    pub measurements_accepted: u64,
    /// Measurements dropped (wrong state, closed window, full channel)
    pub measurements_dropped: u64,
    /// In-flight results thrown away (shutdown, calibration, error)
    pub discarded_results: u64,
    /// Algorithm runs timed
    pub computations: u64,
    /// Duration of the last computation (µs)
    pub last_compute_us: u64,
    /// Running mean computation duration (µs)
    pub avg_compute_us: f64,
}

impl EngineMetrics {
    /// Record one computation's duration
    pub fn record_compute(&mut self, elapsed: Duration) {
        let us = elapsed.as_micros() as u64;
        self.computations += 1;
        self.last_compute_us = us;
        self.avg_compute_us += (us as f64 - self.avg_compute_us) / self.computations as f64;
    }

    /// Fraction of closed windows that produced an estimate
    pub fn success_rate(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.estimates_emitted as f64 / self.cycles as f64
        }
    }
}
