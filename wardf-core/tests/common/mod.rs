//! Common test utilities for wardf-core integration tests
//!
//! This module provides:
//! - Standard antenna layouts
//! - Synthetic measurement generators (noise-free and seeded-noise)
//! - Assertion helpers for positions

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wardf_core::algorithms::path_loss::PathLossParams;
use wardf_core::{AntennaArray, AntennaDescriptor, Measurement, Point3, Timestamp};

/// 2.4 GHz Wi-Fi channel 1-ish
pub const WIFI_HZ: f64 = 2.4e9;

/// Three antennas at (0,0), (10,0), (5,10)
pub fn triangle_array() -> AntennaArray {
    AntennaArray::new(vec![
        AntennaDescriptor::at("ant-0", 0.0, 0.0, 0.0),
        AntennaDescriptor::at("ant-1", 10.0, 0.0, 0.0),
        AntennaDescriptor::at("ant-2", 5.0, 10.0, 0.0),
    ])
}

/// `n` antennas evenly spaced on a circle of `radius` around the origin
pub fn ring_array(n: usize, radius: f64) -> AntennaArray {
    let antennas = (0..n)
        .map(|i| {
            let theta = i as f64 * std::f64::consts::TAU / n as f64;
            AntennaDescriptor::at(format!("ring-{}", i), radius * theta.cos(), radius * theta.sin(), 0.0)
                .with_boresight(90.0 - theta.to_degrees())
        })
        .collect();
    AntennaArray::new(antennas)
}

/// Synthetic measurement generator
pub struct SignalGenerator {
    pub path_loss: PathLossParams,
    pub frequency_hz: f64,
    rng: StdRng,
}

impl SignalGenerator {
    /// Generator with a fixed seed
    pub fn new(path_loss: PathLossParams, seed: u64) -> Self {
        Self {
            path_loss,
            frequency_hz: WIFI_HZ,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One exact reading per antenna for an emitter at `target`
    pub fn exact(&self, array: &AntennaArray, target: Point3, timestamp: Timestamp) -> Vec<Measurement> {
        array
            .antennas
            .iter()
            .filter_map(|a| {
                let p = array.local_position(&a.id)?;
                let rssi = self
                    .path_loss
                    .distance_to_rssi(p.distance(&target), self.frequency_hz)
                    .ok()?;
                Some(Measurement::new(a.id.clone(), timestamp, rssi, self.frequency_hz))
            })
            .collect()
    }

    /// `samples` readings per antenna with uniform noise of ±`noise_db`
    pub fn noisy(
        &mut self,
        array: &AntennaArray,
        target: Point3,
        samples: usize,
        noise_db: f64,
    ) -> Vec<Measurement> {
        let mut out = Vec::new();
        for k in 0..samples {
            for m in self.exact(array, target, k as Timestamp) {
                let noise = self.rng.gen_range(-noise_db..=noise_db);
                out.push(m.with_rssi(m.rssi_dbm + noise));
            }
        }
        out
    }
}

/// Assert two points are within `tolerance` metres horizontally
pub fn assert_near(actual: Point3, expected: Point3, tolerance: f64) {
    let error = actual.distance_2d(&expected);
    assert!(
        error <= tolerance,
        "position ({:.3}, {:.3}) is {:.3} m from ({:.3}, {:.3}), tolerance {}",
        actual.x,
        actual.y,
        error,
        expected.x,
        expected.y,
        tolerance
    );
}
