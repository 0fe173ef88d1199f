//! Simulated Antenna
//!
//! A null/test backend with two modes:
//!
//! - **Scripted**: replays a queue of [`SimOutcome`]s, then reports
//!   `Unavailable` once the queue is empty.
//! - **Emitter**: synthesizes RSSI for a transmitter at a settable position
//!   through a path-loss model, the way a real antenna at `position` would
//!   see it with no shadowing.
//!
//! The backend is a cheap handle: clones share state, so a test can keep one
//! clone to move the emitter, queue outcomes or flip health while the other
//! sits inside an [`Antenna`](crate::Antenna).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use wardf_core::algorithms::PathLossParams;
use wardf_core::{Point3, Protocol};

use crate::antenna::{AntennaBackend, BackendKind, Health, SignalReading};
use crate::error::BackendError;

/// Frequency used by simulated readings unless set otherwise (Hz)
pub const SIMULATED_FREQUENCY_HZ: f64 = 2.4e9;

/// One scripted backend result
#[derive(Debug, Clone, PartialEq)]
pub enum SimOutcome {
    /// Reading at this RSSI (dBm)
    Reading(f64),
    /// Hardware absent/busy
    Unavailable,
    /// Read error
    Fault,
}

#[derive(Debug, Clone)]
enum Mode {
    Scripted(VecDeque<SimOutcome>),
    Emitter {
        antenna: Point3,
        emitter: Point3,
        path_loss: PathLossParams,
    },
}

#[derive(Debug)]
struct SimState {
    mode: Mode,
    health: Health,
    present: bool,
    faulty: bool,
    reads: u64,
}

/// Scripted or synthetic antenna backend
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    frequency_hz: f64,
    protocol: Protocol,
    target: Option<String>,
    latency: Duration,
    calibratable: bool,
}

impl SimulatedBackend {
    fn with_mode(mode: Mode) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                mode,
                health: Health::Healthy,
                present: true,
                faulty: false,
                reads: 0,
            })),
            frequency_hz: SIMULATED_FREQUENCY_HZ,
            protocol: Protocol::Other,
            target: None,
            latency: Duration::ZERO,
            calibratable: true,
        }
    }

    /// Replay `outcomes` in order
    pub fn scripted(outcomes: impl IntoIterator<Item = SimOutcome>) -> Self {
        Self::with_mode(Mode::Scripted(outcomes.into_iter().collect()))
    }

    /// Antenna at `antenna` hearing an emitter at `emitter`
    pub fn emitter(antenna: Point3, emitter: Point3, path_loss: PathLossParams) -> Self {
        Self::with_mode(Mode::Emitter {
            antenna,
            emitter,
            path_loss,
        })
    }

    /// Carrier frequency of the readings
    pub fn with_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Protocol tag of the readings
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Emitter id attached to every reading
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Delay every read by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Whether calibration is accepted
    pub fn with_calibration_support(mut self, supported: bool) -> Self {
        self.calibratable = supported;
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append scripted outcomes (switches an emitter backend to scripted)
    pub fn push(&self, outcomes: impl IntoIterator<Item = SimOutcome>) {
        let mut state = self.state();
        match &mut state.mode {
            Mode::Scripted(queue) => queue.extend(outcomes),
            mode => *mode = Mode::Scripted(outcomes.into_iter().collect()),
        }
    }

    /// Move the emitter (no effect on a scripted backend)
    pub fn move_emitter(&self, position: Point3) {
        if let Mode::Emitter { emitter, .. } = &mut self.state().mode {
            *emitter = position;
        }
    }

    /// Health reported on the next probe
    pub fn set_health(&self, health: Health) {
        self.state().health = health;
    }

    /// Absent hardware reads as `Unavailable` and probes as `Offline`
    pub fn set_present(&self, present: bool) {
        self.state().present = present;
    }

    /// Every read faults while set
    pub fn set_faulty(&self, faulty: bool) {
        self.state().faulty = faulty;
    }

    /// Reads served so far
    pub fn reads(&self) -> u64 {
        self.state().reads
    }

    fn reading(&self, rssi_dbm: f64) -> SignalReading {
        let reading = SignalReading::new(rssi_dbm, self.frequency_hz, self.protocol);
        match &self.target {
            Some(target) => reading.with_target(target.clone()),
            None => reading,
        }
    }

    fn next(&self) -> Result<SignalReading, BackendError> {
        let mut state = self.state();
        state.reads += 1;
        if !state.present {
            return Err(BackendError::unavailable("simulated hardware absent"));
        }
        if state.faulty {
            return Err(BackendError::fault("simulated fault"));
        }
        match &mut state.mode {
            Mode::Scripted(queue) => match queue.pop_front() {
                Some(SimOutcome::Reading(rssi)) => Ok(self.reading(rssi)),
                Some(SimOutcome::Fault) => Err(BackendError::fault("scripted fault")),
                Some(SimOutcome::Unavailable) | None => Err(BackendError::unavailable("no scripted reading")),
            },
            Mode::Emitter {
                antenna,
                emitter,
                path_loss,
            } => {
                let rssi = path_loss
                    .distance_to_rssi(antenna.distance(emitter), self.frequency_hz)
                    .map_err(|e| BackendError::fault(e.to_string()))?;
                Ok(self.reading(rssi))
            }
        }
    }
}

#[async_trait]
impl AntennaBackend for SimulatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn read_signal(&self) -> Result<SignalReading, BackendError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next()
    }

    fn supports_calibration(&self) -> bool {
        self.calibratable
    }

    async fn report_health(&self) -> Health {
        let state = self.state();
        if state.present {
            state.health.clone()
        } else {
            Health::Offline
        }
    }
}
