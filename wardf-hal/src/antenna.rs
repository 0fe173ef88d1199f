//! Antenna Backends and the Polling Wrapper
//!
//! ## Overview
//!
//! Every piece of receive hardware implements [`AntennaBackend`], a small
//! capability trait. Backends only talk to hardware: they return a raw
//! [`SignalReading`] or a [`BackendError`] and know nothing about timestamps,
//! retries or the engine.
//!
//! [`Antenna`] wraps one backend and adds the policy the engine relies on:
//!
//! ```text
//!            poll(timeout)
//!                 │
//!        ┌────────▼────────┐   elapsed     ┌─────────────┐
//!        │ read_signal()   ├──────────────▶│ Unavailable │
//!        └──┬──────┬───────┘               └─────────────┘
//!   reading │      │ Fault
//!           │      ▼
//!           │  sleep(backoff), read_signal() again
//!           │      │ Fault
//!           │      ▼
//!           │  mark Offline ──▶ Err(HardwareFault)
//!           ▼
//!   stamp (monotonic per antenna) ──▶ Reading(Measurement)
//! ```
//!
//! An offline antenna stays offline until [`Antenna::reprobe`] sees the
//! backend report something other than `Offline`, or until
//! [`Antenna::reset`] is called on reconfiguration.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use wardf_core::{AntennaId, Clock, Measurement, Protocol, SystemClock, Timestamp};

use crate::error::{BackendError, HalResult, HardwareFault};

/// Hardware family of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Wi-Fi adapter reporting per-interface signal statistics
    WifiAdapter,
    /// SDR front-end delivering raw IQ samples
    Sdr,
    /// Scripted or synthetic antenna
    Simulated,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::WifiAdapter => "wifi_adapter",
            BackendKind::Sdr => "sdr",
            BackendKind::Simulated => "simulated",
        })
    }
}

/// Health as reported by a backend, or cached by an [`Antenna`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Health {
    /// Reading normally
    Healthy,
    /// Usable but impaired
    Degraded(String),
    /// Not usable; excluded from estimation cycles
    Offline,
}

impl Health {
    /// Whether the antenna may take part in a cycle
    pub fn is_usable(&self) -> bool {
        !matches!(self, Health::Offline)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => f.write_str("healthy"),
            Health::Degraded(reason) => write!(f, "degraded ({})", reason),
            Health::Offline => f.write_str("offline"),
        }
    }
}

/// Raw reading from a backend, before timestamping
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    /// Received level (dBm)
    pub rssi_dbm: f64,
    /// Signal-to-noise ratio, when the hardware reports a noise level (dB)
    pub snr_db: Option<f64>,
    /// Carrier frequency (Hz)
    pub frequency_hz: f64,
    /// Radio family
    pub protocol: Protocol,
    /// Emitter the reading belongs to, if the hardware can tell
    pub target: Option<String>,
}

impl SignalReading {
    /// Reading without SNR or target
    pub fn new(rssi_dbm: f64, frequency_hz: f64, protocol: Protocol) -> Self {
        Self {
            rssi_dbm,
            snr_db: None,
            frequency_hz,
            protocol,
            target: None,
        }
    }

    /// Attach an SNR
    pub fn with_snr(mut self, snr_db: f64) -> Self {
        self.snr_db = Some(snr_db);
        self
    }

    /// Attach an emitter id
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Capability interface over receive hardware
///
/// Implementations use interior mutability so one backend can be shared
/// between a collector task and health checks.
#[async_trait]
pub trait AntennaBackend: Send + Sync {
    /// Hardware family
    fn kind(&self) -> BackendKind;

    /// Take one reading
    async fn read_signal(&self) -> Result<SignalReading, BackendError>;

    /// Whether the hardware can be calibrated against a reference emitter
    fn supports_calibration(&self) -> bool;

    /// Probe the hardware state
    async fn report_health(&self) -> Health;
}

/// Result of a successful poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Timestamped measurement
    Reading(Measurement),
    /// Nothing to read this time; not a fault
    Unavailable(String),
}

/// Retry policy of an [`Antenna`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Wait before the single retry after a fault (ms)
    pub retry_backoff_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 50,
        }
    }
}

/// Poll counters for one antenna
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    /// Polls attempted
    pub polls: u64,
    /// Measurements produced
    pub readings: u64,
    /// Polls that returned `Unavailable` (including timeouts)
    pub unavailable: u64,
    /// Polls that hit the timeout
    pub timeouts: u64,
    /// Backend faults seen, retried or not
    pub faults: u64,
    /// Times the antenna went offline
    pub offline_transitions: u64,
    /// Last fault message
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct AntennaState {
    policy: PollPolicy,
    health: Health,
    offline: bool,
    last_timestamp: Option<Timestamp>,
    stats: PollStats,
}

/// A backend plus timestamping, timeout, retry and offline bookkeeping
pub struct Antenna {
    id: AntennaId,
    backend: Box<dyn AntennaBackend>,
    clock: Arc<dyn Clock>,
    state: Mutex<AntennaState>,
}

impl fmt::Debug for Antenna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Antenna")
            .field("id", &self.id)
            .field("kind", &self.backend.kind())
            .field("policy", &self.policy())
            .finish()
    }
}

impl Antenna {
    /// Wrap `backend` under `id`, stamped by the system clock
    pub fn new(id: impl Into<AntennaId>, backend: impl AntennaBackend + 'static) -> Self {
        Self {
            id: id.into(),
            backend: Box::new(backend),
            clock: Arc::new(SystemClock),
            state: Mutex::new(AntennaState {
                policy: PollPolicy::default(),
                health: Health::Healthy,
                offline: false,
                last_timestamp: None,
                stats: PollStats::default(),
            }),
        }
    }

    /// Use another clock for timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use another retry policy
    pub fn with_policy(self, policy: PollPolicy) -> Self {
        self.set_policy(policy);
        self
    }

    /// Replace the retry policy of a shared antenna
    pub fn set_policy(&self, policy: PollPolicy) {
        self.state().policy = policy;
    }

    /// Current retry policy
    pub fn policy(&self) -> PollPolicy {
        self.state().policy
    }

    /// Antenna id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Backend family
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether the backend can be calibrated
    pub fn supports_calibration(&self) -> bool {
        self.backend.supports_calibration()
    }

    fn state(&self) -> MutexGuard<'_, AntennaState> {
        // A poisoned lock only means another poll panicked mid-update; the
        // counters are still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached health
    pub fn health(&self) -> Health {
        self.state().health.clone()
    }

    /// Marked offline after exhausting retries
    pub fn is_offline(&self) -> bool {
        self.state().offline
    }

    /// Poll counters
    pub fn stats(&self) -> PollStats {
        self.state().stats.clone()
    }

    /// Read one measurement, waiting at most `timeout`
    ///
    /// Timeouts and `Unavailable` backend results are returned as
    /// [`PollOutcome::Unavailable`]. A fault is retried once after the
    /// policy's backoff; a second fault marks the antenna offline.
    pub async fn poll(&self, timeout: Duration) -> HalResult<PollOutcome> {
        let backoff = {
            let mut state = self.state();
            if state.offline {
                return Err(HardwareFault::Offline(self.id.clone()));
            }
            state.stats.polls += 1;
            Duration::from_millis(state.policy.retry_backoff_ms)
        };

        let first = match self.attempt(timeout).await {
            Ok(outcome) => return Ok(outcome),
            Err(reason) => reason,
        };
        warn!("antenna {}: {}, retrying", self.id, first);
        tokio::time::sleep(backoff).await;

        match self.attempt(timeout).await {
            Ok(outcome) => Ok(outcome),
            Err(reason) => {
                self.mark_offline(&reason);
                Err(HardwareFault::RetriesExhausted {
                    antenna: self.id.clone(),
                    attempts: 2,
                    reason,
                })
            }
        }
    }

    /// One read; `Err` carries a fault message
    async fn attempt(&self, timeout: Duration) -> Result<PollOutcome, String> {
        match tokio::time::timeout(timeout, self.backend.read_signal()).await {
            Err(_) => {
                let mut state = self.state();
                state.stats.timeouts += 1;
                state.stats.unavailable += 1;
                debug!("antenna {}: poll timed out after {:?}", self.id, timeout);
                Ok(PollOutcome::Unavailable(format!("timed out after {:?}", timeout)))
            }
            Ok(Err(BackendError::Unavailable(reason))) => {
                self.state().stats.unavailable += 1;
                Ok(PollOutcome::Unavailable(reason))
            }
            Ok(Err(BackendError::Fault(reason))) => {
                let mut state = self.state();
                state.stats.faults += 1;
                state.stats.last_error = Some(reason.clone());
                Err(reason)
            }
            Ok(Ok(reading)) => Ok(PollOutcome::Reading(self.stamp(reading))),
        }
    }

    /// Turn a reading into a measurement with a strictly increasing timestamp
    fn stamp(&self, reading: SignalReading) -> Measurement {
        let now = self.clock.now();
        let mut state = self.state();
        let timestamp = match state.last_timestamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);
        state.stats.readings += 1;
        drop(state);

        let mut measurement = Measurement::new(self.id.clone(), timestamp, reading.rssi_dbm, reading.frequency_hz)
            .with_protocol(reading.protocol);
        if let Some(snr) = reading.snr_db {
            measurement = measurement.with_snr(snr);
        }
        if let Some(target) = reading.target {
            measurement = measurement.with_target(target);
        }
        measurement
    }

    fn mark_offline(&self, reason: &str) {
        let mut state = self.state();
        if !state.offline {
            state.offline = true;
            state.health = Health::Offline;
            state.stats.offline_transitions += 1;
            info!("antenna {} offline: {}", self.id, reason);
        }
    }

    /// Ask the backend for its health and cache it
    ///
    /// An antenna marked offline stays `Offline` here; use [`reprobe`](Self::reprobe)
    /// to bring it back.
    pub async fn refresh_health(&self) -> Health {
        if self.is_offline() {
            return Health::Offline;
        }
        let health = self.backend.report_health().await;
        let mut state = self.state();
        if state.health != health {
            debug!("antenna {} health: {} -> {}", self.id, state.health, health);
        }
        state.health = health.clone();
        health
    }

    /// Probe the backend; clear the offline mark if it answers
    ///
    /// Returns whether the antenna is usable afterwards.
    pub async fn reprobe(&self) -> bool {
        let health = self.backend.report_health().await;
        let mut state = self.state();
        if health.is_usable() {
            if state.offline {
                info!("antenna {} recovered: {}", self.id, health);
            }
            state.offline = false;
            state.health = health;
            true
        } else {
            state.health = Health::Offline;
            false
        }
    }

    /// Forget the offline mark and cached health (new configuration)
    pub fn reset(&self) {
        let mut state = self.state();
        state.offline = false;
        state.health = Health::Healthy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimOutcome, SimulatedBackend};
    use wardf_core::ManualClock;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn antenna(backend: SimulatedBackend) -> Antenna {
        Antenna::new("sim-0", backend).with_clock(Arc::new(ManualClock::new(1_000)))
    }

    #[tokio::test(start_paused = true)]
    async fn reading_is_stamped_and_monotonic() {
        let backend = SimulatedBackend::scripted([SimOutcome::Reading(-50.0), SimOutcome::Reading(-51.0)]);
        let antenna = antenna(backend);

        let PollOutcome::Reading(first) = antenna.poll(TIMEOUT).await.unwrap() else {
            panic!("expected reading");
        };
        let PollOutcome::Reading(second) = antenna.poll(TIMEOUT).await.unwrap() else {
            panic!("expected reading");
        };
        assert_eq!(first.antenna_id, "sim-0");
        assert_eq!(first.timestamp, 1_000);
        assert_eq!(second.timestamp, 1_001);
        assert_eq!(antenna.stats().readings, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_fault_is_retried() {
        let backend = SimulatedBackend::scripted([SimOutcome::Fault, SimOutcome::Reading(-60.0)]);
        let antenna = antenna(backend);

        assert!(matches!(antenna.poll(TIMEOUT).await, Ok(PollOutcome::Reading(_))));
        assert!(!antenna.is_offline());
        assert_eq!(antenna.stats().faults, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_faults_take_antenna_offline() {
        let backend = SimulatedBackend::scripted([SimOutcome::Fault, SimOutcome::Fault]);
        let antenna = antenna(backend.clone());

        let err = antenna.poll(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, HardwareFault::RetriesExhausted { attempts: 2, .. }));
        assert!(antenna.is_offline());
        assert_eq!(antenna.health(), Health::Offline);
        assert_eq!(antenna.poll(TIMEOUT).await, Err(HardwareFault::Offline("sim-0".into())));

        backend.set_health(Health::Healthy);
        assert!(antenna.reprobe().await);
        assert!(!antenna.is_offline());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_as_unavailable() {
        let backend = SimulatedBackend::scripted([SimOutcome::Reading(-50.0)])
            .with_latency(Duration::from_secs(5));
        let antenna = antenna(backend);

        assert!(matches!(antenna.poll(TIMEOUT).await, Ok(PollOutcome::Unavailable(_))));
        let stats = antenna.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.faults, 0);
    }

    #[tokio::test]
    async fn offline_backend_fails_reprobe() {
        let backend = SimulatedBackend::scripted([]);
        backend.set_health(Health::Offline);
        let antenna = antenna(backend);
        assert!(!antenna.reprobe().await);
        assert_eq!(antenna.health(), Health::Offline);
    }
}
