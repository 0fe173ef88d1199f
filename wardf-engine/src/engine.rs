//! DF Core Engine
//!
//! ## Overview
//!
//! [`DfEngine`] is the synchronous heart of the runtime. It owns the engine
//! state, the open measurement batch, the calibration store and the smoother.
//! It never waits on anything: the runtime feeds it measurements and ticks,
//! runs the [`EstimationJob`]s it hands out, and passes the results back.
//!
//! ```text
//!  accept(m) ──▶ batch ──(window elapsed)──▶ close_window ──┬─▶ Emitted(insufficient, per target)
//!                                                           └─▶ Compute(one job per target)
//!                                                                   │
//!                                       finish(outcomes) ◀──────────┘
//!                                              │
//!                                              ▼
//!                                 smoothed Estimate per target
//! ```
//!
//! ## Targets
//!
//! A window can hold readings of several emitters. The closed batch is split
//! by [`Measurement::target`] and every emitter is judged and solved on its
//! own readings only; readings of different emitters are never averaged into
//! one fix. With a configured target filter only one group remains.
//!
//! ## Cycle boundaries
//!
//! The configuration is an `Arc` snapshot taken at a cycle boundary. A swap
//! that arrives while a job is in flight is parked and applied once the job's
//! result has been handled, so a computation never sees two configurations.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use log::{debug, info, warn};

use wardf_core::algorithms::{aggregate_by_antenna, EstimateSmoother};
use wardf_core::{
    AlgorithmError, CalibrationProfile, CalibrationSession, CalibrationStore, Estimate, Measurement,
    Timestamp,
};

use crate::config::DfConfiguration;
use crate::error::{EngineError, EngineResult};
use crate::job::{EstimationJob, JobOutcome};
use crate::metrics::EngineMetrics;
use crate::sinks::{LogTelemetry, TelemetrySink};
use crate::state::{EngineEvent, EngineState};

/// What a tick produced
#[derive(Debug, Clone)]
pub enum Cycle {
    /// Nothing to do
    Idle,
    /// Estimates to publish now, one per target seen in the window
    Emitted(Vec<Estimate>),
    /// Frozen per-target batches to compute
    Compute {
        /// One job per target with enough antennas
        jobs: Vec<EstimationJob>,
        /// Insufficient-data estimates of the other targets, to publish now
        emitted: Vec<Estimate>,
    },
}

/// State machine, batch and calibration owner
pub struct DfEngine {
    state: EngineState,
    config: Arc<DfConfiguration>,
    pending_config: Option<Arc<DfConfiguration>>,
    batch: Vec<Measurement>,
    window_opened_at: Timestamp,
    smoother: EstimateSmoother,
    calibration: CalibrationStore,
    session: Option<CalibrationSession>,
    metrics: EngineMetrics,
    telemetry: Arc<dyn TelemetrySink>,
}

impl DfEngine {
    /// Idle engine on `config`
    pub fn new(config: Arc<DfConfiguration>) -> Self {
        Self {
            state: EngineState::Idle,
            smoother: EstimateSmoother::new(config.algorithm.smoothing),
            config,
            pending_config: None,
            batch: Vec::new(),
            window_opened_at: 0,
            calibration: CalibrationStore::new(),
            session: None,
            metrics: EngineMetrics::default(),
            telemetry: Arc::new(LogTelemetry),
        }
    }

    /// Report transitions to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Configuration of the current cycle
    pub fn config(&self) -> &Arc<DfConfiguration> {
        &self.config
    }

    /// Counters
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Calibration profiles
    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Antenna being calibrated
    pub fn calibrating(&self) -> Option<&str> {
        self.session.as_ref().map(CalibrationSession::antenna_id)
    }

    /// Measurements in the open batch
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Seed the calibration store, typically from persistence at start-up
    pub fn load_profiles(&mut self, profiles: Vec<CalibrationProfile>) -> EngineResult<()> {
        let count = self.calibration.load(profiles)?;
        info!("loaded {} calibration profiles", count);
        Ok(())
    }

    fn transition(&mut self, event: EngineEvent) -> bool {
        match self.state.on(event) {
            Some(next) => {
                if next != self.state {
                    info!("{} -> {} on {:?}", self.state, next, event);
                    self.telemetry.engine_state_changed(self.state, next);
                    self.state = next;
                }
                true
            }
            None => false,
        }
    }

    fn open_window(&mut self, now: Timestamp) {
        let dropped = self.batch.len();
        if dropped > 0 {
            debug!("discarding {} measurements of the open window", dropped);
        }
        self.batch.clear();
        self.window_opened_at = now;
    }

    /// Idle → Scanning
    pub fn start(&mut self, now: Timestamp) -> EngineResult<()> {
        if !self.transition(EngineEvent::Start) {
            return Err(EngineError::InvalidState {
                action: "start scanning",
                state: self.state,
            });
        }
        self.open_window(now);
        Ok(())
    }

    /// Scanning, Estimating or Degraded → Idle
    ///
    /// A result still in flight is discarded when it arrives.
    pub fn stop(&mut self) -> EngineResult<()> {
        if !self.transition(EngineEvent::Stop) {
            return Err(EngineError::InvalidState {
                action: "stop scanning",
                state: self.state,
            });
        }
        self.batch.clear();
        Ok(())
    }

    /// Offer one measurement
    ///
    /// Returns whether it was kept. Outside `Scanning` and `Calibrating`
    /// measurements are dropped and counted.
    pub fn accept(&mut self, measurement: Measurement) -> bool {
        let kept = match self.state {
            EngineState::Scanning => {
                self.batch.push(measurement);
                true
            }
            EngineState::Calibrating => self
                .session
                .as_mut()
                .is_some_and(|session| session.record(&measurement)),
            _ => false,
        };
        if kept {
            self.metrics.measurements_accepted += 1;
        } else {
            self.metrics.measurements_dropped += 1;
        }
        kept
    }

    /// Count a measurement lost before reaching the engine
    pub fn record_dropped(&mut self, count: u64) {
        self.metrics.measurements_dropped += count;
    }

    /// Periodic tick
    ///
    /// `usable` says whether an antenna may contribute to this cycle.
    pub fn on_tick(&mut self, now: Timestamp, usable: impl Fn(&str) -> bool) -> Cycle {
        match self.state {
            EngineState::Degraded => {
                self.transition(EngineEvent::Tick);
                self.open_window(now);
                Cycle::Idle
            }
            EngineState::Scanning if now.saturating_sub(self.window_opened_at) >= self.config.window_ms => {
                self.close_window(now, usable)
            }
            _ => Cycle::Idle,
        }
    }

    fn close_window(&mut self, now: Timestamp, usable: impl Fn(&str) -> bool) -> Cycle {
        let config = Arc::clone(&self.config);
        let raw = mem::take(&mut self.batch);
        let raw_count = raw.len();
        self.metrics.cycles += 1;
        self.smoother.expire(now);

        let mut groups: BTreeMap<Option<String>, Vec<Measurement>> = BTreeMap::new();
        for m in raw
            .into_iter()
            .filter(|m| usable(m.antenna_id.as_str()))
            .filter(|m| config.target.is_none() || m.target == config.target)
        {
            let m = self.calibration.apply(&m);
            groups.entry(m.target.clone()).or_default().push(m);
        }
        if groups.is_empty() {
            groups.insert(config.target.clone(), Vec::new());
        }
        debug!(
            "window closed: {} measurements, {} target(s)",
            raw_count,
            groups.len()
        );

        let kind = &config.algorithm.kind;
        let required = config.algorithm.min_measurements;
        let mut jobs = Vec::new();
        let mut emitted = Vec::new();
        for (target, batch) in groups {
            let available = aggregate_by_antenna(&batch, &config.array)
                .iter()
                .filter(|observation| kind.uses(observation))
                .count();
            if available < required {
                warn!(
                    "insufficient data for {}: {} usable antennas, {} required",
                    target.as_deref().unwrap_or("untagged emitter"),
                    available,
                    required
                );
                emitted.push(
                    Estimate::insufficient_data(required, available, kind.name(), now)
                        .with_counts(batch.len(), available)
                        .with_target(target),
                );
                continue;
            }
            jobs.push(EstimationJob {
                batch,
                array: self.calibration.oriented_array(&config.array, now),
                algorithm: kind.clone(),
                fallback: config.fallback.clone(),
                target,
                timestamp: now,
            });
        }

        if jobs.is_empty() {
            self.metrics.degraded_cycles += 1;
            self.transition(EngineEvent::WindowClosed { sufficient: false });
            return Cycle::Emitted(emitted);
        }
        self.transition(EngineEvent::WindowClosed { sufficient: true });
        Cycle::Compute { jobs, emitted }
    }

    /// Hand back the results of the jobs from the last [`Cycle::Compute`]
    ///
    /// Returns the estimates to publish, one per job, or nothing when the
    /// engine left `Estimating` meanwhile and the results are stale. The
    /// window counts as a success when at least one target got a fix.
    pub fn finish(&mut self, outcomes: Vec<JobOutcome>, now: Timestamp) -> Vec<Estimate> {
        if self.state != EngineState::Estimating {
            debug!("discarding {} result(s), engine is {}", outcomes.len(), self.state);
            self.metrics.discarded_results += 1;
            self.apply_pending(now);
            return Vec::new();
        }

        let mut estimates = Vec::with_capacity(outcomes.len());
        let mut succeeded = false;
        for outcome in outcomes {
            self.metrics.record_compute(outcome.elapsed);
            match outcome.result {
                Ok(estimate) => {
                    self.metrics.estimates_emitted += 1;
                    succeeded = true;
                    estimates.push(self.smoother.apply(estimate));
                }
                Err(e) => {
                    warn!("{} failed: {}", outcome.algorithm, e);
                    let estimate = match e {
                        AlgorithmError::InsufficientMeasurements { required, available } => {
                            Estimate::insufficient_data(required, available, outcome.algorithm, now)
                        }
                        other => Estimate::failed(other.to_string(), outcome.algorithm, now),
                    };
                    estimates.push(estimate.with_target(outcome.target));
                }
            }
        }

        if succeeded {
            self.transition(EngineEvent::EstimateSucceeded);
            self.open_window(now);
        } else {
            self.metrics.failed_cycles += 1;
            self.transition(EngineEvent::EstimateFailed);
        }
        self.apply_pending(now);
        estimates
    }

    /// Take `config` at the next cycle boundary
    ///
    /// Returns `false` when a computation is in flight and the swap is parked
    /// until its result is handled.
    pub fn reconfigure(&mut self, config: Arc<DfConfiguration>, now: Timestamp) -> bool {
        if self.state == EngineState::Estimating {
            debug!("configuration swap deferred until the computation finishes");
            self.pending_config = Some(config);
            return false;
        }
        self.pending_config = None;
        self.install(config, now);
        true
    }

    fn apply_pending(&mut self, now: Timestamp) {
        if let Some(config) = self.pending_config.take() {
            self.install(config, now);
        }
    }

    fn install(&mut self, config: Arc<DfConfiguration>, now: Timestamp) {
        if config.algorithm.smoothing != *self.smoother.params() {
            self.smoother.set_params(config.algorithm.smoothing);
        }
        self.config = config;
        self.transition(EngineEvent::Reconfigured);
        match self.state {
            EngineState::Idle => self.batch.clear(),
            EngineState::Scanning | EngineState::Degraded => self.open_window(now),
            _ => {}
        }
        info!("engine now on {} configuration", self.config.algorithm.kind.name());
    }

    /// Every configured antenna is offline
    ///
    /// Drops the batch and any calibration session. Returns whether the
    /// engine was not already in `Error`.
    pub fn enter_error(&mut self) -> bool {
        let was = self.state;
        self.transition(EngineEvent::AllOffline);
        self.batch.clear();
        // a parked swap is adopted but does not count as the recovery
        if let Some(config) = self.pending_config.take() {
            self.smoother.set_params(config.algorithm.smoothing);
            self.config = config;
        }
        if self.session.take().is_some() {
            warn!("calibration aborted, no usable hardware");
        }
        was != EngineState::Error
    }

    /// Start collecting reference readings for `antenna_id`
    ///
    /// `supported` is whether the antenna's hardware can be calibrated.
    pub fn begin_calibration(
        &mut self,
        antenna_id: &str,
        expected_rssi_dbm: f64,
        supported: bool,
        now: Timestamp,
    ) -> EngineResult<()> {
        if matches!(self.state, EngineState::Error | EngineState::Calibrating) {
            return Err(EngineError::InvalidState {
                action: "begin calibration",
                state: self.state,
            });
        }
        if !self.config.array.contains(antenna_id) {
            return Err(EngineError::CalibrationRejected(format!(
                "antenna {} is not in the configured array",
                antenna_id
            )));
        }
        if !supported {
            return Err(EngineError::CalibrationRejected(format!(
                "antenna {} does not support calibration",
                antenna_id
            )));
        }
        if !expected_rssi_dbm.is_finite() {
            return Err(EngineError::CalibrationRejected(
                "reference level is not finite".to_string(),
            ));
        }

        self.transition(EngineEvent::CalibrationAccepted);
        self.batch.clear();
        self.session = Some(CalibrationSession::new(antenna_id, expected_rssi_dbm, now));
        info!(
            "calibrating {} against {:.1} dBm",
            antenna_id, expected_rssi_dbm
        );
        Ok(())
    }

    /// Derive and store the profile; Calibrating → Idle
    ///
    /// On error the session stays open so more readings can be collected.
    pub fn complete_calibration(&mut self, now: Timestamp) -> EngineResult<CalibrationProfile> {
        let session = match (&self.state, &self.session) {
            (EngineState::Calibrating, Some(session)) => session,
            _ => {
                return Err(EngineError::InvalidState {
                    action: "complete calibration",
                    state: self.state,
                })
            }
        };
        let previous = self.calibration.active(session.antenna_id(), now);
        let profile = session.finish(previous, now)?;
        self.calibration.insert(profile.clone())?;

        info!(
            "calibration of {} done: offset {:+.2} dB from {} samples",
            profile.antenna_id,
            profile.offset_db,
            session.sample_count()
        );
        self.session = None;
        self.transition(EngineEvent::CalibrationFinished);
        Ok(profile)
    }

    /// Discard the session; Calibrating → Idle
    pub fn abort_calibration(&mut self) -> EngineResult<()> {
        if self.state != EngineState::Calibrating {
            return Err(EngineError::InvalidState {
                action: "abort calibration",
                state: self.state,
            });
        }
        if let Some(session) = self.session.take() {
            info!(
                "calibration of {} aborted after {} samples",
                session.antenna_id(),
                session.sample_count()
            );
        }
        self.transition(EngineEvent::CalibrationFinished);
        Ok(())
    }
}

impl std::fmt::Debug for DfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfEngine")
            .field("state", &self.state)
            .field("batch", &self.batch.len())
            .field("calibrating", &self.calibrating())
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::run_jobs;
    use crate::sinks::RecordingTelemetry;
    use wardf_core::algorithms::PathLossParams;
    use wardf_core::{AntennaArray, AntennaDescriptor, EstimateKind, EstimateStatus, Point3};

    const FREQ: f64 = 2.4e9;

    fn array() -> AntennaArray {
        AntennaArray::new(vec![
            AntennaDescriptor::at("a", 0.0, 0.0, 0.0),
            AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
            AntennaDescriptor::at("c", 5.0, 10.0, 0.0),
        ])
    }

    fn engine() -> (DfEngine, Arc<RecordingTelemetry>) {
        let telemetry = Arc::new(RecordingTelemetry::new());
        let config = Arc::new(DfConfiguration::new(array()).with_window(1_000));
        let engine = DfEngine::new(config).with_telemetry(telemetry.clone());
        (engine, telemetry)
    }

    fn heard_from(id: &str, at: Point3, emitter: Point3, ts: Timestamp) -> Measurement {
        let rssi = PathLossParams::default()
            .distance_to_rssi(at.distance(&emitter), FREQ)
            .unwrap();
        Measurement::new(id, ts, rssi, FREQ)
    }

    fn reading(id: &str, at: Point3, ts: Timestamp) -> Measurement {
        heard_from(id, at, Point3::planar(5.0, 3.0), ts)
    }

    fn feed_all(engine: &mut DfEngine, ts: Timestamp) {
        engine.accept(reading("a", Point3::planar(0.0, 0.0), ts));
        engine.accept(reading("b", Point3::planar(10.0, 0.0), ts));
        engine.accept(reading("c", Point3::planar(5.0, 10.0), ts));
    }

    fn compute(cycle: Cycle) -> Vec<EstimationJob> {
        match cycle {
            Cycle::Compute { jobs, emitted } => {
                assert!(emitted.is_empty(), "{:?}", emitted);
                jobs
            }
            other => panic!("expected jobs, got {:?}", other),
        }
    }

    #[test]
    fn full_cycle_emits_position() {
        let (mut engine, telemetry) = engine();
        engine.start(0).unwrap();
        feed_all(&mut engine, 100);

        assert!(matches!(engine.on_tick(500, |_| true), Cycle::Idle));
        let jobs = compute(engine.on_tick(1_000, |_| true));
        assert_eq!(jobs.len(), 1);
        assert_eq!(engine.state(), EngineState::Estimating);

        let estimates = engine.finish(run_jobs(jobs), 1_001);
        assert_eq!(estimates.len(), 1);
        let position = estimates[0].position_value().unwrap();
        assert!((position.x - 5.0).abs() < 0.5 && (position.y - 3.0).abs() < 0.5);
        assert_eq!(engine.state(), EngineState::Scanning);
        assert_eq!(engine.metrics().estimates_emitted, 1);
        assert_eq!(
            telemetry.states(),
            vec![EngineState::Scanning, EngineState::Estimating, EngineState::Scanning]
        );
    }

    #[test]
    fn emitters_are_solved_separately() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        let first = Point3::planar(5.0, 3.0);
        let second = Point3::planar(2.0, 8.0);
        for (id, x, y) in [("a", 0.0, 0.0), ("b", 10.0, 0.0), ("c", 5.0, 10.0)] {
            let at = Point3::planar(x, y);
            engine.accept(heard_from(id, at, first, 10).with_target("aa"));
            engine.accept(heard_from(id, at, second, 11).with_target("bb"));
        }

        let jobs = compute(engine.on_tick(1_000, |_| true));
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|job| job.batch.len() == 3));

        let estimates = engine.finish(run_jobs(jobs), 1_001);
        assert_eq!(estimates.len(), 2);
        for (estimate, target, emitter) in [(&estimates[0], "aa", first), (&estimates[1], "bb", second)] {
            assert_eq!(estimate.target.as_deref(), Some(target));
            assert_eq!(estimate.status, EstimateStatus::Ok);
            assert_eq!(estimate.measurement_count, 3);
            let position = estimate.position_value().unwrap();
            assert!(
                position.distance_2d(&emitter) < 0.5,
                "{} at ({:.2}, {:.2})",
                target,
                position.x,
                position.y
            );
        }
        assert_eq!(engine.metrics().estimates_emitted, 2);
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn short_target_degrades_alone() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        for m in [
            reading("a", Point3::planar(0.0, 0.0), 10),
            reading("b", Point3::planar(10.0, 0.0), 10),
            reading("c", Point3::planar(5.0, 10.0), 10),
        ] {
            engine.accept(m.with_target("aa"));
        }
        engine.accept(reading("a", Point3::planar(0.0, 0.0), 11).with_target("bb"));

        let (jobs, emitted) = match engine.on_tick(1_000, |_| true) {
            Cycle::Compute { jobs, emitted } => (jobs, emitted),
            other => panic!("expected jobs, got {:?}", other),
        };
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].target.as_deref(), Some("aa"));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].target.as_deref(), Some("bb"));
        assert_eq!(
            emitted[0].kind,
            EstimateKind::InsufficientData { required: 3, available: 1 }
        );
        assert_eq!(engine.state(), EngineState::Estimating);
    }

    #[test]
    fn too_few_antennas_degrades_then_rescans() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        engine.accept(reading("a", Point3::planar(0.0, 0.0), 10));
        engine.accept(reading("b", Point3::planar(10.0, 0.0), 10));

        let estimates = match engine.on_tick(1_000, |_| true) {
            Cycle::Emitted(estimates) => estimates,
            other => panic!("expected an estimate, got {:?}", other),
        };
        assert_eq!(estimates.len(), 1);
        let estimate = &estimates[0];
        assert_eq!(estimate.status, EstimateStatus::Degraded);
        assert_eq!(estimate.confidence.as_float(), 0.0);
        assert_eq!(
            estimate.kind,
            EstimateKind::InsufficientData { required: 3, available: 2 }
        );
        assert_eq!(engine.state(), EngineState::Degraded);

        assert!(matches!(engine.on_tick(1_100, |_| true), Cycle::Idle));
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn empty_window_still_reports() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        match engine.on_tick(1_000, |_| true) {
            Cycle::Emitted(estimates) => {
                assert_eq!(estimates.len(), 1);
                assert_eq!(
                    estimates[0].kind,
                    EstimateKind::InsufficientData { required: 3, available: 0 }
                );
            }
            other => panic!("expected an estimate, got {:?}", other),
        }
        assert_eq!(engine.metrics().degraded_cycles, 1);
    }

    #[test]
    fn unusable_antennas_are_excluded() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        feed_all(&mut engine, 10);
        let cycle = engine.on_tick(1_000, |id| id != "c");
        assert!(matches!(cycle, Cycle::Emitted(_)));
        assert_eq!(engine.state(), EngineState::Degraded);
    }

    #[test]
    fn measurements_outside_scanning_are_dropped() {
        let (mut engine, _) = engine();
        assert!(!engine.accept(reading("a", Point3::default(), 1)));
        engine.start(0).unwrap();
        feed_all(&mut engine, 10);
        let _ = engine.on_tick(1_000, |_| true);
        assert!(!engine.accept(reading("a", Point3::default(), 1_001)));
        assert_eq!(engine.metrics().measurements_accepted, 3);
        assert_eq!(engine.metrics().measurements_dropped, 2);
    }

    #[test]
    fn swap_during_estimation_waits_for_the_result() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        feed_all(&mut engine, 10);
        let jobs = compute(engine.on_tick(1_000, |_| true));

        let wider = Arc::new(DfConfiguration::new(array()).with_window(4_000));
        assert!(!engine.reconfigure(Arc::clone(&wider), 1_000));
        assert_eq!(engine.config().window_ms, 1_000);

        assert_eq!(engine.finish(run_jobs(jobs), 1_010).len(), 1);
        assert_eq!(engine.config().window_ms, 4_000);
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn swap_while_scanning_restarts_the_window_silently() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        feed_all(&mut engine, 10);
        assert!(engine.reconfigure(Arc::new(DfConfiguration::new(array()).with_window(1_000)), 600));
        assert_eq!(engine.batch_len(), 0);
        assert!(matches!(engine.on_tick(1_000, |_| true), Cycle::Idle));
        assert_eq!(engine.state(), EngineState::Scanning);
    }

    #[test]
    fn error_needs_reconfiguration() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        assert!(engine.enter_error());
        assert!(!engine.enter_error());
        assert!(engine.start(10).is_err());
        assert!(engine.begin_calibration("a", -40.0, true, 10).is_err());

        engine.reconfigure(Arc::clone(engine.config()), 20);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn calibration_round_trip() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        assert!(matches!(
            engine.begin_calibration("zz", -40.0, true, 5),
            Err(EngineError::CalibrationRejected(_))
        ));
        assert!(matches!(
            engine.begin_calibration("a", -40.0, false, 5),
            Err(EngineError::CalibrationRejected(_))
        ));

        engine.begin_calibration("a", -40.0, true, 5).unwrap();
        assert_eq!(engine.state(), EngineState::Calibrating);
        assert!(engine.begin_calibration("b", -40.0, true, 6).is_err());

        engine.accept(Measurement::new("a", 10, -44.0, FREQ));
        assert!(matches!(
            engine.complete_calibration(11),
            Err(EngineError::Calibration(_))
        ));
        assert_eq!(engine.state(), EngineState::Calibrating);

        engine.accept(Measurement::new("b", 12, -10.0, FREQ));
        engine.accept(Measurement::new("a", 13, -46.0, FREQ));
        engine.accept(Measurement::new("a", 14, -45.0, FREQ));
        let profile = engine.complete_calibration(20).unwrap();
        assert!((profile.offset_db - 5.0).abs() < 1e-9);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.calibration().active("a", 20).unwrap().offset_db, profile.offset_db);
    }

    #[test]
    fn calibration_discards_in_flight_result() {
        let (mut engine, _) = engine();
        engine.start(0).unwrap();
        feed_all(&mut engine, 10);
        let jobs = compute(engine.on_tick(1_000, |_| true));
        engine.begin_calibration("a", -40.0, true, 1_001).unwrap();
        assert!(engine.finish(run_jobs(jobs), 1_002).is_empty());
        assert_eq!(engine.metrics().discarded_results, 1);

        engine.abort_calibration().unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.abort_calibration().is_err());
    }
}
