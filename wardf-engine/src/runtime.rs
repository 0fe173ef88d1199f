//! Engine runtime: one cycle task, one collector task per antenna
//!
//! ## Overview
//!
//! ```text
//!   collector(ant-0) ─┐
//!   collector(ant-1) ─┼─ try_send ─▶ bounded mpsc ─┐
//!   DfIntegration ────┘   (full: drop + count)     │
//!                                                  ▼
//!   EngineHandle ── commands (mpsc + oneshot) ──▶ cycle task ──▶ broadcast ──▶ EstimateStream
//!   ConfigHandle ── Notify ──────────────────────▶   │  ▲
//!                                                    │  │ Vec<JobOutcome>
//!                                                    ▼  │
//!                                          spawn_blocking(run_jobs)
//! ```
//!
//! The cycle task owns the [`DfEngine`]. It wakes on commands, on the result
//! of the single in-flight computation, on a configuration swap, on incoming
//! measurements and on its tick. Collectors only run while the engine is
//! scanning or calibrating and are restarted whenever the configuration the
//! engine runs on changes.
//!
//! Shutdown aborts every collector and the in-flight computation; no partial
//! estimate is published.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use wardf_core::{
    AlgorithmError, AntennaId, CalibrationProfile, Clock, Estimate, Measurement, SystemClock, Timestamp,
};
use wardf_hal::{Antenna, HardwareFault, HardwareRegistry, Health, PollOutcome, PollPolicy};

use crate::config::{CollectorConfig, DfConfiguration};
use crate::engine::{Cycle, DfEngine};
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::handle::ConfigHandle;
use crate::job::{run_jobs, JobOutcome};
use crate::metrics::EngineMetrics;
use crate::sinks::{LogTelemetry, PersistenceSink, TelemetrySink};
use crate::state::EngineState;
use crate::stream::EstimateStream;

/// Default capacity of the estimate broadcast channel
pub const DEFAULT_ESTIMATE_CAPACITY: usize = 64;

const COMMAND_CAPACITY: usize = 16;

/// Wall-clock anchored clock that advances with the tokio timer
///
/// Under a paused test runtime it follows `tokio::time::advance`, so windows,
/// timestamps and calibration validity stay consistent.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    base: Timestamp,
    started: Instant,
}

impl RuntimeClock {
    /// Anchored at the current system time
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now())
    }

    /// Anchored at `base`
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> Timestamp {
        self.base + self.started.elapsed().as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Snapshot returned by [`EngineHandle::status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Current state
    pub state: EngineState,
    /// Counters
    pub metrics: EngineMetrics,
    /// Configuration generation the engine runs on
    pub generation: u64,
    /// Cached health of every registered antenna
    pub health: BTreeMap<AntennaId, Health>,
    /// Antenna being calibrated
    pub calibrating: Option<AntennaId>,
    /// Measurements in the open window
    pub batch_len: usize,
}

enum Command {
    Start(oneshot::Sender<EngineResult<()>>),
    Stop(oneshot::Sender<EngineResult<()>>),
    BeginCalibration {
        antenna: AntennaId,
        expected_rssi_dbm: f64,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    CompleteCalibration(oneshot::Sender<EngineResult<CalibrationProfile>>),
    AbortCalibration(oneshot::Sender<EngineResult<()>>),
    Status(oneshot::Sender<EngineStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Configures and spawns the runtime
pub struct EngineBuilder {
    config: Arc<ConfigHandle>,
    registry: HardwareRegistry,
    persistence: Option<Arc<dyn PersistenceSink>>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    estimate_capacity: usize,
}

impl EngineBuilder {
    /// Engine on `config`, polling the antennas in `registry`
    ///
    /// Every antenna of `config`, and of every later candidate, must resolve
    /// in `registry`. An empty registry makes an ingest-only engine fed through
    /// [`DfIntegration`](crate::DfIntegration); see [`ingest_only`](Self::ingest_only).
    pub fn new(config: DfConfiguration, registry: HardwareRegistry) -> Result<Self, ConfigError> {
        let handle = if registry.is_empty() {
            ConfigHandle::new(config)?
        } else {
            ConfigHandle::with_registry(config, registry.clone())?
        };
        Ok(Self {
            config: Arc::new(handle),
            registry,
            persistence: None,
            telemetry: Arc::new(LogTelemetry),
            clock: Arc::new(RuntimeClock::new()),
            estimate_capacity: DEFAULT_ESTIMATE_CAPACITY,
        })
    }

    /// Engine without hardware; every measurement arrives through ingestion
    pub fn ingest_only(config: DfConfiguration) -> Result<Self, ConfigError> {
        Self::new(config, HardwareRegistry::new())
    }

    /// Persist profiles and estimates, and load profiles at start
    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Report state and health transitions
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Clock for windows and calibration validity
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capacity of the estimate broadcast channel
    pub fn with_estimate_capacity(mut self, capacity: usize) -> Self {
        self.estimate_capacity = capacity.max(1);
        self
    }

    /// Spawn the cycle task on the current tokio runtime
    pub fn spawn(self) -> EngineHandle {
        let (task, handle, commands, measurements) = self.build();
        tokio::spawn(task.run(commands, measurements));
        handle
    }

    fn build(self) -> (CycleTask, EngineHandle, mpsc::Receiver<Command>, mpsc::Receiver<Measurement>) {
        let active = self.config.get();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (measurement_tx, measurement_rx) = mpsc::channel(active.collector.channel_capacity);
        let (estimate_tx, _) = broadcast::channel(self.estimate_capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        let mut engine = DfEngine::new(Arc::clone(&active)).with_telemetry(Arc::clone(&self.telemetry));
        if let Some(persistence) = &self.persistence {
            match persistence.load_profiles() {
                Ok(profiles) => {
                    if let Err(e) = engine.load_profiles(profiles) {
                        warn!("stored calibration profiles rejected: {}", e);
                    }
                }
                Err(e) => warn!("could not load calibration profiles: {}", e),
            }
        }

        let task = CycleTask {
            ticker: ticker(active.tick_interval_ms),
            tick_ms: active.tick_interval_ms,
            engine,
            config: Arc::clone(&self.config),
            registry: self.registry,
            clock: self.clock,
            persistence: self.persistence,
            telemetry: self.telemetry,
            estimates: estimate_tx.clone(),
            measurement_tx: measurement_tx.clone(),
            dropped: Arc::clone(&dropped),
            collectors: Vec::new(),
            collectors_for: None,
            in_flight: None,
            health: BTreeMap::new(),
        };
        info!(
            "engine started with {} on {} antennas",
            active.algorithm.kind.name(),
            active.array.len()
        );

        let handle = EngineHandle {
            commands: command_tx,
            measurements: measurement_tx,
            estimates: estimate_tx,
            config: self.config,
            dropped,
        };
        (task, handle, command_rx, measurement_rx)
    }
}

/// Cloneable control surface of a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    measurements: mpsc::Sender<Measurement>,
    estimates: broadcast::Sender<Estimate>,
    config: Arc<ConfigHandle>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("running", &!self.commands.is_closed())
            .field("generation", &self.config.generation())
            .finish()
    }
}

impl EngineHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> EngineResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::NotRunning)?;
        response.await.map_err(|_| EngineError::NotRunning)
    }

    /// Idle → Scanning
    pub async fn start(&self) -> EngineResult<()> {
        self.request(Command::Start).await?
    }

    /// Back to Idle
    pub async fn stop(&self) -> EngineResult<()> {
        self.request(Command::Stop).await?
    }

    /// Calibrate `antenna` against a reference emitter expected at `expected_rssi_dbm`
    pub async fn begin_calibration(&self, antenna: impl Into<AntennaId>, expected_rssi_dbm: f64) -> EngineResult<()> {
        let antenna = antenna.into();
        self.request(|reply| Command::BeginCalibration {
            antenna,
            expected_rssi_dbm,
            reply,
        })
        .await?
    }

    /// Derive, store and persist the profile of the running calibration
    pub async fn complete_calibration(&self) -> EngineResult<CalibrationProfile> {
        self.request(Command::CompleteCalibration).await?
    }

    /// Discard the running calibration
    pub async fn abort_calibration(&self) -> EngineResult<()> {
        self.request(Command::AbortCalibration).await?
    }

    /// Engine snapshot
    pub async fn status(&self) -> EngineResult<EngineStatus> {
        self.request(Command::Status).await
    }

    /// Stop every task; returns once they are gone
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.request(Command::Shutdown).await
    }

    /// Offer a measurement without waiting
    ///
    /// A full channel drops the measurement and counts it.
    pub fn submit(&self, measurement: Measurement) -> EngineResult<()> {
        match self.measurements.try_send(measurement) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(m)) => {
                trace!("channel full, dropping measurement of {}", m.antenna_id);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(EngineError::NotRunning),
        }
    }

    /// New subscription to the estimates published from now on
    pub fn subscribe(&self) -> EstimateStream {
        EstimateStream::new(self.estimates.subscribe())
    }

    /// Configuration handle
    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    /// Validate and swap the configuration
    pub fn set_configuration(&self, candidate: DfConfiguration) -> Result<(), ConfigError> {
        self.config.apply(candidate)
    }

    /// Whether the cycle task is still running
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

fn ticker(ms: u64) -> Interval {
    let mut ticker = time::interval(Duration::from_millis(ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<Vec<JobOutcome>>>,
) -> Result<Vec<JobOutcome>, JoinError> {
    match in_flight.as_mut() {
        Some(handle) => {
            let joined = handle.await;
            *in_flight = None;
            joined
        }
        None => std::future::pending().await,
    }
}

struct CycleTask {
    engine: DfEngine,
    config: Arc<ConfigHandle>,
    registry: HardwareRegistry,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<dyn PersistenceSink>>,
    telemetry: Arc<dyn TelemetrySink>,
    estimates: broadcast::Sender<Estimate>,
    measurement_tx: mpsc::Sender<Measurement>,
    dropped: Arc<AtomicU64>,
    ticker: Interval,
    tick_ms: u64,
    collectors: Vec<JoinHandle<()>>,
    collectors_for: Option<Arc<DfConfiguration>>,
    in_flight: Option<JoinHandle<Vec<JobOutcome>>>,
    health: BTreeMap<AntennaId, Health>,
}

impl CycleTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut measurements: mpsc::Receiver<Measurement>) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle(command) {
                                return;
                            }
                        }
                        None => {
                            self.shutdown();
                            return;
                        }
                    }
                }

                joined = join_in_flight(&mut self.in_flight) => self.on_outcome(joined),

                _ = self.config.changed() => self.on_config_swap().await,

                _ = self.ticker.tick() => self.on_tick(),

                Some(measurement) = measurements.recv() => {
                    self.engine.accept(measurement);
                }
            }
            self.sync_tasks();
        }
    }

    /// Returns `true` on shutdown
    fn handle(&mut self, command: Command) -> bool {
        let now = self.clock.now();
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.engine.start(now));
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.engine.stop());
            }
            Command::BeginCalibration {
                antenna,
                expected_rssi_dbm,
                reply,
            } => {
                let supported = self
                    .registry
                    .get(&antenna)
                    .is_some_and(|a| a.supports_calibration());
                let _ = reply.send(
                    self.engine
                        .begin_calibration(&antenna, expected_rssi_dbm, supported, now),
                );
            }
            Command::CompleteCalibration(reply) => {
                let result = self.engine.complete_calibration(now);
                if let (Ok(profile), Some(persistence)) = (&result, &self.persistence) {
                    if let Err(e) = persistence.save_profile(profile) {
                        warn!("could not persist profile of {}: {}", profile.antenna_id, e);
                    }
                }
                let _ = reply.send(result);
            }
            Command::AbortCalibration(reply) => {
                let _ = reply.send(self.engine.abort_calibration());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown(reply) => {
                self.shutdown();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.engine.state(),
            metrics: self.engine.metrics().clone(),
            generation: self.config.generation(),
            health: self.registry.health_report(),
            calibrating: self.engine.calibrating().map(str::to_string),
            batch_len: self.engine.batch_len(),
        }
    }

    fn on_outcome(&mut self, joined: Result<Vec<JobOutcome>, JoinError>) {
        let outcomes = match joined {
            Ok(outcomes) => outcomes,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                warn!("estimation task failed: {}", e);
                vec![JobOutcome {
                    result: Err(AlgorithmError::NumericalFailure {
                        reason: "estimation task panicked",
                    }),
                    algorithm: self.engine.config().algorithm.kind.name(),
                    target: self.engine.config().target.clone(),
                    elapsed: Duration::ZERO,
                }]
            }
        };
        for estimate in self.engine.finish(outcomes, self.clock.now()) {
            self.publish(estimate);
        }
    }

    async fn on_config_swap(&mut self) {
        let config = self.config.get();
        // offline marks only last for the lifetime of one configuration
        self.registry.reset_offline();
        for id in config.array.ids() {
            if let Some(antenna) = self.registry.get(id) {
                antenna.refresh_health().await;
            }
        }
        self.report_health();
        self.engine.reconfigure(config, self.clock.now());
    }

    fn on_tick(&mut self) {
        let now = self.clock.now();
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("{} measurements dropped on a full channel", dropped);
            self.engine.record_dropped(dropped);
        }
        self.report_health();

        let config = Arc::clone(self.engine.config());
        if self.engine.state() != EngineState::Error && self.all_offline(&config) {
            warn!("every configured antenna is offline");
            self.engine.enter_error();
            return;
        }

        let registry = &self.registry;
        let cycle = self.engine.on_tick(now, |id| !registry.is_down(id));
        match cycle {
            Cycle::Idle => {}
            Cycle::Emitted(estimates) => {
                for estimate in estimates {
                    self.publish(estimate);
                }
            }
            Cycle::Compute { jobs, emitted } => {
                for estimate in emitted {
                    self.publish(estimate);
                }
                self.in_flight = Some(tokio::task::spawn_blocking(move || run_jobs(jobs)));
            }
        }
    }

    /// Every antenna of `config` is registered and down
    ///
    /// Antennas fed only through the integration layer have no hardware to
    /// fail and keep the engine out of `Error`.
    fn all_offline(&self, config: &DfConfiguration) -> bool {
        config.array.ids().all(|id| self.registry.contains(id)) && self.registry.all_offline(config.array.ids())
    }

    fn report_health(&mut self) {
        for (id, health) in self.registry.health_report() {
            if self.health.get(&id) != Some(&health) {
                self.telemetry.antenna_health_changed(&id, &health);
                self.health.insert(id, health);
            }
        }
    }

    fn publish(&mut self, estimate: Estimate) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_estimate(&estimate) {
                warn!("could not persist estimate: {}", e);
            }
        }
        debug!(
            "publishing {} estimate, confidence {:.2}",
            estimate.algorithm,
            estimate.confidence.as_float()
        );
        // no subscribers is fine
        let _ = self.estimates.send(estimate);
    }

    /// Match collectors and ticker to the engine's state and configuration
    fn sync_tasks(&mut self) {
        let config = Arc::clone(self.engine.config());
        if config.tick_interval_ms != self.tick_ms {
            self.tick_ms = config.tick_interval_ms;
            self.ticker = ticker(self.tick_ms);
        }

        let wanted = matches!(
            self.engine.state(),
            EngineState::Scanning | EngineState::Estimating | EngineState::Degraded | EngineState::Calibrating
        );
        if !wanted {
            self.stop_collectors();
            return;
        }
        let current = self
            .collectors_for
            .as_ref()
            .is_some_and(|running| Arc::ptr_eq(running, &config));
        if !current {
            self.stop_collectors();
            self.spawn_collectors(config);
        }
    }

    fn spawn_collectors(&mut self, config: Arc<DfConfiguration>) {
        let policy = PollPolicy {
            retry_backoff_ms: config.collector.retry_backoff_ms,
        };
        for id in config.array.ids() {
            let Some(antenna) = self.registry.get(id) else {
                trace!("antenna {} has no registered hardware", id);
                continue;
            };
            antenna.set_policy(policy);
            self.collectors.push(tokio::spawn(collect(
                antenna,
                config.collector.clone(),
                self.measurement_tx.clone(),
                Arc::clone(&self.dropped),
            )));
        }
        debug!("{} collectors running", self.collectors.len());
        self.collectors_for = Some(config);
    }

    fn stop_collectors(&mut self) {
        if self.collectors_for.take().is_some() {
            debug!("stopping {} collectors", self.collectors.len());
        }
        for collector in self.collectors.drain(..) {
            collector.abort();
        }
    }

    fn shutdown(&mut self) {
        self.stop_collectors();
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort();
            debug!("in-flight computation abandoned");
        }
        info!("engine shut down in {}", self.engine.state());
    }
}

/// Poll one antenna until aborted
///
/// Health is refreshed when the collector starts. From then on an offline
/// antenna is re-probed once per `reprobe_interval_ms`; a healthy one has its
/// health refreshed at the same rate.
async fn collect(
    antenna: Arc<Antenna>,
    settings: CollectorConfig,
    sink: mpsc::Sender<Measurement>,
    dropped: Arc<AtomicU64>,
) {
    let timeout = Duration::from_millis(settings.poll_timeout_ms);
    let probe_every = Duration::from_millis(settings.reprobe_interval_ms);
    let mut polls = ticker(settings.poll_interval_ms);
    antenna.refresh_health().await;
    let mut last_probe = Instant::now();

    loop {
        polls.tick().await;

        if antenna.is_offline() {
            if last_probe.elapsed() >= probe_every {
                last_probe = Instant::now();
                antenna.reprobe().await;
            }
            continue;
        }
        if last_probe.elapsed() >= probe_every {
            last_probe = Instant::now();
            antenna.refresh_health().await;
        }

        match antenna.poll(timeout).await {
            Ok(PollOutcome::Reading(measurement)) => match sink.try_send(measurement) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => return,
            },
            Ok(PollOutcome::Unavailable(reason)) => {
                trace!("antenna {} unavailable: {}", antenna.id(), reason);
            }
            Err(fault @ HardwareFault::RetriesExhausted { .. }) => {
                warn!("{}", fault);
                last_probe = Instant::now();
            }
            Err(fault) => debug!("{}", fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as gate;
    use wardf_core::algorithms::PathLossParams;
    use wardf_core::{AntennaArray, AntennaDescriptor, Point3};

    const FREQ: f64 = 2.4e9;
    const ANTENNAS: [(&str, f64, f64); 3] = [("a", 0.0, 0.0), ("b", 10.0, 0.0), ("c", 5.0, 10.0)];

    fn config() -> DfConfiguration {
        DfConfiguration::new(AntennaArray::new(
            ANTENNAS
                .iter()
                .map(|(id, x, y)| AntennaDescriptor::at(*id, *x, *y, 0.0))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn shutdown_abandons_the_computation_in_flight() {
        let (mut task, engine, commands, measurements) = EngineBuilder::ingest_only(config()).unwrap().build();
        let mut estimates = engine.subscribe();

        task.engine.start(0).unwrap();
        let emitter = Point3::planar(5.0, 3.0);
        for (ts, (id, x, y)) in ANTENNAS.iter().enumerate() {
            let rssi = PathLossParams::default()
                .distance_to_rssi(Point3::planar(*x, *y).distance(&emitter), FREQ)
                .unwrap();
            task.engine.accept(Measurement::new(*id, ts as u64 + 1, rssi, FREQ));
        }
        let jobs = match task.engine.on_tick(10_000, |_| true) {
            Cycle::Compute { jobs, .. } => jobs,
            other => panic!("expected jobs, got {:?}", other),
        };

        // the computation cannot finish before the gate opens
        let (release, wait) = gate::channel::<()>();
        task.in_flight = Some(tokio::task::spawn_blocking(move || {
            let _ = wait.recv();
            run_jobs(jobs)
        }));
        let running = tokio::spawn(task.run(commands, measurements));

        assert_eq!(engine.status().await.unwrap().state, EngineState::Estimating);
        engine.shutdown().await.unwrap();
        let _ = release.send(());
        running.await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(estimates.try_next().is_none());
        assert!(matches!(engine.status().await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn builder_binds_candidates_to_the_registry() {
        use wardf_hal::{SimOutcome, SimulatedBackend};

        let mut registry = HardwareRegistry::new();
        for (id, _, _) in &ANTENNAS[..2] {
            registry.register(Antenna::new(*id, SimulatedBackend::scripted(Vec::<SimOutcome>::new())));
        }
        assert!(matches!(
            EngineBuilder::new(config(), registry.clone()).err(),
            Some(ConfigError::InvalidConfiguration(_))
        ));

        registry.register(Antenna::new("c", SimulatedBackend::scripted(Vec::<SimOutcome>::new())));
        let engine = EngineBuilder::new(config(), registry).unwrap().spawn();
        assert!(engine.config().registry().is_some());

        let mut unknown = config();
        unknown.array.antennas[2].id = "d".into();
        assert!(engine.set_configuration(unknown.clone()).is_err());
        assert_eq!(engine.config().generation(), 0);

        let ingest = EngineBuilder::ingest_only(unknown).unwrap().spawn();
        assert!(ingest.config().registry().is_none());

        engine.shutdown().await.unwrap();
        ingest.shutdown().await.unwrap();
    }
}
