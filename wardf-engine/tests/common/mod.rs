//! Shared fixtures for engine tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wardf_core::algorithms::PathLossParams;
use wardf_core::{AntennaArray, AntennaDescriptor, Clock, Estimate, Point3};
use wardf_engine::{
    DfConfiguration, EngineBuilder, EngineHandle, EngineState, EstimateStream,
    RecordingTelemetry, RuntimeClock,
};
use wardf_hal::{Antenna, HardwareRegistry, Health, SimulatedBackend};

/// Carrier used by every simulated antenna
pub const WIFI_HZ: f64 = 2.4e9;

/// Where the simulated transmitter sits
pub const EMITTER: Point3 = Point3::planar(5.0, 3.0);

/// Antenna positions of the reference triangle
pub const TRIANGLE: [(&str, f64, f64); 3] = [("ant-0", 0.0, 0.0), ("ant-1", 10.0, 0.0), ("ant-2", 5.0, 10.0)];

pub fn triangle_array() -> AntennaArray {
    AntennaArray::new(
        TRIANGLE
            .iter()
            .map(|(id, x, y)| AntennaDescriptor::at(*id, *x, *y, 0.0))
            .collect(),
    )
}

/// Defaults: multilateration, free space, 2 s window
pub fn triangle_config() -> DfConfiguration {
    DfConfiguration::new(triangle_array())
}

/// RSSI an antenna at `(x, y)` reads from [`EMITTER`]
pub fn expected_rssi(x: f64, y: f64) -> f64 {
    PathLossParams::default()
        .distance_to_rssi(Point3::planar(x, y).distance(&EMITTER), WIFI_HZ)
        .unwrap()
}

/// Simulated triangle hearing [`EMITTER`]
pub struct Rig {
    pub registry: HardwareRegistry,
    pub backends: Vec<SimulatedBackend>,
    pub clock: Arc<dyn Clock>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl Rig {
    /// Must be called inside a (paused) tokio runtime
    pub fn new() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(RuntimeClock::starting_at(1_000_000));
        let mut registry = HardwareRegistry::new();
        let mut backends = Vec::new();
        for (id, x, y) in TRIANGLE {
            let backend = SimulatedBackend::emitter(Point3::planar(x, y), EMITTER, PathLossParams::default())
                .with_frequency(WIFI_HZ)
                .with_target("aa:bb:cc:dd:ee:ff");
            registry.register(Antenna::new(id, backend.clone()).with_clock(Arc::clone(&clock)));
            backends.push(backend);
        }
        Self {
            registry,
            backends,
            clock,
            telemetry: Arc::new(RecordingTelemetry::new()),
        }
    }

    pub fn backend(&self, id: &str) -> &SimulatedBackend {
        let index = TRIANGLE.iter().position(|(name, _, _)| *name == id).unwrap();
        &self.backends[index]
    }

    pub fn builder(&self, config: DfConfiguration) -> EngineBuilder {
        EngineBuilder::new(config, self.registry.clone())
            .unwrap()
            .with_clock(Arc::clone(&self.clock))
            .with_telemetry(self.telemetry.clone())
    }

    pub fn spawn(&self, config: DfConfiguration) -> EngineHandle {
        self.builder(config).spawn()
    }
}

/// Next estimate, failing the test if none arrives in a minute of engine time
pub async fn next_estimate(stream: &mut EstimateStream) -> Estimate {
    tokio::time::timeout(Duration::from_secs(60), stream.next())
        .await
        .expect("no estimate within 60 s")
        .expect("estimate stream closed")
}

/// Poll the engine status until `state`, failing after a minute
pub async fn wait_for_state(engine: &EngineHandle, state: EngineState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    loop {
        if engine.status().await.unwrap().state == state {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "engine never reached {}", state);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Poll the engine status until `antenna` reports `health`, failing after a minute
pub async fn wait_for_health(engine: &EngineHandle, antenna: &str, health: Health) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    loop {
        if engine.status().await.unwrap().health.get(antenna) == Some(&health) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} never became {}",
            antenna,
            health
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
