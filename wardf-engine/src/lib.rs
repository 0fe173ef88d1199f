//! Direction-Finding Engine
//!
//! ## Overview
//!
//! Ties the signal algorithms of `wardf-core` to the antennas of `wardf-hal`:
//! measurements are batched per estimation window, the configured algorithm
//! runs on each closed window, and confidence-scored estimates are published.
//!
//! ```text
//!   scanners ──▶ DfIntegration ──┐
//!                                ├──▶ DfEngine (state machine) ──▶ EstimateStream
//!   HAL collectors ──────────────┘          ▲
//!                                           │ Arc<DfConfiguration>
//!   operator ──▶ ConfigHandle::apply ───────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: validated, serializable [`DfConfiguration`]
//! - [`handle`]: copy-on-write [`ConfigHandle`]
//! - [`state`]: the six engine states and their transition table
//! - [`engine`]: synchronous [`DfEngine`] (batch, calibration, smoothing)
//! - [`runtime`]: tokio cycle task and per-antenna collectors
//! - [`integration`]: boundary adapter for scanners and operators
//! - [`sinks`]: persistence and telemetry collaborators
//!
//! ## Example
//!
//! ```rust,no_run
//! use wardf_core::{AntennaArray, AntennaDescriptor};
//! use wardf_engine::{DfConfiguration, DfIntegration, EngineBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let array = AntennaArray::new(vec![
//!     AntennaDescriptor::at("ant-0", 0.0, 0.0, 0.0),
//!     AntennaDescriptor::at("ant-1", 10.0, 0.0, 0.0),
//!     AntennaDescriptor::at("ant-2", 5.0, 10.0, 0.0),
//! ]);
//! let engine = EngineBuilder::ingest_only(DfConfiguration::new(array))?.spawn();
//! let df = DfIntegration::new(engine);
//!
//! let mut estimates = df.estimates();
//! df.start().await?;
//! df.ingest_record(br#"{"antenna":"ant-0","timestamp":1,"rssi":-52.0,"frequency_mhz":2412}"#)?;
//! while let Some(estimate) = estimates.next().await {
//!     println!("{:?}", estimate.position_value());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod integration;
pub mod job;
pub mod metrics;
pub mod runtime;
pub mod sinks;
pub mod state;
pub mod stream;

// Public API
pub use config::{AlgorithmConfig, AlgorithmKind, CollectorConfig, DfConfiguration};
pub use engine::{Cycle, DfEngine};
pub use error::{ConfigError, EngineError, EngineResult, IngestError};
pub use handle::ConfigHandle;
pub use integration::{DfIntegration, JsonRecordDecoder, MeasurementDecoder};
pub use job::{run_algorithm, run_jobs, EstimationJob, JobOutcome};
pub use metrics::EngineMetrics;
pub use runtime::{EngineBuilder, EngineHandle, EngineStatus, RuntimeClock};
pub use sinks::{
    JsonLinesStore, LogTelemetry, MemoryStore, PersistenceSink, RecordingTelemetry, StoredRecord,
    TelemetryEvent, TelemetrySink,
};
pub use state::{EngineEvent, EngineState};
pub use stream::EstimateStream;
