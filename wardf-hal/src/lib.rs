//! Hardware Abstraction for Direction-Finding Antennas
//!
//! ## Overview
//!
//! This crate presents a uniform, capability-based interface over the
//! receive hardware a wardriving rig carries. Each antenna kind has distinct
//! characteristics:
//!
//! ### Wi-Fi adapter
//!
//! **When to use:**
//! - Commodity USB/PCIe adapters associated to a network
//! - Tracking the access point the adapter is associated with
//!
//! **Characteristics:**
//! - Signal level from the kernel's wireless statistics
//! - Noise figure only on some drivers
//! - One reading per poll, no raw samples
//!
//! ### SDR front-end
//!
//! **When to use:**
//! - Generic RF (ISM band remotes, telemetry, cellular uplink)
//! - Captures replayed from disk
//!
//! **Characteristics:**
//! - Raw IQ in `cu8`, `ci16` or `cf32`
//! - Level from mean block power and a full-scale reference
//! - SNR against a configured noise floor
//!
//! ### Simulated
//!
//! **When to use:**
//! - Tests and bench setups
//! - Scripted fault injection
//!
//! ## Failure Model
//!
//! ```text
//! backend result        antenna poll result
//! ──────────────        ───────────────────────────────────────────
//! reading           ──▶ Reading(Measurement)
//! Unavailable       ──▶ Unavailable            (expected, non-fatal)
//! timeout           ──▶ Unavailable
//! Fault             ──▶ retry once after backoff
//! Fault, Fault      ──▶ Err(HardwareFault), antenna Offline
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use wardf_hal::{Antenna, HardwareRegistry, PollOutcome, SimOutcome, SimulatedBackend};
//!
//! # tokio_test_block_on();
//! # fn tokio_test_block_on() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let registry = HardwareRegistry::new()
//!     .with(Antenna::new("ant-0", SimulatedBackend::scripted([SimOutcome::Reading(-61.0)])));
//!
//! let antenna = registry.get("ant-0").unwrap();
//! match antenna.poll(Duration::from_millis(200)).await {
//!     Ok(PollOutcome::Reading(m)) => assert_eq!(m.rssi_dbm, -61.0),
//!     other => panic!("unexpected {:?}", other),
//! }
//! # });
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod antenna;
pub mod error;
pub mod registry;
pub mod sdr;
pub mod simulated;
pub mod wifi;

// Re-export common types
pub use antenna::{
    Antenna, AntennaBackend, BackendKind, Health, PollOutcome, PollPolicy, PollStats, SignalReading,
};
pub use error::{BackendError, HalResult, HardwareFault};
pub use registry::HardwareRegistry;
pub use sdr::{FileIqSource, IqFormat, IqSource, SdrBackend, SdrConfig};
pub use simulated::{SimOutcome, SimulatedBackend};
pub use wifi::{WifiAdapterBackend, WirelessStats};
