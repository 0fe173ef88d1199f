//! Core data model and signal algorithms for wardf direction finding
//!
//! Turns structured per-antenna signal readings into position and bearing
//! estimates. Everything in this crate is synchronous and free of I/O so the
//! same code runs in the engine's cycle task, in tests and in benchmarks.
//!
//! Layout:
//! - [`types`]: measurements, antenna descriptors and estimates
//! - [`calibration`]: per-antenna correction profiles
//! - [`algorithms`]: path loss, multilateration, bearing, centroid,
//!   signal mapping and estimate smoothing
//! - [`confidence`]: fixed-point confidence scores attached to estimates
//!
//! ```
//! use wardf_core::algorithms::path_loss::{PathLossModel, PathLossParams};
//!
//! let params = PathLossParams::new(PathLossModel::FreeSpace);
//! let d = params.rssi_to_distance(-60.0, 2.4e9).unwrap();
//! assert!(d > 1.0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithms;
pub mod calibration;
pub mod confidence;
pub mod constants;
pub mod errors;
pub mod time;
pub mod types;

// Public API
pub use calibration::{CalibrationProfile, CalibrationSession, CalibrationStore};
pub use confidence::ConfidenceScore;
pub use errors::{AlgorithmError, AlgorithmResult, ArrayError, CalibrationError, MeasurementError};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::{
    AntennaArray, AntennaDescriptor, AntennaId, AntennaPosition, Covariance2, Estimate,
    EstimateKind, EstimateStatus, GeoPoint, Measurement, Point3, Polarization, Protocol, Quality,
};

/// Crate version, reported in telemetry
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
