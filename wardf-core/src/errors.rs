//! Error Types for Direction-Finding Computations
//!
//! ## Design Philosophy
//!
//! Algorithm errors are returned from the engine's cycle task on every window,
//! so they stay small and cheap to clone:
//!
//! 1. **Recoverable by construction**: none of these errors is fatal. The engine
//!    turns each of them into a degraded or failed `Estimate` and keeps going.
//!
//! 2. **Actionable information**: every variant carries enough context to log
//!    a useful line without re-running the computation.
//!
//! ## Error Categories
//!
//! ### Input problems
//! - `InvalidModelParameters`: malformed path-loss inputs (frequency <= 0,
//!   environment factor outside the model's range, non-finite RSSI)
//! - `InsufficientMeasurements`: fewer usable antennas than the algorithm's
//!   structural minimum
//!
//! ### Solver problems
//! - `NumericalFailure`: the solver produced a non-finite result
//! - `ExcessiveUncertainty`: a fix was found but its uncertainty is too large
//!   to publish as a position
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use wardf_core::AlgorithmError;
//!
//! fn describe(err: &AlgorithmError) -> &'static str {
//!     match err {
//!         AlgorithmError::InsufficientMeasurements { .. } => "degraded: wait for more antennas",
//!         AlgorithmError::InvalidModelParameters { .. } => "bad configuration or reading",
//!         AlgorithmError::NumericalFailure { .. } => "solver failure",
//!         AlgorithmError::ExcessiveUncertainty { .. } => "geometry too weak",
//!     }
//! }
//! # assert_eq!(describe(&AlgorithmError::NumericalFailure { reason: "nan" }), "solver failure");
//! ```

use thiserror::Error;

use crate::types::AntennaId;

/// Result type for algorithm operations
pub type AlgorithmResult<T> = Result<T, AlgorithmError>;

/// Errors raised by the signal algorithms
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    /// Path-loss inputs make no physical sense
    #[error("Invalid path-loss model parameters: {reason}")]
    InvalidModelParameters {
        /// Which parameter was rejected
        reason: &'static str,
    },

    /// Not enough usable measurements for the algorithm
    #[error("Insufficient measurements: need {required}, have {available}")]
    InsufficientMeasurements {
        /// Structural minimum of the algorithm (distinct antennas)
        required: usize,
        /// Distinct usable antennas actually present
        available: usize,
    },

    /// Solver produced NaN/inf or failed to make progress
    #[error("Numerical failure: {reason}")]
    NumericalFailure {
        /// Where the computation went wrong
        reason: &'static str,
    },

    /// Solution exists but is too uncertain to publish
    #[error("Estimate uncertainty {uncertainty:.1} exceeds limit {limit:.1}")]
    ExcessiveUncertainty {
        /// 1-sigma uncertainty of the rejected fix (metres or degrees)
        uncertainty: f64,
        /// Configured maximum, same unit
        limit: f64,
    },
}

impl AlgorithmError {
    /// Whether the failure is a lack of input rather than a computation error
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AlgorithmError::InsufficientMeasurements { .. })
    }
}

/// Errors raised when a measurement is structurally invalid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    /// RSSI is NaN or infinite
    #[error("RSSI is not a finite number")]
    NonFiniteRssi,

    /// SNR is present but NaN or infinite
    #[error("SNR is not a finite number")]
    NonFiniteSnr,

    /// Frequency must be strictly positive
    #[error("Frequency {0} Hz is not positive")]
    InvalidFrequency(f64),

    /// Antenna id is empty
    #[error("Antenna id is empty")]
    EmptyAntennaId,

    /// Timestamp went backwards on one antenna's stream
    #[error("Timestamp {timestamp} on antenna {antenna} is not after {last}")]
    NonMonotonic {
        /// Antenna whose stream regressed
        antenna: AntennaId,
        /// Offending timestamp
        timestamp: u64,
        /// Last accepted timestamp
        last: u64,
    },
}

/// Errors raised when an antenna array description is inconsistent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    /// Two descriptors share an id
    #[error("Duplicate antenna id {0}")]
    DuplicateId(AntennaId),

    /// Geodetic positions need an origin to project into the local frame
    #[error("Antenna {0} has a geodetic position but the array has no origin")]
    MissingOrigin(AntennaId),

    /// Coordinates or gain are NaN/inf
    #[error("Antenna {0} has a non-finite coordinate or gain")]
    NonFinite(AntennaId),

    /// Descriptor id is empty
    #[error("Antenna id is empty")]
    EmptyId,
}

/// Errors raised by the calibration store and calibration routine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Profile interval overlaps an existing closed interval
    #[error("Profile for {antenna} starting at {valid_from} overlaps an existing profile")]
    Overlap {
        /// Antenna the profile belongs to
        antenna: AntennaId,
        /// Start of the rejected profile
        valid_from: u64,
    },

    /// Profile values are out of range
    #[error("Invalid calibration profile: {reason}")]
    InvalidProfile {
        /// What was wrong
        reason: &'static str,
    },

    /// Not enough samples collected to derive a profile
    #[error("Calibration needs {required} samples, collected {available}")]
    InsufficientSamples {
        /// Minimum sample count
        required: usize,
        /// Samples collected so far
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = AlgorithmError::InsufficientMeasurements { required: 3, available: 2 };
        assert_eq!(err.to_string(), "Insufficient measurements: need 3, have 2");
        assert!(err.is_insufficient_data());

        let err = AlgorithmError::ExcessiveUncertainty { uncertainty: 71.25, limit: 50.0 };
        assert_eq!(err.to_string(), "Estimate uncertainty 71.2 exceeds limit 50.0");
        assert!(!err.is_insufficient_data());
    }
}
