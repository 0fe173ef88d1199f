//! Engine error types
//!
//! - [`ConfigError`]: a candidate configuration was rejected; the active one
//!   is untouched.
//! - [`EngineError`]: a command does not fit the engine's current state, or
//!   the engine is gone.
//! - [`IngestError`]: a record was rejected at the integration boundary and
//!   never reached the engine.

use thiserror::Error;

use wardf_core::{CalibrationError, MeasurementError};

use crate::state::EngineState;

/// Result type for engine commands
pub type EngineResult<T> = Result<T, EngineError>;

/// Configuration rejected by validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Candidate failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Candidate could not be parsed or read
    #[error("Configuration could not be loaded: {0}")]
    Load(String),
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::InvalidConfiguration(reason.into())
    }
}

/// Command rejected by the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Command not allowed in the current state
    #[error("Cannot {action} while {state}")]
    InvalidState {
        /// Rejected command
        action: &'static str,
        /// State at the time
        state: EngineState,
    },

    /// Calibration request for an antenna that cannot be calibrated
    #[error("Calibration rejected: {0}")]
    CalibrationRejected(String),

    /// Calibration could not produce a profile
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// The cycle task has stopped
    #[error("Engine is not running")]
    NotRunning,
}

/// Record rejected at the integration boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Bytes could not be decoded into a measurement
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// Measurement is structurally invalid
    #[error(transparent)]
    Invalid(#[from] MeasurementError),

    /// Antenna is not part of the active configuration
    #[error("Unknown antenna {0}")]
    UnknownAntenna(String),

    /// Measurement is for another emitter than the configured target
    #[error("Target {0:?} does not match the configured filter")]
    TargetMismatch(Option<String>),

    /// Engine is gone
    #[error(transparent)]
    Engine(#[from] EngineError),
}
