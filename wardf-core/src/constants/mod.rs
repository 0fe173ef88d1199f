//! Constants for wardf Core
//!
//! Centralized, documented constants used by the signal algorithms and the
//! estimate model. All numeric values are defined here with their unit in the
//! name and, where applicable, the source of the figure.
//!
//! ## Organization
//!
//! - **Radio**: physical constants and path-loss model limits
//! - **Quality**: estimate quality grade thresholds
//! - **Defaults**: default algorithm parameters

/// Physical constants and path-loss model parameter limits.
pub mod radio;

/// Accuracy and confidence bands for estimate quality grades.
pub mod quality;

/// Default algorithm parameters.
pub mod defaults;

pub use radio::{
    SPEED_OF_LIGHT_M_PER_S, MAX_EXCESS_ATTENUATION_DB, MIN_PATH_LOSS_EXPONENT,
    MAX_PATH_LOSS_EXPONENT,
};

pub use defaults::{
    DEFAULT_TX_POWER_DBM, DEFAULT_REFERENCE_DISTANCE_M, DEFAULT_SHADOWING_STD_DB,
    DEFAULT_MAX_POSITION_ERROR_M, MULTILATERATION_MIN_ANTENNAS,
};
