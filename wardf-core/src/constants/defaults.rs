//! Default Algorithm Parameters

/// Emitter EIRP assumed when none is configured (dBm).
///
/// 20 dBm (100 mW) is the common 2.4 GHz Wi-Fi regulatory limit.
pub const DEFAULT_TX_POWER_DBM: f64 = 20.0;

/// Path-loss reference distance (m). Ranges are clamped to at least this.
pub const DEFAULT_REFERENCE_DISTANCE_M: f64 = 1.0;

/// Log-normal shadowing standard deviation (dB).
pub const DEFAULT_SHADOWING_STD_DB: f64 = 4.0;

/// Largest horizontal 1-sigma uncertainty a position fix may carry (m).
pub const DEFAULT_MAX_POSITION_ERROR_M: f64 = 50.0;

/// Gauss-Newton iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Gauss-Newton step length below which the solve has converged (m).
pub const DEFAULT_CONVERGENCE_THRESHOLD_M: f64 = 1e-4;

/// Structural minimum of multilateration (distinct positioned antennas).
pub const MULTILATERATION_MIN_ANTENNAS: usize = 3;

/// Structural minimum of amplitude-comparison bearing.
pub const BEARING_MIN_ANTENNAS: usize = 2;

/// Structural minimum of the weighted centroid.
pub const CENTROID_MIN_ANTENNAS: usize = 2;

/// SNR at which a reading counts as full quality (dB).
pub const FULL_QUALITY_SNR_DB: f64 = 20.0;

/// Samples needed to derive a calibration offset.
pub const MIN_CALIBRATION_SAMPLES: usize = 3;
