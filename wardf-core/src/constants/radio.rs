//! Radio Propagation Constants
//!
//! Physical constants and the valid parameter ranges of the supported
//! path-loss models.

// ===== FUNDAMENTAL CONSTANTS =====

/// Speed of light in vacuum (m/s).
///
/// Source: CODATA 2018 (exact by definition of the metre)
pub const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;

/// Earth mean radius (m), used by the local equirectangular projection.
///
/// Source: IUGG mean radius R1
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

// ===== PATH-LOSS MODEL LIMITS =====

/// Largest excess attenuation accepted as an environment factor (dB).
///
/// Applies to free-space and both Hata variants. Beyond ~40 dB of clutter
/// loss the models no longer describe the channel.
pub const MAX_EXCESS_ATTENUATION_DB: f64 = 40.0;

/// Smallest log-distance path-loss exponent.
///
/// Below free space (2.0) only waveguide-like corridors get here.
pub const MIN_PATH_LOSS_EXPONENT: f64 = 1.5;

/// Largest log-distance path-loss exponent.
///
/// Obstructed in-building propagation tops out around 6.
///
/// Source: Rappaport, Wireless Communications, Table 4.2
pub const MAX_PATH_LOSS_EXPONENT: f64 = 6.0;

/// Hata frequency validity floor (MHz). Outside it the formula still
/// evaluates, so frequencies are clamped into the validity band.
pub const HATA_MIN_FREQUENCY_MHZ: f64 = 150.0;

/// Hata frequency ceiling (MHz), the upper end of COST-231.
pub const HATA_MAX_FREQUENCY_MHZ: f64 = 2000.0;

/// COST-231 metropolitan centre correction (dB).
pub const COST231_METRO_CORRECTION_DB: f64 = 3.0;

/// Default Hata base station antenna height (m).
pub const HATA_DEFAULT_BASE_HEIGHT_M: f64 = 30.0;

/// Default Hata mobile antenna height (m).
pub const HATA_DEFAULT_MOBILE_HEIGHT_M: f64 = 1.5;
