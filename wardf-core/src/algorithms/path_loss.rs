//! Path-Loss Conversion (RSSI ↔ Distance)
//!
//! ## Overview
//!
//! Every range-based algorithm starts by turning a received level into a
//! distance. The received level is the emitter's EIRP minus the path loss:
//!
//! ```text
//! rssi_dbm = tx_power_dbm - PL(d, f)
//! ```
//!
//! Each model below is closed-form in both directions.
//!
//! ## Models
//!
//! ### Free space (Friis)
//! ```text
//! PL = 20·log10(d) + 20·log10(f) + 20·log10(4π/c) + L_env
//! ```
//!
//! ### Log-distance
//! ```text
//! PL = FSPL(d₀, f) + 10·n·log10(d/d₀)          n = environment_factor
//! ```
//!
//! ### Hata, urban (COST-231 metropolitan)
//! ```text
//! a(hm) = (1.1·log10 f - 0.7)·hm - (1.56·log10 f - 0.8)
//! PL    = 46.3 + 33.9·log10 f - 13.82·log10 hb - a(hm)
//!         + (44.9 - 6.55·log10 hb)·log10 d_km + C_m + L_env        C_m = 3 dB
//! ```
//!
//! ### Hata, rural (open area)
//! ```text
//! PL = PL_urban(C_m = 0) - 4.78·(log10 f)² + 18.33·log10 f - 40.94
//! ```
//!
//! Hata frequencies are in MHz and clamped to the 150-2000 MHz validity band.
//!
//! ## Environment Factor
//!
//! | Model        | Meaning                   | Valid range |
//! |--------------|---------------------------|-------------|
//! | free_space   | excess attenuation (dB)   | [0, 40]     |
//! | log_distance | path-loss exponent        | [1.5, 6.0]  |
//! | hata_*       | excess attenuation (dB)   | [0, 40]     |
//!
//! Distances are clamped to at least the reference distance, so the mapping
//! stays monotonically non-increasing in RSSI.

use serde::{Deserialize, Serialize};

use crate::constants::defaults::{DEFAULT_REFERENCE_DISTANCE_M, DEFAULT_TX_POWER_DBM};
use crate::constants::radio::*;
use crate::errors::{AlgorithmError, AlgorithmResult};

/// Path-loss model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathLossModel {
    /// Friis free-space
    #[default]
    FreeSpace,
    /// Log-distance with configurable exponent
    LogDistance,
    /// COST-231 Hata, dense urban
    HataUrban,
    /// Hata with open/rural correction
    HataRural,
}

impl PathLossModel {
    /// Environment factor used when none is configured
    pub fn default_environment_factor(&self) -> f64 {
        match self {
            PathLossModel::LogDistance => 2.0,
            _ => 0.0,
        }
    }

    /// Valid environment factor range (inclusive)
    pub fn environment_range(&self) -> (f64, f64) {
        match self {
            PathLossModel::LogDistance => (MIN_PATH_LOSS_EXPONENT, MAX_PATH_LOSS_EXPONENT),
            _ => (0.0, MAX_EXCESS_ATTENUATION_DB),
        }
    }

    /// Lower-case name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            PathLossModel::FreeSpace => "free_space",
            PathLossModel::LogDistance => "log_distance",
            PathLossModel::HataUrban => "hata_urban",
            PathLossModel::HataRural => "hata_rural",
        }
    }
}

/// Model plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathLossParams {
    /// Model variant
    #[serde(default)]
    pub model: PathLossModel,
    /// Emitter EIRP (dBm)
    #[serde(default = "default_tx_power")]
    pub tx_power_dbm: f64,
    /// Reference distance (m), also the smallest distance returned
    #[serde(default = "default_reference_distance")]
    pub reference_distance_m: f64,
    /// Model-dependent environment factor; model default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_factor: Option<f64>,
    /// Hata base station height (m)
    #[serde(default = "default_base_height")]
    pub base_height_m: f64,
    /// Hata mobile height (m)
    #[serde(default = "default_mobile_height")]
    pub mobile_height_m: f64,
}

fn default_tx_power() -> f64 {
    DEFAULT_TX_POWER_DBM
}

fn default_reference_distance() -> f64 {
    DEFAULT_REFERENCE_DISTANCE_M
}

fn default_base_height() -> f64 {
    HATA_DEFAULT_BASE_HEIGHT_M
}

fn default_mobile_height() -> f64 {
    HATA_DEFAULT_MOBILE_HEIGHT_M
}

impl Default for PathLossParams {
    fn default() -> Self {
        Self::new(PathLossModel::FreeSpace)
    }
}

impl PathLossParams {
    /// Defaults for `model`
    pub fn new(model: PathLossModel) -> Self {
        Self {
            model,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            reference_distance_m: DEFAULT_REFERENCE_DISTANCE_M,
            environment_factor: None,
            base_height_m: HATA_DEFAULT_BASE_HEIGHT_M,
            mobile_height_m: HATA_DEFAULT_MOBILE_HEIGHT_M,
        }
    }

    /// Set EIRP
    pub fn with_tx_power(mut self, tx_power_dbm: f64) -> Self {
        self.tx_power_dbm = tx_power_dbm;
        self
    }

    /// Set environment factor
    pub fn with_environment_factor(mut self, factor: f64) -> Self {
        self.environment_factor = Some(factor);
        self
    }

    /// Set reference distance
    pub fn with_reference_distance(mut self, reference_distance_m: f64) -> Self {
        self.reference_distance_m = reference_distance_m;
        self
    }

    /// Set Hata antenna heights
    pub fn with_heights(mut self, base_height_m: f64, mobile_height_m: f64) -> Self {
        self.base_height_m = base_height_m;
        self.mobile_height_m = mobile_height_m;
        self
    }

    /// Effective environment factor
    pub fn environment_factor(&self) -> f64 {
        self.environment_factor
            .unwrap_or_else(|| self.model.default_environment_factor())
    }

    /// Check frequency-independent parameters
    pub fn validate(&self) -> AlgorithmResult<()> {
        let (lo, hi) = self.model.environment_range();
        let env = self.environment_factor();
        if !(env.is_finite() && env >= lo && env <= hi) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "environment factor outside the model's valid range",
            });
        }
        if !self.tx_power_dbm.is_finite() {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "tx power is not finite",
            });
        }
        if !(self.reference_distance_m.is_finite() && self.reference_distance_m > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "reference distance must be positive",
            });
        }
        if self.is_hata()
            && !(self.base_height_m.is_finite()
                && self.base_height_m > 0.0
                && self.mobile_height_m.is_finite()
                && self.mobile_height_m > 0.0)
        {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "Hata antenna heights must be positive",
            });
        }
        Ok(())
    }

    /// Check a frequency against the model
    pub fn validate_frequency(&self, frequency_hz: f64) -> AlgorithmResult<()> {
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "frequency must be positive",
            });
        }
        Ok(())
    }

    fn is_hata(&self) -> bool {
        matches!(self.model, PathLossModel::HataUrban | PathLossModel::HataRural)
    }

    /// Path loss (dB) at `distance_m`
    pub fn path_loss_db(&self, distance_m: f64, frequency_hz: f64) -> AlgorithmResult<f64> {
        self.validate()?;
        self.validate_frequency(frequency_hz)?;
        let d = distance_m.max(self.reference_distance_m);
        let env = self.environment_factor();

        Ok(match self.model {
            PathLossModel::FreeSpace => free_space_db(d, frequency_hz) + env,
            PathLossModel::LogDistance => {
                let d0 = self.reference_distance_m;
                free_space_db(d0, frequency_hz) + 10.0 * env * (d / d0).log10()
            }
            PathLossModel::HataUrban | PathLossModel::HataRural => {
                let (intercept, slope) = self.hata_coefficients(frequency_hz);
                intercept + slope * (d / 1000.0).log10() + env
            }
        })
    }

    /// Distance (m) at which `rssi_dbm` would be received
    pub fn rssi_to_distance(&self, rssi_dbm: f64, frequency_hz: f64) -> AlgorithmResult<f64> {
        self.validate()?;
        self.validate_frequency(frequency_hz)?;
        if !rssi_dbm.is_finite() {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "rssi is not finite",
            });
        }
        let path_loss = self.tx_power_dbm - rssi_dbm;
        let env = self.environment_factor();

        let distance = match self.model {
            PathLossModel::FreeSpace => {
                10f64.powf((path_loss - env - free_space_db(1.0, frequency_hz)) / 20.0)
            }
            PathLossModel::LogDistance => {
                let d0 = self.reference_distance_m;
                d0 * 10f64.powf((path_loss - free_space_db(d0, frequency_hz)) / (10.0 * env))
            }
            PathLossModel::HataUrban | PathLossModel::HataRural => {
                let (intercept, slope) = self.hata_coefficients(frequency_hz);
                1000.0 * 10f64.powf((path_loss - env - intercept) / slope)
            }
        };

        if distance.is_nan() {
            return Err(AlgorithmError::NumericalFailure {
                reason: "path-loss inversion produced NaN",
            });
        }
        Ok(distance.max(self.reference_distance_m))
    }

    /// Received level (dBm) at `distance_m`
    pub fn distance_to_rssi(&self, distance_m: f64, frequency_hz: f64) -> AlgorithmResult<f64> {
        if !(distance_m.is_finite() && distance_m >= 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "distance must be finite and non-negative",
            });
        }
        Ok(self.tx_power_dbm - self.path_loss_db(distance_m, frequency_hz)?)
    }

    /// Path-loss slope (dB per decade of distance)
    ///
    /// Converts a dB spread into a relative range spread:
    /// `σ_d / d = σ_dB · ln 10 / slope`.
    pub fn slope_db_per_decade(&self, frequency_hz: f64) -> f64 {
        match self.model {
            PathLossModel::FreeSpace => 20.0,
            PathLossModel::LogDistance => 10.0 * self.environment_factor(),
            PathLossModel::HataUrban | PathLossModel::HataRural => {
                self.hata_coefficients(frequency_hz).1
            }
        }
    }

    /// Hata intercept at 1 km and slope per decade
    fn hata_coefficients(&self, frequency_hz: f64) -> (f64, f64) {
        let f_mhz = (frequency_hz / 1e6).clamp(HATA_MIN_FREQUENCY_MHZ, HATA_MAX_FREQUENCY_MHZ);
        let log_f = f_mhz.log10();
        let log_hb = self.base_height_m.log10();
        let hm = self.mobile_height_m;

        let mobile_correction = (1.1 * log_f - 0.7) * hm - (1.56 * log_f - 0.8);
        let base = 46.3 + 33.9 * log_f - 13.82 * log_hb - mobile_correction;
        let slope = 44.9 - 6.55 * log_hb;

        let intercept = match self.model {
            PathLossModel::HataUrban => base + COST231_METRO_CORRECTION_DB,
            _ => base - 4.78 * log_f * log_f + 18.33 * log_f - 40.94,
        };
        (intercept, slope)
    }
}

/// Friis free-space loss (dB)
fn free_space_db(distance_m: f64, frequency_hz: f64) -> f64 {
    20.0 * distance_m.log10()
        + 20.0 * frequency_hz.log10()
        + 20.0 * (4.0 * core::f64::consts::PI / SPEED_OF_LIGHT_M_PER_S).log10()
}

/// Result of fitting a log-distance exponent to calibration points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathLossFit {
    /// Fitted path-loss exponent
    pub exponent: f64,
    /// Fitted level at the reference distance (dBm)
    pub reference_rssi_dbm: f64,
    /// RMS of the regression residuals (dB)
    pub rms_error_db: f64,
    /// Points used
    pub points: usize,
}

impl PathLossFit {
    /// Whether the exponent lies in the log-distance model's valid range
    pub fn is_plausible(&self) -> bool {
        (MIN_PATH_LOSS_EXPONENT..=MAX_PATH_LOSS_EXPONENT).contains(&self.exponent)
    }

    /// Log-distance parameters reproducing the fit at `frequency_hz`
    ///
    /// The exponent is clamped into the valid range; the EIRP is chosen so the
    /// model predicts the fitted reference level at the reference distance.
    pub fn to_params(&self, reference_distance_m: f64, frequency_hz: f64) -> PathLossParams {
        let exponent = self.exponent.clamp(MIN_PATH_LOSS_EXPONENT, MAX_PATH_LOSS_EXPONENT);
        PathLossParams::new(PathLossModel::LogDistance)
            .with_reference_distance(reference_distance_m)
            .with_environment_factor(exponent)
            .with_tx_power(self.reference_rssi_dbm + free_space_db(reference_distance_m, frequency_hz))
    }
}

/// Least-squares fit of `rssi = A - 10·n·log10(d/d₀)` to `(distance_m, rssi_dbm)` points
pub fn fit_path_loss_exponent(
    points: &[(f64, f64)],
    reference_distance_m: f64,
) -> AlgorithmResult<PathLossFit> {
    if !(reference_distance_m.is_finite() && reference_distance_m > 0.0) {
        return Err(AlgorithmError::InvalidModelParameters {
            reason: "reference distance must be positive",
        });
    }
    let samples: Vec<(f64, f64)> = points
        .iter()
        .filter(|(d, rssi)| d.is_finite() && *d > 0.0 && rssi.is_finite())
        .map(|(d, rssi)| (10.0 * (d / reference_distance_m).log10(), *rssi))
        .collect();
    if samples.len() < 2 {
        return Err(AlgorithmError::InsufficientMeasurements {
            required: 2,
            available: samples.len(),
        });
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = samples.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = samples.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    if sxx <= f64::EPSILON {
        return Err(AlgorithmError::InvalidModelParameters {
            reason: "calibration distances must differ",
        });
    }

    let exponent = -sxy / sxx;
    let reference_rssi_dbm = mean_y + exponent * mean_x;
    let sse: f64 = samples
        .iter()
        .map(|(x, y)| (y - (reference_rssi_dbm - exponent * x)).powi(2))
        .sum();

    Ok(PathLossFit {
        exponent,
        reference_rssi_dbm,
        rms_error_db: (sse / n).sqrt(),
        points: samples.len(),
    })
}
