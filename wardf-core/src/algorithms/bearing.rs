//! Amplitude-Comparison Bearing
//!
//! Directional antennas pointing different ways see the emitter at different
//! levels; the power-weighted circular mean of their boresights points
//! towards it:
//!
//! ```text
//! wᵢ = (Pᵢ / P_max)^k                Pᵢ linear power (mW), k = power_exponent
//! θ̂  = atan2(Σ wᵢ sin θᵢ, Σ wᵢ cos θᵢ)
//! R  = ‖Σ wᵢ (sin θᵢ, cos θᵢ)‖ / Σ wᵢ
//! σ  = √(-2 ln R)                     circular standard deviation
//! ```
//!
//! Bearings are degrees clockwise from north. Confidence is the count factor
//! `1 - 1/(2n)` times the resultant length `R`.

use log::debug;
use serde::{Deserialize, Serialize};

use super::aggregate_by_antenna;
use crate::confidence::ConfidenceScore;
use crate::constants::defaults::BEARING_MIN_ANTENNAS;
use crate::errors::{AlgorithmError, AlgorithmResult};
use crate::time::Timestamp;
use crate::types::estimate::normalize_degrees;
use crate::types::{AntennaArray, Estimate, Measurement};

/// Algorithm tag carried by estimates
pub const NAME: &str = "amplitude_bearing";

/// Amplitude-comparison parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearingParams {
    /// Sharpening exponent on relative power
    #[serde(default = "default_power_exponent")]
    pub power_exponent: f64,
    /// Largest acceptable 1-sigma uncertainty (degrees)
    #[serde(default = "default_max_uncertainty")]
    pub max_uncertainty_deg: f64,
}

fn default_power_exponent() -> f64 {
    1.0
}

fn default_max_uncertainty() -> f64 {
    90.0
}

impl Default for BearingParams {
    fn default() -> Self {
        Self {
            power_exponent: default_power_exponent(),
            max_uncertainty_deg: default_max_uncertainty(),
        }
    }
}

impl BearingParams {
    /// Check ranges
    pub fn validate(&self) -> AlgorithmResult<()> {
        if !(self.power_exponent.is_finite() && self.power_exponent > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "power exponent must be positive",
            });
        }
        if !(self.max_uncertainty_deg > 0.0 && self.max_uncertainty_deg <= 180.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "max bearing uncertainty must be in (0, 180]",
            });
        }
        Ok(())
    }
}

/// Solved bearing
#[derive(Debug, Clone, PartialEq)]
pub struct BearingFix {
    /// Degrees clockwise from north, `[0, 360)`
    pub bearing_deg: f64,
    /// Circular standard deviation (degrees)
    pub uncertainty_deg: f64,
    /// Mean resultant length in `[0, 1]`
    pub resultant_length: f64,
    /// Directional antennas used
    pub antennas_used: usize,
    /// Raw measurements behind them
    pub measurements_used: usize,
}

impl BearingFix {
    /// Count factor times resultant length
    pub fn confidence(&self) -> ConfidenceScore {
        let n = self.antennas_used as f64;
        ConfidenceScore::from_f64((1.0 - 1.0 / (2.0 * n)) * self.resultant_length)
    }

    /// Successful estimate carrying this fix
    pub fn to_estimate(&self, timestamp: Timestamp) -> Estimate {
        Estimate::bearing(
            self.bearing_deg,
            self.uncertainty_deg,
            self.confidence(),
            NAME,
            timestamp,
        )
        .with_counts(self.measurements_used, self.antennas_used)
    }
}

/// Estimate a bearing from antennas with known boresights
pub fn estimate_bearing(
    measurements: &[Measurement],
    array: &AntennaArray,
    params: &BearingParams,
) -> AlgorithmResult<BearingFix> {
    params.validate()?;

    let observations: Vec<_> = aggregate_by_antenna(measurements, array)
        .into_iter()
        .filter_map(|o| o.boresight_deg.map(|b| (b, o.rssi_dbm, o.samples)))
        .collect();
    if observations.len() < BEARING_MIN_ANTENNAS {
        return Err(AlgorithmError::InsufficientMeasurements {
            required: BEARING_MIN_ANTENNAS,
            available: observations.len(),
        });
    }

    let strongest = observations
        .iter()
        .map(|(_, rssi, _)| *rssi)
        .fold(f64::NEG_INFINITY, f64::max);

    let (mut east, mut north, mut total) = (0.0, 0.0, 0.0);
    for (boresight, rssi, _) in &observations {
        // relative power in linear units, strongest = 1
        let weight = 10f64.powf((rssi - strongest) / 10.0).powf(params.power_exponent);
        let theta = boresight.to_radians();
        east += weight * theta.sin();
        north += weight * theta.cos();
        total += weight;
    }

    let resultant_length = (east.hypot(north) / total).min(1.0);
    if !(resultant_length.is_finite() && resultant_length > 1e-9) {
        return Err(AlgorithmError::NumericalFailure {
            reason: "antenna responses cancel out",
        });
    }
    let bearing_deg = normalize_degrees(east.atan2(north).to_degrees());
    let uncertainty_deg = (-2.0 * resultant_length.ln()).max(0.0).sqrt().to_degrees().min(180.0);

    if uncertainty_deg > params.max_uncertainty_deg {
        return Err(AlgorithmError::ExcessiveUncertainty {
            uncertainty: uncertainty_deg,
            limit: params.max_uncertainty_deg,
        });
    }

    debug!(
        "amplitude bearing: {:.1}° ±{:.1}° from {} antennas",
        bearing_deg,
        uncertainty_deg,
        observations.len()
    );

    Ok(BearingFix {
        bearing_deg,
        uncertainty_deg,
        resultant_length,
        antennas_used: observations.len(),
        measurements_used: observations.iter().map(|(_, _, s)| s).sum(),
    })
}
