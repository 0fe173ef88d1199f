//! Range-Weighted Centroid
//!
//! Coarse position estimate that works with as few as two positioned
//! antennas: the emitter is placed at the centroid of the antenna positions,
//! weighting each antenna by `1 / rᵏ` so the closest antenna pulls hardest.
//!
//! The uncertainty is the weighted scatter of the antennas around the
//! centroid plus the weighted mean squared range residual, so a centroid far
//! from what the ranges say is reported as such. Confidence is the count
//! factor scaled by how well the centroid agrees with the ranges:
//!
//! ```text
//! confidence = (1 - 1/(2n)) / (1 + rms_residual / mean_range)
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use super::aggregate_by_antenna;
use super::path_loss::PathLossParams;
use crate::confidence::ConfidenceScore;
use crate::constants::defaults::CENTROID_MIN_ANTENNAS;
use crate::errors::{AlgorithmError, AlgorithmResult};
use crate::time::Timestamp;
use crate::types::{AntennaArray, Covariance2, Estimate, Measurement, Point3};

/// Algorithm tag carried by estimates
pub const NAME: &str = "weighted_centroid";

/// Weighted-centroid parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidParams {
    /// RSSI → range model
    #[serde(default)]
    pub path_loss: PathLossParams,
    /// Exponent `k` of the `1/rᵏ` weights
    #[serde(default = "default_weight_exponent")]
    pub weight_exponent: f64,
}

fn default_weight_exponent() -> f64 {
    2.0
}

impl Default for CentroidParams {
    fn default() -> Self {
        Self {
            path_loss: PathLossParams::default(),
            weight_exponent: default_weight_exponent(),
        }
    }
}

impl CentroidParams {
    /// Check ranges
    pub fn validate(&self) -> AlgorithmResult<()> {
        self.path_loss.validate()?;
        if !(self.weight_exponent.is_finite() && self.weight_exponent >= 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "weight exponent must be non-negative",
            });
        }
        Ok(())
    }
}

/// Centroid solution
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidFix {
    /// Weighted centroid
    pub position: Point3,
    /// Scatter-based covariance
    pub covariance: Covariance2,
    /// RMS of range residuals at the centroid (m)
    pub residual_rms_m: f64,
    /// Weighted mean range (m)
    pub mean_range_m: f64,
    /// Distinct antennas used
    pub antennas_used: usize,
    /// Raw measurements behind them
    pub measurements_used: usize,
}

impl CentroidFix {
    /// Count factor over range agreement
    pub fn confidence(&self) -> ConfidenceScore {
        let n = self.antennas_used as f64;
        let agreement = 1.0 / (1.0 + self.residual_rms_m / self.mean_range_m.max(f64::EPSILON));
        ConfidenceScore::from_f64((1.0 - 1.0 / (2.0 * n)) * agreement)
    }

    /// Successful estimate carrying this fix
    pub fn to_estimate(&self, timestamp: Timestamp) -> Estimate {
        Estimate::position(self.position, self.covariance, self.confidence(), NAME, timestamp)
            .with_counts(self.measurements_used, self.antennas_used)
    }
}

/// Estimate a position as the range-weighted centroid of the antennas
pub fn estimate_centroid(
    measurements: &[Measurement],
    array: &AntennaArray,
    params: &CentroidParams,
) -> AlgorithmResult<CentroidFix> {
    params.validate()?;

    let mut anchors = Vec::new();
    let mut measurements_used = 0;
    for obs in aggregate_by_antenna(measurements, array) {
        if let Some(position) = obs.position {
            let range = params.path_loss.rssi_to_distance(obs.rssi_dbm, obs.frequency_hz)?;
            anchors.push((position, range, range.powf(-params.weight_exponent)));
            measurements_used += obs.samples;
        }
    }
    if anchors.len() < CENTROID_MIN_ANTENNAS {
        return Err(AlgorithmError::InsufficientMeasurements {
            required: CENTROID_MIN_ANTENNAS,
            available: anchors.len(),
        });
    }

    let total: f64 = anchors.iter().map(|(_, _, w)| w).sum();
    let mean = |f: fn(&Point3) -> f64| anchors.iter().map(|(p, _, w)| w * f(p)).sum::<f64>() / total;
    let position = Point3::new(mean(|p| p.x), mean(|p| p.y), mean(|p| p.z));

    let mut covariance = Covariance2::default();
    let mut residual_sq = 0.0;
    let mut mean_range = 0.0;
    for (p, range, w) in &anchors {
        let (dx, dy) = (p.x - position.x, p.y - position.y);
        covariance = covariance.plus(&Covariance2::new(dx * dx, dx * dy, dy * dy).scaled(w / total));
        residual_sq += w * (range - p.distance_2d(&position)).powi(2) / total;
        mean_range += w * range / total;
    }
    let covariance = covariance.plus(&Covariance2::isotropic((residual_sq / 2.0).sqrt()));

    if !(position.is_finite() && covariance.is_finite()) {
        return Err(AlgorithmError::NumericalFailure {
            reason: "centroid is not finite",
        });
    }

    debug!(
        "weighted centroid: ({:.2}, {:.2}) from {} antennas",
        position.x,
        position.y,
        anchors.len()
    );

    Ok(CentroidFix {
        position,
        covariance,
        residual_rms_m: residual_sq.sqrt(),
        mean_range_m: mean_range,
        antennas_used: anchors.len(),
        measurements_used,
    })
}
