//! Estimates emitted by one estimation cycle
//!
//! An estimate is always produced for a closed window, even when nothing
//! could be computed: `InsufficientData` and `Failed` estimates carry zero
//! confidence and a non-`Ok` status, so consumers never have to infer a
//! missing cycle.

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceScore;
use crate::constants::quality::*;
use crate::time::Timestamp;
use crate::types::antenna::Point3;

/// Symmetric 2x2 horizontal covariance (m²)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Covariance2 {
    /// Var(east)
    pub xx: f64,
    /// Cov(east, north)
    pub xy: f64,
    /// Var(north)
    pub yy: f64,
}

impl Covariance2 {
    /// Create a covariance
    pub const fn new(xx: f64, xy: f64, yy: f64) -> Self {
        Self { xx, xy, yy }
    }

    /// Isotropic covariance with the given 1-sigma per axis
    pub fn isotropic(sigma_m: f64) -> Self {
        Self::new(sigma_m * sigma_m, 0.0, sigma_m * sigma_m)
    }

    /// 1-sigma horizontal accuracy (DRMS, √trace)
    pub fn horizontal_accuracy(&self) -> f64 {
        (self.xx + self.yy).max(0.0).sqrt()
    }

    /// Multiply every entry
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.xx * factor, self.xy * factor, self.yy * factor)
    }

    /// Entry-wise sum
    pub fn plus(&self, other: &Covariance2) -> Self {
        Self::new(self.xx + other.xx, self.xy + other.xy, self.yy + other.yy)
    }

    /// All entries finite
    pub fn is_finite(&self) -> bool {
        self.xx.is_finite() && self.xy.is_finite() && self.yy.is_finite()
    }
}

/// What was estimated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimateKind {
    /// Emitter position in the local frame
    Position {
        /// Estimated position
        position: Point3,
        /// Horizontal covariance
        covariance: Covariance2,
    },
    /// Bearing from the array towards the emitter
    Bearing {
        /// Degrees clockwise from north, `[0, 360)`
        bearing_deg: f64,
        /// 1-sigma (degrees)
        uncertainty_deg: f64,
    },
    /// Window closed with fewer usable antennas than required
    InsufficientData {
        /// Algorithm's minimum
        required: usize,
        /// Distinct antennas in the batch
        available: usize,
    },
    /// Algorithm ran and failed
    Failed {
        /// Error message
        reason: String,
    },
}

impl EstimateKind {
    /// Same variant, ignoring values
    pub fn same_variant(&self, other: &EstimateKind) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

/// Outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    /// Successful estimate
    Ok,
    /// Not enough input
    Degraded,
    /// Algorithm failure
    Error,
}

/// Quality grade from accuracy and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Unusable
    Invalid,
    /// Rough indication
    Poor,
    /// Usable
    Fair,
    /// Reliable
    Good,
    /// Best grade
    Excellent,
}

impl Quality {
    /// Grade a position by 1-sigma horizontal accuracy (m)
    pub fn grade_position(accuracy_m: f64, confidence: ConfidenceScore) -> Quality {
        Self::grade(
            accuracy_m,
            confidence,
            [POSITION_EXCELLENT_M, POSITION_GOOD_M, POSITION_FAIR_M, POSITION_POOR_M],
        )
    }

    /// Grade a bearing by 1-sigma uncertainty (degrees)
    pub fn grade_bearing(uncertainty_deg: f64, confidence: ConfidenceScore) -> Quality {
        Self::grade(
            uncertainty_deg,
            confidence,
            [BEARING_EXCELLENT_DEG, BEARING_GOOD_DEG, BEARING_FAIR_DEG, BEARING_POOR_DEG],
        )
    }

    fn grade(accuracy: f64, confidence: ConfidenceScore, limits: [f64; 4]) -> Quality {
        let c = confidence.as_float();
        let floors = [CONFIDENCE_EXCELLENT, CONFIDENCE_GOOD, CONFIDENCE_FAIR, CONFIDENCE_POOR];
        let grades = [Quality::Excellent, Quality::Good, Quality::Fair, Quality::Poor];
        if !accuracy.is_finite() {
            return Quality::Invalid;
        }
        for ((limit, floor), grade) in limits.iter().zip(floors).zip(grades) {
            if accuracy < *limit && c > floor {
                return grade;
            }
        }
        Quality::Invalid
    }
}

/// Output of one estimation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Emitter the estimate refers to, if the batch was filtered to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Estimated quantity
    pub kind: EstimateKind,
    /// Outcome status
    pub status: EstimateStatus,
    /// Confidence in `[0, 1]`
    pub confidence: ConfidenceScore,
    /// Quality grade
    pub quality: Quality,
    /// Measurements in the frozen batch
    pub measurement_count: usize,
    /// Distinct antennas that contributed
    pub antenna_count: usize,
    /// Algorithm that produced the estimate
    pub algorithm: String,
    /// Blended with the previous estimate
    #[serde(default)]
    pub smoothed: bool,
    /// Window close time (ms)
    pub timestamp: Timestamp,
}

impl Estimate {
    /// Successful position estimate
    pub fn position(
        position: Point3,
        covariance: Covariance2,
        confidence: ConfidenceScore,
        algorithm: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            target: None,
            quality: Quality::grade_position(covariance.horizontal_accuracy(), confidence),
            kind: EstimateKind::Position { position, covariance },
            status: EstimateStatus::Ok,
            confidence,
            measurement_count: 0,
            antenna_count: 0,
            algorithm: algorithm.into(),
            smoothed: false,
            timestamp,
        }
    }

    /// Successful bearing estimate
    pub fn bearing(
        bearing_deg: f64,
        uncertainty_deg: f64,
        confidence: ConfidenceScore,
        algorithm: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            target: None,
            quality: Quality::grade_bearing(uncertainty_deg, confidence),
            kind: EstimateKind::Bearing {
                bearing_deg: normalize_degrees(bearing_deg),
                uncertainty_deg,
            },
            status: EstimateStatus::Ok,
            confidence,
            measurement_count: 0,
            antenna_count: 0,
            algorithm: algorithm.into(),
            smoothed: false,
            timestamp,
        }
    }

    /// "Insufficient data" estimate, confidence 0
    pub fn insufficient_data(
        required: usize,
        available: usize,
        algorithm: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self::unsuccessful(
            EstimateKind::InsufficientData { required, available },
            EstimateStatus::Degraded,
            algorithm,
            timestamp,
        )
        .with_counts(0, available)
    }

    /// Error estimate carrying the failure reason, confidence 0
    pub fn failed(reason: impl Into<String>, algorithm: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::unsuccessful(
            EstimateKind::Failed { reason: reason.into() },
            EstimateStatus::Error,
            algorithm,
            timestamp,
        )
    }

    fn unsuccessful(
        kind: EstimateKind,
        status: EstimateStatus,
        algorithm: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            target: None,
            kind,
            status,
            confidence: ConfidenceScore::ZERO,
            quality: Quality::Invalid,
            measurement_count: 0,
            antenna_count: 0,
            algorithm: algorithm.into(),
            smoothed: false,
            timestamp,
        }
    }

    /// Set batch counts
    pub fn with_counts(mut self, measurement_count: usize, antenna_count: usize) -> Self {
        self.measurement_count = measurement_count;
        self.antenna_count = antenna_count;
        self
    }

    /// Set target
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Status is `Ok`
    pub fn is_success(&self) -> bool {
        self.status == EstimateStatus::Ok
    }

    /// Estimated position, if this is a position estimate
    pub fn position_value(&self) -> Option<Point3> {
        match self.kind {
            EstimateKind::Position { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Estimated bearing, if this is a bearing estimate
    pub fn bearing_value(&self) -> Option<f64> {
        match self.kind {
            EstimateKind::Bearing { bearing_deg, .. } => Some(bearing_deg),
            _ => None,
        }
    }

    /// Accuracy in the kind's unit (m or degrees)
    pub fn accuracy(&self) -> Option<f64> {
        match &self.kind {
            EstimateKind::Position { covariance, .. } => Some(covariance.horizontal_accuracy()),
            EstimateKind::Bearing { uncertainty_deg, .. } => Some(*uncertainty_deg),
            _ => None,
        }
    }

    /// Recompute the quality grade after kind or confidence changed
    pub fn regrade(mut self) -> Self {
        self.quality = match &self.kind {
            EstimateKind::Position { covariance, .. } => {
                Quality::grade_position(covariance.horizontal_accuracy(), self.confidence)
            }
            EstimateKind::Bearing { uncertainty_deg, .. } => {
                Quality::grade_bearing(*uncertainty_deg, self.confidence)
            }
            _ => Quality::Invalid,
        };
        self
    }
}

/// Wrap degrees into `[0, 360)`
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_quality_bands() {
        let high = ConfidenceScore::from_float(0.9);
        let mid = ConfidenceScore::from_float(0.5);
        assert_eq!(Quality::grade_position(5.0, high), Quality::Excellent);
        assert_eq!(Quality::grade_position(20.0, high), Quality::Good);
        assert_eq!(Quality::grade_position(5.0, mid), Quality::Fair);
        assert_eq!(Quality::grade_position(75.0, high), Quality::Poor);
        assert_eq!(Quality::grade_position(150.0, high), Quality::Invalid);
        assert_eq!(Quality::grade_position(f64::NAN, high), Quality::Invalid);
    }

    #[test]
    fn bearing_quality_bands() {
        let high = ConfidenceScore::from_float(0.9);
        assert_eq!(Quality::grade_bearing(3.0, high), Quality::Excellent);
        assert_eq!(Quality::grade_bearing(45.0, high), Quality::Poor);
        assert_eq!(Quality::grade_bearing(3.0, ConfidenceScore::ZERO), Quality::Invalid);
    }

    #[test]
    fn insufficient_data_is_degraded_with_zero_confidence() {
        let e = Estimate::insufficient_data(3, 2, "multilateration", 2000);
        assert_eq!(e.status, EstimateStatus::Degraded);
        assert_eq!(e.confidence, ConfidenceScore::ZERO);
        assert_eq!(e.quality, Quality::Invalid);
        assert_eq!(e.antenna_count, 2);
        assert!(!e.is_success());
    }

    #[test]
    fn bearing_is_normalized() {
        let e = Estimate::bearing(-90.0, 5.0, ConfidenceScore::MODERATE, "amplitude_bearing", 0);
        assert_eq!(e.bearing_value(), Some(270.0));
        assert_eq!(normalize_degrees(720.0), 0.0);
    }

    #[test]
    fn serializes_with_type_tag() {
        let e = Estimate::failed("singular", "multilateration", 1);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"]["type"], "failed");
        assert_eq!(json["status"], "error");
    }
}
