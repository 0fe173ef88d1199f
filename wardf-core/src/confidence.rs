//! Confidence Scoring for Direction-Finding Estimates
//!
//! ## Overview
//!
//! Every [`Estimate`](crate::types::Estimate) carries a confidence score in
//! `[0, 1]`. The score is derived deterministically from the algorithm's
//! residuals and the number of contributing antennas, so two runs over the
//! same batch always report the same value.
//!
//! ## Confidence Factors
//!
//! Multilateration multiplies three factors:
//!
//! 1. **Measurement count**: more antennas, more redundancy
//! 2. **Geometry**: dilution of precision relative to an ideal layout
//! 3. **Residual fit**: how well the ranges agree with the solution
//!
//! ```text
//! confidence = (1 - 1/(2n)) × min(1, (2/√n) / GDOP) × 1 / (1 + χ²_red)
//!
//! Where:
//! - n      = antennas contributing to the fix
//! - GDOP   = √(trace((JᵀJ)⁻¹)) for unit-vector Jacobian J
//! - χ²_red = weighted residual sum / max(1, n - 2)
//! ```
//!
//! The `2/√n` term is the GDOP of n antennas evenly spread around the target,
//! so a perfect layout scores 1 on geometry. Degenerate (collinear) layouts
//! are halved.
//!
//! ## Implementation Notes
//!
//! - Stored as a 16-bit fixed-point value so scores compare and hash exactly
//! - Serialized as a plain float in `[0, 1]`

use core::ops::Mul;

use serde::{Deserialize, Serialize};

/// Confidence score in range [0, 1]
///
/// Internally stored as fixed-point for determinism.
/// 0.0 = no confidence, 1.0 = full confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct ConfidenceScore {
    /// Fixed-point representation (0-65535 maps to 0.0-1.0)
    value: u16,
}

impl ConfidenceScore {
    /// Minimum meaningful confidence (1%)
    pub const MIN_CONFIDENCE: Self = Self { value: 655 };

    /// Maximum confidence (100%)
    pub const MAX_CONFIDENCE: Self = Self { value: 65535 };

    /// No confidence (0%), used for insufficient-data and failed estimates
    pub const ZERO: Self = Self { value: 0 };

    /// Moderate confidence (50%)
    pub const MODERATE: Self = Self { value: 32768 };

    /// High confidence threshold (80%)
    pub const HIGH_THRESHOLD: Self = Self { value: 52428 };

    /// Create from floating point value [0, 1]
    ///
    /// NaN maps to zero.
    pub fn from_float(confidence: f32) -> Self {
        if confidence.is_nan() {
            return Self::ZERO;
        }
        let clamped = confidence.clamp(0.0, 1.0);
        Self {
            value: (clamped * 65535.0).round() as u16,
        }
    }

    /// Create from an f64 factor product
    pub fn from_f64(confidence: f64) -> Self {
        Self::from_float(confidence as f32)
    }

    /// Convert to floating point [0, 1]
    pub fn as_float(&self) -> f32 {
        self.value as f32 / 65535.0
    }

    /// Get raw fixed-point value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Check if confidence is above high threshold
    pub fn is_high(&self) -> bool {
        *self >= Self::HIGH_THRESHOLD
    }

    /// Check if confidence is critically low
    pub fn is_critical(&self) -> bool {
        *self < Self::MIN_CONFIDENCE
    }

    /// Linear blend toward `other` with weight `alpha` on `other`
    pub fn blend(&self, other: Self, alpha: f32) -> Self {
        let a = alpha.clamp(0.0, 1.0);
        Self::from_float(self.as_float() * (1.0 - a) + other.as_float() * a)
    }

    /// Apply exponential decay over time
    ///
    /// Halves the score every `half_life_ms`, capped at 16 halvings.
    pub fn decay(&self, time_delta_ms: u32, half_life_ms: u32) -> Self {
        if time_delta_ms == 0 || half_life_ms == 0 {
            return *self;
        }

        let decay_shifts = (time_delta_ms / half_life_ms).min(16);
        Self {
            value: self.value >> decay_shifts,
        }
    }
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f32> for ConfidenceScore {
    fn from(value: f32) -> Self {
        Self::from_float(value)
    }
}

impl From<ConfidenceScore> for f32 {
    fn from(score: ConfidenceScore) -> Self {
        score.as_float()
    }
}

impl Mul<f32> for ConfidenceScore {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self::from_float(self.as_float() * factor)
    }
}

/// Multilateration confidence from antenna count, geometry and residuals
///
/// `gdop` must be the unit-Jacobian dilution of precision; non-finite or
/// non-positive values score zero on geometry.
pub fn multilateration_confidence(
    antennas: usize,
    gdop: f64,
    reduced_chi_squared: f64,
    degenerate: bool,
) -> ConfidenceScore {
    if antennas == 0 {
        return ConfidenceScore::ZERO;
    }
    let n = antennas as f64;
    let count_factor = 1.0 - 1.0 / (2.0 * n);

    let ideal_gdop = 2.0 / n.sqrt();
    let mut geometry_factor = if gdop.is_finite() && gdop > 0.0 {
        (ideal_gdop / gdop).min(1.0)
    } else {
        0.0
    };
    if degenerate {
        geometry_factor *= 0.5;
    }

    let residual_factor = if reduced_chi_squared.is_finite() {
        1.0 / (1.0 + reduced_chi_squared.max(0.0))
    } else {
        0.0
    };

    ConfidenceScore::from_f64(count_factor * geometry_factor * residual_factor)
}
