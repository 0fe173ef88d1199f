//! Quality Grade Thresholds
//!
//! Estimates are graded from their accuracy and confidence. A grade is awarded
//! only when BOTH the accuracy is below the band's limit and the confidence is
//! above the band's floor.

// ===== CONFIDENCE FLOORS =====

/// Confidence floor for `Excellent`.
pub const CONFIDENCE_EXCELLENT: f32 = 0.8;

/// Confidence floor for `Good`.
pub const CONFIDENCE_GOOD: f32 = 0.6;

/// Confidence floor for `Fair`.
pub const CONFIDENCE_FAIR: f32 = 0.4;

/// Confidence floor for `Poor`. Anything lower is `Invalid`.
pub const CONFIDENCE_POOR: f32 = 0.2;

// ===== POSITION ACCURACY BANDS (metres, 1-sigma horizontal) =====

/// Accuracy limit for an `Excellent` position.
pub const POSITION_EXCELLENT_M: f64 = 10.0;

/// Accuracy limit for a `Good` position.
pub const POSITION_GOOD_M: f64 = 25.0;

/// Accuracy limit for a `Fair` position.
pub const POSITION_FAIR_M: f64 = 50.0;

/// Accuracy limit for a `Poor` position.
pub const POSITION_POOR_M: f64 = 100.0;

// ===== BEARING ACCURACY BANDS (degrees) =====

/// Accuracy limit for an `Excellent` bearing.
pub const BEARING_EXCELLENT_DEG: f64 = 5.0;

/// Accuracy limit for a `Good` bearing.
pub const BEARING_GOOD_DEG: f64 = 15.0;

/// Accuracy limit for a `Fair` bearing.
pub const BEARING_FAIR_DEG: f64 = 30.0;

/// Accuracy limit for a `Poor` bearing.
pub const BEARING_POOR_DEG: f64 = 60.0;
