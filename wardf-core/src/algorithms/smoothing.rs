//! Estimate Smoothing
//!
//! Exponentially-weighted blend of successive estimates of the same emitter.
//! The weight of the new estimate grows with the time since the previous one:
//!
//! ```text
//! α = 1 - 2^(-Δt / half_life)
//!
//! position    = (1 - α)·p_prev + α·p_new
//! covariance  = (1 - α)²·P_prev + α²·P_new
//! bearing     = b_prev + α·wrap(b_new - b_prev)      shortest arc
//! confidence  = (1 - α)·c_prev + α·c_new
//! ```
//!
//! The new estimate is returned unchanged (no blending) when:
//! - smoothing is disabled,
//! - `Δt` exceeds the staleness threshold,
//! - either estimate is not a successful estimate,
//! - the estimates are of different kinds or refer to different targets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;
use crate::types::estimate::normalize_degrees;
use crate::types::{Estimate, EstimateKind, Point3};

/// Smoothing settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Blend successive estimates
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Time after which the previous estimate's weight halves (ms)
    pub half_life_ms: u64,
    /// Larger gaps reset the filter (ms)
    pub staleness_ms: u64,
}

fn default_enabled() -> bool {
    true
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self::for_window(2_000)
    }
}

impl SmoothingParams {
    /// Half-life of one window, staleness of five windows
    pub fn for_window(window_ms: u64) -> Self {
        Self {
            enabled: true,
            half_life_ms: window_ms,
            staleness_ms: window_ms.saturating_mul(5),
        }
    }

    /// Smoothing switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Weight of the new estimate after `delta_ms`
    pub fn alpha(&self, delta_ms: u64) -> f64 {
        if self.half_life_ms == 0 {
            return 1.0;
        }
        1.0 - (-(delta_ms as f64) / self.half_life_ms as f64).exp2()
    }
}

/// Blend `new` into `previous`
pub fn smooth(previous: &Estimate, new: &Estimate, params: &SmoothingParams) -> Estimate {
    let delta = new.timestamp.saturating_sub(previous.timestamp);
    let blendable = params.enabled
        && delta <= params.staleness_ms
        && previous.is_success()
        && new.is_success()
        && previous.target == new.target
        && previous.kind.same_variant(&new.kind);
    if !blendable {
        return new.clone();
    }

    let alpha = params.alpha(delta);
    let keep = 1.0 - alpha;

    let kind = match (&previous.kind, &new.kind) {
        (
            EstimateKind::Position { position: p0, covariance: c0 },
            EstimateKind::Position { position: p1, covariance: c1 },
        ) => EstimateKind::Position {
            position: Point3::new(
                keep * p0.x + alpha * p1.x,
                keep * p0.y + alpha * p1.y,
                keep * p0.z + alpha * p1.z,
            ),
            covariance: c0.scaled(keep * keep).plus(&c1.scaled(alpha * alpha)),
        },
        (
            EstimateKind::Bearing { bearing_deg: b0, uncertainty_deg: u0 },
            EstimateKind::Bearing { bearing_deg: b1, uncertainty_deg: u1 },
        ) => {
            let mut diff = (b1 - b0).rem_euclid(360.0);
            if diff > 180.0 {
                diff -= 360.0;
            }
            EstimateKind::Bearing {
                bearing_deg: normalize_degrees(b0 + alpha * diff),
                uncertainty_deg: ((keep * u0).powi(2) + (alpha * u1).powi(2)).sqrt(),
            }
        }
        _ => return new.clone(),
    };

    Estimate {
        kind,
        confidence: previous.confidence.blend(new.confidence, alpha as f32),
        smoothed: true,
        ..new.clone()
    }
    .regrade()
}

/// Per-target previous estimates for [`smooth`]
#[derive(Debug, Clone, Default)]
pub struct EstimateSmoother {
    params: SmoothingParams,
    previous: HashMap<Option<String>, Estimate>,
}

impl EstimateSmoother {
    /// Smoother with `params`
    pub fn new(params: SmoothingParams) -> Self {
        Self {
            params,
            previous: HashMap::new(),
        }
    }

    /// Current settings
    pub fn params(&self) -> &SmoothingParams {
        &self.params
    }

    /// Replace settings, forgetting history
    pub fn set_params(&mut self, params: SmoothingParams) {
        self.params = params;
        self.previous.clear();
    }

    /// Smooth `estimate` against the last successful one for its target
    ///
    /// Only successful estimates become the new reference, so a degraded
    /// cycle does not reset the track.
    pub fn apply(&mut self, estimate: Estimate) -> Estimate {
        let output = match self.previous.get(&estimate.target) {
            Some(previous) => smooth(previous, &estimate, &self.params),
            None => estimate,
        };
        if output.is_success() {
            self.previous.insert(output.target.clone(), output.clone());
        }
        output
    }

    /// Drop entries older than the staleness threshold at `now`
    pub fn expire(&mut self, now: Timestamp) {
        let staleness = self.params.staleness_ms;
        self.previous
            .retain(|_, e| now.saturating_sub(e.timestamp) <= staleness);
    }

    /// Forget every track
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Tracked targets
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// No tracks
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}
