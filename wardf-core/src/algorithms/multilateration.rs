//! Multilateration (RSSI Trilateration)
//!
//! ## Overview
//!
//! Estimates an emitter's horizontal position from ranges to three or more
//! antennas at known positions. Ranges come from the path-loss model; the
//! solver minimises the weighted sum of squared range residuals:
//!
//! ```text
//! x̂ = argmin Σᵢ wᵢ · (rᵢ - ‖x - pᵢ‖)²
//! ```
//!
//! ## Weights
//!
//! Log-normal shadowing makes the range error proportional to the range:
//!
//! ```text
//! σ_dB,i = σ_shadow / √(qᵢ · kᵢ)          qᵢ = SNR quality, kᵢ = samples
//! σ_r,i  = rᵢ · σ_dB,i · ln 10 / S         S  = model slope (dB/decade)
//! wᵢ     = 1 / σ_r,i²
//! ```
//!
//! ## Solver
//!
//! 1. Work in coordinates centred on the weighted antenna centroid.
//! 2. Linearise by subtracting the weighted mean range equation, which gives
//!    a closed-form initial solution.
//! 3. Refine with Gauss-Newton, halving steps that increase the cost.
//!
//! Every linear solve uses the symmetric pseudo-inverse. When the antennas
//! are collinear the cross-line direction is unobservable; the
//! pseudo-inverse then yields the minimum-norm solution about the centroid
//! (a point on the antenna line) and the fix is flagged `degenerate`.
//!
//! ## Uncertainty
//!
//! ```text
//! P     = (JᵀWJ)⁺ · max(1, χ²_red)
//! χ²_red = Σ wᵢ fᵢ² / max(1, n - 2)
//! GDOP  = √trace((JᵀJ)⁺)                  J rows = unit vectors
//! ```
//!
//! A fix whose √trace(P) exceeds `max_position_error_m` is rejected with
//! [`AlgorithmError::ExcessiveUncertainty`].
//!
//! The solve is horizontal. Slant ranges are reduced to horizontal ranges
//! assuming the emitter sits at the weighted mean antenna height, which is
//! also the reported `z`.

use core::f64::consts::LN_10;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::aggregate_by_antenna;
use super::linalg::{add_outer, matvec, pseudo_inverse, trace, Matrix2, Vector};
use super::path_loss::PathLossParams;
use crate::confidence::{multilateration_confidence, ConfidenceScore};
use crate::constants::defaults::*;
use crate::errors::{AlgorithmError, AlgorithmResult};
use crate::time::Timestamp;
use crate::types::{AntennaArray, Covariance2, Estimate, Measurement, Point3};

/// Algorithm tag carried by estimates
pub const NAME: &str = "multilateration";

/// Most step halvings per Gauss-Newton iteration
const MAX_STEP_HALVINGS: usize = 16;

/// Smallest range sigma (m), keeps weights finite at the reference distance
const MIN_RANGE_SIGMA_M: f64 = 1e-3;

/// Multilateration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultilaterationParams {
    /// RSSI → range model
    #[serde(default)]
    pub path_loss: PathLossParams,
    /// Log-normal shadowing standard deviation (dB)
    #[serde(default = "default_shadowing")]
    pub shadowing_std_db: f64,
    /// Gauss-Newton iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Step length that counts as converged (m)
    #[serde(default = "default_convergence")]
    pub convergence_threshold_m: f64,
    /// Largest acceptable 1-sigma horizontal uncertainty (m)
    #[serde(default = "default_max_error")]
    pub max_position_error_m: f64,
}

fn default_shadowing() -> f64 {
    DEFAULT_SHADOWING_STD_DB
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_convergence() -> f64 {
    DEFAULT_CONVERGENCE_THRESHOLD_M
}

fn default_max_error() -> f64 {
    DEFAULT_MAX_POSITION_ERROR_M
}

impl Default for MultilaterationParams {
    fn default() -> Self {
        Self {
            path_loss: PathLossParams::default(),
            shadowing_std_db: DEFAULT_SHADOWING_STD_DB,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_threshold_m: DEFAULT_CONVERGENCE_THRESHOLD_M,
            max_position_error_m: DEFAULT_MAX_POSITION_ERROR_M,
        }
    }
}

impl MultilaterationParams {
    /// Set the path-loss model
    pub fn with_path_loss(mut self, path_loss: PathLossParams) -> Self {
        self.path_loss = path_loss;
        self
    }

    /// Set the shadowing sigma
    pub fn with_shadowing(mut self, shadowing_std_db: f64) -> Self {
        self.shadowing_std_db = shadowing_std_db;
        self
    }

    /// Set the uncertainty limit
    pub fn with_max_position_error(mut self, max_position_error_m: f64) -> Self {
        self.max_position_error_m = max_position_error_m;
        self
    }

    /// Check ranges
    pub fn validate(&self) -> AlgorithmResult<()> {
        self.path_loss.validate()?;
        if !(self.shadowing_std_db.is_finite() && self.shadowing_std_db > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "shadowing standard deviation must be positive",
            });
        }
        if self.max_iterations == 0 {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "max_iterations must be at least 1",
            });
        }
        if !(self.convergence_threshold_m.is_finite() && self.convergence_threshold_m > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "convergence threshold must be positive",
            });
        }
        if !(self.max_position_error_m.is_finite() && self.max_position_error_m > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "max position error must be positive",
            });
        }
        Ok(())
    }
}

/// Solved position with its uncertainty
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    /// Estimated position (z = weighted mean antenna height)
    pub position: Point3,
    /// Horizontal covariance (m²)
    pub covariance: Covariance2,
    /// RMS of the range residuals (m)
    pub residual_rms_m: f64,
    /// Weighted residual sum over degrees of freedom
    pub reduced_chi_squared: f64,
    /// Geometric dilution of precision
    pub gdop: f64,
    /// Antenna geometry left a direction unobservable
    pub degenerate: bool,
    /// Distinct antennas used
    pub antennas_used: usize,
    /// Raw measurements behind them
    pub measurements_used: usize,
    /// Gauss-Newton iterations run
    pub iterations: usize,
}

impl PositionFix {
    /// Confidence from count, geometry and residuals
    pub fn confidence(&self) -> ConfidenceScore {
        multilateration_confidence(
            self.antennas_used,
            self.gdop,
            self.reduced_chi_squared,
            self.degenerate,
        )
    }

    /// Successful estimate carrying this fix
    pub fn to_estimate(&self, timestamp: Timestamp) -> Estimate {
        Estimate::position(self.position, self.covariance, self.confidence(), NAME, timestamp)
            .with_counts(self.measurements_used, self.antennas_used)
    }
}

struct Range {
    anchor: Vector<2>,
    range: f64,
    weight: f64,
}

/// Estimate a position from measurements of antennas with known positions
///
/// Fails with `InsufficientMeasurements` when fewer than three distinct
/// positioned antennas are present, never returning a guessed position.
pub fn estimate_position(
    measurements: &[Measurement],
    array: &AntennaArray,
    params: &MultilaterationParams,
) -> AlgorithmResult<PositionFix> {
    params.validate()?;

    let observations: Vec<_> = aggregate_by_antenna(measurements, array)
        .into_iter()
        .filter(|o| o.position.is_some())
        .collect();
    if observations.len() < MULTILATERATION_MIN_ANTENNAS {
        return Err(AlgorithmError::InsufficientMeasurements {
            required: MULTILATERATION_MIN_ANTENNAS,
            available: observations.len(),
        });
    }
    let measurements_used: usize = observations.iter().map(|o| o.samples).sum();

    // Slant ranges and weights
    let mut slant = Vec::with_capacity(observations.len());
    for obs in &observations {
        let position = obs.position.unwrap_or_default();
        let range = params.path_loss.rssi_to_distance(obs.rssi_dbm, obs.frequency_hz)?;
        let sigma_db = params.shadowing_std_db / (obs.quality() * obs.samples as f64).sqrt();
        let slope = params.path_loss.slope_db_per_decade(obs.frequency_hz);
        let sigma_m = (range * sigma_db * LN_10 / slope).max(MIN_RANGE_SIGMA_M);
        slant.push((position, range, 1.0 / (sigma_m * sigma_m)));
    }

    let total_weight: f64 = slant.iter().map(|(_, _, w)| w).sum();
    let centre = [
        slant.iter().map(|(p, _, w)| w * p.x).sum::<f64>() / total_weight,
        slant.iter().map(|(p, _, w)| w * p.y).sum::<f64>() / total_weight,
    ];
    let height = slant.iter().map(|(p, _, w)| w * p.z).sum::<f64>() / total_weight;

    let ranges: Vec<Range> = slant
        .iter()
        .map(|(p, r, w)| {
            let dz = p.z - height;
            Range {
                anchor: [p.x - centre[0], p.y - centre[1]],
                range: (r * r - dz * dz).max(0.0).sqrt(),
                weight: *w,
            }
        })
        .collect();

    let (mut u, linear_rank) = linear_solution(&ranges, total_weight);
    let mut degenerate = linear_rank < 2;

    let mut iterations = 0;
    for _ in 0..params.max_iterations {
        let (normal, gradient, _) = normal_equations(&ranges, &u);
        let (inverse, _) = pseudo_inverse(&normal);
        let mut step = matvec(&inverse, &gradient);
        if !(step[0].is_finite() && step[1].is_finite()) {
            return Err(AlgorithmError::NumericalFailure {
                reason: "Gauss-Newton step is not finite",
            });
        }

        let current = cost(&ranges, &u);
        let mut accepted = false;
        for _ in 0..MAX_STEP_HALVINGS {
            let candidate = [u[0] + step[0], u[1] + step[1]];
            if cost(&ranges, &candidate) <= current {
                u = candidate;
                accepted = true;
                break;
            }
            step = [step[0] * 0.5, step[1] * 0.5];
        }
        iterations += 1;

        let step_len = step[0].hypot(step[1]);
        trace!("multilateration iteration {}: step {:.6} m", iterations, step_len);
        if !accepted || step_len < params.convergence_threshold_m {
            break;
        }
    }

    let (normal, _, chi_squared) = normal_equations(&ranges, &u);
    let (information_inverse, rank) = pseudo_inverse(&normal);
    degenerate |= rank < 2;

    let n = ranges.len();
    let dof = n.saturating_sub(2).max(1) as f64;
    let reduced_chi_squared = chi_squared / dof;
    let inflation = reduced_chi_squared.max(1.0);
    let covariance = Covariance2::new(
        information_inverse[0][0] * inflation,
        information_inverse[0][1] * inflation,
        information_inverse[1][1] * inflation,
    );

    let gdop = geometric_dilution(&ranges, &u);
    let residual_rms_m = (ranges
        .iter()
        .map(|r| (r.range - distance(&u, &r.anchor)).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();

    let position = Point3::new(u[0] + centre[0], u[1] + centre[1], height);
    if !(position.is_finite() && covariance.is_finite()) {
        return Err(AlgorithmError::NumericalFailure {
            reason: "solution is not finite",
        });
    }

    let uncertainty = covariance.horizontal_accuracy();
    if uncertainty > params.max_position_error_m {
        return Err(AlgorithmError::ExcessiveUncertainty {
            uncertainty,
            limit: params.max_position_error_m,
        });
    }

    debug!(
        "multilateration: ({:.2}, {:.2}) ±{:.2} m from {} antennas, gdop {:.3}, chi2_red {:.3}{}",
        position.x,
        position.y,
        uncertainty,
        n,
        gdop,
        reduced_chi_squared,
        if degenerate { ", degenerate" } else { "" }
    );

    Ok(PositionFix {
        position,
        covariance,
        residual_rms_m,
        reduced_chi_squared,
        gdop,
        degenerate,
        antennas_used: n,
        measurements_used,
        iterations,
    })
}

/// Closed-form solution of the linearised range equations
///
/// `2 qᵢ·u = ‖qᵢ‖² - mean‖q‖² - rᵢ² + mean r²`, weighted means, centred
/// anchors. Returns the minimum-norm solution and the system's rank.
fn linear_solution(ranges: &[Range], total_weight: f64) -> (Vector<2>, usize) {
    let mean_q2 = ranges
        .iter()
        .map(|r| r.weight * norm_squared(&r.anchor))
        .sum::<f64>()
        / total_weight;
    let mean_r2 = ranges.iter().map(|r| r.weight * r.range * r.range).sum::<f64>() / total_weight;

    let mut normal: Matrix2 = [[0.0; 2]; 2];
    let mut rhs = [0.0; 2];
    for r in ranges {
        let row = [2.0 * r.anchor[0], 2.0 * r.anchor[1]];
        let b = norm_squared(&r.anchor) - mean_q2 - r.range * r.range + mean_r2;
        add_outer(&mut normal, &row, r.weight);
        rhs[0] += r.weight * row[0] * b;
        rhs[1] += r.weight * row[1] * b;
    }

    let (inverse, rank) = pseudo_inverse(&normal);
    (matvec(&inverse, &rhs), rank)
}

/// `JᵀWJ`, `JᵀW f` and `Σ w f²` at `u`
fn normal_equations(ranges: &[Range], u: &Vector<2>) -> (Matrix2, Vector<2>, f64) {
    let mut normal: Matrix2 = [[0.0; 2]; 2];
    let mut gradient = [0.0; 2];
    let mut chi_squared = 0.0;
    for r in ranges {
        let d = distance(u, &r.anchor);
        let residual = r.range - d;
        chi_squared += r.weight * residual * residual;
        if d < f64::EPSILON {
            continue;
        }
        let j = [(u[0] - r.anchor[0]) / d, (u[1] - r.anchor[1]) / d];
        add_outer(&mut normal, &j, r.weight);
        gradient[0] += r.weight * j[0] * residual;
        gradient[1] += r.weight * j[1] * residual;
    }
    (normal, gradient, chi_squared)
}

/// √trace((JᵀJ)⁺) with unit-vector rows
fn geometric_dilution(ranges: &[Range], u: &Vector<2>) -> f64 {
    let mut geometry: Matrix2 = [[0.0; 2]; 2];
    for r in ranges {
        let d = distance(u, &r.anchor);
        if d < f64::EPSILON {
            continue;
        }
        let j = [(u[0] - r.anchor[0]) / d, (u[1] - r.anchor[1]) / d];
        add_outer(&mut geometry, &j, 1.0);
    }
    let (inverse, rank) = pseudo_inverse(&geometry);
    if rank == 0 {
        return f64::INFINITY;
    }
    trace(&inverse).sqrt()
}

fn cost(ranges: &[Range], u: &Vector<2>) -> f64 {
    ranges
        .iter()
        .map(|r| r.weight * (r.range - distance(u, &r.anchor)).powi(2))
        .sum()
}

fn distance(a: &Vector<2>, b: &Vector<2>) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn norm_squared(v: &Vector<2>) -> f64 {
    v[0] * v[0] + v[1] * v[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AntennaDescriptor;

    const FREQ: f64 = 2.4e9;

    fn synth(array: &AntennaArray, target: Point3, params: &MultilaterationParams) -> Vec<Measurement> {
        array
            .antennas
            .iter()
            .map(|a| {
                let p = array.local_position(&a.id).unwrap();
                let rssi = params.path_loss.distance_to_rssi(p.distance(&target), FREQ).unwrap();
                Measurement::new(a.id.clone(), 1, rssi, FREQ)
            })
            .collect()
    }

    fn triangle() -> AntennaArray {
        AntennaArray::new(vec![
            AntennaDescriptor::at("a", 0.0, 0.0, 0.0),
            AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
            AntennaDescriptor::at("c", 5.0, 10.0, 0.0),
        ])
    }

    #[test]
    fn recovers_noise_free_position() {
        let params = MultilaterationParams::default();
        let array = triangle();
        let target = Point3::planar(5.0, 3.0);
        let fix = estimate_position(&synth(&array, target, &params), &array, &params).unwrap();

        assert!(fix.position.distance_2d(&target) < 1e-6);
        assert!(!fix.degenerate);
        assert!(fix.residual_rms_m < 1e-6);
        assert_eq!(fix.antennas_used, 3);
        assert!(fix.confidence().as_float() > 0.8);
        // ideal layout for three antennas has GDOP 2/√3
        assert!((fix.gdop - 2.0 / 3f64.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn needs_three_positioned_antennas() {
        let params = MultilaterationParams::default();
        let mut array = triangle();
        array.antennas[2].position = None;
        let batch = synth(&triangle(), Point3::planar(5.0, 3.0), &params);
        assert_eq!(
            estimate_position(&batch, &array, &params),
            Err(AlgorithmError::InsufficientMeasurements { required: 3, available: 2 })
        );
    }

    #[test]
    fn repeated_readings_count_once() {
        let params = MultilaterationParams::default();
        let array = triangle();
        let mut batch = synth(&array, Point3::planar(5.0, 3.0), &params);
        batch.truncate(2);
        batch.extend(batch.clone());
        assert!(matches!(
            estimate_position(&batch, &array, &params),
            Err(AlgorithmError::InsufficientMeasurements { available: 2, .. })
        ));
    }

    #[test]
    fn collinear_antennas_give_minimum_norm_solution() {
        let params = MultilaterationParams::default().with_max_position_error(1e6);
        let array = AntennaArray::new(vec![
            AntennaDescriptor::at("a", 0.0, 0.0, 0.0),
            AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
            AntennaDescriptor::at("c", 20.0, 0.0, 0.0),
        ]);
        let target = Point3::planar(7.0, 0.0);
        let fix = estimate_position(&synth(&array, target, &params), &array, &params).unwrap();
        assert!(fix.degenerate);
        assert!((fix.position.x - 7.0).abs() < 1e-6);
        assert!(fix.position.y.abs() < 1e-9);

        let non_degenerate = estimate_position(
            &synth(&triangle(), Point3::planar(5.0, 3.0), &params),
            &triangle(),
            &params,
        )
        .unwrap();
        assert!(fix.confidence() < non_degenerate.confidence());
    }

    #[test]
    fn excessive_uncertainty_rejected() {
        let params = MultilaterationParams::default().with_max_position_error(0.5);
        let array = triangle();
        let batch = synth(&array, Point3::planar(5.0, 3.0), &params);
        assert!(matches!(
            estimate_position(&batch, &array, &params),
            Err(AlgorithmError::ExcessiveUncertainty { limit, .. }) if limit == 0.5
        ));
    }

    #[test]
    fn invalid_model_aborts() {
        let params = MultilaterationParams::default().with_path_loss(
            PathLossParams::default().with_environment_factor(99.0),
        );
        let array = triangle();
        let batch = synth(&array, Point3::planar(5.0, 3.0), &MultilaterationParams::default());
        assert!(matches!(
            estimate_position(&batch, &array, &params),
            Err(AlgorithmError::InvalidModelParameters { .. })
        ));
    }

    #[test]
    fn estimate_carries_counts_and_tag() {
        let params = MultilaterationParams::default();
        let array = triangle();
        let fix = estimate_position(&synth(&array, Point3::planar(4.0, 4.0), &params), &array, &params)
            .unwrap();
        let estimate = fix.to_estimate(2000);
        assert_eq!(estimate.algorithm, NAME);
        assert_eq!(estimate.antenna_count, 3);
        assert_eq!(estimate.measurement_count, 3);
        assert!(estimate.is_success());
    }
}
