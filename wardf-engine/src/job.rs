//! One estimation computation on a frozen batch
//!
//! The job owns everything it reads, so the runtime can move it onto a
//! blocking thread while the cycle task keeps draining the channel. The
//! algorithm is picked by a single match over [`AlgorithmKind`].
//!
//! A closed window yields one job per emitter; [`run_jobs`] runs them back
//! to back so a window is still a single in-flight computation.

use std::time::{Duration, Instant};

use log::{debug, warn};

use wardf_core::algorithms::{estimate_bearing, estimate_centroid, estimate_position};
use wardf_core::{AlgorithmError, AlgorithmResult, AntennaArray, Estimate, Measurement, Timestamp};

use crate::config::AlgorithmKind;

/// Run `kind` on `batch`
pub fn run_algorithm(
    kind: &AlgorithmKind,
    batch: &[Measurement],
    array: &AntennaArray,
    timestamp: Timestamp,
) -> AlgorithmResult<Estimate> {
    match kind {
        AlgorithmKind::Multilateration(params) => {
            estimate_position(batch, array, params).map(|fix| fix.to_estimate(timestamp))
        }
        AlgorithmKind::AmplitudeBearing(params) => {
            estimate_bearing(batch, array, params).map(|fix| fix.to_estimate(timestamp))
        }
        AlgorithmKind::WeightedCentroid(params) => {
            estimate_centroid(batch, array, params).map(|fix| fix.to_estimate(timestamp))
        }
    }
}

/// Run every job of one window in order
pub fn run_jobs(jobs: Vec<EstimationJob>) -> Vec<JobOutcome> {
    jobs.into_iter().map(EstimationJob::run).collect()
}

/// Frozen batch plus the configuration slice it is computed with
#[derive(Debug, Clone)]
pub struct EstimationJob {
    /// Calibrated, filtered measurements of the closed window
    pub batch: Vec<Measurement>,
    /// Array with calibrated orientations
    pub array: AntennaArray,
    /// Primary algorithm
    pub algorithm: AlgorithmKind,
    /// Tried once if the primary fails
    pub fallback: Option<AlgorithmKind>,
    /// Emitter the batch belongs to
    pub target: Option<String>,
    /// Window close time, stamped on the estimate
    pub timestamp: Timestamp,
}

/// What a job produced
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Estimate, or the last algorithm error
    pub result: AlgorithmResult<Estimate>,
    /// Algorithm whose result this is
    pub algorithm: &'static str,
    /// Emitter the result belongs to
    pub target: Option<String>,
    /// Wall time spent computing
    pub elapsed: Duration,
}

impl EstimationJob {
    /// Compute; on failure retry the same batch once with the fallback
    pub fn run(self) -> JobOutcome {
        let started = Instant::now();
        let mut algorithm = self.algorithm.name();
        let mut result = self.attempt(&self.algorithm);

        if let (Err(e), Some(fallback)) = (&result, &self.fallback) {
            warn!("{} failed ({}), trying {}", algorithm, e, fallback.name());
            algorithm = fallback.name();
            result = self.attempt(fallback);
        }

        let elapsed = started.elapsed();
        debug!(
            "{} on {} measurements took {:?}",
            algorithm,
            self.batch.len(),
            elapsed
        );
        JobOutcome {
            result,
            algorithm,
            target: self.target,
            elapsed,
        }
    }

    fn attempt(&self, kind: &AlgorithmKind) -> Result<Estimate, AlgorithmError> {
        run_algorithm(kind, &self.batch, &self.array, self.timestamp)
            .map(|estimate| estimate.with_target(self.target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardf_core::algorithms::{CentroidParams, MultilaterationParams, PathLossParams};
    use wardf_core::{AntennaDescriptor, Point3};

    fn line_array() -> AntennaArray {
        AntennaArray::new(vec![
            AntennaDescriptor::at("a", 0.0, 0.0, 0.0),
            AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
        ])
    }

    fn reading(id: &str, x: f64, target: Point3) -> Measurement {
        let rssi = PathLossParams::default()
            .distance_to_rssi(Point3::planar(x, 0.0).distance(&target), 2.4e9)
            .unwrap();
        Measurement::new(id, 10, rssi, 2.4e9)
    }

    fn job(fallback: Option<AlgorithmKind>) -> EstimationJob {
        let target = Point3::planar(3.0, 4.0);
        EstimationJob {
            batch: vec![reading("a", 0.0, target), reading("b", 10.0, target)],
            array: line_array(),
            algorithm: AlgorithmKind::Multilateration(MultilaterationParams::default()),
            fallback,
            target: Some("aa:bb".into()),
            timestamp: 500,
        }
    }

    #[test]
    fn primary_failure_is_reported() {
        let outcome = job(None).run();
        assert_eq!(outcome.algorithm, "multilateration");
        assert!(outcome.result.unwrap_err().is_insufficient_data());
    }

    #[test]
    fn fallback_reuses_the_batch() {
        let outcome = job(Some(AlgorithmKind::WeightedCentroid(CentroidParams::default()))).run();
        assert_eq!(outcome.algorithm, "weighted_centroid");
        assert_eq!(outcome.target.as_deref(), Some("aa:bb"));
        let estimate = outcome.result.unwrap();
        assert_eq!(estimate.timestamp, 500);
        assert_eq!(estimate.target.as_deref(), Some("aa:bb"));
        assert_eq!(estimate.antenna_count, 2);
    }
}
