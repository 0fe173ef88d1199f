//! Signal Algorithms
//!
//! Pure numeric transforms from measurements to geometric estimates. Nothing
//! here keeps state between calls except [`smoothing::EstimateSmoother`],
//! whose previous estimates are owned by the caller.
//!
//! ## Module Organization
//!
//! - [`path_loss`] - RSSI ↔ distance models and exponent calibration
//! - [`multilateration`] - weighted least-squares position solver
//! - [`bearing`] - amplitude-comparison bearing from directional antennas
//! - [`centroid`] - range-weighted centroid of antenna positions
//! - [`mapping`] - inverse-distance-weighted signal strength grid
//! - [`smoothing`] - exponential blending of successive estimates
//! - [`linalg`] - 2x2 symmetric helpers used by the solvers
//!
//! ## Per-antenna aggregation
//!
//! Each antenna contributes one observation per window: the mean of its
//! readings. Counting distinct antennas (not raw readings) is what makes the
//! structural minimum of each algorithm meaningful.

pub mod bearing;
pub mod centroid;
pub mod linalg;
pub mod mapping;
pub mod multilateration;
pub mod path_loss;
pub mod smoothing;

use std::collections::BTreeMap;

use crate::types::{AntennaArray, AntennaId, Measurement, Point3};
use crate::types::measurement::snr_quality;

pub use bearing::{estimate_bearing, BearingFix, BearingParams};
pub use centroid::{estimate_centroid, CentroidFix, CentroidParams};
pub use mapping::{interpolate_grid, CellValue, GridCell, GridSpec, SignalGrid, SignalSample};
pub use multilateration::{estimate_position, MultilaterationParams, PositionFix};
pub use path_loss::{fit_path_loss_exponent, PathLossFit, PathLossModel, PathLossParams};
pub use smoothing::{smooth, EstimateSmoother, SmoothingParams};

/// One antenna's readings within a window, averaged
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaObservation {
    /// Antenna id
    pub antenna_id: AntennaId,
    /// Local position, if the array knows it
    pub position: Option<Point3>,
    /// Boresight azimuth, if directional
    pub boresight_deg: Option<f64>,
    /// Mean RSSI (dBm)
    pub rssi_dbm: f64,
    /// Mean frequency (Hz)
    pub frequency_hz: f64,
    /// Mean SNR over readings that reported one
    pub snr_db: Option<f64>,
    /// Readings averaged
    pub samples: usize,
}

impl AntennaObservation {
    /// Quality factor in `[0.1, 1]` from SNR
    pub fn quality(&self) -> f64 {
        snr_quality(self.snr_db)
    }
}

#[derive(Default)]
struct Accumulator {
    rssi: f64,
    frequency: f64,
    snr: f64,
    snr_samples: usize,
    samples: usize,
}

/// Average each antenna's readings
///
/// Readings from antennas the array does not know, or with non-finite
/// values, are skipped. Output is ordered by antenna id.
pub fn aggregate_by_antenna(measurements: &[Measurement], array: &AntennaArray) -> Vec<AntennaObservation> {
    let mut by_antenna: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for m in measurements {
        if !array.contains(&m.antenna_id) || m.validate().is_err() {
            continue;
        }
        let acc = by_antenna.entry(m.antenna_id.as_str()).or_default();
        acc.rssi += m.rssi_dbm;
        acc.frequency += m.frequency_hz;
        acc.samples += 1;
        if let Some(snr) = m.snr_db {
            acc.snr += snr;
            acc.snr_samples += 1;
        }
    }

    by_antenna
        .into_iter()
        .map(|(id, acc)| {
            let n = acc.samples as f64;
            AntennaObservation {
                antenna_id: id.to_string(),
                position: array.local_position(id),
                boresight_deg: array.get(id).and_then(|a| a.boresight_deg),
                rssi_dbm: acc.rssi / n,
                frequency_hz: acc.frequency / n,
                snr_db: (acc.snr_samples > 0).then(|| acc.snr / acc.snr_samples as f64),
                samples: acc.samples,
            }
        })
        .collect()
}

/// Number of distinct antennas of `array` present in `measurements`
pub fn distinct_antennas(measurements: &[Measurement], array: &AntennaArray) -> usize {
    aggregate_by_antenna(measurements, array).len()
}
