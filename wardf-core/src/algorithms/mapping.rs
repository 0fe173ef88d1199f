//! Signal Strength Mapping
//!
//! Interpolates signal strength over a regular grid with inverse-distance
//! weighting (IDW) from the antennas that heard the emitter:
//!
//! ```text
//! v(c) = Σ wᵢ vᵢ / Σ wᵢ,    wᵢ = 1 / dᵢᵖ,    dᵢ ≤ search_radius
//! ```
//!
//! A cell that coincides with a sample takes the sample's value. A cell with
//! no sample within `search_radius_m` is [`CellValue::Unknown`]; it is never
//! extrapolated.
//!
//! ## Grid Layout
//!
//! ```text
//!  row
//!   2 │ (0,2) (1,2) (2,2)
//!   1 │ (0,1) (1,1) (2,1)
//!   0 │ (0,0) (1,0) (2,0)
//!     └──────────────────── column
//!     origin = centre of (0,0)
//! ```
//!
//! [`SignalGrid::cells`] computes values lazily, row by row. Every call
//! returns a fresh iterator, so the sequence can be walked any number of
//! times.

use serde::{Deserialize, Serialize};

use super::aggregate_by_antenna;
use crate::errors::{AlgorithmError, AlgorithmResult};
use crate::types::{AntennaArray, Measurement, Point3};

/// Grid geometry and interpolation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Centre of cell (0, 0), local frame
    pub origin: Point3,
    /// Cell edge length (m)
    pub cell_size_m: f64,
    /// Cells along x
    pub columns: usize,
    /// Cells along y
    pub rows: usize,
    /// Samples further away than this do not contribute (m)
    pub search_radius_m: f64,
    /// IDW power
    #[serde(default = "default_power")]
    pub power: f64,
}

fn default_power() -> f64 {
    2.0
}

impl GridSpec {
    /// Grid of `columns × rows` cells starting at `origin`
    pub fn new(origin: Point3, cell_size_m: f64, columns: usize, rows: usize) -> Self {
        Self {
            origin,
            cell_size_m,
            columns,
            rows,
            search_radius_m: cell_size_m * columns.max(rows) as f64,
            power: default_power(),
        }
    }

    /// Set the search radius
    pub fn with_search_radius(mut self, search_radius_m: f64) -> Self {
        self.search_radius_m = search_radius_m;
        self
    }

    /// Set the IDW power
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Check geometry
    pub fn validate(&self) -> AlgorithmResult<()> {
        if !(self.cell_size_m.is_finite() && self.cell_size_m > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "cell size must be positive",
            });
        }
        if !(self.search_radius_m.is_finite() && self.search_radius_m > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "search radius must be positive",
            });
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "IDW power must be positive",
            });
        }
        if !self.origin.is_finite() {
            return Err(AlgorithmError::InvalidModelParameters {
                reason: "grid origin is not finite",
            });
        }
        Ok(())
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.columns.saturating_mul(self.rows)
    }

    /// Centre of cell (`column`, `row`)
    pub fn cell_center(&self, column: usize, row: usize) -> Point3 {
        Point3::new(
            self.origin.x + column as f64 * self.cell_size_m,
            self.origin.y + row as f64 * self.cell_size_m,
            self.origin.z,
        )
    }
}

/// Known signal level at a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    /// Where the level was observed
    pub position: Point3,
    /// Observed level (dBm)
    pub rssi_dbm: f64,
}

/// Interpolated value of one cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    /// IDW estimate (dBm)
    Estimated(f64),
    /// No sample within the search radius
    Unknown,
}

impl CellValue {
    /// The estimate, if any
    pub fn value(&self) -> Option<f64> {
        match self {
            CellValue::Estimated(v) => Some(*v),
            CellValue::Unknown => None,
        }
    }
}

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Column index
    pub column: usize,
    /// Row index
    pub row: usize,
    /// Cell centre
    pub center: Point3,
    /// Interpolated value
    pub value: CellValue,
}

/// Samples plus the grid they are interpolated over
#[derive(Debug, Clone, PartialEq)]
pub struct SignalGrid {
    spec: GridSpec,
    samples: Vec<SignalSample>,
}

impl SignalGrid {
    /// Grid over explicit samples; non-finite samples are dropped
    pub fn from_samples(samples: Vec<SignalSample>, spec: GridSpec) -> AlgorithmResult<Self> {
        spec.validate()?;
        let samples = samples
            .into_iter()
            .filter(|s| s.position.is_finite() && s.rssi_dbm.is_finite())
            .collect();
        Ok(Self { spec, samples })
    }

    /// Grid specification
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Samples used for interpolation
    pub fn samples(&self) -> &[SignalSample] {
        &self.samples
    }

    /// IDW value at an arbitrary point
    pub fn value_at(&self, point: &Point3) -> CellValue {
        let (mut weighted, mut total) = (0.0, 0.0);
        for sample in &self.samples {
            let d = sample.position.distance_2d(point);
            if d < 1e-9 {
                return CellValue::Estimated(sample.rssi_dbm);
            }
            if d > self.spec.search_radius_m {
                continue;
            }
            let w = d.powf(-self.spec.power);
            weighted += w * sample.rssi_dbm;
            total += w;
        }
        if total > 0.0 {
            CellValue::Estimated(weighted / total)
        } else {
            CellValue::Unknown
        }
    }

    /// Lazy row-major iterator over all cells
    pub fn cells(&self) -> Cells<'_> {
        Cells { grid: self, next: 0 }
    }
}

impl<'a> IntoIterator for &'a SignalGrid {
    type Item = GridCell;
    type IntoIter = Cells<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells()
    }
}

/// Iterator returned by [`SignalGrid::cells`]
#[derive(Debug, Clone)]
pub struct Cells<'a> {
    grid: &'a SignalGrid,
    next: usize,
}

impl Iterator for Cells<'_> {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        let spec = &self.grid.spec;
        if self.next >= spec.cell_count() {
            return None;
        }
        let (column, row) = (self.next % spec.columns, self.next / spec.columns);
        self.next += 1;
        let center = spec.cell_center(column, row);
        Some(GridCell {
            column,
            row,
            center,
            value: self.grid.value_at(&center),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.spec.cell_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Cells<'_> {}

/// Samples from the mean level of each positioned antenna
pub fn samples_from_measurements(measurements: &[Measurement], array: &AntennaArray) -> Vec<SignalSample> {
    aggregate_by_antenna(measurements, array)
        .into_iter()
        .filter_map(|o| {
            o.position.map(|position| SignalSample {
                position,
                rssi_dbm: o.rssi_dbm,
            })
        })
        .collect()
}

/// Interpolate measurements from positioned antennas over `spec`
pub fn interpolate_grid(
    measurements: &[Measurement],
    array: &AntennaArray,
    spec: &GridSpec,
) -> AlgorithmResult<SignalGrid> {
    SignalGrid::from_samples(samples_from_measurements(measurements, array), spec.clone())
}
