//! Antenna descriptors and arrays
//!
//! Positions may be given in a local metric frame or as geodetic coordinates.
//! Algorithms always work in the local east/north/up frame; geodetic positions
//! are projected around the array origin:
//!
//! ```text
//! east  = R · Δlon · cos(lat₀)
//! north = R · Δlat
//! up    = alt - alt₀
//! ```
//!
//! The equirectangular projection is accurate to well under a metre over the
//! few hundred metres an array spans.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::radio::EARTH_RADIUS_M;
use crate::errors::ArrayError;

/// Antenna identifier, unique within an array
pub type AntennaId = String;

/// Point in the local metric frame (metres, x = east, y = north, z = up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    /// East
    pub x: f64,
    /// North
    pub y: f64,
    /// Up
    #[serde(default)]
    pub z: f64,
}

impl Point3 {
    /// Create a point
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the ground plane
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Horizontal distance
    pub fn distance_2d(&self, other: &Point3) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point3) -> f64 {
        let dz = self.z - other.z;
        (self.distance_2d(other).powi(2) + dz * dz).sqrt()
    }

    /// All coordinates finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// WGS-84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude (degrees)
    pub lat: f64,
    /// Longitude (degrees)
    pub lon: f64,
    /// Altitude (metres)
    #[serde(default)]
    pub alt: f64,
}

impl GeoPoint {
    /// Create a coordinate
    pub const fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    /// Project into the local frame centred on `origin`
    pub fn to_local(&self, origin: &GeoPoint) -> Point3 {
        let lat0 = origin.lat.to_radians();
        Point3 {
            x: EARTH_RADIUS_M * (self.lon - origin.lon).to_radians() * lat0.cos(),
            y: EARTH_RADIUS_M * (self.lat - origin.lat).to_radians(),
            z: self.alt - origin.alt,
        }
    }

    /// Inverse of [`GeoPoint::to_local`]
    pub fn from_local(point: &Point3, origin: &GeoPoint) -> GeoPoint {
        let lat0 = origin.lat.to_radians();
        GeoPoint {
            lat: origin.lat + (point.y / EARTH_RADIUS_M).to_degrees(),
            lon: origin.lon + (point.x / (EARTH_RADIUS_M * lat0.cos())).to_degrees(),
            alt: origin.alt + point.z,
        }
    }
}

/// Where an antenna is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum AntennaPosition {
    /// Local metric frame
    Local {
        /// East (m)
        x: f64,
        /// North (m)
        y: f64,
        /// Up (m)
        #[serde(default)]
        z: f64,
    },
    /// Geodetic, projected around the array origin
    Geodetic {
        /// Latitude (degrees)
        lat: f64,
        /// Longitude (degrees)
        lon: f64,
        /// Altitude (m)
        #[serde(default)]
        alt: f64,
    },
}

impl AntennaPosition {
    fn is_finite(&self) -> bool {
        match *self {
            AntennaPosition::Local { x, y, z } => Point3::new(x, y, z).is_finite(),
            AntennaPosition::Geodetic { lat, lon, alt } => {
                lat.is_finite() && lon.is_finite() && alt.is_finite()
            }
        }
    }
}

/// Antenna polarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarization {
    /// Linear (vertical or horizontal)
    #[default]
    Linear,
    /// Circular
    Circular,
    /// Dual-polarized
    Dual,
}

/// Physical or logical antenna in an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaDescriptor {
    /// Unique id within the array
    pub id: AntennaId,
    /// Required by position-class algorithms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<AntennaPosition>,
    /// Polarization
    #[serde(default)]
    pub polarization: Polarization,
    /// Antenna gain (dBi)
    #[serde(default)]
    pub gain_dbi: f64,
    /// Azimuth of maximum gain, degrees clockwise from north
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boresight_deg: Option<f64>,
}

impl AntennaDescriptor {
    /// Descriptor without position
    pub fn new(id: impl Into<AntennaId>) -> Self {
        Self {
            id: id.into(),
            position: None,
            polarization: Polarization::Linear,
            gain_dbi: 0.0,
            boresight_deg: None,
        }
    }

    /// Descriptor at a local position (metres)
    pub fn at(id: impl Into<AntennaId>, x: f64, y: f64, z: f64) -> Self {
        Self::new(id).with_position(AntennaPosition::Local { x, y, z })
    }

    /// Set position
    pub fn with_position(mut self, position: AntennaPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Set polarization
    pub fn with_polarization(mut self, polarization: Polarization) -> Self {
        self.polarization = polarization;
        self
    }

    /// Set gain
    pub fn with_gain(mut self, gain_dbi: f64) -> Self {
        self.gain_dbi = gain_dbi;
        self
    }

    /// Set boresight azimuth
    pub fn with_boresight(mut self, boresight_deg: f64) -> Self {
        self.boresight_deg = Some(boresight_deg);
        self
    }
}

/// A set of antennas used jointly for direction finding
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AntennaArray {
    /// Descriptors, ids unique
    pub antennas: Vec<AntennaDescriptor>,
    /// Geodetic anchor of the local frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<GeoPoint>,
}

impl AntennaArray {
    /// Array from descriptors
    pub fn new(antennas: Vec<AntennaDescriptor>) -> Self {
        Self {
            antennas,
            origin: None,
        }
    }

    /// Set the geodetic origin
    pub fn with_origin(mut self, origin: GeoPoint) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Check ids, coordinates and origin
    pub fn validate(&self) -> Result<(), ArrayError> {
        let mut seen = HashSet::new();
        for antenna in &self.antennas {
            if antenna.id.trim().is_empty() {
                return Err(ArrayError::EmptyId);
            }
            if !seen.insert(antenna.id.as_str()) {
                return Err(ArrayError::DuplicateId(antenna.id.clone()));
            }
            let finite = antenna.gain_dbi.is_finite()
                && antenna.boresight_deg.map_or(true, f64::is_finite)
                && antenna.position.map_or(true, |p| p.is_finite());
            if !finite {
                return Err(ArrayError::NonFinite(antenna.id.clone()));
            }
            if matches!(antenna.position, Some(AntennaPosition::Geodetic { .. }))
                && self.origin.is_none()
            {
                return Err(ArrayError::MissingOrigin(antenna.id.clone()));
            }
        }
        Ok(())
    }

    /// Look up a descriptor
    pub fn get(&self, id: &str) -> Option<&AntennaDescriptor> {
        self.antennas.iter().find(|a| a.id == id)
    }

    /// Whether `id` is part of the array
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Antenna ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.antennas.iter().map(|a| a.id.as_str())
    }

    /// Number of antennas
    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    /// No antennas
    pub fn is_empty(&self) -> bool {
        self.antennas.is_empty()
    }

    /// Position of `id` in the local frame
    ///
    /// `None` when the antenna is unknown, has no position, or is geodetic
    /// without an array origin.
    pub fn local_position(&self, id: &str) -> Option<Point3> {
        match self.get(id)?.position? {
            AntennaPosition::Local { x, y, z } => Some(Point3::new(x, y, z)),
            AntennaPosition::Geodetic { lat, lon, alt } => {
                let origin = self.origin?;
                Some(GeoPoint::new(lat, lon, alt).to_local(&origin))
            }
        }
    }

    /// Antennas that resolve to a local position
    pub fn positioned_count(&self) -> usize {
        self.antennas
            .iter()
            .filter(|a| self.local_position(&a.id).is_some())
            .count()
    }

    /// Antennas with a boresight
    pub fn directional_count(&self) -> usize {
        self.antennas.iter().filter(|a| a.boresight_deg.is_some()).count()
    }
}
