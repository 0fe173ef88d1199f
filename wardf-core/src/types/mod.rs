//! Data Model for Direction Finding
//!
//! ## Module Organization
//!
//! - [`measurement`] - one signal reading from one antenna at one instant
//! - [`antenna`] - antenna descriptors, arrays and the local coordinate frame
//! - [`estimate`] - position/bearing estimates, status and quality grades
//!
//! ## Ownership
//!
//! `Measurement`s are immutable once created and consumed by one estimation
//! window. `Estimate`s are immutable once emitted; smoothing produces a new
//! estimate instead of editing the previous one.

pub mod antenna;
pub mod estimate;
pub mod measurement;

pub use antenna::{
    AntennaArray, AntennaDescriptor, AntennaId, AntennaPosition, GeoPoint, Point3, Polarization,
};
pub use estimate::{Covariance2, Estimate, EstimateKind, EstimateStatus, Quality};
pub use measurement::{Measurement, Protocol};
