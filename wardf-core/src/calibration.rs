//! Calibration Store
//!
//! ## Overview
//!
//! Per-antenna corrections compensating for hardware gain and offset variance.
//! A profile corrects the reported RSSI linearly:
//!
//! ```text
//! corrected_dbm = raw_dbm × gain_correction + offset_db
//! ```
//!
//! and rotates the antenna's boresight by `orientation_deg`.
//!
//! ## Validity Intervals
//!
//! Each profile is valid over `[valid_from, valid_until)`; an open-ended
//! profile has no `valid_until`. The store keeps exactly one active profile per
//! antenna at any timestamp:
//!
//! ```text
//! time ─────────────────────────────────────────────►
//!       [ profile A ─────────── )[ profile B ──────► (open)
//!                                ▲
//!                  insert(B) closes A at B.valid_from
//! ```
//!
//! Overlapping closed intervals are rejected and the store is left unchanged.
//!
//! ## Calibration Routine
//!
//! A [`CalibrationSession`] collects raw readings from one antenna while a
//! reference emitter of known received level is active, then derives the
//! offset that maps the mean reading onto the expected level.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::defaults::MIN_CALIBRATION_SAMPLES;
use crate::errors::CalibrationError;
use crate::time::Timestamp;
use crate::types::{AntennaArray, AntennaId, Measurement};

/// Largest accepted gain correction
pub const MAX_GAIN_CORRECTION: f64 = 4.0;

/// Correction applied to one antenna's raw measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Antenna the profile applies to
    pub antenna_id: AntennaId,
    /// Additive correction (dB)
    pub offset_db: f64,
    /// Linear slope applied to the raw dBm value, `(0, 4]`
    #[serde(default = "default_gain_correction")]
    pub gain_correction: f64,
    /// Boresight correction (degrees)
    #[serde(default)]
    pub orientation_deg: f64,
    /// First timestamp the profile applies to
    pub valid_from: Timestamp,
    /// First timestamp the profile no longer applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<Timestamp>,
}

fn default_gain_correction() -> f64 {
    1.0
}

impl CalibrationProfile {
    /// Open-ended offset-only profile
    pub fn new(antenna_id: impl Into<AntennaId>, offset_db: f64, valid_from: Timestamp) -> Self {
        Self {
            antenna_id: antenna_id.into(),
            offset_db,
            gain_correction: 1.0,
            orientation_deg: 0.0,
            valid_from,
            valid_until: None,
        }
    }

    /// Set gain correction
    pub fn with_gain_correction(mut self, gain_correction: f64) -> Self {
        self.gain_correction = gain_correction;
        self
    }

    /// Set boresight correction
    pub fn with_orientation(mut self, orientation_deg: f64) -> Self {
        self.orientation_deg = orientation_deg;
        self
    }

    /// Close the interval
    pub fn with_valid_until(mut self, valid_until: Timestamp) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Check value ranges and the interval
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.antenna_id.trim().is_empty() {
            return Err(CalibrationError::InvalidProfile { reason: "empty antenna id" });
        }
        if !self.offset_db.is_finite() {
            return Err(CalibrationError::InvalidProfile { reason: "offset is not finite" });
        }
        if !(self.gain_correction > 0.0 && self.gain_correction <= MAX_GAIN_CORRECTION) {
            return Err(CalibrationError::InvalidProfile {
                reason: "gain correction outside (0, 4]",
            });
        }
        if !self.orientation_deg.is_finite() {
            return Err(CalibrationError::InvalidProfile { reason: "orientation is not finite" });
        }
        if matches!(self.valid_until, Some(until) if until <= self.valid_from) {
            return Err(CalibrationError::InvalidProfile { reason: "empty validity interval" });
        }
        Ok(())
    }

    /// Whether the profile applies at `timestamp`
    pub fn is_active_at(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.valid_from && self.valid_until.map_or(true, |until| timestamp < until)
    }

    /// Corrected RSSI
    pub fn correct_rssi(&self, raw_dbm: f64) -> f64 {
        raw_dbm * self.gain_correction + self.offset_db
    }

    fn overlaps(&self, other: &CalibrationProfile) -> bool {
        let self_end = self.valid_until.unwrap_or(Timestamp::MAX);
        let other_end = other.valid_until.unwrap_or(Timestamp::MAX);
        self.valid_from < other_end && other.valid_from < self_end
    }
}

/// Profiles for every antenna, ordered by `valid_from`
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    profiles: HashMap<AntennaId, Vec<CalibrationProfile>>,
}

impl CalibrationStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile, closing the antenna's open-ended profile if needed
    ///
    /// Fails without modifying the store when the profile is invalid or its
    /// interval overlaps a closed interval.
    pub fn insert(&mut self, profile: CalibrationProfile) -> Result<(), CalibrationError> {
        profile.validate()?;

        let existing = self.profiles.get(&profile.antenna_id);
        let mut candidate: Vec<CalibrationProfile> = existing.cloned().unwrap_or_default();

        if let Some(last) = candidate.last_mut() {
            if last.valid_until.is_none() && last.valid_from < profile.valid_from {
                last.valid_until = Some(profile.valid_from);
            }
        }

        if candidate.iter().any(|p| p.overlaps(&profile)) {
            return Err(CalibrationError::Overlap {
                antenna: profile.antenna_id.clone(),
                valid_from: profile.valid_from,
            });
        }

        debug!(
            "Calibration profile for {} from {}: offset {:.2} dB, gain {:.3}",
            profile.antenna_id, profile.valid_from, profile.offset_db, profile.gain_correction
        );

        let antenna = profile.antenna_id.clone();
        let at = candidate.partition_point(|p| p.valid_from < profile.valid_from);
        candidate.insert(at, profile);
        self.profiles.insert(antenna, candidate);
        Ok(())
    }

    /// Bulk insert in `valid_from` order, e.g. from the persistence collaborator
    ///
    /// Returns the number of profiles loaded; stops at the first rejected one.
    pub fn load(
        &mut self,
        profiles: impl IntoIterator<Item = CalibrationProfile>,
    ) -> Result<usize, CalibrationError> {
        let mut sorted: Vec<_> = profiles.into_iter().collect();
        sorted.sort_by_key(|p| p.valid_from);
        let count = sorted.len();
        for profile in sorted {
            self.insert(profile)?;
        }
        Ok(count)
    }

    /// Profile active for `antenna_id` at `timestamp`
    pub fn active(&self, antenna_id: &str, timestamp: Timestamp) -> Option<&CalibrationProfile> {
        self.profiles
            .get(antenna_id)?
            .iter()
            .rev()
            .find(|p| p.is_active_at(timestamp))
    }

    /// Corrected copy of `measurement` (identity when no profile is active)
    pub fn apply(&self, measurement: &Measurement) -> Measurement {
        match self.active(&measurement.antenna_id, measurement.timestamp) {
            Some(profile) => measurement.with_rssi(profile.correct_rssi(measurement.rssi_dbm)),
            None => measurement.clone(),
        }
    }

    /// Copy of `array` with boresights rotated by the profiles active at `timestamp`
    pub fn oriented_array(&self, array: &AntennaArray, timestamp: Timestamp) -> AntennaArray {
        let mut oriented = array.clone();
        for antenna in &mut oriented.antennas {
            if let (Some(boresight), Some(profile)) =
                (antenna.boresight_deg, self.active(&antenna.id, timestamp))
            {
                antenna.boresight_deg = Some(boresight + profile.orientation_deg);
            }
        }
        oriented
    }

    /// All profiles of one antenna, ordered by `valid_from`
    pub fn profiles(&self, antenna_id: &str) -> &[CalibrationProfile] {
        self.profiles.get(antenna_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Antennas with at least one profile
    pub fn antennas(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Total number of profiles
    pub fn len(&self) -> usize {
        self.profiles.values().map(Vec::len).sum()
    }

    /// No profiles stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw readings collected for one antenna during calibration
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSession {
    antenna_id: AntennaId,
    expected_rssi_dbm: f64,
    started_at: Timestamp,
    samples: Vec<f64>,
}

impl CalibrationSession {
    /// Start collecting for `antenna_id` against a reference level
    pub fn new(antenna_id: impl Into<AntennaId>, expected_rssi_dbm: f64, started_at: Timestamp) -> Self {
        Self {
            antenna_id: antenna_id.into(),
            expected_rssi_dbm,
            started_at,
            samples: Vec::new(),
        }
    }

    /// Antenna being calibrated
    pub fn antenna_id(&self) -> &str {
        &self.antenna_id
    }

    /// Reference level
    pub fn expected_rssi_dbm(&self) -> f64 {
        self.expected_rssi_dbm
    }

    /// Session start time
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Record a raw reading; readings from other antennas are ignored
    ///
    /// Returns whether the reading was kept.
    pub fn record(&mut self, measurement: &Measurement) -> bool {
        if measurement.antenna_id != self.antenna_id || !measurement.rssi_dbm.is_finite() {
            return false;
        }
        self.samples.push(measurement.rssi_dbm);
        true
    }

    /// Readings collected so far
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Derive the new profile
    ///
    /// Gain correction and orientation carry over from `previous`; the offset
    /// maps the mean corrected reading onto the expected level.
    pub fn finish(
        &self,
        previous: Option<&CalibrationProfile>,
        valid_from: Timestamp,
    ) -> Result<CalibrationProfile, CalibrationError> {
        if self.samples.len() < MIN_CALIBRATION_SAMPLES {
            return Err(CalibrationError::InsufficientSamples {
                required: MIN_CALIBRATION_SAMPLES,
                available: self.samples.len(),
            });
        }
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let gain = previous.map_or(1.0, |p| p.gain_correction);
        let orientation = previous.map_or(0.0, |p| p.orientation_deg);

        let profile = CalibrationProfile::new(
            self.antenna_id.clone(),
            self.expected_rssi_dbm - gain * mean,
            valid_from,
        )
        .with_gain_correction(gain)
        .with_orientation(orientation);
        profile.validate()?;
        Ok(profile)
    }
}
