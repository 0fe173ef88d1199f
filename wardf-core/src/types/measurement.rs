//! Signal measurements

use serde::{Deserialize, Serialize};

use crate::constants::defaults::FULL_QUALITY_SNR_DB;
use crate::errors::MeasurementError;
use crate::time::Timestamp;
use crate::types::antenna::AntennaId;

/// Radio protocol the reading was taken on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// 802.11
    Wifi,
    /// Classic or LE
    Bluetooth,
    /// GSM/LTE/NR
    Cellular,
    /// Generic RF from an SDR front-end
    Sdr,
    /// Anything else
    #[default]
    Other,
}

/// One signal reading from one antenna at one instant
///
/// ```
/// use wardf_core::{Measurement, Protocol};
///
/// let m = Measurement::new("ant-0", 1_000, -62.5, 2.437e9)
///     .with_snr(31.0)
///     .with_protocol(Protocol::Wifi)
///     .with_target("aa:bb:cc:dd:ee:ff");
/// assert!(m.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Antenna that took the reading
    pub antenna_id: AntennaId,
    /// Milliseconds, monotonic per antenna
    pub timestamp: Timestamp,
    /// Received signal strength (dBm)
    pub rssi_dbm: f64,
    /// Signal-to-noise ratio (dB), when the hardware reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snr_db: Option<f64>,
    /// Carrier frequency (Hz)
    pub frequency_hz: f64,
    /// Protocol tag
    #[serde(default)]
    pub protocol: Protocol,
    /// Emitter identifier (BSSID, BD_ADDR, cell id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Measurement {
    /// Create a measurement without SNR or target
    pub fn new(
        antenna_id: impl Into<AntennaId>,
        timestamp: Timestamp,
        rssi_dbm: f64,
        frequency_hz: f64,
    ) -> Self {
        Self {
            antenna_id: antenna_id.into(),
            timestamp,
            rssi_dbm,
            snr_db: None,
            frequency_hz,
            protocol: Protocol::Other,
            target: None,
        }
    }

    /// Set the SNR
    pub fn with_snr(mut self, snr_db: f64) -> Self {
        self.snr_db = Some(snr_db);
        self
    }

    /// Set the protocol tag
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the emitter identifier
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Copy with a different RSSI (used by calibration)
    pub fn with_rssi(&self, rssi_dbm: f64) -> Self {
        Self {
            rssi_dbm,
            ..self.clone()
        }
    }

    /// Structural checks that do not need to know the antenna array
    pub fn validate(&self) -> Result<(), MeasurementError> {
        if self.antenna_id.trim().is_empty() {
            return Err(MeasurementError::EmptyAntennaId);
        }
        if !self.rssi_dbm.is_finite() {
            return Err(MeasurementError::NonFiniteRssi);
        }
        if matches!(self.snr_db, Some(snr) if !snr.is_finite()) {
            return Err(MeasurementError::NonFiniteSnr);
        }
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(MeasurementError::InvalidFrequency(self.frequency_hz));
        }
        Ok(())
    }

    /// Reading quality in `[0.1, 1]` from SNR; 1 when no SNR is reported
    pub fn snr_quality(&self) -> f64 {
        snr_quality(self.snr_db)
    }
}

/// SNR to quality factor in `[0.1, 1]`
pub fn snr_quality(snr_db: Option<f64>) -> f64 {
    match snr_db {
        Some(snr) if snr.is_finite() => (snr / FULL_QUALITY_SNR_DB).clamp(0.1, 1.0),
        _ => 1.0,
    }
}
