//! Integration layer: the boundary between the engine and the outside
//!
//! ## Overview
//!
//! [`DfIntegration`] is what scanners, the API layer and operators talk to.
//! Inbound records are decoded by a [`MeasurementDecoder`] and checked here,
//! so a malformed or foreign record never reaches the engine's batch:
//!
//! 1. decodes (`Malformed` otherwise)
//! 2. finite RSSI, positive frequency, non-empty antenna id
//! 3. antenna is part of the active configuration
//! 4. target matches the configured filter, if any
//! 5. timestamp is after the last one accepted for that antenna
//!
//! Outbound, it republishes the estimate stream and the configuration.
//!
//! ## Record format
//!
//! [`JsonRecordDecoder`] accepts one JSON object per record:
//!
//! ```json
//! {"antenna": "ant-0", "timestamp": 1700000000000, "rssi": -61.0,
//!  "frequency_mhz": 2437, "protocol": "wifi", "bssid": "aa:bb:cc:dd:ee:ff"}
//! ```
//!
//! Frequency may be given as `frequency_hz` or `frequency_mhz`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde::Deserialize;

use wardf_core::{AntennaId, CalibrationProfile, MeasurementError, Measurement, Protocol, Timestamp};

use crate::config::DfConfiguration;
use crate::error::{ConfigError, EngineResult, IngestError};
use crate::runtime::{EngineHandle, EngineStatus};
use crate::stream::EstimateStream;

/// Turns one raw record into a measurement
pub trait MeasurementDecoder: Send + Sync {
    /// Decode `record`
    fn decode(&self, record: &[u8]) -> Result<Measurement, IngestError>;
}

#[derive(Debug, Deserialize)]
struct MeasurementRecord {
    #[serde(alias = "antenna")]
    antenna_id: AntennaId,
    #[serde(alias = "timestamp_ms")]
    timestamp: Timestamp,
    #[serde(alias = "rssi", alias = "signal_dbm")]
    rssi_dbm: f64,
    #[serde(default, alias = "snr")]
    snr_db: Option<f64>,
    #[serde(default)]
    frequency_hz: Option<f64>,
    #[serde(default)]
    frequency_mhz: Option<f64>,
    #[serde(default)]
    protocol: Protocol,
    #[serde(default, alias = "bssid", alias = "mac")]
    target: Option<String>,
}

/// Decoder for JSON measurement records
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRecordDecoder;

impl MeasurementDecoder for JsonRecordDecoder {
    fn decode(&self, record: &[u8]) -> Result<Measurement, IngestError> {
        let record: MeasurementRecord =
            serde_json::from_slice(record).map_err(|e| IngestError::Malformed(e.to_string()))?;
        let frequency_hz = match (record.frequency_hz, record.frequency_mhz) {
            (Some(hz), _) => hz,
            (None, Some(mhz)) => mhz * 1e6,
            (None, None) => return Err(IngestError::Malformed("record has no frequency".into())),
        };

        let mut measurement = Measurement::new(record.antenna_id, record.timestamp, record.rssi_dbm, frequency_hz)
            .with_protocol(record.protocol);
        if let Some(snr) = record.snr_db {
            measurement = measurement.with_snr(snr);
        }
        if let Some(target) = record.target {
            measurement = measurement.with_target(target);
        }
        Ok(measurement)
    }
}

/// Boundary adapter around a running engine
pub struct DfIntegration<D = JsonRecordDecoder> {
    engine: EngineHandle,
    decoder: D,
    last_seen: Mutex<HashMap<AntennaId, Timestamp>>,
}

impl DfIntegration<JsonRecordDecoder> {
    /// Adapter decoding JSON records
    pub fn new(engine: EngineHandle) -> Self {
        Self::with_decoder(engine, JsonRecordDecoder)
    }
}

impl<D: MeasurementDecoder> DfIntegration<D> {
    /// Adapter with a custom decoder
    pub fn with_decoder(engine: EngineHandle, decoder: D) -> Self {
        Self {
            engine,
            decoder,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Underlying engine handle
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Decode, check and forward one raw record
    pub fn ingest_record(&self, record: &[u8]) -> Result<(), IngestError> {
        let measurement = self.decoder.decode(record)?;
        self.ingest(measurement)
    }

    /// Check and forward one measurement
    pub fn ingest(&self, measurement: Measurement) -> Result<(), IngestError> {
        if let Err(e) = self.check(&measurement) {
            warn!("record from {:?} rejected: {}", measurement.antenna_id, e);
            return Err(e);
        }
        self.engine.submit(measurement)?;
        Ok(())
    }

    fn check(&self, measurement: &Measurement) -> Result<(), IngestError> {
        measurement.validate()?;

        let config = self.engine.config().get();
        if !config.array.contains(&measurement.antenna_id) {
            return Err(IngestError::UnknownAntenna(measurement.antenna_id.clone()));
        }
        if config.target.is_some() && measurement.target != config.target {
            return Err(IngestError::TargetMismatch(measurement.target.clone()));
        }

        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        match last_seen.get(&measurement.antenna_id) {
            Some(&last) if measurement.timestamp <= last => {
                return Err(MeasurementError::NonMonotonic {
                    antenna: measurement.antenna_id.clone(),
                    timestamp: measurement.timestamp,
                    last,
                }
                .into());
            }
            _ => {}
        }
        last_seen.insert(measurement.antenna_id.clone(), measurement.timestamp);
        Ok(())
    }

    /// Active configuration
    pub fn get_configuration(&self) -> Arc<DfConfiguration> {
        self.engine.config().get()
    }

    /// Validate and swap the configuration; the old one stays on error
    pub fn set_configuration(&self, candidate: DfConfiguration) -> Result<(), ConfigError> {
        self.engine.set_configuration(candidate)?;
        debug!("configuration generation {} published", self.engine.config().generation());
        Ok(())
    }

    /// Start calibrating `antenna_id` against a reference at `expected_rssi_dbm`
    pub async fn begin_calibration(&self, antenna_id: &str, expected_rssi_dbm: f64) -> EngineResult<()> {
        self.engine.begin_calibration(antenna_id, expected_rssi_dbm).await
    }

    /// Finish the running calibration
    pub async fn complete_calibration(&self) -> EngineResult<CalibrationProfile> {
        self.engine.complete_calibration().await
    }

    /// Drop the running calibration
    pub async fn abort_calibration(&self) -> EngineResult<()> {
        self.engine.abort_calibration().await
    }

    /// Subscribe to estimates published from now on
    pub fn estimates(&self) -> EstimateStream {
        self.engine.subscribe()
    }

    /// Engine snapshot
    pub async fn status(&self) -> EngineResult<EngineStatus> {
        self.engine.status().await
    }

    /// Start scanning
    pub async fn start(&self) -> EngineResult<()> {
        self.engine.start().await
    }

    /// Stop scanning
    pub async fn stop(&self) -> EngineResult<()> {
        self.engine.stop().await
    }

    /// Stop the engine
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.engine.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scanner_records() {
        let record = br#"{"antenna":"ant-0","timestamp":1000,"rssi":-61.0,"frequency_mhz":2437,
                          "protocol":"wifi","bssid":"aa:bb:cc:dd:ee:ff","snr":28.5}"#;
        let m = JsonRecordDecoder.decode(record).unwrap();
        assert_eq!(m.antenna_id, "ant-0");
        assert_eq!(m.frequency_hz, 2.437e9);
        assert_eq!(m.protocol, Protocol::Wifi);
        assert_eq!(m.target.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(m.snr_db, Some(28.5));
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(matches!(
            JsonRecordDecoder.decode(b"not json"),
            Err(IngestError::Malformed(_))
        ));
        assert!(matches!(
            JsonRecordDecoder.decode(br#"{"antenna":"a","timestamp":1,"rssi":-50}"#),
            Err(IngestError::Malformed(_))
        ));
    }
}
