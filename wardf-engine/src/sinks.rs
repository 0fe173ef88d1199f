//! Outbound collaborators: persistence and telemetry
//!
//! Both are fire-and-forget from the engine's point of view. A failing
//! persistence write is logged and the cycle continues; duplicates are the
//! store's business (at-least-once).
//!
//! | Sink                | Kept where                  | Use                    |
//! |---------------------|-----------------------------|------------------------|
//! | [`MemoryStore`]     | process memory              | tests, replays         |
//! | [`JsonLinesStore`]  | one JSON document per line  | field collection       |
//! | [`LogTelemetry`]    | `log` facade                | default telemetry      |
//! | [`RecordingTelemetry`] | process memory           | tests                  |

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use wardf_core::{CalibrationProfile, Estimate};
use wardf_hal::Health;

use crate::state::EngineState;

/// Store for calibration profiles and historical estimates
pub trait PersistenceSink: Send + Sync {
    /// Persist a calibration profile
    fn save_profile(&self, profile: &CalibrationProfile) -> io::Result<()>;

    /// Persist an emitted estimate
    fn save_estimate(&self, estimate: &Estimate) -> io::Result<()>;

    /// Profiles to seed the calibration store with at start-up
    fn load_profiles(&self) -> io::Result<Vec<CalibrationProfile>>;
}

/// Observer of engine and hardware transitions
pub trait TelemetrySink: Send + Sync {
    /// Engine moved between states
    fn engine_state_changed(&self, from: EngineState, to: EngineState);

    /// An antenna's health changed
    fn antenna_health_changed(&self, antenna: &str, health: &Health);
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<CalibrationProfile>>,
    estimates: Mutex<Vec<Estimate>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with profiles
    pub fn with_profiles(profiles: impl IntoIterator<Item = CalibrationProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles.into_iter().collect()),
            estimates: Mutex::default(),
        }
    }

    /// Saved profiles
    pub fn profiles(&self) -> Vec<CalibrationProfile> {
        locked(&self.profiles).clone()
    }

    /// Saved estimates
    pub fn estimates(&self) -> Vec<Estimate> {
        locked(&self.estimates).clone()
    }
}

impl PersistenceSink for MemoryStore {
    fn save_profile(&self, profile: &CalibrationProfile) -> io::Result<()> {
        locked(&self.profiles).push(profile.clone());
        Ok(())
    }

    fn save_estimate(&self, estimate: &Estimate) -> io::Result<()> {
        locked(&self.estimates).push(estimate.clone());
        Ok(())
    }

    fn load_profiles(&self) -> io::Result<Vec<CalibrationProfile>> {
        Ok(self.profiles())
    }
}

/// One line of a [`JsonLinesStore`] file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StoredRecord {
    /// Calibration profile
    Profile(CalibrationProfile),
    /// Emitted estimate
    Estimate(Estimate),
}

/// Append-only JSON-lines file
///
/// ```text
/// {"record":"profile","antenna_id":"ant-0","offset_db":3.5,...}
/// {"record":"estimate","kind":{"type":"position",...},"confidence":...}
/// ```
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonLinesStore {
    /// Store appending to `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &StoredRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = locked(&self.file);
        let handle = match file.take() {
            Some(handle) => handle,
            None => OpenOptions::new().create(true).append(true).open(&self.path)?,
        };
        let handle = file.insert(handle);
        handle.write_all(&line)?;
        handle.flush()
    }

    /// Every record in the file, in write order
    ///
    /// A missing file reads as empty; a line that does not parse is an error.
    pub fn records(&self) -> io::Result<Vec<StoredRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl PersistenceSink for JsonLinesStore {
    fn save_profile(&self, profile: &CalibrationProfile) -> io::Result<()> {
        self.append(&StoredRecord::Profile(profile.clone()))
    }

    fn save_estimate(&self, estimate: &Estimate) -> io::Result<()> {
        self.append(&StoredRecord::Estimate(estimate.clone()))
    }

    fn load_profiles(&self) -> io::Result<Vec<CalibrationProfile>> {
        let profiles: Vec<_> = self
            .records()?
            .into_iter()
            .filter_map(|record| match record {
                StoredRecord::Profile(profile) => Some(profile),
                StoredRecord::Estimate(_) => None,
            })
            .collect();
        debug!("loaded {} profiles from {}", profiles.len(), self.path.display());
        Ok(profiles)
    }
}

/// Telemetry through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn engine_state_changed(&self, from: EngineState, to: EngineState) {
        info!("engine state: {} -> {}", from, to);
    }

    fn antenna_health_changed(&self, antenna: &str, health: &Health) {
        info!("antenna {} health: {}", antenna, health);
    }
}

/// A recorded telemetry event
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// Engine state transition
    State {
        /// Previous state
        from: EngineState,
        /// New state
        to: EngineState,
    },
    /// Antenna health transition
    Health {
        /// Antenna id
        antenna: String,
        /// New health
        health: Health,
    },
}

/// Telemetry kept in memory
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn events(&self) -> Vec<TelemetryEvent> {
        locked(&self.events).clone()
    }

    /// States entered, in order
    pub fn states(&self) -> Vec<EngineState> {
        locked(&self.events)
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::State { to, .. } => Some(*to),
                TelemetryEvent::Health { .. } => None,
            })
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn engine_state_changed(&self, from: EngineState, to: EngineState) {
        locked(&self.events).push(TelemetryEvent::State { from, to });
    }

    fn antenna_health_changed(&self, antenna: &str, health: &Health) {
        locked(&self.events).push(TelemetryEvent::Health {
            antenna: antenna.to_string(),
            health: health.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("df.jsonl"));
        assert!(store.load_profiles().unwrap().is_empty());

        store.save_profile(&CalibrationProfile::new("ant-0", 3.5, 100)).unwrap();
        store
            .save_estimate(&Estimate::insufficient_data(3, 2, "multilateration", 200))
            .unwrap();
        store.save_profile(&CalibrationProfile::new("ant-1", -1.0, 300)).unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[1], StoredRecord::Estimate(_)));

        let profiles = store.load_profiles().unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].antenna_id, "ant-0");
        assert_eq!(profiles[1].offset_db, -1.0);
    }

    #[test]
    fn recording_telemetry_keeps_order() {
        let telemetry = RecordingTelemetry::new();
        telemetry.engine_state_changed(EngineState::Idle, EngineState::Scanning);
        telemetry.antenna_health_changed("a", &Health::Offline);
        telemetry.engine_state_changed(EngineState::Scanning, EngineState::Error);
        assert_eq!(telemetry.states(), vec![EngineState::Scanning, EngineState::Error]);
        assert_eq!(telemetry.events().len(), 3);
    }
}
