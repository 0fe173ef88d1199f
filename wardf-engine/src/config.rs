//! Direction-Finding Configuration
//!
//! ## Overview
//!
//! A [`DfConfiguration`] is everything one engine cycle needs: the antenna
//! array, the algorithm and its parameters, the estimation window and the
//! collector settings. It is validated as a whole and swapped as a whole
//! through a [`ConfigHandle`](crate::ConfigHandle).
//!
//! ## Algorithm Selection
//!
//! The algorithm is a closed enum; each variant carries its own parameter
//! struct and structural minimum:
//!
//! | Kind                | Needs                    | Minimum antennas |
//! |---------------------|--------------------------|------------------|
//! | `multilateration`   | antenna positions        | 3                |
//! | `amplitude_bearing` | antenna boresights       | 2                |
//! | `weighted_centroid` | antenna positions        | 2                |
//!
//! `min_measurements` counts distinct usable antennas in a window and must be
//! at least the structural minimum of the selected kind.
//!
//! ## JSON
//!
//! ```json
//! {
//!   "array": { "antennas": [ { "id": "ant-0", "position": { "frame": "local", "x": 0.0, "y": 0.0 } } ] },
//!   "algorithm": {
//!     "kind": { "type": "multilateration", "path_loss": { "model": "free_space" } },
//!     "min_measurements": 3,
//!     "smoothing": { "half_life_ms": 2000, "staleness_ms": 10000 }
//!   },
//!   "window_ms": 2000
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use wardf_core::algorithms::{bearing, centroid, multilateration, AntennaObservation};
use wardf_core::algorithms::{BearingParams, CentroidParams, MultilaterationParams, SmoothingParams};
use wardf_core::constants::defaults::{
    BEARING_MIN_ANTENNAS, CENTROID_MIN_ANTENNAS, MULTILATERATION_MIN_ANTENNAS,
};
use wardf_core::AntennaArray;
use wardf_hal::HardwareRegistry;

use crate::error::ConfigError;

/// Default estimation window (ms)
pub const DEFAULT_WINDOW_MS: u64 = 2_000;

/// Default cycle tick (ms)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Algorithm and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// RSS multilateration
    Multilateration(MultilaterationParams),
    /// Amplitude-comparison bearing
    AmplitudeBearing(BearingParams),
    /// Range-weighted centroid
    WeightedCentroid(CentroidParams),
}

impl Default for AlgorithmKind {
    fn default() -> Self {
        AlgorithmKind::Multilateration(MultilaterationParams::default())
    }
}

impl AlgorithmKind {
    /// Tag carried by estimates of this kind
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::Multilateration(_) => multilateration::NAME,
            AlgorithmKind::AmplitudeBearing(_) => bearing::NAME,
            AlgorithmKind::WeightedCentroid(_) => centroid::NAME,
        }
    }

    /// Fewest distinct antennas the algorithm can work with
    pub fn structural_minimum(&self) -> usize {
        match self {
            AlgorithmKind::Multilateration(_) => MULTILATERATION_MIN_ANTENNAS,
            AlgorithmKind::AmplitudeBearing(_) => BEARING_MIN_ANTENNAS,
            AlgorithmKind::WeightedCentroid(_) => CENTROID_MIN_ANTENNAS,
        }
    }

    /// Antennas of `array` this algorithm can use
    pub fn capable_antennas(&self, array: &AntennaArray) -> usize {
        match self {
            AlgorithmKind::AmplitudeBearing(_) => array.directional_count(),
            AlgorithmKind::Multilateration(_) | AlgorithmKind::WeightedCentroid(_) => array.positioned_count(),
        }
    }

    /// Whether the algorithm can use this antenna's observation
    pub fn uses(&self, observation: &AntennaObservation) -> bool {
        match self {
            AlgorithmKind::AmplitudeBearing(_) => observation.boresight_deg.is_some(),
            AlgorithmKind::Multilateration(_) | AlgorithmKind::WeightedCentroid(_) => observation.position.is_some(),
        }
    }

    fn requirement(&self) -> &'static str {
        match self {
            AlgorithmKind::AmplitudeBearing(_) => "directional",
            _ => "positioned",
        }
    }

    /// Check parameters and array compatibility
    pub fn validate(&self, array: &AntennaArray) -> Result<(), ConfigError> {
        let params = match self {
            AlgorithmKind::Multilateration(p) => p.validate(),
            AlgorithmKind::AmplitudeBearing(p) => p.validate(),
            AlgorithmKind::WeightedCentroid(p) => p.validate(),
        };
        params.map_err(|e| ConfigError::invalid(format!("{}: {}", self.name(), e)))?;

        let capable = self.capable_antennas(array);
        if capable < self.structural_minimum() {
            return Err(ConfigError::invalid(format!(
                "{} requires at least {} {} antennas, array has {}",
                self.name(),
                self.structural_minimum(),
                self.requirement(),
                capable
            )));
        }
        Ok(())
    }
}

/// Selected algorithm plus cycle-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Algorithm and parameters
    pub kind: AlgorithmKind,
    /// Distinct usable antennas needed to attempt an estimate
    pub min_measurements: usize,
    /// Estimate smoothing
    #[serde(default)]
    pub smoothing: SmoothingParams,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::new(AlgorithmKind::default())
    }
}

impl AlgorithmConfig {
    /// `kind` with `min_measurements` at its structural minimum
    pub fn new(kind: AlgorithmKind) -> Self {
        Self {
            min_measurements: kind.structural_minimum(),
            kind,
            smoothing: SmoothingParams::for_window(DEFAULT_WINDOW_MS),
        }
    }

    /// Set `min_measurements`
    pub fn with_min_measurements(mut self, min_measurements: usize) -> Self {
        self.min_measurements = min_measurements;
        self
    }

    /// Set smoothing
    pub fn with_smoothing(mut self, smoothing: SmoothingParams) -> Self {
        self.smoothing = smoothing;
        self
    }
}

/// Per-antenna collector task settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Time between polls of one antenna (ms)
    pub poll_interval_ms: u64,
    /// Longest a poll may wait for hardware (ms)
    pub poll_timeout_ms: u64,
    /// Wait before retrying a faulted read (ms)
    pub retry_backoff_ms: u64,
    /// Time between re-probes of an offline antenna (ms)
    pub reprobe_interval_ms: u64,
    /// Capacity of the measurement channel
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            poll_timeout_ms: 500,
            retry_backoff_ms: 50,
            reprobe_interval_ms: 5_000,
            channel_capacity: 1_024,
        }
    }
}

/// Complete, atomically swappable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfConfiguration {
    /// Antennas and their geometry
    pub array: AntennaArray,
    /// Primary algorithm
    #[serde(default)]
    pub algorithm: AlgorithmConfig,
    /// Tried once on the same batch when the primary algorithm fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<AlgorithmKind>,
    /// Estimation window (ms)
    #[serde(default = "default_window")]
    pub window_ms: u64,
    /// Cycle tick (ms)
    #[serde(default = "default_tick")]
    pub tick_interval_ms: u64,
    /// Only measurements of this emitter are used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Collector settings
    #[serde(default)]
    pub collector: CollectorConfig,
}

fn default_window() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_tick() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl DfConfiguration {
    /// Default algorithm over `array`
    pub fn new(array: AntennaArray) -> Self {
        Self {
            array,
            algorithm: AlgorithmConfig::default(),
            fallback: None,
            window_ms: DEFAULT_WINDOW_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            target: None,
            collector: CollectorConfig::default(),
        }
    }

    /// Set the algorithm
    pub fn with_algorithm(mut self, algorithm: AlgorithmConfig) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the fallback algorithm
    pub fn with_fallback(mut self, fallback: AlgorithmKind) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Set the window; smoothing follows the window
    pub fn with_window(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self.algorithm.smoothing = SmoothingParams {
            enabled: self.algorithm.smoothing.enabled,
            ..SmoothingParams::for_window(window_ms)
        };
        self
    }

    /// Set the tick interval
    pub fn with_tick_interval(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    /// Track a single emitter
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set collector settings
    pub fn with_collector(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    /// Structural validation (no hardware lookups)
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.array
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))?;
        if self.array.is_empty() {
            return Err(ConfigError::invalid("antenna array is empty"));
        }

        let kind = &self.algorithm.kind;
        kind.validate(&self.array)?;
        if self.algorithm.min_measurements < kind.structural_minimum() {
            return Err(ConfigError::invalid(format!(
                "min_measurements {} is below the {} minimum of {}",
                self.algorithm.min_measurements,
                kind.name(),
                kind.structural_minimum()
            )));
        }
        if self.algorithm.min_measurements > kind.capable_antennas(&self.array) {
            return Err(ConfigError::invalid(format!(
                "min_measurements {} exceeds the {} antennas {} can use",
                self.algorithm.min_measurements,
                kind.capable_antennas(&self.array),
                kind.name()
            )));
        }
        if let Some(fallback) = &self.fallback {
            fallback.validate(&self.array)?;
        }

        if self.window_ms == 0 {
            return Err(ConfigError::invalid("window_ms must be positive"));
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms > self.window_ms {
            return Err(ConfigError::invalid("tick_interval_ms must be in (0, window_ms]"));
        }
        let c = &self.collector;
        if c.poll_interval_ms == 0 || c.poll_timeout_ms == 0 || c.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "collector intervals and channel capacity must be positive",
            ));
        }
        if self.target.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::invalid("target filter is empty"));
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus: every antenna resolves in `registry`
    pub fn validate_with(&self, registry: &HardwareRegistry) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(missing) = self.array.ids().find(|id| !registry.contains(id)) {
            return Err(ConfigError::invalid(format!(
                "antenna {} is not registered in the HAL",
                missing
            )));
        }
        Ok(())
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Read from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardf_core::AntennaDescriptor;

    fn triangle() -> AntennaArray {
        AntennaArray::new(vec![
            AntennaDescriptor::at("a", 0.0, 0.0, 0.0),
            AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
            AntennaDescriptor::at("c", 5.0, 10.0, 0.0),
        ])
    }

    #[test]
    fn default_is_valid() {
        let config = DfConfiguration::new(triangle());
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm.min_measurements, 3);
        assert_eq!(config.algorithm.smoothing.half_life_ms, config.window_ms);
    }

    #[test]
    fn multilateration_needs_three_positioned() {
        let mut array = triangle();
        array.antennas[2].position = None;
        let err = DfConfiguration::new(array).validate().unwrap_err();
        assert!(err.to_string().contains("requires at least 3 positioned"), "{}", err);
    }

    #[test]
    fn min_measurements_bounds() {
        let low = DfConfiguration::new(triangle())
            .with_algorithm(AlgorithmConfig::default().with_min_measurements(2));
        assert!(low.validate().is_err());

        let high = DfConfiguration::new(triangle())
            .with_algorithm(AlgorithmConfig::default().with_min_measurements(4));
        assert!(high.validate().is_err());
    }

    #[test]
    fn bearing_needs_boresights() {
        let config = DfConfiguration::new(triangle())
            .with_algorithm(AlgorithmConfig::new(AlgorithmKind::AmplitudeBearing(BearingParams::default())));
        assert!(config.validate().is_err());
    }

    #[test]
    fn timing_is_checked() {
        assert!(DfConfiguration::new(triangle()).with_window(0).validate().is_err());
        assert!(DfConfiguration::new(triangle())
            .with_window(500)
            .with_tick_interval(1_000)
            .validate()
            .is_err());
    }

    #[test]
    fn json_defaults_fill_in() {
        let json = r#"{
            "array": { "antennas": [
                { "id": "a", "position": { "frame": "local", "x": 0.0, "y": 0.0 } },
                { "id": "b", "position": { "frame": "local", "x": 10.0, "y": 0.0 } },
                { "id": "c", "position": { "frame": "local", "x": 5.0, "y": 10.0 } }
            ] },
            "algorithm": {
                "kind": { "type": "weighted_centroid" },
                "min_measurements": 2
            },
            "window_ms": 1000
        }"#;
        let config = DfConfiguration::from_json_str(json).unwrap();
        assert!(matches!(config.algorithm.kind, AlgorithmKind::WeightedCentroid(_)));
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(config.collector, CollectorConfig::default());
        assert!(config.validate().is_ok());

        let back = DfConfiguration::from_json_str(&config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
