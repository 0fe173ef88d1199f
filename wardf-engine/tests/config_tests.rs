//! Configuration loading and rejection

mod common;

use common::*;
use wardf_core::algorithms::BearingParams;
use wardf_core::{AntennaArray, AntennaDescriptor, AntennaPosition, GeoPoint};
use wardf_engine::{AlgorithmConfig, AlgorithmKind, CollectorConfig, ConfigError, ConfigHandle, DfConfiguration};
use wardf_hal::{Antenna, HardwareRegistry, SimOutcome, SimulatedBackend};

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("df.json");
    let config = triangle_config()
        .with_window(1_500)
        .with_tick_interval(50)
        .with_target("aa:bb:cc:dd:ee:ff")
        .with_fallback(AlgorithmKind::WeightedCentroid(Default::default()))
        .with_collector(CollectorConfig {
            poll_interval_ms: 100,
            ..CollectorConfig::default()
        });
    std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();

    let loaded = DfConfiguration::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DfConfiguration::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn malformed_json_is_a_load_error() {
    assert!(matches!(
        DfConfiguration::from_json_str("{ \"array\": "),
        Err(ConfigError::Load(_))
    ));
    assert!(matches!(
        DfConfiguration::from_json_str(r#"{"array":{"antennas":[]},"algorithm":{"kind":{"type":"music"},"min_measurements":2}}"#),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn array_processing_kinds_are_not_configurable() {
    for kind in ["music", "beamforming"] {
        let json = format!(
            r#"{{"array":{{"antennas":[]}},"algorithm":{{"kind":{{"type":"{}"}},"min_measurements":2}}}}"#,
            kind
        );
        match DfConfiguration::from_json_str(&json) {
            Err(ConfigError::Load(reason)) => assert!(reason.contains(kind), "{}", reason),
            other => panic!("{} accepted: {:?}", kind, other),
        }
    }
}

#[test]
fn geodetic_positions_need_an_origin() {
    let geodetic = |id: &str, lat: f64, lon: f64| {
        AntennaDescriptor::new(id).with_position(AntennaPosition::Geodetic { lat, lon, alt: 0.0 })
    };
    let array = AntennaArray::new(vec![
        geodetic("n-0", 52.0000, 4.0000),
        geodetic("n-1", 52.0001, 4.0000),
        geodetic("n-2", 52.0000, 4.0002),
    ]);
    let config = DfConfiguration::new(array.clone());
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfiguration(_))));

    let anchored = DfConfiguration::new(array.with_origin(GeoPoint {
        lat: 52.0,
        lon: 4.0,
        alt: 0.0,
    }));
    assert!(anchored.validate().is_ok());
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut config = triangle_config();
    config.array.antennas[2].id = "ant-0".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("ant-0"), "{}", err);
}

#[test]
fn bearing_needs_directional_antennas() {
    let bearing = AlgorithmConfig::new(AlgorithmKind::AmplitudeBearing(BearingParams::default()));
    let config = triangle_config().with_algorithm(bearing.clone());
    assert!(config.validate().is_err());

    let array = AntennaArray::new(vec![
        AntennaDescriptor::new("sector-n").with_boresight(0.0),
        AntennaDescriptor::new("sector-e").with_boresight(90.0),
    ]);
    assert!(DfConfiguration::new(array).with_algorithm(bearing).validate().is_ok());
}

#[test]
fn fallback_is_validated_against_the_array() {
    let array = AntennaArray::new(vec![
        AntennaDescriptor::at("a", 0.0, 0.0, 0.0).with_boresight(0.0),
        AntennaDescriptor::at("b", 10.0, 0.0, 0.0).with_boresight(90.0),
        AntennaDescriptor::at("c", 5.0, 10.0, 0.0),
    ]);
    let config = DfConfiguration::new(array.clone());
    assert!(config.validate().is_ok());
    assert!(config
        .clone()
        .with_fallback(AlgorithmKind::AmplitudeBearing(BearingParams::default()))
        .validate()
        .is_ok());

    let lone = AntennaArray::new(vec![
        AntennaDescriptor::at("a", 0.0, 0.0, 0.0).with_boresight(0.0),
        AntennaDescriptor::at("b", 10.0, 0.0, 0.0),
        AntennaDescriptor::at("c", 5.0, 10.0, 0.0),
    ]);
    assert!(DfConfiguration::new(lone)
        .with_fallback(AlgorithmKind::AmplitudeBearing(BearingParams::default()))
        .validate()
        .is_err());
}

#[test]
fn collector_settings_must_be_positive() {
    let config = triangle_config().with_collector(CollectorConfig {
        channel_capacity: 0,
        ..CollectorConfig::default()
    });
    assert!(config.validate().is_err());
}

#[test]
fn empty_target_filter_is_rejected() {
    assert!(triangle_config().with_target("").validate().is_err());
}

#[test]
fn every_antenna_must_resolve_in_the_registry() {
    let mut registry = HardwareRegistry::new();
    for (id, _, _) in TRIANGLE.iter().take(2) {
        registry.register(Antenna::new(*id, SimulatedBackend::scripted(Vec::<SimOutcome>::new())));
    }

    let err = triangle_config().validate_with(&registry).unwrap_err();
    assert!(err.to_string().contains("ant-2"), "{}", err);
    assert!(ConfigHandle::with_registry(triangle_config(), registry.clone()).is_err());

    registry.register(Antenna::new("ant-2", SimulatedBackend::scripted(Vec::<SimOutcome>::new())));
    let handle = ConfigHandle::with_registry(triangle_config(), registry).unwrap();
    assert_eq!(handle.generation(), 0);
}
