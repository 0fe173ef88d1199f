//! HAL integration tests
//!
//! File-backed backends against temporary files, and the poll/offline policy
//! through the registry.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use wardf_core::{ManualClock, Protocol};
use wardf_hal::{
    Antenna, AntennaBackend, BackendError, BackendKind, Health, HardwareFault, HardwareRegistry,
    IqFormat, PollOutcome, SdrBackend, SdrConfig, SimOutcome, SimulatedBackend,
    WifiAdapterBackend,
};

const POLL: Duration = Duration::from_millis(250);

fn wireless_table(level: &str, noise: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE").unwrap();
    writeln!(file, " face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22").unwrap();
    writeln!(file, " wlan0: 0000   60.  {}  {}        0      0      0      0      0        0", level, noise).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn wifi_adapter_reads_proc_table() {
    let table = wireless_table("-48.", "-92.");
    let backend = WifiAdapterBackend::new("wlan0", 2.437e9)
        .with_stats_path(table.path())
        .with_bssid("00:11:22:33:44:55");
    assert_eq!(backend.kind(), BackendKind::WifiAdapter);

    let antenna = Antenna::new("wlan0", backend).with_clock(Arc::new(ManualClock::new(5_000)));
    let Ok(PollOutcome::Reading(m)) = antenna.poll(POLL).await else {
        panic!("expected a reading");
    };
    assert_eq!(m.rssi_dbm, -48.0);
    assert_eq!(m.snr_db, Some(44.0));
    assert_eq!(m.protocol, Protocol::Wifi);
    assert_eq!(m.target.as_deref(), Some("00:11:22:33:44:55"));
    assert_eq!(m.timestamp, 5_000);
    assert_eq!(antenna.refresh_health().await, Health::Healthy);
}

#[tokio::test]
async fn wifi_missing_interface_or_file_is_unavailable() {
    let table = wireless_table("-48.", "-256");
    let other = WifiAdapterBackend::new("wlan7", 2.4e9).with_stats_path(table.path());
    assert!(matches!(other.read_signal().await, Err(BackendError::Unavailable(_))));
    assert!(matches!(other.report_health().await, Health::Degraded(_)));

    let gone = WifiAdapterBackend::new("wlan0", 2.4e9).with_stats_path("/nonexistent/net/wireless");
    assert!(matches!(gone.read_signal().await, Err(BackendError::Unavailable(_))));
    assert_eq!(gone.report_health().await, Health::Offline);

    // unavailable never takes the antenna offline
    let antenna = Antenna::new("wlan7", other);
    for _ in 0..3 {
        assert!(matches!(antenna.poll(POLL).await, Ok(PollOutcome::Unavailable(_))));
    }
    assert!(!antenna.is_offline());
}

#[tokio::test]
async fn sdr_reads_iq_recording() {
    let mut file = NamedTempFile::new().unwrap();
    // ci16 at half scale on I and Q: P = 0.5 -> -3.01 dBFS
    for _ in 0..64 {
        file.write_all(&16384i16.to_le_bytes()).unwrap();
        file.write_all(&16384i16.to_le_bytes()).unwrap();
    }
    file.flush().unwrap();

    let config = SdrConfig::new(IqFormat::Ci16, 868.3e6)
        .with_block_samples(32)
        .with_full_scale(-20.0);
    let antenna = Antenna::new("sdr-0", SdrBackend::from_file(config, file.path()));

    for _ in 0..2 {
        let Ok(PollOutcome::Reading(m)) = antenna.poll(POLL).await else {
            panic!("expected a reading");
        };
        assert!((m.rssi_dbm + 23.0103).abs() < 1e-3, "rssi {}", m.rssi_dbm);
        assert_eq!(m.frequency_hz, 868.3e6);
    }
    assert!(matches!(antenna.poll(POLL).await, Ok(PollOutcome::Unavailable(_))));
    assert_eq!(antenna.stats().readings, 2);
}

#[tokio::test]
async fn sdr_missing_recording_is_unavailable() {
    let backend = SdrBackend::from_file(SdrConfig::new(IqFormat::Cu8, 100e6), "/nonexistent.cu8");
    assert!(matches!(backend.read_signal().await, Err(BackendError::Unavailable(_))));
}

#[tokio::test(start_paused = true)]
async fn all_antennas_faulting_leaves_none_usable() {
    let backends: Vec<_> = (0..3)
        .map(|_| SimulatedBackend::scripted([SimOutcome::Fault, SimOutcome::Fault]))
        .collect();
    let mut registry = HardwareRegistry::new();
    for (i, backend) in backends.iter().enumerate() {
        registry.register(Antenna::new(format!("ant-{}", i), backend.clone()));
    }
    let ids = registry.ids();

    for antenna in registry.resolve(ids.iter().map(String::as_str)).unwrap() {
        assert!(matches!(
            antenna.poll(POLL).await,
            Err(HardwareFault::RetriesExhausted { .. })
        ));
    }
    assert!(registry.all_offline(ids.iter().map(String::as_str)));
    assert!(registry.health_report().values().all(|h| *h == Health::Offline));

    registry.reset_offline();
    assert!(!registry.all_offline(ids.iter().map(String::as_str)));
}
