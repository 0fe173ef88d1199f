//! Wi-Fi Adapter Backend
//!
//! Reads per-interface signal statistics from the Linux wireless table
//! (`/proc/net/wireless`):
//!
//! ```text
//! Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
//!  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
//!  wlan0: 0000   54.  -56.  -256        0      0      0      0      0        0
//! ```
//!
//! The `level` column is the RSSI in dBm. Some drivers report it as an
//! unsigned byte; values above zero are shifted down by 256. A `noise` of
//! `-256` means the driver has no noise figure, otherwise
//! `snr = level - noise`.
//!
//! The table only describes the associated link, so the reading is tagged
//! with the configured channel frequency and, when set, the BSSID of the
//! access point being tracked.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::trace;

use wardf_core::Protocol;

use crate::antenna::{AntennaBackend, BackendKind, Health, SignalReading};
use crate::error::BackendError;

/// Default location of the wireless statistics table
pub const PROC_NET_WIRELESS: &str = "/proc/net/wireless";

/// Noise value drivers use for "not reported"
const NOISE_SENTINEL: f64 = -256.0;

/// One row of the wireless statistics table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WirelessStats {
    /// Link quality (driver-specific scale)
    pub link: f64,
    /// Signal level (dBm)
    pub level_dbm: f64,
    /// Noise level (dBm), if reported
    pub noise_dbm: Option<f64>,
}

impl WirelessStats {
    /// `level - noise`, when both are known
    pub fn snr_db(&self) -> Option<f64> {
        self.noise_dbm.map(|noise| self.level_dbm - noise)
    }
}

fn parse_value(field: &str) -> Option<f64> {
    field.trim_end_matches('.').parse().ok()
}

/// Find `interface` in the text of a wireless statistics table
pub fn parse_wireless(contents: &str, interface: &str) -> Option<WirelessStats> {
    contents.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != interface {
            return None;
        }
        let mut fields = rest.split_whitespace().skip(1);
        let link = parse_value(fields.next()?)?;
        let mut level_dbm = parse_value(fields.next()?)?;
        let noise = parse_value(fields.next()?)?;
        if level_dbm > 0.0 {
            level_dbm -= 256.0;
        }
        let noise_dbm = if noise == NOISE_SENTINEL || noise == 0.0 {
            None
        } else if noise > 0.0 {
            Some(noise - 256.0)
        } else {
            Some(noise)
        };
        Some(WirelessStats {
            link,
            level_dbm,
            noise_dbm,
        })
    })
}

/// Antenna backed by a Wi-Fi interface
#[derive(Debug, Clone)]
pub struct WifiAdapterBackend {
    interface: String,
    stats_path: PathBuf,
    frequency_hz: f64,
    bssid: Option<String>,
}

impl WifiAdapterBackend {
    /// Interface `interface` on channel frequency `frequency_hz`
    pub fn new(interface: impl Into<String>, frequency_hz: f64) -> Self {
        Self {
            interface: interface.into(),
            stats_path: PathBuf::from(PROC_NET_WIRELESS),
            frequency_hz,
            bssid: None,
        }
    }

    /// Read the table from another path
    pub fn with_stats_path(mut self, path: impl AsRef<Path>) -> Self {
        self.stats_path = path.as_ref().to_path_buf();
        self
    }

    /// Tag readings with the BSSID of the tracked access point
    pub fn with_bssid(mut self, bssid: impl Into<String>) -> Self {
        self.bssid = Some(bssid.into());
        self
    }

    /// Interface name
    pub fn interface(&self) -> &str {
        &self.interface
    }

    async fn stats(&self) -> Result<WirelessStats, BackendError> {
        let contents = tokio::fs::read_to_string(&self.stats_path).await?;
        parse_wireless(&contents, &self.interface).ok_or_else(|| {
            BackendError::unavailable(format!("interface {} not listed", self.interface))
        })
    }
}

#[async_trait]
impl AntennaBackend for WifiAdapterBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WifiAdapter
    }

    async fn read_signal(&self) -> Result<SignalReading, BackendError> {
        let stats = self.stats().await?;
        trace!(
            "{}: level {} dBm, noise {:?}",
            self.interface,
            stats.level_dbm,
            stats.noise_dbm
        );
        let mut reading = SignalReading::new(stats.level_dbm, self.frequency_hz, Protocol::Wifi);
        if let Some(snr) = stats.snr_db() {
            reading = reading.with_snr(snr);
        }
        if let Some(bssid) = &self.bssid {
            reading = reading.with_target(bssid.clone());
        }
        Ok(reading)
    }

    fn supports_calibration(&self) -> bool {
        true
    }

    async fn report_health(&self) -> Health {
        match self.stats().await {
            Ok(stats) if stats.link > 0.0 => Health::Healthy,
            Ok(_) => Health::Degraded("no link".into()),
            Err(BackendError::Unavailable(reason)) if self.stats_path.exists() => Health::Degraded(reason),
            Err(_) => Health::Offline,
        }
    }
}
