//! SDR Backend
//!
//! ## Overview
//!
//! Turns blocks of raw interleaved IQ samples into signal readings. Each
//! read pulls one block of `block_samples` samples from an [`IqSource`],
//! normalizes them to `[-1, 1]` and measures the mean power:
//!
//! ```text
//! P      = (1/N) Σ (Iₖ² + Qₖ²)
//! dBFS   = 10·log10(P)
//! RSSI   = dBFS + full_scale_dbm        level at 0 dBFS, gain-dependent
//! SNR    = RSSI - noise_floor_dbm       when a noise floor is configured
//! ```
//!
//! ## Sample Formats
//!
//! | Format | Bytes/sample | Scaling                         |
//! |--------|--------------|---------------------------------|
//! | `cu8`  | 2            | `(b - 127.5) / 127.5` (RTL-SDR) |
//! | `ci16` | 4            | `i16 LE / 32768`                |
//! | `cf32` | 8            | `f32 LE` as is                  |
//!
//! A source that has reached its end reports `Unavailable`, unless the
//! backend loops, in which case the source is rewound and read again.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use wardf_core::Protocol;

use crate::antenna::{AntennaBackend, BackendKind, Health, SignalReading};
use crate::error::BackendError;

/// Floor applied to block power so silence maps to a finite level
const MIN_POWER: f64 = 1e-20;

/// Interleaved IQ sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IqFormat {
    /// Unsigned 8-bit, DC at 127.5
    #[default]
    Cu8,
    /// Signed 16-bit little-endian
    Ci16,
    /// 32-bit float little-endian
    Cf32,
}

impl IqFormat {
    /// Size of one I/Q pair in bytes
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            IqFormat::Cu8 => 2,
            IqFormat::Ci16 => 4,
            IqFormat::Cf32 => 8,
        }
    }

    /// Parse a format name (`cu8`/`rtlsdr`, `ci16`/`sc16`, `cf32`/`float`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cu8" | "u8" | "rtlsdr" => Some(IqFormat::Cu8),
            "ci16" | "ci16_le" | "i16" | "sc16" => Some(IqFormat::Ci16),
            "cf32" | "cf32_le" | "f32" | "float" => Some(IqFormat::Cf32),
            _ => None,
        }
    }

    /// Decode one sample from exactly `bytes_per_sample` bytes
    fn decode(&self, b: &[u8]) -> (f64, f64) {
        match self {
            IqFormat::Cu8 => ((b[0] as f64 - 127.5) / 127.5, (b[1] as f64 - 127.5) / 127.5),
            IqFormat::Ci16 => (
                i16::from_le_bytes([b[0], b[1]]) as f64 / 32768.0,
                i16::from_le_bytes([b[2], b[3]]) as f64 / 32768.0,
            ),
            IqFormat::Cf32 => (
                f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
                f32::from_le_bytes([b[4], b[5], b[6], b[7]]) as f64,
            ),
        }
    }

    /// Mean power of the whole samples in `bytes`, `None` if there are none
    pub fn mean_power(&self, bytes: &[u8]) -> Option<f64> {
        let mut count = 0usize;
        let mut sum = 0.0;
        for chunk in bytes.chunks_exact(self.bytes_per_sample()) {
            let (i, q) = self.decode(chunk);
            sum += i * i + q * q;
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }
}

/// Source of raw IQ bytes
#[async_trait]
pub trait IqSource: Send {
    /// Fill as much of `buf` as possible; `Ok(0)` at end of stream
    async fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Go back to the start of the stream
    async fn rewind(&mut self) -> std::io::Result<()>;
}

/// IQ recording on disk
#[derive(Debug)]
pub struct FileIqSource {
    path: PathBuf,
    file: Option<File>,
}

impl FileIqSource {
    /// Source reading `path`, opened lazily on first read
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    /// Recording path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IqSource for FileIqSource {
    async fn read_block(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path).await?,
        };
        let file = self.file.insert(file);
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    async fn rewind(&mut self) -> std::io::Result<()> {
        if let Some(file) = &mut self.file {
            file.seek(SeekFrom::Start(0)).await?;
        }
        Ok(())
    }
}

/// Receiver settings of an [`SdrBackend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdrConfig {
    /// Sample encoding
    pub format: IqFormat,
    /// Samples per reading
    pub block_samples: usize,
    /// Tuned frequency (Hz)
    pub center_frequency_hz: f64,
    /// Input level that reaches 0 dBFS at the current gain (dBm)
    pub full_scale_dbm: f64,
    /// Receiver noise floor, for SNR (dBm)
    pub noise_floor_dbm: Option<f64>,
    /// Rewind at end of stream instead of reporting `Unavailable`
    pub looping: bool,
}

impl SdrConfig {
    /// Settings for `format` tuned to `center_frequency_hz`
    pub fn new(format: IqFormat, center_frequency_hz: f64) -> Self {
        Self {
            format,
            block_samples: 4096,
            center_frequency_hz,
            full_scale_dbm: 0.0,
            noise_floor_dbm: None,
            looping: false,
        }
    }

    /// Samples averaged per reading
    pub fn with_block_samples(mut self, block_samples: usize) -> Self {
        self.block_samples = block_samples.max(1);
        self
    }

    /// Level at 0 dBFS
    pub fn with_full_scale(mut self, full_scale_dbm: f64) -> Self {
        self.full_scale_dbm = full_scale_dbm;
        self
    }

    /// Noise floor for SNR
    pub fn with_noise_floor(mut self, noise_floor_dbm: f64) -> Self {
        self.noise_floor_dbm = Some(noise_floor_dbm);
        self
    }

    /// Loop the source
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Convert a mean block power to dBm
    pub fn power_to_dbm(&self, mean_power: f64) -> f64 {
        10.0 * mean_power.max(MIN_POWER).log10() + self.full_scale_dbm
    }
}

/// Antenna fed by an SDR front-end
pub struct SdrBackend {
    config: SdrConfig,
    source: Mutex<Box<dyn IqSource>>,
}

impl std::fmt::Debug for SdrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdrBackend").field("config", &self.config).finish()
    }
}

impl SdrBackend {
    /// Backend reading from `source`
    pub fn new(config: SdrConfig, source: impl IqSource + 'static) -> Self {
        Self {
            config,
            source: Mutex::new(Box::new(source)),
        }
    }

    /// Backend reading an IQ recording
    pub fn from_file(config: SdrConfig, path: impl AsRef<Path>) -> Self {
        Self::new(config, FileIqSource::new(path))
    }

    /// Receiver settings
    pub fn config(&self) -> &SdrConfig {
        &self.config
    }

    async fn next_block(&self) -> Result<Vec<u8>, BackendError> {
        let mut buf = vec![0u8; self.config.block_samples * self.config.format.bytes_per_sample()];
        let mut source = self.source.lock().await;
        let mut n = source.read_block(&mut buf).await?;
        if n < self.config.format.bytes_per_sample() && self.config.looping {
            debug!("sdr source exhausted, rewinding");
            source.rewind().await?;
            n = source.read_block(&mut buf).await?;
        }
        buf.truncate(n);
        Ok(buf)
    }
}

#[async_trait]
impl AntennaBackend for SdrBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sdr
    }

    async fn read_signal(&self) -> Result<SignalReading, BackendError> {
        let block = self.next_block().await?;
        let power = self
            .config
            .format
            .mean_power(&block)
            .ok_or_else(|| BackendError::unavailable("end of IQ stream"))?;
        if !power.is_finite() {
            return Err(BackendError::fault("IQ block contains non-finite samples"));
        }
        let rssi = self.config.power_to_dbm(power);
        trace!("sdr block: {} bytes, {:.1} dBm", block.len(), rssi);

        let reading = SignalReading::new(rssi, self.config.center_frequency_hz, Protocol::Sdr);
        Ok(match self.config.noise_floor_dbm {
            Some(floor) => reading.with_snr(rssi - floor),
            None => reading,
        })
    }

    fn supports_calibration(&self) -> bool {
        true
    }

    async fn report_health(&self) -> Health {
        if self.config.block_samples == 0 {
            return Health::Degraded("empty block size".into());
        }
        // lock only to see whether a read is in progress
        match self.source.try_lock() {
            Ok(_) => Health::Healthy,
            Err(_) => Health::Degraded("busy".into()),
        }
    }
}
