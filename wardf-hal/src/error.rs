//! HAL error types
//!
//! Two levels, matching how the engine treats hardware trouble:
//!
//! - [`BackendError`] is what a single backend read reports. `Unavailable`
//!   is expected (adapter absent, busy, end of capture) and never escalates.
//!   `Fault` is a genuine I/O or driver error.
//! - [`HardwareFault`] is what an [`Antenna`](crate::Antenna) reports after
//!   the retry budget is spent, or when polled while marked offline.

use thiserror::Error;

use wardf_core::AntennaId;

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HardwareFault>;

/// Outcome of one failed backend read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Hardware absent or busy; not a fault
    #[error("Hardware unavailable: {0}")]
    Unavailable(String),

    /// Read errored
    #[error("Hardware fault: {0}")]
    Fault(String),
}

impl BackendError {
    /// Build an `Unavailable` from anything printable
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BackendError::Unavailable(reason.into())
    }

    /// Build a `Fault` from anything printable
    pub fn fault(reason: impl Into<String>) -> Self {
        BackendError::Fault(reason.into())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::WouldBlock => {
                BackendError::Unavailable(err.to_string())
            }
            _ => BackendError::Fault(err.to_string()),
        }
    }
}

/// Antenna-level hardware failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareFault {
    /// Read failed on every attempt; the antenna is now offline
    #[error("Antenna {antenna} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// Failing antenna
        antenna: AntennaId,
        /// Attempts made, including the retry
        attempts: u32,
        /// Last fault reported by the backend
        reason: String,
    },

    /// Antenna is marked offline until re-probed or reconfigured
    #[error("Antenna {0} is offline")]
    Offline(AntennaId),

    /// No antenna with this id is registered
    #[error("Unknown antenna {0}")]
    UnknownAntenna(AntennaId),
}

impl HardwareFault {
    /// Antenna the fault refers to
    pub fn antenna(&self) -> &str {
        match self {
            HardwareFault::RetriesExhausted { antenna, .. } => antenna,
            HardwareFault::Offline(antenna) | HardwareFault::UnknownAntenna(antenna) => antenna,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_by_kind() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(BackendError::from(missing), BackendError::Unavailable(_)));

        let broken = std::io::Error::new(std::io::ErrorKind::InvalidData, "garbled");
        assert!(matches!(BackendError::from(broken), BackendError::Fault(_)));
    }

    #[test]
    fn fault_names_antenna() {
        let fault = HardwareFault::RetriesExhausted {
            antenna: "wlan0".into(),
            attempts: 2,
            reason: "ioctl failed".into(),
        };
        assert_eq!(fault.antenna(), "wlan0");
        assert_eq!(
            fault.to_string(),
            "Antenna wlan0 failed after 2 attempts: ioctl failed"
        );
    }
}
