//! Error taxonomy shared by discovery, handshake, and capture

use std::time::Duration;
use thiserror::Error;

use crate::frame::Channel;

/// Failures reported by device-facing operations.
///
/// Discovery and handshake failures are always turned into a status at the
/// boundary; capture failures either abort a start attempt or drop a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device not found")]
    NotFound,
    #[error("Driver missing")]
    DriverMissing,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    /// Only noise arrived before the deadline
    #[error("Unexpected data: {}", .0.join(" | "))]
    UnexpectedData(Vec<String>),
    #[error("Cannot convert {channel} frame: {reason}")]
    ConversionImpossible { channel: Channel, reason: String },
    /// Opaque failure raised by the camera driver
    #[error("Driver error: {0}")]
    Driver(String),
}

impl DeviceError {
    /// Whether simply trying again later may succeed.
    ///
    /// A missing driver or a malformed buffer layout will not fix itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound
            | Self::Transport(_)
            | Self::Timeout(_)
            | Self::UnexpectedData(_)
            | Self::Driver(_) => true,
            Self::DriverMissing | Self::ConversionImpossible { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DeviceError::Timeout(Duration::from_secs(3)).is_retryable());
        assert!(DeviceError::Transport("port busy".into()).is_retryable());
        assert!(!DeviceError::DriverMissing.is_retryable());
        assert!(!DeviceError::ConversionImpossible {
            channel: Channel::Depth,
            reason: "odd length".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_unexpected_data_message() {
        let err = DeviceError::UnexpectedData(vec!["BOOT".into(), "MPY: soft reboot".into()]);
        assert_eq!(err.to_string(), "Unexpected data: BOOT | MPY: soft reboot");
    }
}
