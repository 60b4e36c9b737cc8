//! Error types for plinky-core.
//!
//! Every fallible operation in the crate returns [`Error`]. The variants are
//! grouped so callers can tell "the device is unreachable" apart from "the
//! device answered but does not support this".

use chrono::NaiveDateTime;
use thiserror::Error;

/// Error type for plinky-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection to the device failed (refused, unreachable, closed early).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or exchange deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(String),

    /// A framed buffer was shorter than its 4-byte length prefix.
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// A payload was too long for the 4-byte length prefix.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// The reply could not be decoded into a response.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The command could not be serialized.
    #[error("failed to serialize command: {0}")]
    Serialize(String),

    /// The reply did not contain `system.get_sysinfo`.
    #[error("response did not contain sysinfo")]
    StatusMissing,

    /// The reply did not contain the requested time branch.
    ///
    /// `fallback` is the local clock reading taken when the query failed.
    #[error("time query failed (local fallback {fallback})")]
    TimeQueryFailed {
        /// Best-effort local timestamp, truncated to whole seconds.
        fallback: NaiveDateTime,
    },

    /// The reply did not contain `netif.get_scaninfo`.
    #[error("WiFi scan unavailable")]
    ScanUnavailable,

    /// The device has no energy meter.
    #[error("no energy meter")]
    NoEnergyMeter,

    /// The device answered with a non-zero `err_code`.
    #[error("device reported error {code}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    DeviceReported {
        /// The device's error code.
        code: i32,
        /// The device's `err_msg`, if any.
        message: Option<String>,
    },

    /// A socket index does not exist on the device.
    #[error("socket={index} not found in {count} sockets")]
    SocketOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of sockets the device reported.
        count: usize,
    },

    /// The network to scan is not a valid IPv4 CIDR block.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// The session is closed or was never opened.
    #[error("not open")]
    NotOpen,
}

impl Error {
    /// Returns true for connectivity failures (connect, timeout, I/O).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::Timeout(_) | Error::Io(_)
        )
    }

    /// Returns true when the device answered but declined the request.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::StatusMissing
                | Error::TimeQueryFailed { .. }
                | Error::ScanUnavailable
                | Error::NoEnergyMeter
                | Error::DeviceReported { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}
