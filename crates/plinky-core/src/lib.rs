//! Core library for controlling smart power relays on the local network.
//!
//! Devices speak a small JSON protocol over TCP port 9999. Every message is
//! obfuscated with an XOR autokey cipher (initial key 171) and prefixed with
//! a 4-byte big-endian length header.
//!
//! # Overview
//!
//! - [`codec`] encodes and decodes the wire frame.
//! - [`command`] and [`response`] are the typed JSON message trees.
//! - [`Session`] holds one TCP connection to one device.
//! - [`DeviceExt`] provides the device operations on any [`Transport`].
//! - [`scan`] probes every host of an IPv4 network concurrently.
//!
//! # Example
//!
//! ```no_run
//! use plinky_core::{DeviceExt, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), plinky_core::Error> {
//!     let mut session = Session::open("192.168.1.100", SessionConfig::new()).await?;
//!
//!     let status = session.get_status().await?;
//!     println!("{} ({}) on={}", status.alias, status.model, status.is_on());
//!
//!     // Only writes if the relay is currently off.
//!     session.set_relay(true).await?;
//!
//!     session.close().await
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod command;
pub mod control;
pub mod device;
pub mod error;
pub mod response;
pub mod scan;
pub mod transport;

#[cfg(test)]
mod testing;

pub use device::DeviceExt;
pub use error::Error;
pub use response::{AccessPoint, Child, EnergyReading, Sysinfo, TimeZone};
pub use scan::{ScanOptions, scan, scan_with};
pub use transport::{FramePolicy, Session, SessionConfig, Transport};

/// The version of the plinky-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TCP port devices listen on.
pub const DEFAULT_PORT: u16 = 9999;

/// Default bound for connecting and for one request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Security type for WiFi networks.
///
/// Reported in scan results and sent when joining a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum KeyType {
    /// Open network
    None = 0,
    Wep = 1,
    Wpa = 2,
    /// WPA2-PSK, used when joining a network
    #[default]
    Wpa2 = 3,
}

impl From<KeyType> for u8 {
    fn from(key_type: KeyType) -> Self {
        key_type as u8
    }
}

impl TryFrom<u8> for KeyType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyType::None),
            1 => Ok(KeyType::Wep),
            2 => Ok(KeyType::Wpa),
            3 => Ok(KeyType::Wpa2),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::None => "open",
            KeyType::Wep => "WEP",
            KeyType::Wpa => "WPA",
            KeyType::Wpa2 => "WPA2",
        };
        f.write_str(name)
    }
}
