//! Transport layer for communicating with devices.
//!
//! [`Session`] is the TCP implementation: one connection to one device on
//! port 9999, framed with the [`codec`](crate::codec). Device operations are
//! written against the [`Transport`] trait so they can run over any
//! exchange-capable connection.

pub mod session;

pub use session::Session;

use std::time::Duration;

use async_trait::async_trait;

use crate::{DEFAULT_TIMEOUT, command::Command, error::Error, response::Response};

/// How the end of a reply is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Keep reading until a read returns less than a full buffer.
    ///
    /// This matches how devices flush a reply in one burst. A reply that
    /// exactly fills the last read buffer makes the session wait for the
    /// exchange deadline.
    #[default]
    ShortRead,
    /// Read the 4-byte length prefix, then exactly that many bytes.
    LengthPrefixed,
}

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on establishing the TCP connection.
    pub timeout: Duration,
    /// Bound on one whole write + read exchange.
    pub exchange_timeout: Duration,
    /// Reply framing policy.
    pub frame_policy: FramePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Creates a configuration using [`DEFAULT_TIMEOUT`] for connect and exchange.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            exchange_timeout: DEFAULT_TIMEOUT,
            frame_policy: FramePolicy::default(),
        }
    }

    /// Sets both the connect and exchange timeouts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.exchange_timeout = timeout;
        self
    }

    /// Sets only the exchange timeout.
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Sets the reply framing policy.
    pub fn with_frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame_policy = policy;
        self
    }
}

/// A request/response channel to one device.
///
/// Implementations handle one exchange at a time; `&mut self` keeps callers
/// from overlapping requests.
#[async_trait]
pub trait Transport: Send {
    /// Sends a command and returns the decoded response.
    async fn exchange(&mut self, command: &Command) -> Result<Response, Error>;

    /// Returns the device address, including port.
    fn target(&self) -> &str;
}
