//! TCP session to a single device.
//!
//! A session owns one connection to the device's control port (9999):
//! - Each request is compact JSON framed with the [`codec`](crate::codec)
//! - The whole write + read is bounded by one deadline
//! - No authentication is required
//!
//! The connection stays open between exchanges until [`Session::close`].
//! An exchange that times out or fails mid-flight drops the connection: a
//! late reply or half-written request would otherwise be paired with the
//! next request.

use std::{
    net::{IpAddr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use crate::{
    DEFAULT_PORT,
    codec::{HEADER_LEN, check_payload_len, decode, encode},
    command::Command,
    error::Error,
    response::Response,
    transport::{FramePolicy, SessionConfig, Transport},
};

/// Size of each read when accumulating a reply.
pub const READ_CHUNK: usize = 1028;

/// Upper bound on a length-prefixed reply.
const MAX_RESPONSE_LEN: usize = 1024 * 1024;

/// An open connection to one device.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use plinky_core::{DeviceExt, Session};
///
/// #[tokio::main]
/// async fn main() -> Result<(), plinky_core::Error> {
///     let mut session = Session::connect("192.168.1.100", Duration::from_secs(2)).await?;
///     let status = session.get_status().await?;
///     println!("{} is {}", status.alias, if status.is_on() { "on" } else { "off" });
///     session.close().await
/// }
/// ```
#[derive(Debug)]
pub struct Session {
    target: String,
    stream: Option<TcpStream>,
    config: SessionConfig,
}

impl Session {
    /// Dials a device.
    ///
    /// `address` may omit the port, in which case [`DEFAULT_PORT`] is used.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the connect deadline elapses,
    /// [`Error::ConnectionFailed`] if the device refuses or is unreachable.
    pub async fn open(address: &str, config: SessionConfig) -> Result<Self, Error> {
        let target = normalize_address(address);
        debug!(addr = %target, "connecting");

        let stream = timeout(config.timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| Error::Timeout(format!("connecting to {target}")))?
            .map_err(|e| Error::ConnectionFailed(format!("{target}: {e}")))?;

        debug!(addr = %target, "connected");
        Ok(Self {
            target,
            stream: Some(stream),
            config,
        })
    }

    /// Dials a device using `timeout` for both connect and exchanges.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, Error> {
        Self::open(address, SessionConfig::new().with_timeout(timeout)).await
    }

    /// Returns true until [`close`](Self::close) is called or an exchange
    /// fails in transit.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] if the session was already closed.
    pub async fn close(&mut self) -> Result<(), Error> {
        let mut stream = self.stream.take().ok_or(Error::NotOpen)?;
        debug!(addr = %self.target, "closing");
        stream.shutdown().await?;
        Ok(())
    }

    /// Performs one exchange bounded by `deadline` instead of the configured
    /// exchange timeout.
    ///
    /// The deadline only applies to this call.
    ///
    /// # Errors
    ///
    /// On [`Error::Timeout`] or any failure while writing or reading, the
    /// connection is dropped and later calls return [`Error::NotOpen`].
    /// A reply that arrives but does not parse leaves the session open.
    pub async fn exchange_with_timeout(
        &mut self,
        command: &Command,
        deadline: Duration,
    ) -> Result<Response, Error> {
        let policy = self.config.frame_policy;
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        let json = command.to_json()?;
        check_payload_len(json.len())?;
        let request = encode(&json);
        debug!(addr = %self.target, bytes = request.len(), "sending request");

        let outcome = match timeout(deadline, round_trip(stream, &request, policy)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("exchange with {}", self.target))),
        };
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                debug!(addr = %self.target, error = %e, "exchange failed, dropping connection");
                self.stream = None;
                return Err(e);
            }
        };
        debug!(addr = %self.target, bytes = reply.len(), "received response");

        parse_reply(&reply)
    }
}

#[async_trait]
impl Transport for Session {
    async fn exchange(&mut self, command: &Command) -> Result<Response, Error> {
        let deadline = self.config.exchange_timeout;
        self.exchange_with_timeout(command, deadline).await
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Appends the control port when `address` has none.
///
/// Scoped IPv6 literals are bracketed with their zone kept. Only numeric
/// zones (`fe80::1%2`) can be dialed; interface names are not resolved.
///
/// ```
/// use plinky_core::transport::session::normalize_address;
///
/// assert_eq!(normalize_address("192.168.1.100"), "192.168.1.100:9999");
/// assert_eq!(normalize_address("192.168.1.100:10000"), "192.168.1.100:10000");
/// assert_eq!(normalize_address("plug.local"), "plug.local:9999");
/// assert_eq!(normalize_address("fe80::1"), "[fe80::1]:9999");
/// assert_eq!(normalize_address("fe80::1%2"), "[fe80::1%2]:9999");
/// ```
pub fn normalize_address(address: &str) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if let Some((ip, _zone)) = address.split_once('%') {
        if ip.parse::<Ipv6Addr>().is_ok() {
            return format!("[{address}]:{DEFAULT_PORT}");
        }
    }
    match address.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok() =>
        {
            address.to_string()
        }
        _ => format!("{address}:{DEFAULT_PORT}"),
    }
}

async fn round_trip<S>(stream: &mut S, request: &[u8], policy: FramePolicy) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await?;
    stream.flush().await?;

    match policy {
        FramePolicy::ShortRead => read_until_short(stream).await,
        FramePolicy::LengthPrefixed => read_length_prefixed(stream).await,
    }
}

/// Accumulates reads until one comes back shorter than [`READ_CHUNK`].
async fn read_until_short<R>(reader: &mut R) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 && reply.is_empty() {
            return Err(Error::ConnectionFailed(
                "connection closed before reply".into(),
            ));
        }
        reply.extend_from_slice(&chunk[..n]);
        if n < READ_CHUNK {
            return Ok(reply);
        }
    }
}

/// Reads the length prefix, then exactly the declared number of bytes.
async fn read_length_prefixed<R>(reader: &mut R) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let declared = i32::from_be_bytes(header);
    let payload_len = usize::try_from(declared)
        .map_err(|_| Error::MalformedResponse(format!("negative length {declared}")))?;
    debug!(payload_bytes = payload_len, "response payload length");

    if payload_len > MAX_RESPONSE_LEN {
        return Err(Error::MalformedResponse(format!(
            "response too large: {payload_len} bytes"
        )));
    }

    let mut reply = vec![0u8; HEADER_LEN + payload_len];
    reply[..HEADER_LEN].copy_from_slice(&header);
    reader.read_exact(&mut reply[HEADER_LEN..]).await?;
    Ok(reply)
}

fn parse_reply(reply: &[u8]) -> Result<Response, Error> {
    let plaintext = decode(reply)?;
    serde_json::from_slice(&plaintext).map_err(|e| Error::MalformedResponse(e.to_string()))
}
