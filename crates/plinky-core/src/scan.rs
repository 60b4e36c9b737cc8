//! Active discovery by probing every host of an IPv4 network.
//!
//! Each candidate host gets its own task that opens a [`Session`], reads the
//! status and closes it again. Hosts that refuse, time out or answer with
//! anything other than a status are left out of the result. Results flow
//! over a channel to a single collector task that owns the map.

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use tokio::sync::{Semaphore, mpsc};
use tracing::debug;

use crate::{
    DEFAULT_PORT, DEFAULT_TIMEOUT,
    device::DeviceExt,
    error::Error,
    response::Sysinfo,
    transport::{Session, SessionConfig},
};

/// Options for [`scan_with`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Per-host bound on connecting and on the status exchange.
    pub timeout: Duration,
    /// Port probed on every host.
    pub port: u16,
    /// Maximum number of hosts probed at once; `None` probes all at once.
    pub concurrency: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            port: DEFAULT_PORT,
            concurrency: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Limits how many hosts are probed at once. Zero is treated as one.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit.max(1));
        self
    }
}

/// Returns the host addresses of an IPv4 CIDR block.
///
/// The network and broadcast addresses are excluded, so `/31` and `/32`
/// yield nothing. Host bits set in the address are ignored.
///
/// ```
/// use std::net::Ipv4Addr;
/// use plinky_core::scan::host_range;
///
/// let hosts: Vec<_> = host_range("192.168.1.0/30").unwrap().collect();
/// assert_eq!(hosts, [Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]);
/// ```
pub fn host_range(cidr: &str) -> Result<impl Iterator<Item = Ipv4Addr>, Error> {
    let invalid = || Error::InvalidNetwork(cidr.to_string());

    let (addr, prefix) = cidr.trim().split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }

    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    let network = u32::from(addr) & mask;
    let broadcast = network | !mask;

    Ok((network.saturating_add(1)..broadcast).map(Ipv4Addr::from))
}

/// Probes every host in `cidr` on port 9999 with one timeout per host.
///
/// Returns once every host has answered or failed. Per-host failures are
/// not reported; a host is either in the map with its status or absent.
///
/// ```no_run
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), plinky_core::Error> {
///     let found = plinky_core::scan("192.168.1.0/24", Duration::from_secs(2)).await?;
///     for (ip, status) in &found {
///         println!("{ip}: {} ({})", status.alias, status.model);
///     }
///     Ok(())
/// }
/// ```
pub async fn scan(cidr: &str, timeout: Duration) -> Result<HashMap<Ipv4Addr, Sysinfo>, Error> {
    scan_with(cidr, ScanOptions::new().with_timeout(timeout)).await
}

/// Like [`scan`], with a configurable port and concurrency limit.
pub async fn scan_with(
    cidr: &str,
    options: ScanOptions,
) -> Result<HashMap<Ipv4Addr, Sysinfo>, Error> {
    let hosts = host_range(cidr)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<(Ipv4Addr, Sysinfo)>();
    let collector = tokio::spawn(async move {
        let mut found = HashMap::new();
        while let Some((ip, status)) = rx.recv().await {
            found.insert(ip, status);
        }
        found
    });

    let limit = options.concurrency.map(|n| Arc::new(Semaphore::new(n)));
    let config = SessionConfig::new().with_timeout(options.timeout);

    let probes: Vec<_> = hosts
        .map(|ip| {
            let tx = tx.clone();
            let limit = limit.clone();
            let config = config.clone();
            let port = options.port;
            tokio::spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                match probe(ip, port, config).await {
                    Ok(status) => {
                        // The collector outlives every probe.
                        let _ = tx.send((ip, status));
                    }
                    Err(e) => debug!(host = %ip, error = %e, "no device"),
                }
            })
        })
        .collect();
    drop(tx);

    let probed = probes.len();
    for result in join_all(probes).await {
        if let Err(e) = result {
            debug!(error = %e, "probe task failed");
        }
    }

    let found = collector
        .await
        .map_err(|e| Error::Io(format!("scan collector failed: {e}")))?;
    debug!(network = cidr, probed, found = found.len(), "scan complete");
    Ok(found)
}

async fn probe(ip: Ipv4Addr, port: u16, config: SessionConfig) -> Result<Sysinfo, Error> {
    let address = SocketAddr::from((ip, port)).to_string();
    let mut session = Session::open(&address, config).await?;
    let status = session.get_status().await;
    let _ = session.close().await;
    status
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::testing::{SimulatedPlug, spawn_device};

    fn hosts(cidr: &str) -> Vec<Ipv4Addr> {
        host_range(cidr).unwrap().collect()
    }

    #[test]
    fn test_host_range_slash_24() {
        let range = hosts("192.168.1.0/24");
        assert_eq!(range.len(), 254);
        assert_eq!(range[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(range[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn test_host_range_ignores_host_bits() {
        let range = hosts("10.1.2.77/28");
        assert_eq!(range.len(), 14);
        assert_eq!(range[0], Ipv4Addr::new(10, 1, 2, 65));
        assert_eq!(range[13], Ipv4Addr::new(10, 1, 2, 78));
    }

    #[test]
    fn test_host_range_point_to_point_and_single_host() {
        assert!(hosts("10.0.0.0/31").is_empty());
        assert!(hosts("10.0.0.7/32").is_empty());
        assert!(hosts("255.255.255.255/32").is_empty());
        assert_eq!(hosts("10.0.0.0/30").len(), 2);
    }

    #[test]
    fn test_host_range_invalid() {
        for bad in [
            "10.0.0.0",
            "10.0.0.0/33",
            "10.0.0.0/",
            "10.0.0/24",
            "fe80::/64",
            "not-a-network/24",
        ] {
            assert!(
                matches!(host_range(bad), Err(Error::InvalidNetwork(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_scan_invalid_network() {
        let err = scan("192.168.1.0/40", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidNetwork(_)));
    }

    #[tokio::test]
    async fn test_scan_empty_network() {
        let found = scan("127.0.0.1/32", Duration::from_millis(10)).await.unwrap();
        assert!(found.is_empty());
    }

    async fn two_devices() -> u16 {
        let mut first = SimulatedPlug::single(true);
        first.set_alias("five");
        let (addr, _) = spawn_device("127.0.0.5:0", first).await;
        let port = addr.port();

        let mut second = SimulatedPlug::strip(&[("A", 0), ("B", 1)]);
        second.set_alias("nine");
        spawn_device(&format!("127.0.0.9:{port}"), second).await;
        port
    }

    #[tokio::test]
    async fn test_scan_finds_exactly_responding_hosts() {
        let port = two_devices().await;

        let found = scan_with(
            "127.0.0.0/28",
            ScanOptions::new()
                .with_port(port)
                .with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap();

        let keys: HashSet<_> = found.keys().copied().collect();
        assert_eq!(
            keys,
            HashSet::from([Ipv4Addr::new(127, 0, 0, 5), Ipv4Addr::new(127, 0, 0, 9)])
        );
        assert_eq!(found[&Ipv4Addr::new(127, 0, 0, 5)].alias, "five");

        // Status is aliased the same way as a direct query.
        let strip = &found[&Ipv4Addr::new(127, 0, 0, 9)];
        assert_eq!(strip.alias, "nine");
        assert_eq!(strip.relay_state, 1);
    }

    #[tokio::test]
    async fn test_scan_with_concurrency_limit() {
        let port = two_devices().await;

        let found = scan_with(
            "127.0.0.0/28",
            ScanOptions::new()
                .with_port(port)
                .with_timeout(Duration::from_secs(1))
                .with_concurrency(2),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_scan_options_defaults() {
        let options = ScanOptions::default();
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);
        assert_eq!(options.concurrency, None);
        assert_eq!(ScanOptions::new().with_concurrency(0).concurrency, Some(1));
    }
}
