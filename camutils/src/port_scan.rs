//! Concurrent TCP connect scan over local prefixes.

use std::collections::BTreeSet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use ipnet::Ipv4Net;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{Result, ScanError};
use crate::ip_utils::NetworkInterface;

/// Prefixes holding more addresses than this are not scanned.
pub const MAX_SCAN_HOSTS: u64 = 256;

/// Connect timeout for a single candidate.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(50);

/// Returns every address contained in `prefix`, network and broadcast
/// addresses included, in ascending order.
///
/// The prefix is truncated first, so `192.168.1.42/30` yields
/// `192.168.1.40..=192.168.1.43`. The caller is responsible for not
/// expanding huge prefixes, see [`MAX_SCAN_HOSTS`].
pub fn hosts_in_prefix(prefix: Ipv4Net) -> Vec<Ipv4Addr> {
    let network = prefix.trunc();
    let first = u32::from(network.network());
    let last = u32::from(network.broadcast());
    (first..=last).map(Ipv4Addr::from).collect()
}

fn prefix_size(prefix: &Ipv4Net) -> u64 {
    1u64 << (32 - u32::from(prefix.prefix_len()))
}

/// TCP connect scanner for a single port.
#[derive(Debug, Clone)]
pub struct PortScanner {
    port: u16,
    connect_timeout: Duration,
}

impl PortScanner {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Builds the deduplicated candidate set for the given interfaces.
    ///
    /// Prefixes larger than [`MAX_SCAN_HOSTS`] addresses are skipped and
    /// logged, they contribute nothing.
    pub fn candidates(&self, interfaces: &[NetworkInterface]) -> BTreeSet<SocketAddrV4> {
        let mut candidates = BTreeSet::new();

        for iface in interfaces {
            let count = prefix_size(&iface.prefix);
            if count > MAX_SCAN_HOSTS {
                info!(
                    iface = %iface.name,
                    cidr = %iface.prefix,
                    count,
                    "ignoring interface with too many IPs"
                );
                continue;
            }

            info!(
                iface = %iface.name,
                cidr = %iface.prefix,
                count,
                "scanning candidate IPs on interface"
            );
            candidates.extend(
                hosts_in_prefix(iface.prefix)
                    .into_iter()
                    .map(|ip| SocketAddrV4::new(ip, self.port)),
            );
        }

        candidates
    }

    /// Scans every candidate of `interfaces` and returns the open ones.
    pub async fn scan(&self, interfaces: &[NetworkInterface]) -> Result<Vec<SocketAddrV4>> {
        let candidates = self.candidates(interfaces);
        scan_candidates(candidates, self.connect_timeout).await
    }
}

/// Tests all `candidates` concurrently, one task each.
///
/// Returns the open addresses sorted. The first resource exhaustion error
/// cancels the tasks still connecting and is returned once every task has
/// finished.
pub async fn scan_candidates<I>(candidates: I, timeout: Duration) -> Result<Vec<SocketAddrV4>>
where
    I: IntoIterator<Item = SocketAddrV4>,
{
    let token = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for addr in candidates {
        let token = token.clone();
        tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Ok((addr, false)),
                res = is_port_open(SocketAddr::V4(addr), timeout) => res.map(|open| (addr, open)),
            }
        });
    }
    debug!(tasks = tasks.len(), "port scan started");

    let mut open = Vec::new();
    let mut failure = None;

    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok((addr, true)) => {
                info!(candidate = %addr, "found open port");
                open.push(addr);
            }
            Ok((_, false)) => {}
            Err(e) => {
                if failure.is_none() {
                    error!(error = %e, "port scan aborted");
                    token.cancel();
                    failure = Some(e);
                }
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => {
            open.sort();
            Ok(open)
        }
    }
}

/// Checks whether a TCP connection to `addr` can be established within
/// `timeout`. The connection is closed right away.
///
/// Refused, unreachable and timed out connections all read as `Ok(false)`.
/// Only local resource exhaustion is an error.
pub async fn is_port_open(addr: SocketAddr, timeout: Duration) -> Result<bool> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(true)
        }
        Ok(Err(e)) if is_resource_exhaustion(&e) => Err(ScanError::ResourceExhausted {
            address: addr.to_string(),
            source: e,
        }),
        Ok(Err(e)) => {
            trace!(candidate = %addr, error = %e, "port closed");
            Ok(false)
        }
        Err(_) => Ok(false),
    }
}

fn is_resource_exhaustion(err: &io::Error) -> bool {
    #[cfg(unix)]
    if matches!(err.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE)) {
        return true;
    }
    err.to_string()
        .to_ascii_lowercase()
        .contains("too many open files")
}
