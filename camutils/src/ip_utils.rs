use std::collections::HashSet;
use std::fmt;

use get_if_addrs::{IfAddr, get_if_addrs};
use ipnet::Ipv4Net;
use tracing::{debug, trace};

use crate::error::{Result, ScanError};

/// A local interface carrying a private IPv4 address.
///
/// `prefix` keeps the interface's own address together with its mask
/// length (`192.168.1.42/24`), it is not truncated to the network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub prefix: Ipv4Net,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, prefix: Ipv4Net) -> Self {
        Self {
            name: name.into(),
            prefix,
        }
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.prefix)
    }
}

/// Lists the interfaces that have a private, non-loopback IPv4 address.
///
/// Reads the OS interface table through `get_if_addrs` and keeps, for each
/// interface, the first qualifying address in CIDR form.
///
/// # Errors
///
/// Returns [`ScanError::Interfaces`] when the interface table cannot be read.
pub fn private_ipv4_interfaces() -> Result<Vec<NetworkInterface>> {
    let interfaces = get_if_addrs().map_err(ScanError::Interfaces)?;
    let found = select_private_prefixes(interfaces.into_iter().map(|i| (i.name, i.addr)));
    debug!(count = found.len(), "private IPv4 interfaces found");
    Ok(found)
}

/// Filtering half of [`private_ipv4_interfaces`], independent of the OS.
///
/// Entries are visited in order; an interface name appearing again after it
/// already qualified is ignored.
pub fn select_private_prefixes<I>(addrs: I) -> Vec<NetworkInterface>
where
    I: IntoIterator<Item = (String, IfAddr)>,
{
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for (name, addr) in addrs {
        if seen.contains(&name) {
            continue;
        }

        let IfAddr::V4(v4) = addr else {
            continue;
        };

        if v4.ip.is_loopback() || !v4.ip.is_private() {
            trace!(iface = %name, ip = %v4.ip, "skipping non private address");
            continue;
        }

        match Ipv4Net::with_netmask(v4.ip, v4.netmask) {
            Ok(prefix) => {
                seen.insert(name.clone());
                found.push(NetworkInterface::new(name, prefix));
            }
            Err(e) => {
                debug!(iface = %name, netmask = %v4.netmask, error = %e, "invalid netmask, skipping");
            }
        }
    }

    found
}
