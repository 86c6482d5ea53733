//! Merges discovered endpoints and open ports into one probe list

use std::collections::HashSet;
use std::net::SocketAddrV4;

use tracing::trace;
use url::Url;

/// Path of the device service on a plain host
pub const DEVICE_SERVICE_PATH: &str = "/onvif/device_service";

/// Device service URL guessed for an address with an open port.
pub fn device_service_url(addr: SocketAddrV4) -> String {
    format!("http://{}{}", addr, DEVICE_SERVICE_PATH)
}

/// Comparison key of an endpoint: the URL as the `url` crate serializes
/// it, so an explicit default port matches an implicit one.
fn normalize(endpoint: &str) -> String {
    Url::parse(endpoint)
        .map(String::from)
        .unwrap_or_else(|_| endpoint.to_string())
}

/// Ordered set of device service URLs.
///
/// Each endpoint is yielded once, in first-seen order. Discovered endpoints
/// are usually added first.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    seen: HashSet<String>,
    endpoints: Vec<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `endpoint`, returns false if it was already there.
    pub fn insert(&mut self, endpoint: impl Into<String>) -> bool {
        let endpoint = endpoint.into();
        if !self.seen.insert(normalize(&endpoint)) {
            trace!(endpoint = %endpoint, "duplicate candidate");
            return false;
        }
        self.endpoints.push(endpoint);
        true
    }

    pub fn extend_discovered<I>(&mut self, endpoints: I)
    where
        I: IntoIterator<Item = String>,
    {
        for endpoint in endpoints {
            self.insert(endpoint);
        }
    }

    pub fn extend_open_ports<I>(&mut self, addrs: I)
    where
        I: IntoIterator<Item = SocketAddrV4>,
    {
        for addr in addrs {
            self.insert(device_service_url(addr));
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(String::as_str)
    }
}

impl IntoIterator for CandidateSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}
