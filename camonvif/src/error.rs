//! Error types for the ONVIF client and the WS-Discovery prober

use std::io;
use std::net::Ipv4Addr;

use crate::soap::SoapFault;

/// Errors raised by a SOAP exchange with a device
#[derive(Debug, thiserror::Error)]
pub enum OnvifError {
    /// The HTTP client could not be built
    #[error("unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or no response arrived in time
    #[error("{action}: request to {url} failed: {source}")]
    Transport {
        action: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success status
    #[error("{action}: HTTP {status}{}", fault_suffix(.fault))]
    Status {
        action: String,
        status: u16,
        fault: Option<SoapFault>,
    },

    /// The response body did not have the expected shape
    #[error("{action}: unable to parse response: {source} (body: {snippet:?})")]
    Parse {
        action: String,
        #[source]
        source: quick_xml::DeError,
        snippet: String,
    },

    /// The request envelope could not be serialized
    #[error("unable to build SOAP envelope: {0}")]
    Envelope(#[from] xmltree::Error),

    /// The device reported a date that does not exist
    #[error("invalid device date and time: {0}")]
    InvalidDateTime(String),
}

fn fault_suffix(fault: &Option<SoapFault>) -> String {
    match fault {
        Some(f) => format!(": {}", f),
        None => String::new(),
    }
}

impl OnvifError {
    /// True for authentication rejections (401, or a NotAuthorized fault).
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Status { status: 401, .. } => true,
            Self::Status {
                fault: Some(fault), ..
            } => fault
                .subcode
                .as_deref()
                .is_some_and(|s| s.ends_with("NotAuthorized")),
            _ => false,
        }
    }
}

/// Errors raised while probing one interface with WS-Discovery.
///
/// All of them are fatal for that interface only.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("unable to open discovery socket: {0}")]
    Bind(#[source] io::Error),

    #[error("unable to join multicast group {group} on {interface}: {source}")]
    JoinGroup {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("unable to configure multicast on {interface}: {source}")]
    Multicast {
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("unable to send discovery probe: {0}")]
    Send(#[source] io::Error),

    #[error("error reading discovery response: {0}")]
    Receive(#[source] io::Error),

    #[error("unable to build discovery probe: {0}")]
    Envelope(#[from] xmltree::Error),
}
