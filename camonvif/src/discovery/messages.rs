//! Messages WS-Discovery : Probe sortant et ProbeMatches entrants

use std::net::IpAddr;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;
use xmltree::XMLNode;

use crate::soap::{Envelope, SoapEnvelope, element, ns, parse_envelope, text_element};

/// Type token a device must advertise to be kept
pub const VIDEO_TRANSMITTER_TYPE: &str = "NetworkVideoTransmitter";

const PROBE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
const DISCOVERY_TO: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";

/// Builds the Probe envelope, `urn:uuid:<message_id>` being its MessageID.
///
/// The probe carries no type filter: some devices only answer untyped
/// probes, filtering happens on the matches.
pub fn build_probe(message_id: &Uuid) -> Result<String, xmltree::Error> {
    let mut probe = element("d:Probe");
    probe
        .attributes
        .insert("xmlns:d".to_string(), ns::DISCOVERY.to_string());
    probe.children = vec![
        XMLNode::Element(element("d:Types")),
        XMLNode::Element(element("d:Scopes")),
    ];

    SoapEnvelope::new(probe)
        .with_namespace("a", ns::ADDRESSING)
        .with_header(text_element("a:Action", PROBE_ACTION))
        .with_header(text_element("a:MessageID", &format!("urn:uuid:{}", message_id)))
        .with_header(text_element("a:To", DISCOVERY_TO))
        .to_xml()
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryHeader {
    #[serde(rename = "RelatesTo", default)]
    pub relates_to: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscoveryBody {
    #[serde(rename = "ProbeMatches", default)]
    pub probe_matches: Option<ProbeMatches>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeMatches {
    #[serde(rename = "ProbeMatch", default)]
    pub matches: Vec<ProbeMatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeMatch {
    #[serde(rename = "EndpointReference", default)]
    pub endpoint_reference: EndpointReference,

    #[serde(rename = "Types", default)]
    pub types: String,

    #[serde(rename = "Scopes", default)]
    pub scopes: String,

    #[serde(rename = "XAddrs", default)]
    pub xaddrs: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointReference {
    #[serde(rename = "Address", default)]
    pub address: String,
}

/// Parses one response datagram and returns the corrected endpoints of the
/// video transmitters it advertises.
///
/// A response whose `RelatesTo` does not contain `message_id` yields
/// nothing. Each kept endpoint has its host replaced by `source`, the
/// address the datagram came from.
pub fn select_transmitters(
    xml: &str,
    message_id: &Uuid,
    source: IpAddr,
) -> Result<Vec<String>, quick_xml::DeError> {
    let envelope: Envelope<DiscoveryBody, DiscoveryHeader> = parse_envelope(xml)?;

    let relates_to = envelope.header.unwrap_or_default().relates_to;
    if !relates_to.contains(&message_id.to_string()) {
        warn!(relates_to = %relates_to, "discovery response does not match probe, ignoring");
        return Ok(Vec::new());
    }

    let matches = envelope
        .body
        .probe_matches
        .map(|m| m.matches)
        .unwrap_or_default();

    let mut endpoints = Vec::new();
    for m in matches {
        if !m.types.contains(VIDEO_TRANSMITTER_TYPE) {
            debug!(types = %m.types, "not a video transmitter, skipping");
            continue;
        }

        match rewrite_xaddr(&m.xaddrs, source) {
            Some(endpoint) => {
                debug!(
                    endpoint = %endpoint,
                    reference = %m.endpoint_reference.address,
                    scopes = %m.scopes,
                    "video transmitter matched"
                );
                endpoints.push(endpoint);
            }
            None => {
                warn!(xaddrs = %m.xaddrs, "no usable XAddr, skipping");
            }
        }
    }

    Ok(endpoints)
}

/// Takes the first XAddr that parses as a URL and points it at `source`,
/// keeping the advertised port or using 80.
pub fn rewrite_xaddr(xaddrs: &str, source: IpAddr) -> Option<String> {
    xaddrs.split_whitespace().find_map(|candidate| {
        let mut url = Url::parse(candidate).ok()?;
        if !url.has_host() {
            return None;
        }
        let port = url.port().unwrap_or(80);
        url.set_ip_host(source).ok()?;
        url.set_port(Some(port)).ok()?;
        Some(url.to_string())
    })
}
