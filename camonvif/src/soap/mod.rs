//! # SOAP 1.2 layer
//!
//! ONVIF speaks SOAP 1.2 over HTTP. Requests are built as element trees
//! with `xmltree` and serialized by the XML writer, so every text value is
//! escaped on the way out. Responses are decoded with `quick_xml::de` into
//! typed structs; namespace prefixes are ignored and only local names are
//! matched, which copes with the many prefix spellings found on cameras.
//!
//! ## Architecture
//!
//! - [`SoapEnvelope`]: request envelope builder (header blocks + body)
//! - [`Envelope`]: generic typed response envelope
//! - [`SoapFault`]: SOAP 1.2 fault, decoded from error responses
//!
//! ## Example
//!
//! ```
//! use camonvif::soap::{SoapEnvelope, operation, text_element};
//!
//! let mut body = operation("tds", camonvif::soap::ns::DEVICE, "GetCapabilities");
//! body.children.push(xmltree::XMLNode::Element(text_element("tds:Category", "All")));
//!
//! let xml = SoapEnvelope::new(body).to_xml().unwrap();
//! assert!(xml.contains("<tds:Category>All</tds:Category>"));
//! ```

mod builder;
mod fault;
mod parser;

pub use builder::{SoapEnvelope, element, operation, text_element};
pub use fault::{SoapFault, parse_fault};
pub use parser::{Envelope, IgnoredHeader, parse_envelope};

/// Namespaces used by the ONVIF and WS-Discovery messages
pub mod ns {
    /// SOAP 1.2 envelope
    pub const SOAP_ENVELOPE: &str = "http://www.w3.org/2003/05/soap-envelope";

    /// ONVIF device management service
    pub const DEVICE: &str = "http://www.onvif.org/ver10/device/wsdl";

    /// ONVIF media service
    pub const MEDIA: &str = "http://www.onvif.org/ver10/media/wsdl";

    /// ONVIF common schema
    pub const SCHEMA: &str = "http://www.onvif.org/ver10/schema";

    /// WS-Addressing (2004/08, as used by WS-Discovery 2005/04)
    pub const ADDRESSING: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";

    /// WS-Discovery 2005/04
    pub const DISCOVERY: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";

    /// WS-Security secext
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

    /// WS-Security utility
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
}
