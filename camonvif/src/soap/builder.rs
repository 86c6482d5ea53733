//! Construction des enveloppes SOAP

use xmltree::{Element, XMLNode};

use super::ns;

/// Creates an empty element with a (possibly prefixed) name.
pub fn element(name: &str) -> Element {
    Element::new(name)
}

/// Creates `<name>text</name>`. The text is escaped when written.
pub fn text_element(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

/// Creates an operation element declaring its own namespace prefix,
/// e.g. `<tds:GetCapabilities xmlns:tds="...">`.
pub fn operation(prefix: &str, namespace: &str, name: &str) -> Element {
    let mut elem = Element::new(&format!("{}:{}", prefix, name));
    elem.attributes
        .insert(format!("xmlns:{}", prefix), namespace.to_string());
    elem
}

/// SOAP 1.2 request envelope
///
/// Header blocks are optional; the `s:Header` element is only written when
/// at least one block is present.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    namespaces: Vec<(String, String)>,
    header: Vec<Element>,
    body: Element,
}

impl SoapEnvelope {
    pub fn new(body: Element) -> Self {
        Self {
            namespaces: Vec::new(),
            header: Vec::new(),
            body,
        }
    }

    /// Declares an extra namespace prefix on the envelope element.
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        self
    }

    /// Appends a header block.
    pub fn with_header(mut self, block: Element) -> Self {
        self.header.push(block);
        self
    }

    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    fn to_element(&self) -> Element {
        let mut envelope = Element::new("s:Envelope");
        envelope
            .attributes
            .insert("xmlns:s".to_string(), ns::SOAP_ENVELOPE.to_string());
        for (prefix, uri) in &self.namespaces {
            envelope
                .attributes
                .insert(format!("xmlns:{}", prefix), uri.clone());
        }

        if !self.header.is_empty() {
            let mut header = Element::new("s:Header");
            header
                .children
                .extend(self.header.iter().cloned().map(XMLNode::Element));
            envelope.children.push(XMLNode::Element(header));
        }

        let mut body = Element::new("s:Body");
        body.children.push(XMLNode::Element(self.body.clone()));
        envelope.children.push(XMLNode::Element(body));

        envelope
    }

    /// Serializes the envelope with an XML declaration.
    pub fn to_xml(&self) -> Result<String, xmltree::Error> {
        let mut buf = Vec::new();
        let config = xmltree::EmitterConfig::new()
            .write_document_declaration(true)
            .perform_indent(true)
            .indent_string("  ");
        self.to_element().write_with_config(&mut buf, config)?;

        // the emitter only ever writes UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
