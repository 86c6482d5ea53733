//! Décodage typé des réponses SOAP

use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Typed SOAP response envelope.
///
/// `B` is the content of `<Body>`, `H` the content of `<Header>`. The
/// header is optional since most device responses carry an empty one.
#[derive(Debug, Deserialize)]
pub struct Envelope<B, H = IgnoredHeader> {
    #[serde(rename = "Header")]
    pub header: Option<H>,

    #[serde(rename = "Body")]
    pub body: B,
}

/// Header placeholder for responses whose header is not read
#[derive(Debug, Default, Deserialize)]
pub struct IgnoredHeader {}

/// Deserializes a full envelope from its XML text.
pub fn parse_envelope<B, H>(xml: &str) -> Result<Envelope<B, H>, quick_xml::DeError>
where
    B: DeserializeOwned,
    H: DeserializeOwned,
{
    quick_xml::de::from_str(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(rename = "EchoResponse")]
        echo: Echo,
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        #[serde(rename = "Value")]
        value: String,
    }

    // no Default on purpose, a header type only needs Deserialize
    #[derive(Debug, Deserialize)]
    struct Header {
        #[serde(rename = "RelatesTo")]
        relates_to: String,
    }

    #[test]
    fn test_prefixes_are_ignored() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:x="urn:x">
  <SOAP-ENV:Header/>
  <SOAP-ENV:Body>
    <x:EchoResponse><x:Value>hello</x:Value></x:EchoResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

        let env: Envelope<Body> = parse_envelope(xml).unwrap();
        assert_eq!(env.body.echo.value, "hello");
    }

    #[test]
    fn test_header_is_optional() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body><EchoResponse><Value>x</Value></EchoResponse></s:Body>
</s:Envelope>"#;

        let env: Envelope<Body, Header> = parse_envelope(xml).unwrap();
        assert!(env.header.is_none());
    }

    #[test]
    fn test_typed_header() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="urn:a">
  <s:Header><a:RelatesTo>urn:uuid:42</a:RelatesTo></s:Header>
  <s:Body><EchoResponse><Value>x</Value></EchoResponse></s:Body>
</s:Envelope>"#;

        let env: Envelope<Body, Header> = parse_envelope(xml).unwrap();
        assert_eq!(env.header.unwrap().relates_to, "urn:uuid:42");
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"/>"#;
        assert!(parse_envelope::<Body, IgnoredHeader>(xml).is_err());
    }
}
