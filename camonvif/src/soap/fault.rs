//! SOAP 1.2 faults returned by devices

use std::fmt;

use serde::Deserialize;

use super::parser::{Envelope, parse_envelope};

/// SOAP 1.2 fault
///
/// ```xml
/// <s:Fault>
///   <s:Code>
///     <s:Value>s:Sender</s:Value>
///     <s:Subcode><s:Value>ter:NotAuthorized</s:Value></s:Subcode>
///   </s:Code>
///   <s:Reason><s:Text xml:lang="en">Sender not Authorized</s:Text></s:Reason>
/// </s:Fault>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Code d'erreur (ex: "s:Sender")
    pub code: String,

    /// Sous-code éventuel (ex: "ter:NotAuthorized")
    pub subcode: Option<String>,

    /// Description lisible
    pub reason: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subcode {
            Some(sub) => write!(f, "{} ({}/{})", self.reason, self.code, sub),
            None => write!(f, "{} ({})", self.reason, self.code),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    #[serde(rename = "Fault")]
    fault: RawFault,
}

#[derive(Debug, Deserialize)]
struct RawFault {
    #[serde(rename = "Code", default)]
    code: Option<RawCode>,

    #[serde(rename = "Reason", default)]
    reason: Option<RawReason>,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    #[serde(rename = "Value", default)]
    value: String,

    #[serde(rename = "Subcode", default)]
    subcode: Option<Box<RawCode>>,
}

#[derive(Debug, Deserialize)]
struct RawReason {
    #[serde(rename = "Text", default)]
    text: Vec<RawText>,
}

// <Text xml:lang="..."> carries an attribute, hence the $text field
#[derive(Debug, Deserialize)]
struct RawText {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Extracts the fault from a response body, if it holds one.
pub fn parse_fault(xml: &str) -> Option<SoapFault> {
    let envelope: Envelope<FaultBody> = parse_envelope(xml).ok()?;
    let raw = envelope.body.fault;

    let (code, subcode) = match raw.code {
        Some(c) => {
            let sub = c
                .subcode
                .map(|s| s.value.trim().to_string())
                .filter(|s| !s.is_empty());
            (c.value.trim().to_string(), sub)
        }
        None => (String::new(), None),
    };

    let reason = raw
        .reason
        .and_then(|r| r.text.into_iter().next())
        .map(|t| t.value.trim().to_string())
        .unwrap_or_default();

    Some(SoapFault {
        code,
        subcode,
        reason,
    })
}
