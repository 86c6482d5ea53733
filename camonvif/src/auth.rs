//! WS-Security UsernameToken with password digest
//!
//! ONVIF devices authenticate requests through a `wsse:Security` header
//! block carrying a one-time nonce, a creation timestamp and
//! `Base64(SHA1(nonce ‖ created ‖ password))`. The timestamp must be close
//! to the device clock, so callers pass a `created` instant already corrected
//! by the device clock offset.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat, Utc};
use sha1::{Digest, Sha1};
use xmltree::{Element, XMLNode};

use crate::soap::{ns, text_element};

const PASSWORD_DIGEST_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";

const BASE64_BINARY_ENCODING: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Device credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `None` when no username is configured: requests then go out
    /// without a security header.
    pub fn from_parts(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() {
            None
        } else {
            Some(Self::new(username, password))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Computes `Base64(SHA1(nonce ‖ created ‖ password))`.
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Formats a `wsu:Created` value: RFC 3339, UTC, milliseconds, `Z` suffix.
pub fn format_created(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A ready to serialize `wsse:Security` block
#[derive(Debug, Clone)]
pub struct SecurityHeader {
    username: String,
    nonce: String,
    digest: String,
    created: String,
}

impl SecurityHeader {
    /// Builds a header with a fresh 16-byte random nonce.
    pub fn new(credentials: &Credentials, created: DateTime<Utc>) -> Self {
        let nonce: [u8; 16] = rand::random();
        Self::with_nonce(credentials, created, &nonce)
    }

    /// Builds a header with a caller supplied nonce.
    pub fn with_nonce(credentials: &Credentials, created: DateTime<Utc>, nonce: &[u8]) -> Self {
        let created = format_created(created);
        Self {
            username: credentials.username.clone(),
            digest: password_digest(nonce, &created, &credentials.password),
            nonce: BASE64.encode(nonce),
            created,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Base64 encoded nonce
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Base64 encoded password digest
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    /// Renders the `wsse:Security` header block.
    pub fn to_element(&self) -> Element {
        let mut security = Element::new("wsse:Security");
        security
            .attributes
            .insert("xmlns:wsse".to_string(), ns::WSSE.to_string());
        security
            .attributes
            .insert("xmlns:wsu".to_string(), ns::WSU.to_string());

        let mut password = text_element("wsse:Password", &self.digest);
        password
            .attributes
            .insert("Type".to_string(), PASSWORD_DIGEST_TYPE.to_string());

        let mut nonce = text_element("wsse:Nonce", &self.nonce);
        nonce
            .attributes
            .insert("EncodingType".to_string(), BASE64_BINARY_ENCODING.to_string());

        let mut token = Element::new("wsse:UsernameToken");
        token.children = vec![
            XMLNode::Element(text_element("wsse:Username", &self.username)),
            XMLNode::Element(password),
            XMLNode::Element(nonce),
            XMLNode::Element(text_element("wsu:Created", &self.created)),
        ];

        security.children.push(XMLNode::Element(token));
        security
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> Credentials {
        Credentials::new("admin", "secret")
    }

    #[test]
    fn test_known_digests() {
        let nonce: Vec<u8> = (0u8..16).collect();
        assert_eq!(
            password_digest(&nonce, "2024-03-01T12:00:00.000Z", "secret"),
            "Z8PDY5BinVtUt2hbM1QrAO3aAlo="
        );
        assert_eq!(
            password_digest(b"nonce", "2001-01-01T00:00:00Z", "pass"),
            "GD/6gEbwa8WzxpnsoATfVdUhkqs="
        );
    }

    #[test]
    fn test_digest_depends_on_every_input() {
        let base = password_digest(b"nonce", "2001-01-01T00:00:00Z", "pass");

        assert_eq!(base, password_digest(b"nonce", "2001-01-01T00:00:00Z", "pass"));
        assert_ne!(base, password_digest(b"nonc3", "2001-01-01T00:00:00Z", "pass"));
        assert_ne!(base, password_digest(b"nonce", "2001-01-01T00:00:01Z", "pass"));
        assert_ne!(base, password_digest(b"nonce", "2001-01-01T00:00:00Z", "pasS"));
    }

    #[test]
    fn test_created_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_created(at), "2024-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_header_with_fixed_nonce() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let nonce: Vec<u8> = (0u8..16).collect();
        let header = SecurityHeader::with_nonce(&creds(), at, &nonce);

        assert_eq!(header.username(), "admin");
        assert_eq!(header.nonce(), "AAECAwQFBgcICQoLDA0ODw==");
        assert_eq!(header.created(), "2024-03-01T12:00:00.000Z");
        assert_eq!(header.digest(), "Z8PDY5BinVtUt2hbM1QrAO3aAlo=");
    }

    #[test]
    fn test_random_nonces_differ() {
        let at = Utc::now();
        let a = SecurityHeader::new(&creds(), at);
        let b = SecurityHeader::new(&creds(), at);

        assert_ne!(a.nonce(), b.nonce());
        assert_eq!(BASE64.decode(a.nonce()).unwrap().len(), 16);
    }

    #[test]
    fn test_header_element() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let elem = SecurityHeader::with_nonce(&creds(), at, b"nonce").to_element();

        assert_eq!(elem.name, "wsse:Security");
        let token = elem.get_child("wsse:UsernameToken").unwrap();
        let password = token.get_child("wsse:Password").unwrap();
        assert_eq!(
            password.attributes.get("Type").map(String::as_str),
            Some(PASSWORD_DIGEST_TYPE)
        );
        assert_eq!(
            token.get_child("wsu:Created").unwrap().get_text().unwrap(),
            "2024-03-01T12:00:00.000Z"
        );
    }

    #[test]
    fn test_credentials_from_parts() {
        assert!(Credentials::from_parts("", "secret").is_none());
        assert_eq!(
            Credentials::from_parts("admin", ""),
            Some(Credentials::new("admin", ""))
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", creds());
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }
}
