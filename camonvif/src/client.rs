//! SOAP-over-HTTP request executor shared by every device request

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use xmltree::Element;

use crate::auth::SecurityHeader;
use crate::error::OnvifError;
use crate::soap::{Envelope, SoapEnvelope, parse_envelope, parse_fault};

/// Content type of every ONVIF request
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=utf-8";

/// Characters of a response body kept in parse errors
const SNIPPET_LEN: usize = 128;

/// Timeout and retry policy applied uniformly to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Per attempt timeout
    pub timeout: Duration,

    /// Total attempts, the first one included
    pub attempts: u32,

    /// Fixed delay between two attempts
    pub retry_delay: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Builds a SOAP 1.2 envelope around `body`, with the security header block
/// when one is given.
pub fn build_envelope(
    body: Element,
    security: Option<&SecurityHeader>,
) -> Result<String, xmltree::Error> {
    let mut envelope = SoapEnvelope::new(body);
    if let Some(header) = security {
        envelope = envelope.with_header(header.to_element());
    }
    envelope.to_xml()
}

/// HTTP client issuing SOAP calls under a [`RequestPolicy`]
#[derive(Debug, Clone)]
pub struct OnvifClient {
    http: reqwest::Client,
    policy: RequestPolicy,
}

impl OnvifClient {
    pub fn new(policy: RequestPolicy) -> Result<Self, OnvifError> {
        let http = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(OnvifError::Client)?;
        Ok(Self { http, policy })
    }

    /// Uses an existing `reqwest` client. The policy timeout is still
    /// applied to each request.
    pub fn with_client(http: reqwest::Client, policy: RequestPolicy) -> Self {
        Self { http, policy }
    }

    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    /// POSTs `body` to `url` and decodes the response body as `R`.
    ///
    /// Transport errors and HTTP 429/502/503/504 are retried. Any other
    /// non-success status fails at once, with the SOAP fault when the
    /// device sent one.
    pub async fn call<R>(
        &self,
        url: &str,
        body: Element,
        security: Option<&SecurityHeader>,
    ) -> Result<R, OnvifError>
    where
        R: DeserializeOwned,
    {
        let action = local_name(&body.name).to_string();
        let xml = build_envelope(body, security)?;
        let attempts = self.policy.attempts.max(1);

        debug!(url, action = %action, authenticated = security.is_some(), "SOAP request");
        trace!(request = %xml, "SOAP request body");

        let mut attempt = 1;
        let text = loop {
            match self.send(url, &action, &xml).await {
                Ok(text) => break text,
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    warn!(url, action = %action, attempt, error = %e, "SOAP request failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        trace!(response = %text, "SOAP response body");

        let envelope: Envelope<R> = parse_envelope(&text).map_err(|source| OnvifError::Parse {
            action: action.clone(),
            source,
            snippet: snippet(&text),
        })?;

        Ok(envelope.body)
    }

    async fn send(&self, url: &str, action: &str, xml: &str) -> Result<String, OnvifError> {
        let transport = |source: reqwest::Error| OnvifError::Transport {
            action: action.to_string(),
            url: url.to_string(),
            source,
        };

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .timeout(self.policy.timeout)
            .body(xml.to_string())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let fault = response.text().await.ok().and_then(|t| parse_fault(&t));
            return Err(OnvifError::Status {
                action: action.to_string(),
                status: status.as_u16(),
                fault,
            });
        }

        response.text().await.map_err(transport)
    }
}

fn is_retryable(err: &OnvifError) -> bool {
    match err {
        OnvifError::Transport { .. } => true,
        OnvifError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
        _ => false,
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}
