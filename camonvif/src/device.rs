//! Sequential ONVIF handshake against one candidate endpoint

use std::collections::HashSet;

use chrono::{TimeDelta, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::auth::{Credentials, SecurityHeader};
use crate::client::OnvifClient;
use crate::error::OnvifError;
use crate::messages::{
    self, CapabilitiesBody, DateTimeBody, DeviceInformationBody, ProfilesBody, StreamUriBody,
};
use crate::types::{Capabilities, DeviceInformation, Profile};

/// Progress of the handshake, each state implies the previous ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Init,
    CapabilitiesFetched,
    ClockSynced,
    InfoFetched,
    Complete,
}

/// Outcome of [`OnvifDevice::probe`] for an endpoint that answered
/// `GetCapabilities`.
#[derive(Debug)]
pub enum ProbeStatus {
    /// No media service: not a device of interest
    NotOnvif,

    /// Every step succeeded
    Complete,

    /// A recognized device failed a later step; the fields filled before
    /// the failure are kept
    Incomplete(OnvifError),
}

impl ProbeStatus {
    /// True when the endpoint proved to be a video device.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::NotOnvif)
    }

    pub fn error(&self) -> Option<&OnvifError> {
        match self {
            Self::Incomplete(e) => Some(e),
            _ => None,
        }
    }
}

impl Serialize for ProbeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProbeStatus", 2)?;
        match self {
            Self::NotOnvif => {
                s.serialize_field("status", "not_onvif")?;
                s.serialize_field("error", &None::<String>)?;
            }
            Self::Complete => {
                s.serialize_field("status", "complete")?;
                s.serialize_field("error", &None::<String>)?;
            }
            Self::Incomplete(e) => {
                s.serialize_field("status", "incomplete")?;
                s.serialize_field("error", &Some(e.to_string()))?;
            }
        }
        s.end()
    }
}

/// Device record, filled step by step by [`OnvifDevice::probe`].
#[derive(Debug, Clone, Serialize)]
pub struct OnvifDevice {
    address: String,

    #[serde(skip)]
    credentials: Option<Credentials>,

    /// Duration to add to the local clock to get the device clock
    #[serde(rename = "clock_offset_ms", serialize_with = "serialize_offset")]
    clock_offset: Option<TimeDelta>,

    pub capabilities: Capabilities,
    pub information: DeviceInformation,
    pub profiles: Vec<Profile>,

    state: HandshakeState,
}

fn serialize_offset<S: Serializer>(offset: &Option<TimeDelta>, s: S) -> Result<S::Ok, S::Error> {
    match offset {
        Some(d) => s.serialize_some(&d.num_milliseconds()),
        None => s.serialize_none(),
    }
}

impl OnvifDevice {
    pub fn new(address: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            address: address.into(),
            credentials,
            clock_offset: None,
            capabilities: Capabilities::default(),
            information: DeviceInformation::default(),
            profiles: Vec::new(),
            state: HandshakeState::Init,
        }
    }

    /// Device service URL
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// `None` until the device clock has been read.
    pub fn clock_offset(&self) -> Option<TimeDelta> {
        self.clock_offset
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs the handshake: capabilities, clock, identity, then profiles
    /// with their stream URIs.
    ///
    /// # Errors
    ///
    /// Only a failed `GetCapabilities` is an error: the endpoint is then
    /// not known to speak ONVIF at all. Later failures are reported as
    /// [`ProbeStatus::Incomplete`].
    pub async fn probe(&mut self, client: &OnvifClient) -> Result<ProbeStatus, OnvifError> {
        if !self.fetch_capabilities(client).await? {
            debug!(address = %self.address, "no media service, not a video device");
            return Ok(ProbeStatus::NotOnvif);
        }

        match self.complete_handshake(client).await {
            Ok(()) => Ok(ProbeStatus::Complete),
            Err(e) => {
                warn!(address = %self.address, state = ?self.state, error = %e, "handshake incomplete");
                Ok(ProbeStatus::Incomplete(e))
            }
        }
    }

    async fn complete_handshake(&mut self, client: &OnvifClient) -> Result<(), OnvifError> {
        self.sync_clock(client).await?;
        self.fetch_device_information(client).await?;
        self.fetch_profiles(client).await?;
        self.state = HandshakeState::Complete;
        Ok(())
    }

    /// Returns whether the device exposes a media service.
    async fn fetch_capabilities(&mut self, client: &OnvifClient) -> Result<bool, OnvifError> {
        let body: CapabilitiesBody = client
            .call(&self.address, messages::get_capabilities(), None)
            .await?;

        let capabilities = body.response.capabilities;
        debug!(address = %self.address, capabilities = ?capabilities, "got capabilities");

        if capabilities.media_xaddr().is_none() {
            return Ok(false);
        }

        self.capabilities = capabilities;
        self.state = HandshakeState::CapabilitiesFetched;
        Ok(true)
    }

    async fn sync_clock(&mut self, client: &OnvifClient) -> Result<(), OnvifError> {
        if self.clock_offset.is_some() {
            return Ok(());
        }

        let body: DateTimeBody = client
            .call(&self.address, messages::get_system_date_and_time(), None)
            .await?;
        let device_time = body.response.system_date_and_time.to_utc()?;

        let offset = device_time - Utc::now();
        debug!(
            address = %self.address,
            device_time = %device_time,
            offset_ms = offset.num_milliseconds(),
            "device clock synchronised"
        );

        self.clock_offset = Some(offset);
        self.state = HandshakeState::ClockSynced;
        Ok(())
    }

    /// Security header for the next request: only once the clock offset is
    /// known and a username is configured.
    fn security_header(&self) -> Option<SecurityHeader> {
        let creds = self.credentials.as_ref()?;
        let offset = self.clock_offset?;
        Some(SecurityHeader::new(creds, Utc::now() + offset))
    }

    async fn fetch_device_information(&mut self, client: &OnvifClient) -> Result<(), OnvifError> {
        let security = self.security_header();
        let body: DeviceInformationBody = client
            .call(
                &self.address,
                messages::get_device_information(),
                security.as_ref(),
            )
            .await?;

        self.information = body.response;
        debug!(address = %self.address, information = ?self.information, "got device information");
        self.state = HandshakeState::InfoFetched;
        Ok(())
    }

    async fn fetch_profiles(&mut self, client: &OnvifClient) -> Result<(), OnvifError> {
        let media = self.capabilities.media_xaddr().unwrap_or_default().to_string();

        let security = self.security_header();
        let body: ProfilesBody = client
            .call(&media, messages::get_profiles(), security.as_ref())
            .await?;

        let mut seen = HashSet::new();
        let mut profiles = Vec::new();
        for wire in body.response.profiles {
            if !seen.insert(wire.token.clone()) {
                warn!(address = %self.address, token = %wire.token, "duplicate profile token, ignoring");
                continue;
            }
            profiles.push(Profile {
                token: wire.token,
                name: wire.name,
                bounds: wire.video_source.and_then(|v| v.bounds),
                ..Default::default()
            });
        }

        for profile in profiles.iter_mut() {
            let security = self.security_header();
            let body: StreamUriBody = client
                .call(
                    &media,
                    messages::get_stream_uri(&profile.token),
                    security.as_ref(),
                )
                .await?;

            let media_uri = body.response.media_uri;
            profile.uri = media_uri.uri.trim().to_string();
            profile.stream_uri = Some(media_uri);
        }

        debug!(address = %self.address, count = profiles.len(), "got profiles");
        self.profiles = profiles;
        Ok(())
    }
}
