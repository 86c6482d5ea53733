//! Device records filled during a probe
//!
//! These types are decoded straight from the device responses (`Deserialize`
//! uses the ONVIF element names) and serialized in snake_case for reports.

use serde::{Deserialize, Serialize};

/// Service addresses advertised by `GetCapabilities`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(rename(deserialize = "Media"), default)]
    pub media: MediaCapabilities,

    #[serde(rename(deserialize = "Events"), default)]
    pub events: EventCapabilities,
}

impl Capabilities {
    /// Media service address, `None` when absent or blank.
    pub fn media_xaddr(&self) -> Option<&str> {
        let xaddr = self.media.xaddr.trim();
        if xaddr.is_empty() { None } else { Some(xaddr) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCapabilities {
    #[serde(rename(deserialize = "XAddr"), default)]
    pub xaddr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCapabilities {
    #[serde(rename(deserialize = "XAddr"), default)]
    pub xaddr: String,

    #[serde(rename(deserialize = "WSSubscriptionPolicySupport"), default)]
    pub ws_subscription_policy_support: bool,

    #[serde(rename(deserialize = "WSPullPointSupport"), default)]
    pub ws_pull_point_support: bool,

    #[serde(
        rename(deserialize = "WSPausableSubscriptionManagerInterfaceSupport"),
        default
    )]
    pub ws_pausable_subscription_manager_interface_support: bool,
}

/// Identity record returned by `GetDeviceInformation`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInformation {
    #[serde(rename(deserialize = "Manufacturer"), default)]
    pub manufacturer: String,

    #[serde(rename(deserialize = "Model"), default)]
    pub model: String,

    #[serde(rename(deserialize = "FirmwareVersion"), default)]
    pub firmware_version: String,

    #[serde(rename(deserialize = "SerialNumber"), default)]
    pub serial_number: String,

    #[serde(
        rename(deserialize = "HardwareId"),
        alias = "HardwareID",
        default
    )]
    pub hardware_id: String,
}

/// Frame size of a profile's video source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(rename(deserialize = "@width"), default)]
    pub width: u32,

    #[serde(rename(deserialize = "@height"), default)]
    pub height: u32,
}

/// Stream URI and its validity flags, from `GetStreamUri`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUri {
    #[serde(rename(deserialize = "Uri"), default)]
    pub uri: String,

    #[serde(rename(deserialize = "InvalidAfterConnect"), default)]
    pub invalid_after_connect: bool,

    #[serde(rename(deserialize = "InvalidAfterReboot"), default)]
    pub invalid_after_reboot: bool,

    /// ISO 8601 duration, e.g. `PT60S`
    #[serde(rename(deserialize = "Timeout"), default)]
    pub timeout: String,
}

/// One elementary stream reported by the media inspection tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: String,
    #[serde(default)]
    pub codec_long_name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Fraction as printed by the tool, e.g. `25/1`
    #[serde(default)]
    pub avg_frame_rate: String,
}

/// Media profile of a device, in the order the device lists them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub token: String,
    pub name: String,
    pub bounds: Option<Bounds>,

    /// Playable stream URI, empty until resolved
    pub uri: String,

    pub stream_uri: Option<MediaUri>,

    pub streams: Vec<StreamInfo>,
}

impl Profile {
    /// Returns the stream URI with `credentials` embedded as userinfo, the
    /// form media tools expect. Returns the URI unchanged when it does not
    /// parse or no username is configured.
    pub fn authenticated_uri(&self, credentials: Option<&crate::Credentials>) -> String {
        let Some(creds) = credentials else {
            return self.uri.clone();
        };

        match url::Url::parse(&self.uri) {
            Ok(mut url) => {
                if url.set_username(&creds.username).is_err()
                    || url.set_password(Some(&creds.password)).is_err()
                {
                    return self.uri.clone();
                }
                url.to_string()
            }
            Err(_) => self.uri.clone(),
        }
    }
}
