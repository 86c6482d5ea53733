//! Requêtes ONVIF et formes des réponses attendues

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use xmltree::{Element, XMLNode};

use crate::error::OnvifError;
use crate::soap::{ns, operation, text_element};
use crate::types::{Bounds, Capabilities, DeviceInformation, MediaUri};

fn device_op(name: &str) -> Element {
    operation("tds", ns::DEVICE, name)
}

fn media_op(name: &str) -> Element {
    operation("trt", ns::MEDIA, name)
}

pub fn get_capabilities() -> Element {
    let mut op = device_op("GetCapabilities");
    op.children
        .push(XMLNode::Element(text_element("tds:Category", "All")));
    op
}

pub fn get_system_date_and_time() -> Element {
    device_op("GetSystemDateAndTime")
}

pub fn get_device_information() -> Element {
    device_op("GetDeviceInformation")
}

pub fn get_profiles() -> Element {
    media_op("GetProfiles")
}

/// `GetStreamUri` for an RTP unicast stream over RTSP.
pub fn get_stream_uri(profile_token: &str) -> Element {
    let mut op = media_op("GetStreamUri");
    op.attributes
        .insert("xmlns:tt".to_string(), ns::SCHEMA.to_string());

    let mut transport = Element::new("tt:Transport");
    transport
        .children
        .push(XMLNode::Element(text_element("tt:Protocol", "RTSP")));

    let mut setup = Element::new("trt:StreamSetup");
    setup.children = vec![
        XMLNode::Element(text_element("tt:Stream", "RTP-Unicast")),
        XMLNode::Element(transport),
    ];

    op.children = vec![
        XMLNode::Element(setup),
        XMLNode::Element(text_element("trt:ProfileToken", profile_token)),
    ];
    op
}

/// Declares the `<Body>` wrapper of a response: a struct holding the single
/// `<XxxResponse>` element.
macro_rules! response_body {
    ($body:ident, $tag:literal, $inner:ty) => {
        #[derive(Debug, Deserialize)]
        pub struct $body {
            #[serde(rename = $tag)]
            pub response: $inner,
        }
    };
}

response_body!(CapabilitiesBody, "GetCapabilitiesResponse", CapabilitiesResponse);
response_body!(DateTimeBody, "GetSystemDateAndTimeResponse", DateTimeResponse);
response_body!(DeviceInformationBody, "GetDeviceInformationResponse", DeviceInformation);
response_body!(ProfilesBody, "GetProfilesResponse", ProfilesResponse);
response_body!(StreamUriBody, "GetStreamUriResponse", StreamUriResponse);

#[derive(Debug, Deserialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Capabilities")]
    pub capabilities: Capabilities,
}

#[derive(Debug, Deserialize)]
pub struct DateTimeResponse {
    #[serde(rename = "SystemDateAndTime")]
    pub system_date_and_time: SystemDateAndTime,
}

#[derive(Debug, Deserialize)]
pub struct SystemDateAndTime {
    #[serde(rename = "UTCDateTime", default)]
    pub utc: Option<WireDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct WireDateTime {
    #[serde(rename = "Date")]
    pub date: WireDate,
    #[serde(rename = "Time")]
    pub time: WireTime,
}

#[derive(Debug, Deserialize)]
pub struct WireDate {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Day")]
    pub day: u32,
}

#[derive(Debug, Deserialize)]
pub struct WireTime {
    #[serde(rename = "Hour")]
    pub hour: u32,
    #[serde(rename = "Minute")]
    pub minute: u32,
    #[serde(rename = "Second")]
    pub second: u32,
}

impl SystemDateAndTime {
    /// Device clock as a UTC instant.
    pub fn to_utc(&self) -> Result<DateTime<Utc>, OnvifError> {
        let dt = self
            .utc
            .as_ref()
            .ok_or_else(|| OnvifError::InvalidDateTime("missing UTCDateTime".to_string()))?;

        Utc.with_ymd_and_hms(
            dt.date.year,
            dt.date.month,
            dt.date.day,
            dt.time.hour,
            dt.time.minute,
            dt.time.second,
        )
        .single()
        .ok_or_else(|| {
            OnvifError::InvalidDateTime(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.date.year,
                dt.date.month,
                dt.date.day,
                dt.time.hour,
                dt.time.minute,
                dt.time.second
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfilesResponse {
    #[serde(rename = "Profiles", default)]
    pub profiles: Vec<WireProfile>,
}

#[derive(Debug, Deserialize)]
pub struct WireProfile {
    #[serde(rename = "@token", default)]
    pub token: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "VideoSourceConfiguration", default)]
    pub video_source: Option<VideoSourceConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct VideoSourceConfiguration {
    #[serde(rename = "Bounds", default)]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Deserialize)]
pub struct StreamUriResponse {
    #[serde(rename = "MediaUri")]
    pub media_uri: MediaUri,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{SoapEnvelope, parse_envelope, Envelope};

    fn parse<B: serde::de::DeserializeOwned>(body: &str) -> B {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope"
    xmlns:tt="http://www.onvif.org/ver10/schema"
    xmlns:tds="http://www.onvif.org/ver10/device/wsdl"
    xmlns:trt="http://www.onvif.org/ver10/media/wsdl">
<SOAP-ENV:Header/>
<SOAP-ENV:Body>{}</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
            body
        );
        let env: Envelope<B> = parse_envelope(&xml).unwrap();
        env.body
    }

    #[test]
    fn test_stream_uri_request() {
        let xml = SoapEnvelope::new(get_stream_uri("Profile_1")).to_xml().unwrap();

        assert!(xml.contains("<tt:Stream>RTP-Unicast</tt:Stream>"));
        assert!(xml.contains("<tt:Protocol>RTSP</tt:Protocol>"));
        assert!(xml.contains("<trt:ProfileToken>Profile_1</trt:ProfileToken>"));
        assert!(xml.contains("xmlns:trt=\"http://www.onvif.org/ver10/media/wsdl\""));
    }

    #[test]
    fn test_capabilities_request() {
        let xml = SoapEnvelope::new(get_capabilities()).to_xml().unwrap();
        assert!(xml.contains("<tds:Category>All</tds:Category>"));
    }

    #[test]
    fn test_parse_capabilities() {
        let body: CapabilitiesBody = parse(
            r#"<tds:GetCapabilitiesResponse><tds:Capabilities>
  <tt:Analytics><tt:XAddr>http://192.168.10.108/onvif/analytics_service</tt:XAddr></tt:Analytics>
  <tt:Events>
    <tt:XAddr>http://192.168.10.108/onvif/event_service</tt:XAddr>
    <tt:WSSubscriptionPolicySupport>true</tt:WSSubscriptionPolicySupport>
    <tt:WSPullPointSupport>true</tt:WSPullPointSupport>
    <tt:WSPausableSubscriptionManagerInterfaceSupport>false</tt:WSPausableSubscriptionManagerInterfaceSupport>
  </tt:Events>
  <tt:Media>
    <tt:XAddr>http://192.168.10.108/onvif/media_service</tt:XAddr>
    <tt:StreamingCapabilities><tt:RTPMulticast>true</tt:RTPMulticast></tt:StreamingCapabilities>
  </tt:Media>
</tds:Capabilities></tds:GetCapabilitiesResponse>"#,
        );

        let caps = body.response.capabilities;
        assert_eq!(
            caps.media_xaddr(),
            Some("http://192.168.10.108/onvif/media_service")
        );
        assert_eq!(caps.events.xaddr, "http://192.168.10.108/onvif/event_service");
        assert!(caps.events.ws_subscription_policy_support);
        assert!(caps.events.ws_pull_point_support);
        assert!(!caps.events.ws_pausable_subscription_manager_interface_support);
    }

    #[test]
    fn test_capabilities_without_media() {
        let body: CapabilitiesBody = parse(
            r#"<tds:GetCapabilitiesResponse><tds:Capabilities>
  <tt:Device><tt:XAddr>http://10.0.0.1/onvif/device_service</tt:XAddr></tt:Device>
</tds:Capabilities></tds:GetCapabilitiesResponse>"#,
        );
        assert_eq!(body.response.capabilities.media_xaddr(), None);
    }

    #[test]
    fn test_parse_date_time() {
        let body: DateTimeBody = parse(
            r#"<tds:GetSystemDateAndTimeResponse><tds:SystemDateAndTime>
  <tt:DateTimeType>NTP</tt:DateTimeType>
  <tt:DaylightSavings>false</tt:DaylightSavings>
  <tt:TimeZone><tt:TZ>CST-8</tt:TZ></tt:TimeZone>
  <tt:UTCDateTime>
    <tt:Time><tt:Hour>4</tt:Hour><tt:Minute>5</tt:Minute><tt:Second>6</tt:Second></tt:Time>
    <tt:Date><tt:Year>2024</tt:Year><tt:Month>3</tt:Month><tt:Day>1</tt:Day></tt:Date>
  </tt:UTCDateTime>
</tds:SystemDateAndTime></tds:GetSystemDateAndTimeResponse>"#,
        );

        let at = body.response.system_date_and_time.to_utc().unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 1, 4, 5, 6).unwrap());
    }

    #[test]
    fn test_invalid_date_time() {
        let body: DateTimeBody = parse(
            r#"<tds:GetSystemDateAndTimeResponse><tds:SystemDateAndTime><tt:UTCDateTime>
  <tt:Time><tt:Hour>0</tt:Hour><tt:Minute>0</tt:Minute><tt:Second>0</tt:Second></tt:Time>
  <tt:Date><tt:Year>2024</tt:Year><tt:Month>2</tt:Month><tt:Day>31</tt:Day></tt:Date>
</tt:UTCDateTime></tds:SystemDateAndTime></tds:GetSystemDateAndTimeResponse>"#,
        );

        let err = body.response.system_date_and_time.to_utc().unwrap_err();
        assert!(matches!(err, OnvifError::InvalidDateTime(_)));
    }

    #[test]
    fn test_parse_device_information() {
        let body: DeviceInformationBody = parse(
            r#"<tds:GetDeviceInformationResponse>
  <tds:Manufacturer>Amcrest</tds:Manufacturer>
  <tds:Model>IP5M-T1179E</tds:Model>
  <tds:FirmwareVersion>2.800.0000000.7.R</tds:FirmwareVersion>
  <tds:SerialNumber>AMC0123456789</tds:SerialNumber>
  <tds:HardwareId>1.00</tds:HardwareId>
</tds:GetDeviceInformationResponse>"#,
        );

        let info = body.response;
        assert_eq!(info.manufacturer, "Amcrest");
        assert_eq!(info.model, "IP5M-T1179E");
        assert_eq!(info.firmware_version, "2.800.0000000.7.R");
        assert_eq!(info.serial_number, "AMC0123456789");
        assert_eq!(info.hardware_id, "1.00");
    }

    #[test]
    fn test_parse_profiles() {
        let body: ProfilesBody = parse(
            r#"<trt:GetProfilesResponse>
  <trt:Profiles fixed="true" token="MainStream">
    <tt:Name>MainStream</tt:Name>
    <tt:VideoSourceConfiguration token="000">
      <tt:Name>VideoSource</tt:Name>
      <tt:SourceToken>000</tt:SourceToken>
      <tt:Bounds height="1944" width="2592" y="0" x="0"/>
    </tt:VideoSourceConfiguration>
  </trt:Profiles>
  <trt:Profiles fixed="true" token="SubStream">
    <tt:Name>SubStream</tt:Name>
  </trt:Profiles>
</trt:GetProfilesResponse>"#,
        );

        let profiles = body.response.profiles;
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].token, "MainStream");
        assert_eq!(
            profiles[0]
                .video_source
                .as_ref()
                .and_then(|v| v.bounds),
            Some(Bounds {
                width: 2592,
                height: 1944
            })
        );
        assert_eq!(profiles[1].name, "SubStream");
        assert!(profiles[1].video_source.is_none());
    }

    #[test]
    fn test_parse_stream_uri() {
        let body: StreamUriBody = parse(
            r#"<trt:GetStreamUriResponse><trt:MediaUri>
  <tt:Uri>rtsp://192.168.10.108:554/cam/realmonitor?channel=1&amp;subtype=0</tt:Uri>
  <tt:InvalidAfterConnect>false</tt:InvalidAfterConnect>
  <tt:InvalidAfterReboot>false</tt:InvalidAfterReboot>
  <tt:Timeout>PT60S</tt:Timeout>
</trt:MediaUri></trt:GetStreamUriResponse>"#,
        );

        let uri = body.response.media_uri;
        assert_eq!(
            uri.uri,
            "rtsp://192.168.10.108:554/cam/realmonitor?channel=1&subtype=0"
        );
        assert_eq!(uri.timeout, "PT60S");
        assert!(!uri.invalid_after_reboot);
    }
}
