//! One complete scan: enumerate, discover, port scan, probe, inspect.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use camconfig::Config;
use camonvif::{
    Credentials, DiscoveryConfig, OnvifClient, OnvifDevice, OnvifError, ProbeStatus,
    RequestPolicy, WsDiscovery,
};
use camutils::{NetworkInterface, PortScanner, ScanError, private_ipv4_interfaces};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidates::CandidateSet;
use crate::inspect::StreamInspector;

/// Errors aborting a whole run
#[derive(Debug, thiserror::Error)]
pub enum ScanRunError {
    /// Interface enumeration or port scan failure
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// HTTP client construction failure
    #[error(transparent)]
    Client(#[from] OnvifError),

    /// Unusable configuration value, with its context chain
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What a run needs, resolved from the configuration and the command line
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub port: u16,
    pub connect_timeout: Duration,
    pub discovery: DiscoveryConfig,
    pub policy: RequestPolicy,
    pub credentials: Option<Credentials>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            port: 80,
            connect_timeout: camutils::DEFAULT_CONNECT_TIMEOUT,
            discovery: DiscoveryConfig::default(),
            policy: RequestPolicy::default(),
            credentials: None,
        }
    }
}

impl ScanSettings {
    /// Reads the settings from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the configured camera password cannot be decrypted.
    pub fn from_config(config: &Config) -> Result<Self, ScanRunError> {
        let username = config.camera_username();
        let password = config
            .camera_password()
            .map_err(|e| ScanRunError::Config(format!("{:#}", e)))?;

        Ok(Self {
            port: config.scan_port(),
            connect_timeout: config.connect_timeout(),
            discovery: DiscoveryConfig {
                ttl: config.discovery_ttl(),
                window: config.discovery_window(),
                ..DiscoveryConfig::default()
            },
            policy: RequestPolicy {
                timeout: config.onvif_timeout(),
                attempts: config.onvif_attempts(),
                retry_delay: config.onvif_retry_delay(),
            },
            credentials: Credentials::from_parts(&username, &password),
        })
    }
}

/// A recognized device and how far its handshake went
#[derive(Debug, Serialize)]
pub struct DeviceReport {
    pub device: OnvifDevice,
    #[serde(flatten)]
    pub status: ProbeStatus,
}

impl DeviceReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, ProbeStatus::Complete)
    }
}

/// Runs scans with fixed settings
pub struct Scanner {
    settings: ScanSettings,
    client: OnvifClient,
    inspector: Arc<dyn StreamInspector>,
}

impl Scanner {
    pub fn new(
        settings: ScanSettings,
        inspector: Arc<dyn StreamInspector>,
    ) -> Result<Self, ScanRunError> {
        let client = OnvifClient::new(settings.policy)?;
        Ok(Self {
            settings,
            client,
            inspector,
        })
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scans every private network of the host.
    ///
    /// # Errors
    ///
    /// Interface enumeration failures and local resource exhaustion during
    /// the port scan abort the run. Discovery failures only skip their
    /// interface, and failing candidates are left out of the result.
    pub async fn run(&self) -> Result<Vec<DeviceReport>, ScanRunError> {
        let interfaces = private_ipv4_interfaces()?;
        if interfaces.is_empty() {
            warn!("no private IPv4 interface found");
            return Ok(Vec::new());
        }
        for iface in &interfaces {
            info!(iface = %iface.name, cidr = %iface.prefix, "using interface");
        }

        let mut candidates = CandidateSet::new();
        candidates.extend_discovered(self.discover(&interfaces).await);
        candidates.extend_open_ports(self.port_scan(&interfaces).await?);
        info!(count = candidates.len(), "candidates to probe");

        Ok(self.probe_candidates(candidates).await)
    }

    async fn discover(&self, interfaces: &[NetworkInterface]) -> Vec<String> {
        let discovery = WsDiscovery::new(self.settings.discovery);
        let mut found = Vec::new();

        for iface in interfaces {
            match discovery.probe_interface(iface).await {
                Ok(endpoints) => found.extend(endpoints),
                Err(e) => warn!(iface = %iface.name, error = %e, "discovery failed on interface"),
            }
        }

        info!(count = found.len(), "discovery finished");
        found
    }

    async fn port_scan(
        &self,
        interfaces: &[NetworkInterface],
    ) -> Result<Vec<SocketAddrV4>, ScanError> {
        let open = PortScanner::new(self.settings.port)
            .with_connect_timeout(self.settings.connect_timeout)
            .scan(interfaces)
            .await?;
        info!(port = self.settings.port, count = open.len(), "port scan finished");
        Ok(open)
    }

    /// Probes each endpoint in turn, then inspects the streams of the
    /// recognized devices.
    ///
    /// Endpoints that fail `GetCapabilities` or expose no media service are
    /// dropped. The reports keep the endpoint order.
    pub async fn probe_candidates<I>(&self, candidates: I) -> Vec<DeviceReport>
    where
        I: IntoIterator<Item = String>,
    {
        let mut reports = Vec::new();

        for endpoint in candidates {
            let mut device = OnvifDevice::new(endpoint, self.settings.credentials.clone());

            let status = match device.probe(&self.client).await {
                Ok(ProbeStatus::NotOnvif) => {
                    debug!(address = %device.address(), "not an onvif video device");
                    continue;
                }
                Ok(status) => status,
                Err(e) => {
                    debug!(address = %device.address(), error = %e, "probe failed");
                    continue;
                }
            };

            self.inspect_streams(&mut device).await;

            let report = DeviceReport { device, status };
            log_report(&report);
            reports.push(report);
        }

        reports
    }

    async fn inspect_streams(&self, device: &mut OnvifDevice) {
        let credentials = device.credentials().cloned();

        for profile in device.profiles.iter_mut() {
            if profile.uri.is_empty() {
                continue;
            }

            let url = profile.authenticated_uri(credentials.as_ref());
            match self.inspector.inspect(&url).await {
                Ok(streams) => profile.streams = streams,
                Err(e) => {
                    debug!(profile = %profile.token, uri = %profile.uri, error = %e, "stream inspection failed");
                }
            }
        }
    }
}

fn log_report(report: &DeviceReport) {
    let device = &report.device;
    let info = &device.information;

    info!(
        address = %device.address(),
        manufacturer = %info.manufacturer,
        model = %info.model,
        firmware = %info.firmware_version,
        serial = %info.serial_number,
        hardware_id = %info.hardware_id,
        profiles = device.profiles.len(),
        "📷 found onvif device"
    );

    for profile in &device.profiles {
        info!(
            token = %profile.token,
            name = %profile.name,
            uri = %profile.uri,
            streams = profile.streams.len(),
            "  profile"
        );
    }

    if let Some(e) = report.status.error() {
        warn!(address = %device.address(), state = ?device.state(), error = %e, "device only partially probed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_yaml(
            r#"
scan:
  port: 8000
discovery:
  window_ms: 500
camera:
  username: admin
  password: secret
onvif:
  attempts: 1
"#,
        )
        .unwrap();

        let settings = ScanSettings::from_config(&config).unwrap();

        assert_eq!(settings.port, 8000);
        assert_eq!(settings.discovery.window, Duration::from_millis(500));
        assert_eq!(settings.discovery.port, 3702);
        assert_eq!(settings.policy.attempts, 1);
        assert_eq!(settings.policy.timeout, Duration::from_secs(5));
        assert_eq!(
            settings.credentials,
            Some(Credentials::new("admin", "secret"))
        );
    }

    #[test]
    fn test_undecryptable_password_is_a_config_error() {
        let mut config = Config::defaults().unwrap();
        config
            .set_value(
                &["camera", "password"],
                serde_yaml::Value::String("encrypted:AAAA".into()),
            )
            .unwrap();

        let err = ScanSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, ScanRunError::Config(_)));
        assert!(err.to_string().contains("camera.password"));
    }

    #[test]
    fn test_no_username_means_no_credentials() {
        let config = Config::from_yaml("camera:\n  password: secret\n").unwrap();
        let settings = ScanSettings::from_config(&config).unwrap();
        assert!(settings.credentials.is_none());
    }
}
