//! ONVIF client for camscan.
//!
//! - [`discovery`]: WS-Discovery multicast prober
//! - [`OnvifDevice`]: sequential handshake against a device service
//!   (capabilities, clock, identity, profiles and stream URIs)
//! - [`OnvifClient`]: SOAP 1.2 over HTTP executor with a fixed
//!   timeout/retry [`RequestPolicy`]
//! - [`auth`]: WS-Security UsernameToken password digest
//!
//! # Examples
//!
//! ```no_run
//! use camonvif::{Credentials, OnvifClient, OnvifDevice, ProbeStatus, RequestPolicy};
//!
//! # async fn demo() -> Result<(), camonvif::OnvifError> {
//! let client = OnvifClient::new(RequestPolicy::default())?;
//! let mut device = OnvifDevice::new(
//!     "http://192.168.1.64/onvif/device_service",
//!     Credentials::from_parts("admin", "secret"),
//! );
//!
//! match device.probe(&client).await? {
//!     ProbeStatus::NotOnvif => println!("not a camera"),
//!     status => println!("{} ({:?})", device.information.model, status),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod device;
pub mod discovery;
mod error;
mod messages;
pub mod soap;
mod types;

pub use auth::{Credentials, SecurityHeader, password_digest};
pub use client::{OnvifClient, RequestPolicy, SOAP_CONTENT_TYPE, build_envelope};
pub use device::{HandshakeState, OnvifDevice, ProbeStatus};
pub use discovery::{DiscoveryConfig, WsDiscovery};
pub use error::{DiscoveryError, OnvifError};
pub use types::{
    Bounds, Capabilities, DeviceInformation, EventCapabilities, MediaCapabilities, MediaUri,
    Profile, StreamInfo,
};
