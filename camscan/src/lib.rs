//! camscan finds ONVIF video transmitters on the private networks of the
//! host and reads their identity, media profiles and stream URIs.
//!
//! A run combines two candidate sources, WS-Discovery answers and hosts
//! with an open TCP port, then probes each unique endpoint with
//! [`camonvif::OnvifDevice::probe`]. Stream URIs can be inspected through a
//! [`StreamInspector`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use camscan::{NoopInspector, ScanSettings, Scanner};
//!
//! # async fn demo() -> Result<(), camscan::ScanRunError> {
//! let scanner = Scanner::new(ScanSettings::default(), Arc::new(NoopInspector))?;
//! for report in scanner.run().await? {
//!     println!("{} {}", report.device.address(), report.device.information.model);
//! }
//! # Ok(())
//! # }
//! ```

pub mod candidates;
pub mod inspect;
mod scan;

pub use candidates::{CandidateSet, device_service_url};
pub use inspect::{FfprobeInspector, InspectError, NoopInspector, StreamInspector};
pub use scan::{DeviceReport, ScanRunError, ScanSettings, Scanner};
