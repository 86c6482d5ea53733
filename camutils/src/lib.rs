//! Network helpers for camscan.
//!
//! This crate owns everything that touches the local network stack before
//! any camera protocol is spoken:
//!
//! - [`private_ipv4_interfaces`]: the interfaces worth scanning, each with
//!   its private IPv4 prefix
//! - [`hosts_in_prefix`]: every address of a prefix, network and broadcast
//!   included
//! - [`PortScanner`]: concurrent TCP connect scan over those prefixes
//!
//! # Examples
//!
//! ```no_run
//! use camutils::{PortScanner, private_ipv4_interfaces};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let interfaces = private_ipv4_interfaces()?;
//! let open = PortScanner::new(80).scan(&interfaces).await?;
//! for addr in open {
//!     println!("open: {}", addr);
//! }
//! # Ok(())
//! # }
//! ```
mod error;
mod ip_utils;
mod port_scan;

pub use error::{Result, ScanError};
pub use ip_utils::{NetworkInterface, private_ipv4_interfaces, select_private_prefixes};
pub use port_scan::{
    DEFAULT_CONNECT_TIMEOUT, MAX_SCAN_HOSTS, PortScanner, hosts_in_prefix, is_port_open,
    scan_candidates,
};
