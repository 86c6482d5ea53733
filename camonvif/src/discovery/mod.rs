//! WS-Discovery prober
//!
//! Sends one multicast Probe on an interface and collects the ProbeMatches
//! answered within a fixed window. Unlike a long running control point, the
//! prober owns its socket for the whole window and is meant to be run once
//! per interface, one interface at a time.
//!
//! The socket binds an ephemeral port (`0.0.0.0:0`): replies are unicast to
//! the sender, there is no need to listen on 3702.

mod messages;

pub use messages::{
    ProbeMatch, VIDEO_TRANSMITTER_TYPE, build_probe, rewrite_xaddr, select_transmitters,
};

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use camutils::NetworkInterface;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::DiscoveryError;

/// WS-Discovery multicast group
pub const DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// WS-Discovery port
pub const DISCOVERY_PORT: u16 = 3702;

const RECV_BUFFER_SIZE: usize = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub group: Ipv4Addr,
    pub port: u16,

    /// Multicast hop limit
    pub ttl: u32,

    /// Listening window, measured from the send instant
    pub window: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: DISCOVERY_GROUP,
            port: DISCOVERY_PORT,
            ttl: 3,
            window: Duration::from_secs(3),
        }
    }
}

/// Prober sending WS-Discovery Probes
#[derive(Debug, Clone, Default)]
pub struct WsDiscovery {
    config: DiscoveryConfig,
}

impl WsDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Probes the network of `iface` and returns the device service URLs of
    /// the video transmitters that answered, duplicates included.
    ///
    /// Malformed or unrelated datagrams are skipped. Failing to set up the
    /// socket or to send the probe is an error for this interface.
    pub async fn probe_interface(
        &self,
        iface: &NetworkInterface,
    ) -> Result<Vec<String>, DiscoveryError> {
        let local = iface.prefix.addr();
        let socket = self.open_socket(local)?;

        let message_id = Uuid::new_v4();
        let probe = build_probe(&message_id)?;

        let dest = SocketAddrV4::new(self.config.group, self.config.port);
        socket
            .send_to(probe.as_bytes(), dest)
            .await
            .map_err(DiscoveryError::Send)?;
        let deadline = Instant::now() + self.config.window;

        info!(iface = %iface.name, message_id = %message_id, "📤 discovery probe sent");
        trace!(probe = %probe, "discovery probe payload");

        let mut transmitters = Vec::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let (n, src) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await
            {
                Err(_) => break,
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    warn!(iface = %iface.name, error = %e, "error reading discovery response");
                    return Err(DiscoveryError::Receive(e));
                }
            };

            let data = String::from_utf8_lossy(&buf[..n]);
            debug!(iface = %iface.name, src = %src, "discovery response");
            trace!(msg = %data, "discovery response payload");

            match select_transmitters(&data, &message_id, src.ip()) {
                Ok(found) => {
                    for endpoint in found {
                        info!(iface = %iface.name, endpoint = %endpoint, "discovered onvif video transmitter");
                        transmitters.push(endpoint);
                    }
                }
                Err(e) => {
                    warn!(iface = %iface.name, src = %src, error = %e, "error parsing discovery response, skipping");
                }
            }
        }

        debug!(iface = %iface.name, count = transmitters.len(), "discovery window closed");
        Ok(transmitters)
    }

    fn open_socket(&self, local: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(DiscoveryError::Bind)?;
        socket
            .set_reuse_address(true)
            .map_err(DiscoveryError::Bind)?;

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        socket
            .bind(&bind_addr.into())
            .map_err(DiscoveryError::Bind)?;

        socket
            .join_multicast_v4(&self.config.group, &local)
            .map_err(|source| DiscoveryError::JoinGroup {
                group: self.config.group,
                interface: local,
                source,
            })?;

        let multicast = |source: std::io::Error| DiscoveryError::Multicast {
            interface: local,
            source,
        };
        socket.set_multicast_if_v4(&local).map_err(multicast)?;
        socket
            .set_multicast_ttl_v4(self.config.ttl)
            .map_err(multicast)?;

        socket
            .set_nonblocking(true)
            .map_err(DiscoveryError::Bind)?;
        UdpSocket::from_std(socket.into()).map_err(DiscoveryError::Bind)
    }
}
