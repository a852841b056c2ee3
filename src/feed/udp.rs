//! Fire-and-forget UDP packet sender for the feed handler.

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{info, warn};

use super::FeedError;

/// Where the feed handler sends its Mold packets.
#[derive(Debug, Clone)]
pub enum FeedDestination {
    /// A multicast group with a configurable TTL.
    Multicast {
        /// The multicast group address.
        group: Ipv4Addr,
        /// Destination port.
        port: u16,
        /// `IP_MULTICAST_TTL`; 1 keeps packets on the local segment.
        ttl: u32,
    },
    /// A unicast `host:port` destination, resolved at startup.
    Unicast {
        /// Destination in `host:port` form.
        addr: String,
    },
}

/// A datagram socket bound for one destination.
///
/// Every send is one fire-and-forget datagram; failures are logged and
/// never retried.
pub struct UdpFeedSender {
    socket: UdpSocket,
    dest: SocketAddr,
    packets_sent: u64,
}

impl UdpFeedSender {
    /// Open a socket for the given destination.
    pub fn open(dest: &FeedDestination) -> Result<Self, FeedError> {
        let (socket, addr) = match dest {
            FeedDestination::Multicast { group, port, ttl } => {
                let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| FeedError::Socket {
                    message: format!("bind failed: {e}"),
                })?;
                socket
                    .set_multicast_ttl_v4(*ttl)
                    .map_err(|e| FeedError::Socket {
                        message: format!("setting multicast TTL failed: {e}"),
                    })?;
                (socket, SocketAddr::from((*group, *port)))
            }
            FeedDestination::Unicast { addr } => {
                let resolved = addr
                    .to_socket_addrs()
                    .map_err(|e| FeedError::Socket {
                        message: format!("cannot resolve {addr}: {e}"),
                    })?
                    .next()
                    .ok_or_else(|| FeedError::Socket {
                        message: format!("{addr} resolved to no addresses"),
                    })?;
                let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| FeedError::Socket {
                    message: format!("bind failed: {e}"),
                })?;
                (socket, resolved)
            }
        };
        info!(dest = %addr, "feed sender ready");
        Ok(Self {
            socket,
            dest: addr,
            packets_sent: 0,
        })
    }

    /// Send one datagram; failures are logged and swallowed.
    pub fn send(&mut self, buf: &[u8]) {
        match self.socket.send_to(buf, self.dest) {
            Ok(_) => self.packets_sent += 1,
            Err(e) => warn!(dest = %self.dest, error = %e, "UDP send failed"),
        }
    }

    /// Packets successfully handed to the network stack.
    #[must_use]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }
}
