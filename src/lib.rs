//! Userspace IPv6 tunnel endpoint.
//!
//! This crate creates a TUN device, assigns it an IPv6 address and brings the
//! link up by hand-building rtnetlink messages, then relays raw IP packets
//! between the device and a pair of UDP sockets on the loopback address:
//! packets read from the TUN device are sent out as UDP datagrams, and
//! datagrams received over UDP are written back into the device.
//!
//! The design is single-threaded and fully blocking: one `poll(2)` over the
//! two readable descriptors drives the whole relay. Interface configuration is
//! fire-and-forget over a short-lived `NETLINK_ROUTE` socket that is closed
//! before forwarding starts.

pub mod addr;
pub mod error;
pub mod netlink;
pub mod packet;
pub mod proxy;
pub mod socket;
pub mod tun;

pub use addr::{parse_address, parse_port, TunnelAddress};
pub use error::{Error, Result};
pub use netlink::RouteSocket;
pub use packet::{classify, PacketMeta, Transport};
pub use proxy::ProxyLoop;
pub use tun::TunDevice;

/// Buffer ceiling for a single tunnel packet.
pub const MAX_PACKET_SIZE: usize = 65536;
