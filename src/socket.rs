//! UDP socket construction for the two tunnel endpoints.
//!
//! One datagram carries exactly one tunnel packet; there is no extra framing
//! and no handshake. Both sockets live on the IPv6 loopback: the send socket
//! is connected to the peer's port, the receive socket is bound to ours.

use std::net::{Ipv6Addr, SocketAddrV6, UdpSocket};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Error, Result};

/// Create the send-side socket, connected to `[::1]:port`.
pub fn udp_sender(port: u16) -> Result<UdpSocket> {
    let socket =
        Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).map_err(Error::SocketIo)?;
    let peer = SockAddr::from(SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0));
    socket.connect(&peer).map_err(Error::SocketIo)?;
    Ok(socket.into())
}

/// Create the receive-side socket, bound to `[::1]:port`.
pub fn udp_receiver(port: u16) -> Result<UdpSocket> {
    let socket =
        Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).map_err(Error::SocketIo)?;
    let local = SockAddr::from(SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0));
    socket.bind(&local).map_err(Error::SocketIo)?;
    Ok(socket.into())
}
