//! The forwarding loop bridging the TUN device and the UDP sockets.

use std::io;
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::packet;
use crate::tun::TunDevice;
use crate::MAX_PACKET_SIZE;

// Readiness bits that make a descriptor worth reading. POLLERR/POLLHUP are
// included so a broken descriptor surfaces through the read path instead of
// spinning silently.
const READ_EVENTS: i16 = libc::POLLIN | libc::POLLERR | libc::POLLHUP;

/// Bidirectional relay between one TUN device and a pair of UDP sockets.
///
/// Single-threaded: one `poll(2)` over the two readable descriptors, one
/// shared packet buffer reused by both directions in turn. Within a wake
/// cycle the TUN-to-UDP direction is always serviced first.
pub struct ProxyLoop<'a> {
    tun: &'a TunDevice,
    sender: &'a UdpSocket,
    receiver: &'a UdpSocket,
    buf: Vec<u8>,
}

impl<'a> ProxyLoop<'a> {
    pub fn new(tun: &'a TunDevice, sender: &'a UdpSocket, receiver: &'a UdpSocket) -> Self {
        Self {
            tun,
            sender,
            receiver,
            buf: vec![0u8; MAX_PACKET_SIZE],
        }
    }

    /// Run until an unrecoverable I/O error on the TUN device or the receive
    /// socket. Never returns `Ok`.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.poll_once(-1)?;
        }
    }

    /// Wait for readiness (at most `timeout_ms`, -1 to block indefinitely)
    /// and service each ready direction once.
    fn poll_once(&mut self, timeout_ms: i32) -> Result<()> {
        let mut fds = [
            libc::pollfd {
                fd: self.tun.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.receiver.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(());
            }
            return Err(Error::SocketIo(err));
        }

        if fds[0].revents & READ_EVENTS != 0 {
            self.tun_to_udp()?;
        }
        if fds[1].revents & READ_EVENTS != 0 {
            self.udp_to_tun()?;
        }

        Ok(())
    }

    fn tun_to_udp(&mut self) -> Result<()> {
        let n = self.tun.read(&mut self.buf).map_err(Error::TunnelIo)?;
        let meta = packet::classify(&self.buf[..n]);
        debug!(%meta, "tun -> udp");

        // Best effort: a missing or refused peer must not tear down the tunnel.
        if let Err(e) = self.sender.send(&self.buf[..n]) {
            trace!("udp send failed: {e}");
        }
        Ok(())
    }

    fn udp_to_tun(&mut self) -> Result<()> {
        let n = self.receiver.recv(&mut self.buf).map_err(Error::SocketIo)?;
        let meta = packet::classify(&self.buf[..n]);
        debug!(%meta, "udp -> tun");

        if let Err(e) = self.tun.write(&self.buf[..n]) {
            trace!("tun write failed: {e}");
        }
        Ok(())
    }
}
