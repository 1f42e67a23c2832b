//! Error types for the tunnel proxy.

use std::io;

use thiserror::Error;

/// Result type alias for tunnel proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running the tunnel.
#[derive(Debug, Error)]
pub enum Error {
    /// The address token is not a valid IPv6 literal
    #[error("invalid IPv6 address: {0}")]
    InvalidAddress(String),

    /// The prefix length is not an integer in [0, 128]
    #[error("invalid network prefix: {0}")]
    InvalidPrefix(String),

    /// The port is not an integer in [0, 65535]
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// TUN device creation error
    #[error("device creation error: {0}")]
    DeviceCreation(String),

    /// A requested interface name could not be granted
    #[error("interface name conflict: {0}")]
    NameConflict(String),

    /// The kernel has no interface with this name
    #[error("interface not found: {0}")]
    DeviceNotFound(String),

    /// Error on the netlink configuration channel
    #[error("netlink error: {0}")]
    Netlink(#[source] io::Error),

    /// Runtime I/O error on the tunnel descriptor
    #[error("tunnel I/O error: {0}")]
    TunnelIo(#[source] io::Error),

    /// Runtime I/O error on a UDP socket
    #[error("socket I/O error: {0}")]
    SocketIo(#[source] io::Error),
}
