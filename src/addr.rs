//! Parsing of the address/prefix and port command-line tokens.

use std::fmt;
use std::net::Ipv6Addr;

use crate::error::{Error, Result};

/// An IPv6 interface address with its network prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelAddress {
    /// The address to assign to the tunnel interface
    pub address: Ipv6Addr,
    /// Network prefix length (0-128)
    pub prefix_len: u8,
}

impl fmt::Display for TunnelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Parse an `address[/prefix]` token.
///
/// A missing prefix defaults to 128 (host route). The prefix, when present,
/// must be a decimal integer in [0, 128].
pub fn parse_address(token: &str) -> Result<TunnelAddress> {
    let (literal, prefix_len) = match token.rsplit_once('/') {
        Some((literal, suffix)) => {
            let bits: u8 = suffix
                .parse()
                .map_err(|_| Error::InvalidPrefix(suffix.to_string()))?;
            if bits > 128 {
                return Err(Error::InvalidPrefix(suffix.to_string()));
            }
            (literal, bits)
        }
        None => (token, 128),
    };

    let address: Ipv6Addr = literal
        .parse()
        .map_err(|_| Error::InvalidAddress(literal.to_string()))?;

    Ok(TunnelAddress {
        address,
        prefix_len,
    })
}

/// Parse a decimal UDP port in [0, 65535].
pub fn parse_port(token: &str) -> Result<u16> {
    token
        .parse::<u16>()
        .map_err(|_| Error::InvalidPort(token.to_string()))
}
