//! Best-effort classification of raw IP packets for logging.
//!
//! Classification never fails and never aborts delivery: anything that is not
//! a complete IPv4 or IPv6 header is reported as unknown/OTHER and forwarded
//! all the same.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Minimum IPv4 header length.
const IPV4_HDR_LEN: usize = 20;
/// Fixed IPv6 header length.
const IPV6_HDR_LEN: usize = 40;

/// Transport protocol carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Icmp,
    IcmpV6,
    Other,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
            Transport::Icmp => "ICMP",
            Transport::IcmpV6 => "ICMPv6",
            Transport::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// Transient per-packet metadata, derived for observability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketMeta {
    pub src: Option<IpAddr>,
    pub dst: Option<IpAddr>,
    pub proto: Transport,
    pub len: usize,
}

impl PacketMeta {
    fn unknown(len: usize) -> Self {
        Self {
            src: None,
            dst: None,
            proto: Transport::Other,
            len,
        }
    }
}

impl fmt::Display for PacketMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.src {
            Some(addr) => write!(f, "src={addr}")?,
            None => f.write_str("src=unknown")?,
        }
        match self.dst {
            Some(addr) => write!(f, " dst={addr}")?,
            None => f.write_str(" dst=unknown")?,
        }
        write!(f, " proto={} size={}", self.proto, self.len)
    }
}

/// Extract addressing metadata from a raw IP packet.
///
/// Only the version nibble of the first byte selects the header layout; a
/// buffer shorter than the corresponding fixed header is treated as
/// unclassifiable rather than read past its end.
pub fn classify(packet: &[u8]) -> PacketMeta {
    let len = packet.len();
    if packet.is_empty() {
        return PacketMeta::unknown(len);
    }

    match packet[0] >> 4 {
        4 if len >= IPV4_HDR_LEN => {
            let mut src = [0u8; 4];
            let mut dst = [0u8; 4];
            src.copy_from_slice(&packet[12..16]);
            dst.copy_from_slice(&packet[16..20]);

            let proto = match i32::from(packet[9]) {
                libc::IPPROTO_TCP => Transport::Tcp,
                libc::IPPROTO_UDP => Transport::Udp,
                libc::IPPROTO_ICMP => Transport::Icmp,
                _ => Transport::Other,
            };

            PacketMeta {
                src: Some(IpAddr::V4(Ipv4Addr::from(src))),
                dst: Some(IpAddr::V4(Ipv4Addr::from(dst))),
                proto,
                len,
            }
        }
        6 if len >= IPV6_HDR_LEN => {
            let mut src = [0u8; 16];
            let mut dst = [0u8; 16];
            src.copy_from_slice(&packet[8..24]);
            dst.copy_from_slice(&packet[24..40]);

            let proto = match i32::from(packet[6]) {
                libc::IPPROTO_TCP => Transport::Tcp,
                libc::IPPROTO_UDP => Transport::Udp,
                libc::IPPROTO_ICMPV6 => Transport::IcmpV6,
                _ => Transport::Other,
            };

            PacketMeta {
                src: Some(IpAddr::V6(Ipv6Addr::from(src))),
                dst: Some(IpAddr::V6(Ipv6Addr::from(dst))),
                proto,
                len,
            }
        }
        _ => PacketMeta::unknown(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_packet(proto: u8, src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
        let mut pkt = vec![0u8; IPV4_HDR_LEN];
        pkt[0] = 0x45; // version 4, IHL 5
        pkt[9] = proto;
        pkt[12..16].copy_from_slice(&src);
        pkt[16..20].copy_from_slice(&dst);
        pkt
    }

    fn ipv6_packet(next_header: u8, src: [u8; 16], dst: [u8; 16]) -> Vec<u8> {
        let mut pkt = vec![0u8; IPV6_HDR_LEN];
        pkt[0] = 0x60;
        pkt[6] = next_header;
        pkt[8..24].copy_from_slice(&src);
        pkt[24..40].copy_from_slice(&dst);
        pkt
    }

    #[test]
    fn ipv4_tcp() {
        let pkt = ipv4_packet(6, [10, 0, 0, 1], [10, 0, 0, 2]);
        let meta = classify(&pkt);
        assert_eq!(meta.proto, Transport::Tcp);
        assert_eq!(meta.src, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(meta.dst, Some("10.0.0.2".parse().unwrap()));
        assert_eq!(meta.len, pkt.len());
        assert_eq!(
            meta.to_string(),
            "src=10.0.0.1 dst=10.0.0.2 proto=TCP size=20"
        );
    }

    #[test]
    fn ipv4_protocol_names() {
        assert_eq!(classify(&ipv4_packet(17, [0; 4], [0; 4])).proto, Transport::Udp);
        assert_eq!(classify(&ipv4_packet(1, [0; 4], [0; 4])).proto, Transport::Icmp);
        assert_eq!(classify(&ipv4_packet(89, [0; 4], [0; 4])).proto, Transport::Other);
    }

    #[test]
    fn ipv6_udp() {
        let src: Ipv6Addr = "fd00::1".parse().unwrap();
        let dst: Ipv6Addr = "fd00::2".parse().unwrap();
        let pkt = ipv6_packet(17, src.octets(), dst.octets());
        let meta = classify(&pkt);
        assert_eq!(meta.proto, Transport::Udp);
        assert_eq!(meta.src, Some(IpAddr::V6(src)));
        assert_eq!(meta.dst, Some(IpAddr::V6(dst)));
        assert_eq!(meta.to_string(), "src=fd00::1 dst=fd00::2 proto=UDP size=40");
    }

    #[test]
    fn ipv6_icmpv6() {
        let pkt = ipv6_packet(58, [0; 16], [0; 16]);
        assert_eq!(classify(&pkt).proto, Transport::IcmpV6);
    }

    #[test]
    fn empty_buffer_is_unknown() {
        let meta = classify(&[]);
        assert_eq!(meta.proto, Transport::Other);
        assert_eq!(meta.src, None);
        assert_eq!(meta.to_string(), "src=unknown dst=unknown proto=OTHER size=0");
    }

    #[test]
    fn truncated_headers_are_unknown() {
        // Version nibbles are valid but the headers are incomplete.
        let meta = classify(&[0x45, 0x00, 0x00]);
        assert_eq!(meta.src, None);
        assert_eq!(meta.proto, Transport::Other);

        let meta = classify(&[0x60; IPV6_HDR_LEN - 1]);
        assert_eq!(meta.src, None);
    }

    #[test]
    fn bad_version_nibble_is_unknown() {
        let meta = classify(&[0x90; 64]);
        assert_eq!(meta.proto, Transport::Other);
        assert_eq!(meta.src, None);
        assert_eq!(meta.len, 64);
    }
}
