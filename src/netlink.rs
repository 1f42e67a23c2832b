//! Rtnetlink message construction and the kernel configuration channel.
//!
//! Address assignment and link state are configured by hand-building rtnetlink
//! messages rather than going through a higher-level configuration API. Both
//! requests are fire-and-forget: no kernel reply is ever read, so a fixed
//! sequence number is sufficient and the socket lives only for the two sends
//! at startup.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use crate::addr::TunnelAddress;
use crate::error::{Error, Result};

// Compile-time size assertions to ensure struct layouts match kernel expectations
const _: () = assert!(mem::size_of::<NlMsgHdr>() == 16);
const _: () = assert!(mem::size_of::<IfAddrMsg>() == 8);
const _: () = assert!(mem::size_of::<IfInfoMsg>() == 16);
const _: () = assert!(mem::size_of::<RtAttr>() == 4);

// Netlink message header flags
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

// Rtnetlink message types
pub const RTM_NEWLINK: u16 = 16;
pub const RTM_NEWADDR: u16 = 20;

// Address attribute types
pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;

// Link flags
pub const IFF_UP: u32 = 0x1;

/// Sequence number stamped on every request. Replies are never read, so a
/// fixed value is enough.
pub const CONFIG_SEQ: u32 = 1;

// Alignment boundary for message and attribute offsets
pub const NLMSG_ALIGNTO: usize = 4;

#[inline]
pub fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Netlink message header (struct nlmsghdr)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    pub const SIZE: usize = mem::size_of::<NlMsgHdr>();
}

/// Interface address message (struct ifaddrmsg)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

impl IfAddrMsg {
    pub const SIZE: usize = mem::size_of::<IfAddrMsg>();
}

/// Interface info message (struct ifinfomsg)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = mem::size_of::<IfInfoMsg>();
}

/// Routing attribute header (struct rtattr)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct RtAttr {
    pub rta_len: u16,
    pub rta_type: u16,
}

impl RtAttr {
    pub const SIZE: usize = mem::size_of::<RtAttr>();
}

/// Buffer for building rtnetlink messages.
///
/// Lengths follow the kernel's dual convention: every stored length field (an
/// attribute's `rta_len`, the final `nlmsg_len`) is the unaligned content
/// length, while the write cursor advances to the next 4-byte boundary before
/// each new field.
#[derive(Default)]
pub struct MsgBuilder {
    data: Vec<u8>,
}

impl MsgBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(128),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pad the cursor to the next alignment boundary.
    fn align(&mut self) {
        let aligned = nlmsg_align(self.data.len());
        self.data.resize(aligned, 0);
    }

    /// Add the netlink message header. The length field is patched by
    /// [`MsgBuilder::finish`].
    pub fn put_header(&mut self, msg_type: u16, flags: u16) {
        let hdr = NlMsgHdr {
            nlmsg_len: 0,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: CONFIG_SEQ,
            nlmsg_pid: 0,
        };
        let bytes: [u8; NlMsgHdr::SIZE] = unsafe { mem::transmute(hdr) };
        self.data.extend_from_slice(&bytes);
    }

    /// Add the interface address message body.
    pub fn put_ifaddrmsg(&mut self, msg: IfAddrMsg) {
        let bytes: [u8; IfAddrMsg::SIZE] = unsafe { mem::transmute(msg) };
        self.data.extend_from_slice(&bytes);
    }

    /// Add the interface info message body.
    pub fn put_ifinfomsg(&mut self, msg: IfInfoMsg) {
        let bytes: [u8; IfInfoMsg::SIZE] = unsafe { mem::transmute(msg) };
        self.data.extend_from_slice(&bytes);
    }

    /// Append a routing attribute. The stored `rta_len` stays unaligned; the
    /// attribute itself starts at the next 4-byte boundary after the previous
    /// field.
    pub fn append_attr(&mut self, attr_type: u16, value: &[u8]) {
        self.align();
        let len = (RtAttr::SIZE + value.len()) as u16;
        self.data.extend_from_slice(&len.to_ne_bytes());
        self.data.extend_from_slice(&attr_type.to_ne_bytes());
        self.data.extend_from_slice(value);
    }

    /// Patch the header length field and return the finished message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.data.len() as u32;
        self.data[0..4].copy_from_slice(&len.to_ne_bytes());
        self.data
    }
}

/// Build the RTM_NEWADDR request assigning `addr` to interface `ifindex`.
pub fn new_addr_v6(ifindex: u32, addr: &TunnelAddress) -> Vec<u8> {
    let mut msg = MsgBuilder::new();
    msg.put_header(RTM_NEWADDR, NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL);
    msg.put_ifaddrmsg(IfAddrMsg {
        ifa_family: libc::AF_INET6 as u8,
        ifa_prefixlen: addr.prefix_len,
        ifa_flags: 0,
        ifa_scope: 0,
        ifa_index: ifindex,
    });

    // Some kernel code paths read IFA_ADDRESS, others IFA_LOCAL depending on
    // the interface type; emit both.
    let octets = addr.address.octets();
    msg.append_attr(IFA_ADDRESS, &octets);
    msg.append_attr(IFA_LOCAL, &octets);

    msg.finish()
}

/// Build the RTM_NEWLINK request bringing interface `ifindex` up.
///
/// The all-ones change mask tells the kernel to apply exactly the flags given
/// and leave nothing to its defaults.
pub fn link_up(ifindex: u32) -> Vec<u8> {
    let mut msg = MsgBuilder::new();
    msg.put_header(RTM_NEWLINK, NLM_F_REQUEST);
    msg.put_ifinfomsg(IfInfoMsg {
        ifi_family: 0,
        ifi_pad: 0,
        ifi_type: 0,
        ifi_index: ifindex as i32,
        ifi_flags: IFF_UP,
        ifi_change: 0xffff_ffff,
    });
    msg.finish()
}

/// Resolve an interface name to its kernel index.
pub fn interface_index(name: &str) -> Result<u32> {
    let c_name =
        CString::new(name).map_err(|_| Error::DeviceNotFound(name.to_string()))?;

    // SAFETY: if_nametoindex is safe to call with a valid C string
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    if index == 0 {
        return Err(Error::DeviceNotFound(name.to_string()));
    }

    Ok(index)
}

/// A NETLINK_ROUTE socket for one-shot interface configuration.
///
/// Bound to no multicast group: it only sends requests to the kernel and never
/// subscribes to event notifications.
pub struct RouteSocket {
    fd: RawFd,
}

impl RouteSocket {
    /// Open and bind the configuration socket.
    pub fn connect() -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::NETLINK_ROUTE,
            )
        };

        if fd < 0 {
            return Err(Error::Netlink(io::Error::last_os_error()));
        }

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as u16;

        let ret = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            )
        };

        if ret < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::Netlink(err));
        }

        Ok(Self { fd })
    }

    /// Send a message to the kernel. No reply is read.
    pub fn send(&self, msg: &[u8]) -> Result<()> {
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as u16;
        addr.nl_pid = 0; // kernel
        addr.nl_groups = 0;

        let sent = unsafe {
            libc::sendto(
                self.fd,
                msg.as_ptr() as *const libc::c_void,
                msg.len(),
                0,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            )
        };

        if sent < 0 {
            return Err(Error::Netlink(io::Error::last_os_error()));
        }

        if sent as usize != msg.len() {
            return Err(Error::Netlink(io::Error::other("incomplete send")));
        }

        Ok(())
    }
}

impl AsRawFd for RouteSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RouteSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn read_header(buf: &[u8]) -> NlMsgHdr {
        assert!(buf.len() >= NlMsgHdr::SIZE);
        unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const NlMsgHdr) }
    }

    fn read_attr(buf: &[u8], offset: usize) -> (RtAttr, &[u8]) {
        let attr: RtAttr =
            unsafe { std::ptr::read_unaligned(buf[offset..].as_ptr() as *const RtAttr) };
        let start = offset + RtAttr::SIZE;
        let end = offset + attr.rta_len as usize;
        (attr, &buf[start..end])
    }

    fn sample_address() -> TunnelAddress {
        TunnelAddress {
            address: "fd00:aa::1".parse::<Ipv6Addr>().unwrap(),
            prefix_len: 64,
        }
    }

    #[test]
    fn new_addr_round_trip() {
        let addr = sample_address();
        let buf = new_addr_v6(7, &addr);

        let hdr = read_header(&buf);
        assert_eq!(hdr.nlmsg_len as usize, buf.len());
        assert_eq!(buf.len(), 64);
        assert_eq!(hdr.nlmsg_type, RTM_NEWADDR);
        assert_eq!(hdr.nlmsg_flags, NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL);
        assert_eq!(hdr.nlmsg_seq, CONFIG_SEQ);
        assert_eq!(hdr.nlmsg_pid, 0);

        let body: IfAddrMsg = unsafe {
            std::ptr::read_unaligned(buf[NlMsgHdr::SIZE..].as_ptr() as *const IfAddrMsg)
        };
        assert_eq!(body.ifa_family, libc::AF_INET6 as u8);
        assert_eq!(body.ifa_prefixlen, 64);
        assert_eq!(body.ifa_flags, 0);
        assert_eq!(body.ifa_scope, 0);
        assert_eq!(body.ifa_index, 7);

        // Two 20-byte attributes follow the 24-byte header+body.
        let (first, first_val) = read_attr(&buf, NlMsgHdr::SIZE + IfAddrMsg::SIZE);
        assert_eq!(first.rta_type, IFA_ADDRESS);
        assert_eq!(first.rta_len as usize, RtAttr::SIZE + 16);
        assert_eq!(first_val, addr.address.octets());

        let next_offset = NlMsgHdr::SIZE + IfAddrMsg::SIZE + nlmsg_align(first.rta_len as usize);
        let (second, second_val) = read_attr(&buf, next_offset);
        assert_eq!(second.rta_type, IFA_LOCAL);
        assert_eq!(second.rta_len as usize, RtAttr::SIZE + 16);
        assert_eq!(second_val, addr.address.octets());
    }

    #[test]
    fn attr_lengths_stored_unaligned_offsets_advance_aligned() {
        let mut msg = MsgBuilder::new();
        msg.put_header(RTM_NEWADDR, NLM_F_REQUEST);
        msg.append_attr(1, &[0xaa, 0xbb, 0xcc]);
        msg.append_attr(2, &[0x11, 0x22, 0x33, 0x44, 0x55]);
        let buf = msg.finish();

        // First attribute right after the header, length 4+3 stored as-is.
        let (first, first_val) = read_attr(&buf, NlMsgHdr::SIZE);
        assert_eq!(first.rta_len, 7);
        assert_eq!(first_val, [0xaa, 0xbb, 0xcc]);

        // Second attribute starts at the aligned offset, not at 16+7.
        let second_offset = NlMsgHdr::SIZE + nlmsg_align(7);
        assert_eq!(second_offset, NlMsgHdr::SIZE + 8);
        let (second, second_val) = read_attr(&buf, second_offset);
        assert_eq!(second.rta_len, 9);
        assert_eq!(second.rta_type, 2);
        assert_eq!(second_val, [0x11, 0x22, 0x33, 0x44, 0x55]);

        // Padding byte between the attributes is zeroed.
        assert_eq!(buf[NlMsgHdr::SIZE + 7], 0);

        // The total message length is the unaligned tail position.
        let hdr = read_header(&buf);
        assert_eq!(hdr.nlmsg_len as usize, second_offset + 9);
        assert_eq!(hdr.nlmsg_len as usize, buf.len());
    }

    #[test]
    fn link_up_message_layout() {
        let buf = link_up(3);

        let hdr = read_header(&buf);
        assert_eq!(hdr.nlmsg_len as usize, buf.len());
        assert_eq!(buf.len(), NlMsgHdr::SIZE + IfInfoMsg::SIZE);
        assert_eq!(hdr.nlmsg_type, RTM_NEWLINK);
        assert_eq!(hdr.nlmsg_flags, NLM_F_REQUEST);

        let body: IfInfoMsg = unsafe {
            std::ptr::read_unaligned(buf[NlMsgHdr::SIZE..].as_ptr() as *const IfInfoMsg)
        };
        assert_eq!(body.ifi_index, 3);
        assert_eq!(body.ifi_flags, IFF_UP);
        assert_eq!(body.ifi_change, 0xffff_ffff);
    }

    #[test]
    fn unknown_interface_fails_resolution() {
        assert!(matches!(
            interface_index("no-such-interface-0"),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn embedded_nul_in_name_fails_resolution() {
        assert!(matches!(
            interface_index("bad\0name"),
            Err(Error::DeviceNotFound(_))
        ));
    }
}
