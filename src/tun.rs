//! TUN device creation via /dev/net/tun.

use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr;

use crate::error::{Error, Result};

/// TUN device (layer 3)
pub const IFF_TUN: i16 = 0x0001;
/// No packet information header
pub const IFF_NO_PI: i16 = 0x1000;

const TUN_PATH: &[u8] = b"/dev/net/tun\0";

/// A TUN interface opened in `IFF_NO_PI` mode: reads and writes move whole raw
/// IP packets with no link-layer framing.
pub struct TunDevice {
    fd: RawFd,
    name: String,
}

impl TunDevice {
    /// Open a TUN device.
    ///
    /// With `name: None` the kernel assigns the interface name, which is read
    /// back and reported through [`TunDevice::name`]. With an explicit name
    /// the kernel must grant exactly that name or the open fails with
    /// [`Error::NameConflict`].
    ///
    /// Requires root or `CAP_NET_ADMIN`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let fd = unsafe {
            libc::open(
                TUN_PATH.as_ptr() as *const libc::c_char,
                libc::O_RDWR | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(Error::DeviceCreation(format!(
                "open /dev/net/tun: {}",
                io::Error::last_os_error()
            )));
        }

        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
        ifr.ifr_ifru.ifru_flags = IFF_TUN | IFF_NO_PI;

        if let Some(requested) = name {
            // Leave room for the NUL terminator within IFNAMSIZ.
            let bytes = requested.as_bytes();
            if bytes.is_empty() || bytes.len() >= libc::IFNAMSIZ || bytes.contains(&0) {
                unsafe { libc::close(fd) };
                return Err(Error::DeviceCreation(format!(
                    "invalid interface name: {requested}"
                )));
            }
            unsafe {
                ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    ifr.ifr_name.as_mut_ptr() as *mut u8,
                    bytes.len(),
                );
            }
        }

        let ret = unsafe { libc::ioctl(fd, libc::TUNSETIFF as _, &mut ifr) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            if let Some(requested) = name {
                if err.raw_os_error() == Some(libc::EBUSY) {
                    return Err(Error::NameConflict(requested.to_string()));
                }
            }
            return Err(Error::DeviceCreation(format!("ioctl(TUNSETIFF): {err}")));
        }

        let granted: String = ifr
            .ifr_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8 as char)
            .collect();

        if let Some(requested) = name {
            if granted != requested {
                unsafe { libc::close(fd) };
                return Err(Error::NameConflict(requested.to_string()));
            }
        }

        Ok(Self { fd, name: granted })
    }

    /// Wrap an existing descriptor. Takes ownership of `fd` and closes it on
    /// drop.
    ///
    /// # Safety
    ///
    /// `fd` must be a valid, open descriptor that no other code will close.
    pub unsafe fn from_fd(fd: RawFd, name: impl Into<String>) -> Self {
        Self {
            fd,
            name: name.into(),
        }
    }

    /// The kernel-assigned interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read one packet. Blocks until a packet is available.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    /// Write one packet.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TunDevice {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

impl std::fmt::Debug for TunDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice")
            .field("fd", &self.fd)
            .field("name", &self.name)
            .finish()
    }
}
