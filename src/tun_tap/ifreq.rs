//! Interface requests (`struct ifreq`) passed to the kernel through `ioctl`.

use std::net::Ipv4Addr;
use std::{fmt, mem, ptr};

/// Maximum number of name bytes stored in a request. The last byte of the
/// `IFNAMSIZ` field is reserved for the null terminator.
pub const MAX_NAME_LEN: usize = libc::IFNAMSIZ - 1;

/// An interface request: a fixed-size interface name followed by a union of
/// per-request values (flags, MTU, index, address).
///
/// The union space not written by a setter stays zero-filled.
#[derive(Clone, Copy)]
pub struct IfReq(libc::ifreq);

impl IfReq {
    /// Creates a zeroed request for the interface `name`.
    ///
    /// Names longer than [MAX_NAME_LEN] bytes are silently truncated; the
    /// kernel only ever sees the first 15 bytes.
    pub fn new(name: &str) -> Self {
        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };

        let len = name.len().min(MAX_NAME_LEN);

        unsafe {
            // SAFETY: `len` is at most `IFNAMSIZ - 1`, so the copy stays within
            // `ifr_name` and leaves its last byte null.
            ptr::copy_nonoverlapping(
                name.as_ptr(),
                ifr.ifr_name.as_mut_ptr() as *mut u8,
                len,
            );
        }

        Self(ifr)
    }

    /// Sets the 16-bit flags field.
    pub fn with_flags(mut self, flags: u16) -> Self {
        self.set_flags(flags);
        self
    }

    /// Sets the 16-bit flags field.
    pub fn set_flags(&mut self, flags: u16) {
        self.0.ifr_ifru.ifru_flags = flags as libc::c_short;
    }

    /// Returns the 16-bit flags field.
    pub fn flags(&self) -> u16 {
        unsafe { self.0.ifr_ifru.ifru_flags as u16 }
    }

    /// Sets the MTU field.
    pub fn set_mtu(&mut self, mtu: libc::c_int) {
        self.0.ifr_ifru.ifru_mtu = mtu;
    }

    /// Returns the interface index, as filled in by `SIOCGIFINDEX`.
    pub fn ifindex(&self) -> libc::c_int {
        unsafe { self.0.ifr_ifru.ifru_ifindex }
    }

    /// Stores `addr` as an `AF_INET` socket address in the address slot of the
    /// union, which also backs the netmask used by `SIOCSIFNETMASK`.
    pub fn set_ipv4(&mut self, addr: Ipv4Addr) {
        let sin = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: 0,
            sin_addr: libc::in_addr {
                s_addr: u32::from_ne_bytes(addr.octets()),
            },
            sin_zero: [0; 8],
        };

        unsafe {
            // SAFETY: `sockaddr_in` and `sockaddr` are both 16 bytes, and the
            // kernel interprets the slot according to `sin_family`.
            ptr::write_unaligned(
                &raw mut self.0.ifr_ifru.ifru_addr as *mut libc::sockaddr_in,
                sin,
            );
        }
    }

    /// Returns the raw name field, including trailing null bytes.
    pub fn name_bytes(&self) -> [u8; libc::IFNAMSIZ] {
        self.0.ifr_name.map(|c| c as u8)
    }

    /// Returns the interface name up to the first null byte.
    ///
    /// After `TUNSETIFF` this holds the name assigned by the kernel, which may
    /// differ from the requested one (e.g. `tun%d` patterns).
    pub fn name(&self) -> String {
        let bytes = self.name_bytes();
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..len]).into_owned()
    }

    /// Returns a pointer to the underlying request for use with `ioctl`.
    pub fn as_mut_ptr(&mut self) -> *mut libc::ifreq {
        &mut self.0
    }
}

impl fmt::Debug for IfReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IfReq")
            .field("name", &self.name())
            .field("flags", &format_args!("{:#06x}", self.flags()))
            .finish()
    }
}
