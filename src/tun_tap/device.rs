//! Allocation of TUN devices through the kernel's clone device.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

use tracing::debug;

use super::ifreq::IfReq;
use crate::{Error, Result};

/// Path of the TUN clone device.
pub const TUN_PATH: &str = "/dev/net/tun";

/// Flags used for every device: TUN mode without the leading packet
/// information bytes.
///
/// IFF_TUN   - TUN device (no Ethernet headers)
/// IFF_NO_PI - Do not provide packet information
///
/// `IFF_MULTI_QUEUE` is not requested: each interface is backed by exactly one
/// file handle.
pub const TUN_FLAGS: u16 = (libc::IFF_TUN | libc::IFF_NO_PI) as u16;

/// Allocates a TUN interface named `name` with the given `flags`.
///
/// Returns the file handle bound to the interface together with the name the
/// kernel actually assigned.
///
/// # Errors
///
/// Returns an error if the clone device cannot be opened, if the kernel
/// rejects the `TUNSETIFF` request (for example without `CAP_NET_ADMIN`), or
/// if the blocking mode cannot be applied. The file handle is closed before
/// returning in every failure case.
pub(crate) fn allocate(name: &str, flags: u16, nonblocking: bool) -> Result<(File, String)> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .open(TUN_PATH)
        .map_err(|source| Error::DeviceOpen {
            path: TUN_PATH,
            source,
        })?;

    let mut ifr = IfReq::new(name).with_flags(flags);

    if unsafe { libc::ioctl(fd.as_raw_fd(), libc::TUNSETIFF, ifr.as_mut_ptr()) } == -1 {
        return Err(Error::Ioctl {
            name: name.to_string(),
            source: io::Error::last_os_error(),
        });
    }

    set_nonblocking(&fd, nonblocking).map_err(Error::NonBlocking)?;

    let assigned = ifr.name();
    debug!("allocated TUN interface {assigned} (fd {})", fd.as_raw_fd());

    Ok((fd, assigned))
}

/// Sets or clears `O_NONBLOCK` on `fd`, keeping its other status flags.
pub(crate) fn set_nonblocking(fd: &File, nonblocking: bool) -> io::Result<()> {
    let fd = fd.as_raw_fd();

    // Get the current flags so they can be combined with `O_NONBLOCK`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }

    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };

    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
