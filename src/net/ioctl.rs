//! [LinkControl] backed by `SIOC*` interface ioctls.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::{debug, info};

use super::link::{Link, LinkControl, LinkState};
use crate::tun_tap::ifreq::IfReq;
use crate::{Error, Result};

/// Request structure for IPv6 address assignment (`struct in6_ifreq`).
#[repr(C)]
struct In6IfReq {
    addr: libc::in6_addr,
    prefix_len: u32,
    ifindex: libc::c_int,
}

/// Configures links through datagram sockets.
///
/// Interface ioctls act on the network namespace the socket was created in,
/// not on the namespace of the calling thread. A control created inside a
/// namespace keeps configuring that namespace for its whole lifetime.
#[derive(Debug)]
pub struct IoctlControl {
    inet: OwnedFd,
    inet6: Option<OwnedFd>,
}

impl IoctlControl {
    /// Opens the control sockets in the calling thread's network namespace.
    ///
    /// The IPv6 socket is optional; on hosts without IPv6 support only IPv4
    /// addresses can be assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the IPv4 control socket cannot be created.
    pub fn new() -> io::Result<Self> {
        let inet = socket(libc::AF_INET)?;
        let inet6 = match socket(libc::AF_INET6) {
            Ok(fd) => Some(fd),
            Err(err) => {
                debug!("IPv6 link control unavailable: {err}");
                None
            }
        };

        Ok(Self { inet, inet6 })
    }

    fn flags(&self, link: &Link) -> io::Result<IfReq> {
        let mut ifr = IfReq::new(link.name());
        ioctl(&self.inet, libc::SIOCGIFFLAGS as _, ifr.as_mut_ptr().cast())?;
        Ok(ifr)
    }

    fn set_state(&self, link: &Link, state: LinkState) -> Result<()> {
        let apply = || -> io::Result<()> {
            let mut ifr = self.flags(link)?;
            let up = libc::IFF_UP as u16;
            let flags = match state {
                LinkState::Up => ifr.flags() | up,
                LinkState::Down => ifr.flags() & !up,
            };
            ifr.set_flags(flags);
            ioctl(&self.inet, libc::SIOCSIFFLAGS as _, ifr.as_mut_ptr().cast())
        };

        apply().map_err(|source| Error::LinkState {
            name: link.name().to_string(),
            state,
            source,
        })?;

        info!("interface {} is {state}", link.name());
        Ok(())
    }

    fn add_ipv4(&self, link: &Link, net: Ipv4Net) -> io::Result<()> {
        let mut ifr = IfReq::new(link.name());
        ifr.set_ipv4(net.addr());
        ioctl(&self.inet, libc::SIOCSIFADDR as _, ifr.as_mut_ptr().cast())?;

        let mut ifr = IfReq::new(link.name());
        ifr.set_ipv4(net.netmask());
        ioctl(&self.inet, libc::SIOCSIFNETMASK as _, ifr.as_mut_ptr().cast())
    }

    fn add_ipv6(&self, link: &Link, net: Ipv6Net) -> io::Result<()> {
        let sock = self
            .inet6
            .as_ref()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EAFNOSUPPORT))?;

        let mut req = In6IfReq {
            addr: libc::in6_addr {
                s6_addr: net.addr().octets(),
            },
            prefix_len: u32::from(net.prefix_len()),
            ifindex: link.index() as libc::c_int,
        };

        ioctl(sock, libc::SIOCSIFADDR as _, (&raw mut req).cast())
    }
}

/// IPv4 addresses are set with `SIOCSIFADDR`, which replaces the primary
/// address of the link together with its netmask. IPv6 addresses are added
/// alongside existing ones.
impl LinkControl for IoctlControl {
    fn link_by_name(&self, name: &str) -> Result<Link> {
        let mut ifr = IfReq::new(name);

        ioctl(&self.inet, libc::SIOCGIFINDEX as _, ifr.as_mut_ptr().cast()).map_err(
            |source| Error::LinkNotFound {
                name: name.to_string(),
                source,
            },
        )?;

        Ok(Link::new(ifr.ifindex() as u32, ifr.name()))
    }

    /// Replaces the IPv4 address of `link`, or adds an IPv6 address.
    fn add_addr(&self, link: &Link, addr: IpNet) -> Result<()> {
        let res = match addr {
            IpNet::V4(net) => self.add_ipv4(link, net),
            IpNet::V6(net) => self.add_ipv6(link, net),
        };

        res.map_err(|source| Error::AddressApply {
            name: link.name().to_string(),
            addr,
            source,
        })?;

        info!("assigned {addr} to interface {}", link.name());
        Ok(())
    }

    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<()> {
        let err = |source| Error::MtuApply {
            name: link.name().to_string(),
            mtu,
            source,
        };

        let value = libc::c_int::try_from(mtu)
            .map_err(|_| err(io::Error::from_raw_os_error(libc::EINVAL)))?;

        let mut ifr = IfReq::new(link.name());
        ifr.set_mtu(value);
        ioctl(&self.inet, libc::SIOCSIFMTU as _, ifr.as_mut_ptr().cast()).map_err(err)?;

        info!("set MTU of interface {} to {mtu}", link.name());
        Ok(())
    }

    fn set_up(&self, link: &Link) -> Result<()> {
        self.set_state(link, LinkState::Up)
    }

    fn set_down(&self, link: &Link) -> Result<()> {
        self.set_state(link, LinkState::Down)
    }
}

fn socket(domain: libc::c_int) -> io::Result<OwnedFd> {
    let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `fd` was just returned by `socket()` and is owned by nothing else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn ioctl(sock: &OwnedFd, request: libc::c_ulong, arg: *mut libc::c_void) -> io::Result<()> {
    let fd: RawFd = sock.as_raw_fd();

    if unsafe { libc::ioctl(fd, request as _, arg) } == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
