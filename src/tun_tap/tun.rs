use std::fs::File;
use std::io::{self, Read, Write};
use std::net::IpAddr;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use ipnet::IpNet;
use tracing::{debug, info};

use super::config::TunConfig;
use super::device::{self, TUN_FLAGS};
use crate::net::{IoctlControl, Link, LinkControl};
use crate::{Error, Result};

/// TUN (network TUNnel) interface.
///
/// A virtual network device that acts as a software loopback for transferring
/// IP packets between user space and the kernel, operating at layer 3 of the
/// OSI model.
///
/// The handle owns the device's file handle and remembers the interface's
/// name, address, subnet and MTU. Link configuration goes through the
/// [LinkControl] `C`; the link is resolved by name on first use and cached.
#[derive(Debug)]
pub struct Tun<C = IoctlControl> {
    name: String,
    ip: Option<IpAddr>,
    network: Option<IpNet>,
    mtu: u32,
    fd: Option<File>,
    link: Option<Link>,
    control: C,
}

impl Tun {
    /// Creates and opens a TUN interface named `name`.
    ///
    /// If `namespace` is given, the interface is created inside that named
    /// network namespace. If `cidr` is given (e.g. `"10.0.0.2/24"`), the
    /// address is assigned and the interface brought up.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR is malformed, the namespace cannot be
    /// resolved or entered, or any step of allocation or configuration fails.
    /// Nothing is allocated when the CIDR or the namespace is rejected.
    pub fn new(name: &str, cidr: Option<&str>, namespace: Option<&str>) -> Result<Self> {
        let mut config = TunConfig::new(name);
        if let Some(cidr) = cidr {
            config = config.with_address(cidr);
        }
        if let Some(namespace) = namespace {
            config = config.with_namespace(namespace);
        }

        config.build()
    }
}

impl<C: LinkControl> Tun<C> {
    /// Creates a handle for the interface `name` that is not yet open.
    pub fn with_control(name: impl Into<String>, control: C) -> Self {
        Self {
            name: name.into(),
            ip: None,
            network: None,
            mtu: 0,
            fd: None,
            link: None,
            control,
        }
    }

    /// Returns the interface name.
    ///
    /// After [Tun::open] this is the name assigned by the kernel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the interface name.
    ///
    /// Only the local label changes: an interface that already exists is not
    /// renamed. The cached link is dropped, so later configuration resolves
    /// the new name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.link = None;
    }

    /// Returns the assigned IP address.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// Returns the subnet of the assigned address.
    pub fn network(&self) -> Option<IpNet> {
        self.network
    }

    /// Returns the MTU, 0 if it was never set.
    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    /// Returns `true` if the TUN device is open.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Returns the raw file descriptor of the open device.
    pub fn fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Parses `cidr` and assigns the address to the interface, then brings
    /// the interface up.
    ///
    /// The stored subnet is the network of `cidr`, while the prefix applied to
    /// the interface always carries the stored address.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCidr] before touching the interface if `cidr` is
    /// malformed.
    pub fn set_addr(&mut self, cidr: &str) -> Result<()> {
        let (ip, network) = parse_cidr(cidr)?;
        self.assign_cidr(ip, network)
    }

    /// Sets the IP address and applies it with the prefix length of the
    /// stored subnet.
    ///
    /// The address may lie outside the stored subnet, in which case the
    /// stored subnet becomes the one `ip` belongs to at that prefix length.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingNetwork] if no subnet is stored, or
    /// [Error::InvalidPrefix] if its prefix length does not fit the address
    /// family of `ip`. Nothing is stored in either case.
    pub fn set_ip(&mut self, ip: IpAddr) -> Result<()> {
        let addr = prefix(Some(ip), self.network)?;

        self.ip = Some(ip);
        self.network = Some(addr.trunc());
        self.assign(addr)
    }

    /// Sets the subnet and applies the stored address with its prefix length.
    ///
    /// Only the prefix length of `network` is applied; the stored subnet
    /// becomes the one the stored address belongs to at that length.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingAddress] if no address is stored, or
    /// [Error::InvalidPrefix] if the prefix length does not fit the address
    /// family of the stored address.
    pub fn set_network(&mut self, network: IpNet) -> Result<()> {
        let addr = prefix(self.ip, Some(network))?;

        self.network = Some(addr.trunc());
        self.assign(addr)
    }

    /// Sets the MTU of the interface.
    pub fn set_mtu(&mut self, mtu: u32) -> Result<()> {
        self.mtu = mtu;

        let link = resolve(&self.control, &mut self.link, &self.name)?;
        self.control.set_mtu(link, mtu)
    }

    /// Brings the interface administratively up.
    pub fn up(&mut self) -> Result<()> {
        let link = resolve(&self.control, &mut self.link, &self.name)?;
        self.control.set_up(link)
    }

    /// Brings the interface administratively down.
    pub fn down(&mut self) -> Result<()> {
        let link = resolve(&self.control, &mut self.link, &self.name)?;
        self.control.set_down(link)
    }

    /// Allocates the TUN device under the stored name.
    ///
    /// The device carries raw IP packets without packet information and is
    /// opened in blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [Error::AlreadyOpen] if the device is already open, without
    /// allocating anything. Kernel failures are returned untranslated, for
    /// example `EPERM` without `CAP_NET_ADMIN`.
    pub fn open(&mut self) -> Result<()> {
        if self.fd.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let (fd, name) = device::allocate(&self.name, TUN_FLAGS, false)?;

        if name != self.name {
            debug!("kernel assigned name {name} (requested {:?})", self.name);
            self.set_name(name);
        }

        info!("opened TUN interface {}", self.name);
        self.fd = Some(fd);
        Ok(())
    }

    /// Closes the TUN device.
    ///
    /// Closing resets the handle: it reports not open, can be opened again,
    /// and the cached link is dropped. Closing a handle that is not open does
    /// nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(fd) = self.fd.take() else {
            return Ok(());
        };
        self.link = None;

        let fd = fd.into_raw_fd();
        if unsafe { libc::close(fd) } == -1 {
            return Err(Error::Close(io::Error::last_os_error()));
        }

        info!("closed TUN interface {}", self.name);
        Ok(())
    }

    /// Sets or clears non-blocking mode on the open device.
    ///
    /// This changes the behavior of [Tun::recv] and [Tun::send].
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let fd = self.fd.as_ref().ok_or(Error::NotOpen)?;
        device::set_nonblocking(fd, nonblocking).map_err(Error::NonBlocking)
    }

    /// Receives one IP packet from the TUN device.
    ///
    /// By default, this call blocks until a packet is available. The caller
    /// must provide a buffer at least as large as the MTU.
    ///
    /// # Errors
    ///
    /// Returns the OS error unmodified; `EBADF` if the device is not open.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut fd = self.file()?;
        fd.read(buf)
    }

    /// Sends one IP packet to the TUN device.
    ///
    /// The packet must be a complete IP packet no larger than the MTU. The
    /// kernel may silently drop packets it considers invalid.
    ///
    /// # Errors
    ///
    /// Returns the OS error unmodified; `EBADF` if the device is not open.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut fd = self.file()?;
        fd.write(buf)
    }

    fn file(&self) -> io::Result<&File> {
        self.fd
            .as_ref()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    pub(crate) fn assign_cidr(&mut self, ip: IpAddr, network: IpNet) -> Result<()> {
        let addr = prefix(Some(ip), Some(network))?;

        self.ip = Some(ip);
        self.network = Some(network);
        self.assign(addr)
    }

    fn assign(&mut self, addr: IpNet) -> Result<()> {
        let link = resolve(&self.control, &mut self.link, &self.name)?;
        self.control.add_addr(link, addr)?;
        self.control.set_up(link)
    }
}

impl<C: LinkControl> Read for Tun<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<C: LinkControl> Write for Tun<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Returns the cached link, resolving it by name first if needed.
fn resolve<'a, C: LinkControl>(
    control: &C,
    cache: &'a mut Option<Link>,
    name: &str,
) -> Result<&'a Link> {
    let link = match cache.take() {
        Some(link) => link,
        None => control.link_by_name(name)?,
    };

    Ok(cache.insert(link))
}

/// Combines the address with the prefix length of the subnet.
fn prefix(ip: Option<IpAddr>, network: Option<IpNet>) -> Result<IpNet> {
    let ip = ip.ok_or(Error::MissingAddress)?;
    let prefix_len = network.ok_or(Error::MissingNetwork)?.prefix_len();

    IpNet::new(ip, prefix_len).map_err(|_| Error::InvalidPrefix { ip, prefix_len })
}

/// Splits `cidr` into the address and the network it belongs to.
pub(crate) fn parse_cidr(cidr: &str) -> Result<(IpAddr, IpNet)> {
    let net: IpNet = cidr.parse().map_err(|source| Error::InvalidCidr {
        input: cidr.to_string(),
        source,
    })?;

    Ok((net.addr(), net.trunc()))
}
