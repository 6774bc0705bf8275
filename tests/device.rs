//! Tests against real TUN devices. They need `CAP_NET_ADMIN` and are ignored
//! by default; run them with `cargo test -- --ignored` as root.

use std::net::{IpAddr, Ipv4Addr};
use std::{io, mem, ptr};

use nstun::{Error, LinkControl, Tun, TunConfig};

/// Issues an `SIOCGIF*` request for `name` and returns the filled request.
fn query(name: &str, request: libc::c_ulong) -> io::Result<libc::ifreq> {
    let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.bytes()) {
        *dst = src as libc::c_char;
    }

    let sock = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if sock == -1 {
        return Err(io::Error::last_os_error());
    }

    let res = unsafe { libc::ioctl(sock, request as _, &raw mut ifr) };
    let err = io::Error::last_os_error();
    unsafe { libc::close(sock) };

    if res == -1 {
        return Err(err);
    }
    Ok(ifr)
}

fn ipv4(ifr: &libc::ifreq) -> Ipv4Addr {
    let addr: libc::sockaddr_in =
        unsafe { ptr::read_unaligned((&raw const ifr.ifr_ifru.ifru_addr).cast()) };
    Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr))
}

#[test]
#[ignore = "requires CAP_NET_ADMIN"]
fn create_configure_and_close() {
    let mut tun = TunConfig::new("nstun%d")
        .with_address("10.213.0.2/24")
        .with_mtu(1400)
        .build()
        .unwrap();

    assert!(tun.is_open());
    assert!(tun.name().starts_with("nstun"));
    assert_eq!(tun.ip(), Some("10.213.0.2".parse::<IpAddr>().unwrap()));
    assert_eq!(tun.mtu(), 1400);

    let control = nstun::IoctlControl::new().unwrap();
    let link = control.link_by_name(tun.name()).unwrap();
    assert!(link.index() > 0);

    let fd = tun.fd().unwrap();
    let status = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    assert_ne!(status, -1);
    assert_eq!(status & libc::O_NONBLOCK, 0);

    let ifr = query(tun.name(), libc::SIOCGIFFLAGS as _).unwrap();
    let flags = unsafe { ifr.ifr_ifru.ifru_flags };
    assert_ne!(flags & libc::IFF_UP as libc::c_short, 0);

    let ifr = query(tun.name(), libc::SIOCGIFADDR as _).unwrap();
    assert_eq!(ipv4(&ifr), Ipv4Addr::new(10, 213, 0, 2));
    let ifr = query(tun.name(), libc::SIOCGIFNETMASK as _).unwrap();
    assert_eq!(ipv4(&ifr), Ipv4Addr::new(255, 255, 255, 0));

    let ifr = query(tun.name(), libc::SIOCGIFMTU as _).unwrap();
    assert_eq!(unsafe { ifr.ifr_ifru.ifru_mtu }, 1400);

    tun.down().unwrap();
    tun.up().unwrap();

    assert!(matches!(tun.open(), Err(Error::AlreadyOpen)));

    tun.close().unwrap();
    assert!(!tun.is_open());
    tun.close().unwrap();
}

#[test]
#[ignore = "requires CAP_NET_ADMIN"]
fn reopen_after_close() {
    let mut tun = Tun::new("nstun-reopen", None, None).unwrap();
    tun.close().unwrap();

    tun.open().unwrap();
    assert!(tun.is_open());
    tun.set_nonblocking(true).unwrap();

    // The interface is down, so nothing can be queued for reading.

    let mut buf = [0u8; 1500];
    let err = tun.recv(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
}
