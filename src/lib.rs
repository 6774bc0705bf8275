//! Creation and configuration of Linux TUN interfaces.
//!
//! A [Tun] allocates a TUN device through `/dev/net/tun`, optionally inside a
//! named network namespace, assigns it an address and MTU and brings it up.
//! Raw IP packets are then exchanged through [Tun::recv] and [Tun::send].
//!
//! ```no_run
//! use nstun::Tun;
//!
//! let mut tun = Tun::new("tun0", Some("10.0.0.2/24"), None)?;
//! tun.set_mtu(1400)?;
//!
//! let mut buf = [0u8; 1500];
//! let nbytes = tun.recv(&mut buf)?;
//! # let _ = nbytes;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

#[cfg(not(target_os = "linux"))]
compile_error!(
    "This crate is only compatible with Linux systems that support TUN devices and network namespaces."
);

pub mod error;
pub mod net;
pub mod tun_tap;

pub use error::{Error, Result};
pub use net::{IoctlControl, Link, LinkControl, LinkState, NetNs};
pub use tun_tap::{Tun, TunConfig};
