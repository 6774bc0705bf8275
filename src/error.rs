//! Error types for TUN device allocation, namespace switching and link
//! configuration.

use std::net::IpAddr;
use std::{error, io, result};

use ipnet::IpNet;
use thiserror::Error;

use crate::net::LinkState;

/// A convenience wrapper around `Result` for [crate::Error].
pub type Result<T> = result::Result<T, Error>;

/// Represents errors that can occur while creating or configuring a TUN
/// interface.
///
/// Errors originating from the kernel carry the untranslated `errno` as their
/// source, see [Error::raw_os_error].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The input could not be parsed as an address with a prefix length.
    #[error("invalid CIDR address `{input}`: {source}")]
    InvalidCidr {
        /// The rejected input.
        input: String,
        /// The parse failure.
        source: ipnet::AddrParseError,
    },
    /// The TUN device was opened twice without being closed.
    #[error("TUN device is already open")]
    AlreadyOpen,
    /// The operation requires an open TUN device.
    #[error("TUN device is not open")]
    NotOpen,
    /// The TUN clone device could not be opened.
    #[error("failed to open {path}: {source}")]
    DeviceOpen {
        /// Path of the clone device.
        path: &'static str,
        /// The OS error.
        source: io::Error,
    },
    /// The `TUNSETIFF` request was rejected by the kernel.
    #[error("failed to bind interface `{name}` to TUN file handle: {source}")]
    Ioctl {
        /// The requested interface name.
        name: String,
        /// The OS error.
        source: io::Error,
    },
    /// The blocking mode of the TUN file handle could not be changed.
    #[error("failed to set blocking mode of TUN file handle: {0}")]
    NonBlocking(#[source] io::Error),
    /// Closing the TUN file handle failed.
    #[error("failed to close TUN file handle: {0}")]
    Close(#[source] io::Error),
    /// A network namespace could not be found or opened.
    #[error("failed to resolve network namespace `{name}`: {source}")]
    NamespaceResolve {
        /// The namespace name or path.
        name: String,
        /// The OS error.
        source: io::Error,
    },
    /// The calling thread could not be moved into a network namespace.
    #[error("failed to switch network namespace: {0}")]
    NamespaceSwitch(#[source] io::Error),
    /// The socket used to configure links could not be created.
    #[error("failed to create link control socket: {0}")]
    Control(#[source] io::Error),
    /// No interface with the given name exists in the current namespace.
    #[error("no such interface `{name}`: {source}")]
    LinkNotFound {
        /// The interface name.
        name: String,
        /// The OS error.
        source: io::Error,
    },
    /// An address could not be assigned to the interface.
    #[error("failed to assign {addr} to `{name}`: {source}")]
    AddressApply {
        /// The interface name.
        name: String,
        /// The address and prefix length.
        addr: IpNet,
        /// The OS error.
        source: io::Error,
    },
    /// The MTU of the interface could not be changed.
    #[error("failed to set MTU of `{name}` to {mtu}: {source}")]
    MtuApply {
        /// The interface name.
        name: String,
        /// The requested MTU.
        mtu: u32,
        /// The OS error.
        source: io::Error,
    },
    /// The interface could not be brought up or down.
    #[error("failed to bring `{name}` {state}: {source}")]
    LinkState {
        /// The interface name.
        name: String,
        /// The requested administrative state.
        state: LinkState,
        /// The OS error.
        source: io::Error,
    },
    /// An address must be configured before the subnet can be applied.
    #[error("no IP address configured for interface")]
    MissingAddress,
    /// A subnet must be configured before the address can be applied.
    #[error("no subnet configured for interface")]
    MissingNetwork,
    /// The prefix length is too long for the address family of the address.
    #[error("invalid prefix length /{prefix_len} for address {ip}")]
    InvalidPrefix {
        /// The address.
        ip: IpAddr,
        /// The rejected prefix length.
        prefix_len: u8,
    },
}

impl Error {
    /// Returns the OS error code underlying this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        error::Error::source(self)?
            .downcast_ref::<io::Error>()?
            .raw_os_error()
    }
}
