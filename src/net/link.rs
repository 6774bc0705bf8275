//! Kernel links and the operations used to configure them.

use std::fmt;

use ipnet::IpNet;

use crate::Result;

/// A resolved kernel link: the interface index together with the name it was
/// resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    index: u32,
    name: String,
}

impl Link {
    /// Creates a link handle.
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Returns the interface index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the interface name the link was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Administrative state of a link.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// The link is administratively up.
    Up,
    /// The link is administratively down.
    Down,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => f.write_str("up"),
            LinkState::Down => f.write_str("down"),
        }
    }
}

/// Link configuration operations against the kernel.
///
/// A [crate::Tun] only ever resolves its own interface by name and then
/// applies addresses, MTU and administrative state to the resolved [Link].
pub trait LinkControl {
    /// Resolves the link named `name` in the namespace this control operates
    /// in.
    ///
    /// # Errors
    ///
    /// Returns [crate::Error::LinkNotFound] if no such interface exists.
    fn link_by_name(&self, name: &str) -> Result<Link>;

    /// Assigns `addr` (address and prefix length) to `link`.
    ///
    /// Whether an existing address of the same family is replaced or kept is
    /// up to the implementation.
    fn add_addr(&self, link: &Link, addr: IpNet) -> Result<()>;

    /// Sets the MTU of `link`.
    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<()>;

    /// Brings `link` administratively up.
    fn set_up(&self, link: &Link) -> Result<()>;

    /// Brings `link` administratively down.
    fn set_down(&self, link: &Link) -> Result<()>;
}
