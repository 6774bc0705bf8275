//! Network namespace switching and link configuration for the interfaces
//! created by [crate::tun_tap].

pub mod ioctl;
pub mod link;
pub mod netns;

#[cfg(test)]
pub(crate) mod mock;

pub use ioctl::IoctlControl;
pub use link::{Link, LinkControl, LinkState};
pub use netns::{NetNs, NetNsGuard};
