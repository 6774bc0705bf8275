//! In-memory [LinkControl] for exercising link configuration without
//! `CAP_NET_ADMIN`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;

use ipnet::IpNet;

use super::link::{Link, LinkControl, LinkState};
use crate::{Error, Result};

/// Recorded state of a simulated link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockLink {
    pub(crate) index: u32,
    pub(crate) addrs: Vec<IpNet>,
    pub(crate) mtu: u32,
    pub(crate) state: LinkState,
}

#[derive(Debug, Default)]
pub(crate) struct MockControl {
    links: RefCell<HashMap<String, MockLink>>,
    lookups: Cell<usize>,
    mutations: Cell<usize>,
}

impl MockControl {
    /// Creates a control knowing a single, down link named `name`.
    pub(crate) fn with_link(name: &str) -> Self {
        let control = Self::default();
        control.add_link(name);
        control
    }

    pub(crate) fn add_link(&self, name: &str) {
        let mut links = self.links.borrow_mut();
        let index = links.len() as u32 + 2;
        links.insert(
            name.to_string(),
            MockLink {
                index,
                addrs: Vec::new(),
                mtu: 1500,
                state: LinkState::Down,
            },
        );
    }

    pub(crate) fn remove_link(&self, name: &str) {
        self.links.borrow_mut().remove(name);
    }

    pub(crate) fn link(&self, name: &str) -> Option<MockLink> {
        self.links.borrow().get(name).cloned()
    }

    /// Number of name lookups performed so far.
    pub(crate) fn lookups(&self) -> usize {
        self.lookups.get()
    }

    /// Number of address, MTU and state changes performed so far.
    pub(crate) fn mutations(&self) -> usize {
        self.mutations.get()
    }

    fn update(&self, link: &Link, f: impl FnOnce(&mut MockLink)) -> io::Result<()> {
        self.mutations.set(self.mutations.get() + 1);

        let mut links = self.links.borrow_mut();
        match links.get_mut(link.name()) {
            Some(entry) if entry.index == link.index() => {
                f(entry);
                Ok(())
            }
            _ => Err(io::Error::from_raw_os_error(libc::ENODEV)),
        }
    }
}

impl LinkControl for MockControl {
    fn link_by_name(&self, name: &str) -> Result<Link> {
        self.lookups.set(self.lookups.get() + 1);

        match self.links.borrow().get(name) {
            Some(entry) => Ok(Link::new(entry.index, name)),
            None => Err(Error::LinkNotFound {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(libc::ENODEV),
            }),
        }
    }

    /// Like [IoctlControl](super::IoctlControl), an IPv4 address replaces the
    /// previous one while IPv6 addresses accumulate.
    fn add_addr(&self, link: &Link, addr: IpNet) -> Result<()> {
        self.update(link, |entry| {
            if let IpNet::V4(_) = addr {
                entry.addrs.retain(|a| matches!(a, IpNet::V6(_)));
            }
            entry.addrs.push(addr);
        })
            .map_err(|source| Error::AddressApply {
                name: link.name().to_string(),
                addr,
                source,
            })
    }

    fn set_mtu(&self, link: &Link, mtu: u32) -> Result<()> {
        self.update(link, |entry| entry.mtu = mtu)
            .map_err(|source| Error::MtuApply {
                name: link.name().to_string(),
                mtu,
                source,
            })
    }

    fn set_up(&self, link: &Link) -> Result<()> {
        self.update(link, |entry| entry.state = LinkState::Up)
            .map_err(|source| Error::LinkState {
                name: link.name().to_string(),
                state: LinkState::Up,
                source,
            })
    }

    fn set_down(&self, link: &Link) -> Result<()> {
        self.update(link, |entry| entry.state = LinkState::Down)
            .map_err(|source| Error::LinkState {
                name: link.name().to_string(),
                state: LinkState::Down,
                source,
            })
    }
}
