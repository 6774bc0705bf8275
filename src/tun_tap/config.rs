//! Construction of configured TUN interfaces.

use std::io;

use tracing::debug;

use super::tun::{Tun, parse_cidr};
use crate::net::{IoctlControl, LinkControl, NetNs, netns};
use crate::{Error, Result};

/// Configuration for a new TUN interface.
///
/// ```no_run
/// use nstun::TunConfig;
///
/// let tun = TunConfig::new("tun0")
///     .with_address("10.0.0.2/24")
///     .with_mtu(1400)
///     .build()?;
/// # Ok::<(), nstun::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunConfig {
    name: String,
    address: Option<String>,
    namespace: Option<String>,
    mtu: Option<u32>,
}

impl TunConfig {
    /// Creates a configuration for the interface `name`.
    ///
    /// An empty name, or a pattern such as `tun%d`, lets the kernel pick the
    /// final name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the address to assign, in CIDR notation.
    #[must_use]
    pub fn with_address(mut self, cidr: impl Into<String>) -> Self {
        self.address = Some(cidr.into());
        self
    }

    /// Sets the named network namespace to create the interface in.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the MTU to apply after the device is created.
    #[must_use]
    pub fn with_mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Returns the requested interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address to assign, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Returns the target network namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the MTU to apply, if any.
    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    /// Creates, opens and configures the interface, configuring links through
    /// `SIOC*` ioctls.
    ///
    /// # Errors
    ///
    /// See [TunConfig::build_with].
    pub fn build(self) -> Result<Tun> {
        self.build_with(IoctlControl::new)
    }

    /// Creates, opens and configures the interface, configuring links through
    /// the control returned by `make_control`.
    ///
    /// The steps run in this order: enter the namespace, create the control,
    /// open the device, apply the MTU, assign the address and bring the
    /// interface up, leave the namespace. The control is created inside the
    /// namespace so it keeps operating on it afterwards.
    ///
    /// # Errors
    ///
    /// A malformed address or an unknown namespace is reported before anything
    /// is allocated. A failure in a later step closes the device again.
    pub fn build_with<C, F>(self, make_control: F) -> Result<Tun<C>>
    where
        C: LinkControl + Send,
        F: FnOnce() -> io::Result<C> + Send,
    {
        let address = self.address.as_deref().map(parse_cidr).transpose()?;
        let target = self.namespace.as_deref().map(NetNs::from_name).transpose()?;

        let TunConfig { name, mtu, .. } = self;

        netns::run_in(target.as_ref(), move || {
            let control = make_control().map_err(Error::Control)?;

            let mut tun = Tun::with_control(name, control);
            tun.open()?;

            if let Some(mtu) = mtu {
                tun.set_mtu(mtu)?;
            }

            if let Some((ip, network)) = address {
                tun.assign_cidr(ip, network)?;
            }

            debug!("configured TUN interface {}", tun.name());
            Ok(tun)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock::MockControl;

    fn never_called() -> io::Result<MockControl> {
        panic!("control must not be created")
    }

    #[test]
    fn config_builder_valid() {
        let config = TunConfig::new("tun0")
            .with_address("10.0.0.2/24")
            .with_namespace("blue")
            .with_mtu(1400);

        assert_eq!(config.name(), "tun0");
        assert_eq!(config.address(), Some("10.0.0.2/24"));
        assert_eq!(config.namespace(), Some("blue"));
        assert_eq!(config.mtu(), Some(1400));

        let config = TunConfig::new("tun0");
        assert_eq!(config.address(), None);
        assert_eq!(config.namespace(), None);
        assert_eq!(config.mtu(), None);
    }

    #[test]
    fn build_rejects_malformed_address_first() {
        let err = TunConfig::new("tun0")
            .with_address("10.0.0.300/24")
            .with_namespace("nstun-missing-namespace")
            .build_with(never_called)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCidr { .. }));
    }

    #[test]
    fn build_in_missing_namespace_allocates_nothing() {
        let before = NetNs::current().unwrap().inode().unwrap();

        let err = TunConfig::new("tun0")
            .with_address("10.0.0.2/24")
            .with_namespace("nstun-missing-namespace")
            .build_with(never_called)
            .unwrap_err();

        assert!(matches!(err, Error::NamespaceResolve { .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        assert_eq!(NetNs::current().unwrap().inode().unwrap(), before);
    }

    #[test]
    fn new_in_missing_namespace_fails() {
        let before = NetNs::current().unwrap().inode().unwrap();

        let err = Tun::new("tun0", None, Some("nstun-missing-namespace")).unwrap_err();

        assert!(matches!(err, Error::NamespaceResolve { .. }));
        assert_eq!(NetNs::current().unwrap().inode().unwrap(), before);
    }

    #[test]
    fn build_surfaces_control_failure() {
        let err = TunConfig::new("tun0")
            .build_with(|| Err::<MockControl, _>(io::Error::from_raw_os_error(libc::EMFILE)))
            .unwrap_err();

        assert!(matches!(err, Error::Control(_)));
        assert_eq!(err.raw_os_error(), Some(libc::EMFILE));
    }
}
