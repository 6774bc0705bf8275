//! Network namespace handles and scoped namespace switching.
//!
//! The network namespace is an attribute of the OS thread, not of the
//! process. Work that must happen inside another namespace is therefore run on
//! a dedicated thread that exists only for the duration of that work: the
//! calling thread never changes namespace, and a thread whose namespace could
//! not be restored is never reused.

use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::{panic, thread};

use nix::sched::{CloneFlags, setns};
use tracing::{debug, error};

use crate::{Error, Result};

/// Directory holding the bind mounts of named network namespaces, as created
/// by `ip netns add`.
pub const NETNS_RUN_DIR: &str = "/run/netns";

/// Namespace file of the calling thread.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// An open handle to a network namespace.
#[derive(Debug)]
pub struct NetNs {
    file: File,
    name: String,
}

impl NetNs {
    /// Opens the network namespace of the calling thread.
    pub fn current() -> Result<Self> {
        Self::from_path(THREAD_NETNS)
    }

    /// Opens the named network namespace under [NETNS_RUN_DIR].
    ///
    /// # Errors
    ///
    /// Returns [Error::NamespaceResolve] if the namespace does not exist or
    /// cannot be opened.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Error::NamespaceResolve {
                name: name.to_string(),
                source: io::Error::from_raw_os_error(libc::EINVAL),
            });
        }

        let mut ns = Self::from_path(Path::new(NETNS_RUN_DIR).join(name))?;
        ns.name = name.to_string();
        Ok(ns)
    }

    /// Opens the network namespace referred to by `path`, for example
    /// `/proc/<pid>/ns/net`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::NamespaceResolve {
            name: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            file,
            name: path.display().to_string(),
        })
    }

    /// Returns the name (or path) the namespace was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the inode identifying the namespace. Two handles refer to the
    /// same namespace iff their inodes are equal.
    pub fn inode(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.ino())
    }

    /// Moves the calling thread into this namespace.
    ///
    /// The returned guard moves the thread back into its previous namespace
    /// when restored or dropped.
    pub fn enter(&self) -> Result<NetNsGuard> {
        let origin = Self::current()?;
        self.set()?;
        debug!("entered network namespace {}", self.name);

        Ok(NetNsGuard {
            origin,
            restored: false,
        })
    }

    fn set(&self) -> Result<()> {
        setns(&self.file, CloneFlags::CLONE_NEWNET)
            .map_err(|errno| Error::NamespaceSwitch(io::Error::from(errno)))
    }
}

/// Restores the namespace a thread was in before [NetNs::enter].
#[derive(Debug)]
pub struct NetNsGuard {
    origin: NetNs,
    restored: bool,
}

impl NetNsGuard {
    /// Moves the thread back into its original namespace.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.origin.set()
    }
}

impl Drop for NetNsGuard {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(err) = self.origin.set() {
                error!("failed to restore network namespace: {err}");
            }
        }
    }
}

/// Runs `work` inside `target`, or directly on the calling thread when no
/// namespace is given.
///
/// With a target, `work` runs on a scoped thread that enters the namespace,
/// runs to completion and restores the namespace before it is joined. A
/// failure to restore is logged and not returned: the thread exits right after
/// and the caller's namespace is unaffected either way.
///
/// # Errors
///
/// Returns [Error::NamespaceSwitch] if the namespace cannot be entered, in
/// which case `work` is not run, or whatever error `work` returns.
pub fn run_in<T, F>(target: Option<&NetNs>, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    let Some(target) = target else {
        return work();
    };

    let joined = thread::scope(|s| {
        s.spawn(move || {
            let guard = target.enter()?;
            let res = work();

            if let Err(err) = guard.restore() {
                error!(
                    "failed to leave network namespace {}: {err}",
                    target.name()
                );
            }

            res
        })
        .join()
    });

    joined.unwrap_or_else(|payload| panic::resume_unwind(payload))
}
