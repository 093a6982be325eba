//! Container handles.
//!
//! A [`Container`] is a cheap, cloneable handle naming one container on a
//! [`Host`]. Only the cached address is mutable and clones share it, so a
//! readiness predicate evaluated on a clone fills the caller's cache too.

use std::ffi::OsString;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::error::ContainerError;
use crate::exec::CommandRunner;
use crate::fsutil;
use crate::host::Host;
use crate::lifecycle::{CreateOptions, LifecycleVerb};
use crate::poll::{Poller, WaitOutcome};
use crate::remote::RemoteTarget;
use crate::resolver;

/// State reported by `lxc-info` for a running container.
pub const RUNNING_STATE: &str = "RUNNING";

/// State reported by `lxc-info` for a stopped container.
pub const STOPPED_STATE: &str = "STOPPED";

/// Explicit description of a container handle.
///
/// Unset fields fall back to the host defaults. `flags` are rendered as
/// `--key=value` template options whenever the container is created.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContainerSpec {
    /// Container name, unique on the host.
    pub name: String,
    /// Remote login; host default when `None`.
    pub username: Option<String>,
    /// Private key for remote access; host default when `None`.
    pub ssh_key_path: Option<Utf8PathBuf>,
    /// Known address, skipping the lease lookup.
    pub address: Option<IpAddr>,
    /// Template options applied on [`Container::create`].
    pub flags: CreateOptions,
}

impl ContainerSpec {
    /// Describes the container called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the remote login.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the private key path.
    #[must_use]
    pub fn ssh_key_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.ssh_key_path = Some(path.into());
        self
    }

    /// Seeds the address cache.
    #[must_use]
    pub const fn address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Adds a template option.
    #[must_use]
    pub fn flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags = self.flags.flag(key, value);
        self
    }
}

/// Built-in readiness conditions for [`Container::wait_until`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Readiness {
    /// `lxc-info` reports `RUNNING`.
    Running,
    /// `lxc-info` reports `STOPPED`.
    Stopped,
    /// A lease exists for the container.
    HasAddress,
    /// `ssh <address> true` succeeds.
    Reachable,
    /// The container directory no longer exists.
    Removed,
}

impl Readiness {
    /// Condition name as accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::HasAddress => "has-address",
            Self::Reachable => "reachable",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a readiness condition name is not recognised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown readiness condition: {0} (expected running, stopped, has-address, reachable or removed)")]
pub struct UnknownReadiness(pub String);

impl FromStr for Readiness {
    type Err = UnknownReadiness;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "has-address" | "address" => Ok(Self::HasAddress),
            "reachable" | "sshable" => Ok(Self::Reachable),
            "removed" | "gone" => Ok(Self::Removed),
            _ => Err(UnknownReadiness(value.to_owned())),
        }
    }
}

/// Handle to one container on a host.
pub struct Container<R: CommandRunner> {
    host: Arc<Host<R>>,
    name: String,
    username: String,
    ssh_key_path: Option<Utf8PathBuf>,
    parent: Option<String>,
    flags: CreateOptions,
    address: Arc<Mutex<Option<IpAddr>>>,
}

impl<R: CommandRunner> Clone for Container<R> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            name: self.name.clone(),
            username: self.username.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            parent: self.parent.clone(),
            flags: self.flags.clone(),
            address: Arc::clone(&self.address),
        }
    }
}

impl<R: CommandRunner> fmt::Debug for Container<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("ssh_key_path", &self.ssh_key_path)
            .field("parent", &self.parent)
            .field("address", &*self.cache())
            .finish_non_exhaustive()
    }
}

macro_rules! lifecycle_wrappers {
    ($($(#[$doc:meta])* $method:ident => $verb:ident;)+) => {
        $(
            $(#[$doc])*
            ///
            /// # Errors
            ///
            /// Propagates executor errors.
            pub fn $method(&self, args: &[OsString]) -> Result<String, ContainerError> {
                self.invoke(LifecycleVerb::$verb, args)
            }
        )+
    };
}

impl<R: CommandRunner> Container<R> {
    pub(crate) fn from_parts(
        host: Arc<Host<R>>,
        spec: ContainerSpec,
        default_username: &str,
        default_identity: Option<&Utf8PathBuf>,
    ) -> Self {
        let ContainerSpec {
            name,
            username,
            ssh_key_path,
            address,
            flags,
        } = spec;
        Self {
            host,
            name,
            username: username.unwrap_or_else(|| default_username.to_owned()),
            ssh_key_path: ssh_key_path.or_else(|| default_identity.cloned()),
            parent: None,
            flags,
            address: Arc::new(Mutex::new(address)),
        }
    }

    /// New handle for an ephemeral clone of this container.
    pub(crate) fn ephemeral_child(&self, name: String) -> Self {
        Self {
            host: Arc::clone(&self.host),
            name,
            username: self.username.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            parent: Some(self.name.clone()),
            flags: CreateOptions::default(),
            address: Arc::new(Mutex::new(None)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Option<IpAddr>> {
        self.address.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote login.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Private key used for remote access, if any.
    #[must_use]
    pub fn ssh_key_path(&self) -> Option<&Utf8Path> {
        self.ssh_key_path.as_deref()
    }

    /// Name of the container this one was cloned from, for ephemeral clones.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Host the container lives on.
    #[must_use]
    pub fn host(&self) -> &Host<R> {
        &self.host
    }

    /// Lifecycle state reported by `lxc-info -s` (`RUNNING`, `STOPPED`, ...).
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn state(&self) -> Result<String, ContainerError> {
        resolver::resolve_state(self.host.executor(), &self.name)
    }

    /// Whether the container is running.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn is_running(&self) -> Result<bool, ContainerError> {
        Ok(self.state()? == RUNNING_STATE)
    }

    /// Cached address, resolved from the lease file on first use.
    ///
    /// A miss is not cached, so later calls retry the lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] when the lease file cannot be read.
    pub fn address(&self) -> Result<Option<IpAddr>, ContainerError> {
        let mut cache = self.cache();
        if cache.is_none() {
            *cache = self.host.leases().resolve_address(&self.name)?;
        }
        Ok(*cache)
    }

    /// Replaces the cached address.
    pub fn set_address(&self, address: IpAddr) {
        *self.cache() = Some(address);
    }

    /// Forgets the cached address so the next lookup hits the lease file.
    pub fn clear_address(&self) {
        *self.cache() = None;
    }

    /// Runs `lxc-<verb> -n <name> <args...>`.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn invoke(&self, verb: LifecycleVerb, args: &[OsString]) -> Result<String, ContainerError> {
        self.host
            .executor()
            .execute(&verb.program(), &verb.args(&self.name, args))
    }

    lifecycle_wrappers! {
        /// Runs `lxc-start`.
        start => Start;
        /// Runs `lxc-stop`.
        stop => Stop;
        /// Runs `lxc-shutdown`.
        shutdown => Shutdown;
        /// Runs `lxc-destroy`.
        destroy => Destroy;
        /// Runs `lxc-execute`.
        execute => Execute;
        /// Runs `lxc-kill`.
        kill => Kill;
        /// Runs `lxc-wait`.
        wait => Wait;
        /// Runs `lxc-cgroup`.
        cgroup => Cgroup;
        /// Runs `lxc-ps`.
        ps => Ps;
        /// Runs `lxc-info`.
        info => Info;
        /// Runs `lxc-freeze`.
        freeze => Freeze;
        /// Runs `lxc-unfreeze`.
        unfreeze => Unfreeze;
        /// Runs `lxc-netstat`.
        netstat => Netstat;
    }

    /// Creates the container with `lxc-create`.
    ///
    /// `options` are layered over the handle's own flags. When the handle
    /// has a key path and no `auth-key` was given, `<key>.pub` is authorised.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn create(&self, options: CreateOptions) -> Result<String, ContainerError> {
        let mut merged = self.flags.clone().merged(options);
        if merged.auth_key.is_none()
            && let Some(ref key) = self.ssh_key_path
        {
            merged.auth_key = Some(format!("{key}.pub"));
        }
        self.host
            .executor()
            .execute("lxc-create", &merged.create_args(&self.name))
    }

    /// Creates the container as a copy of `source` with `lxc-clone`.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn clone_from(&self, source: &str, args: &[OsString]) -> Result<String, ContainerError> {
        let mut clone_args = vec![
            OsString::from("-n"),
            OsString::from(&self.name),
            OsString::from("-o"),
            OsString::from(source),
        ];
        clone_args.extend_from_slice(args);
        self.host.executor().execute("lxc-clone", &clone_args)
    }

    /// Path inside the container's root filesystem on the host.
    #[must_use]
    pub fn dir(&self, subpath: Option<&str>) -> Utf8PathBuf {
        let rootfs = self.host.container_root().join(&self.name).join("rootfs");
        match subpath {
            Some(sub) => rootfs.join(sub.trim_start_matches('/')),
            None => rootfs,
        }
    }

    fn remote_target(&self) -> Result<RemoteTarget, ContainerError> {
        let address = self
            .address()?
            .ok_or_else(|| ContainerError::AddressUnavailable {
                name: self.name.clone(),
            })?;
        Ok(RemoteTarget::new(&self.username, address).with_identity(self.ssh_key_path.clone()))
    }

    /// Runs `command` over `ssh` and returns its combined output.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::AddressUnavailable`] before invoking
    /// anything when no address is known, and propagates executor errors.
    pub fn ssh(&self, command: &str) -> Result<String, ContainerError> {
        let target = self.remote_target()?;
        self.host
            .remote()
            .ssh(self.host.executor(), &target, command)
    }

    /// Whether `ssh <address> true` succeeds.
    #[must_use]
    pub fn is_sshable(&self) -> bool {
        match self.ssh("true") {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(name = %self.name, %err, "ssh probe failed");
                false
            }
        }
    }

    /// Uploads `local` to `remote` with `scp`.
    ///
    /// # Errors
    ///
    /// As for [`Self::ssh`].
    pub fn copy_to(&self, local: &Utf8Path, remote: &Utf8Path) -> Result<String, ContainerError> {
        let target = self.remote_target()?;
        self.host
            .remote()
            .upload(self.host.executor(), &target, local, remote)
    }

    /// Downloads `remote` to `local` with `scp`.
    ///
    /// # Errors
    ///
    /// As for [`Self::ssh`].
    pub fn copy_from(&self, remote: &Utf8Path, local: &Utf8Path) -> Result<String, ContainerError> {
        let target = self.remote_target()?;
        self.host
            .remote()
            .download(self.host.executor(), &target, remote, local)
    }

    /// Evaluates `condition` once.
    ///
    /// Failures (a failing `lxc-info`, an unreadable lease file) count as
    /// "not yet".
    #[must_use]
    pub fn satisfies(&self, condition: Readiness) -> bool {
        let verdict = match condition {
            Readiness::Running => self.state().map(|state| state == RUNNING_STATE),
            Readiness::Stopped => self.state().map(|state| state == STOPPED_STATE),
            Readiness::HasAddress => self.address().map(|address| address.is_some()),
            Readiness::Reachable => Ok(self.is_sshable()),
            Readiness::Removed => {
                let root = self.host.container_root().join(&self.name);
                fsutil::path_exists(&root)
                    .map(|exists| !exists)
                    .map_err(|err| ContainerError::Io {
                        path: root,
                        message: err.to_string(),
                    })
            }
        };
        verdict.unwrap_or_else(|err| {
            tracing::debug!(name = %self.name, %condition, %err, "readiness check failed");
            false
        })
    }
}

impl<R: CommandRunner + 'static> Container<R> {
    /// Polls `predicate` against a clone of this handle.
    pub fn wait_for<F>(&self, poller: Poller, mut predicate: F) -> WaitOutcome
    where
        F: FnMut(&Self) -> bool + Send + 'static,
    {
        let probe = self.clone();
        poller.wait_for(move || predicate(&probe))
    }

    /// Polls a built-in readiness condition.
    pub fn wait_until(&self, poller: Poller, condition: Readiness) -> WaitOutcome {
        let outcome = self.wait_for(poller, move |container| container.satisfies(condition));
        if outcome.is_ready() {
            tracing::info!(name = %self.name, %condition, "container ready");
        }
        outcome
    }
}
