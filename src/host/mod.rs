//! Host context shared by every container handle.

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::{DEFAULT_CONTAINER_ROOT, DEFAULT_LOG_DIR, DEFAULT_USERNAME, HostConfig};
use crate::container::{Container, ContainerSpec};
use crate::ephemeral::UnionMount;
use crate::error::ContainerError;
use crate::exec::{CommandRunner, DEFAULT_SUDO_BIN, Executor, ProcessCommandRunner};
use crate::poll::Poller;
use crate::remote::RemoteTools;
use crate::resolver::LeaseSource;

/// Collapses `lxc-ls -1` output into distinct names, keeping first-seen
/// order and dropping blank lines.
#[must_use]
pub fn parse_container_list(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !names.iter().any(|seen| seen == name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Everything container handles need to know about the machine they run on.
///
/// Build one, wrap it in an [`Arc`] and hand out handles with
/// [`Host::container`] or [`Host::container_from`].
#[derive(Debug)]
pub struct Host<R: CommandRunner> {
    executor: Executor<R>,
    container_root: Utf8PathBuf,
    leases: LeaseSource,
    remote: RemoteTools,
    log_dir: Utf8PathBuf,
    union_mount: UnionMount,
    poller: Poller,
    username: String,
    identity: Option<Utf8PathBuf>,
}

impl Host<ProcessCommandRunner> {
    /// Builds a host that runs real processes.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidConfig`] when `config` fails
    /// validation.
    pub fn with_process_runner(config: &HostConfig) -> Result<Self, ContainerError> {
        Self::from_config(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> Host<R> {
    /// Creates a host with default paths around `executor`.
    #[must_use]
    pub fn new(executor: Executor<R>) -> Self {
        Self {
            executor,
            container_root: Utf8PathBuf::from(DEFAULT_CONTAINER_ROOT),
            leases: LeaseSource::default(),
            remote: RemoteTools::default(),
            log_dir: Utf8PathBuf::from(DEFAULT_LOG_DIR),
            union_mount: UnionMount::default(),
            poller: Poller::default(),
            username: String::from(DEFAULT_USERNAME),
            identity: None,
        }
    }

    /// Creates a host from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidConfig`] when `config` fails
    /// validation.
    pub fn from_config(config: &HostConfig, runner: R) -> Result<Self, ContainerError> {
        config.validate()?;
        let executor = Executor::with_elevation(runner, config.elevation_mode()?, &config.sudo_bin);
        Ok(Self {
            executor,
            container_root: Utf8PathBuf::from(&config.container_root),
            leases: config.lease_source(),
            remote: RemoteTools::new(&config.ssh_bin, &config.scp_bin),
            log_dir: Utf8PathBuf::from(&config.log_dir),
            union_mount: config.union_mount(),
            poller: config.poller(),
            username: config.username.clone(),
            identity: config.identity_file(),
        })
    }

    /// Creates a host around `runner`, elevating with `sudo` when not root.
    #[must_use]
    pub fn detect(runner: R) -> Self {
        Self::new(Executor::detect(runner, DEFAULT_SUDO_BIN))
    }

    /// Overrides the directory holding containers.
    #[must_use]
    pub fn with_container_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.container_root = root.into();
        self
    }

    /// Overrides the lease files consulted for addresses.
    #[must_use]
    pub fn with_leases(mut self, leases: LeaseSource) -> Self {
        self.leases = leases;
        self
    }

    /// Overrides the `ssh` and `scp` binaries.
    #[must_use]
    pub fn with_remote_tools(mut self, remote: RemoteTools) -> Self {
        self.remote = remote;
        self
    }

    /// Overrides the directory for detached launch logs.
    #[must_use]
    pub fn with_log_dir(mut self, log_dir: impl Into<Utf8PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Overrides the union mount used for ephemeral clones.
    #[must_use]
    pub fn with_union_mount(mut self, union_mount: UnionMount) -> Self {
        self.union_mount = union_mount;
        self
    }

    /// Overrides the default poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Overrides the default login for new handles.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Overrides the default private key for new handles.
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Utf8PathBuf>) -> Self {
        self.identity = identity;
        self
    }

    /// Executor every invocation goes through.
    #[must_use]
    pub const fn executor(&self) -> &Executor<R> {
        &self.executor
    }

    /// Directory holding containers.
    #[must_use]
    pub fn container_root(&self) -> &Utf8Path {
        &self.container_root
    }

    /// Lease files consulted for addresses.
    #[must_use]
    pub const fn leases(&self) -> &LeaseSource {
        &self.leases
    }

    /// `ssh` and `scp` binaries.
    #[must_use]
    pub const fn remote(&self) -> &RemoteTools {
        &self.remote
    }

    /// Directory for detached launch logs.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Union mount used for ephemeral clones.
    #[must_use]
    pub const fn union_mount(&self) -> &UnionMount {
        &self.union_mount
    }

    /// Default poller for readiness waits.
    #[must_use]
    pub const fn poller(&self) -> Poller {
        self.poller
    }

    /// Handle for the container called `name`, using the host's default
    /// login and key.
    #[must_use]
    pub fn container(self: &Arc<Self>, name: impl Into<String>) -> Container<R> {
        self.container_from(ContainerSpec::new(name))
    }

    /// Handle described by `spec`; unset fields fall back to host defaults.
    #[must_use]
    pub fn container_from(self: &Arc<Self>, spec: ContainerSpec) -> Container<R> {
        Container::from_parts(
            Arc::clone(self),
            spec,
            &self.username,
            self.identity.as_ref(),
        )
    }

    /// One handle per container known to `lxc-ls`, duplicates collapsed.
    ///
    /// # Errors
    ///
    /// Propagates executor errors from `lxc-ls`.
    pub fn all(self: &Arc<Self>) -> Result<Vec<Container<R>>, ContainerError> {
        let output = self.executor.execute("lxc-ls", &[OsString::from("-1")])?;
        Ok(parse_container_list(&output)
            .into_iter()
            .map(|name| self.container(name))
            .collect())
    }
}

#[cfg(test)]
mod tests;
