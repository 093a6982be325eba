//! `ssh` and `scp` against a container's leased address.
//!
//! Containers are disposable and their host keys change on every clone, so
//! host-key verification is always disabled with [`HOST_KEY_BYPASS_OPTIONS`].
//! This trades man-in-the-middle protection for convenience and is only
//! appropriate on a trusted host bridge.

use std::ffi::OsString;
use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ContainerError;
use crate::exec::{CommandRunner, Executor};

/// Options passed to every `ssh` and `scp` invocation.
pub const HOST_KEY_BYPASS_OPTIONS: [&str; 4] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
];

/// Default `ssh` binary.
pub const DEFAULT_SSH_BIN: &str = "ssh";

/// Default `scp` binary.
pub const DEFAULT_SCP_BIN: &str = "scp";

/// Login details for one container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteTarget {
    user: String,
    address: IpAddr,
    identity: Option<Utf8PathBuf>,
}

impl RemoteTarget {
    /// Targets `user` at `address`.
    #[must_use]
    pub fn new(user: impl Into<String>, address: IpAddr) -> Self {
        Self {
            user: user.into(),
            address,
            identity: None,
        }
    }

    /// Authenticates with the given private key.
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Utf8PathBuf>) -> Self {
        self.identity = identity;
        self
    }

    /// Address the target resolves to.
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// `user@address`, as `ssh` expects it.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    /// `user@address:path`, as `scp` expects it. IPv6 addresses are
    /// bracketed so the path separator stays unambiguous.
    #[must_use]
    pub fn remote_path(&self, path: &Utf8Path) -> String {
        match self.address {
            IpAddr::V4(address) => format!("{}@{address}:{path}", self.user),
            IpAddr::V6(address) => format!("{}@[{address}]:{path}", self.user),
        }
    }

    fn common_options(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = HOST_KEY_BYPASS_OPTIONS
            .iter()
            .map(OsString::from)
            .collect();
        if let Some(ref identity) = self.identity {
            args.push(OsString::from("-i"));
            args.push(OsString::from(identity.as_str()));
        }
        args
    }

    /// Arguments for `ssh` running `command` on the target.
    #[must_use]
    pub fn ssh_args(&self, command: &str) -> Vec<OsString> {
        let mut args = self.common_options();
        args.push(OsString::from(self.destination()));
        args.push(OsString::from(command));
        args
    }

    /// Arguments for `scp` uploading `local` to `remote`.
    #[must_use]
    pub fn upload_args(&self, local: &Utf8Path, remote: &Utf8Path) -> Vec<OsString> {
        let mut args = self.common_options();
        args.push(OsString::from("-r"));
        args.push(OsString::from(local.as_str()));
        args.push(OsString::from(self.remote_path(remote)));
        args
    }

    /// Arguments for `scp` downloading `remote` to `local`.
    #[must_use]
    pub fn download_args(&self, remote: &Utf8Path, local: &Utf8Path) -> Vec<OsString> {
        let mut args = self.common_options();
        args.push(OsString::from("-r"));
        args.push(OsString::from(self.remote_path(remote)));
        args.push(OsString::from(local.as_str()));
        args
    }
}

/// The `ssh` and `scp` binaries used for remote access.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteTools {
    ssh_bin: String,
    scp_bin: String,
}

impl Default for RemoteTools {
    fn default() -> Self {
        Self::new(DEFAULT_SSH_BIN, DEFAULT_SCP_BIN)
    }
}

impl RemoteTools {
    /// Uses the given binaries.
    #[must_use]
    pub fn new(ssh_bin: impl Into<String>, scp_bin: impl Into<String>) -> Self {
        Self {
            ssh_bin: ssh_bin.into(),
            scp_bin: scp_bin.into(),
        }
    }

    /// Runs `command` on `target` and returns its combined output.
    ///
    /// # Errors
    ///
    /// Propagates executor errors, including a non-zero remote exit status
    /// as [`ContainerError::CommandFailed`].
    pub fn ssh<R: CommandRunner>(
        &self,
        executor: &Executor<R>,
        target: &RemoteTarget,
        command: &str,
    ) -> Result<String, ContainerError> {
        executor.execute(&self.ssh_bin, &target.ssh_args(command))
    }

    /// Copies `local` to `remote` on the target.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn upload<R: CommandRunner>(
        &self,
        executor: &Executor<R>,
        target: &RemoteTarget,
        local: &Utf8Path,
        remote: &Utf8Path,
    ) -> Result<String, ContainerError> {
        executor.execute(&self.scp_bin, &target.upload_args(local, remote))
    }

    /// Copies `remote` on the target to `local`.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn download<R: CommandRunner>(
        &self,
        executor: &Executor<R>,
        target: &RemoteTarget,
        remote: &Utf8Path,
        local: &Utf8Path,
    ) -> Result<String, ContainerError> {
        executor.execute(&self.scp_bin, &target.download_args(remote, local))
    }
}
