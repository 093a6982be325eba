//! Host configuration loaded via `ortho-config`.
//!
//! [`HostConfig`] merges defaults, `linux-container.toml` (found through
//! `LXC_CONFIG_PATH`, a dotfile or the project directory) and `LXC_*`
//! environment variables. It describes the host side of container access:
//! where containers live, how to reach them and how long to wait for them.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::ephemeral::UnionMount;
use crate::error::ContainerError;
use crate::exec::Elevation;
use crate::poll::Poller;
use crate::resolver::LeaseSource;

/// Default directory holding one subdirectory per container.
pub const DEFAULT_CONTAINER_ROOT: &str = "/var/lib/lxc";

/// Default login used inside containers.
pub const DEFAULT_USERNAME: &str = "ubuntu";

/// Default directory for detached launch logs.
pub const DEFAULT_LOG_DIR: &str = "/tmp";

const APP_NAME: &str = "linux-container";

/// Host settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "LXC",
    discovery(
        app_name = "linux-container",
        env_var = "LXC_CONFIG_PATH",
        config_file_name = "linux-container.toml",
        dotfile_name = ".linux-container.toml",
        project_file_name = "linux-container.toml"
    )
)]
pub struct HostConfig {
    /// Directory holding container configurations and root filesystems.
    #[ortho_config(default = DEFAULT_CONTAINER_ROOT.to_owned())]
    pub container_root: String,
    /// Login used for `ssh`, `scp` and ephemeral clones unless a container
    /// overrides it.
    #[ortho_config(default = DEFAULT_USERNAME.to_owned())]
    pub username: String,
    /// Private key used for remote access. Supports tilde expansion
    /// (`~/.ssh/id_ed25519`). When unset, `ssh` falls back to its default
    /// keys. Validation rejects empty or whitespace-only values.
    pub ssh_identity_file: Option<String>,
    /// Lease file override. When unset, the bridge-specific dnsmasq lease
    /// file is tried before the generic one.
    pub lease_file: Option<String>,
    /// Union filesystem used by `lxc-start-ephemeral -U`.
    #[ortho_config(default = "overlayfs".to_owned())]
    pub union_mount: String,
    /// Directory receiving detached launch logs.
    #[ortho_config(default = DEFAULT_LOG_DIR.to_owned())]
    pub log_dir: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Elevation command prefixed when not running as root.
    #[ortho_config(default = "sudo".to_owned())]
    pub sudo_bin: String,
    /// When to prefix the elevation command: `auto` (only when not root),
    /// `always` or `never`.
    #[ortho_config(default = "auto".to_owned())]
    pub elevation: String,
    /// Seconds between two readiness or discovery checks.
    #[ortho_config(default = 1)]
    pub poll_interval_secs: u64,
    /// Overall readiness budget in seconds.
    #[ortho_config(default = 300)]
    pub wait_timeout_secs: u64,
}

/// Errors raised when loading the host configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("host configuration parsing failed: {0}")]
    Parse(String),
}

impl HostConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidConfig`] when a required field is
    /// empty or the poll interval is zero.
    pub fn validate(&self) -> Result<(), ContainerError> {
        Self::require_value(&self.container_root, "container_root")?;
        Self::require_value(&self.username, "username")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Self::require_optional_value(self.lease_file.as_deref(), "lease_file")?;
        Self::require_value(&self.union_mount, "union_mount")?;
        Self::require_value(&self.log_dir, "log_dir")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.scp_bin, "scp_bin")?;
        Self::require_value(&self.sudo_bin, "sudo_bin")?;
        self.elevation_mode()?;
        if self.poll_interval_secs == 0 {
            return Err(ContainerError::InvalidConfig {
                field: String::from("poll_interval_secs"),
            });
        }
        Ok(())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), ContainerError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(ContainerError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), ContainerError> {
        Self::require_optional_value(Some(value), field)
    }

    /// Loads configuration using defaults, configuration files, and
    /// environment variables, ignoring the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigLoadError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigLoadError::Parse(err.to_string()))
    }

    /// Parsed elevation mode.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidConfig`] for values other than
    /// `auto`, `always` and `never`.
    pub fn elevation_mode(&self) -> Result<Elevation, ContainerError> {
        self.elevation
            .parse()
            .map_err(|_| ContainerError::InvalidConfig {
                field: String::from("elevation"),
            })
    }

    /// Poller built from the interval and timeout settings.
    #[must_use]
    pub const fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.wait_timeout_secs),
            Duration::from_secs(self.poll_interval_secs),
        )
    }

    /// Identity file with a leading `~/` expanded.
    #[must_use]
    pub fn identity_file(&self) -> Option<Utf8PathBuf> {
        self.ssh_identity_file
            .as_deref()
            .map(|path| Utf8PathBuf::from(expand_tilde(path)))
    }

    /// Lease files to consult for addresses.
    #[must_use]
    pub fn lease_source(&self) -> LeaseSource {
        self.lease_file
            .as_deref()
            .map_or_else(LeaseSource::default, LeaseSource::file)
    }

    /// Parsed union-mount strategy.
    #[must_use]
    pub fn union_mount(&self) -> UnionMount {
        match self.union_mount.parse() {
            Ok(mount) => mount,
            Err(never) => match never {},
        }
    }
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If `HOME` is not set the input is returned unchanged.
///
/// # Examples
///
/// ```
/// # use linux_container::config::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.ssh/id_ed25519"), format!("{home}/.ssh/id_ed25519"));
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}
