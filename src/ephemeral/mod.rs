//! Ephemeral clones via `lxc-start-ephemeral`.
//!
//! The tool prints the generated clone name only to its own output, so the
//! launch is detached into a log file and the log is re-read until a name
//! marker shows up. [`try_match`] is the pure matcher; the discovery loop
//! around it owns no state beyond the log handle.

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::container::Container;
use crate::error::ContainerError;
use crate::exec::{CommandRunner, LogHandle};
use crate::poll::{GUARD_GRACE, run_bounded};

/// Program that starts an ephemeral clone.
pub const START_EPHEMERAL_BIN: &str = "lxc-start-ephemeral";

#[expect(clippy::expect_used, reason = "marker patterns are literals")]
fn marker(pattern: &str) -> Regex {
    Regex::new(pattern).expect("discovery pattern compiles")
}

static RUNNING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| marker(r"(?m)^(?:.*\s)?(\S+) is running"));

static CONSOLE_MARKER: LazyLock<Regex> = LazyLock::new(|| marker(r"lxc-console -n (\S+)"));

/// Union filesystem layered over the source rootfs.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum UnionMount {
    /// `overlayfs`
    #[default]
    Overlayfs,
    /// `aufs`
    Aufs,
    /// `btrfs` snapshots.
    Btrfs,
    /// Any other value understood by the installed tool.
    Other(String),
}

impl UnionMount {
    /// Value passed to `-U`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Overlayfs => "overlayfs",
            Self::Aufs => "aufs",
            Self::Btrfs => "btrfs",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for UnionMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnionMount {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim() {
            "overlayfs" => Self::Overlayfs,
            "aufs" => Self::Aufs,
            "btrfs" => Self::Btrfs,
            other => Self::Other(other.to_owned()),
        })
    }
}

/// Result of a bounded provisioning attempt.
#[derive(Debug)]
#[must_use]
pub enum ProvisionOutcome<R: CommandRunner> {
    /// The clone announced its name.
    Ready(Container<R>),
    /// No name appeared within the budget. The launched process keeps
    /// running; the log shows what it printed so far.
    TimedOut {
        /// Log of the launched process.
        log: LogHandle,
    },
}

impl<R: CommandRunner> ProvisionOutcome<R> {
    /// The new container, if provisioning finished in time.
    #[must_use]
    pub fn ready(self) -> Option<Container<R>> {
        match self {
            Self::Ready(container) => Some(container),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Finds the generated clone name in log contents.
///
/// Recognises `<name> is running` at the start of a line (the last word
/// before the marker wins) and, failing that, `lxc-console -n <name>`.
#[must_use]
pub fn try_match(contents: &str) -> Option<String> {
    RUNNING_MARKER
        .captures(contents)
        .or_else(|| CONSOLE_MARKER.captures(contents))
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_owned())
}

/// Arguments for `lxc-start-ephemeral` cloning `source`.
#[must_use]
pub fn launch_args(union_mount: &UnionMount, username: &str, source: &str) -> Vec<OsString> {
    vec![
        OsString::from("-U"),
        OsString::from(union_mount.as_str()),
        OsString::from("-u"),
        OsString::from(username),
        OsString::from("-o"),
        OsString::from(source),
    ]
}

/// Part of `contents` up to and including its last newline.
///
/// The producer may be mid-line when the log is read; a console hint cut off
/// there would otherwise yield a truncated name.
fn complete_lines(contents: &str) -> Option<&str> {
    contents
        .rfind('\n')
        .and_then(|end| contents.get(..=end))
}

/// Re-reads `log` every `interval` until a clone name appears.
///
/// Only complete lines are matched; a trailing partial line is left for the
/// next read.
///
/// With no deadline this never returns if the launched process dies without
/// printing a marker; use [`Container::start_ephemeral_within`] to bound it.
///
/// # Errors
///
/// Returns [`ContainerError::Io`] when the log exists but cannot be read.
pub fn discover_name(
    log: &LogHandle,
    interval: Duration,
    deadline: Option<Instant>,
) -> Result<Option<String>, ContainerError> {
    loop {
        let contents = log.read()?;
        if let Some(name) = contents
            .as_deref()
            .and_then(complete_lines)
            .and_then(try_match)
        {
            tracing::info!(%name, log = %log.path(), "discovered ephemeral container");
            return Ok(Some(name));
        }
        let pause = match deadline {
            Some(limit) => {
                let remaining = limit.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(None);
                }
                interval.min(remaining)
            }
            None => interval,
        };
        tracing::trace!(log = %log.path(), "no clone name yet");
        thread::sleep(pause);
    }
}

impl<R: CommandRunner + 'static> Container<R> {
    fn launch_ephemeral(&self) -> Result<LogHandle, ContainerError> {
        let host = self.host();
        let args = launch_args(host.union_mount(), self.username(), self.name());
        host.executor()
            .launch_detached(START_EPHEMERAL_BIN, &args, host.log_dir())
    }

    /// Starts an ephemeral clone of this container and waits, without bound,
    /// for its generated name.
    ///
    /// The clone inherits this container's username and key path and
    /// records this container as its parent.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::LaunchFailed`] when the launch fails and
    /// [`ContainerError::Io`] when the log cannot be read.
    pub fn start_ephemeral(&self) -> Result<Self, ContainerError> {
        let log = self.launch_ephemeral()?;
        let interval = self.host().poller().interval();
        match discover_name(&log, interval, None)? {
            Some(name) => Ok(self.ephemeral_child(name)),
            None => Err(ContainerError::LaunchFailed {
                command: log.command().to_owned(),
                message: String::from("discovery ended without a clone name"),
            }),
        }
    }

    /// Like [`Self::start_ephemeral`], but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// As for [`Self::start_ephemeral`]; an expired budget is reported as
    /// [`ProvisionOutcome::TimedOut`] rather than an error.
    pub fn start_ephemeral_within(
        &self,
        timeout: Duration,
    ) -> Result<ProvisionOutcome<R>, ContainerError> {
        let log = self.launch_ephemeral()?;
        let interval = self.host().poller().interval();
        let deadline = Instant::now().checked_add(timeout);
        let worker_log = log.clone();
        let verdict = run_bounded(Some(timeout.saturating_add(GUARD_GRACE)), move || {
            discover_name(&worker_log, interval, deadline)
        });
        match verdict.transpose()?.flatten() {
            Some(name) => Ok(ProvisionOutcome::Ready(self.ephemeral_child(name))),
            None => {
                tracing::warn!(
                    log = %log.path(),
                    ?timeout,
                    "ephemeral clone did not announce a name"
                );
                Ok(ProvisionOutcome::TimedOut { log })
            }
        }
    }
}
