//! Synchronous and detached execution of host commands.
//!
//! The [`Executor`] is the single choke point through which every `lxc-*`,
//! `ssh` and `scp` invocation flows. It prepends the elevation command when
//! the current process is unprivileged, merges the output streams, and turns
//! non-zero exit statuses into [`ContainerError::CommandFailed`] carrying the
//! rendered invocation and its output.

use std::ffi::OsString;
use std::str::FromStr;

use shell_escape::unix::escape;

use crate::error::ContainerError;

mod background;
mod types;

pub use background::LogHandle;
pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner};

/// Default elevation command used when the process is not running as root.
pub const DEFAULT_SUDO_BIN: &str = "sudo";

/// When the elevation command is prefixed to invocations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Elevation {
    /// Elevate only when the effective user is not root.
    #[default]
    Auto,
    /// Always elevate.
    Always,
    /// Never elevate.
    Never,
}

/// Raised when an elevation mode name is not recognised.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("unknown elevation mode: {0} (expected auto, always or never)")]
pub struct UnknownElevation(pub String);

impl FromStr for Elevation {
    type Err = UnknownElevation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(UnknownElevation(value.to_owned())),
        }
    }
}

/// Returns `true` when the effective user is root.
#[must_use]
pub fn is_privileged() -> bool {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Renders a program and its arguments as a shell-escaped command line.
///
/// The result is for diagnostics only; commands are always executed with an
/// argument vector and never through a shell.
#[must_use]
pub fn render_command(program: &str, args: &[OsString]) -> String {
    let mut result = String::from(escape(program.into()).as_ref());
    for arg in args {
        result.push(' ');
        let lossy = arg.to_string_lossy();
        result.push_str(escape(lossy).as_ref());
    }
    result
}

/// Runs host commands with optional privilege elevation.
#[derive(Clone, Debug)]
pub struct Executor<R: CommandRunner> {
    runner: R,
    elevation: Option<String>,
}

impl Executor<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner and
    /// detects whether elevation is needed.
    #[must_use]
    pub fn with_process_runner(sudo_bin: &str) -> Self {
        Self::detect(ProcessCommandRunner, sudo_bin)
    }
}

impl<R: CommandRunner> Executor<R> {
    /// Creates an executor with an explicit elevation command, or none.
    #[must_use]
    pub const fn new(runner: R, elevation: Option<String>) -> Self {
        Self { runner, elevation }
    }

    /// Creates an executor that elevates with `sudo_bin` only when the
    /// current process is not already privileged.
    #[must_use]
    pub fn detect(runner: R, sudo_bin: &str) -> Self {
        let elevation = (!is_privileged()).then(|| sudo_bin.to_owned());
        Self::new(runner, elevation)
    }

    /// Creates an executor following `mode`, elevating with `sudo_bin`.
    #[must_use]
    pub fn with_elevation(runner: R, mode: Elevation, sudo_bin: &str) -> Self {
        match mode {
            Elevation::Auto => Self::detect(runner, sudo_bin),
            Elevation::Always => Self::new(runner, Some(sudo_bin.to_owned())),
            Elevation::Never => Self::new(runner, None),
        }
    }

    /// Returns the elevation command prefixed to every invocation, if any.
    #[must_use]
    pub fn elevation(&self) -> Option<&str> {
        self.elevation.as_deref()
    }

    /// Returns the underlying runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs `program` synchronously and returns its combined output.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Spawn`] when the process cannot start and
    /// [`ContainerError::CommandFailed`] when it exits unsuccessfully.
    pub fn execute(&self, program: &str, args: &[OsString]) -> Result<String, ContainerError> {
        let (elevated, elevated_args) = self.elevate(program, args);
        let command = render_command(&elevated, &elevated_args);
        tracing::debug!(%command, "executing");

        let output = self.runner.run(&elevated, &elevated_args)?;
        if output.is_success() {
            return Ok(output.output);
        }

        tracing::debug!(%command, code = ?output.code, "command failed");
        Err(ContainerError::CommandFailed {
            command,
            output: output.output,
        })
    }

    fn elevate(&self, program: &str, args: &[OsString]) -> (String, Vec<OsString>) {
        match self.elevation {
            Some(ref sudo) => {
                let mut elevated = Vec::with_capacity(args.len() + 1);
                elevated.push(OsString::from(program));
                elevated.extend_from_slice(args);
                (sudo.clone(), elevated)
            }
            None => (program.to_owned(), args.to_vec()),
        }
    }
}
