//! Error taxonomy shared by every container operation.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced while driving the LXC toolchain.
///
/// Timeouts are deliberately absent: bounded waits report
/// [`crate::WaitOutcome::TimedOut`] and bounded provisioning reports
/// [`crate::ProvisionOutcome::TimedOut`] so callers decide whether an expired
/// wait is fatal.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ContainerError {
    /// Raised when a synchronous invocation exits with a non-zero status.
    #[error("command failed: {command}\n{output}")]
    CommandFailed {
        /// Shell-escaped rendering of the full invocation, elevation included.
        command: String,
        /// Combined standard output and standard error.
        output: String,
    },
    /// Raised when a synchronous command cannot be spawned at all.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a detached command cannot be started.
    #[error("failed to launch {command} in the background: {message}")]
    LaunchFailed {
        /// Shell-escaped rendering of the detached invocation.
        command: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when remote access is attempted without a resolvable address.
    #[error("cannot reach container {name}: no address is known or resolvable")]
    AddressUnavailable {
        /// Container whose address could not be resolved.
        name: String,
    },
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set LXC_{env_suffix} or add {field} to linux-container.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a lease or log file exists but cannot be read.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}
