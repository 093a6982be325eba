//! Command runner abstraction and the process-backed implementation.

use std::ffi::OsString;
use std::io::{self, Read as _};
use std::os::unix::process::CommandExt as _;
use std::process::{Command, Stdio};
use std::thread;

use camino::Utf8Path;

use crate::error::ContainerError;
use crate::fsutil;

/// Result of running an external command with merged output streams.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Standard output and standard error, interleaved as written.
    pub output: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
///
/// Runners are shared with the poller's worker thread, hence the `Send` and
/// `Sync` bounds.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` to completion, capturing both output streams into one
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ContainerError>;

    /// Starts `program` without waiting for it, appending both output streams
    /// to `log`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while opening `log` or spawning the
    /// process. Failures of the program itself only show up in the log.
    fn spawn_detached(&self, program: &str, args: &[OsString], log: &Utf8Path) -> io::Result<()>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ContainerError> {
        let spawn_error = |err: io::Error| ContainerError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        };

        let (mut reader, writer) = io::pipe().map_err(spawn_error)?;
        let stdout = writer.try_clone().map_err(spawn_error)?;
        // The command (and with it both write ends) is dropped at the end of
        // this statement, so the read below sees EOF once the child exits.
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(writer)
            .spawn()
            .map_err(spawn_error)?;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(spawn_error)?;
        let status = child.wait().map_err(spawn_error)?;

        Ok(CommandOutput {
            code: status.code(),
            output: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    fn spawn_detached(&self, program: &str, args: &[OsString], log: &Utf8Path) -> io::Result<()> {
        let stdout = fsutil::open_append(log)?;
        let stderr = stdout.try_clone()?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0)
            .spawn()?;

        // Reap the child off the caller's thread so it never turns into a
        // zombie while the caller keeps polling the log.
        thread::Builder::new()
            .name(String::from("lxc-detached-reaper"))
            .spawn(move || {
                let status = child.wait();
                tracing::debug!(?status, "detached process exited");
            })?;
        Ok(())
    }
}
