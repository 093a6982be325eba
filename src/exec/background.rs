//! Detached launches whose output lands in a uniquely named log file.

use std::ffi::OsString;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use crate::error::ContainerError;
use crate::fsutil;

use super::{CommandRunner, Executor, render_command};

const LOG_PREFIX: &str = "lxc_ephemeral_";

/// Handle to the log written by a detached process.
///
/// The process appends to the log for as long as it runs; readers re-read the
/// whole file every time, so partial lines are harmless.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogHandle {
    path: Utf8PathBuf,
    command: String,
}

impl LogHandle {
    /// Wraps an existing log path, for example one reported by an earlier
    /// launch.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, command: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            command: command.into(),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Rendered invocation that produces this log.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Reads everything written so far; `None` until the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] when the file exists but cannot be read.
    pub fn read(&self) -> Result<Option<String>, ContainerError> {
        fsutil::read_optional(&self.path)
    }
}

/// Builds a log path that stays unique across concurrent launches on one host.
#[must_use]
pub fn unique_log_path(log_dir: &Utf8Path) -> Utf8PathBuf {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let random = Uuid::new_v4().simple();
    log_dir.join(format!(
        "{LOG_PREFIX}{seconds}_{pid}_{random}.log",
        pid = process::id()
    ))
}

impl<R: CommandRunner> Executor<R> {
    /// Starts `program` in the background and returns its log handle at once.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::LaunchFailed`] when the log cannot be opened
    /// or the process cannot be spawned.
    pub fn launch_detached(
        &self,
        program: &str,
        args: &[OsString],
        log_dir: &Utf8Path,
    ) -> Result<LogHandle, ContainerError> {
        let (elevated, elevated_args) = self.elevate(program, args);
        let command = render_command(&elevated, &elevated_args);
        let path = unique_log_path(log_dir);
        tracing::debug!(%command, log = %path, "launching detached");

        self.runner
            .spawn_detached(&elevated, &elevated_args, &path)
            .map_err(|err| ContainerError::LaunchFailed {
                command: command.clone(),
                message: err.to_string(),
            })?;

        Ok(LogHandle { path, command })
    }
}
