//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ContainerError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::fsutil;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
/// The runner is `Send + Sync` because readiness predicates run on the
/// poller's worker thread.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: VecDeque<CommandOutput>,
    detached: VecDeque<DetachedScript>,
    invocations: Vec<CommandInvocation>,
}

#[derive(Clone, Debug)]
enum DetachedScript {
    /// Chunks appended in order, each after its delay.
    Log(Vec<(Duration, Vec<u8>)>),
    Fail(String),
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Log path for detached launches.
    pub log: Option<Utf8PathBuf>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.lock().invocations.clone()
    }

    /// Returns invocations whose program or first argument equals `program`.
    ///
    /// The first argument is checked too so elevated calls (`sudo lxc-ls`)
    /// still match.
    #[must_use]
    pub fn invocations_of(&self, program: &str) -> Vec<CommandInvocation> {
        self.invocations()
            .into_iter()
            .filter(|call| {
                call.program == program
                    || call
                        .args
                        .first()
                        .is_some_and(|arg| arg.to_string_lossy() == program)
            })
            .collect()
    }

    /// Pushes a successful exit status with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "");
    }

    /// Pushes a failing exit code with a canned message.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(&self, code: Option<i32>, output: impl Into<String>) {
        self.lock().responses.push_back(CommandOutput {
            code,
            output: output.into(),
        });
    }

    /// Queues log contents written immediately by the next detached launch.
    pub fn push_detached_log(&self, contents: impl Into<String>) {
        self.push_detached_log_after(Duration::ZERO, contents);
    }

    /// Queues log contents written by the next detached launch after `delay`,
    /// from a background thread, as a real process would.
    pub fn push_detached_log_after(&self, delay: Duration, contents: impl Into<String>) {
        let chunk: String = contents.into();
        self.push_detached_chunks(vec![(delay, chunk.into_bytes())]);
    }

    /// Queues raw chunks appended one after another by the next detached
    /// launch. Each delay is measured from the previous append, so a line can
    /// be split across writes the way a slow producer splits it.
    pub fn push_detached_chunks(&self, chunks: Vec<(Duration, Vec<u8>)>) {
        self.lock().detached.push_back(DetachedScript::Log(chunks));
    }

    /// Makes the next detached launch fail to spawn.
    pub fn fail_detached(&self, message: impl Into<String>) {
        self.lock()
            .detached
            .push_back(DetachedScript::Fail(message.into()));
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ContainerError> {
        let mut state = self.lock();
        state.invocations.push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            log: None,
        });
        state
            .responses
            .pop_front()
            .ok_or_else(|| ContainerError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }

    fn spawn_detached(&self, program: &str, args: &[OsString], log: &Utf8Path) -> io::Result<()> {
        let script = {
            let mut state = self.lock();
            state.invocations.push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
                log: Some(log.to_path_buf()),
            });
            state.detached.pop_front()
        };

        match script {
            Some(DetachedScript::Fail(message)) => Err(io::Error::other(message)),
            Some(DetachedScript::Log(chunks))
                if chunks.iter().all(|(delay, _)| delay.is_zero()) =>
            {
                fsutil::open_append(log)?;
                chunks
                    .iter()
                    .try_for_each(|(_, contents)| append_log(log, contents))
            }
            Some(DetachedScript::Log(chunks)) => {
                fsutil::open_append(log)?;
                let path = log.to_path_buf();
                thread::spawn(move || {
                    for (delay, contents) in chunks {
                        thread::sleep(delay);
                        if append_log(&path, &contents).is_err() {
                            break;
                        }
                    }
                });
                Ok(())
            }
            None => fsutil::open_append(log).map(drop),
        }
    }
}

fn append_log(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fsutil::open_append(path)?;
    file.write_all(contents)
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Renders lease lines in the dnsmasq format `timestamp mac ip hostname id`.
#[must_use]
pub fn lease_lines(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(index, (ip, hostname))| {
            format!("1700000000 00:16:3e:00:00:{index:02x} {ip} {hostname} *\n")
        })
        .collect()
}
