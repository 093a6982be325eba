//! Shared fixtures for ephemeral provisioning scenarios.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camino::Utf8PathBuf;
use linux_container::test_support::ScriptedRunner;
use linux_container::{ContainerError, Executor, Host, Poller, ProvisionOutcome};
use rstest::fixture;
use tempfile::TempDir;
use thiserror::Error;

/// Poll cadence used while scanning launch logs.
const INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct EphemeralContext {
    pub runner: ScriptedRunner,
    pub host: Arc<Host<ScriptedRunner>>,
    source: Arc<Mutex<String>>,
    outcome: Arc<Mutex<Option<ProvisionOutcome<ScriptedRunner>>>>,
    _log_dir: Arc<TempDir>,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

impl EphemeralContext {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("create log dir: {err}"));
        let log_dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("log dir is not UTF-8: {}", path.display()));
        let runner = ScriptedRunner::new();
        let host = Arc::new(
            Host::new(Executor::new(runner.clone(), None))
                .with_log_dir(log_dir)
                .with_poller(Poller::new(Duration::from_secs(5), INTERVAL)),
        );

        Self {
            runner,
            host,
            source: Arc::new(Mutex::new(String::from("base"))),
            outcome: Arc::new(Mutex::new(None)),
            _log_dir: Arc::new(tmp),
        }
    }

    pub fn source(&self) -> String {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_source(&self, name: String) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = name;
    }

    pub fn record(&self, outcome: ProvisionOutcome<ScriptedRunner>) {
        *self.outcome() = Some(outcome);
    }

    pub fn outcome(&self) -> MutexGuard<'_, Option<ProvisionOutcome<ScriptedRunner>>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[fixture]
pub fn ephemeral_context() -> EphemeralContext {
    EphemeralContext::new()
}
