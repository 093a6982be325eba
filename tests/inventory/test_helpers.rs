//! Shared fixtures for inventory scenarios.
//!
//! The scripted runner answers in FIFO order, so the context keeps a model of
//! the containers that `lxc-ls` would report and seeds the matching response
//! right before each listing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::Utf8PathBuf;
use linux_container::test_support::ScriptedRunner;
use linux_container::{ContainerError, Executor, Host, LeaseSource};
use rstest::fixture;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Clone, Debug, Default)]
struct Observed {
    names: Vec<String>,
    listing: Vec<String>,
    error: Option<ContainerError>,
}

#[derive(Clone, Debug)]
pub struct InventoryContext {
    pub runner: ScriptedRunner,
    pub host: Arc<Host<ScriptedRunner>>,
    pub lease_file: Utf8PathBuf,
    observed: Arc<Mutex<Observed>>,
    _tmp: Arc<TempDir>,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("failed to prepare fixture: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

impl InventoryContext {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("create temp dir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp dir is not UTF-8: {}", path.display()));
        let lease_file = root.join("dnsmasq.leases");
        let runner = ScriptedRunner::new();
        let host = Arc::new(
            Host::new(Executor::new(runner.clone(), None))
                .with_container_root(root.join("lxc"))
                .with_leases(LeaseSource::file(lease_file.clone())),
        );

        Self {
            runner,
            host,
            lease_file,
            observed: Arc::new(Mutex::new(Observed::default())),
            _tmp: Arc::new(tmp),
        }
    }

    fn observed(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_names(&self, names: Vec<String>) {
        self.observed().names = names;
    }

    pub fn add_name(&self, name: &str) {
        self.observed().names.push(name.to_owned());
    }

    pub fn remove_name(&self, name: &str) {
        self.observed().names.retain(|existing| existing != name);
    }

    /// Seeds the `lxc-ls -1` response from the current model.
    pub fn seed_listing(&self) {
        let rendered: String = self
            .observed()
            .names
            .iter()
            .map(|name| format!("{name}\n"))
            .collect();
        self.runner.push_output(Some(0), rendered);
    }

    pub fn set_listing(&self, listing: Vec<String>) {
        self.observed().listing = listing;
    }

    pub fn listing(&self) -> Vec<String> {
        self.observed().listing.clone()
    }

    pub fn set_error(&self, error: ContainerError) {
        self.observed().error = Some(error);
    }

    pub fn error(&self) -> Option<ContainerError> {
        self.observed().error.clone()
    }
}

pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[fixture]
pub fn inventory_context() -> InventoryContext {
    InventoryContext::new()
}
