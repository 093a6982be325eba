//! Core library for driving Linux system containers through the `lxc-*`
//! toolchain.
//!
//! The crate wraps the LXC command line in a typed, synchronous API: a
//! [`Host`] describes the machine and hands out [`Container`] handles, which
//! run lifecycle verbs, resolve their address from the DHCP lease file, reach
//! the container over SSH and poll readiness conditions under a timeout. The
//! centrepiece is ephemeral provisioning: a clone is launched in the
//! background, its generated name is discovered from the launch log, and a
//! new handle is returned (launch → discover name → wait for readiness).

pub mod config;
pub mod container;
pub mod ephemeral;
pub mod error;
pub mod exec;
pub mod fsutil;
pub mod host;
pub mod lifecycle;
pub mod poll;
pub mod remote;
pub mod resolver;
pub mod test_support;

pub use config::{ConfigLoadError, HostConfig};
pub use container::{Container, ContainerSpec, Readiness};
pub use ephemeral::{ProvisionOutcome, UnionMount, try_match};
pub use error::ContainerError;
pub use exec::{
    CommandOutput, CommandRunner, Elevation, Executor, LogHandle, ProcessCommandRunner,
};
pub use host::Host;
pub use lifecycle::{CreateOptions, DEFAULT_TEMPLATE, LifecycleVerb};
pub use poll::{Poller, WaitOutcome};
pub use remote::{HOST_KEY_BYPASS_OPTIONS, RemoteTarget, RemoteTools};
pub use resolver::{LeaseRecord, LeaseSource};
