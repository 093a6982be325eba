//! Command-line interface definitions for the `linux-container` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI for the `linux-container` binary.
#[derive(Debug, Parser)]
#[command(
    name = "linux-container",
    about = "Drive LXC containers: list, create, clone, run ephemeral copies and reach them over SSH",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG`
    /// takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of the `linux-container` binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List containers known to `lxc-ls`, one per line.
    #[command(name = "list", about = "List containers known to lxc-ls")]
    List(ListCommand),
    /// Print the lifecycle state of a container.
    #[command(name = "state", about = "Print the lifecycle state of a container")]
    State(NameArg),
    /// Print the leased address of a container.
    #[command(name = "address", about = "Print the leased address of a container")]
    Address(NameArg),
    /// Create a container from a template.
    #[command(name = "create", about = "Create a container from a template")]
    Create(CreateCommand),
    /// Create a container as a copy of another.
    #[command(name = "clone", about = "Create a container as a copy of another")]
    Clone(CloneCommand),
    /// Run a lifecycle verb (`start`, `stop`, `destroy`, ...) against a container.
    #[command(name = "verb", about = "Run lxc-<verb> against a container")]
    Verb(VerbCommand),
    /// Start an ephemeral clone and print its generated name.
    #[command(name = "ephemeral", about = "Start an ephemeral clone and print its name")]
    Ephemeral(EphemeralCommand),
    /// Run a command inside a container over SSH.
    #[command(name = "ssh", about = "Run a command inside a container over SSH")]
    Ssh(SshCommand),
    /// Wait until a container reaches a readiness condition.
    #[command(name = "wait", about = "Wait until a container reaches a condition")]
    Wait(WaitCommand),
}

/// Arguments for `linux-container list`.
#[derive(Debug, Parser)]
pub(crate) struct ListCommand {
    /// Print the names as a JSON array.
    #[arg(long)]
    pub(crate) json: bool,
}

/// A single container name.
#[derive(Debug, Parser)]
pub(crate) struct NameArg {
    /// Container name.
    pub(crate) name: String,
}

/// Arguments for `linux-container create`.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Name of the new container.
    pub(crate) name: String,
    /// Template passed to `lxc-create -t`; defaults to `ubuntu-cloud`.
    #[arg(long, short = 't', value_name = "TEMPLATE")]
    pub(crate) template: Option<String>,
    /// Template option rendered as `--KEY=VALUE`; repeatable.
    #[arg(long = "flag", value_name = "KEY=VALUE")]
    pub(crate) flags: Vec<String>,
}

/// Arguments for `linux-container clone`.
#[derive(Debug, Parser)]
pub(crate) struct CloneCommand {
    /// Existing container to copy.
    pub(crate) source: String,
    /// Name of the new container.
    pub(crate) name: String,
    /// Extra arguments for `lxc-clone` (use -- to separate flags).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) args: Vec<String>,
}

/// Arguments for `linux-container verb`.
#[derive(Debug, Parser)]
pub(crate) struct VerbCommand {
    /// Verb name: start, stop, shutdown, destroy, execute, kill, wait, cgroup,
    /// ps, info, freeze, unfreeze or netstat.
    pub(crate) verb: String,
    /// Container name.
    pub(crate) name: String,
    /// Extra arguments for `lxc-<verb>` (use -- to separate flags).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) args: Vec<String>,
}

/// Arguments for `linux-container ephemeral`.
#[derive(Debug, Parser)]
pub(crate) struct EphemeralCommand {
    /// Container to clone.
    pub(crate) source: String,
    /// Give up after this many seconds; waits indefinitely when omitted.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
    /// After discovery, also wait until the clone accepts SSH connections.
    #[arg(long)]
    pub(crate) wait_ssh: bool,
}

/// Arguments for `linux-container ssh`.
#[derive(Debug, Parser)]
pub(crate) struct SshCommand {
    /// Container name.
    pub(crate) name: String,
    /// Command to execute in the container (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for `linux-container wait`.
#[derive(Debug, Parser)]
pub(crate) struct WaitCommand {
    /// Container name.
    pub(crate) name: String,
    /// Condition: running, stopped, has-address, reachable or removed.
    pub(crate) condition: String,
    /// Overall budget in seconds; defaults to the configured wait timeout.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
}
