//! Binary entry point for the `linux-container` CLI.

use std::io::{self, Write};
use std::net::IpAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use linux_container::{
    ContainerError, CreateOptions, Host, HostConfig, LifecycleVerb, Poller, ProcessCommandRunner,
    ProvisionOutcome, Readiness, WaitOutcome,
};

mod cli;

use cli::{Cli, Command, CreateCommand, EphemeralCommand, WaitCommand};

/// Exit status reported when a bounded wait expires.
const EXIT_TIMED_OUT: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("invalid argument: {0}")]
    Usage(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

type SharedHost = Arc<Host<ProcessCommandRunner>>;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match load_host().and_then(|host| {
        dispatch(&host, cli.command, &mut io::stdout(), &mut io::stderr())
    }) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("linux_container={level}")));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_host() -> Result<SharedHost, CliError> {
    let config =
        HostConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    Ok(Arc::new(Host::with_process_runner(&config)?))
}

fn dispatch(
    host: &SharedHost,
    command: Command,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32, CliError> {
    match command {
        Command::List(args) => {
            let names: Vec<String> = host
                .all()?
                .iter()
                .map(|container| container.name().to_owned())
                .collect();
            if args.json {
                let rendered = serde_json::to_string(&names)
                    .map_err(|json_err| CliError::Output(io::Error::other(json_err)))?;
                writeln!(out, "{rendered}")?;
            } else {
                for name in names {
                    writeln!(out, "{name}")?;
                }
            }
            Ok(0)
        }
        Command::State(args) => {
            writeln!(out, "{}", host.container(args.name).state()?)?;
            Ok(0)
        }
        Command::Address(args) => {
            writeln!(out, "{}", require_address(host, &args.name)?)?;
            Ok(0)
        }
        Command::Create(args) => create(host, args, out),
        Command::Clone(args) => {
            let output = host
                .container(args.name)
                .clone_from(&args.source, &to_os_args(&args.args))?;
            write!(out, "{output}")?;
            Ok(0)
        }
        Command::Verb(args) => {
            let verb: LifecycleVerb = args
                .verb
                .parse()
                .map_err(|parse_err: linux_container::lifecycle::UnknownVerb| {
                    CliError::Usage(parse_err.to_string())
                })?;
            let output = host
                .container(args.name)
                .invoke(verb, &to_os_args(&args.args))?;
            write!(out, "{output}")?;
            Ok(0)
        }
        Command::Ephemeral(args) => ephemeral(host, &args, out, err),
        Command::Ssh(args) => {
            validate_command_args(&args.command)?;
            let output = host
                .container(args.name)
                .ssh(&render_remote_command(&args.command))?;
            write!(out, "{output}")?;
            Ok(0)
        }
        Command::Wait(args) => wait(host, args, out, err),
    }
}

fn require_address(host: &SharedHost, name: &str) -> Result<IpAddr, CliError> {
    host.container(name).address()?.ok_or_else(|| {
        CliError::Container(ContainerError::AddressUnavailable {
            name: name.to_owned(),
        })
    })
}

fn create(host: &SharedHost, args: CreateCommand, out: &mut dyn Write) -> Result<i32, CliError> {
    let mut options = CreateOptions::new();
    if let Some(template) = args.template {
        options = options.template(template);
    }
    for flag in &args.flags {
        let (key, value) = parse_flag(flag)?;
        options = options.flag(key, value);
    }
    let output = host.container(args.name).create(options)?;
    write!(out, "{output}")?;
    Ok(0)
}

fn parse_flag(flag: &str) -> Result<(&str, &str), CliError> {
    flag.split_once('=')
        .filter(|(key, _)| !key.trim_start_matches('-').is_empty())
        .ok_or_else(|| CliError::Usage(format!("expected KEY=VALUE, got {flag:?}")))
}

fn ephemeral(
    host: &SharedHost,
    args: &EphemeralCommand,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32, CliError> {
    let source = host.container(args.source.as_str());
    let child = match args.timeout {
        None => source.start_ephemeral()?,
        Some(seconds) => match source.start_ephemeral_within(Duration::from_secs(seconds))? {
            ProvisionOutcome::Ready(child) => child,
            ProvisionOutcome::TimedOut { log } => {
                writeln!(
                    err,
                    "timed out after {seconds}s waiting for the clone of {} to start; see {}",
                    args.source,
                    log.path()
                )?;
                return Ok(EXIT_TIMED_OUT);
            }
        },
    };
    writeln!(out, "{}", child.name())?;

    if args.wait_ssh
        && let WaitOutcome::TimedOut = child.wait_until(host.poller(), Readiness::Reachable)
    {
        writeln!(err, "{} did not become reachable over SSH", child.name())?;
        return Ok(EXIT_TIMED_OUT);
    }
    Ok(0)
}

fn wait(
    host: &SharedHost,
    args: WaitCommand,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32, CliError> {
    let condition: Readiness = args
        .condition
        .parse()
        .map_err(|parse_err: linux_container::container::UnknownReadiness| {
            CliError::Usage(parse_err.to_string())
        })?;
    let defaults = host.poller();
    let poller = args.timeout.map_or(defaults, |seconds| {
        Poller::new(Duration::from_secs(seconds), defaults.interval())
    });

    match host.container(args.name.as_str()).wait_until(poller, condition) {
        WaitOutcome::Ready(elapsed) => {
            writeln!(out, "{} is {condition} after {elapsed:.1?}", args.name)?;
            Ok(0)
        }
        WaitOutcome::TimedOut => {
            writeln!(
                err,
                "timed out after {:?} waiting for {} to be {condition}",
                poller.timeout(),
                args.name
            )?;
            Ok(EXIT_TIMED_OUT)
        }
    }
}

fn to_os_args(args: &[String]) -> Vec<std::ffi::OsString> {
    args.iter().map(std::ffi::OsString::from).collect()
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\n' | '\r' | '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::Usage(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
