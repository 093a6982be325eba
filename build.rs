//! Renders `linux-container.1` into `OUT_DIR`.
//!
//! The page documents every subcommand (`list`, `state`, `address`,
//! `create`, `clone`, `verb`, `ephemeral`, `ssh`, `wait`) straight from the
//! clap definitions in `src/cli/mod.rs`, so the `--timeout`, `--wait-ssh` and
//! `--flag KEY=VALUE` options never drift from what the binary accepts. The
//! `LXC_*` environment and `linux-container.toml` settings are not part of
//! the clap tree and are documented on `linux_container::HostConfig`.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let mut buffer = Vec::new();
    Man::new(Cli::command()).render(&mut buffer)?;

    let mut file = File::create(out_dir.join("linux-container.1"))?;
    file.write_all(&buffer)?;

    Ok(())
}
