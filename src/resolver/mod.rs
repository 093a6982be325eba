//! Name-to-address and name-to-state lookups.
//!
//! Addresses come from the DHCP lease file maintained by the dnsmasq
//! instance behind the LXC bridge; states come from `lxc-info -s`. Nothing is
//! cached here; [`crate::Container`] owns the address cache.

use std::ffi::OsString;
use std::net::IpAddr;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ContainerError;
use crate::exec::{CommandRunner, Executor};
use crate::fsutil;

/// Lease files consulted, in order, when no override is configured.
pub const DEFAULT_LEASE_FILES: [&str; 2] = [
    "/var/lib/misc/dnsmasq.lxcbr0.leases",
    "/var/lib/misc/dnsmasq.leases",
];

/// One parsed line of a dnsmasq lease file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaseRecord {
    /// Hardware address of the client.
    pub mac: String,
    /// Address handed out to the client.
    pub address: IpAddr,
    /// Hostname announced by the client.
    pub hostname: String,
}

/// Parses lease file contents, skipping lines that do not carry at least a
/// timestamp, hardware address, IP address and hostname.
#[must_use]
pub fn parse_leases(contents: &str) -> Vec<LeaseRecord> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _timestamp = fields.next()?;
            let mac = fields.next()?;
            let ip = fields.next()?;
            let hostname = fields.next()?;
            let Ok(address) = IpAddr::from_str(ip) else {
                tracing::warn!(%line, "skipping lease with unparsable address");
                return None;
            };
            Some(LeaseRecord {
                mac: mac.to_owned(),
                address,
                hostname: hostname.to_owned(),
            })
        })
        .collect()
}

/// Extracts the state value from `lxc-info -s` output.
///
/// Takes the text after the last colon of the first `State` line, falling
/// back to the first line containing a colon and then to the whole output.
#[must_use]
pub fn parse_state(output: &str) -> String {
    let line = output
        .lines()
        .find(|line| {
            line.trim_start()
                .get(..5)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("state"))
        })
        .or_else(|| output.lines().find(|line| line.contains(':')))
        .unwrap_or(output);
    line.rsplit(':').next().unwrap_or(line).trim().to_owned()
}

/// Source of DHCP lease records.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaseSource {
    candidates: Vec<Utf8PathBuf>,
}

impl Default for LeaseSource {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_LEASE_FILES
                .iter()
                .map(|path| Utf8PathBuf::from(*path))
                .collect(),
        }
    }
}

impl LeaseSource {
    /// Uses exactly `path` as the lease file.
    #[must_use]
    pub fn file(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    /// Candidate files, in the order they are tried.
    #[must_use]
    pub fn candidates(&self) -> &[Utf8PathBuf] {
        &self.candidates
    }

    /// Reads the first existing candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] when a candidate exists but cannot be
    /// read.
    pub fn read(&self) -> Result<Option<(&Utf8Path, String)>, ContainerError> {
        for candidate in &self.candidates {
            if let Some(contents) = fsutil::read_optional(candidate)? {
                return Ok(Some((candidate.as_path(), contents)));
            }
        }
        Ok(None)
    }

    /// Returns the address leased to `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] when the lease file cannot be read.
    pub fn resolve_address(&self, name: &str) -> Result<Option<IpAddr>, ContainerError> {
        let Some((path, contents)) = self.read()? else {
            tracing::debug!(%name, "no lease file available");
            return Ok(None);
        };
        let address = parse_leases(&contents)
            .into_iter()
            .find(|record| record.hostname == name)
            .map(|record| record.address);
        tracing::debug!(%name, lease_file = %path, ?address, "resolved lease");
        Ok(address)
    }
}

/// Queries `lxc-info` for the lifecycle state of `name`.
///
/// # Errors
///
/// Propagates [`ContainerError::CommandFailed`] and
/// [`ContainerError::Spawn`] from the executor.
pub fn resolve_state<R: CommandRunner>(
    executor: &Executor<R>,
    name: &str,
) -> Result<String, ContainerError> {
    let args = [
        OsString::from("-n"),
        OsString::from(name),
        OsString::from("-s"),
    ];
    let output = executor.execute("lxc-info", &args)?;
    Ok(parse_state(&output))
}

#[cfg(test)]
mod tests;
