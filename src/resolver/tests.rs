//! Unit tests for lease parsing and state lookups.

use super::*;
use crate::test_support::{ScriptedRunner, lease_lines};
use rstest::rstest;
use std::net::Ipv4Addr;
use tempfile::TempDir;

fn write_leases(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf8 path");
    std::fs::write(&path, contents).expect("write lease file");
    path
}

#[rstest]
fn parse_leases_reads_dnsmasq_lines() {
    let records = parse_leases("1700000000 00:16:3e:aa:bb:cc 10.0.3.17 web-1 01:00:16:3e:aa:bb:cc\n");

    assert_eq!(
        records,
        vec![LeaseRecord {
            mac: String::from("00:16:3e:aa:bb:cc"),
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 3, 17)),
            hostname: String::from("web-1"),
        }]
    );
}

#[rstest]
fn parse_leases_skips_malformed_lines() {
    let contents = "\n\
        garbage\n\
        1700000000 00:16:3e:00:00:01 not-an-ip web-1 *\n\
        1700000000 00:16:3e:00:00:02 10.0.3.9 web-2 *\n";

    let records = parse_leases(contents);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hostname, "web-2");
}

#[rstest]
fn resolve_address_returns_first_matching_hostname() {
    let tmp = TempDir::new().expect("temp dir");
    let path = write_leases(
        &tmp,
        "dnsmasq.leases",
        &lease_lines(&[("10.0.3.2", "other"), ("10.0.3.5", "box"), ("10.0.3.6", "box")]),
    );

    let address = LeaseSource::file(path)
        .resolve_address("box")
        .expect("lease file readable");

    assert_eq!(address, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 3, 5))));
}

#[rstest]
fn resolve_address_tolerates_undecodable_hostnames() {
    let tmp = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("mixed.leases")).expect("utf8 path");
    std::fs::write(
        &path,
        b"1 aa:bb 10.0.3.9 web *\n2 cc:dd 10.0.3.7 caf\xe9 *\n",
    )
    .expect("write lease file");

    let address = LeaseSource::file(path)
        .resolve_address("web")
        .expect("stray bytes in another record are not an error");

    assert_eq!(address, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 3, 9))));
}

#[rstest]
fn resolve_address_is_none_without_a_matching_record() {
    let tmp = TempDir::new().expect("temp dir");
    let path = write_leases(&tmp, "dnsmasq.leases", &lease_lines(&[("10.0.3.2", "other")]));

    let address = LeaseSource::file(path)
        .resolve_address("box")
        .expect("lease file readable");

    assert_eq!(address, None);
}

#[rstest]
fn resolve_address_is_none_when_no_candidate_exists() {
    let tmp = TempDir::new().expect("temp dir");
    let missing = Utf8PathBuf::from_path_buf(tmp.path().join("missing.leases")).expect("utf8");

    let address = LeaseSource::file(missing)
        .resolve_address("box")
        .expect("missing file is not an error");

    assert_eq!(address, None);
}

#[rstest]
fn first_readable_candidate_wins() {
    let tmp = TempDir::new().expect("temp dir");
    let missing = Utf8PathBuf::from_path_buf(tmp.path().join("lxcbr0.leases")).expect("utf8");
    let fallback = write_leases(&tmp, "generic.leases", &lease_lines(&[("10.0.3.8", "box")]));
    let source = LeaseSource {
        candidates: vec![missing, fallback.clone()],
    };

    let (path, _) = source
        .read()
        .expect("readable")
        .expect("fallback candidate exists");

    assert_eq!(path, fallback.as_path());
    assert_eq!(
        source.resolve_address("box").expect("readable"),
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 3, 8)))
    );
}

#[rstest]
fn default_source_lists_bridge_lease_file_first() {
    let source = LeaseSource::default();

    assert_eq!(source.candidates()[0], DEFAULT_LEASE_FILES[0]);
    assert_eq!(source.candidates().len(), DEFAULT_LEASE_FILES.len());
}

#[rstest]
#[case("State:          STOPPED\n", "STOPPED")]
#[case("state: RUNNING", "RUNNING")]
#[case("Name: box\nState: FROZEN\nPID: 42\n", "FROZEN")]
#[case("RUNNING\n", "RUNNING")]
fn parse_state_extracts_value_after_last_colon(#[case] output: &str, #[case] expected: &str) {
    assert_eq!(parse_state(output), expected);
}

#[rstest]
fn resolve_state_invokes_lxc_info() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "State:          STOPPED\n");
    let executor = Executor::new(runner.clone(), None);

    let state = resolve_state(&executor, "box").expect("lxc-info should succeed");

    assert_eq!(state, "STOPPED");
    assert_eq!(runner.invocations()[0].command_string(), "lxc-info -n box -s");
}
