//! Unit tests for host construction and container listing.

use super::*;
use crate::test_support::ScriptedRunner;
use rstest::{fixture, rstest};

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

fn host(runner: &ScriptedRunner) -> Arc<Host<ScriptedRunner>> {
    Arc::new(Host::new(Executor::new(runner.clone(), None)))
}

fn config() -> HostConfig {
    HostConfig {
        container_root: String::from("/srv/lxc"),
        username: String::from("builder"),
        ssh_identity_file: Some(String::from("/keys/id_ed25519")),
        lease_file: Some(String::from("/run/leases")),
        union_mount: String::from("aufs"),
        log_dir: String::from("/var/log/lxc"),
        ssh_bin: String::from("ssh"),
        scp_bin: String::from("scp"),
        sudo_bin: String::from("doas"),
        elevation: String::from("always"),
        poll_interval_secs: 2,
        wait_timeout_secs: 60,
    }
}

#[rstest]
#[case("a\nb\na\n", &["a", "b"])]
#[case("  web \n\n\nweb\ndb\n", &["web", "db"])]
#[case("", &[])]
fn container_list_collapses_duplicates_and_blanks(#[case] output: &str, #[case] expected: &[&str]) {
    assert_eq!(parse_container_list(output), expected);
}

#[rstest]
fn all_lists_each_container_once(runner: ScriptedRunner) {
    runner.push_output(Some(0), "base\nweb\nbase\n");

    let names: Vec<String> = host(&runner)
        .all()
        .expect("lxc-ls should succeed")
        .iter()
        .map(|container| container.name().to_owned())
        .collect();

    assert_eq!(names, ["base", "web"]);
    assert_eq!(runner.invocations()[0].command_string(), "lxc-ls -1");
}

#[rstest]
fn all_propagates_listing_failures(runner: ScriptedRunner) {
    runner.push_failure(1);

    let err = host(&runner).all().expect_err("lxc-ls should fail");

    assert!(matches!(err, ContainerError::CommandFailed { .. }));
}

#[rstest]
fn from_config_applies_every_setting(runner: ScriptedRunner) {
    let built = Host::from_config(&config(), runner).expect("config is valid");

    assert_eq!(built.executor().elevation(), Some("doas"));
    assert_eq!(built.container_root(), "/srv/lxc");
    assert_eq!(built.log_dir(), "/var/log/lxc");
    assert_eq!(built.union_mount(), &UnionMount::Aufs);
    assert_eq!(built.leases(), &LeaseSource::file("/run/leases"));
    assert_eq!(built.poller().interval(), std::time::Duration::from_secs(2));
}

#[rstest]
fn from_config_rejects_invalid_settings(runner: ScriptedRunner) {
    let invalid = HostConfig {
        sudo_bin: String::from(" "),
        ..config()
    };

    let err = Host::from_config(&invalid, runner).expect_err("blank sudo_bin");

    assert_eq!(
        err,
        ContainerError::InvalidConfig {
            field: String::from("sudo_bin")
        }
    );
}

#[rstest]
fn handles_inherit_host_defaults(runner: ScriptedRunner) {
    let shared = Arc::new(Host::from_config(&config(), runner).expect("config is valid"));

    let container = shared.container("web");

    assert_eq!(container.username(), "builder");
    assert_eq!(container.ssh_key_path(), Some(Utf8Path::new("/keys/id_ed25519")));
    assert_eq!(container.parent(), None);
}

#[rstest]
fn spec_fields_override_host_defaults(runner: ScriptedRunner) {
    let shared = host(&runner);

    let container = shared.container_from(
        ContainerSpec::new("web")
            .username("root")
            .ssh_key_path("/keys/other"),
    );

    assert_eq!(container.username(), "root");
    assert_eq!(container.ssh_key_path(), Some(Utf8Path::new("/keys/other")));
}
