//! Step definitions for ephemeral provisioning scenarios.

use std::time::Duration;

use linux_container::ProvisionOutcome;
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{EphemeralContext, StepError};

#[given("a source container named \"{name}\"")]
fn source_container(ephemeral_context: &EphemeralContext, name: String) {
    ephemeral_context.set_source(name);
}

#[given("the launcher announces \"{line}\"")]
fn launcher_announces(ephemeral_context: &EphemeralContext, line: String) {
    ephemeral_context
        .runner
        .push_detached_log_after(Duration::from_millis(100), format!("Setting up...\n{line}\n"));
}

#[given("the launcher writes \"{head}\" then \"{tail}\" in a later append")]
fn launcher_announces_in_pieces(ephemeral_context: &EphemeralContext, head: String, tail: String) {
    ephemeral_context.runner.push_detached_chunks(vec![
        (Duration::from_millis(50), format!("Setting up...\n{head}").into_bytes()),
        (Duration::from_millis(200), format!("{tail}\n").into_bytes()),
    ]);
}

#[given("the launcher stays silent")]
fn launcher_silent(ephemeral_context: &EphemeralContext) {
    ephemeral_context
        .runner
        .push_detached_log("Setting up the overlay...\n");
}

#[when("I start an ephemeral clone")]
fn start_clone(ephemeral_context: &EphemeralContext) -> Result<(), StepError> {
    let source = ephemeral_context
        .host
        .container(ephemeral_context.source());
    let child = source.start_ephemeral()?;
    ephemeral_context.record(ProvisionOutcome::Ready(child));
    Ok(())
}

#[when("I start an ephemeral clone within \"{millis}\" milliseconds")]
fn start_clone_within(ephemeral_context: &EphemeralContext, millis: u64) -> Result<(), StepError> {
    let source = ephemeral_context
        .host
        .container(ephemeral_context.source());
    let outcome = source.start_ephemeral_within(Duration::from_millis(millis))?;
    ephemeral_context.record(outcome);
    Ok(())
}

#[then("the clone is named \"{name}\"")]
fn clone_named(ephemeral_context: &EphemeralContext, name: String) -> Result<(), StepError> {
    match ephemeral_context.outcome().as_ref() {
        Some(ProvisionOutcome::Ready(child)) if child.name() == name => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a clone named {name}, got {other:?}"
        ))),
    }
}

#[then("the clone's parent is \"{parent}\"")]
fn clone_parent(ephemeral_context: &EphemeralContext, parent: String) -> Result<(), StepError> {
    match ephemeral_context.outcome().as_ref() {
        Some(ProvisionOutcome::Ready(child)) if child.parent() == Some(parent.as_str()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a clone of {parent}, got {other:?}"
        ))),
    }
}

#[then("provisioning times out with the launch log kept")]
fn provisioning_timed_out(ephemeral_context: &EphemeralContext) -> Result<(), StepError> {
    let guard = ephemeral_context.outcome();
    let Some(ProvisionOutcome::TimedOut { log }) = guard.as_ref() else {
        return Err(StepError::Assertion(format!(
            "expected a timeout, got {:?}",
            guard.as_ref()
        )));
    };
    let contents = log.read()?.unwrap_or_default();
    if contents.contains("Setting up the overlay") {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "launch log at {} lost its contents: {contents:?}",
            log.path()
        )))
    }
}
