//! Step definitions for inventory scenarios.

use std::ffi::OsString;

use linux_container::ContainerError;
use linux_container::test_support::lease_lines;
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{InventoryContext, StepError, split_names};

#[given("lxc-ls reports \"{names}\"")]
fn lxc_ls_reports(inventory_context: &InventoryContext, names: String) {
    inventory_context.set_names(split_names(&names));
}

#[given("no lease exists for \"{name}\"")]
fn no_lease(inventory_context: &InventoryContext, name: String) -> Result<(), StepError> {
    std::fs::write(&inventory_context.lease_file, lease_lines(&[("10.0.3.9", "other")]))
        .map_err(|err| StepError::Setup(format!("write lease file for {name}: {err}")))
}

#[when("I list the containers")]
fn list_containers(inventory_context: &InventoryContext) -> Result<(), StepError> {
    inventory_context.seed_listing();
    let names = inventory_context
        .host
        .all()?
        .iter()
        .map(|container| container.name().to_owned())
        .collect();
    inventory_context.set_listing(names);
    Ok(())
}

#[when("I clone \"{source}\" into \"{target}\"")]
fn clone_container(
    inventory_context: &InventoryContext,
    source: String,
    target: String,
) -> Result<(), StepError> {
    inventory_context.runner.push_success();
    inventory_context
        .host
        .container(target.as_str())
        .clone_from(&source, &[])?;

    let expected = format!("lxc-clone -n {target} -o {source}");
    let recorded = inventory_context
        .runner
        .invocations_of("lxc-clone")
        .last()
        .map(|call| call.command_string());
    if recorded.as_deref() != Some(expected.as_str()) {
        return Err(StepError::Assertion(format!(
            "expected {expected:?}, recorded {recorded:?}"
        )));
    }
    inventory_context.add_name(&target);
    Ok(())
}

#[when("I destroy \"{name}\"")]
fn destroy_container(inventory_context: &InventoryContext, name: String) -> Result<(), StepError> {
    inventory_context.runner.push_success();
    inventory_context
        .host
        .container(name.as_str())
        .destroy(&[OsString::from("-f")])?;
    inventory_context.remove_name(&name);
    Ok(())
}

#[when("I run \"{command}\" over ssh in \"{name}\"")]
fn run_over_ssh(inventory_context: &InventoryContext, command: String, name: String) {
    if let Err(err) = inventory_context.host.container(name).ssh(&command) {
        inventory_context.set_error(err);
    }
}

#[then("the listing is \"{names}\"")]
fn listing_is(inventory_context: &InventoryContext, names: String) -> Result<(), StepError> {
    let expected = split_names(&names);
    let actual = inventory_context.listing();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected listing {expected:?}, got {actual:?}"
        )))
    }
}

#[then("the error reports that \"{name}\" is unreachable")]
fn error_is_unreachable(inventory_context: &InventoryContext, name: String) -> Result<(), StepError> {
    match inventory_context.error() {
        Some(ContainerError::AddressUnavailable { name: reported }) if reported == name => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected AddressUnavailable for {name}, got {other:?}"
        ))),
    }
}

#[then("no ssh invocation was recorded")]
fn no_ssh_invocation(inventory_context: &InventoryContext) -> Result<(), StepError> {
    let calls = inventory_context.runner.invocations_of("ssh");
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected ssh calls: {calls:?}")))
    }
}
