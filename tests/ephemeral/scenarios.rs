use super::test_helpers::{EphemeralContext, ephemeral_context};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/ephemeral.feature",
    name = "Discover the clone name from the running marker"
)]
fn scenario_running_marker(ephemeral_context: EphemeralContext) {
    drop(ephemeral_context);
}

#[scenario(
    path = "tests/features/ephemeral.feature",
    name = "Discover the clone name from the console hint"
)]
fn scenario_console_hint(ephemeral_context: EphemeralContext) {
    drop(ephemeral_context);
}

#[scenario(
    path = "tests/features/ephemeral.feature",
    name = "Give up when the clone never announces itself"
)]
fn scenario_silent_launcher(ephemeral_context: EphemeralContext) {
    drop(ephemeral_context);
}

#[scenario(
    path = "tests/features/ephemeral.feature",
    name = "Wait for an announcement written in two pieces"
)]
fn scenario_split_announcement(ephemeral_context: EphemeralContext) {
    drop(ephemeral_context);
}
