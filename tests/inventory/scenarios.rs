use super::test_helpers::{InventoryContext, inventory_context};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/inventory.feature",
    name = "Listing collapses duplicate names"
)]
fn scenario_listing_dedupes(inventory_context: InventoryContext) {
    drop(inventory_context);
}

#[scenario(
    path = "tests/features/inventory.feature",
    name = "Clone a container and destroy the clone"
)]
fn scenario_clone_and_destroy(inventory_context: InventoryContext) {
    drop(inventory_context);
}

#[scenario(
    path = "tests/features/inventory.feature",
    name = "Remote access fails without an address"
)]
fn scenario_remote_without_address(inventory_context: InventoryContext) {
    drop(inventory_context);
}
