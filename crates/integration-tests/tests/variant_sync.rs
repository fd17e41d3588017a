//! Variant mode against the in-memory catalog.
//!
//! Each half of a bundle becomes one wrapper product with a single
//! `Options` option; the formats are its variants.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use catalog_sync::{FailureScope, Orchestrator, ProductAction, SyncEvent};
use catalog_sync_core::{SyncMode, SyncSettings};
use catalog_sync_integration_tests::{
    FakeCatalog, Op, bundle, failures, fixed_now, success_for, successes,
};
use serde_json::json;

fn variant_settings() -> SyncSettings {
    SyncSettings {
        mode: SyncMode::Variants,
        ..SyncSettings::default()
    }
}

fn orchestrator(catalog: &FakeCatalog, settings: SyncSettings) -> Orchestrator<FakeCatalog> {
    Orchestrator::new(catalog.clone(), settings).expect("valid settings")
}

fn labels(catalog: &FakeCatalog, sku: &str) -> Vec<String> {
    let product = catalog.product_by_sku(sku).unwrap();
    product
        .option("Options")
        .map(|o| o.option_values.iter().map(|v| v.label.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_bundle_creates_linked_wrappers() {
    let catalog = FakeCatalog::new();
    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "name": "Dune", "encodingFormat": "Hardcover", "isDefault": true},
        {"sku": "PB", "name": "Dune", "encodingFormat": "Paperback"},
        {"sku": "EB", "name": "Dune", "encodingFormat": "EPUB", "isDigital": true},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    let summary = sync
        .sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    let physical = catalog.product_by_sku("HC-W").unwrap();
    let digital = catalog.product_by_sku("EB-W").unwrap();
    assert!(physical.is_visible && digital.is_visible);
    assert_eq!(labels(&catalog, "HC-W"), vec!["Hardcover", "Paperback"]);
    assert_eq!(labels(&catalog, "EB-W"), vec!["EPUB"]);

    let variant_skus: Vec<&str> = physical.variants.iter().map(|v| v.sku.as_str()).collect();
    assert_eq!(variant_skus, vec!["HC", "PB"]);

    // Wrappers point at each other.
    assert_eq!(
        physical.custom_field("related_product_id").unwrap().value,
        digital.id.to_string()
    );
    assert_eq!(
        digital.custom_field("related_product_id").unwrap().value,
        physical.id.to_string()
    );

    for sku in ["HC", "PB", "EB"] {
        let result = &success_for(&events, sku).unwrap().product;
        assert_eq!(result.action, ProductAction::Created);
        assert_eq!(result.variant.as_ref().unwrap().sku, sku);
        assert!(
            result
                .custom_fields
                .iter()
                .any(|f| f.name == "related_product_id" && f.id.is_some())
        );
    }
    assert_eq!(
        success_for(&events, "PB")
            .unwrap()
            .product
            .remote_product
            .as_ref()
            .unwrap()
            .id,
        physical.id
    );
}

#[tokio::test]
async fn test_retired_format_removed_before_variants_are_read() {
    let catalog = FakeCatalog::new();
    let wrapper = catalog.insert_product(50, "HC-W", true);
    catalog.add_option(wrapper, "Options", &["Hardcover", "Paperback"]);
    let hardcover = catalog.add_variant(wrapper, "HC", "Hardcover");
    catalog.add_variant(wrapper, "PB", "Paperback");

    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "name": "Dune", "encodingFormat": "Hardcover", "isDefault": true},
        {"sku": "PB", "name": "Dune", "encodingFormat": "Paperback", "availability": "not-available"},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    sync.sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    let delete = catalog.first(Op::DeleteOptionValue).unwrap();
    let read = catalog.first(Op::ListVariants).unwrap();
    let write = catalog.first(Op::UpsertVariants).unwrap();
    assert!(delete < read && read < write);

    let product = catalog.product(wrapper).unwrap();
    assert!(product.is_visible);
    assert_eq!(labels(&catalog, "HC-W"), vec!["Hardcover"]);
    assert_eq!(product.variants.len(), 1);
    assert_eq!(product.variants.first().unwrap().id, hardcover);

    let hc = &success_for(&events, "HC").unwrap().product;
    assert_eq!(hc.action, ProductAction::Updated);
    assert_eq!(hc.variant.as_ref().unwrap().id, hardcover);
    assert_eq!(
        success_for(&events, "PB").unwrap().product.action,
        ProductAction::Deleted
    );
}

#[tokio::test]
async fn test_wrapper_without_variants_stays_disabled() {
    let catalog = FakeCatalog::new();
    let wrapper = catalog.insert_product(50, "HC-W", true);
    catalog.add_option(wrapper, "Options", &["Hardcover"]);
    catalog.add_variant(wrapper, "HC", "Hardcover");

    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "encodingFormat": "Hardcover", "availability": "not-available"},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    sync.sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    let product = catalog.product(wrapper).unwrap();
    assert!(!product.is_visible);
    assert!(product.variants.is_empty());
    assert_eq!(catalog.count(Op::UpsertVariants), 0);
    assert!(
        !catalog
            .calls()
            .iter()
            .any(|c| c.op == Op::SetVisibility && c.detail == "true")
    );
    assert_eq!(
        success_for(&events, "HC").unwrap().product.action,
        ProductAction::Deleted
    );
}

#[tokio::test]
async fn test_wrapper_failure_reported_per_member() {
    let catalog = FakeCatalog::new();
    catalog.insert_product(50, "HC-W", true);
    catalog.fail(Op::SetVisibility, Some("50"), 500);

    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "encodingFormat": "Hardcover", "isDefault": true},
        {"sku": "PB", "encodingFormat": "Paperback"},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    let summary = sync
        .sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 2);

    let failed = failures(&events);
    let identifiers: Vec<&str> = failed.iter().map(|f| f.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["HC", "PB"]);
    for failure in failed {
        assert_eq!(failure.scope, FailureScope::DisableProduct);
        assert_eq!(failure.data["wrapper_sku"], "HC-W");
        assert_eq!(failure.data["product_id"], 50);
    }

    // Nothing is written to a wrapper that could not be hidden.
    assert_eq!(catalog.count(Op::UpdateProduct), 0);
    assert_eq!(catalog.count(Op::UpsertVariants), 0);
}

#[tokio::test]
async fn test_not_purchasable_format_disables_purchasing() {
    let catalog = FakeCatalog::new();
    let settings = SyncSettings {
        not_purchasable_formats: vec!["Audio CD".to_string()],
        ..variant_settings()
    };
    let sync = orchestrator(&catalog, settings);
    let input = bundle(json!({"products": [
        {"sku": "HC", "encodingFormat": "Hardcover", "isDefault": true},
        {"sku": "CD", "encodingFormat": "Audio CD"},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    sync.sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    let product = catalog.product_by_sku("HC-W").unwrap();
    let disabled: Vec<(&str, bool)> = product
        .variants
        .iter()
        .map(|v| (v.sku.as_str(), v.purchasing_disabled))
        .collect();
    assert_eq!(disabled, vec![("HC", false), ("CD", true)]);
    assert_eq!(successes(&events).len(), 2);
}

#[tokio::test]
async fn test_lone_wrapper_drops_stale_link() {
    let catalog = FakeCatalog::new();
    let wrapper = catalog.insert_product(50, "HC-W", true);
    catalog.add_custom_field(wrapper, "related_product_id", "77");

    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "encodingFormat": "Hardcover", "isDefault": true},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    sync.sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    let product = catalog.product(wrapper).unwrap();
    assert!(product.is_visible);
    assert!(product.custom_field("related_product_id").is_none());
    assert!(failures(&events).is_empty());
}

#[tokio::test]
async fn test_disabled_wrapper_drops_its_link() {
    let catalog = FakeCatalog::new();
    let wrapper = catalog.insert_product(50, "HC-W", true);
    catalog.add_custom_field(wrapper, "related_product_id", "77");
    catalog.add_option(wrapper, "Options", &["Hardcover"]);
    catalog.add_variant(wrapper, "HC", "Hardcover");

    let sync = orchestrator(&catalog, variant_settings());
    let input = bundle(json!({"products": [
        {"sku": "HC", "encodingFormat": "Hardcover", "availability": "not-available"},
    ]}));

    let mut events: Vec<SyncEvent> = Vec::new();
    sync.sync_bundle_at(&input, fixed_now(), &mut events)
        .await
        .unwrap();

    let product = catalog.product(wrapper).unwrap();
    assert!(!product.is_visible);
    assert!(product.custom_field("related_product_id").is_none());
    assert_eq!(catalog.count(Op::DeleteCustomField), 1);
    assert!(failures(&events).is_empty());
}
