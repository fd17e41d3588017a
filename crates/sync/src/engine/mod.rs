//! Bundle orchestration.
//!
//! [`Orchestrator::sync_bundle`] drives one bundle end to end:
//!
//! ```text
//! LOOKUP -> CLASSIFY -> {CREATE | UPDATE | DELETE}* -> LINK -> ENABLE/EMIT
//! ```
//!
//! Items are processed one after another. The lookup is the only step whose
//! failure aborts the bundle; every other failure is reported as an event
//! and the item is dropped from later steps.

mod siblings;
mod variants;

use std::collections::HashMap;

use catalog_sync_core::fields::{FieldUpsert, desired_fields, reconcile};
use catalog_sync_core::mapper::{MappingContext, map_product, map_wrapper};
use catalog_sync_core::{
    CustomField, CustomFieldPayload, MetafieldPayload, ProductBundle, ProductId, ProductPayload,
    RemoteProduct, SourceProduct, SyncMode, SyncSettings,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{Span, instrument};
use uuid::Uuid;

use crate::catalog::{CatalogClient, CatalogError};
use crate::error::{FailureScope, ItemFailure, SyncError};
use crate::report::{BundleSummary, EventSink, Recorder};

/// Reconciles bundles against a catalog.
#[derive(Debug, Clone)]
pub struct Orchestrator<C> {
    client: C,
    settings: SyncSettings,
}

impl<C: CatalogClient> Orchestrator<C> {
    /// Create an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Settings`] if the settings do not validate.
    pub fn new(client: C, settings: SyncSettings) -> Result<Self, SyncError> {
        settings.validate()?;
        Ok(Self { client, settings })
    }

    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Reconcile one bundle, emitting one event per item into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Lookup`] if the existing products could not be
    /// read. A failure event has already been emitted in that case.
    pub async fn sync_bundle(
        &self,
        bundle: &ProductBundle,
        sink: &mut dyn EventSink,
    ) -> Result<BundleSummary, SyncError> {
        self.sync_bundle_at(bundle, Utc::now(), sink).await
    }

    /// [`Self::sync_bundle`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Lookup`] if the existing products could not be read.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, mode = ?self.settings.mode, items = bundle.products.len()))]
    pub async fn sync_bundle_at(
        &self,
        bundle: &ProductBundle,
        now: DateTime<Utc>,
        sink: &mut dyn EventSink,
    ) -> Result<BundleSummary, SyncError> {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));

        let mut recorder = Recorder::new(sink, run_id, self.settings.mode);

        match self.settings.mode {
            SyncMode::Siblings => self.sync_siblings(bundle, now, &mut recorder).await?,
            SyncMode::Variants => self.sync_variants(bundle, now, &mut recorder).await?,
        }

        let summary = recorder.finish();
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "bundle synced"
        );
        Ok(summary)
    }

    /// Resolve existing products by SKU in one read.
    async fn lookup(
        &self,
        skus: &[String],
        recorder: &mut Recorder<'_>,
    ) -> Result<HashMap<String, RemoteProduct>, SyncError> {
        match self.client.products_by_skus(skus).await {
            Ok(products) => {
                tracing::debug!(found = products.len(), "looked up existing products");
                Ok(products.into_iter().map(|p| (p.sku.clone(), p)).collect())
            }
            Err(source) => {
                recorder.lookup_failed(skus, &source);
                Err(SyncError::Lookup {
                    skus: skus.to_vec(),
                    source,
                })
            }
        }
    }

    /// Converge the metafields this sync owns on one product.
    ///
    /// Without a namespace nothing is owned, so nothing is touched.
    async fn sync_metafields(
        &self,
        product_id: ProductId,
        source: &SourceProduct,
        identifier: &str,
    ) -> Result<Vec<MetafieldPayload>, ItemFailure> {
        let Some(namespace) = self.settings.meta_namespace() else {
            return Ok(Vec::new());
        };
        let fail = |e: CatalogError, data: serde_json::Value| {
            ItemFailure::new(FailureScope::UpsertMetaFields, identifier, e).with_data(data)
        };

        let existing = self
            .client
            .list_metafields(product_id)
            .await
            .map_err(|e| fail(e, json!({ "product_id": product_id })))?;
        let desired = desired_fields(&self.settings.meta_fields, source);
        let changes = reconcile(&desired, &existing, Some(namespace));

        for field in &changes.deletes {
            self.client
                .delete_metafield(product_id, field.id)
                .await
                .map_err(|e| {
                    fail(e, json!({ "product_id": product_id, "metafield_id": field.id }))
                })?;
        }

        let mut state: Vec<MetafieldPayload> = changes
            .unchanged
            .iter()
            .map(|f| {
                FieldUpsert {
                    id: Some(f.id),
                    name: f.key.clone(),
                    value: f.value.clone(),
                }
                .into_metafield(namespace)
            })
            .collect();

        for upsert in changes.upserts {
            let mut payload = upsert.into_metafield(namespace);
            let saved = self
                .client
                .upsert_metafield(product_id, &payload)
                .await
                .map_err(|e| fail(e, json!({ "product_id": product_id, "key": payload.key })))?;
            payload.id = Some(saved.id);
            state.push(payload);
        }

        tracing::debug!(%product_id, deleted = changes.deletes.len(), "metafields synced");
        Ok(state)
    }
}

/// Map a bundle to the product payloads a sync would write, without any
/// remote state.
#[must_use]
pub fn preview(
    settings: &SyncSettings,
    bundle: &ProductBundle,
    now: DateTime<Utc>,
) -> Vec<ProductPayload> {
    let skus = bundle.skus();
    let ctx = MappingContext::new(settings, now).with_search_terms(&skus);

    match settings.mode {
        SyncMode::Siblings => bundle
            .products
            .iter()
            .filter(|p| p.is_purchasable())
            .map(|p| {
                let mut payload = map_product(p, None, &ctx);
                payload.custom_fields = new_custom_fields(settings, p);
                payload
            })
            .collect(),
        SyncMode::Variants => bundle
            .split()
            .iter()
            .filter_map(|half| {
                let default = half.default_member()?;
                let mut payload = map_wrapper(half, None, &ctx)?;
                payload.custom_fields = new_custom_fields(settings, default);
                Some(payload)
            })
            .collect(),
    }
}

/// Custom fields for a product that has none yet.
fn new_custom_fields(settings: &SyncSettings, source: &SourceProduct) -> Vec<CustomFieldPayload> {
    let desired = desired_fields(&settings.custom_fields, source);
    reconcile::<CustomField>(&desired, &[], None)
        .upserts
        .into_iter()
        .map(FieldUpsert::into_custom_field)
        .collect()
}

/// Insert or replace a field by name in a reported field list.
fn set_reported_field(fields: &mut Vec<CustomFieldPayload>, field: CustomFieldPayload) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_sync_core::settings::FieldRule;
    use chrono::TimeZone;

    fn bundle() -> ProductBundle {
        serde_json::from_value(json!({
            "products": [
                {"sku": "HC", "name": "Widget", "isDefault": true, "additionalProperty": [{"propertyID": "audience", "value": "adult"}]},
                {"sku": "PB", "name": "Widget", "availability": "not-available"},
                {"sku": "EB", "name": "Widget", "isDigital": true, "isDefault": true}
            ]
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_preview_siblings_skips_unavailable() {
        let settings = SyncSettings {
            custom_fields: vec![FieldRule::additional_property("audience", "audience")],
            ..SyncSettings::default()
        };

        let payloads = preview(&settings, &bundle(), now());

        let skus: Vec<_> = payloads.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["HC", "EB"]);
        assert_eq!(payloads.first().unwrap().custom_fields.len(), 1);
        assert_eq!(payloads.get(1).unwrap().name, "Widget (Digital)");
    }

    #[test]
    fn test_preview_variants_maps_wrappers() {
        let settings = SyncSettings {
            mode: SyncMode::Variants,
            ..SyncSettings::default()
        };

        let payloads = preview(&settings, &bundle(), now());

        let skus: Vec<_> = payloads.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["HC-W", "EB-W"]);
    }

    #[test]
    fn test_set_reported_field_replaces_by_name() {
        let mut fields = vec![CustomFieldPayload {
            id: None,
            name: "related_product_ids".to_string(),
            value: "1".to_string(),
        }];
        set_reported_field(
            &mut fields,
            CustomFieldPayload {
                id: None,
                name: "related_product_ids".to_string(),
                value: "1,2".to_string(),
            },
        );
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.first().unwrap().value, "1,2");
    }
}
