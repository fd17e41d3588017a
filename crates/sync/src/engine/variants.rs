//! Variant mode: each half of a bundle is one wrapper product whose formats
//! are variants of a single option.
//!
//! Per wrapper the order is fixed:
//!
//! ```text
//! disable -> save wrapper -> fields -> option -> delete values -> read variants
//!         -> upsert variants -> enable
//! ```
//!
//! Deleting option values also deletes their variants, so the variant read
//! has to come after the deletes.

use std::collections::HashSet;

use catalog_sync_core::fields::{FieldUpsert, desired_fields, reconcile};
use catalog_sync_core::linker::{LinkAction, LinkTarget, is_link_field, link_pair, unlink};
use catalog_sync_core::mapper::{MappingContext, map_wrapper};
use catalog_sync_core::variants::{
    VARIANT_OPTION_NAME, VariantError, diff_option_values, map_option, map_variant,
};
use catalog_sync_core::{
    CustomField, CustomFieldPayload, MetafieldPayload, ProductBundle, ProductId, ProductOption,
    ProductPayload, RemoteProduct, SourceProduct, SubBundle, SubBundleKind, Variant, VariantPayload,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use super::{Orchestrator, set_reported_field};
use crate::catalog::CatalogClient;
use crate::error::{FailureScope, ItemFailure, SyncError};
use crate::report::{ProductAction, ProductResult, Recorder};

/// Data key naming the wrapper when a wrapper failure is reported per member.
const WRAPPER_SKU_KEY: &str = "wrapper_sku";

/// A wrapper whose option graph has been settled, before its variants.
struct PreparedWrapper {
    product: RemoteProduct,
    /// Link fields present before this run.
    link_fields: Vec<CustomField>,
    custom_fields: Vec<CustomFieldPayload>,
    meta_fields: Vec<MetafieldPayload>,
    option: Option<ProductOption>,
    deleted_labels: HashSet<String>,
    variants: Vec<Variant>,
}

/// A wrapper that made it through, waiting to be linked and reported.
struct WrapperOutcome {
    kind: SubBundleKind,
    sku: String,
    product_id: ProductId,
    link_fields: Vec<CustomField>,
    enabled: bool,
    results: Vec<ProductResult>,
}

impl<C: CatalogClient> Orchestrator<C> {
    pub(super) async fn sync_variants(
        &self,
        bundle: &ProductBundle,
        now: DateTime<Utc>,
        recorder: &mut Recorder<'_>,
    ) -> Result<(), SyncError> {
        let halves = bundle.split();
        let wrapper_skus: Vec<String> = halves.iter().filter_map(SubBundle::wrapper_sku).collect();
        let mut existing = self.lookup(&wrapper_skus, recorder).await?;

        let skus = bundle.skus();
        let ctx = MappingContext::new(&self.settings, now).with_search_terms(&skus);

        let mut outcomes = Vec::new();
        for half in &halves {
            let Some(sku) = half.wrapper_sku() else {
                continue;
            };
            if !half.has_unique_default() {
                tracing::warn!(
                    wrapper_sku = %sku,
                    kind = ?half.kind,
                    "no unique default member, using {}",
                    half.default_member().map_or("none", |m| m.sku.as_str())
                );
            }
            let remote = existing.remove(&sku);
            if let Some(outcome) = self.sync_wrapper(half, sku, remote, &ctx, recorder).await {
                outcomes.push(outcome);
            }
        }

        self.link_wrappers(&mut outcomes, recorder).await;

        for outcome in outcomes {
            for result in outcome.results {
                recorder.success(result);
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(wrapper_sku = %sku, kind = ?half.kind))]
    async fn sync_wrapper(
        &self,
        half: &SubBundle<'_>,
        sku: String,
        remote: Option<RemoteProduct>,
        ctx: &MappingContext<'_>,
        recorder: &mut Recorder<'_>,
    ) -> Option<WrapperOutcome> {
        let (purchasable, retired): (Vec<&SourceProduct>, Vec<&SourceProduct>) =
            half.members.iter().copied().partition(|m| m.is_purchasable());

        if purchasable.is_empty() && remote.is_none() {
            tracing::debug!("no purchasable members and no wrapper");
            for member in &half.members {
                recorder.success(ProductResult {
                    raw_item: (*member).clone(),
                    remote_product: None,
                    custom_fields: Vec::new(),
                    meta_fields: Vec::new(),
                    action: ProductAction::Skipped,
                    variant: None,
                });
            }
            return None;
        }

        let (Some(default), Some(payload)) =
            (half.default_member(), map_wrapper(half, remote.as_ref(), ctx))
        else {
            return None;
        };
        let labels = option_labels(&purchasable);
        let prepared = match self
            .prepare_wrapper(&sku, default, payload, remote, &labels)
            .await
        {
            Ok(prepared) => prepared,
            Err(failure) => {
                fail_members(recorder, &half.members, &failure);
                return None;
            }
        };
        let product_id = prepared.product.id;

        let mut mapped: Vec<(&SourceProduct, VariantPayload)> = Vec::new();
        for &member in &purchasable {
            let payload = match prepared.option.as_ref() {
                Some(option) => map_variant(
                    member,
                    product_id,
                    option,
                    &prepared.variants,
                    &self.settings,
                ),
                None => Err(VariantError::MissingLabel {
                    sku: member.sku.clone(),
                }),
            };
            match payload {
                Ok(payload) => mapped.push((member, payload)),
                Err(e) => recorder.failure(
                    ItemFailure::new(FailureScope::UpsertVariants, &member.sku, e)
                        .with_data(json!({ WRAPPER_SKU_KEY: sku, "product_id": product_id })),
                ),
            }
        }

        let saved = if mapped.is_empty() {
            Vec::new()
        } else {
            let payloads: Vec<VariantPayload> = mapped.iter().map(|(_, p)| p.clone()).collect();
            match self.client.upsert_variants(&payloads).await {
                Ok(saved) => saved,
                Err(e) => {
                    let failure = ItemFailure::new(FailureScope::UpsertVariants, &sku, e)
                        .with_data(json!({ "product_id": product_id }));
                    let members: Vec<&SourceProduct> = mapped.iter().map(|(m, _)| *m).collect();
                    fail_members(recorder, &members, &failure);
                    mapped.clear();
                    Vec::new()
                }
            }
        };

        let mut product = prepared.product;
        let mut enabled = false;
        if saved.is_empty() {
            tracing::warn!(%product_id, "no variants saved, wrapper left disabled");
        } else {
            match self.client.set_product_visibility(product_id, true).await {
                Ok(visible) => {
                    tracing::info!(%product_id, variants = saved.len(), "wrapper enabled");
                    product = visible;
                    enabled = true;
                }
                Err(e) => {
                    let failure = ItemFailure::new(FailureScope::EnableProduct, &sku, e)
                        .with_data(json!({ "product_id": product_id }));
                    let members: Vec<&SourceProduct> = mapped.iter().map(|(m, _)| *m).collect();
                    fail_members(recorder, &members, &failure);
                    mapped.clear();
                }
            }
        }

        let result = |member: &SourceProduct, action, variant| ProductResult {
            raw_item: member.clone(),
            remote_product: Some(product.clone()),
            custom_fields: prepared.custom_fields.clone(),
            meta_fields: prepared.meta_fields.clone(),
            action,
            variant,
        };

        let mut results = Vec::new();
        for (member, payload) in &mapped {
            let action = if payload.id.is_some() {
                ProductAction::Updated
            } else {
                ProductAction::Created
            };
            let variant = saved.iter().find(|v| v.sku == member.sku).cloned();
            results.push(result(*member, action, variant));
        }
        for member in &retired {
            let action = if member
                .option_label()
                .is_some_and(|label| prepared.deleted_labels.contains(&label))
            {
                ProductAction::Deleted
            } else {
                ProductAction::Skipped
            };
            results.push(result(*member, action, None));
        }

        Some(WrapperOutcome {
            kind: half.kind,
            sku,
            product_id,
            link_fields: prepared.link_fields,
            enabled,
            results,
        })
    }

    /// Everything up to and including the variant read.
    ///
    /// Any failure leaves the wrapper disabled.
    async fn prepare_wrapper(
        &self,
        sku: &str,
        default: &SourceProduct,
        mut payload: ProductPayload,
        remote: Option<RemoteProduct>,
        labels: &[String],
    ) -> Result<PreparedWrapper, ItemFailure> {
        if let Some(remote) = &remote {
            self.client
                .set_product_visibility(remote.id, false)
                .await
                .map_err(|e| {
                    ItemFailure::new(FailureScope::DisableProduct, sku, e)
                        .with_data(json!({ "product_id": remote.id }))
                })?;
            tracing::info!(product_id = %remote.id, "wrapper disabled");
        }

        payload.is_visible = false;

        let (product, fields_before, option_before) = match remote {
            Some(remote) => {
                let product = self
                    .client
                    .update_product(remote.id, &payload)
                    .await
                    .map_err(|e| {
                        ItemFailure::new(FailureScope::UpsertProducts, sku, e)
                            .with_data(json!({ "product_id": remote.id }))
                    })?;
                let option = remote.option(VARIANT_OPTION_NAME).cloned();
                (product, remote.custom_fields, option)
            }
            None => {
                let product = self.client.create_product(&payload).await.map_err(|e| {
                    ItemFailure::new(FailureScope::CreateProduct, sku, e)
                        .with_data(json!({ "name": payload.name }))
                })?;
                tracing::info!(product_id = %product.id, "wrapper created");
                let fields = product.custom_fields.clone();
                (product, fields, None)
            }
        };
        let product_id = product.id;

        let (link_fields, owned): (Vec<CustomField>, Vec<CustomField>) = fields_before
            .into_iter()
            .partition(|f| is_link_field(&f.name));
        let custom_fields = self
            .sync_wrapper_fields(product_id, default, &owned, sku)
            .await?;
        let meta_fields = self.sync_metafields(product_id, default, sku).await?;

        let diff = diff_option_values(option_before.as_ref(), labels);
        let option = if labels.is_empty() {
            option_before.clone()
        } else {
            let option = self
                .client
                .upsert_option(product_id, &map_option(product_id, option_before.as_ref(), &diff))
                .await
                .map_err(|e| {
                    ItemFailure::new(FailureScope::UpsertOption, sku, e)
                        .with_data(json!({ "product_id": product_id, "labels": labels }))
                })?;
            Some(option)
        };

        let mut deleted_labels = HashSet::new();
        if let Some(option_id) = option_before.as_ref().map(|o| o.id) {
            for value in &diff.delete {
                self.client
                    .delete_option_value(product_id, option_id, value.id)
                    .await
                    .map_err(|e| {
                        ItemFailure::new(FailureScope::DeleteOptionValues, sku, e).with_data(
                            json!({ "product_id": product_id, "option_value_id": value.id, "label": value.label }),
                        )
                    })?;
                deleted_labels.insert(value.label.clone());
            }
        }
        if !deleted_labels.is_empty() {
            tracing::info!(%product_id, deleted = deleted_labels.len(), "option values deleted");
        }

        let variants = self.client.list_variants(product_id).await.map_err(|e| {
            ItemFailure::new(FailureScope::UpsertVariants, sku, e)
                .with_data(json!({ "product_id": product_id }))
        })?;

        Ok(PreparedWrapper {
            product,
            link_fields,
            custom_fields,
            meta_fields,
            option,
            deleted_labels,
            variants,
        })
    }

    /// Converge a wrapper's own custom fields one call at a time.
    async fn sync_wrapper_fields(
        &self,
        product_id: ProductId,
        default: &SourceProduct,
        owned: &[CustomField],
        sku: &str,
    ) -> Result<Vec<CustomFieldPayload>, ItemFailure> {
        let desired = desired_fields(&self.settings.custom_fields, default);
        let changes = reconcile(&desired, owned, None);

        for field in &changes.deletes {
            self.client
                .delete_custom_field(product_id, field.id)
                .await
                .map_err(|e| {
                    ItemFailure::new(FailureScope::DeleteCustomFields, sku, e).with_data(
                        json!({ "product_id": product_id, "custom_field_id": field.id, "name": field.name }),
                    )
                })?;
        }

        let mut state: Vec<CustomFieldPayload> = changes
            .unchanged
            .iter()
            .map(|f| {
                FieldUpsert {
                    id: Some(f.id),
                    name: f.name.clone(),
                    value: f.value.clone(),
                }
                .into_custom_field()
            })
            .collect();

        for upsert in changes.upserts {
            let mut field = upsert.into_custom_field();
            let saved = self
                .client
                .upsert_custom_field(product_id, &field)
                .await
                .map_err(|e| {
                    ItemFailure::new(FailureScope::UpdateFields, sku, e)
                        .with_data(json!({ "product_id": product_id, "name": field.name }))
                })?;
            field.id = Some(saved.id);
            state.push(field);
        }

        Ok(state)
    }

    /// Cross-reference the enabled wrappers through `related_product_id`.
    ///
    /// A wrapper left disabled loses its own reference too.
    async fn link_wrappers(&self, outcomes: &mut [WrapperOutcome], recorder: &mut Recorder<'_>) {
        let actions = {
            let mut targets = outcomes
                .iter()
                .filter(|o| o.enabled)
                .map(|o| LinkTarget::new(o.product_id, &o.link_fields));
            let mut actions = link_pair(targets.next(), targets.next());
            actions.extend(
                outcomes
                    .iter()
                    .filter(|o| !o.enabled)
                    .filter_map(|o| unlink(&LinkTarget::new(o.product_id, &o.link_fields))),
            );
            actions
        };

        for action in actions {
            let Some(outcome) = outcomes.iter_mut().find(|o| o.product_id == action.product_id())
            else {
                continue;
            };
            match action {
                LinkAction::Upsert { product_id, field } => {
                    match self.client.upsert_custom_field(product_id, &field).await {
                        Ok(saved) => {
                            let field = CustomFieldPayload {
                                id: Some(saved.id),
                                ..field
                            };
                            for result in &mut outcome.results {
                                set_reported_field(&mut result.custom_fields, field.clone());
                            }
                            tracing::info!(%product_id, related = %field.value, kind = ?outcome.kind, "wrapper linked");
                        }
                        Err(e) => recorder.failure(
                            ItemFailure::new(FailureScope::SetRelatedProductIds, &outcome.sku, e)
                                .with_data(json!({ "product_id": product_id, "value": field.value })),
                        ),
                    }
                }
                LinkAction::Delete {
                    product_id,
                    field_id,
                } => {
                    if let Err(e) = self.client.delete_custom_field(product_id, field_id).await {
                        recorder.failure(
                            ItemFailure::new(FailureScope::SetRelatedProductIds, &outcome.sku, e)
                                .with_data(json!({ "product_id": product_id, "custom_field_id": field_id })),
                        );
                    }
                }
            }
        }
    }
}

/// Option labels of the purchasable members, first occurrence wins.
fn option_labels(members: &[&SourceProduct]) -> Vec<String> {
    let mut seen = HashSet::new();
    members
        .iter()
        .filter_map(|m| m.option_label())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

/// Report a wrapper-level failure once per affected member.
fn fail_members(recorder: &mut Recorder<'_>, members: &[&SourceProduct], failure: &ItemFailure) {
    for member in members {
        recorder.failure(failure.reassign(&member.sku, WRAPPER_SKU_KEY));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn member(sku: &str, format: &str) -> SourceProduct {
        serde_json::from_value(json!({"sku": sku, "encodingFormat": format})).unwrap()
    }

    #[test]
    fn test_option_labels_deduplicated_in_order() {
        let a = member("A", "Hardcover");
        let b = member("B", "Paperback");
        let c = member("C", "Hardcover");
        let d: SourceProduct = serde_json::from_value(json!({"sku": "D"})).unwrap();

        let labels = option_labels(&[&a, &b, &c, &d]);

        assert_eq!(labels, vec!["Hardcover", "Paperback"]);
    }
}
