//! Sibling mode: every format is its own product.

use catalog_sync_core::fields::{FieldUpsert, desired_fields, reconcile};
use catalog_sync_core::linker::{LinkAction, LinkTarget, is_link_field, link_siblings};
use catalog_sync_core::mapper::{MappingContext, map_product};
use catalog_sync_core::{
    CustomField, CustomFieldPayload, ProductBundle, ProductId, ProductPayload, RemoteProduct,
    SourceProduct,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use super::{Orchestrator, set_reported_field};
use crate::catalog::{CatalogClient, PRODUCT_BATCH_LIMIT};
use crate::error::{FailureScope, ItemFailure, SyncError};
use crate::report::{ProductAction, ProductResult, Recorder};

/// An item that has a remote id and is waiting for the batch upsert.
struct Pending<'a> {
    source: &'a SourceProduct,
    action: ProductAction,
    product_id: ProductId,
    payload: ProductPayload,
    /// Remote custom fields before this run, link fields included.
    remote_fields: Vec<CustomField>,
    /// Custom fields as they will be once the batch lands.
    reported_fields: Vec<CustomFieldPayload>,
    /// Visibility to put back if the batch does not land.
    visible: bool,
}

impl<C: CatalogClient> Orchestrator<C> {
    pub(super) async fn sync_siblings(
        &self,
        bundle: &ProductBundle,
        now: DateTime<Utc>,
        recorder: &mut Recorder<'_>,
    ) -> Result<(), SyncError> {
        let skus = bundle.skus();
        let mut existing = self.lookup(&skus, recorder).await?;
        let ctx = MappingContext::new(&self.settings, now).with_search_terms(&skus);

        let mut pending = Vec::new();
        for source in &bundle.products {
            let remote = existing.remove(&source.sku);
            match (source.is_purchasable(), remote) {
                (false, Some(remote)) => self.delete_item(source, remote, recorder).await,
                (false, None) => {
                    tracing::debug!(sku = %source.sku, "unavailable and not in catalog");
                    recorder.success(ProductResult {
                        raw_item: source.clone(),
                        remote_product: None,
                        custom_fields: Vec::new(),
                        meta_fields: Vec::new(),
                        action: ProductAction::Skipped,
                        variant: None,
                    });
                }
                (true, None) => {
                    if let Some(item) = self.create_item(source, &ctx, recorder).await {
                        pending.push(item);
                    }
                }
                (true, Some(remote)) => {
                    if let Some(item) = self.prepare_update(source, remote, &ctx, recorder).await {
                        pending.push(item);
                    }
                }
            }
        }

        self.link(&mut pending, recorder).await;
        self.upsert_batch(pending, recorder).await;
        Ok(())
    }

    #[instrument(skip_all, fields(sku = %source.sku, product_id = %remote.id))]
    async fn delete_item(
        &self,
        source: &SourceProduct,
        remote: RemoteProduct,
        recorder: &mut Recorder<'_>,
    ) {
        match self.client.delete_product(remote.id).await {
            Ok(()) => {
                tracing::info!("deleted unavailable product");
                recorder.success(ProductResult {
                    raw_item: source.clone(),
                    remote_product: Some(remote),
                    custom_fields: Vec::new(),
                    meta_fields: Vec::new(),
                    action: ProductAction::Deleted,
                    variant: None,
                });
            }
            Err(e) => recorder.failure(
                ItemFailure::new(FailureScope::DeleteProduct, &source.sku, e)
                    .with_data(json!({ "product_id": remote.id })),
            ),
        }
    }

    /// Create a hidden product with its custom fields.
    ///
    /// The batch upsert makes it visible once it is linked.
    #[instrument(skip_all, fields(sku = %source.sku))]
    async fn create_item<'a>(
        &self,
        source: &'a SourceProduct,
        ctx: &MappingContext<'_>,
        recorder: &mut Recorder<'_>,
    ) -> Option<Pending<'a>> {
        let desired = desired_fields(&self.settings.custom_fields, source);
        let fields: Vec<CustomFieldPayload> = reconcile::<CustomField>(&desired, &[], None)
            .upserts
            .into_iter()
            .map(FieldUpsert::into_custom_field)
            .collect();

        let mut payload = map_product(source, None, ctx);
        let mut create = payload.clone();
        create.is_visible = false;
        create.custom_fields.clone_from(&fields);

        match self.client.create_product(&create).await {
            Ok(created) => {
                tracing::info!(product_id = %created.id, "created product");
                payload.id = Some(created.id);
                let visible = payload.is_visible;
                Some(Pending {
                    source,
                    action: ProductAction::Created,
                    product_id: created.id,
                    payload,
                    remote_fields: created.custom_fields,
                    reported_fields: fields,
                    visible,
                })
            }
            Err(e) => {
                recorder.failure(
                    ItemFailure::new(FailureScope::CreateProduct, &source.sku, e)
                        .with_data(json!({ "name": create.name })),
                );
                None
            }
        }
    }

    /// Hide an existing product and remove its obsolete custom fields.
    ///
    /// Remaining field writes travel inline with the batch payload.
    #[instrument(skip_all, fields(sku = %source.sku, product_id = %remote.id))]
    async fn prepare_update<'a>(
        &self,
        source: &'a SourceProduct,
        remote: RemoteProduct,
        ctx: &MappingContext<'_>,
        recorder: &mut Recorder<'_>,
    ) -> Option<Pending<'a>> {
        if let Err(e) = self.client.set_product_visibility(remote.id, false).await {
            recorder.failure(
                ItemFailure::new(FailureScope::DisableProduct, &source.sku, e)
                    .with_data(json!({ "product_id": remote.id })),
            );
            return None;
        }

        let desired = desired_fields(&self.settings.custom_fields, source);
        let owned: Vec<CustomField> = remote
            .custom_fields
            .iter()
            .filter(|f| !is_link_field(&f.name))
            .cloned()
            .collect();
        let changes = reconcile(&desired, &owned, None);

        for field in &changes.deletes {
            if let Err(e) = self.client.delete_custom_field(remote.id, field.id).await {
                let restored = self.restore_visibility(remote.id, remote.is_visible).await;
                recorder.failure(
                    ItemFailure::new(FailureScope::DeleteCustomFields, &source.sku, e).with_data(json!({
                        "product_id": remote.id,
                        "custom_field_id": field.id,
                        "name": field.name,
                        "left_hidden": !restored,
                    })),
                );
                return None;
            }
        }

        let mut payload = map_product(source, Some(&remote), ctx);
        payload.custom_fields = changes
            .upserts
            .iter()
            .cloned()
            .map(FieldUpsert::into_custom_field)
            .collect();
        let reported_fields = changes
            .desired_state()
            .into_iter()
            .map(FieldUpsert::into_custom_field)
            .collect();

        tracing::info!(
            deleted_fields = changes.deletes.len(),
            changed_fields = changes.upserts.len(),
            "prepared product update"
        );
        Some(Pending {
            source,
            action: ProductAction::Updated,
            product_id: remote.id,
            payload,
            remote_fields: remote.custom_fields,
            reported_fields,
            visible: remote.is_visible,
        })
    }

    /// Show a product that was hidden for a write that did not land.
    ///
    /// Products hidden before the run stay hidden. Returns `false` if the
    /// product should be visible but could not be shown again.
    async fn restore_visibility(&self, product_id: ProductId, visible: bool) -> bool {
        if !visible {
            return true;
        }
        match self.client.set_product_visibility(product_id, true).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%product_id, error = %e, "product left hidden");
                false
            }
        }
    }

    /// Attach `related_product_ids` to every pending payload.
    async fn link(&self, pending: &mut [Pending<'_>], recorder: &mut Recorder<'_>) {
        let actions = {
            let targets: Vec<LinkTarget<'_>> = pending
                .iter()
                .map(|p| LinkTarget::new(p.product_id, &p.remote_fields))
                .collect();
            link_siblings(&targets)
        };

        for action in actions {
            let Some(item) = pending.iter_mut().find(|p| p.product_id == action.product_id()) else {
                continue;
            };
            match action {
                LinkAction::Upsert { field, .. } => {
                    set_reported_field(&mut item.reported_fields, field.clone());
                    item.payload.set_custom_field(field);
                }
                LinkAction::Delete {
                    product_id,
                    field_id,
                } => {
                    if let Err(e) = self.client.delete_custom_field(product_id, field_id).await {
                        recorder.failure(
                            ItemFailure::new(FailureScope::SetRelatedProductIds, &item.source.sku, e)
                                .with_data(json!({ "product_id": product_id, "custom_field_id": field_id })),
                        );
                    }
                }
            }
        }

        tracing::debug!(linked = pending.len(), "linked siblings");
    }

    /// Send the pending payloads in batches the catalog accepts, then settle
    /// metafields and report each item.
    async fn upsert_batch(&self, mut pending: Vec<Pending<'_>>, recorder: &mut Recorder<'_>) {
        while !pending.is_empty() {
            let rest = pending.split_off(pending.len().min(PRODUCT_BATCH_LIMIT));
            self.upsert_chunk(pending, recorder).await;
            pending = rest;
        }
    }

    /// One batch request. A failed batch wrote nothing, so its items are
    /// shown again as they were before the run.
    async fn upsert_chunk(&self, pending: Vec<Pending<'_>>, recorder: &mut Recorder<'_>) {
        let payloads: Vec<ProductPayload> = pending.iter().map(|p| p.payload.clone()).collect();
        let mut updated = match self.client.update_products(&payloads).await {
            Ok(products) => products,
            Err(e) => {
                for item in &pending {
                    let restored = self.restore_visibility(item.product_id, item.visible).await;
                    recorder.failure(
                        ItemFailure::new(FailureScope::UpsertProducts, &item.source.sku, e.duplicate())
                            .with_data(json!({ "product_id": item.product_id, "left_hidden": !restored })),
                    );
                }
                return;
            }
        };
        tracing::info!(count = updated.len(), "batch upserted products");

        for item in pending {
            let remote = updated
                .iter()
                .position(|p| p.id == item.product_id)
                .map(|index| updated.swap_remove(index));

            match self
                .sync_metafields(item.product_id, item.source, &item.source.sku)
                .await
            {
                Ok(meta_fields) => recorder.success(ProductResult {
                    raw_item: item.source.clone(),
                    remote_product: remote,
                    custom_fields: item.reported_fields,
                    meta_fields,
                    action: item.action,
                    variant: None,
                }),
                Err(failure) => recorder.failure(failure),
            }
        }
    }
}
