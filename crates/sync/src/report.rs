//! Result events emitted per processed item.
//!
//! Every source item yields exactly one event: a success carrying the final
//! remote state, or a failure carrying the step that failed. Events go to an
//! [`EventSink`] as they happen so a partially failed bundle still reports
//! every item that made it.

use catalog_sync_core::{
    CustomFieldPayload, MetafieldPayload, RemoteProduct, SourceProduct, SyncMode, Variant,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::error::{FailureScope, ItemFailure};

/// Status reported on success events.
pub const SUCCESS_STATUS: u16 = 200;

/// What happened to a source item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductAction {
    Created,
    Updated,
    Deleted,
    /// Unavailable and absent from the catalog; nothing to do.
    Skipped,
}

/// Final state of one successfully processed item.
#[derive(Debug, Clone, Serialize)]
pub struct ProductResult {
    pub raw_item: SourceProduct,
    pub remote_product: Option<RemoteProduct>,
    pub custom_fields: Vec<CustomFieldPayload>,
    pub meta_fields: Vec<MetafieldPayload>,
    pub action: ProductAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
}

/// Success event body.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessEvent {
    pub status: u16,
    pub product: ProductResult,
}

/// Failure event body.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    pub status: u16,
    pub scope: FailureScope,
    pub message: String,
    pub identifier: String,
    pub data: Value,
}

/// One result event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SyncEvent {
    Success(SuccessEvent),
    Failure(FailureEvent),
}

impl SyncEvent {
    #[must_use]
    pub const fn success(product: ProductResult) -> Self {
        Self::Success(SuccessEvent {
            status: SUCCESS_STATUS,
            product,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure scope, for failure events.
    #[must_use]
    pub const fn scope(&self) -> Option<FailureScope> {
        match self {
            Self::Failure(f) => Some(f.scope),
            Self::Success(_) => None,
        }
    }

    /// SKU of the source item behind a success event, or the identifier of
    /// a failure.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Success(s) => &s.product.raw_item.sku,
            Self::Failure(f) => &f.identifier,
        }
    }
}

impl From<ItemFailure> for SyncEvent {
    fn from(failure: ItemFailure) -> Self {
        Self::Failure(FailureEvent {
            status: failure.status,
            scope: failure.scope,
            message: failure.source.to_string(),
            identifier: failure.identifier,
            data: failure.data,
        })
    }
}

/// Receives result events as they are produced.
pub trait EventSink {
    fn emit(&mut self, event: SyncEvent);
}

impl EventSink for Vec<SyncEvent> {
    fn emit(&mut self, event: SyncEvent) {
        self.push(event);
    }
}

/// Outcome counts for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSummary {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub succeeded: usize,
    pub failed: usize,
}

/// Sink wrapper that counts what passes through and logs failures.
pub(crate) struct Recorder<'a> {
    sink: &'a mut dyn EventSink,
    pub(crate) summary: BundleSummary,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(sink: &'a mut dyn EventSink, run_id: Uuid, mode: SyncMode) -> Self {
        Self {
            sink,
            summary: BundleSummary {
                run_id,
                mode,
                succeeded: 0,
                failed: 0,
            },
        }
    }

    pub(crate) fn success(&mut self, product: ProductResult) {
        self.summary.succeeded += 1;
        self.sink.emit(SyncEvent::success(product));
    }

    pub(crate) fn failure(&mut self, failure: ItemFailure) {
        tracing::error!(
            scope = %failure.scope,
            identifier = %failure.identifier,
            status = failure.status,
            error = %failure.source,
            "item failed"
        );
        self.summary.failed += 1;
        self.sink.emit(failure.into());
    }

    /// Report a failed bundle lookup. The caller aborts the bundle.
    pub(crate) fn lookup_failed(&mut self, skus: &[String], error: &CatalogError) {
        tracing::error!(skus = %skus.join(","), error = %error, "product lookup failed");
        self.summary.failed += 1;
        self.sink.emit(SyncEvent::Failure(FailureEvent {
            status: error.status_code(),
            scope: FailureScope::LookupProducts,
            message: error.to_string(),
            identifier: skus.join(","),
            data: serde_json::json!({ "skus": skus }),
        }));
    }

    pub(crate) fn finish(self) -> BundleSummary {
        self.summary
    }
}
