//! Bundle-level and per-item failures.
//!
//! Only a failed lookup aborts a bundle ([`SyncError`]). Everything else is
//! an [`ItemFailure`]: reported as an event while the rest of the bundle
//! carries on.

use std::fmt;

use catalog_sync_core::SettingsError;
use catalog_sync_core::variants::VariantError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that abort a whole bundle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The existing products could not be read, so there is nothing to diff against.
    #[error("failed to look up products [{}]: {source}", .skus.join(", "))]
    Lookup {
        skus: Vec<String>,
        #[source]
        source: CatalogError,
    },

    /// Settings are contradictory.
    #[error("invalid sync settings: {0}")]
    Settings(#[from] SettingsError),
}

/// The step an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureScope {
    LookupProducts,
    DeleteProduct,
    CreateProduct,
    UpdateFields,
    DeleteCustomFields,
    UpsertMetaFields,
    UpsertProducts,
    SetRelatedProductIds,
    EnableProduct,
    DisableProduct,
    UpsertOption,
    DeleteOptionValues,
    UpsertVariants,
}

impl FailureScope {
    /// Wire name of the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LookupProducts => "lookup_products",
            Self::DeleteProduct => "delete_product",
            Self::CreateProduct => "create_product",
            Self::UpdateFields => "update_fields",
            Self::DeleteCustomFields => "delete_custom_fields",
            Self::UpsertMetaFields => "upsert_meta_fields",
            Self::UpsertProducts => "upsert_products",
            Self::SetRelatedProductIds => "set_related_product_ids",
            Self::EnableProduct => "enable_product",
            Self::DisableProduct => "disable_product",
            Self::UpsertOption => "upsert_option",
            Self::DeleteOptionValues => "delete_option_values",
            Self::UpsertVariants => "upsert_variants",
        }
    }
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of an item failure.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Variant(#[from] VariantError),
}

impl ItemError {
    /// HTTP status of the cause, 500 when it did not come from the API.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Catalog(e) => e.status_code(),
            Self::Variant(_) => 500,
        }
    }

    /// Copy for reporting one cause against several items.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Catalog(e) => Self::Catalog(e.duplicate()),
            Self::Variant(e) => Self::Variant(e.clone()),
        }
    }
}

/// One item that failed at one step.
#[derive(Debug, Error)]
#[error("{scope} failed for {identifier}: {source}")]
pub struct ItemFailure {
    /// API status, or 500.
    pub status: u16,
    pub scope: FailureScope,
    /// SKU or remote id of the affected item.
    pub identifier: String,
    /// Context such as the offending field id or payload fragment.
    pub data: Value,
    #[source]
    pub source: ItemError,
}

impl ItemFailure {
    pub fn new(scope: FailureScope, identifier: impl Into<String>, source: impl Into<ItemError>) -> Self {
        let source = source.into();
        Self {
            status: source.status_code(),
            scope,
            identifier: identifier.into(),
            data: Value::Null,
            source,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// The same failure reported against another item.
    ///
    /// The original identifier is kept in `data` under `key`.
    #[must_use]
    pub fn reassign(&self, identifier: impl Into<String>, key: &str) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(key.to_string(), Value::String(self.identifier.clone()));
        if let Value::Object(extra) = &self.data {
            data.extend(extra.clone());
        }
        Self {
            status: self.status,
            scope: self.scope,
            identifier: identifier.into(),
            data: Value::Object(data),
            source: self.source.duplicate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_wire_names() {
        assert_eq!(
            serde_json::to_value(FailureScope::SetRelatedProductIds).ok(),
            Some(json!("set_related_product_ids"))
        );
        assert_eq!(FailureScope::UpsertMetaFields.to_string(), "upsert_meta_fields");
        assert_eq!(
            serde_json::to_value(FailureScope::DeleteOptionValues).ok(),
            Some(json!(FailureScope::DeleteOptionValues.as_str()))
        );
    }

    #[test]
    fn test_item_failure_status() {
        let failure = ItemFailure::new(
            FailureScope::CreateProduct,
            "SKU-2",
            CatalogError::Api {
                status: 409,
                body: "duplicate".to_string(),
            },
        )
        .with_data(json!({"name": "Widget"}));

        assert_eq!(failure.status, 409);
        assert_eq!(
            failure.to_string(),
            "create_product failed for SKU-2: API error: 409 - duplicate"
        );
        assert_eq!(failure.data, json!({"name": "Widget"}));
    }

    #[test]
    fn test_non_api_failure_is_500() {
        let failure = ItemFailure::new(
            FailureScope::UpsertVariants,
            "EB",
            VariantError::MissingLabel {
                sku: "EB".to_string(),
            },
        );
        assert_eq!(failure.status, 500);
    }

    #[test]
    fn test_reassign_keeps_cause_and_context() {
        let failure = ItemFailure::new(
            FailureScope::DisableProduct,
            "HC-W",
            CatalogError::Api {
                status: 503,
                body: "down".to_string(),
            },
        )
        .with_data(json!({"product_id": 7}));

        let member = failure.reassign("HC", "wrapper_sku");

        assert_eq!(member.identifier, "HC");
        assert_eq!(member.status, 503);
        assert_eq!(member.scope, FailureScope::DisableProduct);
        assert_eq!(member.data, json!({"wrapper_sku": "HC-W", "product_id": 7}));
        assert_eq!(member.source.to_string(), failure.source.to_string());
    }

    #[test]
    fn test_lookup_error_lists_skus() {
        let err = SyncError::Lookup {
            skus: vec!["A".to_string(), "B".to_string()],
            source: CatalogError::Unauthorized,
        };
        assert_eq!(
            err.to_string(),
            "failed to look up products [A, B]: Unauthorized: invalid access token"
        );
    }
}
