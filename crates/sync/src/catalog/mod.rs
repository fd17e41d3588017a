//! Remote catalog access.
//!
//! The orchestrator only sees the [`CatalogClient`] trait. [`BigCommerceClient`]
//! implements it over the BigCommerce v3 REST API; tests use an in-memory fake.
//!
//! # API Reference
//!
//! - Base URL: `https://api.bigcommerce.com/stores/{store_hash}/v3`
//! - Authentication: `X-Auth-Client` / `X-Auth-Token` headers
//! - Responses wrap their payload in a `data` envelope

mod client;
mod fields;
mod options;
mod products;

pub use client::BigCommerceClient;
pub use products::PRODUCT_BATCH_LIMIT;

use async_trait::async_trait;
use catalog_sync_core::{
    CustomField, CustomFieldId, CustomFieldPayload, Metafield, MetafieldId, MetafieldPayload,
    OptionId, OptionPayload, OptionValueId, ProductId, ProductOption, ProductPayload,
    RemoteProduct, Variant, VariantPayload,
};
use thiserror::Error;

/// Errors that can occur when talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Rate limited by the catalog.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (invalid or under-scoped token).
    #[error("Unauthorized: invalid access token")]
    Unauthorized,
}

impl CatalogError {
    /// HTTP status to report for this error, 500 when there is none.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Api { status, .. } => *status,
            Self::RateLimited(_) => 429,
            Self::NotFound(_) => 404,
            Self::Unauthorized => 401,
            Self::Http(e) => e.status().map_or(500, |s| s.as_u16()),
            Self::Parse(_) => 500,
        }
    }

    /// Copy of this error for reporting one failed call against several items.
    ///
    /// Transport errors cannot be cloned and become `Api` errors with the
    /// same status and message.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Api { status, body } => Self::Api {
                status: *status,
                body: body.clone(),
            },
            Self::RateLimited(secs) => Self::RateLimited(*secs),
            Self::NotFound(what) => Self::NotFound(what.clone()),
            Self::Parse(message) => Self::Parse(message.clone()),
            Self::Unauthorized => Self::Unauthorized,
            Self::Http(e) => Self::Api {
                status: self.status_code(),
                body: e.to_string(),
            },
        }
    }
}

/// Operations the orchestrator needs from the catalog.
///
/// Every call is a single succeed/fail operation; implementations do not
/// retry.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Products matching any of `skus`, with custom fields, options and
    /// variants included. No match is an empty list, not an error.
    async fn products_by_skus(&self, skus: &[String]) -> Result<Vec<RemoteProduct>, CatalogError>;

    /// Create a product.
    async fn create_product(&self, payload: &ProductPayload) -> Result<RemoteProduct, CatalogError>;

    /// Update one product.
    async fn update_product(
        &self,
        id: ProductId,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, CatalogError>;

    /// Update at most [`PRODUCT_BATCH_LIMIT`] products in one call; every
    /// payload must carry an id. The batch lands entirely or not at all.
    async fn update_products(
        &self,
        payloads: &[ProductPayload],
    ) -> Result<Vec<RemoteProduct>, CatalogError>;

    /// Delete a product.
    async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError>;

    /// Show or hide a product.
    async fn set_product_visibility(
        &self,
        id: ProductId,
        visible: bool,
    ) -> Result<RemoteProduct, CatalogError>;

    /// Create (no id) or update (with id) a custom field.
    async fn upsert_custom_field(
        &self,
        product_id: ProductId,
        field: &CustomFieldPayload,
    ) -> Result<CustomField, CatalogError>;

    /// Delete a custom field.
    async fn delete_custom_field(
        &self,
        product_id: ProductId,
        id: CustomFieldId,
    ) -> Result<(), CatalogError>;

    /// Every metafield on a product, across namespaces.
    async fn list_metafields(&self, product_id: ProductId) -> Result<Vec<Metafield>, CatalogError>;

    /// Create (no id) or update (with id) a metafield.
    async fn upsert_metafield(
        &self,
        product_id: ProductId,
        field: &MetafieldPayload,
    ) -> Result<Metafield, CatalogError>;

    /// Delete a metafield.
    async fn delete_metafield(&self, product_id: ProductId, id: MetafieldId)
    -> Result<(), CatalogError>;

    /// Create (no id) or update (with id) an option with its values.
    async fn upsert_option(
        &self,
        product_id: ProductId,
        option: &OptionPayload,
    ) -> Result<ProductOption, CatalogError>;

    /// Delete one option value. The catalog also deletes its variants.
    async fn delete_option_value(
        &self,
        product_id: ProductId,
        option_id: OptionId,
        value_id: OptionValueId,
    ) -> Result<(), CatalogError>;

    /// Every variant of a product.
    async fn list_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, CatalogError>;

    /// Create or update variants in one call.
    async fn upsert_variants(&self, variants: &[VariantPayload])
    -> Result<Vec<Variant>, CatalogError>;
}
