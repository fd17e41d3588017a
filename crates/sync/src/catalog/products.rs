//! Product operations.

use catalog_sync_core::{ProductId, ProductPayload, RemoteProduct};
use serde::Serialize;
use tracing::instrument;

use super::{BigCommerceClient, CatalogError};

/// Largest batch the products endpoint accepts in one request.
pub const PRODUCT_BATCH_LIMIT: usize = 10;

/// Page size for SKU lookups; one bundle never comes close.
const LOOKUP_PAGE_SIZE: &str = "250";

/// Related records included in product lookups.
const LOOKUP_INCLUDE: &str = "custom_fields,options,variants";

#[derive(Serialize)]
struct VisibilityUpdate {
    is_visible: bool,
}

impl BigCommerceClient {
    /// Look up products by SKU.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(sku_count = skus.len()))]
    pub async fn get_products_by_skus(
        &self,
        skus: &[String],
    ) -> Result<Vec<RemoteProduct>, CatalogError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.url("catalog/products")?;
        url.query_pairs_mut()
            .append_pair("sku:in", &skus.join(","))
            .append_pair("include", LOOKUP_INCLUDE)
            .append_pair("limit", LOOKUP_PAGE_SIZE);

        self.get(url).await
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, payload), fields(sku = %payload.sku))]
    pub async fn post_product(&self, payload: &ProductPayload) -> Result<RemoteProduct, CatalogError> {
        let url = self.url("catalog/products")?;
        self.post(url, payload).await
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns error if the product is not found or the API request fails.
    #[instrument(skip(self, payload), fields(product_id = %id, sku = %payload.sku))]
    pub async fn put_product(
        &self,
        id: ProductId,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, CatalogError> {
        let url = self.url(&format!("catalog/products/{id}"))?;
        self.put(url, payload).await
    }

    /// Update up to [`PRODUCT_BATCH_LIMIT`] products in one request.
    ///
    /// Larger batches are refused before anything is sent, so a batch is
    /// written entirely or not at all.
    ///
    /// # Errors
    ///
    /// Returns error if the batch is too large or the API request fails.
    #[instrument(skip(self, payloads), fields(count = payloads.len()))]
    pub async fn put_products(
        &self,
        payloads: &[ProductPayload],
    ) -> Result<Vec<RemoteProduct>, CatalogError> {
        if payloads.len() > PRODUCT_BATCH_LIMIT {
            return Err(CatalogError::Api {
                status: 413,
                body: format!(
                    "batch of {} products exceeds the limit of {PRODUCT_BATCH_LIMIT}",
                    payloads.len()
                ),
            });
        }
        let url = self.url("catalog/products")?;
        self.put(url, payloads).await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn remove_product(&self, id: ProductId) -> Result<(), CatalogError> {
        let url = self.url(&format!("catalog/products/{id}"))?;
        self.delete(url).await
    }

    /// Show or hide a product.
    ///
    /// # Errors
    ///
    /// Returns error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn put_visibility(
        &self,
        id: ProductId,
        visible: bool,
    ) -> Result<RemoteProduct, CatalogError> {
        let url = self.url(&format!("catalog/products/{id}"))?;
        self.put(url, &VisibilityUpdate { is_visible: visible })
            .await
    }
}
