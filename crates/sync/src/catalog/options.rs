//! Option, option value and variant operations.

use catalog_sync_core::{
    OptionId, OptionPayload, OptionValueId, ProductId, ProductOption, Variant, VariantPayload,
};
use tracing::instrument;

use super::{BigCommerceClient, CatalogError};

/// Variant page size.
const VARIANT_PAGE_SIZE: &str = "250";

impl BigCommerceClient {
    /// Create or update an option together with its values.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, option), fields(product_id = %product_id, values = option.option_values.len()))]
    pub async fn save_option(
        &self,
        product_id: ProductId,
        option: &OptionPayload,
    ) -> Result<ProductOption, CatalogError> {
        match option.id {
            Some(id) => {
                let url = self.url(&format!("catalog/products/{product_id}/options/{id}"))?;
                self.put(url, option).await
            }
            None => {
                let url = self.url(&format!("catalog/products/{product_id}/options"))?;
                self.post(url, option).await
            }
        }
    }

    /// Delete one option value.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id, option_id = %option_id, value_id = %value_id))]
    pub async fn remove_option_value(
        &self,
        product_id: ProductId,
        option_id: OptionId,
        value_id: OptionValueId,
    ) -> Result<(), CatalogError> {
        let url = self.url(&format!(
            "catalog/products/{product_id}/options/{option_id}/values/{value_id}"
        ))?;
        self.delete(url).await
    }

    /// List the variants of a product.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, CatalogError> {
        let mut url = self.url(&format!("catalog/products/{product_id}/variants"))?;
        url.query_pairs_mut().append_pair("limit", VARIANT_PAGE_SIZE);
        self.get(url).await
    }

    /// Create or update variants.
    ///
    /// Existing variants go through the batch variants endpoint, which only
    /// updates; new ones are created on their product one by one.
    ///
    /// # Errors
    ///
    /// Returns error if any request fails.
    #[instrument(skip(self, variants), fields(count = variants.len()))]
    pub async fn put_variants(
        &self,
        variants: &[VariantPayload],
    ) -> Result<Vec<Variant>, CatalogError> {
        let (existing, new): (Vec<&VariantPayload>, Vec<&VariantPayload>) =
            variants.iter().partition(|v| v.id.is_some());

        let mut saved = Vec::with_capacity(variants.len());
        if !existing.is_empty() {
            let url = self.url("catalog/variants")?;
            let mut updated: Vec<Variant> = self.put(url, &existing).await?;
            saved.append(&mut updated);
        }

        for variant in new {
            let url = self.url(&format!("catalog/products/{}/variants", variant.product_id))?;
            let created: Variant = self.post(url, variant).await?;
            saved.push(created);
        }

        Ok(saved)
    }
}
