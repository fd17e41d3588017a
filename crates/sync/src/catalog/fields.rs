//! Custom field and metafield operations.

use catalog_sync_core::{
    CustomField, CustomFieldId, CustomFieldPayload, Metafield, MetafieldId, MetafieldPayload,
    ProductId,
};
use serde::Serialize;
use tracing::instrument;

use super::{BigCommerceClient, CatalogError};

/// Metafield page size; one product never holds more.
const METAFIELD_PAGE_SIZE: &str = "250";

/// Custom field body without the id, which travels in the URL.
#[derive(Serialize)]
struct CustomFieldBody<'a> {
    name: &'a str,
    value: &'a str,
}

impl BigCommerceClient {
    /// Create or update a custom field.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, field), fields(product_id = %product_id, field = %field.name))]
    pub async fn save_custom_field(
        &self,
        product_id: ProductId,
        field: &CustomFieldPayload,
    ) -> Result<CustomField, CatalogError> {
        let body = CustomFieldBody {
            name: &field.name,
            value: &field.value,
        };

        match field.id {
            Some(id) => {
                let url = self.url(&format!("catalog/products/{product_id}/custom-fields/{id}"))?;
                self.put(url, &body).await
            }
            None => {
                let url = self.url(&format!("catalog/products/{product_id}/custom-fields"))?;
                self.post(url, &body).await
            }
        }
    }

    /// Delete a custom field.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id, custom_field_id = %id))]
    pub async fn remove_custom_field(
        &self,
        product_id: ProductId,
        id: CustomFieldId,
    ) -> Result<(), CatalogError> {
        let url = self.url(&format!("catalog/products/{product_id}/custom-fields/{id}"))?;
        self.delete(url).await
    }

    /// List every metafield on a product.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_metafields(&self, product_id: ProductId) -> Result<Vec<Metafield>, CatalogError> {
        let mut url = self.url(&format!("catalog/products/{product_id}/metafields"))?;
        url.query_pairs_mut().append_pair("limit", METAFIELD_PAGE_SIZE);
        self.get(url).await
    }

    /// Create or update a metafield.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, field), fields(product_id = %product_id, key = %field.key))]
    pub async fn save_metafield(
        &self,
        product_id: ProductId,
        field: &MetafieldPayload,
    ) -> Result<Metafield, CatalogError> {
        match field.id {
            Some(id) => {
                let url = self.url(&format!("catalog/products/{product_id}/metafields/{id}"))?;
                self.put(url, field).await
            }
            None => {
                let url = self.url(&format!("catalog/products/{product_id}/metafields"))?;
                self.post(url, field).await
            }
        }
    }

    /// Delete a metafield.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id, metafield_id = %id))]
    pub async fn remove_metafield(
        &self,
        product_id: ProductId,
        id: MetafieldId,
    ) -> Result<(), CatalogError> {
        let url = self.url(&format!("catalog/products/{product_id}/metafields/{id}"))?;
        self.delete(url).await
    }
}
