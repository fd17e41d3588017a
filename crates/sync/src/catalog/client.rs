//! BigCommerce REST client core: construction, URLs and response handling.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync_core::{
    CustomField, CustomFieldId, CustomFieldPayload, Metafield, MetafieldId, MetafieldPayload,
    OptionId, OptionPayload, OptionValueId, ProductId, ProductOption, ProductPayload,
    RemoteProduct, Variant, VariantPayload,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::{CatalogClient, CatalogError};
use crate::config::BigCommerceConfig;

/// Default wait when a 429 carries no usable retry header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Every BigCommerce v3 response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// BigCommerce catalog API client.
#[derive(Clone)]
pub struct BigCommerceClient {
    inner: Arc<BigCommerceClientInner>,
}

struct BigCommerceClientInner {
    client: reqwest::Client,
    /// `{api_url}/stores/{store_hash}/{api_version}/`
    base_url: Url,
    store_hash: String,
}

impl BigCommerceClient {
    /// Create a new BigCommerce API client.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are not valid header values, the
    /// base URL cannot be built, or the HTTP client fails to build.
    pub fn new(config: &BigCommerceConfig) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "X-Auth-Client",
            HeaderValue::from_str(&config.client_id)
                .map_err(|e| CatalogError::Parse(format!("Invalid client id format: {e}")))?,
        );
        let mut token = HeaderValue::from_str(config.access_token.expose_secret())
            .map_err(|e| CatalogError::Parse(format!("Invalid access token format: {e}")))?;
        token.set_sensitive(true);
        headers.insert("X-Auth-Token", token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(BigCommerceClientInner {
                client,
                base_url: store_base_url(config)?,
                store_hash: config.store_hash.clone(),
            }),
        })
    }

    /// Store hash this client is bound to.
    #[must_use]
    pub fn store_hash(&self) -> &str {
        &self.inner.store_hash
    }

    /// Resolve a path relative to the store's API root.
    pub(crate) fn url(&self, path: &str) -> Result<Url, CatalogError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CatalogError::Parse(format!("Invalid request path {path}: {e}")))
    }

    /// Execute a GET request and unwrap the `data` envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let response = self.inner.client.get(url).send().await?;
        let envelope: Envelope<T> = self.handle_response(response).await?;
        Ok(envelope.data)
    }

    /// Execute a POST request and unwrap the `data` envelope.
    pub(crate) async fn post<T: DeserializeOwned, B: serde::Serialize + Sync + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, CatalogError> {
        let response = self.inner.client.post(url).json(body).send().await?;
        let envelope: Envelope<T> = self.handle_response(response).await?;
        Ok(envelope.data)
    }

    /// Execute a PUT request and unwrap the `data` envelope.
    pub(crate) async fn put<T: DeserializeOwned, B: serde::Serialize + Sync + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, CatalogError> {
        let response = self.inner.client.put(url).json(body).send().await?;
        let envelope: Envelope<T> = self.handle_response(response).await?;
        Ok(envelope.data)
    }

    /// Execute a DELETE request.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), CatalogError> {
        let response = self.inner.client.delete(url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(self.parse_error(response).await)
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CatalogError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| CatalogError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the BigCommerce API.
    async fn parse_error(&self, response: reqwest::Response) -> CatalogError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("X-Rate-Limit-Time-Reset-Ms")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map_or(DEFAULT_RETRY_AFTER_SECS, |ms| ms.div_ceil(1000));
            return CatalogError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return CatalogError::Unauthorized;
        }

        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == 404 {
            return CatalogError::NotFound(url);
        }

        CatalogError::Api { status, body }
    }
}

/// Build `{api_url}/stores/{store_hash}/{api_version}/`.
fn store_base_url(config: &BigCommerceConfig) -> Result<Url, CatalogError> {
    let root = format!(
        "{}/stores/{}/{}/",
        config.api_url.as_str().trim_end_matches('/'),
        config.store_hash,
        config.api_version
    );
    Url::parse(&root).map_err(|e| CatalogError::Parse(format!("Invalid API URL {root}: {e}")))
}

impl std::fmt::Debug for BigCommerceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigCommerceClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CatalogClient for BigCommerceClient {
    async fn products_by_skus(&self, skus: &[String]) -> Result<Vec<RemoteProduct>, CatalogError> {
        self.get_products_by_skus(skus).await
    }

    async fn create_product(&self, payload: &ProductPayload) -> Result<RemoteProduct, CatalogError> {
        self.post_product(payload).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, CatalogError> {
        self.put_product(id, payload).await
    }

    async fn update_products(
        &self,
        payloads: &[ProductPayload],
    ) -> Result<Vec<RemoteProduct>, CatalogError> {
        self.put_products(payloads).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        self.remove_product(id).await
    }

    async fn set_product_visibility(
        &self,
        id: ProductId,
        visible: bool,
    ) -> Result<RemoteProduct, CatalogError> {
        self.put_visibility(id, visible).await
    }

    async fn upsert_custom_field(
        &self,
        product_id: ProductId,
        field: &CustomFieldPayload,
    ) -> Result<CustomField, CatalogError> {
        self.save_custom_field(product_id, field).await
    }

    async fn delete_custom_field(
        &self,
        product_id: ProductId,
        id: CustomFieldId,
    ) -> Result<(), CatalogError> {
        self.remove_custom_field(product_id, id).await
    }

    async fn list_metafields(&self, product_id: ProductId) -> Result<Vec<Metafield>, CatalogError> {
        self.get_metafields(product_id).await
    }

    async fn upsert_metafield(
        &self,
        product_id: ProductId,
        field: &MetafieldPayload,
    ) -> Result<Metafield, CatalogError> {
        self.save_metafield(product_id, field).await
    }

    async fn delete_metafield(
        &self,
        product_id: ProductId,
        id: MetafieldId,
    ) -> Result<(), CatalogError> {
        self.remove_metafield(product_id, id).await
    }

    async fn upsert_option(
        &self,
        product_id: ProductId,
        option: &OptionPayload,
    ) -> Result<ProductOption, CatalogError> {
        self.save_option(product_id, option).await
    }

    async fn delete_option_value(
        &self,
        product_id: ProductId,
        option_id: OptionId,
        value_id: OptionValueId,
    ) -> Result<(), CatalogError> {
        self.remove_option_value(product_id, option_id, value_id).await
    }

    async fn list_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, CatalogError> {
        self.get_variants(product_id).await
    }

    async fn upsert_variants(
        &self,
        variants: &[VariantPayload],
    ) -> Result<Vec<Variant>, CatalogError> {
        self.put_variants(variants).await
    }
}
