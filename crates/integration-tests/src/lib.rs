//! End-to-end test support for catalog sync.
//!
//! [`FakeCatalog`] is an in-memory [`CatalogClient`] that behaves like the
//! BigCommerce catalog where the sync engine relies on it:
//!
//! - deleting an option value deletes the variants that use it
//! - a variant cannot reuse an option value combination another variant holds
//! - writes against unknown ids fail with 404
//! - custom field names and metafield keys are unique per product
//! - batch product updates over the request limit are refused
//!
//! Every call is logged, and any call can be made to fail.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p catalog-sync-integration-tests
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use catalog_sync::catalog::PRODUCT_BATCH_LIMIT;
use catalog_sync::report::{FailureEvent, SuccessEvent};
use catalog_sync::{CatalogClient, CatalogError, SyncEvent};
use catalog_sync_core::{
    CustomField, CustomFieldId, CustomFieldPayload, Metafield, MetafieldId, MetafieldPayload,
    OptionId, OptionPayload, OptionValue, OptionValueId, ProductBundle, ProductId, ProductOption,
    ProductPayload, RemoteProduct, Variant, VariantId, VariantOptionValue, VariantPayload,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// First id handed out for created entities; seeded ids stay below it.
const FIRST_GENERATED_ID: i64 = 1000;

/// Payload keys stored in typed fields rather than in `other`.
const TYPED_PRODUCT_KEYS: &[&str] = &[
    "id",
    "sku",
    "name",
    "is_visible",
    "inventory_tracking",
    "custom_fields",
];
const TYPED_VARIANT_KEYS: &[&str] = &[
    "id",
    "product_id",
    "sku",
    "option_values",
    "purchasing_disabled",
];

/// Catalog operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    LookupProducts,
    CreateProduct,
    UpdateProduct,
    UpdateProducts,
    DeleteProduct,
    SetVisibility,
    UpsertCustomField,
    DeleteCustomField,
    ListMetafields,
    UpsertMetafield,
    DeleteMetafield,
    UpsertOption,
    DeleteOptionValue,
    ListVariants,
    UpsertVariants,
}

/// One logged call. `target` is the SKU for lookups and creates and the
/// product id otherwise; batch calls join their targets with commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub target: String,
    /// Extra detail, e.g. the visibility requested.
    pub detail: String,
}

#[derive(Debug, Clone)]
struct Failure {
    op: Op,
    target: Option<String>,
    status: u16,
}

#[derive(Debug)]
struct State {
    next_id: i64,
    products: BTreeMap<ProductId, RemoteProduct>,
    metafields: BTreeMap<ProductId, Vec<Metafield>>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: FIRST_GENERATED_ID,
            products: BTreeMap::new(),
            metafields: BTreeMap::new(),
            failures: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl State {
    /// Log a call and fail it if a matching failure was injected.
    fn record(&mut self, op: Op, target: String, detail: String) -> Result<(), CatalogError> {
        let status = self
            .failures
            .iter()
            .find(|f| {
                f.op == op
                    && f.target
                        .as_deref()
                        .is_none_or(|t| target.split(',').any(|part| part == t))
            })
            .map(|f| f.status);
        self.calls.push(Call { op, target, detail });

        match status {
            Some(status) => Err(CatalogError::Api {
                status,
                body: format!("injected {op:?} failure"),
            }),
            None => Ok(()),
        }
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut RemoteProduct, CatalogError> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))
    }
}

fn alloc(next_id: &mut i64) -> i64 {
    *next_id += 1;
    *next_id
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<State>>,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a product with a chosen id.
    pub fn insert_product(&self, id: i64, sku: &str, visible: bool) -> ProductId {
        let id = ProductId::new(id);
        self.state().products.insert(
            id,
            RemoteProduct {
                id,
                sku: sku.to_string(),
                name: sku.to_string(),
                is_visible: visible,
                inventory_tracking: None,
                custom_fields: Vec::new(),
                options: Vec::new(),
                variants: Vec::new(),
                other: BTreeMap::new(),
            },
        );
        id
    }

    /// Attach a custom field to a seeded product.
    ///
    /// # Panics
    ///
    /// Panics if the product does not exist.
    #[allow(clippy::expect_used)]
    pub fn add_custom_field(&self, product_id: ProductId, name: &str, value: &str) -> CustomFieldId {
        let mut state = self.state();
        let id = CustomFieldId::new(alloc(&mut state.next_id));
        state
            .products
            .get_mut(&product_id)
            .expect("seeded product")
            .custom_fields
            .push(CustomField {
                id,
                name: name.to_string(),
                value: value.to_string(),
            });
        id
    }

    /// Attach a metafield to a product.
    pub fn add_metafield(
        &self,
        product_id: ProductId,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> MetafieldId {
        let mut state = self.state();
        let id = MetafieldId::new(alloc(&mut state.next_id));
        state
            .metafields
            .entry(product_id)
            .or_default()
            .push(Metafield {
                id,
                key: key.to_string(),
                value: value.to_string(),
                namespace: namespace.to_string(),
                permission_set: Some("write".to_string()),
                description: None,
                resource_id: Some(product_id),
            });
        id
    }

    /// Attach an option with one value per label to a seeded product.
    ///
    /// # Panics
    ///
    /// Panics if the product does not exist.
    #[allow(clippy::expect_used)]
    pub fn add_option(&self, product_id: ProductId, display_name: &str, labels: &[&str]) -> OptionId {
        let mut state = self.state();
        let State {
            next_id, products, ..
        } = &mut *state;
        let id = OptionId::new(alloc(next_id));
        let option_values = labels
            .iter()
            .zip(0..)
            .map(|(label, sort_order)| OptionValue {
                id: OptionValueId::new(alloc(next_id)),
                label: (*label).to_string(),
                sort_order,
                is_default: false,
                value_data: None,
            })
            .collect();
        products
            .get_mut(&product_id)
            .expect("seeded product")
            .options
            .push(ProductOption {
                id,
                product_id: Some(product_id),
                display_name: display_name.to_string(),
                option_type: "radio_buttons".to_string(),
                option_values,
            });
        id
    }

    /// Attach a variant bound to the option value with `label`.
    ///
    /// # Panics
    ///
    /// Panics if the product or the label does not exist.
    #[allow(clippy::expect_used)]
    pub fn add_variant(&self, product_id: ProductId, sku: &str, label: &str) -> VariantId {
        let mut state = self.state();
        let State {
            next_id, products, ..
        } = &mut *state;
        let id = VariantId::new(alloc(next_id));
        let product = products.get_mut(&product_id).expect("seeded product");
        let value = product
            .options
            .iter()
            .find_map(|o| {
                o.value_by_label(label).map(|v| VariantOptionValue {
                    id: v.id,
                    option_id: o.id,
                    label: Some(v.label.clone()),
                    option_display_name: Some(o.display_name.clone()),
                })
            })
            .expect("seeded option value");
        product.variants.push(Variant {
            id,
            product_id,
            sku: sku.to_string(),
            option_values: vec![value],
            purchasing_disabled: false,
            other: BTreeMap::new(),
        });
        id
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Make every `op` call whose target matches fail with `status`.
    /// `None` matches every target.
    pub fn fail(&self, op: Op, target: Option<&str>, status: u16) {
        self.state().failures.push(Failure {
            op,
            target: target.map(String::from),
            status,
        });
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<RemoteProduct> {
        self.state().products.get(&id).cloned()
    }

    #[must_use]
    pub fn product_by_sku(&self, sku: &str) -> Option<RemoteProduct> {
        self.state()
            .products
            .values()
            .find(|p| p.sku == sku)
            .cloned()
    }

    #[must_use]
    pub fn metafields(&self, product_id: ProductId) -> Vec<Metafield> {
        self.state()
            .metafields
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Index of the first call of `op` in the log.
    #[must_use]
    pub fn first(&self, op: Op) -> Option<usize> {
        self.state().calls.iter().position(|c| c.op == op)
    }

    /// Index of the last call of `op` in the log.
    #[must_use]
    pub fn last(&self, op: Op) -> Option<usize> {
        self.state().calls.iter().rposition(|c| c.op == op)
    }

    #[must_use]
    pub fn count(&self, op: Op) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> Result<serde_json::Map<String, Value>, CatalogError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CatalogError::Parse(format!("expected an object, got {other}"))),
        Err(e) => Err(CatalogError::Parse(e.to_string())),
    }
}

fn apply_payload(
    product: &mut RemoteProduct,
    payload: &ProductPayload,
    next_id: &mut i64,
) -> Result<(), CatalogError> {
    product.sku.clone_from(&payload.sku);
    product.name.clone_from(&payload.name);
    product.is_visible = payload.is_visible;
    if payload.inventory_tracking.is_some() {
        product.inventory_tracking = payload.inventory_tracking;
    }
    for (key, value) in to_object(payload)? {
        if !TYPED_PRODUCT_KEYS.contains(&key.as_str()) {
            product.other.insert(key, value);
        }
    }
    for field in &payload.custom_fields {
        upsert_field(&mut product.custom_fields, field, next_id)?;
    }
    Ok(())
}

fn upsert_field(
    fields: &mut Vec<CustomField>,
    field: &CustomFieldPayload,
    next_id: &mut i64,
) -> Result<CustomField, CatalogError> {
    if let Some(id) = field.id {
        let existing = fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CatalogError::NotFound(format!("custom field {id}")))?;
        existing.name.clone_from(&field.name);
        existing.value.clone_from(&field.value);
        return Ok(existing.clone());
    }

    if fields.iter().any(|f| f.name == field.name) {
        return Err(CatalogError::Api {
            status: 409,
            body: format!("custom field '{}' already exists", field.name),
        });
    }
    let created = CustomField {
        id: CustomFieldId::new(alloc(next_id)),
        name: field.name.clone(),
        value: field.value.clone(),
    };
    fields.push(created.clone());
    Ok(created)
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn products_by_skus(&self, skus: &[String]) -> Result<Vec<RemoteProduct>, CatalogError> {
        let mut state = self.state();
        state.record(Op::LookupProducts, skus.join(","), String::new())?;
        Ok(state
            .products
            .values()
            .filter(|p| skus.contains(&p.sku))
            .cloned()
            .collect())
    }

    async fn create_product(&self, payload: &ProductPayload) -> Result<RemoteProduct, CatalogError> {
        let mut state = self.state();
        state.record(Op::CreateProduct, payload.sku.clone(), String::new())?;
        if state.products.values().any(|p| p.sku == payload.sku) {
            return Err(CatalogError::Api {
                status: 409,
                body: format!("sku '{}' already exists", payload.sku),
            });
        }

        let State {
            next_id, products, ..
        } = &mut *state;
        let id = ProductId::new(alloc(next_id));
        let mut product = RemoteProduct {
            id,
            sku: String::new(),
            name: String::new(),
            is_visible: false,
            inventory_tracking: None,
            custom_fields: Vec::new(),
            options: Vec::new(),
            variants: Vec::new(),
            other: BTreeMap::new(),
        };
        apply_payload(&mut product, payload, next_id)?;
        products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, CatalogError> {
        let mut state = self.state();
        state.record(Op::UpdateProduct, id.to_string(), String::new())?;
        let State {
            next_id, products, ..
        } = &mut *state;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))?;
        apply_payload(product, payload, next_id)?;
        Ok(product.clone())
    }

    async fn update_products(
        &self,
        payloads: &[ProductPayload],
    ) -> Result<Vec<RemoteProduct>, CatalogError> {
        let mut state = self.state();
        let ids = join(payloads.iter().filter_map(|p| p.id));
        state.record(Op::UpdateProducts, ids, String::new())?;
        if payloads.len() > PRODUCT_BATCH_LIMIT {
            return Err(CatalogError::Api {
                status: 413,
                body: format!("batch of {} products is over the limit", payloads.len()),
            });
        }

        let State {
            next_id, products, ..
        } = &mut *state;
        let mut updated = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let id = payload.id.ok_or_else(|| CatalogError::Api {
                status: 422,
                body: format!("batch update of '{}' has no id", payload.sku),
            })?;
            let product = products
                .get_mut(&id)
                .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))?;
            apply_payload(product, payload, next_id)?;
            updated.push(product.clone());
        }
        Ok(updated)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        let mut state = self.state();
        state.record(Op::DeleteProduct, id.to_string(), String::new())?;
        state
            .products
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {id}")))?;
        state.metafields.remove(&id);
        Ok(())
    }

    async fn set_product_visibility(
        &self,
        id: ProductId,
        visible: bool,
    ) -> Result<RemoteProduct, CatalogError> {
        let mut state = self.state();
        state.record(Op::SetVisibility, id.to_string(), visible.to_string())?;
        let product = state.product_mut(id)?;
        product.is_visible = visible;
        Ok(product.clone())
    }

    async fn upsert_custom_field(
        &self,
        product_id: ProductId,
        field: &CustomFieldPayload,
    ) -> Result<CustomField, CatalogError> {
        let mut state = self.state();
        state.record(Op::UpsertCustomField, product_id.to_string(), field.name.clone())?;
        let State {
            next_id, products, ..
        } = &mut *state;
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {product_id}")))?;
        upsert_field(&mut product.custom_fields, field, next_id)
    }

    async fn delete_custom_field(
        &self,
        product_id: ProductId,
        id: CustomFieldId,
    ) -> Result<(), CatalogError> {
        let mut state = self.state();
        state.record(Op::DeleteCustomField, product_id.to_string(), id.to_string())?;
        let product = state.product_mut(product_id)?;
        let before = product.custom_fields.len();
        product.custom_fields.retain(|f| f.id != id);
        if product.custom_fields.len() == before {
            return Err(CatalogError::NotFound(format!("custom field {id}")));
        }
        Ok(())
    }

    async fn list_metafields(&self, product_id: ProductId) -> Result<Vec<Metafield>, CatalogError> {
        let mut state = self.state();
        state.record(Op::ListMetafields, product_id.to_string(), String::new())?;
        Ok(state.metafields.get(&product_id).cloned().unwrap_or_default())
    }

    async fn upsert_metafield(
        &self,
        product_id: ProductId,
        field: &MetafieldPayload,
    ) -> Result<Metafield, CatalogError> {
        let mut state = self.state();
        state.record(Op::UpsertMetafield, product_id.to_string(), field.key.clone())?;
        if !state.products.contains_key(&product_id) {
            return Err(CatalogError::NotFound(format!("product {product_id}")));
        }
        let State {
            next_id,
            metafields,
            ..
        } = &mut *state;
        let fields = metafields.entry(product_id).or_default();

        if let Some(id) = field.id {
            let existing = fields
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| CatalogError::NotFound(format!("metafield {id}")))?;
            existing.key.clone_from(&field.key);
            existing.value.clone_from(&field.value);
            existing.namespace.clone_from(&field.namespace);
            return Ok(existing.clone());
        }

        if fields
            .iter()
            .any(|f| f.namespace == field.namespace && f.key == field.key)
        {
            return Err(CatalogError::Api {
                status: 409,
                body: format!("metafield '{}.{}' already exists", field.namespace, field.key),
            });
        }
        let created = Metafield {
            id: MetafieldId::new(alloc(next_id)),
            key: field.key.clone(),
            value: field.value.clone(),
            namespace: field.namespace.clone(),
            permission_set: Some(field.permission_set.clone()),
            description: None,
            resource_id: Some(product_id),
        };
        fields.push(created.clone());
        Ok(created)
    }

    async fn delete_metafield(&self, product_id: ProductId, id: MetafieldId) -> Result<(), CatalogError> {
        let mut state = self.state();
        state.record(Op::DeleteMetafield, product_id.to_string(), id.to_string())?;
        let fields = state.metafields.entry(product_id).or_default();
        let before = fields.len();
        fields.retain(|f| f.id != id);
        if fields.len() == before {
            return Err(CatalogError::NotFound(format!("metafield {id}")));
        }
        Ok(())
    }

    async fn upsert_option(
        &self,
        product_id: ProductId,
        option: &OptionPayload,
    ) -> Result<ProductOption, CatalogError> {
        let mut state = self.state();
        state.record(Op::UpsertOption, product_id.to_string(), option.display_name.clone())?;
        let State {
            next_id, products, ..
        } = &mut *state;
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CatalogError::NotFound(format!("product {product_id}")))?;

        let index = match option.id {
            Some(id) => product
                .options
                .iter()
                .position(|o| o.id == id)
                .ok_or_else(|| CatalogError::NotFound(format!("option {id}")))?,
            None => {
                product.options.push(ProductOption {
                    id: OptionId::new(alloc(next_id)),
                    product_id: Some(product_id),
                    display_name: String::new(),
                    option_type: String::new(),
                    option_values: Vec::new(),
                });
                product.options.len() - 1
            }
        };
        let stored = product
            .options
            .get_mut(index)
            .ok_or_else(|| CatalogError::NotFound(format!("option #{index}")))?;
        stored.display_name.clone_from(&option.display_name);
        stored.option_type.clone_from(&option.option_type);

        // Values left out of the payload are kept, as the catalog does.
        for value in &option.option_values {
            if let Some(id) = value.id {
                let existing = stored
                    .option_values
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or_else(|| CatalogError::NotFound(format!("option value {id}")))?;
                existing.label.clone_from(&value.label);
                existing.sort_order = value.sort_order;
                existing.is_default = value.is_default;
            } else if stored.option_values.iter().any(|v| v.label == value.label) {
                return Err(CatalogError::Api {
                    status: 409,
                    body: format!("option value '{}' already exists", value.label),
                });
            } else {
                stored.option_values.push(OptionValue {
                    id: OptionValueId::new(alloc(next_id)),
                    label: value.label.clone(),
                    sort_order: value.sort_order,
                    is_default: value.is_default,
                    value_data: None,
                });
            }
        }
        Ok(stored.clone())
    }

    async fn delete_option_value(
        &self,
        product_id: ProductId,
        option_id: OptionId,
        value_id: OptionValueId,
    ) -> Result<(), CatalogError> {
        let mut state = self.state();
        state.record(Op::DeleteOptionValue, product_id.to_string(), value_id.to_string())?;
        let product = state.product_mut(product_id)?;
        let option = product
            .options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or_else(|| CatalogError::NotFound(format!("option {option_id}")))?;
        let before = option.option_values.len();
        option.option_values.retain(|v| v.id != value_id);
        if option.option_values.len() == before {
            return Err(CatalogError::NotFound(format!("option value {value_id}")));
        }
        product
            .variants
            .retain(|v| !v.option_values.iter().any(|ov| ov.id == value_id));
        Ok(())
    }

    async fn list_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, CatalogError> {
        let mut state = self.state();
        state.record(Op::ListVariants, product_id.to_string(), String::new())?;
        Ok(state.product_mut(product_id)?.variants.clone())
    }

    async fn upsert_variants(&self, variants: &[VariantPayload]) -> Result<Vec<Variant>, CatalogError> {
        let mut state = self.state();
        let targets = join(variants.iter().map(|v| v.product_id).collect::<BTreeSet<_>>());
        let skus = variants.iter().map(|v| v.sku.as_str()).collect::<Vec<_>>().join(",");
        state.record(Op::UpsertVariants, targets, skus)?;

        let State {
            next_id, products, ..
        } = &mut *state;
        let mut saved = Vec::with_capacity(variants.len());
        for payload in variants {
            let product = products
                .get_mut(&payload.product_id)
                .ok_or_else(|| CatalogError::NotFound(format!("product {}", payload.product_id)))?;

            let option_values = payload
                .option_values
                .iter()
                .map(|r| {
                    product
                        .options
                        .iter()
                        .filter(|o| o.id == r.option_id)
                        .find_map(|o| {
                            o.option_values.iter().find(|v| v.id == r.id).map(|v| VariantOptionValue {
                                id: v.id,
                                option_id: o.id,
                                label: Some(v.label.clone()),
                                option_display_name: Some(o.display_name.clone()),
                            })
                        })
                        .ok_or_else(|| CatalogError::Api {
                            status: 422,
                            body: format!("option value {} does not exist", r.id),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let combination: BTreeSet<OptionValueId> = option_values.iter().map(|v| v.id).collect();
            if let Some(taken) = product.variants.iter().find(|v| {
                Some(v.id) != payload.id
                    && v.option_values.iter().map(|ov| ov.id).collect::<BTreeSet<_>>() == combination
            }) {
                return Err(CatalogError::Api {
                    status: 409,
                    body: format!("option values already used by variant {}", taken.id),
                });
            }

            let other = to_object(payload)?
                .into_iter()
                .filter(|(key, _)| !TYPED_VARIANT_KEYS.contains(&key.as_str()))
                .collect();
            let variant = match payload.id {
                Some(id) => {
                    let existing = product
                        .variants
                        .iter_mut()
                        .find(|v| v.id == id)
                        .ok_or_else(|| CatalogError::NotFound(format!("variant {id}")))?;
                    existing.sku.clone_from(&payload.sku);
                    existing.option_values = option_values;
                    existing.purchasing_disabled = payload.purchasing_disabled;
                    existing.other = other;
                    existing.clone()
                }
                None => {
                    let variant = Variant {
                        id: VariantId::new(alloc(next_id)),
                        product_id: payload.product_id,
                        sku: payload.sku.clone(),
                        option_values,
                        purchasing_disabled: payload.purchasing_disabled,
                        other,
                    };
                    product.variants.push(variant.clone());
                    variant
                }
            };
            saved.push(variant);
        }
        Ok(saved)
    }
}

// =============================================================================
// Test helpers
// =============================================================================

/// Build a bundle from JSON.
///
/// # Panics
///
/// Panics if the JSON is not a bundle.
#[allow(clippy::expect_used)]
#[must_use]
pub fn bundle(value: Value) -> ProductBundle {
    serde_json::from_value(value).expect("valid bundle")
}

/// A fixed clock so availability decisions do not drift.
///
/// # Panics
///
/// Never; the date is valid.
#[allow(clippy::expect_used)]
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid date")
}

#[must_use]
pub fn successes(events: &[SyncEvent]) -> Vec<&SuccessEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::Success(s) => Some(s),
            SyncEvent::Failure(_) => None,
        })
        .collect()
}

#[must_use]
pub fn failures(events: &[SyncEvent]) -> Vec<&FailureEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::Failure(f) => Some(f),
            SyncEvent::Success(_) => None,
        })
        .collect()
}

/// The success event for `sku`, if any.
#[must_use]
pub fn success_for<'a>(events: &'a [SyncEvent], sku: &str) -> Option<&'a SuccessEvent> {
    successes(events)
        .into_iter()
        .find(|s| s.product.raw_item.sku == sku)
}
