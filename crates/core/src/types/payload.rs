//! Write-side payloads sent to the catalog.
//!
//! `None` fields are omitted from the JSON so the catalog keeps its current
//! value. A payload with an `id` is an update, without one a create.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CustomFieldId, MetafieldId, OptionId, OptionValueId, ProductId, VariantId};
use super::remote::{CatalogAvailability, InventoryTracking, ProductType};

/// Product create/update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub name: String,
    pub sku: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub categories: Vec<i64>,
    pub availability: CatalogAvailability,
    pub weight: String,
    pub width: String,
    pub depth: String,
    pub height: String,
    pub meta_keywords: Vec<String>,
    pub meta_description: String,
    pub search_keywords: String,
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_tracking: Option<InventoryTracking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preorder_release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preorder_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldPayload>,
}

impl ProductPayload {
    /// Insert or replace a custom field by name.
    ///
    /// An id already attached to the replaced entry is kept unless the new
    /// one carries its own.
    pub fn set_custom_field(&mut self, field: CustomFieldPayload) {
        match self.custom_fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => {
                existing.value = field.value;
                existing.id = field.id.or(existing.id);
            }
            None => self.custom_fields.push(field),
        }
    }
}

/// Custom field create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CustomFieldId>,
    pub name: String,
    pub value: String,
}

/// Metafield create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafieldPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MetafieldId>,
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub permission_set: String,
}

/// Option value create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValuePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OptionValueId>,
    pub label: String,
    pub sort_order: i64,
    pub is_default: bool,
}

/// Product option create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OptionId>,
    pub product_id: ProductId,
    pub display_name: String,
    #[serde(rename = "type")]
    pub option_type: String,
    pub sort_order: i64,
    pub option_values: Vec<OptionValuePayload>,
}

/// Reference from a variant to one option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValueRef {
    pub id: OptionValueId,
    pub option_id: OptionId,
}

/// Variant upsert payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VariantId>,
    pub product_id: ProductId,
    pub sku: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub weight: String,
    pub width: String,
    pub depth: String,
    pub height: String,
    pub is_free_shipping: bool,
    pub purchasing_disabled: bool,
    pub purchasing_disabled_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
    pub option_values: Vec<OptionValueRef>,
}
