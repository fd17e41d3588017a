//! Records as returned by the remote catalog.
//!
//! The catalog is authoritative for everything here. Fields we never write
//! are kept in `other` so result events can echo the full record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::{CustomFieldId, MetafieldId, OptionId, OptionValueId, ProductId, VariantId};

/// Product type in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[default]
    Physical,
    Digital,
}

/// How the catalog tracks stock for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryTracking {
    None,
    Product,
    Variant,
}

/// Purchase availability in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogAvailability {
    Available,
    Disabled,
    Preorder,
}

/// A product-level custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: CustomFieldId,
    pub name: String,
    pub value: String,
}

/// A namespaced product metafield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafield {
    pub id: MetafieldId,
    pub key: String,
    pub value: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ProductId>,
}

/// One labeled choice of a product option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub id: OptionValueId,
    pub label: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_data: Option<Value>,
}

/// A product-level choice axis (e.g. "Options").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: OptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub option_type: String,
    #[serde(default)]
    pub option_values: Vec<OptionValue>,
}

impl ProductOption {
    /// Find a value by its label.
    #[must_use]
    pub fn value_by_label(&self, label: &str) -> Option<&OptionValue> {
        self.option_values.iter().find(|v| v.label == label)
    }
}

/// Option value reference carried by a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOptionValue {
    pub id: OptionValueId,
    pub option_id: OptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_display_name: Option<String>,
}

/// A purchasable SKU-bound combination of a product and its option values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    #[serde(default)]
    pub option_values: Vec<VariantOptionValue>,
    #[serde(default)]
    pub purchasing_disabled: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// The catalog's product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: ProductId,
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_tracking: Option<InventoryTracking>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl RemoteProduct {
    /// Find a custom field by name.
    #[must_use]
    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.name == name)
    }

    /// Find an option by its display name.
    #[must_use]
    pub fn option(&self, display_name: &str) -> Option<&ProductOption> {
        self.options.iter().find(|o| o.display_name == display_name)
    }
}
