//! Upstream product records.
//!
//! A bundle is every format of one title (hardcover, paperback, ebook, ...).
//! Records follow schema.org naming, hence the camelCase wire format.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Additional property id holding the option label fallback.
const OPTION_PROPERTY_ID: &str = "option";

/// Availability as reported by the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceAvailability {
    #[default]
    #[serde(alias = "InStock")]
    Available,
    #[serde(alias = "PreOrder")]
    Preorder,
    #[serde(alias = "OutOfStock")]
    Disabled,
    #[serde(alias = "Discontinued")]
    NotAvailable,
}

impl SourceAvailability {
    /// Whether a format with this availability should exist in the catalog.
    #[must_use]
    pub const fn is_purchasable(self) -> bool {
        matches!(self, Self::Available | Self::Preorder)
    }
}

/// A numeric measurement with an optional unit (schema.org `QuantitativeValue`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeValue {
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub unit_text: Option<String>,
}

/// A generic key/value extension entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalProperty {
    #[serde(rename = "propertyID")]
    pub property_id: String,
    #[serde(default)]
    pub value: Value,
}

/// Reference to an upstream category.
///
/// Identifiers arrive as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCategory {
    pub identifier: Value,
}

impl SourceCategory {
    /// The catalog category id, if the identifier is numeric.
    #[must_use]
    pub fn catalog_id(&self) -> Option<i64> {
        match &self.identifier {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One format of a title as provided by the upstream system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProduct {
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub availability: SourceAvailability,
    #[serde(default)]
    pub is_digital: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub weight: Option<QuantitativeValue>,
    #[serde(default)]
    pub width: Option<QuantitativeValue>,
    #[serde(default)]
    pub depth: Option<QuantitativeValue>,
    #[serde(default)]
    pub height: Option<QuantitativeValue>,
    #[serde(default)]
    pub categories: Vec<SourceCategory>,
    #[serde(default)]
    pub additional_property: Vec<AdditionalProperty>,
    /// Comma-separated keyword list.
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub gtin12: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub encoding_format: Option<String>,
    /// schema.org `BookFormatType` URL, e.g. `http://schema.org/Hardcover`.
    #[serde(default)]
    pub book_format: Option<String>,
    /// Any upstream property the typed model does not name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceProduct {
    /// Look up an additional property value by its `propertyID`.
    ///
    /// The first entry wins when an id is repeated.
    #[must_use]
    pub fn additional_property(&self, property_id: &str) -> Option<&Value> {
        self.additional_property
            .iter()
            .find(|p| p.property_id == property_id)
            .map(|p| &p.value)
    }

    /// Additional property value as a string, if it is a non-null scalar.
    #[must_use]
    pub fn additional_property_str(&self, property_id: &str) -> Option<String> {
        match self.additional_property(property_id)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Every top-level property of the record, keyed by its wire name.
    ///
    /// Used by field rules that address properties by name. Returns an empty
    /// map if the record cannot be represented as JSON.
    #[must_use]
    pub fn properties(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Keywords from the comma-separated `keywords` field, trimmed, blanks dropped.
    #[must_use]
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }

    /// Label identifying this format among its siblings.
    ///
    /// Prefers `encodingFormat`, then the last path segment of `bookFormat`,
    /// then the `option` additional property.
    #[must_use]
    pub fn option_label(&self) -> Option<String> {
        if let Some(format) = self.encoding_format.as_deref().filter(|f| !f.is_empty()) {
            return Some(format.to_string());
        }

        if let Some(format) = self.book_format.as_deref()
            && let Some(last) = format.trim_end_matches('/').rsplit('/').next()
            && !last.is_empty()
        {
            return Some(last.to_string());
        }

        self.additional_property_str(OPTION_PROPERTY_ID)
    }

    /// Whether the upstream considers this format sellable.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.availability.is_purchasable()
    }
}

/// All formats of one title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductBundle {
    pub products: Vec<SourceProduct>,
}

/// The physical and digital halves of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubBundleKind {
    Physical,
    Digital,
}

/// One half of a split bundle, materialised as its own wrapper product.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBundle<'a> {
    pub kind: SubBundleKind,
    pub members: Vec<&'a SourceProduct>,
}

impl SubBundle<'_> {
    /// The member whose attributes the wrapper inherits.
    ///
    /// Falls back to the first member if none is flagged `isDefault`.
    #[must_use]
    pub fn default_member(&self) -> Option<&SourceProduct> {
        self.members
            .iter()
            .find(|m| m.is_default)
            .or_else(|| self.members.first())
            .copied()
    }

    /// Whether exactly one member is flagged as the default.
    #[must_use]
    pub fn has_unique_default(&self) -> bool {
        self.members.iter().filter(|m| m.is_default).count() == 1
    }

    /// SKU of the wrapper product for this sub-bundle.
    #[must_use]
    pub fn wrapper_sku(&self) -> Option<String> {
        self.default_member().map(|m| format!("{}-W", m.sku))
    }
}

impl ProductBundle {
    /// Every SKU in bundle order.
    #[must_use]
    pub fn skus(&self) -> Vec<String> {
        self.products.iter().map(|p| p.sku.clone()).collect()
    }

    /// Split into physical and digital halves, dropping empty halves.
    #[must_use]
    pub fn split(&self) -> Vec<SubBundle<'_>> {
        let (digital, physical): (Vec<_>, Vec<_>) =
            self.products.iter().partition(|p| p.is_digital);

        [
            SubBundle {
                kind: SubBundleKind::Physical,
                members: physical,
            },
            SubBundle {
                kind: SubBundleKind::Digital,
                members: digital,
            },
        ]
        .into_iter()
        .filter(|sub| !sub.members.is_empty())
        .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(value: Value) -> SourceProduct {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_deserialize_upstream_record() {
        let p = product(json!({
            "sku": "978-1",
            "name": "Widget",
            "price": "12.50",
            "availability": "preorder",
            "isDigital": true,
            "additionalProperty": [{"propertyID": "audience", "value": "adult"}],
            "weight": {"value": 1.5, "unitText": "lb"},
            "publisher": "Acme"
        }));

        assert_eq!(p.availability, SourceAvailability::Preorder);
        assert!(p.is_digital);
        assert_eq!(p.price, Some(Decimal::new(1250, 2)));
        assert_eq!(p.additional_property_str("audience").as_deref(), Some("adult"));
        assert_eq!(p.extra.get("publisher"), Some(&json!("Acme")));
    }

    #[test]
    fn test_schema_org_availability_aliases() {
        let p = product(json!({"sku": "A", "availability": "Discontinued"}));
        assert_eq!(p.availability, SourceAvailability::NotAvailable);
        assert!(!p.is_purchasable());

        let p = product(json!({"sku": "A", "availability": "not-available"}));
        assert_eq!(p.availability, SourceAvailability::NotAvailable);
    }

    #[test]
    fn test_missing_availability_defaults_to_available() {
        let p = product(json!({"sku": "A"}));
        assert!(p.is_purchasable());
    }

    #[test]
    fn test_option_label_precedence() {
        let p = product(json!({"sku": "A", "encodingFormat": "EPUB", "bookFormat": "http://schema.org/Hardcover"}));
        assert_eq!(p.option_label().as_deref(), Some("EPUB"));

        let p = product(json!({"sku": "A", "bookFormat": "http://schema.org/Hardcover"}));
        assert_eq!(p.option_label().as_deref(), Some("Hardcover"));

        let p = product(json!({"sku": "A", "additionalProperty": [{"propertyID": "option", "value": "Audio CD"}]}));
        assert_eq!(p.option_label().as_deref(), Some("Audio CD"));

        let p = product(json!({"sku": "A"}));
        assert_eq!(p.option_label(), None);
    }

    #[test]
    fn test_keyword_list_trims_and_drops_blanks() {
        let p = product(json!({"sku": "A", "keywords": "fantasy, dragons,, ,epic"}));
        assert_eq!(p.keyword_list(), vec!["fantasy", "dragons", "epic"]);
    }

    #[test]
    fn test_properties_include_flattened_extras() {
        let p = product(json!({"sku": "A", "datePublished": "2020-01-01", "series": "Book 1"}));
        let props = p.properties();
        assert_eq!(props.get("datePublished"), Some(&json!("2020-01-01")));
        assert_eq!(props.get("series"), Some(&json!("Book 1")));
        assert_eq!(props.get("sku"), Some(&json!("A")));
    }

    #[test]
    fn test_category_ids() {
        let c = SourceCategory { identifier: json!("42") };
        assert_eq!(c.catalog_id(), Some(42));
        let c = SourceCategory { identifier: json!(7) };
        assert_eq!(c.catalog_id(), Some(7));
        let c = SourceCategory { identifier: json!("fiction") };
        assert_eq!(c.catalog_id(), None);
    }

    #[test]
    fn test_split_and_wrapper_sku() {
        let bundle = ProductBundle {
            products: vec![
                product(json!({"sku": "HC", "isDefault": true})),
                product(json!({"sku": "PB"})),
                product(json!({"sku": "EB", "isDigital": true})),
            ],
        };

        let halves = bundle.split();
        assert_eq!(halves.len(), 2);

        let physical = halves.first().unwrap();
        assert_eq!(physical.kind, SubBundleKind::Physical);
        assert_eq!(physical.members.len(), 2);
        assert_eq!(physical.wrapper_sku().as_deref(), Some("HC-W"));

        let digital = halves.get(1).unwrap();
        assert_eq!(digital.kind, SubBundleKind::Digital);
        assert!(!digital.has_unique_default());
        assert_eq!(digital.wrapper_sku().as_deref(), Some("EB-W"));
    }
}
