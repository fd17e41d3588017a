//! Sync behavior settings.
//!
//! Settings are loaded by the service crate (typically from YAML) and passed
//! into the mapper, reconcilers and orchestrator unchanged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linker::{RELATED_PRODUCT_ID_FIELD, RELATED_PRODUCT_IDS_FIELD};

/// Errors found while validating settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("meta_fields_namespace is required when meta_fields are configured")]
    MissingNamespace,
    #[error("{list} rule #{index} has an empty {what}")]
    EmptyName {
        list: &'static str,
        index: usize,
        what: &'static str,
    },
    #[error("{list} maps more than one rule onto field '{field}'")]
    DuplicateField { list: &'static str, field: String },
    #[error("custom field '{0}' is managed by the relationship linker and cannot be mapped")]
    ReservedField(String),
}

/// How formats of a title are modelled in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Every format is its own product, cross-linked via `related_product_ids`.
    #[default]
    Siblings,
    /// Formats are option values/variants of one wrapper product per
    /// physical/digital half, wrappers cross-linked via `related_product_id`.
    Variants,
}

/// Where a field's value comes from on the source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum FieldSource {
    /// A top-level property, addressed by its wire name.
    Property { property: String },
    /// An `additionalProperty` entry, addressed by its `propertyID`.
    AdditionalProperty { property_id: String },
}

/// Maps one source value onto one named remote field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(flatten)]
    pub source: FieldSource,
    /// Remote field name (custom field name or metafield key).
    pub field: String,
}

impl FieldRule {
    /// Rule reading a top-level property.
    #[must_use]
    pub fn property(property: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source: FieldSource::Property {
                property: property.into(),
            },
            field: field.into(),
        }
    }

    /// Rule reading an additional property.
    #[must_use]
    pub fn additional_property(property_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source: FieldSource::AdditionalProperty {
                property_id: property_id.into(),
            },
            field: field.into(),
        }
    }
}

const fn default_track_inventory() -> bool {
    true
}

/// Settings consumed by the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,
    /// Custom field rules.
    #[serde(default)]
    pub custom_fields: Vec<FieldRule>,
    /// Metafield rules.
    #[serde(default)]
    pub meta_fields: Vec<FieldRule>,
    /// Namespace owning the metafields this sync writes.
    #[serde(default)]
    pub meta_fields_namespace: Option<String>,
    /// Option labels whose variants are not purchasable.
    #[serde(default)]
    pub not_purchasable_formats: Vec<String>,
    /// Append `|~ SKU` to product names to keep them unique.
    #[serde(default)]
    pub disambiguate: bool,
    /// Track stock on physical products.
    #[serde(default = "default_track_inventory")]
    pub track_inventory: bool,
    /// Message shown on preorder products.
    #[serde(default)]
    pub preorder_message: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            custom_fields: Vec::new(),
            meta_fields: Vec::new(),
            meta_fields_namespace: None,
            not_purchasable_formats: Vec::new(),
            disambiguate: false,
            track_inventory: default_track_inventory(),
            preorder_message: None,
        }
    }
}

impl SyncSettings {
    /// Check the settings for contradictions.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_rules("custom_fields", &self.custom_fields)?;
        validate_rules("meta_fields", &self.meta_fields)?;

        if let Some(rule) = self.custom_fields.iter().find(|r| {
            r.field == RELATED_PRODUCT_IDS_FIELD || r.field == RELATED_PRODUCT_ID_FIELD
        }) {
            return Err(SettingsError::ReservedField(rule.field.clone()));
        }

        if !self.meta_fields.is_empty() && self.meta_namespace().is_none() {
            return Err(SettingsError::MissingNamespace);
        }

        Ok(())
    }

    /// The metafield namespace, if set and not blank.
    #[must_use]
    pub fn meta_namespace(&self) -> Option<&str> {
        self.meta_fields_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
    }

    /// Whether a format label is on the not-purchasable list.
    #[must_use]
    pub fn is_purchasing_disabled(&self, label: &str) -> bool {
        self.not_purchasable_formats.iter().any(|f| f == label)
    }
}

fn validate_rules(list: &'static str, rules: &[FieldRule]) -> Result<(), SettingsError> {
    let mut seen = HashSet::new();

    for (index, rule) in rules.iter().enumerate() {
        let source_name = match &rule.source {
            FieldSource::Property { property } => property,
            FieldSource::AdditionalProperty { property_id } => property_id,
        };
        if source_name.trim().is_empty() {
            return Err(SettingsError::EmptyName {
                list,
                index,
                what: "source property",
            });
        }
        if rule.field.trim().is_empty() {
            return Err(SettingsError::EmptyName {
                list,
                index,
                what: "field name",
            });
        }
        if !seen.insert(rule.field.as_str()) {
            return Err(SettingsError::DuplicateField {
                list,
                field: rule.field.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_settings() {
        let yaml = r"
mode: variants
custom_fields:
  - from: property
    property: datePublished
    field: publication_date
  - from: additional_property
    property_id: audience
    field: audience
meta_fields:
  - from: additional_property
    property_id: series
    field: series
meta_fields_namespace: acumen
not_purchasable_formats: [Audio CD]
disambiguate: true
";
        let settings: SyncSettings = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(settings.mode, SyncMode::Variants);
        assert_eq!(
            settings.custom_fields,
            vec![
                FieldRule::property("datePublished", "publication_date"),
                FieldRule::additional_property("audience", "audience"),
            ]
        );
        assert_eq!(settings.meta_namespace(), Some("acumen"));
        assert!(settings.disambiguate);
        assert!(settings.track_inventory);
        assert!(settings.is_purchasing_disabled("Audio CD"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_meta_fields_require_namespace() {
        let settings = SyncSettings {
            meta_fields: vec![FieldRule::property("name", "title")],
            meta_fields_namespace: Some("   ".to_string()),
            ..SyncSettings::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::MissingNamespace));
    }

    #[test]
    fn test_duplicate_target_field_rejected() {
        let settings = SyncSettings {
            custom_fields: vec![
                FieldRule::property("isbn", "code"),
                FieldRule::additional_property("code", "code"),
            ],
            ..SyncSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_linker_fields_are_reserved() {
        let settings = SyncSettings {
            custom_fields: vec![FieldRule::property("sku", "related_product_ids")],
            ..SyncSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::ReservedField("related_product_ids".to_string()))
        );
    }
}
