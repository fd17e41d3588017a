//! Option value diffing and variant mapping for wrapper products.
//!
//! In variant mode each format of a title is one value of a single
//! "Options" option on the wrapper, and one variant per value. Deleting an
//! option value deletes its variant in the catalog, so callers must delete
//! obsolete values before reading variants back for the upsert.

use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::mapper::dimension;
use crate::settings::SyncSettings;
use crate::types::{
    OptionPayload, OptionValue, OptionValuePayload, OptionValueRef, ProductId, ProductOption,
    SourceProduct, Variant, VariantPayload,
};

/// Display name of the option carrying format choices.
pub const VARIANT_OPTION_NAME: &str = "Options";

/// Option type used for format choices.
pub const VARIANT_OPTION_TYPE: &str = "radio_buttons";

/// Why a member could not be mapped to a variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariantError {
    #[error("product {sku} has no format label")]
    MissingLabel { sku: String },
    #[error("option has no value labeled '{label}' for product {sku}")]
    UnknownOptionValue { sku: String, label: String },
}

/// Option value operations needed to reach the desired label set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionValueDiff {
    pub create: Vec<OptionValuePayload>,
    pub update: Vec<OptionValue>,
    pub delete: Vec<OptionValue>,
}

/// Diff existing option values against desired labels.
///
/// Labels are the only matching key. Duplicate desired labels are not
/// checked.
#[must_use]
pub fn diff_option_values(existing: Option<&ProductOption>, desired: &[String]) -> OptionValueDiff {
    let current = existing.map_or(&[][..], |o| o.option_values.as_slice());
    let wanted: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let present: HashSet<&str> = current.iter().map(|v| v.label.as_str()).collect();

    let (update, delete): (Vec<OptionValue>, Vec<OptionValue>) = current
        .iter()
        .cloned()
        .partition(|v| wanted.contains(v.label.as_str()));

    let create = desired
        .iter()
        .enumerate()
        .filter(|(_, label)| !present.contains(label.as_str()))
        .map(|(index, label)| OptionValuePayload {
            id: None,
            label: label.clone(),
            sort_order: i64::try_from(index).unwrap_or(i64::MAX),
            is_default: false,
        })
        .collect();

    OptionValueDiff {
        create,
        update,
        delete,
    }
}

/// Option upsert payload: kept values re-sent as-is plus new ones.
#[must_use]
pub fn map_option(
    product_id: ProductId,
    existing: Option<&ProductOption>,
    diff: &OptionValueDiff,
) -> OptionPayload {
    let kept = diff.update.iter().map(|v| OptionValuePayload {
        id: Some(v.id),
        label: v.label.clone(),
        sort_order: v.sort_order,
        is_default: v.is_default,
    });

    OptionPayload {
        id: existing.map(|o| o.id),
        product_id,
        display_name: VARIANT_OPTION_NAME.to_string(),
        option_type: VARIANT_OPTION_TYPE.to_string(),
        sort_order: 0,
        option_values: kept.chain(diff.create.iter().cloned()).collect(),
    }
}

/// Map one member to its variant on the wrapper.
///
/// `option` must be the option as stored after the upsert so every label has
/// an id. An existing variant with the same SKU is updated in place.
///
/// # Errors
///
/// Returns [`VariantError`] if the member has no label or the option has no
/// value for it.
pub fn map_variant(
    member: &SourceProduct,
    product_id: ProductId,
    option: &ProductOption,
    existing: &[Variant],
    settings: &SyncSettings,
) -> Result<VariantPayload, VariantError> {
    let label = member
        .option_label()
        .ok_or_else(|| VariantError::MissingLabel {
            sku: member.sku.clone(),
        })?;
    let value = option
        .value_by_label(&label)
        .ok_or_else(|| VariantError::UnknownOptionValue {
            sku: member.sku.clone(),
            label: label.clone(),
        })?;

    let upc = [member.isbn.as_deref(), member.gtin12.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from);

    Ok(VariantPayload {
        id: existing.iter().find(|v| v.sku == member.sku).map(|v| v.id),
        product_id,
        sku: member.sku.clone(),
        price: member.price.unwrap_or(Decimal::ZERO),
        weight: dimension(member.weight.as_ref()),
        width: dimension(member.width.as_ref()),
        depth: dimension(member.depth.as_ref()),
        height: dimension(member.height.as_ref()),
        is_free_shipping: false,
        purchasing_disabled: settings.is_purchasing_disabled(&label),
        purchasing_disabled_message: String::new(),
        upc,
        option_values: vec![OptionValueRef {
            id: value.id,
            option_id: option.id,
        }],
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{OptionId, OptionValueId, VariantId};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn value(id: i64, label: &str) -> OptionValue {
        OptionValue {
            id: OptionValueId::new(id),
            label: label.to_string(),
            sort_order: 0,
            is_default: false,
            value_data: None,
        }
    }

    fn option(values: Vec<OptionValue>) -> ProductOption {
        ProductOption {
            id: OptionId::new(9),
            product_id: Some(ProductId::new(1)),
            display_name: VARIANT_OPTION_NAME.to_string(),
            option_type: VARIANT_OPTION_TYPE.to_string(),
            option_values: values,
        }
    }

    fn labels(values: &[OptionValue]) -> Vec<&str> {
        values.iter().map(|v| v.label.as_str()).collect()
    }

    #[test]
    fn test_option_value_diff() {
        let existing = option(vec![value(1, "A"), value(2, "B"), value(3, "C")]);
        let desired = vec!["B".to_string(), "C".to_string(), "D".to_string()];

        let diff = diff_option_values(Some(&existing), &desired);

        assert_eq!(
            diff.create.iter().map(|v| v.label.as_str()).collect::<Vec<_>>(),
            vec!["D"]
        );
        assert_eq!(labels(&diff.update), vec!["B", "C"]);
        assert_eq!(labels(&diff.delete), vec!["A"]);
    }

    #[test]
    fn test_no_existing_option_creates_everything() {
        let desired = vec!["Hardcover".to_string(), "Paperback".to_string()];

        let diff = diff_option_values(None, &desired);

        assert_eq!(diff.create.len(), 2);
        assert_eq!(diff.create.get(1).map(|v| v.sort_order), Some(1));
        assert!(diff.update.is_empty());
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn test_option_payload_keeps_ids() {
        let existing = option(vec![value(1, "A"), value(2, "B")]);
        let diff = diff_option_values(Some(&existing), &["B".to_string(), "C".to_string()]);

        let payload = map_option(ProductId::new(1), Some(&existing), &diff);

        assert_eq!(payload.id, Some(OptionId::new(9)));
        assert_eq!(payload.display_name, "Options");
        assert_eq!(payload.option_type, "radio_buttons");
        let ids: Vec<_> = payload.option_values.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![Some(OptionValueId::new(2)), None]);
    }

    #[test]
    fn test_map_variant() {
        let settings = SyncSettings {
            not_purchasable_formats: vec!["Audio CD".to_string()],
            ..SyncSettings::default()
        };
        let member: SourceProduct = serde_json::from_value(json!({
            "sku": "CD-1",
            "price": 19.99,
            "gtin12": "000000000001",
            "additionalProperty": [{"propertyID": "option", "value": "Audio CD"}]
        }))
        .unwrap();
        let stored = option(vec![value(40, "Audio CD")]);
        let existing = vec![Variant {
            id: VariantId::new(300),
            product_id: ProductId::new(1),
            sku: "CD-1".to_string(),
            option_values: vec![],
            purchasing_disabled: false,
            other: BTreeMap::new(),
        }];

        let payload = map_variant(&member, ProductId::new(1), &stored, &existing, &settings).unwrap();

        assert_eq!(payload.id, Some(VariantId::new(300)));
        assert!(payload.purchasing_disabled);
        assert_eq!(payload.upc.as_deref(), Some("000000000001"));
        assert_eq!(payload.weight, "0");
        assert_eq!(
            payload.option_values,
            vec![OptionValueRef {
                id: OptionValueId::new(40),
                option_id: OptionId::new(9),
            }]
        );
    }

    #[test]
    fn test_map_variant_unknown_label() {
        let member: SourceProduct =
            serde_json::from_value(json!({"sku": "EB", "encodingFormat": "EPUB"})).unwrap();
        let stored = option(vec![value(40, "PDF")]);

        let err = map_variant(&member, ProductId::new(1), &stored, &[], &SyncSettings::default())
            .unwrap_err();

        assert_eq!(
            err,
            VariantError::UnknownOptionValue {
                sku: "EB".to_string(),
                label: "EPUB".to_string(),
            }
        );
    }
}
