//! Cross-reference fields between formats of the same title.
//!
//! Links can only be computed once every sibling has a remote id, so the
//! orchestrator calls into this module after all creates and updates.

use crate::types::{CustomField, CustomFieldId, CustomFieldPayload, ProductId};

/// CSV of sibling product ids, used when formats are separate products.
pub const RELATED_PRODUCT_IDS_FIELD: &str = "related_product_ids";

/// Single counterpart id, used between a physical and a digital wrapper.
pub const RELATED_PRODUCT_ID_FIELD: &str = "related_product_id";

/// Whether a custom field is owned by the linker.
#[must_use]
pub fn is_link_field(name: &str) -> bool {
    name == RELATED_PRODUCT_IDS_FIELD || name == RELATED_PRODUCT_ID_FIELD
}

/// A product with a settled remote id and its current custom fields.
#[derive(Debug, Clone, Copy)]
pub struct LinkTarget<'a> {
    pub product_id: ProductId,
    pub custom_fields: &'a [CustomField],
}

impl<'a> LinkTarget<'a> {
    #[must_use]
    pub const fn new(product_id: ProductId, custom_fields: &'a [CustomField]) -> Self {
        Self {
            product_id,
            custom_fields,
        }
    }

    fn field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.name == name)
    }
}

/// One write the linker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Set the field; carries the existing field id when there is one.
    Upsert {
        product_id: ProductId,
        field: CustomFieldPayload,
    },
    /// Remove a stale cross-reference.
    Delete {
        product_id: ProductId,
        field_id: CustomFieldId,
    },
}

impl LinkAction {
    /// The product this action writes to.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Upsert { product_id, .. } | Self::Delete { product_id, .. } => *product_id,
        }
    }
}

/// Link sibling products through `related_product_ids`.
///
/// Each product gets the ids of every other product in bundle order. A
/// lone product has nothing to link to, so a stale field is removed.
#[must_use]
pub fn link_siblings(targets: &[LinkTarget<'_>]) -> Vec<LinkAction> {
    if let [only] = targets {
        return stale_delete(only, RELATED_PRODUCT_IDS_FIELD)
            .into_iter()
            .collect();
    }

    targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let others = targets
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, t)| t.product_id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            upsert(target, RELATED_PRODUCT_IDS_FIELD, others)
        })
        .collect()
}

/// Link a physical/digital wrapper pair through `related_product_id`.
///
/// When one side is missing, any cross-reference left on the other side is
/// removed.
#[must_use]
pub fn link_pair(first: Option<LinkTarget<'_>>, second: Option<LinkTarget<'_>>) -> Vec<LinkAction> {
    match (first, second) {
        (Some(a), Some(b)) => vec![
            upsert(&a, RELATED_PRODUCT_ID_FIELD, b.product_id.to_string()),
            upsert(&b, RELATED_PRODUCT_ID_FIELD, a.product_id.to_string()),
        ],
        (Some(only), None) | (None, Some(only)) => stale_delete(&only, RELATED_PRODUCT_ID_FIELD)
            .into_iter()
            .collect(),
        (None, None) => Vec::new(),
    }
}

/// Drop the `related_product_id` of a wrapper that stays disabled, so the
/// enabled side is never pointed at from a hidden product.
#[must_use]
pub fn unlink(target: &LinkTarget<'_>) -> Option<LinkAction> {
    stale_delete(target, RELATED_PRODUCT_ID_FIELD)
}

fn upsert(target: &LinkTarget<'_>, name: &str, value: String) -> LinkAction {
    LinkAction::Upsert {
        product_id: target.product_id,
        field: CustomFieldPayload {
            id: target.field(name).map(|f| f.id),
            name: name.to_string(),
            value,
        },
    }
}

fn stale_delete(target: &LinkTarget<'_>, name: &str) -> Option<LinkAction> {
    target.field(name).map(|f| LinkAction::Delete {
        product_id: target.product_id,
        field_id: f.id,
    })
}
