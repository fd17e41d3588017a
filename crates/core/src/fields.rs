//! Custom field and metafield reconciliation.
//!
//! Both field kinds are plain name/value pairs on a product, so one algorithm
//! serves both: evaluate the configured rules against the source record, then
//! diff the result against what the catalog already holds.
//!
//! The catalog rejects blank values, so a rule that yields nothing (or only
//! whitespace) never produces an upsert; any existing field of that name is
//! left unmatched and therefore deleted.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::settings::{FieldRule, FieldSource};
use crate::types::{
    CustomField, CustomFieldId, CustomFieldPayload, Metafield, MetafieldId, MetafieldPayload,
    SourceProduct,
};

/// Permission set for metafields written by this sync.
pub const METAFIELD_PERMISSION_SET: &str = "write";

/// A field as it exists in the catalog.
pub trait RemoteField: Clone {
    type Id: Copy + Eq;

    fn id(&self) -> Self::Id;
    fn name(&self) -> &str;
    fn value(&self) -> &str;

    /// Namespace owning the field, for kinds that have one.
    fn namespace(&self) -> Option<&str> {
        None
    }
}

impl RemoteField for CustomField {
    type Id = CustomFieldId;

    fn id(&self) -> CustomFieldId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> &str {
        &self.value
    }
}

impl RemoteField for Metafield {
    type Id = MetafieldId;

    fn id(&self) -> MetafieldId {
        self.id
    }

    fn name(&self) -> &str {
        &self.key
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }
}

/// A field value computed from one rule. `None` means "should not exist".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredField {
    pub name: String,
    pub value: Option<String>,
}

impl DesiredField {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A create (no id) or update (with id) of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpsert<Id> {
    pub id: Option<Id>,
    pub name: String,
    pub value: String,
}

impl FieldUpsert<CustomFieldId> {
    #[must_use]
    pub fn into_custom_field(self) -> CustomFieldPayload {
        CustomFieldPayload {
            id: self.id,
            name: self.name,
            value: self.value,
        }
    }
}

impl FieldUpsert<MetafieldId> {
    #[must_use]
    pub fn into_metafield(self, namespace: &str) -> MetafieldPayload {
        MetafieldPayload {
            id: self.id,
            namespace: namespace.to_string(),
            key: self.name,
            value: self.value,
            permission_set: METAFIELD_PERMISSION_SET.to_string(),
        }
    }
}

/// The writes needed to converge one product's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChanges<F: RemoteField> {
    /// Fields to create or update.
    pub upserts: Vec<FieldUpsert<F::Id>>,
    /// Fields to delete.
    pub deletes: Vec<F>,
    /// Fields already holding the desired value.
    pub unchanged: Vec<F>,
}

impl<F: RemoteField> FieldChanges<F> {
    /// Whether no write is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Every field that should exist once the changes are applied.
    #[must_use]
    pub fn desired_state(&self) -> Vec<FieldUpsert<F::Id>> {
        self.unchanged
            .iter()
            .map(|f| FieldUpsert {
                id: Some(f.id()),
                name: f.name().to_string(),
                value: f.value().to_string(),
            })
            .chain(self.upserts.iter().cloned())
            .collect()
    }
}

/// Evaluate field rules against a source record.
#[must_use]
pub fn desired_fields(rules: &[FieldRule], source: &SourceProduct) -> Vec<DesiredField> {
    let needs_properties = rules
        .iter()
        .any(|r| matches!(r.source, FieldSource::Property { .. }));
    let properties = if needs_properties {
        source.properties()
    } else {
        serde_json::Map::new()
    };

    rules
        .iter()
        .map(|rule| {
            let value = match &rule.source {
                FieldSource::Property { property } => properties.get(property),
                FieldSource::AdditionalProperty { property_id } => {
                    source.additional_property(property_id)
                }
            };
            DesiredField::new(rule.field.clone(), value.and_then(field_value))
        })
        .collect()
}

/// Stringify a source value for a field, `None` for null.
#[must_use]
pub fn field_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Diff desired fields against existing ones.
///
/// With a `namespace`, existing fields from any other namespace are ignored
/// entirely: never updated, never deleted.
#[must_use]
pub fn reconcile<F: RemoteField>(
    desired: &[DesiredField],
    existing: &[F],
    namespace: Option<&str>,
) -> FieldChanges<F> {
    let scoped: Vec<&F> = existing
        .iter()
        .filter(|f| namespace.is_none_or(|ns| f.namespace() == Some(ns)))
        .collect();

    // First field of a name wins; later duplicates fall through to deletion.
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (index, field) in scoped.iter().enumerate() {
        by_name.entry(field.name()).or_insert(index);
    }

    let mut matched: HashSet<usize> = HashSet::new();
    let mut upserts = Vec::new();
    let mut unchanged = Vec::new();

    for field in desired {
        let Some(value) = field.value.as_deref().filter(|v| !v.trim().is_empty()) else {
            continue;
        };

        let current = by_name.get(field.name.as_str()).copied();
        if let Some(index) = current
            && !matched.insert(index)
        {
            continue;
        }

        match current.and_then(|i| scoped.get(i)) {
            Some(remote) if remote.value() == value => unchanged.push((*remote).clone()),
            Some(remote) => upserts.push(FieldUpsert {
                id: Some(remote.id()),
                name: field.name.clone(),
                value: value.to_string(),
            }),
            None => upserts.push(FieldUpsert {
                id: None,
                name: field.name.clone(),
                value: value.to_string(),
            }),
        }
    }

    let deletes = scoped
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched.contains(index))
        .map(|(_, f)| (*f).clone())
        .collect();

    FieldChanges {
        upserts,
        deletes,
        unchanged,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ProductId;
    use serde_json::json;

    fn custom(id: i64, name: &str, value: &str) -> CustomField {
        CustomField {
            id: CustomFieldId::new(id),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn meta(id: i64, namespace: &str, key: &str, value: &str) -> Metafield {
        Metafield {
            id: MetafieldId::new(id),
            key: key.to_string(),
            value: value.to_string(),
            namespace: namespace.to_string(),
            permission_set: Some("write".to_string()),
            description: None,
            resource_id: Some(ProductId::new(1)),
        }
    }

    fn desired(pairs: &[(&str, Option<&str>)]) -> Vec<DesiredField> {
        pairs
            .iter()
            .map(|(name, value)| DesiredField::new(*name, value.map(String::from)))
            .collect()
    }

    /// Apply changes the way the catalog would, allocating ids from 1000.
    fn apply(existing: &[CustomField], changes: &FieldChanges<CustomField>) -> Vec<CustomField> {
        let deleted: HashSet<CustomFieldId> = changes.deletes.iter().map(|f| f.id).collect();
        let mut result: Vec<CustomField> = existing
            .iter()
            .filter(|f| !deleted.contains(&f.id))
            .cloned()
            .collect();
        let mut next_id = 1000;
        for upsert in &changes.upserts {
            if let Some(id) = upsert.id {
                let field = result.iter_mut().find(|f| f.id == id).unwrap();
                field.value.clone_from(&upsert.value);
            } else {
                result.push(custom(next_id, &upsert.name, &upsert.value));
                next_id += 1;
            }
        }
        result
    }

    #[test]
    fn test_create_update_and_delete() {
        let existing = vec![custom(1, "format", "Paperback"), custom(2, "stale", "x")];
        let changes = reconcile(
            &desired(&[("format", Some("Hardcover")), ("audience", Some("adult"))]),
            &existing,
            None,
        );

        assert_eq!(
            changes.upserts,
            vec![
                FieldUpsert {
                    id: Some(CustomFieldId::new(1)),
                    name: "format".to_string(),
                    value: "Hardcover".to_string(),
                },
                FieldUpsert {
                    id: None,
                    name: "audience".to_string(),
                    value: "adult".to_string(),
                },
            ]
        );
        assert_eq!(changes.deletes, vec![custom(2, "stale", "x")]);
    }

    #[test]
    fn test_blank_value_deletes_field() {
        let existing = vec![custom(1, "color", "red")];
        let changes = reconcile(&desired(&[("color", Some(""))]), &existing, None);

        assert!(changes.upserts.is_empty());
        assert_eq!(changes.deletes, existing);
    }

    #[test]
    fn test_null_value_deletes_field() {
        let existing = vec![custom(1, "color", "red")];
        let changes = reconcile(&desired(&[("color", None)]), &existing, None);

        assert!(changes.upserts.is_empty());
        assert_eq!(changes.deletes.len(), 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let existing = vec![custom(1, "format", "Paperback"), custom(2, "stale", "x")];
        let want = desired(&[
            ("format", Some("Hardcover")),
            ("audience", Some("adult")),
            ("blank", Some("  ")),
        ]);

        let first = reconcile(&want, &existing, None);
        let applied = apply(&existing, &first);
        let second = reconcile(&want, &applied, None);

        assert!(second.is_empty(), "second pass should be empty: {second:?}");
        assert_eq!(second.unchanged.len(), 2);
    }

    #[test]
    fn test_duplicate_remote_names_are_collapsed() {
        let existing = vec![custom(1, "format", "Hardcover"), custom(2, "format", "Hardcover")];
        let changes = reconcile(&desired(&[("format", Some("Hardcover"))]), &existing, None);

        assert!(changes.upserts.is_empty());
        assert_eq!(changes.deletes, vec![custom(2, "format", "Hardcover")]);
    }

    #[test]
    fn test_namespace_isolation() {
        let existing = vec![
            meta(1, "acumen", "series", "Book 1"),
            meta(2, "acumen", "obsolete", "x"),
            meta(3, "reviews", "series", "someone else's"),
            meta(4, "reviews", "rating", "5"),
        ];
        let changes = reconcile(
            &desired(&[("series", Some("Book 2")), ("rating", None)]),
            &existing,
            Some("acumen"),
        );

        assert_eq!(changes.upserts.len(), 1);
        assert_eq!(
            changes.upserts.first().and_then(|u| u.id),
            Some(MetafieldId::new(1))
        );
        assert_eq!(changes.deletes, vec![meta(2, "acumen", "obsolete", "x")]);
        assert!(changes.deletes.iter().all(|f| f.namespace == "acumen"));
    }

    #[test]
    fn test_desired_fields_from_rules() {
        let source: SourceProduct = serde_json::from_value(json!({
            "sku": "A",
            "datePublished": "2020-05-01",
            "pageCount": 320,
            "additionalProperty": [
                {"propertyID": "audience", "value": "adult"},
                {"propertyID": "empty", "value": null}
            ]
        }))
        .unwrap();
        let rules = vec![
            FieldRule::property("datePublished", "publication_date"),
            FieldRule::property("pageCount", "pages"),
            FieldRule::property("missing", "missing"),
            FieldRule::additional_property("audience", "audience"),
            FieldRule::additional_property("empty", "empty"),
        ];

        assert_eq!(
            desired_fields(&rules, &source),
            vec![
                DesiredField::new("publication_date", Some("2020-05-01".to_string())),
                DesiredField::new("pages", Some("320".to_string())),
                DesiredField::new("missing", None),
                DesiredField::new("audience", Some("adult".to_string())),
                DesiredField::new("empty", None),
            ]
        );
    }

    #[test]
    fn test_metafield_payload_carries_namespace() {
        let upsert = FieldUpsert {
            id: None,
            name: "series".to_string(),
            value: "Book 1".to_string(),
        };
        let payload = upsert.into_metafield("acumen");
        assert_eq!(payload.namespace, "acumen");
        assert_eq!(payload.key, "series");
        assert_eq!(payload.permission_set, METAFIELD_PERMISSION_SET);
    }
}
