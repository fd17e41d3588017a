//! Source record to catalog payload mapping.
//!
//! Everything here is pure. The current time is part of [`MappingContext`]
//! so availability decisions are reproducible in tests.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::settings::SyncSettings;
use crate::types::{
    CatalogAvailability, InventoryTracking, ProductPayload, ProductType, QuantitativeValue,
    RemoteProduct, SourceAvailability, SourceProduct, SubBundle, SubBundleKind,
};

/// Separator between a product name and its SKU when disambiguating.
pub const DISAMBIGUATION_SEPARATOR: &str = " |~ ";

/// Suffix appended to the names of digital products.
pub const DIGITAL_SUFFIX: &str = " (Digital)";

/// Additional property holding the meta description.
pub const META_DESCRIPTION_PROPERTY: &str = "meta_description";

/// Bundle-level inputs to the mapper.
#[derive(Debug, Clone)]
pub struct MappingContext<'a> {
    pub now: DateTime<Utc>,
    pub disambiguate: bool,
    pub track_inventory: bool,
    /// Extra search terms, typically every SKU in the bundle.
    pub additional_search_terms: &'a [String],
    pub preorder_message: Option<&'a str>,
}

impl<'a> MappingContext<'a> {
    #[must_use]
    pub fn new(settings: &'a SyncSettings, now: DateTime<Utc>) -> Self {
        Self {
            now,
            disambiguate: settings.disambiguate,
            track_inventory: settings.track_inventory,
            additional_search_terms: &[],
            preorder_message: settings.preorder_message.as_deref(),
        }
    }

    #[must_use]
    pub fn with_search_terms(mut self, terms: &'a [String]) -> Self {
        self.additional_search_terms = terms;
        self
    }
}

/// Catalog availability plus the release date when it is a preorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityDecision {
    pub availability: CatalogAvailability,
    pub release_date: Option<DateTime<Utc>>,
}

impl AvailabilityDecision {
    const fn disabled() -> Self {
        Self {
            availability: CatalogAvailability::Disabled,
            release_date: None,
        }
    }

    const fn rank(&self) -> u8 {
        match self.availability {
            CatalogAvailability::Available => 2,
            CatalogAvailability::Preorder => 1,
            CatalogAvailability::Disabled => 0,
        }
    }
}

/// Decide catalog availability for a source record.
///
/// Not-available and disabled records are disabled; a future release date
/// makes a preorder; otherwise the record is available once published. A
/// missing or unreadable publication date counts as published.
#[must_use]
pub fn availability(source: &SourceProduct, now: DateTime<Utc>) -> AvailabilityDecision {
    if matches!(
        source.availability,
        SourceAvailability::NotAvailable | SourceAvailability::Disabled
    ) {
        return AvailabilityDecision::disabled();
    }

    if let Some(release) = source.release_date.as_deref().and_then(parse_date)
        && release > now
    {
        return AvailabilityDecision {
            availability: CatalogAvailability::Preorder,
            release_date: Some(release),
        };
    }

    match source.date_published.as_deref().and_then(parse_date) {
        Some(published) if published > now => AvailabilityDecision::disabled(),
        _ => AvailabilityDecision {
            availability: CatalogAvailability::Available,
            release_date: None,
        },
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Map one source record to a product payload.
///
/// With `existing`, the payload targets that record: its id is attached,
/// its visibility is preserved and `inventory_tracking` is only sent when
/// it would change.
#[must_use]
pub fn map_product(
    source: &SourceProduct,
    existing: Option<&RemoteProduct>,
    ctx: &MappingContext<'_>,
) -> ProductPayload {
    let product_type = if source.is_digital {
        ProductType::Digital
    } else {
        ProductType::Physical
    };
    let tracking = tracking_for(product_type, ctx, InventoryTracking::Product);

    build_payload(
        source,
        &source.sku,
        product_type,
        availability(source, ctx.now),
        tracking,
        existing,
        ctx,
        &[],
    )
}

/// Map a sub-bundle to the payload of its wrapper product.
///
/// The wrapper takes its attributes from the default member, its SKU from
/// [`SubBundle::wrapper_sku`] and the best availability of any member.
/// Identifiers stay on the variants. Returns `None` for an empty sub-bundle.
#[must_use]
pub fn map_wrapper(
    sub: &SubBundle<'_>,
    existing: Option<&RemoteProduct>,
    ctx: &MappingContext<'_>,
) -> Option<ProductPayload> {
    let default = sub.default_member()?;
    let sku = sub.wrapper_sku()?;
    let product_type = match sub.kind {
        SubBundleKind::Physical => ProductType::Physical,
        SubBundleKind::Digital => ProductType::Digital,
    };
    let tracking = tracking_for(product_type, ctx, InventoryTracking::Variant);

    let decision = sub
        .members
        .iter()
        .map(|m| availability(m, ctx.now))
        .max_by_key(AvailabilityDecision::rank)
        .unwrap_or_else(AvailabilityDecision::disabled);
    let member_skus: Vec<String> = sub.members.iter().map(|m| m.sku.clone()).collect();

    let mut payload = build_payload(
        default,
        &sku,
        product_type,
        decision,
        tracking,
        existing,
        ctx,
        &member_skus,
    );
    payload.upc = None;
    payload.gtin = None;
    Some(payload)
}

const fn tracking_for(
    product_type: ProductType,
    ctx: &MappingContext<'_>,
    tracked: InventoryTracking,
) -> InventoryTracking {
    if matches!(product_type, ProductType::Digital) || !ctx.track_inventory {
        InventoryTracking::None
    } else {
        tracked
    }
}

#[allow(clippy::too_many_arguments)]
fn build_payload(
    source: &SourceProduct,
    sku: &str,
    product_type: ProductType,
    decision: AvailabilityDecision,
    tracking: InventoryTracking,
    existing: Option<&RemoteProduct>,
    ctx: &MappingContext<'_>,
    extra_terms: &[String],
) -> ProductPayload {
    let mut name = source.name.clone();
    let mut page_title = None;
    if ctx.disambiguate {
        page_title = Some(source.name.clone());
        name = format!("{name}{DISAMBIGUATION_SEPARATOR}{sku}");
    }
    if product_type == ProductType::Digital {
        name.push_str(DIGITAL_SUFFIX);
    }

    let inventory_tracking = match existing {
        Some(remote) if remote.inventory_tracking == Some(tracking) => None,
        _ => Some(tracking),
    };

    let isbn = non_blank(source.isbn.as_deref());
    let gtin = non_blank(source.gtin12.as_deref());

    let preorder = decision.availability == CatalogAvailability::Preorder;

    ProductPayload {
        id: existing.map(|r| r.id),
        name,
        sku: sku.to_string(),
        product_type,
        description: source.description.clone().unwrap_or_default(),
        price: source.price.unwrap_or(Decimal::ZERO),
        categories: source
            .categories
            .iter()
            .filter_map(|c| c.catalog_id())
            .collect(),
        availability: decision.availability,
        weight: dimension(source.weight.as_ref()),
        width: dimension(source.width.as_ref()),
        depth: dimension(source.depth.as_ref()),
        height: dimension(source.height.as_ref()),
        meta_keywords: source.keyword_list(),
        meta_description: source
            .additional_property_str(META_DESCRIPTION_PROPERTY)
            .unwrap_or_default(),
        search_keywords: search_keywords(
            source,
            ctx.additional_search_terms.iter().chain(extra_terms),
        ),
        is_visible: existing.is_none_or(|r| r.is_visible),
        page_title,
        upc: isbn.clone().or_else(|| gtin.clone()),
        gtin,
        inventory_tracking,
        preorder_release_date: decision.release_date.map(|d| d.to_rfc3339()),
        preorder_message: if preorder {
            ctx.preorder_message.map(String::from)
        } else {
            None
        },
        custom_fields: Vec::new(),
    }
}

/// Deduplicated, comma-joined keywords, ISBN and extra terms in first-seen order.
fn search_keywords<'a>(source: &SourceProduct, extra: impl Iterator<Item = &'a String>) -> String {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    let candidates = source
        .keyword_list()
        .into_iter()
        .chain(non_blank(source.isbn.as_deref()))
        .chain(extra.map(|t| t.trim().to_string()));

    for term in candidates {
        if !term.is_empty() && seen.insert(term.clone()) {
            terms.push(term);
        }
    }

    terms.join(",")
}

/// Stringified dimension, `"0"` when absent.
#[must_use]
pub fn dimension(value: Option<&QuantitativeValue>) -> String {
    value
        .and_then(|q| q.value)
        .map_or_else(|| "0".to_string(), |d| d.normalize().to_string())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ProductBundle, ProductId};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn source(value: serde_json::Value) -> SourceProduct {
        serde_json::from_value(value).unwrap()
    }

    fn remote(inventory_tracking: Option<InventoryTracking>, is_visible: bool) -> RemoteProduct {
        RemoteProduct {
            id: ProductId::new(77),
            sku: "ABC123".to_string(),
            name: "Widget".to_string(),
            is_visible,
            inventory_tracking,
            custom_fields: vec![],
            options: vec![],
            variants: vec![],
            other: BTreeMap::new(),
        }
    }

    fn ctx(settings: &SyncSettings) -> MappingContext<'_> {
        MappingContext::new(settings, now())
    }

    #[test]
    fn test_disambiguated_digital_name() {
        let settings = SyncSettings {
            disambiguate: true,
            ..SyncSettings::default()
        };
        let p = source(json!({"sku": "ABC123", "name": "Widget", "isDigital": true}));

        let payload = map_product(&p, None, &ctx(&settings));

        assert_eq!(payload.name, "Widget |~ ABC123 (Digital)");
        assert_eq!(payload.page_title.as_deref(), Some("Widget"));
        assert_eq!(payload.product_type, ProductType::Digital);
    }

    #[test]
    fn test_plain_name_without_disambiguation() {
        let settings = SyncSettings::default();
        let p = source(json!({"sku": "ABC123", "name": "Widget"}));

        let payload = map_product(&p, None, &ctx(&settings));

        assert_eq!(payload.name, "Widget");
        assert_eq!(payload.page_title, None);
    }

    #[test]
    fn test_availability_rules() {
        let n = now();
        let decide = |v| availability(&source(v), n).availability;

        assert_eq!(
            decide(json!({"sku": "A", "availability": "not-available", "releaseDate": "2030-01-01"})),
            CatalogAvailability::Disabled
        );
        assert_eq!(
            decide(json!({"sku": "A", "releaseDate": "2030-01-01"})),
            CatalogAvailability::Preorder
        );
        assert_eq!(
            decide(json!({"sku": "A", "datePublished": "2020-01-01"})),
            CatalogAvailability::Available
        );
        assert_eq!(
            decide(json!({"sku": "A", "datePublished": "2030-01-01"})),
            CatalogAvailability::Disabled
        );
        assert_eq!(decide(json!({"sku": "A"})), CatalogAvailability::Available);
    }

    #[test]
    fn test_preorder_fields() {
        let settings = SyncSettings {
            preorder_message: Some("Ships %%DATE%%".to_string()),
            ..SyncSettings::default()
        };
        let p = source(json!({"sku": "A", "releaseDate": "2030-01-01T00:00:00Z"}));

        let payload = map_product(&p, None, &ctx(&settings));

        assert_eq!(payload.availability, CatalogAvailability::Preorder);
        assert_eq!(
            payload.preorder_release_date.as_deref(),
            Some("2030-01-01T00:00:00+00:00")
        );
        assert_eq!(payload.preorder_message.as_deref(), Some("Ships %%DATE%%"));
    }

    #[test]
    fn test_inventory_tracking_only_sent_on_change() {
        let settings = SyncSettings::default();
        let p = source(json!({"sku": "ABC123", "name": "Widget"}));

        let new = map_product(&p, None, &ctx(&settings));
        assert_eq!(new.inventory_tracking, Some(InventoryTracking::Product));

        let same = remote(Some(InventoryTracking::Product), true);
        assert_eq!(map_product(&p, Some(&same), &ctx(&settings)).inventory_tracking, None);

        let differs = remote(Some(InventoryTracking::None), true);
        assert_eq!(
            map_product(&p, Some(&differs), &ctx(&settings)).inventory_tracking,
            Some(InventoryTracking::Product)
        );
    }

    #[test]
    fn test_digital_and_untracked_use_none() {
        let untracked = SyncSettings {
            track_inventory: false,
            ..SyncSettings::default()
        };
        let p = source(json!({"sku": "A"}));
        assert_eq!(
            map_product(&p, None, &ctx(&untracked)).inventory_tracking,
            Some(InventoryTracking::None)
        );

        let settings = SyncSettings::default();
        let digital = source(json!({"sku": "A", "isDigital": true}));
        assert_eq!(
            map_product(&digital, None, &ctx(&settings)).inventory_tracking,
            Some(InventoryTracking::None)
        );
    }

    #[test]
    fn test_visibility_preserved() {
        let settings = SyncSettings::default();
        let p = source(json!({"sku": "ABC123"}));

        assert!(map_product(&p, None, &ctx(&settings)).is_visible);

        let hidden = remote(None, false);
        let payload = map_product(&p, Some(&hidden), &ctx(&settings));
        assert!(!payload.is_visible);
        assert_eq!(payload.id, Some(ProductId::new(77)));
    }

    #[test]
    fn test_search_keywords_are_deduplicated() {
        let settings = SyncSettings::default();
        let terms = vec!["A".to_string(), "B".to_string(), "9780000000001".to_string()];
        let p = source(json!({
            "sku": "A",
            "keywords": "dragons, fantasy, dragons",
            "isbn": "9780000000001"
        }));

        let payload = map_product(&p, None, &ctx(&settings).with_search_terms(&terms));

        assert_eq!(payload.search_keywords, "dragons,fantasy,9780000000001,A,B");
        assert_eq!(payload.meta_keywords, vec!["dragons", "fantasy", "dragons"]);
    }

    #[test]
    fn test_identifiers_and_defaults() {
        let settings = SyncSettings::default();
        let p = source(json!({
            "sku": "A",
            "isbn": "9780000000001",
            "gtin12": "000000000001",
            "weight": {"value": "1.50", "unitText": "lb"},
            "categories": [{"identifier": "12"}, {"identifier": "fiction"}],
            "additionalProperty": [{"propertyID": "meta_description", "value": "A book"}]
        }));

        let payload = map_product(&p, None, &ctx(&settings));

        assert_eq!(payload.upc.as_deref(), Some("9780000000001"));
        assert_eq!(payload.gtin.as_deref(), Some("000000000001"));
        assert_eq!(payload.weight, "1.5");
        assert_eq!(payload.width, "0");
        assert_eq!(payload.categories, vec![12]);
        assert_eq!(payload.meta_description, "A book");
        assert_eq!(payload.price, Decimal::ZERO);
    }

    #[test]
    fn test_upc_falls_back_to_gtin() {
        let settings = SyncSettings::default();
        let p = source(json!({"sku": "A", "gtin12": "000000000001"}));
        assert_eq!(
            map_product(&p, None, &ctx(&settings)).upc.as_deref(),
            Some("000000000001")
        );
    }

    #[test]
    fn test_wrapper_payload() {
        let settings = SyncSettings::default();
        let bundle = ProductBundle {
            products: vec![
                source(json!({"sku": "HC", "name": "Widget", "availability": "disabled"})),
                source(json!({"sku": "PB", "name": "Widget PB", "isDefault": true, "isbn": "978"})),
            ],
        };
        let halves = bundle.split();
        let physical = halves.first().unwrap();

        let payload = map_wrapper(physical, None, &ctx(&settings)).unwrap();

        assert_eq!(payload.sku, "PB-W");
        assert_eq!(payload.name, "Widget PB");
        assert_eq!(payload.availability, CatalogAvailability::Available);
        assert_eq!(payload.inventory_tracking, Some(InventoryTracking::Variant));
        assert_eq!(payload.upc, None);
        assert!(payload.search_keywords.contains("HC"));
        assert!(payload.search_keywords.contains("PB"));
    }
}
