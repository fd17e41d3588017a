//! Newtype IDs for remote catalog entities.
//!
//! Every entity the catalog hands back owns a permanent numeric identifier.
//! The `define_id!` macro wraps each in its own type so a custom field id can
//! never be passed where a product id is expected.

/// Macro to define a type-safe remote ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
/// - `Display` printing the bare number (used when building URLs and CSVs)
///
/// # Example
///
/// ```rust
/// # use catalog_sync_core::define_id;
/// define_id!(BrandId);
/// define_id!(ChannelId);
///
/// let brand_id = BrandId::new(1);
/// let channel_id = ChannelId::new(1);
///
/// assert_eq!(brand_id.to_string(), "1");
/// // These are different types, so this won't compile:
/// // let _: BrandId = channel_id;
/// # let _ = channel_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Remote catalog entity IDs
define_id!(ProductId);
define_id!(CustomFieldId);
define_id!(MetafieldId);
define_id!(OptionId);
define_id!(OptionValueId);
define_id!(VariantId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_is_bare_number() {
        assert_eq!(ProductId::new(42).to_string(), "42");
    }

    #[test]
    fn test_id_serde_transparent() {
        let json = serde_json::to_string(&VariantId::new(7)).unwrap();
        assert_eq!(json, "7");

        let parsed: OptionValueId = serde_json::from_str("13").unwrap();
        assert_eq!(parsed.as_i64(), 13);
    }

    #[test]
    fn test_id_conversions() {
        let id = CustomFieldId::from(99);
        let raw: i64 = id.into();
        assert_eq!(raw, 99);
    }
}
