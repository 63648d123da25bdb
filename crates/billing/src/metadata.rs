//! Typed metadata for billing-system objects
//!
//! Stripe stores metadata as a flat string map. Only the keys below are
//! ever written by the migration, and the limits are checked before any
//! request leaves the adapter.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::GatewayError;

/// Stripe allows at most 50 keys per object
pub const MAX_METADATA_KEYS: usize = 50;
/// Stripe rejects keys longer than 40 characters
pub const MAX_METADATA_KEY_LEN: usize = 40;
/// Stripe rejects values longer than 500 characters
pub const MAX_METADATA_VALUE_LEN: usize = 500;

/// Metadata keys written during migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    /// Back-reference to the legacy platform contact id
    LegacyCustomerId,
    /// When the customer was imported (RFC 3339)
    ImportedDate,
    /// Marks objects created by the migration
    MigratedFromWix,
    /// Whether the customer has set a local password (always "false" on import)
    HasPassword,
    /// Start date of the membership on the legacy platform
    OriginalStartDate,
    /// Historical order fields, keyed by 1-based position
    OrderDate(u8),
    OrderAmount(u8),
    OrderItem(u8),
}

impl MetadataKey {
    pub fn as_key(&self) -> Cow<'static, str> {
        match self {
            MetadataKey::LegacyCustomerId => Cow::Borrowed("wix_customer_id"),
            MetadataKey::ImportedDate => Cow::Borrowed("imported_date"),
            MetadataKey::MigratedFromWix => Cow::Borrowed("migrated_from_wix"),
            MetadataKey::HasPassword => Cow::Borrowed("has_password"),
            MetadataKey::OriginalStartDate => Cow::Borrowed("original_start_date"),
            MetadataKey::OrderDate(n) => Cow::Owned(format!("order_{}_date", n)),
            MetadataKey::OrderAmount(n) => Cow::Owned(format!("order_{}_amount", n)),
            MetadataKey::OrderItem(n) => Cow::Owned(format!("order_{}_item", n)),
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

/// Metadata map restricted to [`MetadataKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<MetadataKey, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MetadataKey, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key, value.into());
        self
    }

    /// Builder-style insert
    pub fn with(mut self, key: MetadataKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Check the map against Stripe's metadata limits
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.entries.len() > MAX_METADATA_KEYS {
            return Err(GatewayError::InvalidMetadata(format!(
                "{} keys exceeds the limit of {}",
                self.entries.len(),
                MAX_METADATA_KEYS
            )));
        }

        for (key, value) in &self.entries {
            let key = key.as_key();
            if key.len() > MAX_METADATA_KEY_LEN {
                return Err(GatewayError::InvalidMetadata(format!(
                    "key '{}' is longer than {} characters",
                    key, MAX_METADATA_KEY_LEN
                )));
            }
            if value.chars().count() > MAX_METADATA_VALUE_LEN {
                return Err(GatewayError::InvalidMetadata(format!(
                    "value for '{}' is longer than {} characters",
                    key, MAX_METADATA_VALUE_LEN
                )));
            }
        }

        Ok(())
    }

    /// Flatten into the string map Stripe request parameters carry
    pub fn to_stripe(&self) -> stripe::Metadata {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_key().into_owned(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(MetadataKey::LegacyCustomerId.as_key(), "wix_customer_id");
        assert_eq!(MetadataKey::HasPassword.as_key(), "has_password");
        assert_eq!(MetadataKey::OrderDate(1).as_key(), "order_1_date");
        assert_eq!(MetadataKey::OrderAmount(5).to_string(), "order_5_amount");
        assert_eq!(MetadataKey::OrderItem(3).as_key(), "order_3_item");
    }

    #[test]
    fn test_to_stripe_uses_wire_keys() {
        let metadata = Metadata::new()
            .with(MetadataKey::MigratedFromWix, "true")
            .with(MetadataKey::OrderItem(2), "Day Pass");

        let params = metadata.to_stripe();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("migrated_from_wix").map(String::as_str), Some("true"));
        assert_eq!(params.get("order_2_item").map(String::as_str), Some("Day Pass"));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let metadata = Metadata::new().with(MetadataKey::OrderItem(1), "x".repeat(501));
        assert!(matches!(
            metadata.validate(),
            Err(GatewayError::InvalidMetadata(_))
        ));

        let metadata = Metadata::new().with(MetadataKey::OrderItem(1), "x".repeat(500));
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn test_too_many_keys_rejected() {
        let mut metadata = Metadata::new();
        for n in 1..=17 {
            metadata
                .insert(MetadataKey::OrderDate(n), "2024-01-01")
                .insert(MetadataKey::OrderAmount(n), "10")
                .insert(MetadataKey::OrderItem(n), "Item");
        }
        assert_eq!(metadata.len(), 51);
        assert!(metadata.validate().is_err());
    }
}
