//! Legacy platform records
//!
//! Wire shape of the customer export produced from the legacy platform.
//! Field names follow the export (`wixId`, `orderHistory`, `postal_code`),
//! so the same types read the converter's output and the import payload.

use serde::{Deserialize, Deserializer, Serialize};

/// One customer as exported from the legacy platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCustomerRecord {
    /// Matching key against the billing system. An empty email is kept so the
    /// record can fail on its own instead of rejecting the whole batch.
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Legacy platform contact id, stored as a back-reference on the new customer
    #[serde(default, rename = "wixId", skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<LegacyAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<LegacySubscription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_history: Vec<LegacyOrder>,
}

impl LegacyCustomerRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    /// The subscription to carry over, if the legacy platform still bills it
    pub fn active_subscription(&self) -> Option<&LegacySubscription> {
        self.subscription.as_ref().filter(|s| s.is_active)
    }
}

/// Postal address; every field is optional and submitted independently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl LegacyAddress {
    /// Fields that carry a non-blank value, paired with their billing-system name
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }
}

/// Recurring membership on the legacy platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySubscription {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Date the legacy platform would next have charged the customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_renewal_date: Option<String>,
}

/// Historical order, kept only as reference metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyOrder {
    #[serde(default)]
    pub date: String,
    /// Exports carry totals either as text ("49.00") or as numbers
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default)]
    pub item: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Decimal(f64),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
        Raw::Decimal(n) => n.to_string(),
        Raw::Null => String::new(),
    })
}
