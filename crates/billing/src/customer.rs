//! Customer identity resolution for migrated records

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use elevate_shared::LegacyCustomerRecord;
use stripe::CustomerId;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{BillingGateway, NewCustomer};
use crate::metadata::{Metadata, MetadataKey};

/// Billing-system customer resolved for a legacy record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCustomer {
    pub id: CustomerId,
    /// The customer was already present and left untouched
    pub was_existing: bool,
}

/// Find-or-create of billing customers keyed by email.
///
/// The search and the create are two separate gateway calls with no lock or
/// idempotency key between them. Two imports of the same email running at
/// the same time (or within the search index's refresh delay) can both miss
/// the search and create two customers. All find-or-create traffic goes
/// through [`CustomerImporter::import_one`] so that a guard can be added here
/// without touching callers.
#[derive(Clone)]
pub struct CustomerImporter {
    gateway: Arc<dyn BillingGateway>,
}

impl CustomerImporter {
    pub fn new(gateway: Arc<dyn BillingGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve the billing customer for one record, creating it if absent.
    ///
    /// An existing customer is returned as is; nothing on it is modified.
    pub async fn import_one(&self, record: &LegacyCustomerRecord) -> BillingResult<ResolvedCustomer> {
        let email = record.email.trim();
        if email.is_empty() {
            return Err(BillingError::InvalidRecord("missing email".to_string()));
        }

        if let Some(existing) = self.gateway.search_customer_by_email(email).await? {
            tracing::debug!(
                email = %email,
                customer_id = %existing.id,
                "Customer already exists in Stripe"
            );
            return Ok(ResolvedCustomer {
                id: existing.id,
                was_existing: true,
            });
        }

        let params = NewCustomer {
            email: email.to_string(),
            name: record.name.clone(),
            phone: record.phone.clone(),
            address: record.address.clone().filter(|a| !a.is_empty()),
            metadata: Self::provenance(record),
        };

        let customer = self.gateway.create_customer(&params).await?;

        tracing::info!(
            email = %email,
            customer_id = %customer.id,
            "Created Stripe customer"
        );

        Ok(ResolvedCustomer {
            id: customer.id,
            was_existing: false,
        })
    }

    /// Migration provenance stored on every customer created here
    fn provenance(record: &LegacyCustomerRecord) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(legacy_id) = record.legacy_id.as_deref().filter(|v| !v.is_empty()) {
            metadata.insert(MetadataKey::LegacyCustomerId, legacy_id);
        }
        metadata
            .insert(
                MetadataKey::ImportedDate,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .insert(MetadataKey::MigratedFromWix, "true")
            // Flipped by the password flow once the customer sets one
            .insert(MetadataKey::HasPassword, "false");
        metadata
    }
}
