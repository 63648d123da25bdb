//! Subscription continuity for migrated customers
//!
//! A migrated membership keeps billing on the date the legacy platform would
//! have charged next. The renewal date becomes the subscription's billing
//! cycle anchor and proration is switched off, so the first invoice under
//! Stripe lands on that date for the full plan amount.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use elevate_shared::LegacySubscription;
use stripe::{CustomerId, SubscriptionId};

use crate::error::{BillingError, BillingResult};
use crate::gateway::{BillingGateway, LineItem, RecurringBillingRequest};
use crate::metadata::{Metadata, MetadataKey};
use crate::plans::PlanCatalog;

/// Why no subscription was created for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The legacy membership is no longer billed
    Inactive,
    /// The plan has no entry in the catalog
    UnknownPlan,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Inactive => "inactive",
            SkipReason::UnknownPlan => "unknown plan",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Created(SubscriptionId),
    Skipped(SkipReason),
}

/// Convert a legacy renewal date to epoch seconds.
///
/// Date-only values (`2024-06-15`, `06/15/2024`) are midnight UTC. Full
/// timestamps keep their own offset; timestamps without one are read as UTC.
pub fn renewal_anchor(date: &str) -> BillingResult<i64> {
    let date = date.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(date) {
        return Ok(ts.timestamp());
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(ts.and_utc().timestamp());
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(day) = NaiveDate::parse_from_str(date, format) {
            if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc().timestamp());
            }
        }
    }

    Err(BillingError::InvalidRenewalDate(date.to_string()))
}

/// Creates the recurring billing object for a migrated membership
#[derive(Clone)]
pub struct SubscriptionBuilder {
    gateway: Arc<dyn BillingGateway>,
    catalog: Arc<PlanCatalog>,
    currency: String,
}

impl SubscriptionBuilder {
    pub fn new(
        gateway: Arc<dyn BillingGateway>,
        catalog: Arc<PlanCatalog>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            catalog,
            currency: currency.into(),
        }
    }

    /// Attach the legacy membership to an already resolved customer.
    ///
    /// Errors only describe this step; the customer itself stays in place.
    pub async fn attach_subscription(
        &self,
        customer_id: &CustomerId,
        subscription: &LegacySubscription,
    ) -> BillingResult<SubscriptionOutcome> {
        if !subscription.is_active {
            return Ok(SubscriptionOutcome::Skipped(SkipReason::Inactive));
        }

        let Some(plan) = self.catalog.translate(&subscription.plan_name) else {
            tracing::warn!(
                customer_id = %customer_id,
                plan = %subscription.plan_name,
                "Unknown plan, subscription not migrated"
            );
            return Ok(SubscriptionOutcome::Skipped(SkipReason::UnknownPlan));
        };

        let billing_cycle_anchor = subscription
            .next_renewal_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(renewal_anchor)
            .transpose()?;

        let mut metadata = Metadata::new().with(MetadataKey::MigratedFromWix, "true");
        if let Some(start) = subscription
            .start_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            metadata.insert(MetadataKey::OriginalStartDate, start);
        }

        let request = RecurringBillingRequest {
            customer_id: customer_id.clone(),
            line_item: LineItem {
                name: plan.display_name.clone(),
                amount_minor_units: plan.amount_minor_units,
                currency: self.currency.clone(),
            },
            billing_cycle_anchor,
            // Without an anchor Stripe starts a fresh cycle; nothing to prorate
            suppress_proration: billing_cycle_anchor.is_some(),
            metadata,
        };

        let created = self.gateway.create_recurring_billing(&request).await?;

        tracing::info!(
            customer_id = %customer_id,
            subscription_id = %created.id,
            plan = %plan.display_name,
            billing_cycle_anchor = ?billing_cycle_anchor,
            "Created migrated subscription"
        );

        Ok(SubscriptionOutcome::Created(created.id))
    }
}
