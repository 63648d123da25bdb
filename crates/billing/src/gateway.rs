//! Remote billing gateway boundary
//!
//! The migration engine only talks to the billing system through
//! [`BillingGateway`]. [`crate::client::StripeClient`] is the production
//! implementation; tests substitute an in-memory one.

use async_trait::async_trait;
use elevate_shared::LegacyAddress;
use stripe::{CustomerId, SubscriptionId};

use crate::error::GatewayError;
use crate::metadata::Metadata;

/// Customer object in the billing system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCustomer {
    pub id: CustomerId,
}

/// Recurring billing object (subscription) in the billing system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSubscription {
    pub id: SubscriptionId,
}

/// Parameters for creating a customer
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<LegacyAddress>,
    pub metadata: Metadata,
}

/// Single priced line item of a recurring object, billed monthly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub amount_minor_units: i64,
    /// Lowercase ISO 4217 code
    pub currency: String,
}

/// Parameters for creating a recurring billing object
#[derive(Debug, Clone)]
pub struct RecurringBillingRequest {
    pub customer_id: CustomerId,
    pub line_item: LineItem,
    /// Epoch seconds of the first cycle boundary; `None` anchors at creation time
    pub billing_cycle_anchor: Option<i64>,
    /// Send `proration_behavior=none`
    pub suppress_proration: bool,
    pub metadata: Metadata,
}

/// Operations the migration needs from the billing system.
///
/// All calls are authenticated with the credential the implementation was
/// built with; nothing is passed per call.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Look up a customer by exact email. Case handling is the billing system's.
    async fn search_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RemoteCustomer>, GatewayError>;

    async fn create_customer(&self, customer: &NewCustomer)
        -> Result<RemoteCustomer, GatewayError>;

    async fn create_recurring_billing(
        &self,
        request: &RecurringBillingRequest,
    ) -> Result<RemoteSubscription, GatewayError>;

    /// Merge `metadata` into the customer's existing metadata
    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<RemoteCustomer, GatewayError>;
}
