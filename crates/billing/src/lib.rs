// Billing crate clippy configuration
#![allow(clippy::result_large_err)] // BillingError carries gateway error detail
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Elevate Billing Migration
//!
//! Moves customers from the legacy commerce platform into Stripe.
//!
//! ## Features
//!
//! - **Identity Resolution**: Find-or-create Stripe customers by email
//! - **Subscription Continuity**: Recreate active memberships anchored on
//!   the legacy renewal date, without proration
//! - **Order History**: Keep the first legacy orders as customer metadata
//! - **Batch Import**: Bounded-concurrency import with a per-record ledger

pub mod client;
pub mod config;
pub mod customer;
pub mod error;
pub mod gateway;
pub mod history;
pub mod import;
pub mod metadata;
pub mod plans;
pub mod subscriptions;

#[cfg(test)]
mod testing;

// Client
pub use client::{StripeClient, StripeConfig};

// Config
pub use config::MigrationConfig;

// Customer
pub use customer::{CustomerImporter, ResolvedCustomer};

// Error
pub use error::{BillingError, BillingResult, GatewayError};

// Gateway
pub use gateway::{
    BillingGateway, LineItem, NewCustomer, RecurringBillingRequest, RemoteCustomer,
    RemoteSubscription,
};

// History
pub use history::{HistoryAnnotator, HistoryOutcome, ORDER_HISTORY_CAP};

// Import
pub use import::{
    FailedImport, ImportLedger, ImportOutcome, ImportService, ImportStatus, ImportedCustomer,
    RecordReport, SubscriptionStep,
};

// Metadata
pub use metadata::{Metadata, MetadataKey};

// Plans
pub use plans::{PlanCatalog, PlanMapping};

// Subscriptions
pub use subscriptions::{renewal_anchor, SkipReason, SubscriptionBuilder, SubscriptionOutcome};
