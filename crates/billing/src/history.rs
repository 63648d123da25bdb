//! Legacy order history annotations
//!
//! Stripe has no notion of orders placed before migration. The first few
//! orders are kept as customer metadata for support reference only.

use std::sync::Arc;

use elevate_shared::LegacyOrder;
use stripe::CustomerId;

use crate::gateway::BillingGateway;
use crate::metadata::{Metadata, MetadataKey};

/// Number of orders copied onto the customer, counted from the start of
/// the export. Positional, not the most recent.
pub const ORDER_HISTORY_CAP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Number of orders written
    Annotated(usize),
    Skipped,
}

#[derive(Clone)]
pub struct HistoryAnnotator {
    gateway: Arc<dyn BillingGateway>,
}

impl HistoryAnnotator {
    pub fn new(gateway: Arc<dyn BillingGateway>) -> Self {
        Self { gateway }
    }

    /// Metadata for the first [`ORDER_HISTORY_CAP`] orders, 1-based
    pub fn history_metadata(orders: &[LegacyOrder]) -> Metadata {
        let mut metadata = Metadata::new();
        for (position, order) in (1u8..).zip(orders.iter().take(ORDER_HISTORY_CAP)) {
            metadata
                .insert(MetadataKey::OrderDate(position), order.date.as_str())
                .insert(MetadataKey::OrderAmount(position), order.amount.as_str())
                .insert(MetadataKey::OrderItem(position), order.item.as_str());
        }
        metadata
    }

    /// Best effort: failures are logged and reported as `Skipped`
    pub async fn annotate_history(
        &self,
        customer_id: &CustomerId,
        orders: &[LegacyOrder],
    ) -> HistoryOutcome {
        if orders.is_empty() {
            return HistoryOutcome::Skipped;
        }

        let metadata = Self::history_metadata(orders);
        let written = orders.len().min(ORDER_HISTORY_CAP);

        match self
            .gateway
            .update_customer_metadata(customer_id, &metadata)
            .await
        {
            Ok(_) => {
                tracing::debug!(
                    customer_id = %customer_id,
                    orders = written,
                    "Recorded legacy order history"
                );
                HistoryOutcome::Annotated(written)
            }
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    error = %e,
                    "Failed to record legacy order history (non-critical)"
                );
                HistoryOutcome::Skipped
            }
        }
    }
}
