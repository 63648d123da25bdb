//! Bulk customer import
//!
//! Drives every legacy record through identity resolution, subscription
//! continuity and history annotation, and reports one outcome per record.
//!
//! ## Failure tiers
//!
//! - **Batch**: a wrong admin credential rejects the batch before any
//!   gateway call.
//! - **Record**: failing to resolve the customer puts the record in
//!   `failed`; nothing else is attempted for it.
//! - **Degraded**: subscription or history problems are logged only; the
//!   record still counts as imported.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use elevate_shared::LegacyCustomerRecord;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stripe::{CustomerId, SubscriptionId};
use tokio::sync::Mutex;

use crate::client::StripeClient;
use crate::config::MigrationConfig;
use crate::customer::CustomerImporter;
use crate::error::{BillingError, BillingResult};
use crate::gateway::BillingGateway;
use crate::history::{HistoryAnnotator, HistoryOutcome};
use crate::plans::PlanCatalog;
use crate::subscriptions::{SkipReason, SubscriptionBuilder, SubscriptionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Existed,
    Created,
}

/// Ledger entry for a record whose customer was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedCustomer {
    pub email: String,
    pub status: ImportStatus,
    pub customer_id: CustomerId,
}

/// Ledger entry for a record that could not be imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedImport {
    pub email: String,
    pub error: String,
}

/// Result of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLedger {
    pub successful: Vec<ImportedCustomer>,
    pub failed: Vec<FailedImport>,
    pub total: usize,
}

impl ImportLedger {
    fn from_reports(reports: &[RecordReport], total: usize) -> Self {
        let mut ledger = ImportLedger {
            total,
            ..Default::default()
        };

        for report in reports {
            let (status, customer_id) = match &report.outcome {
                ImportOutcome::Existed(id) => (ImportStatus::Existed, id),
                ImportOutcome::Created(id) => (ImportStatus::Created, id),
                ImportOutcome::Failed(error) => {
                    ledger.failed.push(FailedImport {
                        email: report.email.clone(),
                        error: error.clone(),
                    });
                    continue;
                }
            };
            ledger.successful.push(ImportedCustomer {
                email: report.email.clone(),
                status,
                customer_id: customer_id.clone(),
            });
        }

        ledger
    }
}

/// Identity outcome of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Existed(CustomerId),
    Created(CustomerId),
    Failed(String),
}

/// What happened to a record's legacy membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStep {
    /// No active membership, or the customer was never resolved
    NotRequested,
    Created(SubscriptionId),
    Skipped(SkipReason),
    Failed(String),
}

/// Full per-record result; the ledger only exposes `outcome`
#[derive(Debug, Clone)]
pub struct RecordReport {
    pub index: usize,
    pub email: String,
    pub outcome: ImportOutcome,
    pub subscription: SubscriptionStep,
    /// `None` when the history step never ran
    pub history: Option<HistoryOutcome>,
}

impl RecordReport {
    fn rejected(index: usize, failure: FailedImport) -> Self {
        Self {
            index,
            email: failure.email,
            outcome: ImportOutcome::Failed(failure.error),
            subscription: SubscriptionStep::NotRequested,
            history: None,
        }
    }
}

/// Locks for emails that occur more than once, so repeats run one after another
fn duplicate_email_locks<'a>(
    emails: impl IntoIterator<Item = &'a str>,
) -> HashMap<&'a str, Arc<Mutex<()>>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for email in emails {
        let email = email.trim();
        if !email.is_empty() {
            *seen.entry(email).or_default() += 1;
        }
    }

    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(email, _)| (email, Arc::new(Mutex::new(()))))
        .collect()
}

/// Decode one batch entry; an undecodable entry becomes its ledger failure
fn decode_record(value: &Value) -> Result<LegacyCustomerRecord, FailedImport> {
    LegacyCustomerRecord::deserialize(value).map_err(|e| FailedImport {
        email: value
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        error: format!("Invalid customer record: {}", e),
    })
}

/// Batch orchestrator for customer migration
#[derive(Clone)]
pub struct ImportService {
    config: MigrationConfig,
    customers: CustomerImporter,
    subscriptions: SubscriptionBuilder,
    history: HistoryAnnotator,
}

impl ImportService {
    /// Create an import service using the reference plan catalog
    pub fn new(gateway: Arc<dyn BillingGateway>, config: MigrationConfig) -> Self {
        Self::with_catalog(gateway, PlanCatalog::reference(), config)
    }

    pub fn with_catalog(
        gateway: Arc<dyn BillingGateway>,
        catalog: PlanCatalog,
        config: MigrationConfig,
    ) -> Self {
        let subscriptions =
            SubscriptionBuilder::new(gateway.clone(), Arc::new(catalog), config.currency.clone());

        Self {
            customers: CustomerImporter::new(gateway.clone()),
            subscriptions,
            history: HistoryAnnotator::new(gateway),
            config,
        }
    }

    /// Create the import service against Stripe from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let stripe = StripeClient::from_env()?;
        let config = MigrationConfig::from_env()?;
        Ok(Self::new(Arc::new(stripe), config))
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Import a batch and return the ledger.
    ///
    /// Only an invalid credential is returned as an error; every per-record
    /// problem is part of the ledger.
    pub async fn run(
        &self,
        batch: &[LegacyCustomerRecord],
        credential: &str,
    ) -> BillingResult<ImportLedger> {
        let reports = self.run_detailed(batch, credential).await?;
        Ok(ImportLedger::from_reports(&reports, batch.len()))
    }

    /// Import a batch of undecoded records.
    ///
    /// Entries that do not decode are reported as failed in place; the rest
    /// of the batch still runs.
    pub async fn run_values(&self, batch: &[Value], credential: &str) -> BillingResult<ImportLedger> {
        self.authorize(credential, batch.len())?;

        let decoded: Vec<Result<LegacyCustomerRecord, FailedImport>> =
            batch.iter().map(decode_record).collect();
        let rejected = decoded.iter().filter(|entry| entry.is_err()).count();
        if rejected > 0 {
            tracing::warn!(rejected, "Batch contains records that could not be decoded");
        }

        let entries = decoded
            .iter()
            .map(|entry| entry.as_ref().map_err(Clone::clone))
            .collect();
        let reports = self.import_entries(entries).await;
        Ok(ImportLedger::from_reports(&reports, batch.len()))
    }

    /// Same as [`ImportService::run`] but keeps the per-step detail
    pub async fn run_detailed(
        &self,
        batch: &[LegacyCustomerRecord],
        credential: &str,
    ) -> BillingResult<Vec<RecordReport>> {
        self.authorize(credential, batch.len())?;
        Ok(self.import_entries(batch.iter().map(Ok).collect()).await)
    }

    fn authorize(&self, credential: &str, records: usize) -> BillingResult<()> {
        if self.config.authorize(credential) {
            return Ok(());
        }
        tracing::warn!(records, "Customer import rejected: invalid admin credential");
        Err(BillingError::Unauthorized)
    }

    async fn import_entries(
        &self,
        entries: Vec<Result<&LegacyCustomerRecord, FailedImport>>,
    ) -> Vec<RecordReport> {
        let started = Instant::now();
        tracing::info!(
            records = entries.len(),
            concurrency = self.config.concurrency,
            "Starting customer import"
        );

        let locks = duplicate_email_locks(
            entries
                .iter()
                .filter_map(|entry| entry.as_ref().ok().copied())
                .map(|record| record.email.as_str()),
        );
        if !locks.is_empty() {
            tracing::warn!(
                duplicate_emails = locks.len(),
                "Batch contains repeated emails; repeats will run sequentially"
            );
        }

        let mut slots: Vec<Option<RecordReport>> = vec![None; entries.len()];
        let mut work: Vec<BoxFuture<'_, RecordReport>> = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let record = match entry {
                Ok(record) => record,
                Err(failure) => {
                    slots[index] = Some(RecordReport::rejected(index, failure));
                    continue;
                }
            };

            let lock = locks.get(record.email.trim()).cloned();
            work.push(
                async move {
                    let _serialized = match &lock {
                        Some(lock) => Some(lock.lock().await),
                        None => None,
                    };
                    self.process_record(index, record).await
                }
                .boxed(),
            );
        }

        let mut pending = stream::iter(work).buffer_unordered(self.config.concurrency);
        while let Some(report) = pending.next().await {
            let index = report.index;
            slots[index] = Some(report);
        }
        drop(pending);

        let reports: Vec<RecordReport> = slots.into_iter().flatten().collect();
        Self::log_summary(&reports, started);

        reports
    }

    async fn process_record(&self, index: usize, record: &LegacyCustomerRecord) -> RecordReport {
        let resolved = match self.customers.import_one(record).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(
                    index,
                    email = %record.email,
                    error = %e,
                    "Failed to import customer"
                );
                return RecordReport {
                    index,
                    email: record.email.clone(),
                    outcome: ImportOutcome::Failed(e.to_string()),
                    subscription: SubscriptionStep::NotRequested,
                    history: None,
                };
            }
        };

        let subscription = match record.active_subscription() {
            Some(legacy) => match self
                .subscriptions
                .attach_subscription(&resolved.id, legacy)
                .await
            {
                Ok(SubscriptionOutcome::Created(id)) => SubscriptionStep::Created(id),
                Ok(SubscriptionOutcome::Skipped(reason)) => SubscriptionStep::Skipped(reason),
                Err(e) => {
                    tracing::warn!(
                        index,
                        email = %record.email,
                        customer_id = %resolved.id,
                        error = %e,
                        "Subscription migration failed; customer kept"
                    );
                    SubscriptionStep::Failed(e.to_string())
                }
            },
            None => SubscriptionStep::NotRequested,
        };

        let history = self
            .history
            .annotate_history(&resolved.id, &record.order_history)
            .await;

        let outcome = if resolved.was_existing {
            ImportOutcome::Existed(resolved.id)
        } else {
            ImportOutcome::Created(resolved.id)
        };

        RecordReport {
            index,
            email: record.email.clone(),
            outcome,
            subscription,
            history: Some(history),
        }
    }

    fn log_summary(reports: &[RecordReport], started: Instant) {
        tracing::info!(
            created = count_where(reports, |r| matches!(r.outcome, ImportOutcome::Created(_))),
            existed = count_where(reports, |r| matches!(r.outcome, ImportOutcome::Existed(_))),
            failed = count_where(reports, |r| matches!(r.outcome, ImportOutcome::Failed(_))),
            subscriptions_created =
                count_where(reports, |r| matches!(r.subscription, SubscriptionStep::Created(_))),
            subscriptions_skipped =
                count_where(reports, |r| matches!(r.subscription, SubscriptionStep::Skipped(_))),
            subscriptions_failed =
                count_where(reports, |r| matches!(r.subscription, SubscriptionStep::Failed(_))),
            histories_annotated = count_where(reports, |r| {
                matches!(r.history, Some(HistoryOutcome::Annotated(_)))
            }),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Customer import completed"
        );
    }
}

fn count_where(reports: &[RecordReport], predicate: impl Fn(&RecordReport) -> bool) -> usize {
    reports.iter().filter(|r| predicate(r)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use elevate_shared::{LegacyOrder, LegacySubscription};

    fn service(gateway: Arc<MockGateway>) -> ImportService {
        ImportService::new(gateway, MigrationConfig::new("admin-key"))
    }

    fn member(email: &str, plan: &str) -> LegacyCustomerRecord {
        LegacyCustomerRecord {
            subscription: Some(LegacySubscription {
                plan_name: plan.to_string(),
                is_active: true,
                start_date: Some("2023-03-01".to_string()),
                next_renewal_date: Some("2024-07-01".to_string()),
            }),
            order_history: vec![LegacyOrder {
                date: "2024-06-01".to_string(),
                amount: "49.00".to_string(),
                item: plan.to_string(),
            }],
            ..LegacyCustomerRecord::new(email)
        }
    }

    #[test]
    fn test_duplicate_locks_only_for_repeats() {
        let batch = vec![
            LegacyCustomerRecord::new("a@example.com"),
            LegacyCustomerRecord::new("b@example.com"),
            LegacyCustomerRecord::new(" a@example.com"),
            LegacyCustomerRecord::new(""),
            LegacyCustomerRecord::new(""),
        ];
        let locks = duplicate_email_locks(batch.iter().map(|r| r.email.as_str()));
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key("a@example.com"));
    }

    #[tokio::test]
    async fn test_full_pipeline_for_member() {
        let gateway = Arc::new(MockGateway::new());
        let reports = service(gateway.clone())
            .run_detailed(&[member("m@example.com", "Premium Membership")], "admin-key")
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(matches!(report.outcome, ImportOutcome::Created(_)));
        assert!(matches!(report.subscription, SubscriptionStep::Created(_)));
        assert_eq!(report.history, Some(HistoryOutcome::Annotated(1)));

        let sub = &gateway.subscriptions()[0];
        assert_eq!(sub.billing_cycle_anchor, Some(1719792000));
        assert_eq!(sub.line_item.amount_minor_units, 9900);
    }

    #[tokio::test]
    async fn test_subscription_failure_keeps_customer() {
        let gateway = Arc::new(MockGateway::new().fail_subscriptions());
        let ledger = service(gateway.clone())
            .run(&[member("m@example.com", "Family Membership")], "admin-key")
            .await
            .unwrap();

        assert_eq!(ledger.successful.len(), 1);
        assert_eq!(ledger.successful[0].status, ImportStatus::Created);
        assert!(ledger.failed.is_empty());
        assert_eq!(gateway.customers().len(), 1);
        // History still runs after a failed subscription
        assert_eq!(gateway.metadata_update_calls(), 1);
    }

    #[tokio::test]
    async fn test_history_failure_keeps_customer() {
        let gateway = Arc::new(MockGateway::new().fail_metadata_updates());
        let reports = service(gateway)
            .run_detailed(&[member("m@example.com", "Family Membership")], "admin-key")
            .await
            .unwrap();

        assert!(matches!(reports[0].outcome, ImportOutcome::Created(_)));
        assert_eq!(reports[0].history, Some(HistoryOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_failed_record_skips_later_steps() {
        let gateway = Arc::new(MockGateway::new().fail_create_for("m@example.com"));
        let reports = service(gateway.clone())
            .run_detailed(&[member("m@example.com", "Family Membership")], "admin-key")
            .await
            .unwrap();

        assert!(matches!(reports[0].outcome, ImportOutcome::Failed(_)));
        assert_eq!(reports[0].subscription, SubscriptionStep::NotRequested);
        assert_eq!(reports[0].history, None);
        assert_eq!(gateway.subscription_create_calls(), 0);
        assert_eq!(gateway.metadata_update_calls(), 0);
    }

    #[tokio::test]
    async fn test_ledger_serializes_to_wire_shape() {
        let gateway = Arc::new(MockGateway::new().fail_search_for("bad@example.com"));
        let ledger = service(gateway)
            .run(
                &[
                    LegacyCustomerRecord::new("good@example.com"),
                    LegacyCustomerRecord::new("bad@example.com"),
                ],
                "admin-key",
            )
            .await
            .unwrap();

        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["successful"][0]["email"], "good@example.com");
        assert_eq!(value["successful"][0]["status"], "created");
        assert_eq!(value["successful"][0]["customerId"], "cus_mock1");
        assert_eq!(value["failed"][0]["email"], "bad@example.com");
        assert!(value["failed"][0]["error"].as_str().unwrap().contains("connection refused"));
    }
}
