//! Migration configuration

use subtle::ConstantTimeEq;

use crate::error::{BillingError, BillingResult};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_CURRENCY: &str = "usd";

/// Settings for the batch import, loaded once at startup
#[derive(Clone)]
pub struct MigrationConfig {
    /// Shared secret the caller must present to run an import
    admin_import_key: String,
    /// Records processed at the same time
    pub concurrency: usize,
    /// ISO currency code for migrated subscriptions (lowercase)
    pub currency: String,
}

impl std::fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("admin_import_key", &"[redacted]")
            .field("concurrency", &self.concurrency)
            .field("currency", &self.currency)
            .finish()
    }
}

impl MigrationConfig {
    pub fn new(admin_import_key: impl Into<String>) -> Self {
        Self {
            admin_import_key: admin_import_key.into(),
            concurrency: DEFAULT_CONCURRENCY,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn from_env() -> BillingResult<Self> {
        let admin_import_key = std::env::var("ADMIN_IMPORT_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BillingError::Config("ADMIN_IMPORT_KEY not set".to_string()))?;

        let concurrency = match std::env::var("MIGRATION_CONCURRENCY") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                BillingError::Config(format!("MIGRATION_CONCURRENCY is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_CONCURRENCY,
        };

        let currency = std::env::var("MIGRATION_CURRENCY")
            .ok()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        if currency.parse::<stripe::Currency>().is_err() {
            return Err(BillingError::Config(format!(
                "MIGRATION_CURRENCY is not a currency Stripe supports: '{}'",
                currency
            )));
        }

        Ok(Self {
            admin_import_key,
            concurrency: concurrency.max(1),
            currency,
        })
    }

    /// Clamped to at least one worker
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_lowercase();
        self
    }

    /// Constant-time check of the caller's credential.
    ///
    /// An empty configured key never authorizes anything.
    pub fn authorize(&self, credential: &str) -> bool {
        if self.admin_import_key.is_empty() {
            return false;
        }
        self.admin_import_key
            .as_bytes()
            .ct_eq(credential.as_bytes())
            .into()
    }
}
