//! Application state

use std::sync::Arc;

use elevate_billing::ImportService;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Import service; `None` when Stripe or the admin key is not configured
    pub migration: Option<Arc<ImportService>>,
    /// Why `migration` is unavailable, reported to callers
    pub migration_error: Option<String>,
}

impl AppState {
    /// Build state from the environment, keeping the server up when
    /// migration settings are missing
    pub fn new(config: Config) -> Self {
        match ImportService::from_env() {
            Ok(service) => {
                tracing::info!(
                    concurrency = service.config().concurrency,
                    currency = %service.config().currency,
                    "Customer import service initialized"
                );
                Self::with_migration(config, service)
            }
            Err(e) => {
                tracing::warn!("Customer import not configured: {}", e);
                Self {
                    config,
                    migration: None,
                    migration_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn with_migration(config: Config, service: ImportService) -> Self {
        Self {
            config,
            migration: Some(Arc::new(service)),
            migration_error: None,
        }
    }

    pub fn without_migration(config: Config, reason: impl Into<String>) -> Self {
        Self {
            config,
            migration: None,
            migration_error: Some(reason.into()),
        }
    }
}
