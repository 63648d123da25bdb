//! Customer import route
//!
//! Admin-only entry point that runs a legacy customer batch through the
//! billing migration and returns the import ledger.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use elevate_billing::ImportLedger;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCustomersRequest {
    /// Decoded one by one so a bad record only fails itself
    #[serde(default)]
    pub customers: Vec<Value>,
    #[serde(default)]
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
pub struct ImportCustomersResponse {
    pub message: &'static str,
    pub results: ImportLedger,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/import-customers
pub async fn import_customers(
    State(state): State<AppState>,
    payload: Result<Json<ImportCustomersRequest>, JsonRejection>,
) -> ApiResult<Json<ImportCustomersResponse>> {
    let service = state.migration.clone().ok_or_else(|| {
        ApiError::NotConfigured(
            state
                .migration_error
                .clone()
                .unwrap_or_else(|| "Customer import is not configured".to_string()),
        )
    })?;

    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected import payload");
        ApiError::BadRequest(rejection.body_text())
    })?;

    let ledger = service
        .run_values(&request.customers, &request.admin_password)
        .await?;

    tracing::info!(
        total = ledger.total,
        successful = ledger.successful.len(),
        failed = ledger.failed.len(),
        "Import request completed"
    );

    Ok(Json(ImportCustomersResponse {
        message: "Import completed",
        results: ledger,
    }))
}
