//! Billing error types

use stripe::StripeError;
use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

/// Failure of a single call to the remote billing gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Stripe request failed: {0}")]
    Transport(String),

    #[error("Stripe request timed out")]
    Timeout,

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected Stripe response: {0}")]
    InvalidResponse(String),

    #[error("Invalid Stripe request: {0}")]
    InvalidRequest(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl From<StripeError> for GatewayError {
    fn from(e: StripeError) -> Self {
        match e {
            StripeError::Stripe(err) => GatewayError::Api {
                status: err.http_status,
                message: err
                    .message
                    .unwrap_or_else(|| err.error_type.to_string()),
            },
            StripeError::Timeout => GatewayError::Timeout,
            StripeError::ClientError(msg) => GatewayError::Transport(msg),
            StripeError::QueryStringSerialize(e) => GatewayError::InvalidRequest(e.to_string()),
            other => GatewayError::InvalidResponse(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid customer record: {0}")]
    InvalidRecord(String),

    #[error("Invalid renewal date: {0}")]
    InvalidRenewalDate(String),
}

impl BillingError {
    /// Whether the failure came from talking to the billing system
    pub fn is_gateway(&self) -> bool {
        matches!(self, BillingError::Gateway(_))
    }
}
