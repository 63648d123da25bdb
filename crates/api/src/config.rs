//! API server configuration

use anyhow::Context;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
/// Import payloads carry whole customer exports; axum's 2 MB default is too small
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Load server settings. Stripe and admin secrets are read by the billing
    /// crate so a missing one disables imports instead of stopping the server.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let allowed_origins = split_origins(
            &std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );

        let max_body_bytes = match std::env::var("MAX_IMPORT_BODY_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_IMPORT_BODY_BYTES is not a number: {}", raw))?,
            Err(_) => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            bind_address,
            allowed_origins,
            max_body_bytes,
        })
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
