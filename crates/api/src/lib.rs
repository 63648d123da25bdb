// API server clippy configuration
#![allow(clippy::result_large_err)] // ApiError wraps billing errors
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Elevate API Server
//!
//! HTTP surface for the customer migration: an admin-only batch import
//! endpoint and a health check.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
