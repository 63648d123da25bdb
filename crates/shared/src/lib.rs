#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Elevate Shared Types
//!
//! Data model of the legacy commerce platform, shared by the migration
//! engine, the API server and the CSV converter.

pub mod legacy;

pub use legacy::{LegacyAddress, LegacyCustomerRecord, LegacyOrder, LegacySubscription};
