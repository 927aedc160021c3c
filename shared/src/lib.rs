//! Shared types for the loyalty ledger
//!
//! Common types used by the server and its tests: error codes and API
//! responses, domain models, money encoding, and order-number validation.

pub mod error;
pub mod luhn;
pub mod models;
pub mod util;

pub use http;
