//! Data models
//!
//! Shared between the server, the store implementations and the API layer.
//! Monetary values are [`Amount`] (integer minor units); timestamps are
//! `DateTime<Utc>` and serialize as RFC 3339.

pub mod money;
pub mod order;
pub mod user;
pub mod withdrawal;

// Re-exports
pub use money::*;
pub use order::*;
pub use user::*;
pub use withdrawal::*;
