//! User Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Amount;

/// User entity
///
/// `balance` changes only through ledger operations and is never negative.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// PHC-format password hash, opaque to the ledger
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub balance: Amount,
}

/// Balance report: spendable balance plus everything withdrawn so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub current: Amount,
    pub withdrawn: Amount,
}

/// Login / registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Token issued after login or registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
