//! Withdrawal Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Amount;

/// Recorded debit against a user's balance
///
/// `order_ref` is a free-form payment reference; it is not required to match
/// any uploaded order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub order_ref: String,
    pub amount: Amount,
    pub processed_at: DateTime<Utc>,
}

/// Withdrawal request body
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Amount,
}

/// Withdrawal as listed to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalSummary {
    pub order: String,
    pub sum: Amount,
    pub processed_at: DateTime<Utc>,
}

impl From<&Withdrawal> for WithdrawalSummary {
    fn from(w: &Withdrawal) -> Self {
        Self {
            order: w.order_ref.clone(),
            sum: w.amount,
            processed_at: w.processed_at,
        }
    }
}
