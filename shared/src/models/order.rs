//! Order Model
//!
//! An order is a loyalty-point claim identified by an externally assigned
//! number. It belongs to exactly one user for its whole lifetime and moves
//! through `NEW -> PROCESSING -> PROCESSED | INVALID`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Amount;

/// Order scoring status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Admitted, awaiting scoring
    New,
    /// The oracle acknowledged the order but has not finalized it
    Processing,
    /// Final accrual received (terminal)
    Processed,
    /// Rejected by the oracle (terminal)
    Invalid,
}

impl OrderStatus {
    /// Statuses the accrual poller still has to reconcile
    pub const NON_TERMINAL: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Invalid => "INVALID",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "PROCESSED" => Ok(OrderStatus::Processed),
            "INVALID" => Ok(OrderStatus::Invalid),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Order number (Luhn-valid digits, globally unique)
    pub number: String,
    /// Owning user
    pub user_id: i64,
    pub status: OrderStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Credited accrual, zero until the order is `PROCESSED`
    pub accrual: Amount,
}

impl Order {
    /// A freshly admitted order
    pub fn admitted(number: impl Into<String>, user_id: i64, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            number: number.into(),
            user_id,
            status: OrderStatus::New,
            uploaded_at,
            accrual: Amount::ZERO,
        }
    }
}

/// Order as listed to its owner
///
/// `accrual` is present only once the order has been scored `PROCESSED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Amount>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.clone(),
            status: order.status,
            accrual: (order.status == OrderStatus::Processed).then_some(order.accrual),
            uploaded_at: order.uploaded_at,
        }
    }
}
