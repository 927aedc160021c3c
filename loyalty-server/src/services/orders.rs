use std::sync::Arc;

use shared::luhn;
use shared::models::Order;
use shared::util::now_utc;

use crate::error::{InvalidInput, LedgerError, LedgerResult};
use crate::store::{LedgerStore, StoreError};

/// Successful outcome of an order upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new order was recorded in `NEW`
    Admitted(Order),
    /// The same user already uploaded this number; nothing changed
    AlreadyAdmitted(Order),
}

/// Order admission and listing
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn LedgerStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Admit `number` for `user_id` exactly once.
    ///
    /// Whitespace in the number is ignored. Storage errors are returned as
    /// `StorageUnavailable` without retrying.
    pub async fn submit(&self, user_id: i64, number: &str) -> LedgerResult<Admission> {
        let number = luhn::normalize(number);
        if number.is_empty() {
            return Err(InvalidInput::EmptyOrderNumber.into());
        }
        if !luhn::valid(&number) {
            return Err(InvalidInput::OrderNumber.into());
        }

        if let Some(existing) = self.store.find_order(&number).await? {
            return Self::resolve_existing(existing, user_id);
        }

        let order = Order::admitted(number, user_id, now_utc());
        if self.store.insert_order(&order).await? {
            tracing::info!(order = %order.number, user_id, "Order admitted");
            return Ok(Admission::Admitted(order));
        }

        // Lost a concurrent insert; the winner's row decides
        let winner = self
            .store
            .find_order(&order.number)
            .await?
            .ok_or(LedgerError::StorageUnavailable(StoreError::NotFound))?;
        Self::resolve_existing(winner, user_id)
    }

    fn resolve_existing(existing: Order, user_id: i64) -> LedgerResult<Admission> {
        if existing.user_id == user_id {
            Ok(Admission::AlreadyAdmitted(existing))
        } else {
            tracing::debug!(order = %existing.number, user_id, "Order owned by another user");
            Err(LedgerError::OwnershipConflict {
                order: existing.number,
            })
        }
    }

    /// The user's orders, oldest upload first
    pub async fn list(&self, user_id: i64) -> LedgerResult<Vec<Order>> {
        Ok(self.store.orders_by_user(user_id).await?)
    }
}
