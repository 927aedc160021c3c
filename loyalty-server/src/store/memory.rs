//! In-process ledger store
//!
//! All state sits behind one async mutex, so each trait call is serialized
//! and the atomic operations are trivially all-or-nothing. Used by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shared::models::{Amount, Order, OrderStatus, User, UserBalance, Withdrawal};
use shared::util::now_utc;
use tokio::sync::Mutex;

use super::{LedgerStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    orders: HashMap<String, Order>,
    withdrawals: Vec<Withdrawal>,
    next_user_id: i64,
    next_withdrawal_id: i64,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a database error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(StoreError::Duplicate);
        }
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now_utc(),
            balance: Amount::ZERO,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        self.check()?;
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn find_order(&self, number: &str) -> StoreResult<Option<Order>> {
        self.check()?;
        Ok(self.inner.lock().await.orders.get(number).cloned())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.number) {
            return Ok(false);
        }
        inner.orders.insert(order.number.clone(), order.clone());
        Ok(true)
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        self.check()?;
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.uploaded_at, &a.number).cmp(&(b.uploaded_at, &b.number)));
        Ok(orders)
    }

    async fn orders_by_status(&self, statuses: &[OrderStatus]) -> StoreResult<Vec<Order>> {
        self.check()?;
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| statuses.contains(&o.status))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.uploaded_at, &a.number).cmp(&(b.uploaded_at, &b.number)));
        Ok(orders)
    }

    async fn mark_processing(&self, number: &str) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(number) {
            Some(order) if order.status == OrderStatus::New => {
                order.status = OrderStatus::Processing;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Amount,
    ) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().await;

        let Some(order) = inner.orders.get(number) else {
            return Ok(false);
        };
        if order.status.is_terminal() {
            return Ok(false);
        }
        let user_id = order.user_id;

        // Validate the credit before touching anything
        let credited = inner
            .users
            .get(&user_id)
            .ok_or(StoreError::NotFound)?
            .balance
            .checked_add(accrual)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Protocol("balance overflow".into())))?;

        if let Some(order) = inner.orders.get_mut(number) {
            order.status = status;
            order.accrual = accrual;
        }
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.balance = credited;
        }
        Ok(true)
    }

    async fn apply_withdrawal(
        &self,
        user_id: i64,
        order_ref: &str,
        amount: Amount,
    ) -> StoreResult<Withdrawal> {
        self.check()?;
        let mut inner = self.inner.lock().await;

        let balance = inner
            .users
            .get(&user_id)
            .ok_or(StoreError::NotFound)?
            .balance;
        let remaining = balance
            .checked_sub(amount)
            .filter(|b| b.minor() >= 0)
            .ok_or(StoreError::InsufficientFunds)?;

        inner.next_withdrawal_id += 1;
        let withdrawal = Withdrawal {
            id: inner.next_withdrawal_id,
            user_id,
            order_ref: order_ref.to_string(),
            amount,
            processed_at: now_utc(),
        };
        inner.withdrawals.push(withdrawal.clone());
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.balance = remaining;
        }
        Ok(withdrawal)
    }

    async fn withdrawals_by_user(&self, user_id: i64) -> StoreResult<Vec<Withdrawal>> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn balance(&self, user_id: i64) -> StoreResult<UserBalance> {
        self.check()?;
        let inner = self.inner.lock().await;
        let current = inner
            .users
            .get(&user_id)
            .ok_or(StoreError::NotFound)?
            .balance;
        let withdrawn = inner
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .map(|w| w.amount)
            .sum();
        Ok(UserBalance { current, withdrawn })
    }
}
