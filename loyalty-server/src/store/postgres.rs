//! PostgreSQL ledger store

use async_trait::async_trait;
use shared::models::{Amount, Order, OrderStatus, User, UserBalance, Withdrawal};
use shared::util::now_utc;
use sqlx::PgPool;

use super::{LedgerStore, StoreError, StoreResult};
use crate::db;

/// Ledger store backed by PostgreSQL
///
/// Relies on row locks and conditional updates; holds no in-process locks,
/// so several server instances may share one database.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        let row = db::users::create(&self.pool, username, password_hash, now_utc()).await?;
        Ok(row.into())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = db::users::find_by_username(&self.pool, username).await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        let row = db::users::find_by_id(&self.pool, user_id).await?;
        Ok(row.map(User::from))
    }

    async fn find_order(&self, number: &str) -> StoreResult<Option<Order>> {
        match db::orders::find(&self.pool, number).await? {
            Some(row) => Ok(Some(Order::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<bool> {
        Ok(db::orders::insert_if_absent(&self.pool, order).await?)
    }

    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let rows = db::orders::list_by_user(&self.pool, user_id).await?;
        rows.into_iter()
            .map(|row| Order::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn orders_by_status(&self, statuses: &[OrderStatus]) -> StoreResult<Vec<Order>> {
        let rows = db::orders::list_by_status(&self.pool, statuses).await?;
        rows.into_iter()
            .map(|row| Order::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn mark_processing(&self, number: &str) -> StoreResult<bool> {
        Ok(db::orders::mark_processing(&self.pool, number).await?)
    }

    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Amount,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Zero rows: already terminal, dropping tx rolls back
        let Some(user_id) = db::orders::finalize(&mut *tx, number, status, accrual).await? else {
            return Ok(false);
        };

        if accrual.is_positive() {
            db::users::credit(&mut *tx, user_id, accrual).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn apply_withdrawal(
        &self,
        user_id: i64,
        order_ref: &str,
        amount: Amount,
    ) -> StoreResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let balance = db::users::lock_balance(&mut *tx, user_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let remaining = balance
            .checked_sub(amount)
            .filter(|b| b.minor() >= 0)
            .ok_or(StoreError::InsufficientFunds)?;

        let row = db::withdrawals::insert(&mut *tx, user_id, order_ref, amount, now_utc()).await?;
        db::users::set_balance(&mut *tx, user_id, remaining).await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn withdrawals_by_user(&self, user_id: i64) -> StoreResult<Vec<Withdrawal>> {
        let rows = db::withdrawals::list_by_user(&self.pool, user_id).await?;
        Ok(rows.into_iter().map(Withdrawal::from).collect())
    }

    async fn balance(&self, user_id: i64) -> StoreResult<UserBalance> {
        let (current, withdrawn) = db::users::balance_report(&self.pool, user_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(UserBalance { current, withdrawn })
    }
}
