//! Persistence contract for the ledger
//!
//! [`LedgerStore`] is everything the services and the accrual poller need
//! from storage. Multi-step sequences that must be all-or-nothing
//! (`apply_accrual`, `apply_withdrawal`) are single trait methods so every
//! implementation owns its transaction boundary.
//!
//! - [`PgLedgerStore`]: PostgreSQL via sqlx
//! - [`MemoryLedgerStore`]: in-process, for tests

mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use shared::models::{Amount, Order, OrderStatus, User, UserBalance, Withdrawal};
use thiserror::Error;

/// Storage-level failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// Unique constraint violated
    #[error("duplicate record")]
    Duplicate,
    /// Withdrawal would take the balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ── users ──

    /// Create a user with a zero balance. `Duplicate` if the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> StoreResult<User>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>>;

    // ── orders ──

    async fn find_order(&self, number: &str) -> StoreResult<Option<Order>>;

    /// Insert unless a row with the same number exists.
    ///
    /// Returns `false` when another row won; the caller re-reads it.
    async fn insert_order(&self, order: &Order) -> StoreResult<bool>;

    /// Orders owned by `user_id`, oldest upload first
    async fn orders_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>>;

    async fn orders_by_status(&self, statuses: &[OrderStatus]) -> StoreResult<Vec<Order>>;

    /// `NEW -> PROCESSING`. Returns `false` if the order was not `NEW`.
    async fn mark_processing(&self, number: &str) -> StoreResult<bool>;

    /// Move a non-terminal order to a terminal status and credit its owner
    /// by `accrual`, atomically.
    ///
    /// Returns `false` without crediting if the order is already terminal.
    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Amount,
    ) -> StoreResult<bool>;

    // ── balance ──

    /// Record a withdrawal and debit the balance, atomically.
    ///
    /// The balance is read under a row lock; `InsufficientFunds` leaves
    /// everything unchanged.
    async fn apply_withdrawal(
        &self,
        user_id: i64,
        order_ref: &str,
        amount: Amount,
    ) -> StoreResult<Withdrawal>;

    /// Withdrawals by `user_id`, oldest first
    async fn withdrawals_by_user(&self, user_id: i64) -> StoreResult<Vec<Withdrawal>>;

    async fn balance(&self, user_id: i64) -> StoreResult<UserBalance>;
}
