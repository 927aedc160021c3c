//! loyalty-server: loyalty order ledger
//!
//! Users upload order numbers, a background poller asks the external accrual
//! system how many points each order earned, and the ledger credits and
//! debits per-user balances.
//!
//! - [`services`]: order admission, withdrawals, users
//! - [`store`]: persistence contract (PostgreSQL and in-memory)
//! - [`accrual`]: accrual system client and reconciliation poller
//! - [`api`]: axum routes

pub mod accrual;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
pub mod util;

pub use config::Config;
pub use state::AppState;
