//! Database access layer
//!
//! Plain query functions per table. Functions that take `&mut PgConnection`
//! run inside a caller-owned transaction (`&mut *tx`).

pub mod orders;
pub mod users;
pub mod withdrawals;
