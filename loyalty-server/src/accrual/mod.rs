//! Accrual system integration
//!
//! - [`client`]: the oracle contract and its HTTP implementation
//! - [`poller`]: periodic reconciliation of non-terminal orders

pub mod client;
pub mod poller;

pub use client::{AccrualOracle, AccrualResponse, AccrualStatus, HttpAccrualClient, OracleError};
pub use poller::{AccrualPoller, CycleReport};
