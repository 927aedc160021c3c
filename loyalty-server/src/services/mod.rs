//! Ledger services
//!
//! Each service takes the requesting user as an explicit parameter; none of
//! them looks up ambient request state.

mod orders;
mod users;
mod withdrawals;

pub use orders::{Admission, OrderService};
pub use users::UserService;
pub use withdrawals::WithdrawService;
