use std::sync::Arc;

use shared::luhn;
use shared::models::{Amount, UserBalance, Withdrawal};

use crate::error::{InvalidInput, LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Withdrawal processing and balance queries
#[derive(Clone)]
pub struct WithdrawService {
    store: Arc<dyn LedgerStore>,
}

impl WithdrawService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Debit `amount` from the user's balance against `order_ref`.
    ///
    /// Input is validated before storage is touched. `InsufficientFunds`
    /// leaves the balance unchanged.
    pub async fn withdraw(
        &self,
        user_id: i64,
        order_ref: &str,
        amount: Amount,
    ) -> LedgerResult<Withdrawal> {
        let order_ref = luhn::normalize(order_ref);
        if !luhn::valid(&order_ref) {
            return Err(InvalidInput::OrderNumber.into());
        }
        if !amount.is_positive() {
            return Err(InvalidInput::Amount.into());
        }

        match self.store.apply_withdrawal(user_id, &order_ref, amount).await {
            Ok(withdrawal) => {
                tracing::info!(user_id, order = %order_ref, amount = %amount, "Withdrawal recorded");
                Ok(withdrawal)
            }
            Err(e) => {
                let err = LedgerError::from(e);
                if matches!(err, LedgerError::InsufficientFunds) {
                    tracing::debug!(user_id, amount = %amount, "Withdrawal rejected: insufficient funds");
                }
                Err(err)
            }
        }
    }

    pub async fn balance(&self, user_id: i64) -> LedgerResult<UserBalance> {
        Ok(self.store.balance(user_id).await?)
    }

    /// The user's withdrawals, oldest first
    pub async fn list(&self, user_id: i64) -> LedgerResult<Vec<Withdrawal>> {
        Ok(self.store.withdrawals_by_user(user_id).await?)
    }
}
