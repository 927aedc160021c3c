//! Service-layer errors
//!
//! `LedgerError` is what the order, withdrawal and user services return.
//! The API layer turns it into `AppError`; storage failures are logged once
//! there and surfaced as a generic internal error.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::store::StoreError;

/// Caller input that was rejected before reaching storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("order number is empty")]
    EmptyOrderNumber,
    #[error("order number fails the Luhn check")]
    OrderNumber,
    #[error("withdrawal amount must be positive")]
    Amount,
    #[error("login must be 3 to 20 characters")]
    Login,
    #[error("password must be 3 to 256 characters")]
    Password,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidInput),
    /// The order number was uploaded by a different user
    #[error("order {order} belongs to another user")]
    OwnershipConflict { order: String },
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid login or password")]
    InvalidCredentials,
    #[error("login already taken")]
    LoginTaken,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientFunds => LedgerError::InsufficientFunds,
            other => LedgerError::StorageUnavailable(other),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidRequest(input) => {
                let code = match input {
                    InvalidInput::EmptyOrderNumber => ErrorCode::InvalidRequest,
                    InvalidInput::OrderNumber => ErrorCode::OrderNumberInvalid,
                    InvalidInput::Amount => ErrorCode::WithdrawalAmountInvalid,
                    InvalidInput::Login | InvalidInput::Password => {
                        return AppError::validation(input.to_string());
                    }
                };
                AppError::with_message(code, input.to_string())
            }
            LedgerError::OwnershipConflict { order } => {
                AppError::new(ErrorCode::OrderOwnedByAnotherUser).with_detail("order", order)
            }
            LedgerError::InsufficientFunds => AppError::new(ErrorCode::InsufficientFunds),
            LedgerError::NotAuthenticated => AppError::not_authenticated(),
            LedgerError::InvalidCredentials => AppError::invalid_credentials(),
            LedgerError::LoginTaken => AppError::new(ErrorCode::LoginAlreadyExists),
            LedgerError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                AppError::new(ErrorCode::InternalError)
            }
            LedgerError::StorageUnavailable(store_err) => {
                tracing::error!(error = %store_err, "Storage error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
