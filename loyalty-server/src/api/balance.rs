//! Balance, withdrawals

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use shared::error::AppError;
use shared::models::{UserBalance, WithdrawRequest, WithdrawalSummary};

use super::{ApiResult, json_body};
use crate::auth::UserIdentity;
use crate::state::AppState;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<UserBalance> {
    let balance = state.withdrawals.balance(identity.user_id).await?;
    Ok(Json(balance))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> ApiResult<WithdrawalSummary> {
    let req = json_body(payload)?;
    let withdrawal = state
        .withdrawals
        .withdraw(identity.user_id, &req.order, req.sum)
        .await?;
    Ok(Json(WithdrawalSummary::from(&withdrawal)))
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Response, AppError> {
    let withdrawals = state.withdrawals.list(identity.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let summaries: Vec<WithdrawalSummary> =
        withdrawals.iter().map(WithdrawalSummary::from).collect();
    Ok(Json(summaries).into_response())
}
