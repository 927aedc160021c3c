//! Order upload and listing

use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use shared::error::AppError;
use shared::models::OrderSummary;

use crate::auth::UserIdentity;
use crate::services::Admission;
use crate::state::AppState;

/// POST /api/user/orders (text/plain order number)
///
/// 202 when newly admitted, 200 when the same user already uploaded it.
pub async fn upload_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    body: String,
) -> Result<StatusCode, AppError> {
    match state.orders.submit(identity.user_id, &body).await? {
        Admission::Admitted(_) => Ok(StatusCode::ACCEPTED),
        Admission::AlreadyAdmitted(_) => Ok(StatusCode::OK),
    }
}

/// GET /api/user/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Response, AppError> {
    let orders = state.orders.list(identity.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let summaries: Vec<OrderSummary> = orders.iter().map(OrderSummary::from).collect();
    Ok(Json(summaries).into_response())
}
