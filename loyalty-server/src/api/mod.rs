//! HTTP API
//!
//! | route | auth |
//! |---|---|
//! | `GET /health` | – |
//! | `POST /api/user/register`, `POST /api/user/login` | – |
//! | `POST/GET /api/user/orders` | user token |
//! | `GET /api/user/balance`, `POST /api/user/balance/withdraw` | user token |
//! | `GET /api/user/withdrawals` | user token |

pub mod balance;
pub mod health;
pub mod orders;
pub mod user;

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use shared::error::AppError;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// In-flight requests across all routes
const MAX_IN_FLIGHT_REQUESTS: usize = 1024;

/// Unwrap a JSON body, reporting any decode failure as a 400
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::invalid_request(rejection.body_text()))
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    // Authenticated user API
    let user = Router::new()
        .route(
            "/api/user/orders",
            post(orders::upload_order).get(orders::list_orders),
        )
        .route("/api/user/balance", get(balance::get_balance))
        .route("/api/user/balance/withdraw", post(balance::withdraw))
        .route("/api/user/withdrawals", get(balance::list_withdrawals))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Registration and login (no auth)
    let public = Router::new()
        .route("/api/user/register", post(user::register))
        .route("/api/user/login", post(user::login));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(public)
        .merge(user)
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(GlobalConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
