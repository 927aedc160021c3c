//! Registration and login

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{AUTHORIZATION, SET_COOKIE};
use shared::error::AppError;
use shared::models::{Credentials, TokenResponse, User};

use super::json_body;
use crate::auth::{TOKEN_COOKIE, create_token};
use crate::state::AppState;

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let creds = json_body(payload)?;
    let user = state.users.register(&creds.login, &creds.password).await?;
    issue_token(&state, &user)
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let creds = json_body(payload)?;
    let user = state.users.login(&creds.login, &creds.password).await?;
    tracing::debug!(user_id = user.id, "User logged in");
    issue_token(&state, &user)
}

/// Token in the body, the `Authorization` header and the session cookie
fn issue_token(state: &AppState, user: &User) -> Result<Response, AppError> {
    let token = create_token(user.id, &state.jwt_secret).map_err(|e| {
        tracing::error!("JWT creation failed: {e}");
        AppError::internal("Failed to issue token")
    })?;

    let cookie = format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    Ok((
        [
            (AUTHORIZATION, format!("Bearer {token}")),
            (SET_COOKIE, cookie),
        ],
        Json(TokenResponse { token }),
    )
        .into_response())
}
