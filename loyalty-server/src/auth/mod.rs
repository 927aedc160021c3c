//! User authentication
//!
//! Tokens are HS256 JWTs whose `sub` is the user id. The middleware accepts
//! them from `Authorization: Bearer …` or the session cookie and inserts a
//! [`UserIdentity`] extension for the handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

use crate::state::AppState;

/// Cookie carrying the session token
pub const TOKEN_COOKIE: &str = "gophermart_token";

const ISSUER: &str = "gophermart";
const JWT_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    /// User ID
    pub sub: String,
    pub iss: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated user, resolved from the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: i64,
}

pub fn create_token(user_id: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = UserClaims {
        sub: user_id.to_string(),
        iss: ISSUER.to_string(),
        exp: (now + chrono::Duration::days(JWT_EXPIRY_DAYS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<UserIdentity, AppError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);

    let token_data = jsonwebtoken::decode::<UserClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::token_expired(),
        _ => {
            tracing::debug!("JWT validation failed: {e}");
            AppError::invalid_token("Invalid token")
        }
    })?;

    let user_id = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::invalid_token("Invalid subject"))?;

    Ok(UserIdentity { user_id })
}

/// Token from the `Authorization` header, falling back to the session cookie
fn extract_token(request: &Request) -> Option<String> {
    let headers = request.headers();

    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Middleware that verifies the user token and inserts [`UserIdentity`]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(&request)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let identity =
        verify_token(&token, &state.jwt_secret).map_err(|e| e.into_response())?;

    // Valid signature is not enough: the account must still exist
    state
        .users
        .authenticate(identity.user_id)
        .await
        .map_err(|e| {
            tracing::debug!(user_id = identity.user_id, error = %e, "Token for unknown user");
            e.into_response()
        })?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
