use std::ops::RangeInclusive;
use std::sync::Arc;

use shared::models::User;

use crate::error::{InvalidInput, LedgerError, LedgerResult};
use crate::store::{LedgerStore, StoreError};
use crate::util::{hash_password, verify_password};

const LOGIN_LEN: RangeInclusive<usize> = 3..=20;
const PASSWORD_LEN: RangeInclusive<usize> = 3..=256;

/// User registration and credential checks
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn LedgerStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, login: &str, password: &str) -> LedgerResult<User> {
        if !LOGIN_LEN.contains(&login.chars().count()) {
            return Err(InvalidInput::Login.into());
        }
        if !PASSWORD_LEN.contains(&password.chars().count()) {
            return Err(InvalidInput::Password.into());
        }

        let hash = hash_password(password)
            .map_err(|e| LedgerError::Internal(format!("password hashing failed: {e}")))?;

        match self.store.create_user(login, &hash).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, login, "User registered");
                Ok(user)
            }
            Err(StoreError::Duplicate) => Err(LedgerError::LoginTaken),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, login: &str, password: &str) -> LedgerResult<User> {
        let user = self
            .store
            .find_user_by_username(login)
            .await?
            .ok_or(LedgerError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(LedgerError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Resolve the user behind a verified token; `NotAuthenticated` if the
    /// account no longer exists.
    pub async fn authenticate(&self, user_id: i64) -> LedgerResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(LedgerError::NotAuthenticated)
    }
}
