//! Application state

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::services::{OrderService, UserService, WithdrawService};
use crate::store::{LedgerStore, PgLedgerStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Ledger storage, shared with the accrual poller
    pub store: Arc<dyn LedgerStore>,
    pub orders: OrderService,
    pub withdrawals: WithdrawService,
    pub users: UserService,
    /// JWT secret for user tokens
    pub jwt_secret: Arc<str>,
}

impl AppState {
    /// Connect to PostgreSQL, apply migrations and build the services
    pub async fn connect(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_uri)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::with_store(
            Arc::new(PgLedgerStore::new(pool)),
            &config.jwt_secret,
        ))
    }

    pub fn with_store(store: Arc<dyn LedgerStore>, jwt_secret: &str) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            withdrawals: WithdrawService::new(store.clone()),
            users: UserService::new(store.clone()),
            store,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
