use chrono::{DateTime, Utc};
use shared::models::{Amount, Withdrawal};
use sqlx::{PgConnection, PgPool};

#[derive(sqlx::FromRow)]
pub struct WithdrawalRow {
    pub id: i64,
    pub user_id: i64,
    pub order_ref: String,
    pub amount: Amount,
    pub processed_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            order_ref: row.order_ref,
            amount: row.amount,
            processed_at: row.processed_at,
        }
    }
}

pub async fn insert(
    conn: &mut PgConnection,
    user_id: i64,
    order_ref: &str,
    amount: Amount,
    now: DateTime<Utc>,
) -> Result<WithdrawalRow, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO withdrawals (user_id, order_ref, amount, processed_at)
         VALUES ($1, $2, $3, $4)
         RETURNING id, user_id, order_ref, amount, processed_at",
    )
    .bind(user_id)
    .bind(order_ref)
    .bind(amount)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn list_by_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<WithdrawalRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, user_id, order_ref, amount, processed_at
         FROM withdrawals WHERE user_id = $1 ORDER BY processed_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
