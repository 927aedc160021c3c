use chrono::{DateTime, Utc};
use shared::models::{Amount, User};
use sqlx::{PgConnection, PgPool};

#[derive(sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub balance: Amount,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
            balance: row.balance,
        }
    }
}

pub async fn create(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO users (username, password_hash, created_at, balance)
         VALUES ($1, $2, $3, 0)
         RETURNING id, username, password_hash, created_at, balance",
    )
    .bind(username)
    .bind(password_hash)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, username, password_hash, created_at, balance
         FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, username, password_hash, created_at, balance
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Current balance and lifetime withdrawn total, read in one statement
pub async fn balance_report(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<(Amount, Amount)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT u.balance,
                COALESCE((SELECT SUM(w.amount) FROM withdrawals w WHERE w.user_id = u.id), 0)::BIGINT
         FROM users u WHERE u.id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Read the balance and hold the row lock until the transaction ends
pub async fn lock_balance(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<Amount>, sqlx::Error> {
    let row: Option<(Amount,)> =
        sqlx::query_as("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|(b,)| b))
}

pub async fn set_balance(
    conn: &mut PgConnection,
    user_id: i64,
    balance: Amount,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
        .bind(balance)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn credit(
    conn: &mut PgConnection,
    user_id: i64,
    amount: Amount,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
