use chrono::{DateTime, Utc};
use shared::models::{Amount, Order, OrderStatus};
use sqlx::{PgConnection, PgPool};

#[derive(sqlx::FromRow)]
pub struct OrderRow {
    pub id: String,
    pub user_id: i64,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
    pub accrual: Amount,
}

impl TryFrom<OrderRow> for Order {
    type Error = sqlx::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            number: row.id,
            user_id: row.user_id,
            status,
            uploaded_at: row.uploaded_at,
            accrual: row.accrual,
        })
    }
}

/// Insert unless the number exists; `true` if this call created the row
pub async fn insert_if_absent(pool: &PgPool, order: &Order) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO orders (id, user_id, status, uploaded_at, accrual)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(&order.number)
    .bind(order.user_id)
    .bind(order.status.as_str())
    .bind(order.uploaded_at)
    .bind(order.accrual)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find(pool: &PgPool, number: &str) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT id, user_id, status, uploaded_at, accrual FROM orders WHERE id = $1")
        .bind(number)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_user(pool: &PgPool, user_id: i64) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, user_id, status, uploaded_at, accrual
         FROM orders WHERE user_id = $1 ORDER BY uploaded_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_status(
    pool: &PgPool,
    statuses: &[OrderStatus],
) -> Result<Vec<OrderRow>, sqlx::Error> {
    let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
    sqlx::query_as(
        "SELECT id, user_id, status, uploaded_at, accrual
         FROM orders WHERE status = ANY($1) ORDER BY uploaded_at ASC",
    )
    .bind(statuses)
    .fetch_all(pool)
    .await
}

pub async fn mark_processing(pool: &PgPool, number: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE orders SET status = 'PROCESSING' WHERE id = $1 AND status = 'NEW'")
            .bind(number)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// Set a terminal status on a non-terminal order; returns the owner on success
pub async fn finalize(
    conn: &mut PgConnection,
    number: &str,
    status: OrderStatus,
    accrual: Amount,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE orders SET status = $2, accrual = $3
         WHERE id = $1 AND status IN ('NEW', 'PROCESSING')
         RETURNING user_id",
    )
    .bind(number)
    .bind(status.as_str())
    .bind(accrual)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(user_id,)| user_id))
}
