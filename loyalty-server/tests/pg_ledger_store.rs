//! PostgreSQL ledger store tests.
//!
//! These tests are ignored by default because they require a Postgres
//! instance reachable via LOYALTY_TEST_DATABASE_URI. Every test works on
//! freshly named users and orders, so the database may be shared and reused.
//!
//! Run:
//!   LOYALTY_TEST_DATABASE_URI=postgres://... cargo test -p loyalty-server --test pg_ledger_store -- --ignored

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use loyalty_server::store::{LedgerStore, PgLedgerStore, StoreError};
use shared::models::{Amount, Order, OrderStatus, User};
use shared::util::now_utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Barrier;

static SEQ: AtomicU64 = AtomicU64::new(0);

async fn pool() -> PgPool {
    let uri = std::env::var("LOYALTY_TEST_DATABASE_URI").expect("LOYALTY_TEST_DATABASE_URI");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&uri)
        .await
        .expect("db pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrate");
    pool
}

/// Name unique across runs and within this process
fn unique(prefix: &str) -> String {
    let nanos = now_utc().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}-{}", SEQ.fetch_add(1, Ordering::Relaxed))
}

async fn user(store: &PgLedgerStore) -> User {
    store
        .create_user(&unique("pg-user"), "$argon2id$unused")
        .await
        .expect("create user")
}

/// Credit `minor` units through a processed order
async fn fund(store: &PgLedgerStore, user_id: i64, minor: i64) {
    let number = unique("fund");
    assert!(
        store
            .insert_order(&Order::admitted(&number, user_id, now_utc()))
            .await
            .expect("insert order")
    );
    assert!(
        store
            .apply_accrual(&number, OrderStatus::Processed, Amount::from_minor(minor))
            .await
            .expect("apply accrual")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_withdrawals_never_overdraw() {
    let store = PgLedgerStore::new(pool().await);
    let owner = user(&store).await;
    let owner_id = owner.id;
    fund(&store, owner_id, 1000).await;

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let barrier = barrier.clone();
        let order_ref = unique("spend");
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store
                .apply_withdrawal(owner_id, &order_ref, Amount::from_minor(600))
                .await
        }));
    }

    let mut accepted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => accepted += 1,
            Err(StoreError::InsufficientFunds) => refused += 1,
            Err(e) => panic!("unexpected store error: {e}"),
        }
    }
    assert_eq!((accepted, refused), (1, 1));

    let balance = store.balance(owner.id).await.expect("balance");
    assert_eq!(balance.current, Amount::from_minor(400));
    assert_eq!(balance.withdrawn, Amount::from_minor(600));
    assert_eq!(
        store.withdrawals_by_user(owner.id).await.expect("withdrawals").len(),
        1
    );
}

#[tokio::test]
#[ignore]
async fn accrual_is_credited_once() {
    let store = PgLedgerStore::new(pool().await);
    let owner = user(&store).await;
    let number = unique("order");
    store
        .insert_order(&Order::admitted(&number, owner.id, now_utc()))
        .await
        .expect("insert order");

    let accrual = Amount::from_minor(72_950);
    assert!(
        store
            .apply_accrual(&number, OrderStatus::Processed, accrual)
            .await
            .expect("first apply")
    );
    assert!(
        !store
            .apply_accrual(&number, OrderStatus::Processed, accrual)
            .await
            .expect("second apply")
    );

    let order = store.find_order(&number).await.expect("find").expect("order");
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(order.accrual, accrual);
    assert_eq!(store.balance(owner.id).await.expect("balance").current, accrual);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn racing_accruals_credit_once() {
    let store = PgLedgerStore::new(pool().await);
    let owner = user(&store).await;
    let number = unique("order");
    store
        .insert_order(&Order::admitted(&number, owner.id, now_utc()))
        .await
        .expect("insert order");

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let barrier = barrier.clone();
        let number = number.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store
                .apply_accrual(&number, OrderStatus::Processed, Amount::from_minor(500))
                .await
                .expect("apply accrual")
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if handle.await.expect("join") {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(
        store.balance(owner.id).await.expect("balance").current,
        Amount::from_minor(500)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn racing_order_inserts_keep_one_owner() {
    let store = PgLedgerStore::new(pool().await);
    let mut users = Vec::new();
    for _ in 0..8 {
        users.push(user(&store).await);
    }
    let number = unique("contested");

    let barrier = Arc::new(Barrier::new(users.len()));
    let mut handles = Vec::new();
    for owner in &users {
        let store = store.clone();
        let barrier = barrier.clone();
        let order = Order::admitted(&number, owner.id, now_utc());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let inserted = store.insert_order(&order).await.expect("insert order");
            (order.user_id, inserted)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (user_id, inserted) = handle.await.expect("join");
        if inserted {
            winners.push(user_id);
        }
    }
    assert_eq!(winners.len(), 1);

    let stored = store.find_order(&number).await.expect("find").expect("order");
    assert_eq!(stored.user_id, winners[0]);
    assert_eq!(stored.status, OrderStatus::New);
}

#[tokio::test]
#[ignore]
async fn failed_credit_rolls_back_finalize() {
    let pool = pool().await;
    let store = PgLedgerStore::new(pool.clone());
    let owner = user(&store).await;
    let number = unique("order");
    store
        .insert_order(&Order::admitted(&number, owner.id, now_utc()))
        .await
        .expect("insert order");

    // Any positive credit now overflows BIGINT
    sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
        .bind(i64::MAX)
        .bind(owner.id)
        .execute(&pool)
        .await
        .expect("saturate balance");

    let result = store
        .apply_accrual(&number, OrderStatus::Processed, Amount::from_minor(1))
        .await;
    assert!(matches!(result, Err(StoreError::Database(_))), "{result:?}");

    let order = store.find_order(&number).await.expect("find").expect("order");
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.accrual, Amount::ZERO);
    assert_eq!(
        store.balance(owner.id).await.expect("balance").current,
        Amount::from_minor(i64::MAX)
    );

    // The order stays retryable once the balance allows it
    sqlx::query("UPDATE users SET balance = 0 WHERE id = $1")
        .bind(owner.id)
        .execute(&pool)
        .await
        .expect("reset balance");
    assert!(
        store
            .apply_accrual(&number, OrderStatus::Processed, Amount::from_minor(1))
            .await
            .expect("retry")
    );
}
