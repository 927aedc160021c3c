//! Ledger scenarios against the in-memory store and a scripted accrual system
//!
//! Covers admission, poller reconciliation, the credit/debit invariants and
//! concurrent withdrawals.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use loyalty_server::accrual::{
    AccrualOracle, AccrualPoller, AccrualResponse, AccrualStatus, CycleReport, OracleError,
};
use loyalty_server::error::LedgerError;
use loyalty_server::services::{Admission, OrderService, WithdrawService};
use loyalty_server::store::{LedgerStore, MemoryLedgerStore};
use shared::models::{Amount, OrderStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Scripted accrual system
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Script {
    Answer(AccrualStatus, Option<i64>),
    Reject(u16),
    Fail,
}

#[derive(Default)]
struct ScriptedOracle {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    async fn set(&self, number: &str, script: Script) {
        self.scripts.lock().await.insert(number.to_string(), script);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccrualOracle for ScriptedOracle {
    async fn fetch(&self, number: &str) -> Result<AccrualResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().await.get(number).cloned();
        match script {
            Some(Script::Answer(status, accrual)) => Ok(AccrualResponse {
                order: number.to_string(),
                status,
                accrual: accrual.map(Amount::from_minor),
            }),
            Some(Script::Reject(status)) => Err(OracleError::Rejected {
                status,
                body: "scripted rejection".into(),
            }),
            Some(Script::Fail) => Err(OracleError::Unavailable("connection refused".into())),
            None => Err(OracleError::Rejected {
                status: 204,
                body: String::new(),
            }),
        }
    }
}

struct Harness {
    store: Arc<MemoryLedgerStore>,
    oracle: Arc<ScriptedOracle>,
    orders: OrderService,
    withdrawals: WithdrawService,
    poller: AccrualPoller,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryLedgerStore::new());
    let oracle = Arc::new(ScriptedOracle::default());
    Harness {
        orders: OrderService::new(store.clone()),
        withdrawals: WithdrawService::new(store.clone()),
        poller: AccrualPoller::new(store.clone(), oracle.clone(), Duration::from_millis(10)),
        store,
        oracle,
    }
}

async fn new_user(h: &Harness, name: &str) -> i64 {
    h.store.create_user(name, "hash").await.unwrap().id
}

async fn current(h: &Harness, user_id: i64) -> Amount {
    h.store.balance(user_id).await.unwrap().current
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_accrue_withdraw_scenario() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    assert_eq!(current(&h, user).await, Amount::ZERO);

    let admission = h.orders.submit(user, "9278923470").await.unwrap();
    assert!(matches!(admission, Admission::Admitted(_)));

    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(50000)))
        .await;
    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.credited, 1);

    let order = h.store.find_order("9278923470").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(order.accrual, Amount::from_minor(50000));
    assert_eq!(current(&h, user).await, Amount::from_minor(50000));

    h.withdrawals
        .withdraw(user, "2377225624", Amount::from_minor(10000))
        .await
        .unwrap();
    assert_eq!(current(&h, user).await, Amount::from_minor(40000));

    let err = h
        .withdrawals
        .withdraw(user, "2377225624", Amount::from_minor(50000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds));

    let balance = h.store.balance(user).await.unwrap();
    assert_eq!(balance.current, Amount::from_minor(40000));
    assert_eq!(balance.withdrawn, Amount::from_minor(10000));
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resubmission_after_processing_stays_idempotent() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(100)))
        .await;
    h.poller.poll_once().await.unwrap();

    let again = h.orders.submit(user, "9278923470").await.unwrap();
    match again {
        Admission::AlreadyAdmitted(order) => assert_eq!(order.status, OrderStatus::Processed),
        other => panic!("expected AlreadyAdmitted, got {other:?}"),
    }
    assert_eq!(current(&h, user).await, Amount::from_minor(100));
}

#[tokio::test]
async fn conflicting_owner_keeps_original() {
    let h = harness();
    let alice = new_user(&h, "alice").await;
    let bob = new_user(&h, "bob").await;

    h.orders.submit(alice, "9278923470").await.unwrap();
    let err = h.orders.submit(bob, "9278923470").await.unwrap_err();
    assert!(matches!(err, LedgerError::OwnershipConflict { .. }));

    let orders = h.orders.list(alice).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(h.orders.list(bob).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

#[tokio::test]
async fn processed_order_is_never_credited_twice() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(50000)))
        .await;

    h.poller.poll_once().await.unwrap();
    let calls_after_first = h.oracle.calls();

    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report, CycleReport::default());
    assert_eq!(h.oracle.calls(), calls_after_first);
    assert_eq!(current(&h, user).await, Amount::from_minor(50000));
}

#[tokio::test]
async fn order_walks_new_processing_processed() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "12345678903").await.unwrap();

    h.oracle
        .set("12345678903", Script::Answer(AccrualStatus::Registered, None))
        .await;
    h.poller.poll_once().await.unwrap();
    let order = h.store.find_order("12345678903").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::New);

    h.oracle
        .set("12345678903", Script::Answer(AccrualStatus::Processing, None))
        .await;
    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.processing, 1);
    let order = h.store.find_order("12345678903").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(current(&h, user).await, Amount::ZERO);

    // Still processing: no write, no double count
    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.processing, 0);

    h.oracle
        .set("12345678903", Script::Answer(AccrualStatus::Processed, Some(72998)))
        .await;
    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.credited, 1);
    assert_eq!(current(&h, user).await, Amount::from_minor(72998));
}

#[tokio::test]
async fn invalid_order_credits_nothing() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Invalid, Some(999)))
        .await;

    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.invalidated, 1);

    let order = h.store.find_order("9278923470").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Invalid);
    assert_eq!(order.accrual, Amount::ZERO);
    assert_eq!(current(&h, user).await, Amount::ZERO);

    // Terminal: no longer polled
    assert_eq!(h.poller.poll_once().await.unwrap().fetched, 0);
}

#[tokio::test]
async fn failures_are_skipped_and_retried_next_cycle() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    for number in ["9278923470", "12345678903", "79927398713"] {
        h.orders.submit(user, number).await.unwrap();
    }
    h.oracle.set("9278923470", Script::Reject(429)).await;
    h.oracle.set("12345678903", Script::Fail).await;
    h.oracle
        .set("79927398713", Script::Answer(AccrualStatus::Processed, Some(300)))
        .await;

    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.credited, 1);
    assert_eq!(current(&h, user).await, Amount::from_minor(300));

    // Failed orders remain pending and succeed once the oracle recovers
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(100)))
        .await;
    h.oracle
        .set("12345678903", Script::Answer(AccrualStatus::Processed, Some(200)))
        .await;
    let report = h.poller.poll_once().await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.credited, 2);
    assert_eq!(current(&h, user).await, Amount::from_minor(600));
}

#[tokio::test]
async fn storage_outage_fails_the_cycle_without_side_effects() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(100)))
        .await;

    h.store.set_unavailable(true);
    assert!(h.poller.poll_once().await.is_err());
    assert_eq!(h.oracle.calls(), 0);

    h.store.set_unavailable(false);
    assert_eq!(h.poller.poll_once().await.unwrap().credited, 1);
}

#[tokio::test]
async fn run_stops_on_cancellation() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(500)))
        .await;

    let store = h.store.clone();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(h.poller.run(shutdown.clone()));

    // The first tick fires immediately
    for _ in 0..200 {
        if current_of(&store, user).await == Amount::from_minor(500) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(current_of(&store, user).await, Amount::from_minor(500));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("poller did not stop")
        .unwrap();
}

async fn current_of(store: &MemoryLedgerStore, user_id: i64) -> Amount {
    store.balance(user_id).await.unwrap().current
}

// ---------------------------------------------------------------------------
// Balance invariants
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_never_overdraw() {
    let h = harness();
    let user = new_user(&h, "alice").await;
    h.orders.submit(user, "9278923470").await.unwrap();
    h.oracle
        .set("9278923470", Script::Answer(AccrualStatus::Processed, Some(1000)))
        .await;
    h.poller.poll_once().await.unwrap();

    let a = {
        let svc = h.withdrawals.clone();
        tokio::spawn(async move { svc.withdraw(user, "2377225624", Amount::from_minor(600)).await })
    };
    let b = {
        let svc = h.withdrawals.clone();
        tokio::spawn(async move { svc.withdraw(user, "9278923470", Amount::from_minor(600)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds)))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(current(&h, user).await, Amount::from_minor(400));
}

#[tokio::test]
async fn balance_equals_credits_minus_debits() {
    let h = harness();
    let user = new_user(&h, "alice").await;

    let credits = [("9278923470", 1500), ("12345678903", 250), ("79927398713", 4000)];
    for (number, amount) in credits {
        h.orders.submit(user, number).await.unwrap();
        h.oracle
            .set(number, Script::Answer(AccrualStatus::Processed, Some(amount)))
            .await;
    }
    h.poller.poll_once().await.unwrap();
    let credited: i64 = credits.iter().map(|(_, a)| a).sum();

    let mut debited = 0;
    for amount in [700, 3000, 2500, 1500, 50] {
        match h
            .withdrawals
            .withdraw(user, "2377225624", Amount::from_minor(amount))
            .await
        {
            Ok(_) => debited += amount,
            Err(LedgerError::InsufficientFunds) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
        let balance = h.store.balance(user).await.unwrap();
        assert!(balance.current.minor() >= 0);
        assert_eq!(balance.current.minor(), credited - debited);
        assert_eq!(balance.withdrawn.minor(), debited);
    }
    // 700 + 3000 + 1500 + 50 fit into 5750; 2500 did not
    assert_eq!(debited, 5250);
}
