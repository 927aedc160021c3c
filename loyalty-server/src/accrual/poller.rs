//! Accrual reconciliation poller
//!
//! Every cycle re-reads all `NEW` / `PROCESSING` orders and asks the accrual
//! system about each. Per-order failures are logged and skipped; the order
//! stays non-terminal and is retried on the next cycle. Terminal results go
//! through [`LedgerStore::apply_accrual`], which credits at most once.

use std::sync::Arc;
use std::time::Duration;

use shared::models::{Amount, Order, OrderStatus};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::client::{AccrualOracle, AccrualResponse, AccrualStatus, OracleError};
use crate::store::{LedgerStore, StoreError};

/// Counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Non-terminal orders examined
    pub fetched: usize,
    /// Orders moved to `PROCESSED` (balance credited)
    pub credited: usize,
    /// Orders moved to `INVALID`
    pub invalidated: usize,
    /// Orders moved `NEW -> PROCESSING`
    pub processing: usize,
    /// Structured rejections from the accrual system
    pub rejected: usize,
    /// Transport, decode or storage failures
    pub failed: usize,
}

/// What a single oracle answer means for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// Nothing to write
    Unchanged,
    Processing,
    Final(OrderStatus, Amount),
}

pub struct AccrualPoller {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn AccrualOracle>,
    interval: Duration,
}

impl AccrualPoller {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn AccrualOracle>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            oracle,
            interval,
        }
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between cycles; a running cycle completes.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "Accrual poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Accrual poller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.poll_once().await {
                Ok(report) if report.fetched == 0 => {
                    tracing::debug!("No pending orders");
                }
                Ok(report) => {
                    tracing::info!(
                        fetched = report.fetched,
                        credited = report.credited,
                        invalidated = report.invalidated,
                        processing = report.processing,
                        rejected = report.rejected,
                        failed = report.failed,
                        "Accrual cycle finished"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load pending orders");
                }
            }
        }
    }

    /// Run a single reconciliation cycle.
    ///
    /// Fails only if the pending orders cannot be loaded; every fetched order
    /// is attempted regardless of individual outcomes.
    pub async fn poll_once(&self) -> Result<CycleReport, StoreError> {
        let orders = self.store.orders_by_status(&OrderStatus::NON_TERMINAL).await?;

        let mut report = CycleReport {
            fetched: orders.len(),
            ..Default::default()
        };

        for order in &orders {
            self.reconcile(order, &mut report).await;
        }

        Ok(report)
    }

    async fn reconcile(&self, order: &Order, report: &mut CycleReport) {
        let verdict = match self.oracle.fetch(&order.number).await {
            Ok(response) => interpret(order, response),
            Err(e) => Err(e),
        };

        let verdict = match verdict {
            Ok(v) => v,
            Err(e @ OracleError::Rejected { .. }) => {
                tracing::warn!(order = %order.number, error = %e, "Accrual request rejected");
                report.rejected += 1;
                return;
            }
            Err(e @ OracleError::Unavailable(_)) => {
                tracing::error!(order = %order.number, error = %e, "Accrual request failed");
                report.failed += 1;
                return;
            }
        };

        let applied = match verdict {
            Verdict::Unchanged => return,
            Verdict::Processing => self.store.mark_processing(&order.number).await,
            Verdict::Final(status, accrual) => {
                self.store
                    .apply_accrual(&order.number, status, accrual)
                    .await
            }
        };

        match applied {
            Ok(false) => {
                tracing::debug!(order = %order.number, "Order changed concurrently, skipped");
            }
            Ok(true) => match verdict {
                Verdict::Processing => {
                    tracing::info!(order = %order.number, "Order is processing");
                    report.processing += 1;
                }
                Verdict::Final(OrderStatus::Processed, accrual) => {
                    tracing::info!(
                        order = %order.number,
                        user_id = order.user_id,
                        accrual = %accrual,
                        "Order processed, balance credited"
                    );
                    report.credited += 1;
                }
                Verdict::Final(_, _) => {
                    tracing::info!(order = %order.number, "Order invalidated");
                    report.invalidated += 1;
                }
                Verdict::Unchanged => {}
            },
            Err(e) => {
                tracing::error!(order = %order.number, error = %e, "Failed to apply accrual result");
                report.failed += 1;
            }
        }
    }
}

/// Map an oracle answer onto a state change for `order`
fn interpret(order: &Order, response: AccrualResponse) -> Result<Verdict, OracleError> {
    if response.order != order.number {
        return Err(OracleError::Unavailable(format!(
            "response for order {} while asking for {}",
            response.order, order.number
        )));
    }

    match response.status {
        AccrualStatus::Registered => Ok(Verdict::Unchanged),
        AccrualStatus::Processing if order.status == OrderStatus::Processing => {
            Ok(Verdict::Unchanged)
        }
        AccrualStatus::Processing => Ok(Verdict::Processing),
        AccrualStatus::Invalid => Ok(Verdict::Final(OrderStatus::Invalid, Amount::ZERO)),
        AccrualStatus::Processed => {
            let accrual = response.accrual.unwrap_or(Amount::ZERO);
            if accrual.minor() < 0 {
                return Err(OracleError::Unavailable(format!(
                    "negative accrual {accrual}"
                )));
            }
            Ok(Verdict::Final(OrderStatus::Processed, accrual))
        }
    }
}
