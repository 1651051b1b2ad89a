//! # Cash Reconciler
//!
//! Expected drawer cash for a shift, computed fresh from the ledger on every
//! call, plus an optional debounced live view for display.
//!
//! ## Live Watch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     ReconciliationWatch                                 │
//! │                                                                         │
//! │  settlement / drop ──► notify() ──┐                                     │
//! │  settlement / drop ──► notify() ──┼──► ┌──────────────────────────┐    │
//! │  settlement / drop ──► notify() ──┘    │ watch task               │    │
//! │                                        │  first notify arms timer │    │
//! │                                        │  later ones coalesce     │    │
//! │                                        └────────────┬─────────────┘    │
//! │                                                     │ after debounce    │
//! │                                                     ▼                   │
//! │                              CashReconciler::expected_cash(shift)      │
//! │                                                     │                   │
//! │                                                     ▼                   │
//! │                     watch::Sender<Option<Money>> ──► UI subscribers    │
//! │                                                                         │
//! │  ShiftManager::close never reads the watch; it always pulls fresh.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use till_core::ports::{PaymentLedger, ShiftStore};
use till_core::reconcile::expected_cash;
use till_core::{CashShift, CoreError, CoreResult, Money, PaymentMethod};

// =============================================================================
// Cash Reconciler
// =============================================================================

/// Computes expected cash from the ledger. Holds no state of its own.
#[derive(Clone)]
pub struct CashReconciler {
    shifts: Arc<dyn ShiftStore>,
    ledger: Arc<dyn PaymentLedger>,
}

impl CashReconciler {
    pub fn new(shifts: Arc<dyn ShiftStore>, ledger: Arc<dyn PaymentLedger>) -> Self {
        CashReconciler { shifts, ledger }
    }

    /// `start + Σ cash in − Σ cash out` for `shift_id`.
    ///
    /// ## Errors
    /// `NotFound` when the shift does not exist.
    pub async fn expected_cash(&self, shift_id: &str) -> CoreResult<Money> {
        let shift = self
            .shifts
            .get(shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("cash_shift", shift_id))?;

        self.expected_for(&shift).await
    }

    /// Same as [`expected_cash`](Self::expected_cash) for an already loaded shift.
    pub async fn expected_for(&self, shift: &CashShift) -> CoreResult<Money> {
        let entries = self.ledger.query(&shift.id, PaymentMethod::Cash).await?;
        let expected = expected_cash(shift.start_amount, &entries);

        debug!(
            shift_id = %shift.id,
            entries = entries.len(),
            expected = %expected,
            "Expected cash computed"
        );
        Ok(expected)
    }

    /// Starts a debounced live view of `shift_id`'s expected cash.
    pub fn watch(&self, shift_id: impl Into<String>, debounce: Duration) -> ReconciliationWatch {
        ReconciliationWatch::spawn(self.clone(), shift_id.into(), debounce)
    }
}

// =============================================================================
// Reconciliation Watch
// =============================================================================

#[derive(Debug)]
enum WatchCommand {
    /// The shift's ledger changed.
    Notify,
    Shutdown,
}

/// Handle to a running live view.
///
/// Dropping every handle stops the task.
#[derive(Clone)]
pub struct ReconciliationWatch {
    cmd_tx: mpsc::Sender<WatchCommand>,
    value_rx: watch::Receiver<Option<Money>>,
}

impl ReconciliationWatch {
    fn spawn(reconciler: CashReconciler, shift_id: String, debounce: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (value_tx, value_rx) = watch::channel(None);

        let task = WatchTask {
            reconciler,
            shift_id,
            debounce,
            value_tx,
        };
        tokio::spawn(task.run(cmd_rx));

        ReconciliationWatch { cmd_tx, value_rx }
    }

    /// Signals a ledger change. Notifications inside the debounce window
    /// collapse into one recomputation.
    pub async fn notify(&self) -> CoreResult<()> {
        self.cmd_tx
            .send(WatchCommand::Notify)
            .await
            .map_err(|_| CoreError::Unavailable("reconciliation watch stopped".into()))
    }

    /// Latest published value; `None` until the first computation lands.
    pub fn latest(&self) -> Option<Money> {
        *self.value_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Money>> {
        self.value_rx.clone()
    }

    pub async fn shutdown(&self) {
        // A closed channel means the task already ended.
        let _ = self.cmd_tx.send(WatchCommand::Shutdown).await;
    }
}

struct WatchTask {
    reconciler: CashReconciler,
    shift_id: String,
    debounce: Duration,
    value_tx: watch::Sender<Option<Money>>,
}

impl WatchTask {
    async fn run(self, mut cmd_rx: mpsc::Receiver<WatchCommand>) {
        info!(shift_id = %self.shift_id, debounce_ms = self.debounce.as_millis() as u64, "Reconciliation watch started");

        self.refresh().await;
        let mut deadline: Option<Instant> = None;

        loop {
            let pending = deadline;
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(WatchCommand::Notify) => {
                        if self.debounce.is_zero() {
                            self.refresh().await;
                        } else if deadline.is_none() {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    Some(WatchCommand::Shutdown) | None => break,
                },
                _ = sleep_until(pending.unwrap_or_else(Instant::now)), if pending.is_some() => {
                    deadline = None;
                    self.refresh().await;
                }
            }
        }

        info!(shift_id = %self.shift_id, "Reconciliation watch stopped");
    }

    async fn refresh(&self) {
        match self.reconciler.expected_cash(&self.shift_id).await {
            Ok(expected) => {
                self.value_tx.send_replace(Some(expected));
            }
            Err(e) => {
                warn!(shift_id = %self.shift_id, error = %e, "Live expected cash not refreshed");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use till_core::{LedgerDirection, LedgerEntry, ShiftClosure, ShiftStatus};

    struct OneShift;

    #[async_trait]
    impl ShiftStore for OneShift {
        async fn insert_open(&self, _: &str, _: Money) -> CoreResult<CashShift> {
            unreachable!()
        }

        async fn get(&self, shift_id: &str) -> CoreResult<Option<CashShift>> {
            Ok((shift_id == "s1").then(|| CashShift {
                id: "s1".into(),
                cashier_id: "c1".into(),
                opened_at: Utc::now(),
                closed_at: None,
                start_amount: Money::from_cents(10_000),
                end_amount: None,
                expected_amount: None,
                difference: None,
                status: ShiftStatus::Open,
                notes: None,
            }))
        }

        async fn current_for(&self, _: &str) -> CoreResult<Option<CashShift>> {
            unreachable!()
        }

        async fn close(&self, _: &str, _: &ShiftClosure) -> CoreResult<CashShift> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct CountingLedger {
        entries: Mutex<Vec<LedgerEntry>>,
        queries: AtomicUsize,
    }

    impl CountingLedger {
        fn push(&self, direction: LedgerDirection, method: PaymentMethod, cents: i64) {
            self.entries.lock().unwrap().push(LedgerEntry {
                id: format!("e{cents}"),
                direction,
                method,
                amount: Money::from_cents(cents),
                shift_id: Some("s1".into()),
                order_id: None,
                occurred_at: Utc::now(),
            });
        }
    }

    #[async_trait]
    impl PaymentLedger for CountingLedger {
        async fn query(&self, shift_id: &str, method: PaymentMethod) -> CoreResult<Vec<LedgerEntry>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.shift_id.as_deref() == Some(shift_id) && e.method == method)
                .cloned()
                .collect())
        }

        async fn entries_for_shift(&self, _: &str) -> CoreResult<Vec<LedgerEntry>> {
            unreachable!()
        }
    }

    fn reconciler(ledger: Arc<CountingLedger>) -> CashReconciler {
        CashReconciler::new(Arc::new(OneShift), ledger)
    }

    #[tokio::test]
    async fn test_expected_cash_ignores_non_cash() {
        let ledger = Arc::new(CountingLedger::default());
        ledger.push(LedgerDirection::In, PaymentMethod::Cash, 25_000);
        ledger.push(LedgerDirection::In, PaymentMethod::Network, 9_900);
        ledger.push(LedgerDirection::Out, PaymentMethod::Cash, 2_000);

        let expected = reconciler(ledger).expected_cash("s1").await.unwrap();
        assert_eq!(expected, Money::from_cents(33_000));
    }

    #[tokio::test]
    async fn test_missing_shift_not_found() {
        let err = reconciler(Arc::default())
            .expected_cash("nope")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_recomputed_every_call() {
        let ledger = Arc::new(CountingLedger::default());
        let rec = reconciler(ledger.clone());

        assert_eq!(rec.expected_cash("s1").await.unwrap(), Money::from_cents(10_000));
        ledger.push(LedgerDirection::In, PaymentMethod::Cash, 500);
        assert_eq!(rec.expected_cash("s1").await.unwrap(), Money::from_cents(10_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_coalesces_notifications() {
        let ledger = Arc::new(CountingLedger::default());
        let watch = reconciler(ledger.clone()).watch("s1", Duration::from_millis(150));
        let mut rx = watch.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(Money::from_cents(10_000)));
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 1);

        ledger.push(LedgerDirection::In, PaymentMethod::Cash, 700);
        for _ in 0..5 {
            watch.notify().await.unwrap();
        }

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(Money::from_cents(10_700)));
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 2);
        assert_eq!(watch.latest(), Some(Money::from_cents(10_700)));

        watch.shutdown().await;
    }
}
