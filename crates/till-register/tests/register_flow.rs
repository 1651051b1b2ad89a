//! End-to-end register flows over an in-memory SQLite database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use till_core::ports::{Collaborators, StockReservationService};
use till_core::settlement::SaleRequest;
use till_core::{
    Advisory, Cart, CartLine, CatalogItem, CoreError, CoreResult, Discount, HoldStatus,
    LedgerDirection, LineInput, Money, NewLedgerEntry, PaymentEntry, PaymentMethod, Qty,
    ReservationHandle,
};
use till_db::{Database, DbConfig, StockRepository};
use till_register::{Register, RegisterConfig};

const WAREHOUSE: &str = "main";

fn cents(c: i64) -> Money {
    Money::from_cents(c)
}

fn config() -> RegisterConfig {
    let mut config = RegisterConfig::default();
    config.register.device_id = "till-07".into();
    config.register.default_warehouse_id = WAREHOUSE.into();
    config.reconciliation.debounce_ms = 20;
    config
}

async fn setup() -> (Register, Database) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    for actor in ["alice", "bob"] {
        db.permissions().grant_all(actor).await.unwrap();
    }
    (Register::new(db.collaborators(), &config()), db)
}

fn plate_lines(count: i64, price: i64) -> Vec<CartLine> {
    let item = CatalogItem::counted("plate", "Plate", cents(price));
    vec![CartLine::new(&item, LineInput::count(count)).unwrap()]
}

fn network(amount: i64) -> PaymentEntry {
    PaymentEntry::confirmed(PaymentMethod::Network, cents(amount), "TX-881", "Sam Doe")
}

fn sale(cashier: &str, lines: Vec<CartLine>, method: PaymentMethod, breakdown: Vec<PaymentEntry>) -> SaleRequest {
    SaleRequest {
        cashier_id: cashier.into(),
        lines,
        discount: Discount::none(),
        payment_method: method,
        breakdown,
    }
}

fn cash_drop(shift_id: &str, amount: i64) -> NewLedgerEntry {
    NewLedgerEntry {
        direction: LedgerDirection::Out,
        method: PaymentMethod::Cash,
        amount: cents(amount),
        shift_id: Some(shift_id.into()),
    }
}

// =============================================================================
// Shifts
// =============================================================================

#[tokio::test]
async fn test_one_open_shift_per_cashier() {
    let (register, _db) = setup().await;

    let shift = register.shifts().open("alice", cents(10_000)).await.unwrap();
    let err = register.shifts().open("alice", cents(5_000)).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyOpen { .. }));

    let current = register.shifts().current("alice", "alice").await.unwrap().unwrap();
    assert_eq!(current.id, shift.id);

    // Another cashier is unaffected
    register.shifts().open("bob", cents(0)).await.unwrap();

    register
        .shifts()
        .close("alice", &shift.id, cents(10_000), None)
        .await
        .unwrap();
    assert!(register.shifts().current("alice", "alice").await.unwrap().is_none());
    register.shifts().open("alice", cents(10_000)).await.unwrap();
}

#[tokio::test]
async fn test_open_rejects_negative_float_and_missing_capability() {
    let (register, _db) = setup().await;

    let err = register.shifts().open("alice", cents(-1)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = register.shifts().open("mallory", cents(0)).await.unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_expected_cash_tracks_every_movement() {
    let (register, db) = setup().await;
    let shift = register.shifts().open("alice", cents(10_000)).await.unwrap();

    let mut expected = 10_000;
    assert_eq!(register.reconciler().expected_cash(&shift.id).await.unwrap(), cents(expected));

    let movements = [
        (LedgerDirection::In, 2_500),
        (LedgerDirection::Out, 400),
        (LedgerDirection::In, 1),
        (LedgerDirection::Out, 7_000),
    ];
    for (direction, amount) in movements {
        db.ledger()
            .record_movement(NewLedgerEntry {
                direction,
                method: PaymentMethod::Cash,
                amount: cents(amount),
                shift_id: Some(shift.id.clone()),
            })
            .await
            .unwrap();
        expected += match direction {
            LedgerDirection::In => amount,
            LedgerDirection::Out => -amount,
        };
        assert_eq!(
            register.reconciler().expected_cash(&shift.id).await.unwrap(),
            cents(expected)
        );
    }

    // Non-cash movements never move the drawer
    register
        .settlement()
        .finalize(sale("alice", plate_lines(1, 900), PaymentMethod::Network, vec![network(900)]))
        .await
        .unwrap();
    assert_eq!(register.reconciler().expected_cash(&shift.id).await.unwrap(), cents(expected));

    let err = register.reconciler().expected_cash("missing").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_close_gate_requires_note_for_variance() {
    let (register, db) = setup().await;
    let shift = register.shifts().open("alice", cents(10_000)).await.unwrap();

    register
        .settlement()
        .finalize(sale(
            "alice",
            plate_lines(1, 25_000),
            PaymentMethod::Cash,
            vec![PaymentEntry::cash(cents(25_000))],
        ))
        .await
        .unwrap();
    db.ledger().record_movement(cash_drop(&shift.id, 2_000)).await.unwrap();

    let err = register
        .shifts()
        .close("alice", &shift.id, cents(30_000), Some(""))
        .await
        .unwrap_err();
    match err {
        CoreError::ReconciliationRequiresNote {
            expected,
            difference,
            ..
        } => {
            assert_eq!(expected, cents(33_000));
            assert_eq!(difference, cents(-3_000));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(register.shifts().current("alice", "alice").await.unwrap().is_some());

    let closed = register
        .shifts()
        .close("alice", &shift.id, cents(30_000), Some("short by 30, register error"))
        .await
        .unwrap();
    assert_eq!(closed.expected_amount, Some(cents(33_000)));
    assert_eq!(closed.difference, Some(cents(-3_000)));
    assert_eq!(closed.notes.as_deref(), Some("short by 30, register error"));
    assert!(closed.closed_at.is_some());

    let err = register
        .shifts()
        .close("alice", &shift.id, cents(33_000), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
}

#[tokio::test]
async fn test_close_exact_and_within_one_cent() {
    let (register, _db) = setup().await;

    let shift = register.shifts().open("alice", cents(33_000)).await.unwrap();
    let closed = register
        .shifts()
        .close("alice", &shift.id, cents(33_000), None)
        .await
        .unwrap();
    assert_eq!(closed.difference, Some(Money::zero()));

    let shift = register.shifts().open("alice", cents(33_000)).await.unwrap();
    let closed = register
        .shifts()
        .close("alice", &shift.id, cents(32_999), None)
        .await
        .unwrap();
    assert_eq!(closed.difference, Some(cents(-1)));
}

#[tokio::test]
async fn test_closing_another_cashiers_shift_needs_manage_shifts() {
    let (register, db) = setup().await;
    db.permissions()
        .grant("carol", till_core::Capability::CloseOwnShift)
        .await
        .unwrap();

    let shift = register.shifts().open("alice", cents(0)).await.unwrap();

    let err = register
        .shifts()
        .close("carol", &shift.id, cents(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));

    let err = register.shifts().current("carol", "alice").await.unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));

    // bob holds ManageShifts
    register
        .shifts()
        .close("bob", &shift.id, cents(0), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shift_summary() {
    let (register, db) = setup().await;
    let shift = register.shifts().open("alice", cents(5_000)).await.unwrap();

    register
        .settlement()
        .finalize(sale(
            "alice",
            plate_lines(2, 1_500),
            PaymentMethod::Split,
            vec![PaymentEntry::cash(cents(1_000)), network(2_000)],
        ))
        .await
        .unwrap();
    db.ledger().record_movement(cash_drop(&shift.id, 500)).await.unwrap();

    let summary = register.shifts().summary("alice", &shift.id).await.unwrap();
    assert_eq!(summary.start_amount, cents(5_000));
    assert_eq!(summary.expected_cash, cents(5_500));
    assert_eq!(summary.entry_count, 3);

    let cash = summary
        .by_method
        .iter()
        .find(|m| m.method == PaymentMethod::Cash)
        .unwrap();
    assert_eq!(cash.total_in, cents(1_000));
    assert_eq!(cash.total_out, cents(500));

    let net = summary
        .by_method
        .iter()
        .find(|m| m.method == PaymentMethod::Network)
        .unwrap();
    assert_eq!(net.total_in, cents(2_000));
    assert_eq!(net.entry_count, 1);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_weighed_line_with_percent_discount() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("rice", WAREHOUSE, Qty::from_units(10)).await.unwrap();

    let rice = CatalogItem::weighed("rice", "Rice", cents(2_000));
    let mut cart = Cart::new();
    cart.add_line(&rice, LineInput::weight(Qty::from_milli(1_500))).unwrap();
    cart.set_discount(Discount::percent(10)).unwrap();

    let totals = cart.totals();
    assert_eq!(totals.subtotal, cents(3_000));
    assert_eq!(totals.discount_amount, cents(300));
    assert_eq!(totals.total, cents(2_700));

    // The hold reserves the weight, not a unit count
    let (lines, discount) = cart.into_parts();
    register.holds().hold("alice", "pos-1", lines, discount).await.unwrap();
    assert_eq!(
        db.stock().available_qty("rice", WAREHOUSE).await.unwrap(),
        Qty::from_milli(8_500)
    );
}

// =============================================================================
// Held Orders
// =============================================================================

#[tokio::test]
async fn test_hold_then_cancel_restores_stock() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(3, 1_000), Discount::none())
        .await
        .unwrap();
    assert_eq!(held.status, HoldStatus::Held);
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(2));

    let cancelled = register.holds().cancel("alice", &held.id).await.unwrap();
    assert_eq!(cancelled.order.status, HoldStatus::Cancelled);
    assert!(cancelled.advisories.is_empty());
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));
    assert_eq!(db.stock().on_hand("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));

    let err = register.holds().cancel("alice", &held.id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));
}

#[tokio::test]
async fn test_failed_hold_rolls_back_acquired_reservations() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();
    db.stock().set_on_hand("cup", WAREHOUSE, Qty::from_units(1)).await.unwrap();

    let plate = CatalogItem::counted("plate", "Plate", cents(1_000));
    let cup = CatalogItem::counted("cup", "Cup", cents(300));
    let lines = vec![
        CartLine::new(&plate, LineInput::count(2)).unwrap(),
        CartLine::new(&cup, LineInput::count(4)).unwrap(),
    ];

    let err = register
        .holds()
        .hold("alice", "pos-1", lines, Discount::none())
        .await
        .unwrap_err();
    match err {
        CoreError::InsufficientStock { item_id, .. } => assert_eq!(item_id, "cup"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));
    assert_eq!(db.stock().available_qty("cup", WAREHOUSE).await.unwrap(), Qty::from_units(1));
    assert!(register.holds().list_held("pos-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tampered_line_is_rejected_before_reserving() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let mut lines = plate_lines(2, 1_000);
    lines.extend(plate_lines(1, 1_000));
    lines[1].quantity = -3;

    let err = register
        .holds()
        .hold("alice", "pos-1", lines, Discount::none())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));
    assert!(register.holds().list_held("pos-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hold_then_resume_consumes_once() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();
    let shift = register.shifts().open("alice", cents(0)).await.unwrap();

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(2, 2_500), Discount::none())
        .await
        .unwrap();

    let settlement = register
        .holds()
        .resume(
            "alice",
            &held.id,
            PaymentMethod::Cash,
            vec![PaymentEntry::cash(cents(5_000)).with_cash_received(cents(6_000))],
        )
        .await
        .unwrap();
    assert!(settlement.advisories.is_empty());
    assert_eq!(settlement.order.held_order_id.as_deref(), Some(held.id.as_str()));
    assert_eq!(settlement.order.shift_id.as_deref(), Some(shift.id.as_str()));
    assert_eq!(settlement.order.change_due, cents(1_000));

    assert_eq!(db.stock().on_hand("plate", WAREHOUSE).await.unwrap(), Qty::from_units(3));
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(3));
    let stored = register.holds().get(&held.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Resumed);

    let err = register
        .holds()
        .resume("alice", &held.id, PaymentMethod::Cash, vec![PaymentEntry::cash(cents(5_000))])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
    assert_eq!(db.stock().on_hand("plate", WAREHOUSE).await.unwrap(), Qty::from_units(3));
    assert_eq!(db.sales().count_for_shift(&shift.id).await.unwrap(), 1);

    let err = register.holds().cancel("alice", &held.id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
}

#[tokio::test]
async fn test_rejected_resume_leaves_hold_intact() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(1, 5_000), Discount::none())
        .await
        .unwrap();

    // No open shift, cash tendered
    let err = register
        .holds()
        .resume("alice", &held.id, PaymentMethod::Cash, vec![PaymentEntry::cash(cents(5_000))])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoOpenShift { .. }));

    let stored = register.holds().get(&held.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Held);
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(4));
    assert_eq!(register.holds().list_held("pos-1").await.unwrap().len(), 1);

    // The same hold settles once a shift is open
    register.shifts().open("alice", cents(0)).await.unwrap();
    register
        .holds()
        .resume("alice", &held.id, PaymentMethod::Cash, vec![PaymentEntry::cash(cents(5_000))])
        .await
        .unwrap();
    assert!(register.holds().list_held("pos-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_held_oldest_first() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(10)).await.unwrap();

    let first = register
        .holds()
        .hold("alice", "pos-1", plate_lines(1, 100), Discount::none())
        .await
        .unwrap();
    let second = register
        .holds()
        .hold("alice", "pos-1", plate_lines(2, 100), Discount::none())
        .await
        .unwrap();
    register
        .holds()
        .hold("alice", "pos-2", plate_lines(1, 100), Discount::none())
        .await
        .unwrap();

    let listed: Vec<String> = register
        .holds()
        .list_held("pos-1")
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(listed, vec![first.id, second.id]);
}

/// Reservation service whose `consume` always fails.
struct ConsumeUnavailable(StockRepository);

#[async_trait]
impl StockReservationService for ConsumeUnavailable {
    async fn reserve(&self, item_id: &str, warehouse_id: &str, qty: Qty) -> CoreResult<ReservationHandle> {
        self.0.reserve(item_id, warehouse_id, qty).await
    }

    async fn release(&self, handle: &ReservationHandle) -> CoreResult<()> {
        self.0.release(handle).await
    }

    async fn consume(&self, _handle: &ReservationHandle) -> CoreResult<()> {
        Err(CoreError::Unavailable("stock service offline".into()))
    }

    async fn available(&self, item_id: &str, warehouse_id: &str) -> CoreResult<Qty> {
        self.0.available(item_id, warehouse_id).await
    }
}

#[tokio::test]
async fn test_unconsumed_reservations_are_reported() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.permissions().grant_all("alice").await.unwrap();
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let collaborators = Collaborators {
        stock: Arc::new(ConsumeUnavailable(db.stock())),
        ..db.collaborators()
    };
    let register = Register::new(collaborators, &config());

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(1, 4_000), Discount::none())
        .await
        .unwrap();
    let settlement = register
        .holds()
        .resume("alice", &held.id, PaymentMethod::Network, vec![network(4_000)])
        .await
        .unwrap();

    let reservation_ids: Vec<String> = held.reservations().map(|h| h.0.clone()).collect();
    assert!(settlement.advisories.contains(&Advisory::NoOpenShift {
        cashier_id: "alice".into()
    }));
    assert!(settlement.advisories.contains(&Advisory::ConsumptionPending {
        held_order_id: held.id.clone(),
        reservation_ids,
    }));

    // The sale stands
    let stored = register.holds().get(&held.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Resumed);
    assert!(register.settlement().order(&settlement.order.id).await.unwrap().is_some());
}

/// Release fails until the service comes back online.
struct ReleaseUnavailable {
    inner: StockRepository,
    online: AtomicBool,
}

#[async_trait]
impl StockReservationService for ReleaseUnavailable {
    async fn reserve(&self, item_id: &str, warehouse_id: &str, qty: Qty) -> CoreResult<ReservationHandle> {
        self.inner.reserve(item_id, warehouse_id, qty).await
    }

    async fn release(&self, handle: &ReservationHandle) -> CoreResult<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("stock service offline".into()));
        }
        self.inner.release(handle).await
    }

    async fn consume(&self, handle: &ReservationHandle) -> CoreResult<()> {
        self.inner.consume(handle).await
    }

    async fn available(&self, item_id: &str, warehouse_id: &str) -> CoreResult<Qty> {
        self.inner.available(item_id, warehouse_id).await
    }
}

#[tokio::test]
async fn test_failed_release_on_cancel_is_reported_and_retried() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.permissions().grant_all("alice").await.unwrap();
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let stock = Arc::new(ReleaseUnavailable {
        inner: db.stock(),
        online: AtomicBool::new(false),
    });
    let collaborators = Collaborators {
        stock: stock.clone(),
        ..db.collaborators()
    };
    let register = Register::new(collaborators, &config());

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(2, 1_000), Discount::none())
        .await
        .unwrap();

    let cancelled = register.holds().cancel("alice", &held.id).await.unwrap();
    let reservation_ids: Vec<String> = held.reservations().map(|h| h.0.clone()).collect();
    assert_eq!(cancelled.order.status, HoldStatus::Cancelled);
    assert_eq!(
        cancelled.advisories,
        vec![Advisory::ReleasePending {
            held_order_id: held.id.clone(),
            reservation_ids,
        }]
    );
    // Still reserved, but the hold is cancelled
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(3));
    let stored = register.holds().get(&held.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HoldStatus::Cancelled);

    stock.online.store(true, Ordering::SeqCst);
    let retried = register.holds().retry_release("alice", &held.id).await.unwrap();
    assert!(retried.advisories.is_empty());
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));

    // Repeating is a no-op
    let again = register.holds().retry_release("alice", &held.id).await.unwrap();
    assert!(again.advisories.is_empty());
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(5));
}

#[tokio::test]
async fn test_retry_release_requires_cancelled_hold() {
    let (register, db) = setup().await;
    db.stock().set_on_hand("plate", WAREHOUSE, Qty::from_units(5)).await.unwrap();

    let held = register
        .holds()
        .hold("alice", "pos-1", plate_lines(1, 1_000), Discount::none())
        .await
        .unwrap();

    let err = register.holds().retry_release("alice", &held.id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
    assert_eq!(db.stock().available_qty("plate", WAREHOUSE).await.unwrap(), Qty::from_units(4));
}

// =============================================================================
// Settlement
// =============================================================================

#[tokio::test]
async fn test_split_payment_must_match_to_the_cent() {
    let (register, db) = setup().await;
    let shift = register.shifts().open("alice", cents(0)).await.unwrap();

    let err = register
        .settlement()
        .finalize(sale(
            "alice",
            plate_lines(1, 5_000),
            PaymentMethod::Split,
            vec![PaymentEntry::cash(cents(3_000)), network(1_999)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AmountMismatch { .. }));
    assert_eq!(db.sales().count_for_shift(&shift.id).await.unwrap(), 0);
    assert!(db.ledger().by_shift(&shift.id).await.unwrap().is_empty());

    let settlement = register
        .settlement()
        .finalize(sale(
            "alice",
            plate_lines(1, 5_000),
            PaymentMethod::Split,
            vec![PaymentEntry::cash(cents(3_000)), network(2_000)],
        ))
        .await
        .unwrap();
    assert_eq!(settlement.order.total, cents(5_000));
    assert_eq!(settlement.order.breakdown.len(), 2);

    let entries = db.ledger().by_order(&settlement.order.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(register.reconciler().expected_cash(&shift.id).await.unwrap(), cents(3_000));
}

#[tokio::test]
async fn test_cash_without_open_shift_is_rejected() {
    let (register, db) = setup().await;

    for tendered in [5_000, 1, 9_999] {
        let err = register
            .settlement()
            .finalize(sale(
                "alice",
                plate_lines(1, 5_000),
                PaymentMethod::Cash,
                vec![PaymentEntry::cash(cents(tendered))],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoOpenShift { .. }), "unexpected error: {err:?}");
    }

    // A closed shift does not count
    let shift = register.shifts().open("alice", cents(0)).await.unwrap();
    register.shifts().close("alice", &shift.id, cents(0), None).await.unwrap();
    let err = register
        .settlement()
        .finalize(sale(
            "alice",
            plate_lines(1, 5_000),
            PaymentMethod::Split,
            vec![PaymentEntry::cash(cents(1_000)), network(4_000)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoOpenShift { .. }));
    assert!(db.ledger().by_shift(&shift.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_cash_without_shift_proceeds_with_advisory() {
    let (register, db) = setup().await;

    let settlement = register
        .settlement()
        .finalize(sale("alice", plate_lines(1, 5_000), PaymentMethod::Network, vec![network(5_000)]))
        .await
        .unwrap();

    assert_eq!(settlement.order.shift_id, None);
    assert_eq!(
        settlement.advisories,
        vec![Advisory::NoOpenShift {
            cashier_id: "alice".into()
        }]
    );
    let entries = db.ledger().by_order(&settlement.order.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].shift_id, None);
}

#[tokio::test]
async fn test_payment_proof_is_checked() {
    let (register, _db) = setup().await;
    register.shifts().open("alice", cents(0)).await.unwrap();

    let mut unconfirmed = network(5_000);
    unconfirmed.amount_confirmed = false;

    let err = register
        .settlement()
        .finalize(sale("alice", plate_lines(1, 5_000), PaymentMethod::Network, vec![unconfirmed]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PaymentProof { entry_index: 0, .. }));
}

#[tokio::test]
async fn test_finalize_requires_sale_capability() {
    let (register, _db) = setup().await;

    let err = register
        .settlement()
        .finalize(sale("mallory", plate_lines(1, 5_000), PaymentMethod::Network, vec![network(5_000)]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_receipt_numbers_use_device_code_and_daily_sequence() {
    let (register, _db) = setup().await;

    let mut receipts = Vec::new();
    for _ in 0..2 {
        let settlement = register
            .settlement()
            .finalize(sale("alice", plate_lines(1, 700), PaymentMethod::Network, vec![network(700)]))
            .await
            .unwrap();
        receipts.push(settlement.order.receipt_number);
    }

    assert!(receipts[0].ends_with("-07-0001"), "{}", receipts[0]);
    assert!(receipts[1].ends_with("-07-0002"), "{}", receipts[1]);
}

// =============================================================================
// Live Watch
// =============================================================================

#[tokio::test]
async fn test_live_watch_follows_ledger() {
    let (register, db) = setup().await;
    let shift = register.shifts().open("alice", cents(1_000)).await.unwrap();

    let watch = register.watch(&shift.id);
    let mut rx = watch.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| *v == Some(cents(1_000))))
        .await
        .unwrap()
        .unwrap();

    db.ledger().record_movement(cash_drop(&shift.id, 250)).await.unwrap();
    watch.notify().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| *v == Some(cents(750))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(watch.latest(), Some(cents(750)));

    watch.shutdown().await;
}
