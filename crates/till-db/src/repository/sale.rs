//! # Sale Repository
//!
//! The atomic commit of a settled sale.
//!
//! ## Commit Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    commit(SaleCommit) — one transaction                 │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── 1. shift bound?  SELECT 1 FROM cash_shifts                       │
//! │   │                    WHERE id = ? AND cashier_id = ? AND open        │
//! │   │                    (no row → NoOpenShift, abort)                   │
//! │   ├── 2. held order?  UPDATE held_orders SET status = 'resumed'        │
//! │   │                   WHERE id = ? AND status = 'held'                 │
//! │   │                   (0 rows → ConcurrentModification, abort)         │
//! │   ├── 3. receipt_counters UPSERT … RETURNING last_seq                  │
//! │   ├── 4. INSERT orders (priced snapshot as JSON)                       │
//! │   └── 5. INSERT ledger_entries, one per breakdown entry                │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure rolls back every step.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use till_core::ports::{SaleCommit, SaleStore};
use till_core::settlement::format_receipt_number;
use till_core::{
    CoreError, CoreResult, Discount, Money, Order, PaymentEntry, PaymentMethod, PricedLine,
};

use super::ledger::insert_entry;
use super::{new_id, parse_timestamp};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    receipt_number: String,
    cashier_id: String,
    shift_id: Option<String>,
    held_order_id: Option<String>,
    lines_json: String,
    discount_json: String,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    breakdown_json: String,
    change_due_cents: i64,
    created_at: String,
}

impl OrderRow {
    fn into_order(self) -> DbResult<Order> {
        let lines: Vec<PricedLine> = serde_json::from_str(&self.lines_json)?;
        let discount: Discount = serde_json::from_str(&self.discount_json)?;
        let breakdown: Vec<PaymentEntry> = serde_json::from_str(&self.breakdown_json)?;

        Ok(Order {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            receipt_number: self.receipt_number,
            cashier_id: self.cashier_id,
            shift_id: self.shift_id,
            held_order_id: self.held_order_id,
            lines,
            discount,
            subtotal: Money::from_cents(self.subtotal_cents),
            discount_amount: Money::from_cents(self.discount_cents),
            total: Money::from_cents(self.total_cents),
            payment_method: self.payment_method,
            breakdown,
            change_due: Money::from_cents(self.change_due_cents),
        })
    }
}

/// Repository for finalized orders.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Writes a settled sale.
    ///
    /// ## What This Does
    /// 1. Checks the draft's shift is still open for its cashier
    /// 2. Claims the held order (if resuming one)
    /// 3. Takes the next receipt sequence for today and this device
    /// 4. Inserts the order snapshot
    /// 5. Inserts its ledger entries
    ///
    /// All in one transaction.
    pub async fn commit_sale(&self, commit: SaleCommit) -> DbResult<Order> {
        let SaleCommit { draft, device_id } = commit;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if let Some(shift_id) = draft.shift_id.as_deref() {
            ensure_shift_open(&mut *tx, shift_id, &draft.cashier_id).await?;
        }
        if let Some(held_id) = draft.held_order_id.as_deref() {
            claim_hold(&mut *tx, held_id).await?;
        }

        let day = now.format("%Y%m%d").to_string();
        let sequence = next_receipt_sequence(&mut *tx, &day, &device_id).await?;
        let receipt_number = format_receipt_number(now.date_naive(), &device_id, sequence);

        let order = Order {
            id: new_id(),
            receipt_number,
            cashier_id: draft.cashier_id,
            shift_id: draft.shift_id,
            held_order_id: draft.held_order_id,
            lines: draft.totals.lines,
            discount: draft.discount,
            subtotal: draft.totals.subtotal,
            discount_amount: draft.totals.discount_amount,
            total: draft.totals.total,
            payment_method: draft.payment_method,
            breakdown: draft.breakdown,
            change_due: draft.change_due,
            created_at: now,
        };

        debug!(id = %order.id, receipt_number = %order.receipt_number, total = %order.total, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, receipt_number, cashier_id, shift_id, held_order_id,
                lines_json, discount_json,
                subtotal_cents, discount_cents, total_cents,
                payment_method, breakdown_json, change_due_cents, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.receipt_number)
        .bind(&order.cashier_id)
        .bind(&order.shift_id)
        .bind(&order.held_order_id)
        .bind(serde_json::to_string(&order.lines)?)
        .bind(serde_json::to_string(&order.discount)?)
        .bind(order.subtotal.cents())
        .bind(order.discount_amount.cents())
        .bind(order.total.cents())
        .bind(order.payment_method)
        .bind(serde_json::to_string(&order.breakdown)?)
        .bind(order.change_due.cents())
        .bind(order.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for entry in &draft.ledger {
            insert_entry(&mut *tx, entry, Some(&order.id)).await?;
        }

        tx.commit().await?;

        info!(
            id = %order.id,
            receipt_number = %order.receipt_number,
            method = %order.payment_method,
            total = %order.total,
            "Sale committed"
        );

        Ok(order)
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, receipt_number, cashier_id, shift_id, held_order_id,
                   lines_json, discount_json,
                   subtotal_cents, discount_cents, total_cents,
                   payment_method, breakdown_json, change_due_cents, created_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Number of orders committed under a shift.
    pub async fn count_for_shift(&self, shift_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE shift_id = ?1")
            .bind(shift_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// The shift a draft was prepared against may have closed since.
async fn ensure_shift_open(
    conn: &mut SqliteConnection,
    shift_id: &str,
    cashier_id: &str,
) -> DbResult<()> {
    let open: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM cash_shifts WHERE id = ?1 AND cashier_id = ?2 AND status = 'open'",
    )
    .bind(shift_id)
    .bind(cashier_id)
    .fetch_optional(&mut *conn)
    .await?;

    if open.is_none() {
        warn!(shift_id = %shift_id, cashier_id = %cashier_id, "Shift closed before commit");
        return Err(DbError::Rejected(CoreError::NoOpenShift {
            cashier_id: cashier_id.to_string(),
        }));
    }
    Ok(())
}

/// `held → resumed`, iff the order is still held.
async fn claim_hold(conn: &mut SqliteConnection, held_id: &str) -> DbResult<()> {
    let claimed = sqlx::query(
        r#"
        UPDATE held_orders SET
            status = 'resumed',
            version = version + 1,
            updated_at = ?2
        WHERE id = ?1 AND status = 'held'
        "#,
    )
    .bind(held_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    if claimed.rows_affected() == 1 {
        return Ok(());
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM held_orders WHERE id = ?1")
        .bind(held_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        None => Err(DbError::not_found("held_order", held_id)),
        Some(_) => {
            warn!(held_order_id = %held_id, "Held order already claimed");
            Err(DbError::Rejected(CoreError::ConcurrentModification {
                entity: "held_order",
                id: held_id.to_string(),
            }))
        }
    }
}

/// Increments and returns the day's sequence for a device.
async fn next_receipt_sequence(
    conn: &mut SqliteConnection,
    day: &str,
    device_id: &str,
) -> DbResult<u32> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO receipt_counters (day, device_id, last_seq)
        VALUES (?1, ?2, 1)
        ON CONFLICT (day, device_id) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(day)
    .bind(device_id)
    .fetch_one(&mut *conn)
    .await?;

    u32::try_from(seq).map_err(|_| DbError::Internal(format!("receipt sequence overflow: {seq}")))
}

#[async_trait]
impl SaleStore for SaleRepository {
    async fn commit(&self, commit: SaleCommit) -> CoreResult<Order> {
        Ok(self.commit_sale(commit).await?)
    }

    async fn get_order(&self, order_id: &str) -> CoreResult<Option<Order>> {
        Ok(self.get_by_id(order_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
