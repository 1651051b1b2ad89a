//! # Shift Repository
//!
//! Persistence for cash shifts.
//!
//! ## Shift Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Shift Lifecycle                                   │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── insert_open() → CashShift { status: Open }                     │
//! │         partial unique index: one open row per cashier                 │
//! │                                                                         │
//! │  2. CLOSE                                                              │
//! │     └── close() → UPDATE ... WHERE id = ? AND status = 'open'          │
//! │         0 rows: NotFound (no row) or ConcurrentModification (lost race)│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use till_core::ports::ShiftStore;
use till_core::{CashShift, CoreError, CoreResult, Money, ShiftClosure, ShiftStatus};

use super::{new_id, parse_optional_timestamp, parse_timestamp};
use crate::error::{DbError, DbResult};

const SHIFT_COLUMNS: &str = r#"
    id, cashier_id, opened_at, closed_at,
    start_amount_cents, end_amount_cents, expected_amount_cents, difference_cents,
    status, notes
"#;

#[derive(Debug, sqlx::FromRow)]
struct ShiftRow {
    id: String,
    cashier_id: String,
    opened_at: String,
    closed_at: Option<String>,
    start_amount_cents: i64,
    end_amount_cents: Option<i64>,
    expected_amount_cents: Option<i64>,
    difference_cents: Option<i64>,
    status: ShiftStatus,
    notes: Option<String>,
}

impl ShiftRow {
    fn into_shift(self) -> DbResult<CashShift> {
        Ok(CashShift {
            opened_at: parse_timestamp("opened_at", &self.opened_at)?,
            closed_at: parse_optional_timestamp("closed_at", self.closed_at.as_deref())?,
            id: self.id,
            cashier_id: self.cashier_id,
            start_amount: Money::from_cents(self.start_amount_cents),
            end_amount: self.end_amount_cents.map(Money::from_cents),
            expected_amount: self.expected_amount_cents.map(Money::from_cents),
            difference: self.difference_cents.map(Money::from_cents),
            status: self.status,
            notes: self.notes,
        })
    }
}

/// Repository for cash shift operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Inserts an open shift for `cashier_id`.
    ///
    /// ## Errors
    /// `Rejected(AlreadyOpen)` when the cashier already has an open shift.
    pub async fn open(&self, cashier_id: &str, start_amount: Money) -> DbResult<CashShift> {
        let shift = CashShift {
            id: new_id(),
            cashier_id: cashier_id.to_string(),
            opened_at: Utc::now(),
            closed_at: None,
            start_amount,
            end_amount: None,
            expected_amount: None,
            difference: None,
            status: ShiftStatus::Open,
            notes: None,
        };

        debug!(id = %shift.id, cashier_id = %cashier_id, start = %start_amount, "Opening shift");

        let result = sqlx::query(
            r#"
            INSERT INTO cash_shifts (id, cashier_id, opened_at, start_amount_cents, status)
            VALUES (?1, ?2, ?3, ?4, 'open')
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.cashier_id)
        .bind(shift.opened_at.to_rfc3339())
        .bind(start_amount.cents())
        .execute(&self.pool)
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => Ok(shift),
            Err(e) if e.is_unique_violation_on("cash_shifts.cashier_id") => {
                Err(DbError::Rejected(CoreError::AlreadyOpen {
                    cashier_id: cashier_id.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashShift>> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM cash_shifts WHERE id = ?1");
        let row: Option<ShiftRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ShiftRow::into_shift).transpose()
    }

    /// The cashier's open shift, if any.
    pub async fn find_open(&self, cashier_id: &str) -> DbResult<Option<CashShift>> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM cash_shifts WHERE cashier_id = ?1 AND status = 'open'"
        );
        let row: Option<ShiftRow> = sqlx::query_as(&sql)
            .bind(cashier_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ShiftRow::into_shift).transpose()
    }

    /// Closes a shift that is still open.
    ///
    /// ## What This Does
    /// 1. Conditional UPDATE on `status = 'open'`
    /// 2. On zero rows, tells a missing shift apart from a lost race
    /// 3. Returns the row as stored
    pub async fn close_shift(&self, id: &str, closure: &ShiftClosure) -> DbResult<CashShift> {
        let result = sqlx::query(
            r#"
            UPDATE cash_shifts SET
                closed_at = ?2,
                end_amount_cents = ?3,
                expected_amount_cents = ?4,
                difference_cents = ?5,
                notes = ?6,
                status = 'closed'
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .bind(closure.end_amount.cents())
        .bind(closure.expected_amount.cents())
        .bind(closure.difference.cents())
        .bind(&closure.notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                None => Err(DbError::not_found("cash_shift", id)),
                Some(_) => {
                    warn!(shift_id = %id, "Shift closed concurrently");
                    Err(DbError::Rejected(CoreError::ConcurrentModification {
                        entity: "cash_shift",
                        id: id.to_string(),
                    }))
                }
            };
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("cash_shift", id))
    }
}

#[async_trait]
impl ShiftStore for ShiftRepository {
    async fn insert_open(&self, cashier_id: &str, start_amount: Money) -> CoreResult<CashShift> {
        Ok(self.open(cashier_id, start_amount).await?)
    }

    async fn get(&self, shift_id: &str) -> CoreResult<Option<CashShift>> {
        Ok(self.get_by_id(shift_id).await?)
    }

    async fn current_for(&self, cashier_id: &str) -> CoreResult<Option<CashShift>> {
        Ok(self.find_open(cashier_id).await?)
    }

    async fn close(&self, shift_id: &str, closure: &ShiftClosure) -> CoreResult<CashShift> {
        Ok(self.close_shift(shift_id, closure).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
