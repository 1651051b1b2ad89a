//! # Ledger Repository
//!
//! Append-only money movements. Sale payments are written by
//! [`SaleRepository::commit`](super::sale::SaleRepository) inside its
//! transaction; drops and payouts go through [`LedgerRepository::record_movement`].
//!
//! All reads return entries oldest first (insertion order).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use till_core::ports::PaymentLedger;
use till_core::validation::validate_positive_amount;
use till_core::{
    CoreError, CoreResult, LedgerDirection, LedgerEntry, Money, NewLedgerEntry, PaymentMethod,
};

use super::{new_id, parse_timestamp};
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: String,
    direction: LedgerDirection,
    method: PaymentMethod,
    amount_cents: i64,
    shift_id: Option<String>,
    order_id: Option<String>,
    occurred_at: String,
}

impl LedgerRow {
    fn into_entry(self) -> DbResult<LedgerEntry> {
        Ok(LedgerEntry {
            occurred_at: parse_timestamp("occurred_at", &self.occurred_at)?,
            id: self.id,
            direction: self.direction,
            method: self.method,
            amount: Money::from_cents(self.amount_cents),
            shift_id: self.shift_id,
            order_id: self.order_id,
        })
    }
}

/// Repository for payment ledger entries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a movement not tied to an order (cash drop, payout, float top-up).
    pub async fn record_movement(&self, entry: NewLedgerEntry) -> DbResult<LedgerEntry> {
        validate_positive_amount("amount", entry.amount).map_err(CoreError::from)?;

        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, &entry, None).await
    }

    /// Entries for `shift_id` with `method`, oldest first.
    pub async fn by_shift_and_method(
        &self,
        shift_id: &str,
        method: PaymentMethod,
    ) -> DbResult<Vec<LedgerEntry>> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT id, direction, method, amount_cents, shift_id, order_id, occurred_at
            FROM ledger_entries
            WHERE shift_id = ?1 AND method = ?2
            ORDER BY rowid
            "#,
        )
        .bind(shift_id)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_entry).collect()
    }

    /// Every entry for `shift_id`, oldest first.
    pub async fn by_shift(&self, shift_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT id, direction, method, amount_cents, shift_id, order_id, occurred_at
            FROM ledger_entries
            WHERE shift_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_entry).collect()
    }

    /// Entries written for one order.
    pub async fn by_order(&self, order_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            r#"
            SELECT id, direction, method, amount_cents, shift_id, order_id, occurred_at
            FROM ledger_entries
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_entry).collect()
    }
}

/// Inserts one entry on `conn` (a pooled connection or an open transaction).
pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &NewLedgerEntry,
    order_id: Option<&str>,
) -> DbResult<LedgerEntry> {
    let stored = LedgerEntry {
        id: new_id(),
        direction: entry.direction,
        method: entry.method,
        amount: entry.amount,
        shift_id: entry.shift_id.clone(),
        order_id: order_id.map(str::to_string),
        occurred_at: Utc::now(),
    };

    debug!(
        id = %stored.id,
        method = %stored.method,
        amount = %stored.amount,
        "Recording ledger entry"
    );

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, direction, method, amount_cents, shift_id, order_id, occurred_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&stored.id)
    .bind(stored.direction)
    .bind(stored.method)
    .bind(stored.amount.cents())
    .bind(&stored.shift_id)
    .bind(&stored.order_id)
    .bind(stored.occurred_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    Ok(stored)
}

#[async_trait]
impl PaymentLedger for LedgerRepository {
    async fn query(&self, shift_id: &str, method: PaymentMethod) -> CoreResult<Vec<LedgerEntry>> {
        Ok(self.by_shift_and_method(shift_id, method).await?)
    }

    async fn entries_for_shift(&self, shift_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        Ok(self.by_shift(shift_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
