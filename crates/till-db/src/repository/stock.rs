//! # Stock Repository
//!
//! Stock levels and per-line reservations.
//!
//! ## Reservation State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   reserve()          reserved_milli += qty   (iff on_hand-reserved ≥ qty)│
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   ┌────────┐  release()  ┌──────────┐                                  │
//! │   │ active │────────────►│ released │  reserved_milli -= qty           │
//! │   └────────┘             └──────────┘                                  │
//! │      │                                                                  │
//! │      │ consume()         ┌──────────┐  reserved_milli -= qty           │
//! │      └──────────────────►│ consumed │  on_hand_milli  -= qty           │
//! │                          └──────────┘                                  │
//! │                                                                         │
//! │   Repeating the same terminal call is a no-op; crossing over           │
//! │   (release a consumed handle, or the reverse) is InvalidState.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation runs in one transaction so two reservations for the last
//! unit cannot both succeed.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use till_core::ports::StockReservationService;
use till_core::{CoreError, CoreResult, Qty, ReservationHandle, ValidationError};

use super::new_id;
use crate::error::{DbError, DbResult};

const ACTIVE: &str = "active";
const RELEASED: &str = "released";
const CONSUMED: &str = "consumed";

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    item_id: String,
    warehouse_id: String,
    qty_milli: i64,
    status: String,
}

/// Repository for stock levels and reservations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Sets the on-hand quantity for an item in a warehouse.
    ///
    /// Creates the stock row if missing; active reservations are kept.
    pub async fn set_on_hand(&self, item_id: &str, warehouse_id: &str, qty: Qty) -> DbResult<()> {
        info!(item_id = %item_id, warehouse_id = %warehouse_id, qty = %qty, "Setting stock level");

        sqlx::query(
            r#"
            INSERT INTO stock_levels (item_id, warehouse_id, on_hand_milli, reserved_milli, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ON CONFLICT (item_id, warehouse_id) DO UPDATE SET
                on_hand_milli = excluded.on_hand_milli,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item_id)
        .bind(warehouse_id)
        .bind(qty.milli())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// On-hand quantity, ignoring reservations. Zero if the item is unknown.
    pub async fn on_hand(&self, item_id: &str, warehouse_id: &str) -> DbResult<Qty> {
        let milli: Option<i64> = sqlx::query_scalar(
            "SELECT on_hand_milli FROM stock_levels WHERE item_id = ?1 AND warehouse_id = ?2",
        )
        .bind(item_id)
        .bind(warehouse_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Qty::from_milli(milli.unwrap_or(0)))
    }

    /// On hand minus active reservations. Zero if the item is unknown.
    pub async fn available_qty(&self, item_id: &str, warehouse_id: &str) -> DbResult<Qty> {
        let mut conn = self.pool.acquire().await?;
        available_on(&mut conn, item_id, warehouse_id).await
    }

    /// Reserves `qty` of an item.
    ///
    /// ## Errors
    /// `Rejected(InsufficientStock)` when fewer than `qty` units are free.
    pub async fn reserve_qty(
        &self,
        item_id: &str,
        warehouse_id: &str,
        qty: Qty,
    ) -> DbResult<ReservationHandle> {
        if !qty.is_positive() {
            return Err(DbError::Rejected(CoreError::Validation(
                ValidationError::MustBePositive {
                    field: "qty".to_string(),
                },
            )));
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let claimed = sqlx::query(
            r#"
            UPDATE stock_levels SET
                reserved_milli = reserved_milli + ?3,
                updated_at = ?4
            WHERE item_id = ?1 AND warehouse_id = ?2
              AND on_hand_milli - reserved_milli >= ?3
            "#,
        )
        .bind(item_id)
        .bind(warehouse_id)
        .bind(qty.milli())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let available = available_on(&mut *tx, item_id, warehouse_id).await?;
            debug!(item_id = %item_id, requested = %qty, available = %available, "Reservation refused");
            return Err(DbError::Rejected(CoreError::InsufficientStock {
                item_id: item_id.to_string(),
                warehouse_id: warehouse_id.to_string(),
                requested: qty,
                available,
            }));
        }

        let handle = ReservationHandle(new_id());
        sqlx::query(
            r#"
            INSERT INTO stock_reservations (id, item_id, warehouse_id, qty_milli, status, created_at)
            VALUES (?1, ?2, ?3, ?4, 'active', ?5)
            "#,
        )
        .bind(handle.as_str())
        .bind(item_id)
        .bind(warehouse_id)
        .bind(qty.milli())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(handle = %handle, item_id = %item_id, qty = %qty, "Stock reserved");
        Ok(handle)
    }

    /// Returns the reserved quantity to the free pool.
    pub async fn release_reservation(&self, handle: &ReservationHandle) -> DbResult<()> {
        self.settle(handle, RELEASED).await
    }

    /// Deducts the reserved quantity from on-hand stock.
    pub async fn consume_reservation(&self, handle: &ReservationHandle) -> DbResult<()> {
        self.settle(handle, CONSUMED).await
    }

    /// Moves an active reservation to `target` and adjusts the stock row.
    async fn settle(&self, handle: &ReservationHandle, target: &'static str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ReservationRow> = sqlx::query_as(
            "SELECT item_id, warehouse_id, qty_milli, status FROM stock_reservations WHERE id = ?1",
        )
        .bind(handle.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or_else(|| DbError::not_found("reservation", handle.as_str()))?;

        if row.status == target {
            // Repeating a completed settle is a no-op.
            return Ok(());
        }
        if row.status != ACTIVE {
            return Err(DbError::Rejected(CoreError::InvalidState {
                entity: "reservation",
                id: handle.to_string(),
                current: row.status,
            }));
        }

        let now = Utc::now().to_rfc3339();
        let updated = sqlx::query(
            "UPDATE stock_reservations SET status = ?2, settled_at = ?3 WHERE id = ?1 AND status = 'active'",
        )
        .bind(handle.as_str())
        .bind(target)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::Rejected(CoreError::ConcurrentModification {
                entity: "reservation",
                id: handle.to_string(),
            }));
        }

        // Consuming also takes the goods off the shelf.
        let on_hand_delta = if target == CONSUMED { row.qty_milli } else { 0 };
        sqlx::query(
            r#"
            UPDATE stock_levels SET
                reserved_milli = reserved_milli - ?3,
                on_hand_milli = on_hand_milli - ?4,
                updated_at = ?5
            WHERE item_id = ?1 AND warehouse_id = ?2
            "#,
        )
        .bind(&row.item_id)
        .bind(&row.warehouse_id)
        .bind(row.qty_milli)
        .bind(on_hand_delta)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(handle = %handle, status = target, "Reservation settled");
        Ok(())
    }
}

async fn available_on(
    conn: &mut SqliteConnection,
    item_id: &str,
    warehouse_id: &str,
) -> DbResult<Qty> {
    let milli: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT on_hand_milli - reserved_milli
        FROM stock_levels
        WHERE item_id = ?1 AND warehouse_id = ?2
        "#,
    )
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Qty::from_milli(milli.unwrap_or(0).max(0)))
}

#[async_trait]
impl StockReservationService for StockRepository {
    async fn reserve(
        &self,
        item_id: &str,
        warehouse_id: &str,
        qty: Qty,
    ) -> CoreResult<ReservationHandle> {
        Ok(self.reserve_qty(item_id, warehouse_id, qty).await?)
    }

    async fn release(&self, handle: &ReservationHandle) -> CoreResult<()> {
        Ok(self.release_reservation(handle).await?)
    }

    async fn consume(&self, handle: &ReservationHandle) -> CoreResult<()> {
        Ok(self.consume_reservation(handle).await?)
    }

    async fn available(&self, item_id: &str, warehouse_id: &str) -> CoreResult<Qty> {
        Ok(self.available_qty(item_id, warehouse_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn stocked(units: i64) -> StockRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stock = db.stock();
        stock.set_on_hand("tea", "main", Qty::from_units(units)).await.unwrap();
        stock
    }

    #[tokio::test]
    async fn test_reserve_reduces_available() {
        let stock = stocked(5).await;
        stock.reserve("tea", "main", Qty::from_units(3)).await.unwrap();

        assert_eq!(stock.available("tea", "main").await.unwrap(), Qty::from_units(2));
        assert_eq!(stock.on_hand("tea", "main").await.unwrap(), Qty::from_units(5));
    }

    #[tokio::test]
    async fn test_reserve_beyond_available_fails() {
        let stock = stocked(2).await;
        stock.reserve("tea", "main", Qty::from_units(2)).await.unwrap();

        let err = stock.reserve("tea", "main", Qty::from_units(1)).await.unwrap_err();
        match err {
            CoreError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, Qty::from_units(1));
                assert_eq!(available, Qty::zero());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_item_has_nothing_available() {
        let stock = stocked(1).await;
        let err = stock.reserve("coffee", "main", Qty::from_units(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(stock.available("coffee", "main").await.unwrap(), Qty::zero());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let stock = stocked(4).await;
        let handle = stock.reserve("tea", "main", Qty::from_units(4)).await.unwrap();

        stock.release(&handle).await.unwrap();
        stock.release(&handle).await.unwrap();
        assert_eq!(stock.available("tea", "main").await.unwrap(), Qty::from_units(4));

        let err = stock.consume(&handle).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { entity: "reservation", .. }));
    }

    #[tokio::test]
    async fn test_consume_deducts_on_hand() {
        let stock = stocked(4).await;
        let handle = stock
            .reserve("tea", "main", Qty::from_milli(1_500))
            .await
            .unwrap();

        stock.consume(&handle).await.unwrap();
        stock.consume(&handle).await.unwrap();

        assert_eq!(stock.on_hand("tea", "main").await.unwrap(), Qty::from_milli(2_500));
        assert_eq!(stock.available("tea", "main").await.unwrap(), Qty::from_milli(2_500));

        let err = stock.release(&handle).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_unknown_handle_not_found() {
        let stock = stocked(1).await;
        let err = stock
            .release(&ReservationHandle("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
