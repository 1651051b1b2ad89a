//! # Held Order Repository
//!
//! Parked sales with their reservation handles. Lines and discount are
//! stored as JSON snapshots; status moves only through conditional updates.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use till_core::ports::HeldOrderStore;
use till_core::{CoreError, CoreResult, Discount, HeldLine, HeldOrder, HoldStatus};

use super::parse_timestamp;
use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct HeldOrderRow {
    id: String,
    session_id: String,
    cashier_id: String,
    warehouse_id: String,
    lines_json: String,
    discount_json: String,
    status: HoldStatus,
    created_at: String,
    updated_at: String,
}

impl HeldOrderRow {
    fn into_order(self) -> DbResult<HeldOrder> {
        let lines: Vec<HeldLine> = serde_json::from_str(&self.lines_json)?;
        let discount: Discount = serde_json::from_str(&self.discount_json)?;

        Ok(HeldOrder {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            session_id: self.session_id,
            cashier_id: self.cashier_id,
            warehouse_id: self.warehouse_id,
            lines,
            discount,
            status: self.status,
        })
    }
}

/// Repository for held orders.
#[derive(Debug, Clone)]
pub struct HeldOrderRepository {
    pool: SqlitePool,
}

impl HeldOrderRepository {
    /// Creates a new HeldOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HeldOrderRepository { pool }
    }

    /// Inserts a held order.
    pub async fn insert_order(&self, order: &HeldOrder) -> DbResult<()> {
        debug!(id = %order.id, session_id = %order.session_id, lines = order.lines.len(), "Holding order");

        sqlx::query(
            r#"
            INSERT INTO held_orders (
                id, session_id, cashier_id, warehouse_id,
                lines_json, discount_json, status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(&order.session_id)
        .bind(&order.cashier_id)
        .bind(&order.warehouse_id)
        .bind(serde_json::to_string(&order.lines)?)
        .bind(serde_json::to_string(&order.discount)?)
        .bind(order.status)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a held order by ID, whatever its status.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<HeldOrder>> {
        let row: Option<HeldOrderRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, cashier_id, warehouse_id,
                   lines_json, discount_json, status, created_at, updated_at
            FROM held_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HeldOrderRow::into_order).transpose()
    }

    /// Orders still held for `session_id`, oldest first.
    pub async fn held_for_session(&self, session_id: &str) -> DbResult<Vec<HeldOrder>> {
        let rows: Vec<HeldOrderRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, cashier_id, warehouse_id,
                   lines_json, discount_json, status, created_at, updated_at
            FROM held_orders
            WHERE session_id = ?1 AND status = 'held'
            ORDER BY rowid
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HeldOrderRow::into_order).collect()
    }

    /// Conditionally moves `id` from `from` to `to`.
    ///
    /// ## Errors
    /// - `Rejected(InvalidState)` for a transition the state machine forbids
    /// - `NotFound` when no such order exists
    /// - `Rejected(ConcurrentModification)` when the status is no longer `from`
    pub async fn transition_status(&self, id: &str, from: HoldStatus, to: HoldStatus) -> DbResult<()> {
        if !from.can_transition_to(to) {
            return Err(DbError::Rejected(CoreError::InvalidState {
                entity: "held_order",
                id: id.to_string(),
                current: from.to_string(),
            }));
        }

        let result = sqlx::query(
            r#"
            UPDATE held_orders SET
                status = ?3,
                version = version + 1,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM held_orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            return match exists {
                None => Err(DbError::not_found("held_order", id)),
                Some(_) => {
                    warn!(id = %id, from = %from, to = %to, "Held order transition lost");
                    Err(DbError::Rejected(CoreError::ConcurrentModification {
                        entity: "held_order",
                        id: id.to_string(),
                    }))
                }
            };
        }

        debug!(id = %id, from = %from, to = %to, "Held order transitioned");
        Ok(())
    }
}

#[async_trait]
impl HeldOrderStore for HeldOrderRepository {
    async fn insert(&self, order: &HeldOrder) -> CoreResult<()> {
        Ok(self.insert_order(order).await?)
    }

    async fn get(&self, id: &str) -> CoreResult<Option<HeldOrder>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn list_held(&self, session_id: &str) -> CoreResult<Vec<HeldOrder>> {
        Ok(self.held_for_session(session_id).await?)
    }

    async fn transition(&self, id: &str, from: HoldStatus, to: HoldStatus) -> CoreResult<()> {
        Ok(self.transition_status(id, from, to).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::cart::{CartLine, CatalogItem, LineInput};
    use till_core::{Money, ReservationHandle};

    fn held(id: &str, session: &str) -> HeldOrder {
        let tea = CatalogItem::counted("tea", "Tea", Money::from_cents(450));
        let line = CartLine::new(&tea, LineInput::count(2)).unwrap();
        let now = Utc::now();
        HeldOrder {
            id: id.to_string(),
            session_id: session.to_string(),
            cashier_id: "c1".to_string(),
            warehouse_id: "main".to_string(),
            lines: vec![HeldLine {
                line,
                reservation: ReservationHandle("r1".into()),
            }],
            discount: Discount::percent(10),
            status: HoldStatus::Held,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrips_snapshot() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().held_orders();
        let order = held("h1", "s1");
        repo.insert(&order).await.unwrap();

        let loaded = repo.get("h1").await.unwrap().unwrap();
        assert_eq!(loaded.lines, order.lines);
        assert_eq!(loaded.discount, Discount::percent(10));
        assert_eq!(loaded.status, HoldStatus::Held);
        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_held_excludes_terminal_orders() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().held_orders();
        repo.insert(&held("h1", "s1")).await.unwrap();
        repo.insert(&held("h2", "s1")).await.unwrap();
        repo.insert(&held("h3", "s2")).await.unwrap();

        repo.transition("h1", HoldStatus::Held, HoldStatus::Cancelled)
            .await
            .unwrap();

        let listed = repo.list_held("s1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "h2");
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().held_orders();
        repo.insert(&held("h1", "s1")).await.unwrap();

        repo.transition("h1", HoldStatus::Held, HoldStatus::Resumed)
            .await
            .unwrap();

        let err = repo
            .transition("h1", HoldStatus::Held, HoldStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ConcurrentModification { entity: "held_order", .. }));

        let err = repo
            .transition("h1", HoldStatus::Resumed, HoldStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));

        let err = repo
            .transition("missing", HoldStatus::Held, HoldStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
