//! # Permission Repository
//!
//! Capability grants per actor. An actor holds a capability iff a row
//! exists in `actor_grants`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use till_core::ports::PermissionChecker;
use till_core::{Capability, CoreResult};

use crate::error::DbResult;

const ALL_CAPABILITIES: [Capability; 4] = [
    Capability::OpenShift,
    Capability::CloseOwnShift,
    Capability::ManageShifts,
    Capability::CreateInStoreSale,
];

/// Repository for capability grants.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    /// Creates a new PermissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PermissionRepository { pool }
    }

    /// Grants `capability` to `actor_id`. Granting twice is a no-op.
    pub async fn grant(&self, actor_id: &str, capability: Capability) -> DbResult<()> {
        info!(actor_id = %actor_id, capability = %capability, "Granting capability");

        sqlx::query(
            r#"
            INSERT INTO actor_grants (actor_id, capability, granted_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (actor_id, capability) DO NOTHING
            "#,
        )
        .bind(actor_id)
        .bind(capability)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Grants every capability (a store manager).
    pub async fn grant_all(&self, actor_id: &str) -> DbResult<()> {
        for capability in ALL_CAPABILITIES {
            self.grant(actor_id, capability).await?;
        }
        Ok(())
    }

    pub async fn revoke(&self, actor_id: &str, capability: Capability) -> DbResult<()> {
        info!(actor_id = %actor_id, capability = %capability, "Revoking capability");

        sqlx::query("DELETE FROM actor_grants WHERE actor_id = ?1 AND capability = ?2")
            .bind(actor_id)
            .bind(capability)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn is_granted(&self, actor_id: &str, capability: Capability) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM actor_grants WHERE actor_id = ?1 AND capability = ?2",
        )
        .bind(actor_id)
        .bind(capability)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }
}

#[async_trait]
impl PermissionChecker for PermissionRepository {
    async fn has(&self, actor_id: &str, capability: Capability) -> CoreResult<bool> {
        Ok(self.is_granted(actor_id, capability).await?)
    }
}
