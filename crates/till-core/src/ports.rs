//! # Collaborator Ports
//!
//! Traits the register engine orchestrates over. `till-db` implements all of
//! them on SQLite; tests may substitute their own.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        till-register services                           │
//! │   ShiftManager   CashReconciler   HoldOrderManager   PaymentSettlement  │
//! └───────┬────────────────┬─────────────────┬──────────────────┬───────────┘
//!         │                │                 │                  │
//!         ▼                ▼                 ▼                  ▼
//!   ShiftStore      PaymentLedger    StockReservation     SaleStore
//!   (unique open    (read-only       Service              (order + ledger
//!    per cashier)    queries)        HeldOrderStore        + hold claim,
//!                                    (conditional          one transaction)
//!                                     transitions)
//!
//!   PermissionChecker: has(actor, capability)
//! ```
//!
//! ## Atomicity Contract
//! - `ShiftStore::insert_open` fails with `AlreadyOpen` when the cashier
//!   already has an open shift, enforced by the store
//! - `ShiftStore::close` and `HeldOrderStore::transition` are conditional
//!   updates; losing the race yields `ConcurrentModification`
//! - `SaleStore::commit` writes the order, its ledger entries and (for a
//!   resumed hold) the `held → resumed` claim together or not at all

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::quantity::Qty;
use crate::settlement::SaleDraft;
use crate::types::{
    CashShift, Capability, HeldOrder, HoldStatus, LedgerEntry, Order, PaymentMethod,
    ReservationHandle, ShiftClosure,
};

// =============================================================================
// Shifts & Ledger
// =============================================================================

#[async_trait]
pub trait ShiftStore: Send + Sync {
    /// Inserts an open shift. `AlreadyOpen` if one exists for the cashier.
    async fn insert_open(&self, cashier_id: &str, start_amount: Money) -> CoreResult<CashShift>;

    async fn get(&self, shift_id: &str) -> CoreResult<Option<CashShift>>;

    /// The cashier's open shift, if any.
    async fn current_for(&self, cashier_id: &str) -> CoreResult<Option<CashShift>>;

    /// Writes `closure` if the shift is still open.
    async fn close(&self, shift_id: &str, closure: &ShiftClosure) -> CoreResult<CashShift>;
}

/// Read side of the payment ledger.
///
/// Writes happen only inside [`SaleStore::commit`].
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Entries for `shift_id` with the given method, oldest first.
    async fn query(&self, shift_id: &str, method: PaymentMethod) -> CoreResult<Vec<LedgerEntry>>;

    /// Every entry for `shift_id`, oldest first.
    async fn entries_for_shift(&self, shift_id: &str) -> CoreResult<Vec<LedgerEntry>>;
}

// =============================================================================
// Stock & Holds
// =============================================================================

/// Per-item atomic reservations.
///
/// `release` and `consume` are idempotent for a handle already in that
/// state and fail with `InvalidState` for a handle in the other one.
#[async_trait]
pub trait StockReservationService: Send + Sync {
    async fn reserve(&self, item_id: &str, warehouse_id: &str, qty: Qty)
        -> CoreResult<ReservationHandle>;

    async fn release(&self, handle: &ReservationHandle) -> CoreResult<()>;

    async fn consume(&self, handle: &ReservationHandle) -> CoreResult<()>;

    /// On hand minus active reservations.
    async fn available(&self, item_id: &str, warehouse_id: &str) -> CoreResult<Qty>;
}

#[async_trait]
pub trait HeldOrderStore: Send + Sync {
    async fn insert(&self, order: &HeldOrder) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<HeldOrder>>;

    /// Orders still `held` for a POS session, oldest first.
    async fn list_held(&self, session_id: &str) -> CoreResult<Vec<HeldOrder>>;

    /// Moves `id` from `from` to `to` iff its status is still `from`.
    async fn transition(&self, id: &str, from: HoldStatus, to: HoldStatus) -> CoreResult<()>;
}

// =============================================================================
// Sales
// =============================================================================

/// Everything `SaleStore::commit` needs.
#[derive(Debug, Clone)]
pub struct SaleCommit {
    pub draft: SaleDraft,
    /// Source of the receipt number's device code.
    pub device_id: String,
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Atomically claims the hold (if any), assigns the receipt number and
    /// writes order plus ledger entries.
    async fn commit(&self, commit: SaleCommit) -> CoreResult<Order>;

    async fn get_order(&self, order_id: &str) -> CoreResult<Option<Order>>;
}

// =============================================================================
// Permissions
// =============================================================================

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has(&self, actor_id: &str, capability: Capability) -> CoreResult<bool>;

    /// `PermissionDenied` unless `actor_id` holds `capability`.
    async fn require(&self, actor_id: &str, capability: Capability) -> CoreResult<()> {
        if self.has(actor_id, capability).await? {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                actor_id: actor_id.to_string(),
                capability: capability.to_string(),
            })
        }
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// The full set of collaborators a register needs.
#[derive(Clone)]
pub struct Collaborators {
    pub shifts: Arc<dyn ShiftStore>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub stock: Arc<dyn StockReservationService>,
    pub holds: Arc<dyn HeldOrderStore>,
    pub sales: Arc<dyn SaleStore>,
    pub permissions: Arc<dyn PermissionChecker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl PermissionChecker for Fixed {
        async fn has(&self, _actor_id: &str, _capability: Capability) -> CoreResult<bool> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_require_maps_to_permission_denied() {
        assert!(Fixed(true).require("c1", Capability::OpenShift).await.is_ok());

        let err = Fixed(false)
            .require("c1", Capability::ManageShifts)
            .await
            .unwrap_err();
        match err {
            CoreError::PermissionDenied {
                actor_id,
                capability,
            } => {
                assert_eq!(actor_id, "c1");
                assert_eq!(capability, "manage_shifts");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
