//! # Held Orders
//!
//! Park a priced cart with its stock reserved, then either cancel it or
//! resume it into a paid sale.
//!
//! ## State Machine
//! ```text
//!              ┌──────── cancel ────────► cancelled
//!   held ──────┤
//!              └──────── resume ────────► resumed
//!
//!   Both targets are terminal; anything else is InvalidState.
//! ```
//!
//! ## Reservation Lifecycle
//! ```text
//! hold    : reserve line 1 ─► reserve line 2 ─► ... ─► insert hold
//!           any failure ─► release acquired (reverse order) ─► error
//!
//! cancel  : held → cancelled (conditional) ─► release every handle
//!           failed releases ─► ReleasePending, freed by retry_release
//!
//! resume  : prepare sale (hold untouched on failure)
//!           SaleStore::commit claims held → resumed with the order
//!           consume every handle; failures become ConsumptionPending
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use till_core::ports::{
    HeldOrderStore, PermissionChecker, SaleCommit, SaleStore, ShiftStore, StockReservationService,
};
use till_core::cart::validate_lines;
use till_core::settlement::{prepare, SaleRequest};
use till_core::validation::validate_id;
use till_core::{
    Advisory, Cancellation, Capability, CartLine, CoreError, CoreResult, Discount, HeldLine,
    HeldOrder, HoldStatus, PaymentEntry, PaymentMethod, ReservationHandle, Settlement,
};

#[derive(Clone)]
pub struct HoldOrderManager {
    holds: Arc<dyn HeldOrderStore>,
    stock: Arc<dyn StockReservationService>,
    shifts: Arc<dyn ShiftStore>,
    sales: Arc<dyn SaleStore>,
    permissions: Arc<dyn PermissionChecker>,
    warehouse_id: String,
    device_id: String,
}

impl HoldOrderManager {
    pub fn new(
        holds: Arc<dyn HeldOrderStore>,
        stock: Arc<dyn StockReservationService>,
        shifts: Arc<dyn ShiftStore>,
        sales: Arc<dyn SaleStore>,
        permissions: Arc<dyn PermissionChecker>,
        warehouse_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        HoldOrderManager {
            holds,
            stock,
            shifts,
            sales,
            permissions,
            warehouse_id: warehouse_id.into(),
            device_id: device_id.into(),
        }
    }

    // =========================================================================
    // Hold
    // =========================================================================

    /// Reserves stock for every line and stores the hold.
    ///
    /// All-or-nothing: when any reservation fails, the ones acquired in this
    /// call are released and the error is returned.
    pub async fn hold(
        &self,
        cashier_id: &str,
        session_id: &str,
        lines: Vec<CartLine>,
        discount: Discount,
    ) -> CoreResult<HeldOrder> {
        validate_id("session_id", session_id)?;
        self.permissions
            .require(cashier_id, Capability::CreateInStoreSale)
            .await?;
        if lines.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        validate_lines(&lines)?;

        let mut held_lines: Vec<HeldLine> = Vec::with_capacity(lines.len());
        for line in lines {
            let reserved = self
                .stock
                .reserve(&line.item_id, &self.warehouse_id, line.reserve_qty())
                .await;
            match reserved {
                Ok(reservation) => held_lines.push(HeldLine { line, reservation }),
                Err(e) => {
                    warn!(
                        item_id = %line.item_id,
                        acquired = held_lines.len(),
                        error = %e,
                        "Hold failed, releasing acquired reservations"
                    );
                    self.release_all(held_lines.iter().rev().map(|h| &h.reservation))
                        .await;
                    return Err(e);
                }
            }
        }

        let now = Utc::now();
        let order = HeldOrder {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            cashier_id: cashier_id.to_string(),
            warehouse_id: self.warehouse_id.clone(),
            lines: held_lines,
            discount,
            status: HoldStatus::Held,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.holds.insert(&order).await {
            error!(held_order_id = %order.id, error = %e, "Held order not stored, releasing reservations");
            self.release_all(order.lines.iter().rev().map(|h| &h.reservation))
                .await;
            return Err(e);
        }

        info!(
            held_order_id = %order.id,
            session_id = %session_id,
            lines = order.lines.len(),
            "Order held"
        );
        Ok(order)
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels a held order and returns its stock.
    ///
    /// The status moves before any reservation is released. Handles that
    /// fail to release are reported through [`Advisory::ReleasePending`]
    /// and can be freed later with [`retry_release`](Self::retry_release).
    pub async fn cancel(&self, cashier_id: &str, held_order_id: &str) -> CoreResult<Cancellation> {
        self.permissions
            .require(cashier_id, Capability::CreateInStoreSale)
            .await?;

        let mut order = self.load_held(held_order_id).await?;
        self.holds
            .transition(held_order_id, HoldStatus::Held, HoldStatus::Cancelled)
            .await?;

        order.status = HoldStatus::Cancelled;
        order.updated_at = Utc::now();
        let advisories: Vec<Advisory> = self.release_order(&order).await.into_iter().collect();

        info!(
            held_order_id = %held_order_id,
            pending = !advisories.is_empty(),
            "Held order cancelled"
        );
        Ok(Cancellation { order, advisories })
    }

    /// Releases the reservations of a cancelled hold again.
    ///
    /// Handles already released are no-ops, so this is safe to repeat until
    /// no `ReleasePending` advisory comes back.
    pub async fn retry_release(
        &self,
        cashier_id: &str,
        held_order_id: &str,
    ) -> CoreResult<Cancellation> {
        self.permissions
            .require(cashier_id, Capability::CreateInStoreSale)
            .await?;

        let order = self
            .holds
            .get(held_order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("held_order", held_order_id))?;
        if order.status != HoldStatus::Cancelled {
            return Err(CoreError::InvalidState {
                entity: "held_order",
                id: order.id,
                current: order.status.to_string(),
            });
        }

        let advisories: Vec<Advisory> = self.release_order(&order).await.into_iter().collect();
        Ok(Cancellation { order, advisories })
    }

    // =========================================================================
    // Resume
    // =========================================================================

    /// Settles a held order.
    ///
    /// A settlement rejection leaves the hold `held` with its reservations.
    /// Once the order commits, the sale stands: a reservation that fails to
    /// consume is reported through [`Advisory::ConsumptionPending`].
    pub async fn resume(
        &self,
        cashier_id: &str,
        held_order_id: &str,
        payment_method: PaymentMethod,
        breakdown: Vec<PaymentEntry>,
    ) -> CoreResult<Settlement> {
        self.permissions
            .require(cashier_id, Capability::CreateInStoreSale)
            .await?;

        let held = self.load_held(held_order_id).await?;
        let open_shift = self.shifts.current_for(cashier_id).await?;

        let request = SaleRequest {
            cashier_id: cashier_id.to_string(),
            lines: held.cart_lines(),
            discount: held.discount,
            payment_method,
            breakdown,
        };
        let draft = prepare(request, open_shift.as_ref(), Some(held.id.clone()))?;
        let mut advisories = draft.advisories.clone();

        let order = self
            .sales
            .commit(SaleCommit {
                draft,
                device_id: self.device_id.clone(),
            })
            .await?;

        let mut pending: Vec<String> = Vec::new();
        for handle in held.reservations() {
            if let Err(e) = self.stock.consume(handle).await {
                error!(
                    held_order_id = %held.id,
                    reservation_id = %handle,
                    error = %e,
                    "Reservation not consumed after sale"
                );
                pending.push(handle.0.clone());
            }
        }
        if !pending.is_empty() {
            advisories.push(Advisory::ConsumptionPending {
                held_order_id: held.id.clone(),
                reservation_ids: pending,
            });
        }

        info!(
            held_order_id = %held.id,
            order_id = %order.id,
            receipt = %order.receipt_number,
            total = %order.total,
            "Held order resumed"
        );
        Ok(Settlement { order, advisories })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, held_order_id: &str) -> CoreResult<Option<HeldOrder>> {
        self.holds.get(held_order_id).await
    }

    /// Orders still held for `session_id`, oldest first.
    pub async fn list_held(&self, session_id: &str) -> CoreResult<Vec<HeldOrder>> {
        self.holds.list_held(session_id).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_held(&self, held_order_id: &str) -> CoreResult<HeldOrder> {
        let order = self
            .holds
            .get(held_order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("held_order", held_order_id))?;

        if order.status != HoldStatus::Held {
            return Err(CoreError::InvalidState {
                entity: "held_order",
                id: order.id,
                current: order.status.to_string(),
            });
        }
        Ok(order)
    }

    async fn release_order(&self, order: &HeldOrder) -> Option<Advisory> {
        let failed = self.release_all(order.reservations()).await;
        (!failed.is_empty()).then(|| Advisory::ReleasePending {
            held_order_id: order.id.clone(),
            reservation_ids: failed,
        })
    }

    /// Releases every handle, returning the ids that failed.
    async fn release_all<'a>(
        &self,
        handles: impl IntoIterator<Item = &'a ReservationHandle>,
    ) -> Vec<String> {
        let mut failed = Vec::new();
        for handle in handles {
            match self.stock.release(handle).await {
                Ok(()) => debug!(reservation_id = %handle, "Reservation released"),
                Err(e) => {
                    error!(reservation_id = %handle, error = %e, "Reservation release failed");
                    failed.push(handle.0.clone());
                }
            }
        }
        failed
    }
}
