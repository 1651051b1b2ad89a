//! # Shift Manager
//!
//! Opens and closes cash shifts.
//!
//! ## Close Flow
//! ```text
//! close(actor, shift_id, counted, notes)
//!   │
//!   ├─ load shift ───────────────── missing ──► NotFound
//!   ├─ capability ───────────────── own shift: CloseOwnShift
//!   │                               otherwise: ManageShifts
//!   ├─ still open? ──────────────── no ──► InvalidState
//!   ├─ expected = CashReconciler (fresh ledger read)
//!   ├─ close gate ───────────────── |diff| > 0.01, no note ──► RequiresNote
//!   └─ ShiftStore::close (conditional) ─ lost race ──► ConcurrentModification
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use till_core::ports::{PaymentLedger, PermissionChecker, ShiftStore};
use till_core::reconcile::{close_gate, summarize};
use till_core::validation::{validate_drawer_amount, validate_id};
use till_core::{Capability, CashShift, CoreError, CoreResult, Money, ShiftStatus, ShiftSummary};

use crate::reconciler::CashReconciler;

#[derive(Clone)]
pub struct ShiftManager {
    shifts: Arc<dyn ShiftStore>,
    ledger: Arc<dyn PaymentLedger>,
    permissions: Arc<dyn PermissionChecker>,
    reconciler: CashReconciler,
}

impl ShiftManager {
    pub fn new(
        shifts: Arc<dyn ShiftStore>,
        ledger: Arc<dyn PaymentLedger>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Self {
        let reconciler = CashReconciler::new(shifts.clone(), ledger.clone());
        ShiftManager {
            shifts,
            ledger,
            permissions,
            reconciler,
        }
    }

    /// Opens a shift for `cashier_id` with the counted opening float.
    ///
    /// ## Errors
    /// - `Validation` for a blank id or negative float
    /// - `PermissionDenied` without `OpenShift`
    /// - `AlreadyOpen` if the cashier already has an open shift
    pub async fn open(&self, cashier_id: &str, start_amount: Money) -> CoreResult<CashShift> {
        validate_id("cashier_id", cashier_id)?;
        validate_drawer_amount("start_amount", start_amount)?;
        self.permissions
            .require(cashier_id, Capability::OpenShift)
            .await?;

        let shift = self.shifts.insert_open(cashier_id, start_amount).await?;

        info!(
            shift_id = %shift.id,
            cashier_id = %cashier_id,
            start = %start_amount,
            "Shift opened"
        );
        Ok(shift)
    }

    /// Closes `shift_id` with the counted drawer amount.
    ///
    /// `actor_id` is whoever performs the close: the shift's own cashier, or
    /// a manager closing on their behalf.
    pub async fn close(
        &self,
        actor_id: &str,
        shift_id: &str,
        end_amount: Money,
        notes: Option<&str>,
    ) -> CoreResult<CashShift> {
        let shift = self
            .shifts
            .get(shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("cash_shift", shift_id))?;

        let capability = if shift.cashier_id == actor_id {
            Capability::CloseOwnShift
        } else {
            Capability::ManageShifts
        };
        self.permissions.require(actor_id, capability).await?;

        if shift.status != ShiftStatus::Open {
            return Err(CoreError::InvalidState {
                entity: "cash_shift",
                id: shift.id,
                current: shift.status.to_string(),
            });
        }

        let expected = self.reconciler.expected_for(&shift).await?;
        let closure = close_gate(expected, end_amount, notes).map_err(|e| {
            warn!(
                shift_id = %shift_id,
                expected = %expected,
                counted = %end_amount,
                "Shift close rejected"
            );
            e
        })?;

        let closed = self.shifts.close(shift_id, &closure).await?;

        info!(
            shift_id = %shift_id,
            closed_by = %actor_id,
            expected = %closure.expected_amount,
            counted = %closure.end_amount,
            difference = %closure.difference,
            "Shift closed"
        );
        Ok(closed)
    }

    /// The open shift of `cashier_id`, if any.
    ///
    /// Looking at another cashier's shift requires `ManageShifts`.
    pub async fn current(&self, actor_id: &str, cashier_id: &str) -> CoreResult<Option<CashShift>> {
        if actor_id != cashier_id {
            self.permissions
                .require(actor_id, Capability::ManageShifts)
                .await?;
        }
        self.shifts.current_for(cashier_id).await
    }

    /// X-report for `shift_id`, computed from the ledger on every call.
    pub async fn summary(&self, actor_id: &str, shift_id: &str) -> CoreResult<ShiftSummary> {
        let shift = self
            .shifts
            .get(shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("cash_shift", shift_id))?;

        if shift.cashier_id != actor_id {
            self.permissions
                .require(actor_id, Capability::ManageShifts)
                .await?;
        }

        let entries = self.ledger.entries_for_shift(shift_id).await?;
        Ok(summarize(&shift, &entries))
    }

    pub fn reconciler(&self) -> &CashReconciler {
        &self.reconciler
    }
}
