//! # Payment Settlement
//!
//! Turns a cart and a payment breakdown into a committed order.

use std::sync::Arc;

use tracing::{info, warn};

use till_core::ports::{PermissionChecker, SaleCommit, SaleStore, ShiftStore};
use till_core::settlement::{prepare, SaleRequest};
use till_core::{Advisory, Capability, CoreResult, Order, Settlement};

#[derive(Clone)]
pub struct PaymentSettlement {
    shifts: Arc<dyn ShiftStore>,
    sales: Arc<dyn SaleStore>,
    permissions: Arc<dyn PermissionChecker>,
    device_id: String,
}

impl PaymentSettlement {
    pub fn new(
        shifts: Arc<dyn ShiftStore>,
        sales: Arc<dyn SaleStore>,
        permissions: Arc<dyn PermissionChecker>,
        device_id: impl Into<String>,
    ) -> Self {
        PaymentSettlement {
            shifts,
            sales,
            permissions,
            device_id: device_id.into(),
        }
    }

    /// Validates and commits a direct (never held) sale.
    ///
    /// ## Errors
    /// `EmptyCart`, `InvalidAmount`, `AmountMismatch`, `NoOpenShift`,
    /// `PaymentProof` or a `Validation` error from the breakdown, plus
    /// whatever the sale store raises. Nothing is written on rejection.
    pub async fn finalize(&self, request: SaleRequest) -> CoreResult<Settlement> {
        self.permissions
            .require(&request.cashier_id, Capability::CreateInStoreSale)
            .await?;

        let open_shift = self.shifts.current_for(&request.cashier_id).await?;
        let draft = prepare(request, open_shift.as_ref(), None)?;
        let advisories = draft.advisories.clone();

        for advisory in &advisories {
            if let Advisory::NoOpenShift { cashier_id } = advisory {
                warn!(cashier_id = %cashier_id, "Non-cash sale recorded without an open shift");
            }
        }

        let order = self
            .sales
            .commit(SaleCommit {
                draft,
                device_id: self.device_id.clone(),
            })
            .await?;

        info!(
            order_id = %order.id,
            receipt = %order.receipt_number,
            method = %order.payment_method,
            total = %order.total,
            "Sale finalized"
        );
        Ok(Settlement { order, advisories })
    }

    pub async fn order(&self, order_id: &str) -> CoreResult<Option<Order>> {
        self.sales.get_order(order_id).await
    }
}
