//! # Cash Reconciliation
//!
//! Pure formulas behind shift close and the X-report.
//!
//! ```text
//! expected = start + Σ(cash in, shift) − Σ(cash out, shift)
//!
//! close gate:
//!   |counted − expected| ≤ 0.01  ──► ok
//!   otherwise, note present      ──► ok, difference recorded
//!   otherwise                    ──► ReconciliationRequiresNote
//! ```
//!
//! Nothing here is cached. Callers load ledger entries fresh and pass them in.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    CashShift, LedgerDirection, LedgerEntry, MethodTotals, PaymentMethod, ShiftClosure,
    ShiftSummary,
};
use crate::validation::{normalize_note, validate_drawer_amount};
use crate::MONEY_EPSILON;

/// Expected drawer cash given the shift's ledger entries.
///
/// Non-cash entries are ignored, so callers may pass the shift's full ledger.
///
/// ## Example
/// ```rust
/// use till_core::reconcile::expected_cash;
/// use till_core::Money;
///
/// assert_eq!(expected_cash(Money::from_cents(10_000), &[]), Money::from_cents(10_000));
/// ```
pub fn expected_cash(start_amount: Money, entries: &[LedgerEntry]) -> Money {
    entries
        .iter()
        .filter(|e| e.method == PaymentMethod::Cash)
        .fold(start_amount, |acc, e| match e.direction {
            LedgerDirection::In => acc + e.amount,
            LedgerDirection::Out => acc - e.amount,
        })
}

/// Applies the close gate.
///
/// Returns the values to persist. The note is trimmed; a blank note counts
/// as absent.
pub fn close_gate(
    expected: Money,
    counted: Money,
    notes: Option<&str>,
) -> CoreResult<ShiftClosure> {
    validate_drawer_amount("end_amount", counted)?;

    let notes = normalize_note(notes);
    let difference = counted - expected;

    if !counted.within(expected, MONEY_EPSILON) && notes.is_none() {
        return Err(CoreError::ReconciliationRequiresNote {
            expected,
            counted,
            difference,
        });
    }

    Ok(ShiftClosure {
        end_amount: counted,
        expected_amount: expected,
        difference,
        notes,
    })
}

/// Builds the X-report for `shift` from its ledger entries.
pub fn summarize(shift: &CashShift, entries: &[LedgerEntry]) -> ShiftSummary {
    let mut by_method: BTreeMap<PaymentMethod, MethodTotals> = BTreeMap::new();

    for entry in entries {
        let totals = by_method.entry(entry.method).or_insert_with(|| MethodTotals {
            method: entry.method,
            total_in: Money::zero(),
            total_out: Money::zero(),
            entry_count: 0,
        });
        match entry.direction {
            LedgerDirection::In => totals.total_in += entry.amount,
            LedgerDirection::Out => totals.total_out += entry.amount,
        }
        totals.entry_count += 1;
    }

    ShiftSummary {
        shift_id: shift.id.clone(),
        cashier_id: shift.cashier_id.clone(),
        status: shift.status,
        start_amount: shift.start_amount,
        expected_cash: expected_cash(shift.start_amount, entries),
        by_method: by_method.into_values().collect(),
        entry_count: entries.len() as u32,
    }
}
