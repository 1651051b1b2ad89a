//! # Settlement Rules
//!
//! Pure validation of a payment breakdown against a priced cart.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleRequest + open shift?                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. no lines → EmptyCart        malformed line → Validation             │
//! │  2. compute_totals(lines, discount)        total ≤ 0 → InvalidAmount    │
//! │  3. cash tendered and no open shift → NoOpenShift                       │
//! │     non-cash and no open shift      → Advisory::NoOpenShift             │
//! │  4. Σ breakdown == total (exact cents) else AmountMismatch              │
//! │  5. non-cash proof fields           → PaymentProof                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleDraft (priced snapshot + ledger entries) → SaleStore::commit       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A one-cent gap between the breakdown and the total is a mismatch; the
//! sum must be exact. A declared transfer amount may differ from its entry
//! by at most one cent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cart::{compute_totals, validate_lines, CartLine, CartTotals};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    Advisory, CashShift, Discount, LedgerDirection, NewLedgerEntry, PaymentEntry, PaymentMethod,
};
use crate::validation::validate_positive_amount;
use crate::MONEY_EPSILON;

// =============================================================================
// Request / Draft
// =============================================================================

/// What the caller wants to settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub cashier_id: String,
    pub lines: Vec<CartLine>,
    pub discount: Discount,
    pub payment_method: PaymentMethod,
    pub breakdown: Vec<PaymentEntry>,
}

/// A validated sale, ready for the atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleDraft {
    pub cashier_id: String,
    pub shift_id: Option<String>,
    pub held_order_id: Option<String>,
    pub totals: CartTotals,
    pub discount: Discount,
    pub payment_method: PaymentMethod,
    pub breakdown: Vec<PaymentEntry>,
    pub change_due: Money,
    pub ledger: Vec<NewLedgerEntry>,
    pub advisories: Vec<Advisory>,
}

// =============================================================================
// Prepare
// =============================================================================

/// Runs every settlement rule and builds the draft.
///
/// `open_shift` is the cashier's current open shift, if any.
/// `held_order_id` marks a draft that resumes a hold.
pub fn prepare(
    request: SaleRequest,
    open_shift: Option<&CashShift>,
    held_order_id: Option<String>,
) -> CoreResult<SaleDraft> {
    // 1-2: lines, then totals
    if request.lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    validate_lines(&request.lines)?;
    let totals = compute_totals(&request.lines, &request.discount);
    if !totals.total.is_positive() {
        return Err(CoreError::InvalidAmount {
            total: totals.total,
        });
    }

    // 3: shift gate; cash without a shift fails whatever the amounts
    let uses_cash = request.payment_method.is_cash()
        || request.breakdown.iter().any(|e| e.method.is_cash());
    let mut advisories = Vec::new();
    let shift_id = match open_shift.filter(|s| s.is_open()) {
        Some(shift) => Some(shift.id.clone()),
        None if uses_cash => {
            return Err(CoreError::NoOpenShift {
                cashier_id: request.cashier_id,
            })
        }
        None => {
            advisories.push(Advisory::NoOpenShift {
                cashier_id: request.cashier_id.clone(),
            });
            None
        }
    };

    // 4: breakdown shape, then the amount law
    check_breakdown_shape(request.payment_method, &request.breakdown)?;
    let paid: Money = request.breakdown.iter().map(|e| e.amount).sum();
    if paid != totals.total {
        return Err(CoreError::AmountMismatch {
            expected: totals.total,
            actual: paid,
        });
    }

    // 5: proof
    for (idx, entry) in request.breakdown.iter().enumerate() {
        if !entry.method.is_cash() {
            check_proof(idx, entry)?;
        }
    }

    let change_due: Money = request
        .breakdown
        .iter()
        .filter(|e| e.method.is_cash())
        .filter_map(|e| e.cash_received.map(|r| r - e.amount))
        .sum();

    let ledger: Vec<NewLedgerEntry> = request
        .breakdown
        .iter()
        .map(|e| NewLedgerEntry {
            direction: LedgerDirection::In,
            method: e.method,
            amount: e.amount,
            shift_id: shift_id.clone(),
        })
        .collect();

    Ok(SaleDraft {
        cashier_id: request.cashier_id,
        shift_id,
        held_order_id,
        totals,
        discount: request.discount,
        payment_method: request.payment_method,
        breakdown: request.breakdown,
        change_due,
        ledger,
        advisories,
    })
}

fn check_breakdown_shape(method: PaymentMethod, breakdown: &[PaymentEntry]) -> CoreResult<()> {
    for entry in breakdown {
        if entry.method == PaymentMethod::Split {
            return Err(ValidationError::NotAllowed {
                field: "breakdown method".to_string(),
                allowed: ["cash", "network", "bank_transfer", "wallet"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }
            .into());
        }
        if method != PaymentMethod::Split && entry.method != method {
            return Err(ValidationError::InvalidFormat {
                field: "breakdown method".to_string(),
                reason: format!("{} entry in a {} payment", entry.method, method),
            }
            .into());
        }
        validate_positive_amount("payment amount", entry.amount)?;
        if let Some(received) = entry.cash_received {
            if received < entry.amount {
                return Err(ValidationError::OutOfRange {
                    field: "cash_received".to_string(),
                    min: entry.amount.cents(),
                    max: i64::MAX,
                }
                .into());
            }
        }
    }
    Ok(())
}

fn check_proof(entry_index: usize, entry: &PaymentEntry) -> CoreResult<()> {
    let fail = |reason: &str| CoreError::PaymentProof {
        entry_index,
        method: entry.method.to_string(),
        reason: reason.to_string(),
    };

    if is_blank(entry.reference_number.as_deref()) {
        return Err(fail("reference number is required"));
    }
    if is_blank(entry.sender_name.as_deref()) {
        return Err(fail("sender name is required"));
    }
    match entry.declared_amount {
        Some(declared) if declared.within(entry.amount, MONEY_EPSILON) => {}
        Some(_) => return Err(fail("declared amount does not match entry amount")),
        None => return Err(fail("declared amount is required")),
    }
    if !entry.amount_confirmed {
        return Err(fail("amount has not been confirmed"));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).map_or(true, str::is_empty)
}

// =============================================================================
// Receipt Numbers
// =============================================================================

/// Formats `YYYYMMDD-DD-NNNN`.
///
/// `DD` is the last two characters of the device id, or `00` when the id is
/// shorter than that. `NNNN` is the per-day sequence.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use till_core::settlement::format_receipt_number;
///
/// let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
/// assert_eq!(format_receipt_number(day, "till-07", 12), "20261019-07-0012");
/// assert_eq!(format_receipt_number(day, "7", 1), "20261019-00-0001");
/// ```
pub fn format_receipt_number(day: NaiveDate, device_id: &str, sequence: u32) -> String {
    let chars: Vec<char> = device_id.chars().collect();
    let device_code: String = if chars.len() < 2 {
        "00".to_string()
    } else {
        chars[chars.len() - 2..].iter().collect()
    };
    format!("{}-{}-{:04}", day.format("%Y%m%d"), device_code, sequence)
}

// =============================================================================
// Unit Tests
// =============================================================================
