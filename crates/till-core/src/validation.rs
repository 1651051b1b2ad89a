//! # Validation Module
//!
//! Input validation for register operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI / API)                                            │
//! │  └── Format checks, immediate feedback                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Quantities, weights, amounts, ids                                 │
//! │  └── Returns ValidationError (never panics)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (SQLite)                                               │
//! │  ├── CHECK (amount > 0)                                                │
//! │  └── UNIQUE open shift per cashier                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_quantity, validate_weight};
//! use till_core::Qty;
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_weight(Qty::from_milli(0)).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Qty;
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required identifier (cashier id, item id, ...).
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_id;
///
/// assert!(validate_id("cashier_id", "c-17").is_ok());
/// assert!(validate_id("cashier_id", "   ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be at most 64 characters".to_string(),
        });
    }

    Ok(())
}

/// Normalizes optional free text: trims and maps blank to `None`.
///
/// ## Example
/// ```rust
/// use till_core::validation::normalize_note;
///
/// assert_eq!(normalize_note(Some("  short by 30 ")), Some("short by 30".to_string()));
/// assert_eq!(normalize_note(Some("   ")), None);
/// assert_eq!(normalize_note(None), None);
/// ```
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a count quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a weight.
///
/// ## Rules
/// - Must be positive (> 0 milli-units)
/// - Whole units must not exceed MAX_ITEM_QUANTITY
pub fn validate_weight(weight: Qty) -> ValidationResult<()> {
    if !weight.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "weight".to_string(),
        });
    }

    if weight.milli() > Qty::from_units(MAX_ITEM_QUANTITY).milli() {
        return Err(ValidationError::OutOfRange {
            field: "weight".to_string(),
            min: 1,
            max: Qty::from_units(MAX_ITEM_QUANTITY).milli(),
        });
    }

    Ok(())
}

/// Validates a price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items, free addons)
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates an amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a drawer amount (shift start float or counted cash).
///
/// ```rust
/// use till_core::validation::validate_drawer_amount;
/// use till_core::Money;
///
/// assert!(validate_drawer_amount("start_amount", Money::zero()).is_ok());
/// assert!(validate_drawer_amount("start_amount", Money::from_cents(-1)).is_err());
/// ```
pub fn validate_drawer_amount(field: &str, amount: Money) -> ValidationResult<()> {
    validate_price(field, amount)
}

/// Validates a percent discount in basis points.
///
/// Negative values are rejected; values above 100% are accepted and clamped
/// when totals are computed.
pub fn validate_discount_bps(bps: i64) -> ValidationResult<()> {
    if bps < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
///
/// ## Rules
/// - Must not exceed MAX_CART_LINES (100)
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
