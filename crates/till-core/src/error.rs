//! # Error Types
//!
//! Domain-specific error types for the register engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Every failure a register operation can return  │
//! │  └── ValidationError  - Input shape failures (wrapped by CoreError)    │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError          - Store failures, mapped into CoreError          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ← DbError                           │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                   caller: code() + is_retryable()                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retry Policy
//! Business failures carry structured detail and are final. Only
//! [`CoreError::Unavailable`] (store/transport down) may be retried, and the
//! retry belongs to the caller.

use thiserror::Error;

use crate::money::Money;
use crate::quantity::Qty;

// =============================================================================
// Core Error
// =============================================================================

/// Register engine errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed shape validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Actor lacks the capability for this operation.
    #[error("Actor {actor_id} lacks capability {capability}")]
    PermissionDenied { actor_id: String, capability: String },

    /// The cashier already has an open shift.
    ///
    /// ## User Workflow
    /// ```text
    /// open(cashier) ──► AlreadyOpen
    ///      │
    ///      ▼
    /// current(cashier) ──► resume the existing shift
    /// ```
    #[error("Cashier {cashier_id} already has an open shift")]
    AlreadyOpen { cashier_id: String },

    /// Entity is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Closing a closed shift
    /// - Cancelling or resuming a hold that is no longer `held`
    #[error("{entity} {id} is {current}, cannot perform operation")]
    InvalidState {
        entity: &'static str,
        id: String,
        current: String,
    },

    /// Reservation could not be satisfied.
    #[error("Insufficient stock for {item_id} in {warehouse_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        warehouse_id: String,
        requested: Qty,
        available: Qty,
    },

    /// Settlement was attempted with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Computed total is zero or negative.
    #[error("Sale total must be positive, got {total}")]
    InvalidAmount { total: Money },

    /// Payment breakdown does not add up to the sale total.
    #[error("Payment breakdown sums to {actual}, expected {expected}")]
    AmountMismatch { expected: Money, actual: Money },

    /// A non-cash entry is missing or contradicts its proof fields.
    #[error("Payment entry #{entry_index} ({method}): {reason}")]
    PaymentProof {
        entry_index: usize,
        method: String,
        reason: String,
    },

    /// Cash was tendered but the cashier has no open shift.
    #[error("Cashier {cashier_id} has no open shift for a cash payment")]
    NoOpenShift { cashier_id: String },

    /// Counted cash differs from expected and no note explains it.
    #[error("Counted {counted} differs from expected {expected} by {difference}; a note is required")]
    ReconciliationRequiresNote {
        expected: Money,
        counted: Money,
        difference: Money,
    },

    /// Conditional update lost a race with another writer.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: &'static str, id: String },

    /// Entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Store or transport failure.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    /// True only for connectivity failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Unavailable(_))
    }

    /// Stable code for callers rendering messages.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::PermissionDenied { .. } => "PERMISSION_DENIED",
            CoreError::AlreadyOpen { .. } => "ALREADY_OPEN",
            CoreError::InvalidState { .. } => "INVALID_STATE",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::EmptyCart => "EMPTY_CART",
            CoreError::InvalidAmount { .. } => "INVALID_AMOUNT",
            CoreError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            CoreError::PaymentProof { .. } => "PAYMENT_PROOF",
            CoreError::NoOpenShift { .. } => "NO_OPEN_SHIFT",
            CoreError::ReconciliationRequiresNote { .. } => "RECONCILIATION_REQUIRES_NOTE",
            CoreError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Unavailable(_) => "UNAVAILABLE",
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or positive.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            item_id: "beans".to_string(),
            warehouse_id: "main".to_string(),
            requested: Qty::from_units(5),
            available: Qty::from_milli(2500),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for beans in main: available 2.500, requested 5"
        );

        let err = CoreError::AmountMismatch {
            expected: Money::from_cents(5000),
            actual: Money::from_cents(4999),
        };
        assert_eq!(
            err.to_string(),
            "Payment breakdown sums to 49.99, expected 50.00"
        );
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(CoreError::Unavailable("pool timed out".into()).is_retryable());
        assert!(!CoreError::EmptyCart.is_retryable());
        assert!(!CoreError::ConcurrentModification {
            entity: "held_order",
            id: "h1".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            CoreError::NoOpenShift {
                cashier_id: "c1".into()
            }
            .code(),
            "NO_OPEN_SHIFT"
        );
        assert_eq!(CoreError::not_found("shift", "s1").code(), "NOT_FOUND");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "notes".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.code(), "VALIDATION");
    }
}
