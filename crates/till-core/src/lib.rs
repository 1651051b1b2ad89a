//! # till-core: Pure Register Logic
//!
//! Cart pricing, the reconciliation formula, settlement rules, the error
//! taxonomy and the collaborator traits of the register engine. No I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Till Register Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Caller (POS UI / back-office API)               │   │
//! │  │      open shift ──► cart ──► hold? ──► pay ──► close shift      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 till-register (orchestration)                   │   │
//! │  │   ShiftManager, CashReconciler, HoldOrderManager, Settlement    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   cart    │  │ reconcile │  │settlement │  │   │
//! │  │   │ Money/Qty │  │  pricing  │  │ expected  │  │  rules    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                 │   │
//! │  │   │   types   │  │   error   │  │   ports   │                 │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲ implements ports                       │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │                    till-db (SQLite stores)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] / [`quantity`] - Integer cents and milli-units
//! - [`types`] - Shifts, ledger entries, holds, orders
//! - [`cart`] - CartEngine: lines and totals
//! - [`reconcile`] - Expected cash, close gate, X-report
//! - [`settlement`] - Breakdown validation and sale drafts
//! - [`ports`] - Collaborator traits
//! - [`error`] / [`validation`] - Error taxonomy and input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::reconcile::{close_gate, expected_cash};
//! use till_core::Money;
//!
//! let expected = expected_cash(Money::from_cents(10_000), &[]);
//! assert!(close_gate(expected, Money::from_cents(10_000), None).is_ok());
//! assert!(close_gate(expected, Money::from_cents(9_000), None).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod ports;
pub mod quantity;
pub mod reconcile;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals, CatalogItem, LineInput, PricedLine, UnitKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Qty;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tolerance for comparing counted cash against expected cash.
pub const MONEY_EPSILON: Money = Money::from_cents(1);

/// Maximum lines allowed in a single cart
///
/// ## Business Reason
/// Prevents runaway carts and keeps held orders a reasonable size.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single count line
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;
