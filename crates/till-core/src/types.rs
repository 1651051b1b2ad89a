//! # Domain Types
//!
//! Core domain types shared by the register engine and its stores.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CashShift     │   │  LedgerEntry    │   │   HeldOrder     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  cashier_id     │◄──│  shift_id?      │   │  lines + handle │       │
//! │  │  start_amount   │   │  direction      │   │  discount       │       │
//! │  │  status         │   │  method, amount │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                ▲                      │ resume          │
//! │                                │ atomic commit        ▼                 │
//! │  ┌─────────────────┐   ┌───────┴─────────┐   ┌─────────────────┐       │
//! │  │  PaymentEntry   │──►│     Order       │◄──│   PricedLine    │       │
//! │  │  method, amount │   │  receipt_number │   │  line + total   │       │
//! │  │  proof fields   │   │  totals         │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machines
//! ```text
//! ShiftStatus:  open ──► closed              (terminal)
//! HoldStatus:   held ──► resumed | cancelled (both terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::cart::{CartLine, PricedLine};
use crate::money::Money;

// =============================================================================
// Capabilities
// =============================================================================

/// Permissions the engine asks the `PermissionChecker` about.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OpenShift,
    CloseOwnShift,
    ManageShifts,
    CreateInStoreSale,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::OpenShift => "open_shift",
            Capability::CloseOwnShift => "close_own_shift",
            Capability::ManageShifts => "manage_shifts",
            Capability::CreateInStoreSale => "create_in_store_sale",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Shift
// =============================================================================

/// Lifecycle of a cash shift.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl ShiftStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cashier's cash-handling session.
///
/// Created open by `ShiftManager::open`; written once more by
/// `ShiftManager::close` and never reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashShift {
    pub id: String,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Float placed in the drawer at open (never negative).
    pub start_amount: Money,
    /// Counted cash at close.
    pub end_amount: Option<Money>,
    /// Expected cash computed at close.
    pub expected_amount: Option<Money>,
    /// `end_amount - expected_amount`.
    pub difference: Option<Money>,
    pub status: ShiftStatus,
    pub notes: Option<String>,
}

impl CashShift {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

/// Values written by a successful close.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftClosure {
    pub end_amount: Money,
    pub expected_amount: Money,
    pub difference: Money,
    pub notes: Option<String>,
}

// =============================================================================
// Ledger
// =============================================================================

/// Direction of a money movement relative to the drawer.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDirection {
    In,
    Out,
}

/// Tender types.
///
/// `Split` only appears as an order's top-level method; every breakdown
/// entry names a concrete tender.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash into the drawer.
    Cash,
    /// Card network / POS terminal.
    Network,
    BankTransfer,
    /// Mobile wallet.
    Wallet,
    /// Several tenders; see the breakdown.
    Split,
}

impl PaymentMethod {
    #[inline]
    pub const fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Network => "network",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Split => "split",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded money movement. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub direction: LedgerDirection,
    pub method: PaymentMethod,
    /// Always positive; `direction` carries the sign.
    pub amount: Money,
    pub shift_id: Option<String>,
    pub order_id: Option<String>,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

/// Ledger entry produced by settlement. The store assigns id, order and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub direction: LedgerDirection,
    pub method: PaymentMethod,
    pub amount: Money,
    pub shift_id: Option<String>,
}

// =============================================================================
// Payment Breakdown
// =============================================================================

/// One tender within a payment breakdown.
///
/// ## Proof Fields
/// ```text
/// ┌────────────────┬──────────────────────────────────────────────────────┐
/// │ method         │ required                                             │
/// ├────────────────┼──────────────────────────────────────────────────────┤
/// │ cash           │ amount (cash_received optional, must be ≥ amount)    │
/// │ network        │ amount, reference_number, sender_name,               │
/// │ bank_transfer  │ declared_amount == amount, amount_confirmed          │
/// │ wallet         │                                                      │
/// └────────────────┴──────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentEntry {
    pub method: PaymentMethod,
    pub amount: Money,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub declared_amount: Option<Money>,
    #[serde(default)]
    pub amount_confirmed: bool,
    #[serde(default)]
    pub cash_received: Option<Money>,
}

impl PaymentEntry {
    /// Cash tender with no change.
    pub fn cash(amount: Money) -> Self {
        PaymentEntry {
            method: PaymentMethod::Cash,
            amount,
            reference_number: None,
            sender_name: None,
            declared_amount: None,
            amount_confirmed: false,
            cash_received: None,
        }
    }

    /// Non-cash tender with matching, confirmed proof.
    pub fn confirmed(
        method: PaymentMethod,
        amount: Money,
        reference_number: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        PaymentEntry {
            method,
            amount,
            reference_number: Some(reference_number.into()),
            sender_name: Some(sender_name.into()),
            declared_amount: Some(amount),
            amount_confirmed: true,
            cash_received: None,
        }
    }

    /// Records what the customer handed over.
    pub fn with_cash_received(mut self, received: Money) -> Self {
        self.cash_received = Some(received);
        self
    }
}

/// Non-blocking notes attached to a successful settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Non-cash sale recorded while the cashier had no open shift.
    NoOpenShift { cashier_id: String },
    /// The order committed but some reservations were not consumed yet.
    ConsumptionPending {
        held_order_id: String,
        reservation_ids: Vec<String>,
    },
    /// The hold is cancelled but some reservations still hold stock.
    /// `HoldOrderManager::retry_release` frees them.
    ReleasePending {
        held_order_id: String,
        reservation_ids: Vec<String>,
    },
}

// =============================================================================
// Discount
// =============================================================================

/// Cart-level discount.
///
/// Percent values are basis points (`1000` = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Amount(Money),
    Percent(i64),
}

impl Discount {
    pub const fn none() -> Self {
        Discount::Amount(Money::zero())
    }

    /// Percent discount from whole percent points.
    pub const fn percent(points: i64) -> Self {
        Discount::Percent(points * 100)
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::none()
    }
}

// =============================================================================
// Holds
// =============================================================================

/// Lifecycle of a held order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Held,
    Resumed,
    Cancelled,
}

impl HoldStatus {
    /// Only `held → resumed` and `held → cancelled` are legal.
    pub const fn can_transition_to(&self, next: HoldStatus) -> bool {
        matches!(
            (self, next),
            (HoldStatus::Held, HoldStatus::Resumed) | (HoldStatus::Held, HoldStatus::Cancelled)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Held)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Held => "held",
            HoldStatus::Resumed => "resumed",
            HoldStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token returned by the reservation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReservationHandle(pub String);

impl ReservationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cart line with the reservation that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HeldLine {
    pub line: CartLine,
    pub reservation: ReservationHandle,
}

/// A priced, stock-reserved, unpaid sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HeldOrder {
    pub id: String,
    /// POS session that owns the hold.
    pub session_id: String,
    pub cashier_id: String,
    pub warehouse_id: String,
    pub lines: Vec<HeldLine>,
    pub discount: Discount,
    pub status: HoldStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl HeldOrder {
    /// The bare cart lines, in order.
    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.lines.iter().map(|h| h.line.clone()).collect()
    }

    pub fn reservations(&self) -> impl Iterator<Item = &ReservationHandle> {
        self.lines.iter().map(|h| &h.reservation)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A finalized sale.
///
/// Stores the priced snapshot so later price changes never alter history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable id: `YYYYMMDD-DD-NNNN`.
    pub receipt_number: String,
    pub cashier_id: String,
    pub shift_id: Option<String>,
    pub held_order_id: Option<String>,
    pub lines: Vec<PricedLine>,
    pub discount: Discount,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub breakdown: Vec<PaymentEntry>,
    /// Σ(cash_received − amount) over cash entries.
    pub change_due: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Result of a successful finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub order: Order,
    pub advisories: Vec<Advisory>,
}

/// Result of a cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cancellation {
    pub order: HeldOrder,
    pub advisories: Vec<Advisory>,
}

// =============================================================================
// Shift Summary (X-report)
// =============================================================================

/// In/out totals for one tender within a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotals {
    pub method: PaymentMethod,
    pub total_in: Money,
    pub total_out: Money,
    pub entry_count: u32,
}

/// Mid-shift report computed live from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSummary {
    pub shift_id: String,
    pub cashier_id: String,
    pub status: ShiftStatus,
    pub start_amount: Money,
    pub expected_cash: Money,
    pub by_method: Vec<MethodTotals>,
    pub entry_count: u32,
}

// =============================================================================
// Unit Tests
// =============================================================================
