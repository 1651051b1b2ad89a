//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    30.00 + 19.99 = 49.989999999999995  ❌                               │
//! │                                                                         │
//! │  At the register this decides whether a split payment "matches":       │
//! │    |50.00 - 49.99| = 0.010000000000001563 > 0.01 ?                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    3000 + 1999 = 4999 cents, gap = exactly 1 cent                       │
//! │    Every tolerance check is an integer comparison                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let doubled = price * 2;             // 21.98
//! let total = price + Money::from_cents(500);
//! assert_eq!(total.cents(), 1599);
//! assert_eq!(doubled.cents(), 2198);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Differences at shift close can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON snapshots
///
/// ## Where Money is Used
/// ```text
/// CartLine.unit_price ──► line total ──► subtotal ──► discount ──► total
///                                                                   │
/// PaymentEntry.amount ◄── Σ must equal ─────────────────────────────┘
///        │
///        ▼
/// LedgerEntry.amount ──► expected cash ──► CashShift.difference
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates Money from a value scaled by `scale` cents, rounding half up
    /// (half away from zero for negative values).
    ///
    /// Cart pricing accumulates in sub-cent precision and converts once.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// // 1234.5 cents at scale 10 -> 1235 cents
    /// assert_eq!(Money::from_scaled(12_345, 10).cents(), 1235);
    /// assert_eq!(Money::from_scaled(12_344, 10).cents(), 1234);
    /// ```
    pub fn from_scaled(value: i128, scale: i128) -> Self {
        Money(round_half_up_div(value, scale) as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps the value into `[min, max]`.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let cap = Money::from_cents(3000);
    /// assert_eq!(Money::from_cents(5000).clamp_to(Money::zero(), cap), cap);
    /// assert_eq!(Money::from_cents(-10).clamp_to(Money::zero(), cap), Money::zero());
    /// ```
    #[inline]
    pub fn clamp_to(self, min: Money, max: Money) -> Money {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }

    /// Returns true when `|self - other| <= tolerance`.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let one_cent = Money::from_cents(1);
    /// assert!(Money::from_cents(33_000).within(Money::from_cents(33_001), one_cent));
    /// assert!(!Money::from_cents(33_000).within(Money::from_cents(33_002), one_cent));
    /// ```
    #[inline]
    pub fn within(self, other: Money, tolerance: Money) -> bool {
        (self - other).abs() <= tolerance
    }

    /// Returns `bps` basis points of this amount, rounded half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(3000);
    /// assert_eq!(subtotal.percent_bps(1000).cents(), 300); // 10%
    ///
    /// // 0.825 -> 0.83
    /// assert_eq!(Money::from_cents(1000).percent_bps(825).cents(), 83);
    /// ```
    pub fn percent_bps(&self, bps: i64) -> Money {
        Money::from_scaled(self.0 as i128 * bps as i128, BPS_SCALE as i128)
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn round_half_up_div(value: i128, scale: i128) -> i128 {
    debug_assert!(scale > 0);
    let half = scale / 2;
    if value >= 0 {
        (value + half) / scale
    } else {
        -((-value + half) / scale)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money with two decimals and no currency symbol.
///
/// ## Note
/// Currency formatting belongs to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
