//! # Quantity Module
//!
//! `Qty` stores counts and weights as integer milli-units.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  count line:   3 units      → Qty(3000)                                 │
//! │  weight line:  1.5 kg       → Qty(1500)                                 │
//! │  weight line:  0.125 kg     → Qty(125)                                  │
//! │                                                                         │
//! │  The scale store reports grams; the cart never sees a float.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

/// Milli-units in one whole unit (1 kg = 1000 g).
pub const MILLI_PER_UNIT: i64 = 1000;

/// A non-fractional quantity measured in thousandths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Qty(i64);

impl Qty {
    /// Whole units (`from_units(2)` is two pieces or two kilograms).
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Qty(units * MILLI_PER_UNIT)
    }

    /// Raw milli-units (`from_milli(1500)` is 1.5).
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Qty(milli)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Whole-unit part, truncated.
    #[inline]
    pub const fn whole_units(&self) -> i64 {
        self.0 / MILLI_PER_UNIT
    }

    #[inline]
    pub const fn zero() -> Self {
        Qty(0)
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let frac = abs % MILLI_PER_UNIT;
        if frac == 0 {
            write!(f, "{}{}", sign, abs / MILLI_PER_UNIT)
        } else {
            write!(f, "{}{}.{:03}", sign, abs / MILLI_PER_UNIT, frac)
        }
    }
}

impl Default for Qty {
    fn default() -> Self {
        Qty::zero()
    }
}

impl Add for Qty {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Qty(self.0 + other.0)
    }
}

impl AddAssign for Qty {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Qty {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Qty(self.0 - other.0)
    }
}
