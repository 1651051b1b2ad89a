//! # Cart Module
//!
//! Line items and pricing for a sale in progress.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartLine ──► unit price ──► + addons ──► × qty/weight ──► line total   │
//! │                  │                                                      │
//! │                  └── weight line with per-weight override:              │
//! │                      override is the price of 1000 weight units         │
//! │                                                                         │
//! │  Σ exact line totals ──► subtotal (rounded once)                        │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  discount: percent → clamp(0..=100%) × subtotal                         │
//! │            amount  → clamp(0..=subtotal)                                │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  total = max(0, subtotal − discount)                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Precision
//! Unit prices are carried in milli-cents and quantities in milli-units, so
//! a line is exact in `cents × 10⁻⁶`. Rounding to cents happens once per
//! output, half away from zero.
//!
//! ## Usage
//! ```rust
//! use till_core::cart::{Cart, CatalogItem, LineInput};
//! use till_core::{Discount, Money, Qty};
//!
//! let coffee = CatalogItem::weighed("coffee", "House Blend", Money::from_cents(2000));
//! let mut cart = Cart::new();
//! cart.add_line(&coffee, LineInput::weight(Qty::from_milli(1500))).unwrap();
//! cart.set_discount(Discount::percent(10)).unwrap();
//!
//! let totals = cart.totals();
//! assert_eq!(totals.subtotal.cents(), 3000);
//! assert_eq!(totals.discount_amount.cents(), 300);
//! assert_eq!(totals.total.cents(), 2700);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, BPS_SCALE};
use crate::quantity::{Qty, MILLI_PER_UNIT};
use crate::types::Discount;
use crate::validation::{
    validate_cart_size, validate_discount_bps, validate_id, validate_price, validate_quantity,
    validate_weight,
};

/// `milli-cents × milli-units` per cent.
const LINE_SCALE: i128 = (MILLI_PER_UNIT as i128) * (MILLI_PER_UNIT as i128);

// =============================================================================
// Catalog Input
// =============================================================================

/// How an item is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Sold by the piece; `quantity` is meaningful.
    Count,
    /// Sold by weight; `weight` is meaningful.
    Weight,
}

/// The catalog facts a cart line needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub unit_kind: UnitKind,
    pub unit_price: Money,
    /// Weight items only: price of 1000 weight units, used instead of
    /// `unit_price` when present.
    pub per_weight_price: Option<Money>,
}

impl CatalogItem {
    pub fn counted(id: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        CatalogItem {
            id: id.into(),
            name: name.into(),
            unit_kind: UnitKind::Count,
            unit_price,
            per_weight_price: None,
        }
    }

    pub fn weighed(id: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        CatalogItem {
            id: id.into(),
            name: name.into(),
            unit_kind: UnitKind::Weight,
            unit_price,
            per_weight_price: None,
        }
    }

    pub fn with_per_weight_price(mut self, price: Money) -> Self {
        self.per_weight_price = Some(price);
        self
    }
}

/// An addon attached to a line (extra shot, sauce, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Addon {
    pub unit_price: Money,
    pub quantity: i64,
}

/// Quantity, weight and addons for `add_line` / `update_line`.
///
/// Only the field matching the item's unit kind is consulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineInput {
    pub quantity: Option<i64>,
    pub weight: Option<Qty>,
    pub addons: BTreeMap<String, Addon>,
}

impl LineInput {
    pub fn count(quantity: i64) -> Self {
        LineInput {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    pub fn weight(weight: Qty) -> Self {
        LineInput {
            weight: Some(weight),
            ..Default::default()
        }
    }

    pub fn with_addon(mut self, addon_id: impl Into<String>, unit_price: Money, quantity: i64) -> Self {
        self.addons.insert(
            addon_id.into(),
            Addon {
                unit_price,
                quantity,
            },
        );
        self
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in the cart.
///
/// Weight lines keep `quantity = 1` and carry the amount in `weight`;
/// count lines keep `weight = None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub id: String,
    pub item_id: String,
    pub name: String,
    pub unit_kind: UnitKind,
    pub quantity: i64,
    pub weight: Option<Qty>,
    pub unit_price: Money,
    pub per_weight_price: Option<Money>,
    pub addons: BTreeMap<String, Addon>,
}

impl CartLine {
    /// Builds a validated line for `item`.
    pub fn new(item: &CatalogItem, input: LineInput) -> CoreResult<Self> {
        validate_id("item_id", &item.id)?;
        validate_price("unit_price", item.unit_price)?;
        if let Some(price) = item.per_weight_price {
            validate_price("per_weight_price", price)?;
        }
        validate_addons(&input.addons)?;

        let (quantity, weight) = measure(item.unit_kind, &input)?;

        Ok(CartLine {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            name: item.name.clone(),
            unit_kind: item.unit_kind,
            quantity,
            weight,
            unit_price: item.unit_price,
            per_weight_price: item.per_weight_price,
            addons: input.addons,
        })
    }

    /// Re-checks a line that did not come through [`CartLine::new`], such as
    /// one deserialized from a request.
    pub fn validate(&self) -> CoreResult<()> {
        validate_id("item_id", &self.item_id)?;
        validate_price("unit_price", self.unit_price)?;
        if let Some(price) = self.per_weight_price {
            validate_price("per_weight_price", price)?;
        }
        validate_addons(&self.addons)?;

        match (self.unit_kind, self.weight) {
            (UnitKind::Weight, Some(weight)) if self.quantity == 1 => validate_weight(weight)?,
            (UnitKind::Weight, _) => {
                return Err(ValidationError::InvalidFormat {
                    field: "weight".to_string(),
                    reason: "weight lines carry a weight and quantity 1".to_string(),
                }
                .into())
            }
            (UnitKind::Count, None) => validate_quantity(self.quantity)?,
            (UnitKind::Count, Some(_)) => {
                return Err(ValidationError::InvalidFormat {
                    field: "weight".to_string(),
                    reason: "count lines carry no weight".to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Amount to reserve for this line.
    pub fn reserve_qty(&self) -> Qty {
        match self.unit_kind {
            UnitKind::Weight => self.weight.unwrap_or_default(),
            UnitKind::Count => Qty::from_units(self.quantity),
        }
    }

    /// Unrounded line total in `cents × 10⁻⁶`.
    fn scaled_total(&self) -> i128 {
        let unit_mc = match (self.unit_kind, self.per_weight_price) {
            (UnitKind::Weight, Some(per_weight)) => per_weight.cents() as i128,
            _ => self.unit_price.cents() as i128 * MILLI_PER_UNIT as i128,
        };
        let addons_mc: i128 = self
            .addons
            .values()
            .map(|a| a.unit_price.cents() as i128 * a.quantity as i128 * MILLI_PER_UNIT as i128)
            .sum();

        (unit_mc + addons_mc) * self.reserve_qty().milli() as i128
    }

    /// Line total rounded to cents.
    pub fn line_total(&self) -> Money {
        Money::from_scaled(self.scaled_total(), LINE_SCALE)
    }

    fn merges_with(&self, item: &CatalogItem, addons: &BTreeMap<String, Addon>) -> bool {
        self.unit_kind == UnitKind::Count
            && item.unit_kind == UnitKind::Count
            && self.item_id == item.id
            && self.unit_price == item.unit_price
            && &self.addons == addons
    }
}

fn measure(kind: UnitKind, input: &LineInput) -> CoreResult<(i64, Option<Qty>)> {
    match kind {
        UnitKind::Weight => {
            let weight = input.weight.unwrap_or_default();
            validate_weight(weight)?;
            Ok((1, Some(weight)))
        }
        UnitKind::Count => {
            let quantity = input.quantity.unwrap_or(0);
            validate_quantity(quantity)?;
            Ok((quantity, None))
        }
    }
}

fn validate_addons(addons: &BTreeMap<String, Addon>) -> CoreResult<()> {
    for (id, addon) in addons {
        validate_id("addon_id", id)?;
        validate_price("addon unit_price", addon.unit_price)?;
        validate_quantity(addon.quantity)?;
    }
    Ok(())
}

/// Checks a full set of lines against the cart limits and line rules.
pub fn validate_lines(lines: &[CartLine]) -> CoreResult<()> {
    if let Some(last) = lines.len().checked_sub(1) {
        validate_cart_size(last)?;
    }
    lines.iter().try_for_each(CartLine::validate)
}

// =============================================================================
// Totals
// =============================================================================

/// A line with its rounded total, as frozen into an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub line: CartLine,
    pub line_total: Money,
}

/// Derived cart figures. Never stored on the cart itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub lines: Vec<PricedLine>,
    pub line_count: usize,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
}

/// Prices `lines` under `discount`.
///
/// ## Example
/// ```rust
/// use till_core::cart::{compute_totals, CartLine, CatalogItem, LineInput};
/// use till_core::{Discount, Money};
///
/// let tea = CatalogItem::counted("tea", "Tea", Money::from_cents(450));
/// let line = CartLine::new(&tea, LineInput::count(2)).unwrap();
///
/// let totals = compute_totals(&[line], &Discount::Amount(Money::from_cents(5000)));
/// assert_eq!(totals.subtotal.cents(), 900);
/// assert_eq!(totals.discount_amount.cents(), 900); // clamped to subtotal
/// assert_eq!(totals.total, Money::zero());
/// ```
pub fn compute_totals(lines: &[CartLine], discount: &Discount) -> CartTotals {
    let exact: i128 = lines.iter().map(CartLine::scaled_total).sum();
    let subtotal = Money::from_scaled(exact, LINE_SCALE).max(Money::zero());

    let discount_amount = discount_amount(subtotal, discount);
    let total = (subtotal - discount_amount).max(Money::zero());

    CartTotals {
        lines: lines
            .iter()
            .map(|line| PricedLine {
                line: line.clone(),
                line_total: line.line_total(),
            })
            .collect(),
        line_count: lines.len(),
        subtotal,
        discount_amount,
        total,
    }
}

fn discount_amount(subtotal: Money, discount: &Discount) -> Money {
    if !subtotal.is_positive() {
        return Money::zero();
    }

    match *discount {
        Discount::Percent(bps) => subtotal.percent_bps(bps.clamp(0, BPS_SCALE)),
        Discount::Amount(value) => value.clamp_to(Money::zero(), subtotal),
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Transient cart for one sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
    discount: Discount,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `item`, returning the id of the line that now holds it.
    ///
    /// ## Rules
    /// - Weight items read only `input.weight` (> 0); count items only
    ///   `input.quantity` (> 0, ≤ 999)
    /// - A count item identical to an existing line (same item, price and
    ///   addons) bumps that line's quantity
    /// - On any rejection the cart is unchanged
    pub fn add_line(&mut self, item: &CatalogItem, input: LineInput) -> CoreResult<String> {
        if item.unit_kind == UnitKind::Count {
            if let Some(existing) = self
                .lines
                .iter_mut()
                .find(|l| l.merges_with(item, &input.addons))
            {
                let add = input.quantity.unwrap_or(0);
                validate_quantity(add)?;
                let merged = existing.quantity + add;
                validate_quantity(merged)?;
                existing.quantity = merged;
                return Ok(existing.id.clone());
            }
        }

        validate_cart_size(self.lines.len())?;
        let line = CartLine::new(item, input)?;
        let id = line.id.clone();
        self.lines.push(line);
        Ok(id)
    }

    /// Changes quantity (count) or weight (weight) of a line.
    ///
    /// The unit kind never changes. Addons in `input` replace the line's
    /// addons only when non-empty.
    pub fn update_line(&mut self, line_id: &str, input: LineInput) -> CoreResult<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| CoreError::not_found("cart_line", line_id))?;

        let (quantity, weight) = measure(line.unit_kind, &input)?;
        if !input.addons.is_empty() {
            validate_addons(&input.addons)?;
            line.addons = input.addons;
        }
        line.quantity = quantity;
        line.weight = weight;
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &str) -> CoreResult<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| CoreError::not_found("cart_line", line_id))?;
        Ok(self.lines.remove(idx))
    }

    pub fn set_discount(&mut self, discount: Discount) -> CoreResult<()> {
        match discount {
            Discount::Percent(bps) => validate_discount_bps(bps)?,
            Discount::Amount(value) => validate_price("discount", value)?,
        }
        self.discount = discount;
        Ok(())
    }

    /// Empties lines and resets the discount.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = Discount::none();
    }

    pub fn totals(&self) -> CartTotals {
        compute_totals(&self.lines, &self.discount)
    }

    /// Hands the lines and discount to hold or settlement.
    pub fn into_parts(self) -> (Vec<CartLine>, Discount) {
        (self.lines, self.discount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
