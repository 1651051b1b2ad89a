//! # Repository Module
//!
//! One repository per collaborator trait of the register engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  ShiftManager::close                                                   │
//! │       │                                                                 │
//! │       │  shifts.close(id, &closure)   (trait: ShiftStore)              │
//! │       ▼                                                                 │
//! │  ShiftRepository                                                       │
//! │  ├── inherent methods → DbResult<T>     (SQL lives here)               │
//! │  └── impl ShiftStore  → CoreResult<T>   (DbError → CoreError)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ShiftRepository`](shift::ShiftRepository) - Cash shifts
//! - [`LedgerRepository`](ledger::LedgerRepository) - Payment ledger
//! - [`StockRepository`](stock::StockRepository) - Stock levels and reservations
//! - [`HeldOrderRepository`](held_order::HeldOrderRepository) - Parked sales
//! - [`SaleRepository`](sale::SaleRepository) - Atomic order commit
//! - [`PermissionRepository`](permission::PermissionRepository) - Capability grants

use chrono::{DateTime, Utc};

use crate::error::{DbError, DbResult};

pub mod held_order;
pub mod ledger;
pub mod permission;
pub mod sale;
pub mod shift;
pub mod stock;

/// Parses an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(column: &str, value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Serialization(format!("{column}: {e}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<&str>,
) -> DbResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, v)).transpose()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
