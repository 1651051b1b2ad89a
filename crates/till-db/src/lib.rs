//! # till-db: SQLite Stores for the Register Engine
//!
//! Implements every collaborator trait from `till_core::ports` on SQLite
//! with sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Register Data Flow                          │
//! │                                                                         │
//! │  till-register (ShiftManager, HoldOrderManager, PaymentSettlement)     │
//! │       │  Arc<dyn ShiftStore>, Arc<dyn SaleStore>, ...                   │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ShiftRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ LedgerRepo    │    │ 001_register │  │   │
//! │  │   │ Collaborators │    │ StockRepo     │    │   _schema    │  │   │
//! │  │   │               │    │ HeldOrderRepo │    │              │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   │               │    │ PermissionRepo│    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (file or :memory:)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per collaborator trait
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("register.db")).await?;
//! db.permissions().grant_all("cashier-1").await?;
//! let collaborators = db.collaborators();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::held_order::HeldOrderRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::permission::PermissionRepository;
pub use repository::sale::SaleRepository;
pub use repository::shift::ShiftRepository;
pub use repository::stock::StockRepository;
