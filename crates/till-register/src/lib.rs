//! # till-register: Shift, Hold and Settlement Engine
//!
//! Orchestrates a cash register: shift open and close with a reconciliation
//! gate, held orders backed by stock reservations, and atomic sale
//! settlement.
//!
//! ## Module Organization
//! ```text
//! till_register/
//! ├── lib.rs          ◄─── You are here (Register facade, tracing)
//! ├── config.rs       ◄─── TOML + env configuration
//! ├── error.rs        ◄─── Setup errors
//! ├── shift.rs        ◄─── ShiftManager
//! ├── reconciler.rs   ◄─── CashReconciler + debounced live watch
//! ├── hold.rs         ◄─── HoldOrderManager
//! └── settlement.rs   ◄─── PaymentSettlement
//! ```
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RegisterConfig ──► Register::connect ──► Database (till-db, SQLite)   │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                  Collaborators (Arc<dyn port>)                          │
//! │         ┌──────────────┬─────┴──────────┬──────────────────┐           │
//! │         ▼              ▼                ▼                  ▼           │
//! │   ShiftManager  CashReconciler  HoldOrderManager  PaymentSettlement    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//! ```rust,no_run
//! use till_register::{Register, RegisterConfig};
//! use till_core::Money;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! till_register::init_tracing();
//!
//! let config = RegisterConfig::load(None)?;
//! let (register, _db) = Register::connect(&config).await?;
//!
//! let shift = register.shifts().open("cashier-1", Money::from_cents(10_000)).await?;
//! let expected = register.reconciler().expected_cash(&shift.id).await?;
//! # let _ = expected;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hold;
pub mod reconciler;
pub mod settlement;
pub mod shift;

use tracing::info;
use tracing_subscriber::EnvFilter;

use till_core::ports::Collaborators;
use till_db::Database;

pub use config::RegisterConfig;
pub use error::{RegisterError, RegisterResult};
pub use hold::HoldOrderManager;
pub use reconciler::{CashReconciler, ReconciliationWatch};
pub use settlement::PaymentSettlement;
pub use shift::ShiftManager;

// =============================================================================
// Register Facade
// =============================================================================

/// All register services over one set of collaborators.
#[derive(Clone)]
pub struct Register {
    shifts: ShiftManager,
    holds: HoldOrderManager,
    settlement: PaymentSettlement,
    debounce: std::time::Duration,
}

impl Register {
    pub fn new(collaborators: Collaborators, config: &RegisterConfig) -> Self {
        let Collaborators {
            shifts,
            ledger,
            stock,
            holds,
            sales,
            permissions,
        } = collaborators;

        Register {
            shifts: ShiftManager::new(shifts.clone(), ledger, permissions.clone()),
            holds: HoldOrderManager::new(
                holds,
                stock,
                shifts.clone(),
                sales.clone(),
                permissions.clone(),
                config.warehouse_id(),
                config.device_id(),
            ),
            settlement: PaymentSettlement::new(shifts, sales, permissions, config.device_id()),
            debounce: config.debounce(),
        }
    }

    /// Opens the configured database (running migrations) and wires a
    /// register over it.
    pub async fn connect(config: &RegisterConfig) -> RegisterResult<(Register, Database)> {
        let db_config = config.db_config();
        if !db_config.is_in_memory() {
            if let Some(parent) = db_config.database_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::new(db_config).await?;
        let register = Register::new(db.collaborators(), config);

        info!(
            device_id = %config.device_id(),
            warehouse_id = %config.warehouse_id(),
            "Register ready"
        );
        Ok((register, db))
    }

    pub fn shifts(&self) -> &ShiftManager {
        &self.shifts
    }

    pub fn reconciler(&self) -> &CashReconciler {
        self.shifts.reconciler()
    }

    pub fn holds(&self) -> &HoldOrderManager {
        &self.holds
    }

    pub fn settlement(&self) -> &PaymentSettlement {
        &self.settlement
    }

    /// Live expected-cash view for `shift_id` using the configured debounce.
    pub fn watch(&self, shift_id: &str) -> ReconciliationWatch {
        self.reconciler().watch(shift_id, self.debounce)
    }
}

// =============================================================================
// Tracing
// =============================================================================

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=till=trace` - Show trace for till crates only
/// - Default: `info,till=debug,sqlx=warn`
///
/// Calling it again once a subscriber is installed is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
