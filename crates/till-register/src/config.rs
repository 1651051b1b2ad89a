//! # Register Configuration
//!
//! Configuration for one register (device) and its local database.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DEVICE_ID=till-07                                             │
//! │     TILL_DEBOUNCE_MS=200                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit path, or the platform config dir:                         │
//! │     ~/.config/till-pos/register.toml (Linux)                           │
//! │     ~/Library/Application Support/com.till.pos/register.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device_id, 150 ms debounce                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [register]
//! store_id = "store-001"
//! device_id = "till-07"
//! default_warehouse_id = "main"
//!
//! [reconciliation]
//! debounce_ms = 150
//!
//! [database]
//! path = "/var/lib/till/register.db"
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_db::DbConfig;

use crate::error::{RegisterError, RegisterResult};

/// Upper bound for the live-display debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 1_000;

// =============================================================================
// Register Settings
// =============================================================================

/// Identity of this register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSettings {
    /// Store this register belongs to.
    #[serde(default = "default_store_id")]
    pub store_id: String,

    /// Unique device identifier. Its last two characters become the
    /// device code in receipt numbers.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Warehouse that holds reserve stock from.
    #[serde(default = "default_warehouse_id")]
    pub default_warehouse_id: String,
}

fn default_store_id() -> String {
    "default-store".to_string()
}

fn default_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_warehouse_id() -> String {
    "main".to_string()
}

impl Default for RegisterSettings {
    fn default() -> Self {
        RegisterSettings {
            store_id: default_store_id(),
            device_id: default_device_id(),
            default_warehouse_id: default_warehouse_id(),
        }
    }
}

// =============================================================================
// Reconciliation Settings
// =============================================================================

/// Live expected-cash display settings.
///
/// Only the display is debounced; closing a shift always recomputes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Coalesce window for ledger-change notifications (milliseconds).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    150
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            debounce_ms: default_debounce_ms(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `register.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Register Configuration
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterConfig {
    #[serde(default)]
    pub register: RegisterSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl RegisterConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (register.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> RegisterResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> RegisterResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| RegisterError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Register config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> RegisterResult<()> {
        if self.register.device_id.trim().is_empty() {
            return Err(RegisterError::InvalidConfig("device_id must not be empty".into()));
        }
        if self.register.default_warehouse_id.trim().is_empty() {
            return Err(RegisterError::InvalidConfig(
                "default_warehouse_id must not be empty".into(),
            ));
        }
        if self.reconciliation.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(RegisterError::InvalidConfig(format!(
                "debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.reconciliation.debounce_ms
            )));
        }
        if self.database.max_connections == 0 {
            return Err(RegisterError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Applies `TILL_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TILL_STORE_ID") {
            self.register.store_id = id;
        }

        if let Some(id) = lookup("TILL_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.register.device_id = id;
        }

        if let Some(id) = lookup("TILL_WAREHOUSE_ID") {
            self.register.default_warehouse_id = id;
        }

        if let Some(ms) = lookup("TILL_DEBOUNCE_MS") {
            match ms.parse::<u64>() {
                Ok(v) => self.reconciliation.debounce_ms = v,
                Err(_) => warn!(value = %ms, "Ignoring non-numeric TILL_DEBOUNCE_MS"),
            }
        }

        if let Some(path) = lookup("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(max) = lookup("TILL_DB_MAX_CONNECTIONS") {
            if let Ok(v) = max.parse::<u32>() {
                self.database.max_connections = v;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("register.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.register.device_id
    }

    pub fn warehouse_id(&self) -> &str {
        &self.register.default_warehouse_id
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.reconciliation.debounce_ms)
    }

    /// Configured database path, or `register.db` in the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "till", "pos")
                .map(|dirs| dirs.data_dir().join("register.db"))
                .unwrap_or_else(|| PathBuf::from("register.db"))
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}
