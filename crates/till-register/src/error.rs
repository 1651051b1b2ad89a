//! # Register Error Types
//!
//! Errors raised while assembling a register. Operations on a running
//! register return [`CoreError`](till_core::CoreError) directly.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RegisterConfig::load ──► InvalidConfig / ConfigLoadFailed              │
//! │  Register::connect    ──► Database                                      │
//! │  ShiftManager, HoldOrderManager, ... ──► CoreError                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for register setup.
pub type RegisterResult<T> = Result<T, RegisterError>;

#[derive(Debug, Error)]
pub enum RegisterError {
    /// A configuration value is out of range or missing.
    #[error("Invalid register configuration: {0}")]
    InvalidConfig(String),

    /// The config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// The config file could not be written.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// The database could not be opened or migrated.
    #[error("Database error: {0}")]
    Database(#[from] till_db::DbError),
}

impl From<std::io::Error> for RegisterError {
    fn from(err: std::io::Error) -> Self {
        RegisterError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for RegisterError {
    fn from(err: toml::de::Error) -> Self {
        RegisterError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for RegisterError {
    fn from(err: toml::ser::Error) -> Self {
        RegisterError::ConfigSaveFailed(err.to_string())
    }
}

impl RegisterError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RegisterError::InvalidConfig(_)
                | RegisterError::ConfigLoadFailed(_)
                | RegisterError::ConfigSaveFailed(_)
        )
    }
}
