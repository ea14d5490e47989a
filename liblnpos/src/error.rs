//! Error types for lnpos

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PosError>;

#[derive(Error, Debug)]
pub enum PosError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("State error: {0}")]
    Store(#[from] StoreError),

    #[error("PIN error: {0}")]
    Pin(#[from] PinError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PosError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PosError::InvalidInput(_) => 3,
            PosError::Pin(PinError::VerificationFailed) => 2,
            PosError::Pin(PinError::SessionExpired) => 2,
            PosError::Pin(_) => 1,
            PosError::Config(_) => 1,
            PosError::Database(_) => 1,
            PosError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Record encoding failed: {0}")]
    EncodingError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors from the TOML state files (rewards.toml, pin.toml)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State file error: {0}")]
    StateFile(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN verification failed")]
    VerificationFailed,

    #[error("No PIN is set")]
    NotSet,

    #[error("Session expired, PIN required")]
    SessionExpired,
}
