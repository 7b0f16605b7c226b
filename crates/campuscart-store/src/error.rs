use campuscart_shared::MarketError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A record failed its invariants before being written.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The acting user may not touch this row.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// A status column would leave its state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl StoreError {
    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => MarketError::NotFound(what.to_string()),
            StoreError::Validation(msg) => MarketError::Validation(msg),
            StoreError::Permission(msg) => MarketError::Permission(msg),
            StoreError::InvalidTransition { from, to } => {
                MarketError::InvalidTransition { from, to }
            }
            other => MarketError::Backend(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
