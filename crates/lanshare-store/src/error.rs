use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A file was registered by a peer the directory has never seen.
    #[error("Unknown owner: {0}")]
    UnknownOwner(String),

    /// A grant was requested for a peer the directory has never seen.
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    /// A transfer was logged against a file id that does not exist.
    #[error("Unknown file id: {0}")]
    UnknownFile(i64),

    /// A required field was missing or out of range.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Whether the error is a rejected input rather than a storage fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownOwner(_) | Self::UnknownRecipient(_) | Self::UnknownFile(_) | Self::Invalid(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
