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

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A projected value does not carry the key it is being stored under.
    #[error("Value field `{field}` does not match the record key")]
    KeyMismatch { field: String },

    /// The backing store refused a second record for the same key.
    #[error("Duplicate record for key {0}")]
    UniquenessViolation(String),

    /// A key-exchange bundle without any one-time prekeys.
    #[error("Key-exchange bundle carries no one-time prekeys")]
    EmptyBundle,

    /// A lookup expected a record but found none.
    #[error("Record not found")]
    NotFound,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
