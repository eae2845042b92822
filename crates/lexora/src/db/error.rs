use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("Failed to prepare database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration {version} could not be applied: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored video status (or similar enumerated column) holds a value
    /// this build does not know.
    #[error("Unexpected value '{value}' in column '{column}'")]
    CorruptValue { column: &'static str, value: String },

    #[error("Database connection lock poisoned by a panicking thread")]
    LockPoisoned,

    #[error("Database task did not complete: {0}")]
    BlockingTask(String),
}
