pub mod history;
pub mod profiles;
pub mod sqlite;

pub use history::{HistoryBackend, SqliteHistoryBackend};
pub use profiles::{ProfileBackend, SqliteProfileBackend};
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Bad {column} payload: {reason}")]
    Payload { column: String, reason: String },
}

impl StorageError {
    pub(crate) fn payload(column: &str, err: impl std::fmt::Display) -> Self {
        Self::Payload {
            column: column.to_string(),
            reason: err.to_string(),
        }
    }
}
