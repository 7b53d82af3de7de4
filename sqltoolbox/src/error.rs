//! Database error handling module
//! Defines the failure taxonomy shared by every toolbox module

use sea_orm::DatabaseBackend;
use thiserror::Error;

/// Toolbox operation error
#[derive(Error, Debug, Clone)]
pub enum DbError {
    /// Required connection field missing or malformed; raised before any I/O
    #[error("Invalid connection configuration: {0}")]
    Configuration(String),

    /// The dialect/driver pair is unknown to the underlying driver layer
    #[error("No driver available for dialect: {0}")]
    DriverResolution(String),

    /// Target unreachable; surfaces on the first real I/O, not at engine construction
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    /// The live catalog could not be interpreted while building a reflected schema
    #[error("Failed to reflect database schema: {0}")]
    Reflection(String),

    /// A replacement engine does not satisfy the handle's backend contract
    #[error("Engine backend mismatch: expected {expected:?}, got {actual:?}")]
    EngineMismatch {
        expected: DatabaseBackend,
        actual: DatabaseBackend,
    },

    /// One engine in a multi-engine batch failed; the batch was rolled back
    #[error("Migration batch failed: {0}")]
    MigrationBatch(String),

    /// General database error
    #[error("Database error: {0}")]
    Other(String),
}

impl From<sea_orm::DbErr> for DbError {
    fn from(err: sea_orm::DbErr) -> Self {
        DbError::Other(err.to_string())
    }
}
