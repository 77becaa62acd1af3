//! Error types for fleetgrant-pg

use fleetgrant_exec::ExecError;
use thiserror::Error;

/// Errors that can occur while administering the database
#[derive(Error, Debug, Clone)]
pub enum PgError {
    /// `psql` ran and reported an error
    #[error("psql failed on {database}: {message}")]
    QueryFailed {
        /// Database the statement ran against
        database: String,
        /// psql stderr
        message: String,
    },

    /// A configuration file could not be updated
    #[error("failed to update {path}: {message}")]
    ConfigFile {
        /// File being edited
        path: String,
        /// Reason
        message: String,
    },

    /// Path does not point inside a data directory
    #[error("invalid identity map path: {0}")]
    InvalidPath(String),

    /// Execution error from the command executor
    #[error("execution error: {0}")]
    Exec(#[from] ExecError),
}
