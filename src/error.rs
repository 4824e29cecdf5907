//! Error types for rowset operations

use crate::db::Backend;
use thiserror::Error;

/// Errors surfaced by the data-access layer.
///
/// Driver failures arrive as `anyhow::Error` (drivers attach their own
/// context) and are classified here by the operation that hit them.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid connection configuration.
    #[error("bad db config: {0}")]
    Config(String),

    /// The backend refused or failed the connection attempt.
    #[error("failed to connect to {backend}")]
    Connection {
        backend: Backend,
        #[source]
        source: anyhow::Error,
    },

    /// The introspection query for a table failed.
    #[error("failed to read schema of table `{table}`")]
    Schema {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    /// A compiled query failed at execution.
    #[error("query failed: {sql}")]
    Query {
        sql: String,
        #[source]
        source: anyhow::Error,
    },

    /// Initialization already failed once for this context; never retried.
    #[error("no database connection available ({0})")]
    Unavailable(String),

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// True for the errors that make every further database access fail.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Connection { .. } | Error::Unavailable(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
