//! Database driver abstraction trait
//!
//! Defines the interface that all database backends must implement.

use crate::db::{NativeColumn, Row};
use anyhow::Result;
use std::str::FromStr;

/// Which database backend is in use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    SqlServer,
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::SqlServer => write!(f, "SQL Server"),
            Backend::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Backend::SqlServer),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(format!("unknown database type `{}`", other)),
        }
    }
}

/// Trait that all database drivers must implement.
///
/// Every call is a blocking round trip. Drivers with an async client (like
/// tiberius) block on their own runtime internally.
pub trait DatabaseDriver {
    /// Which backend this driver represents
    fn backend(&self) -> Backend;

    /// Execute a statement and collect every row it returns
    fn query_rows(&self, sql: &str) -> Result<Vec<Row>>;

    /// Names of all user tables
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Native column descriptions of a table, in column order.
    /// Rows the driver cannot read are skipped.
    fn native_columns(&self, table: &str) -> Result<Vec<NativeColumn>>;

    /// Get the name of the current database / file
    fn database_name(&self) -> String;

    /// Get a human-readable server/engine version string
    fn server_version(&self) -> Result<String>;
}
