//! rowset - lightweight data access over SQL Server and SQLite
//!
//! A [`Database`] context owns the connections and the schema catalog.
//! [`Record`] reads one row lazily and follows `x_id` / `x_list` relations;
//! [`RecordSet`] compiles filters and sorts into SQL and pages through the
//! result.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod record;
pub mod record_set;
pub mod schema;
pub mod sql;
pub mod text;

pub use cache::{Cache, CacheValue, MemoryCache, NoCache};
pub use config::DatabaseConfig;
pub use db::{Backend, Database, DatabaseDriver, Row, Value};
pub use error::{Error, Result};
pub use record::{Field, Record, Relation};
pub use record_set::RecordSet;
pub use schema::{Column, LogicalType, TableSchema};
pub use sql::{DedupPolicy, Direction, Filters, Sorts};
