//! SQLite driver implementation using rusqlite
//!
//! rusqlite is synchronous, so calls map one to one onto the blocking
//! `DatabaseDriver` interface. A single connection serves reads and writes.

use crate::db::driver::{Backend, DatabaseDriver};
use crate::db::schema::NativeColumn;
use crate::db::value::{Row, Value};
use anyhow::{Context, Result};
use rusqlite::{types::ValueRef, Connection};
use std::path::{Path, PathBuf};

/// SQLite driver
pub struct SqliteDriver {
    conn: Connection,
    pub path: PathBuf,
}

impl SqliteDriver {
    /// Open (or create) a SQLite database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).context("Failed to open SQLite database")?;
        Ok(Self { conn, path })
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Run a batch of statements (fixtures, ad-hoc setup)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).context("Failed to execute SQLite batch")
    }
}

fn cell(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).to_string()),
        ValueRef::Blob(v) => Value::Binary(v.to_vec()),
    }
}

impl DatabaseDriver for SqliteDriver {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = Vec::new();
        let mut raw_rows = stmt.query([])?;
        while let Some(raw) = raw_rows.next()? {
            let mut row = Row::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                row.insert(name.clone(), cell(raw.get_ref(i)?));
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(Backend::Sqlite.table_list_query())?;
        let mut tables = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            tables.push(name);
        }
        Ok(tables)
    }

    fn native_columns(&self, table: &str) -> Result<Vec<NativeColumn>> {
        // cid, name, type, notnull, dflt_value, pk
        let query = format!("PRAGMA table_info({})", Backend::Sqlite.quote_literal(table));
        let rows = self
            .query_rows(&query)
            .with_context(|| format!("Failed to read table_info for `{}`", table))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            match NativeColumn::from_row(row, ["name", "type", "", "", "", "dflt_value"]) {
                Some(column) => columns.push(column),
                None => tracing::warn!(table, ?row, "skipping unreadable table_info row"),
            }
        }
        Ok(columns)
    }

    fn database_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "sqlite".to_string())
    }

    fn server_version(&self) -> Result<String> {
        let version: String = self
            .conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
        Ok(format!("SQLite {}", version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> SqliteDriver {
        let driver = SqliteDriver::in_memory().unwrap();
        driver
            .execute_batch(
                "CREATE TABLE widget (id INTEGER PRIMARY KEY, name VARCHAR(40) DEFAULT 'new', qty INT DEFAULT 0, blob_col);
                 INSERT INTO widget (id, name, qty) VALUES (7, 'bolt', 3);",
            )
            .unwrap();
        driver
    }

    #[test]
    fn test_query_rows_keeps_column_order() {
        let rows = driver().query_rows("SELECT * FROM widget").unwrap();
        assert_eq!(rows.len(), 1);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name", "qty", "blob_col"]);
        assert_eq!(rows[0]["name"], Value::from("bolt"));
        assert!(rows[0]["blob_col"].is_null());
    }

    #[test]
    fn test_list_tables() {
        assert_eq!(driver().list_tables().unwrap(), vec!["widget".to_string()]);
    }

    #[test]
    fn test_native_columns() {
        let columns = driver().native_columns("widget").unwrap();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[1].data_type, "VARCHAR(40)");
        assert_eq!(columns[1].default.as_deref(), Some("'new'"));
        assert_eq!(columns[3].data_type, "");
    }

    #[test]
    fn test_native_columns_of_missing_table_is_empty() {
        assert!(driver().native_columns("nope").unwrap().is_empty());
    }
}
