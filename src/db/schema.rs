//! Native column descriptions produced by the drivers' introspection queries

use crate::db::value::{Row, Value};

/// One column as the backend describes it, before logical-type mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeColumn {
    pub name: String,
    /// Declared type (SQLite) or `DATA_TYPE` (SQL Server), as reported.
    pub data_type: String,
    /// Character length; `-1` means `(max)` on SQL Server.
    pub max_length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    /// Default expression text, still quoted/parenthesized.
    pub default: Option<String>,
}

impl NativeColumn {
    /// Build from an introspection row using the given key names for
    /// `(name, type, length, precision, scale, default)`.
    ///
    /// Returns `None` when the name or the type is missing or not text.
    pub fn from_row(row: &Row, keys: [&str; 6]) -> Option<Self> {
        let [name, data_type, length, precision, scale, default] = keys;
        let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| row.get(key).and_then(Value::as_i64);

        let name = text(name).filter(|n| !n.is_empty())?;
        let data_type = text(data_type)?;
        Some(Self {
            name,
            data_type,
            max_length: number(length),
            precision: number(precision),
            scale: number(scale),
            default: row.get(default).filter(|v| !v.is_null()).map(Value::to_sql_text),
        })
    }
}
