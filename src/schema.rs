//! Schema catalog: native column descriptions mapped onto one logical type
//! model, with numeric ranges and implicit lengths filled in per dialect.

use crate::db::{Backend, Database, NativeColumn, Value};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

/// Backend-independent classification of a column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    Int,
    Float,
    String,
    Bool,
    DateTime,
}

/// Column metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub logical_type: LogicalType,
    pub length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<Value>,
    /// Raw dialect type token, for diagnostics
    pub native_type: String,
}

impl Column {
    /// Convert a raw driver value to this column's logical type.
    /// Values that do not convert are returned unchanged.
    pub fn coerce(&self, value: &Value) -> Value {
        let converted = match (self.logical_type, value) {
            (_, Value::Null) => None,
            (LogicalType::Int, v) => v.as_i64().map(Value::Int),
            (LogicalType::Float, v) => v.as_f64().map(Value::Float),
            (LogicalType::Bool, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "1" | "true" => Some(Value::Bool(true)),
                "0" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (LogicalType::Bool, v) => v.as_i64().map(|n| Value::Bool(n != 0)),
            (LogicalType::DateTime, Value::String(s)) => Some(Value::DateTime(s.clone())),
            (LogicalType::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(Value::String(value.to_sql_text()))
            }
            _ => None,
        };
        converted.unwrap_or_else(|| value.clone())
    }

    /// Whether a value fits the column's range and length.
    pub fn admits(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self.logical_type {
            LogicalType::Int | LogicalType::Float => {
                let Some(n) = self.coerce(value).as_f64() else {
                    return false;
                };
                self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max)
            }
            LogicalType::String => match (value.as_str(), self.length) {
                (Some(s), Some(len)) => s.chars().count() as u64 <= len,
                (Some(_), None) => true,
                (None, _) => !matches!(value, Value::Binary(_)),
            },
            LogicalType::Bool => matches!(self.coerce(value), Value::Bool(_)),
            LogicalType::DateTime => value.as_str().is_some(),
        }
    }
}

/// All mapped columns of one table, in database column order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: IndexMap<String, Column>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn to_text(&self, indent: usize) -> Result<String> {
        crate::text::to_text(self, indent)
    }
}

impl Database {
    /// Mapped columns of `table`, built once per context.
    ///
    /// A schema found in the external cache is used as is; a freshly built one
    /// is written back to it.
    pub fn columns_for(&self, table: &str) -> Result<Rc<TableSchema>> {
        let table = table.to_lowercase();
        if let Some(schema) = self.schemas.borrow().get(&table) {
            return Ok(Rc::clone(schema));
        }

        let key = format!("schema:{}", table);
        let cached = self
            .cache()
            .get(&key)
            .and_then(|v| serde_json::from_value::<TableSchema>(v).ok());
        let schema = match cached {
            Some(schema) => {
                debug!(table = %table, "schema cache hit");
                schema
            }
            None => {
                let schema = self.build_schema(&table)?;
                self.cache().set(&key, serde_json::to_value(&schema)?);
                schema
            }
        };

        let schema = Rc::new(schema);
        self.schemas.borrow_mut().insert(table, Rc::clone(&schema));
        Ok(schema)
    }

    pub fn has_column(&self, table: &str, name: &str) -> Result<bool> {
        Ok(self.columns_for(table)?.has_column(name))
    }

    fn build_schema(&self, table: &str) -> Result<TableSchema> {
        let backend = self.backend()?;
        let native = self
            .read()?
            .native_columns(table)
            .map_err(|source| Error::Schema {
                table: table.to_string(),
                source,
            })?;

        let mut columns = IndexMap::with_capacity(native.len());
        for col in &native {
            match map_column(backend, col) {
                Some(column) => {
                    columns.insert(column.name.clone(), column);
                }
                None => debug!(table, column = %col.name, native = %col.data_type, "unmapped column type"),
            }
        }
        debug!(table, columns = columns.len(), "built table schema");
        Ok(TableSchema {
            name: table.to_string(),
            columns,
        })
    }
}

/// Parsed type token: `base [(args)] [modifiers]`
#[derive(Debug, PartialEq)]
struct TypeToken {
    /// Lowercased words, without `unsigned`
    base: String,
    args: Vec<u64>,
    unsigned: bool,
}

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^()]*)(?:\(([^()]*)\))?([^()]*)$")
        .expect("type token regex")
});

impl TypeToken {
    fn parse(token: &str) -> Option<Self> {
        let caps = TOKEN_RE.captures(token)?;
        let args = match caps.get(2) {
            Some(m) => m
                .as_str()
                .split(',')
                .map(|a| a.trim().parse::<u64>().ok())
                .collect::<Option<Vec<_>>>()?,
            None => Vec::new(),
        };
        let words: Vec<String> = [caps.get(1), caps.get(3)]
            .into_iter()
            .flatten()
            .flat_map(|m| m.as_str().split_whitespace())
            .map(str::to_lowercase)
            .collect();
        let unsigned = words.iter().any(|w| w == "unsigned");
        let base = words
            .into_iter()
            .filter(|w| w != "unsigned" && w != "zerofill")
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self { base, args, unsigned })
    }
}

struct Mapping {
    logical_type: LogicalType,
    length: Option<u64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl Mapping {
    fn of(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            length: None,
            min: None,
            max: None,
        }
    }

    fn range(logical_type: LogicalType, min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::of(logical_type)
        }
    }

    fn text(length: u64) -> Self {
        Self {
            length: Some(length),
            ..Self::of(LogicalType::String)
        }
    }

    /// Integer of `bits` width
    fn int(bits: u32, unsigned: bool) -> Self {
        if unsigned {
            Self::range(LogicalType::Int, 0.0, 2f64.powi(bits as i32) - 1.0)
        } else {
            let half = 2f64.powi(bits as i32 - 1);
            Self::range(LogicalType::Int, -half, half - 1.0)
        }
    }

    fn float(max: f64, unsigned: bool) -> Self {
        Self::range(LogicalType::Float, if unsigned { 0.0 } else { -max }, max)
    }

    /// `decimal(P,S)`: integral when S = 0, max = 10^(P−S) − 1
    fn decimal(precision: u64, scale: u64, unsigned: bool) -> Self {
        let logical_type = if scale == 0 {
            LogicalType::Int
        } else {
            LogicalType::Float
        };
        let digits = precision.saturating_sub(scale);
        let max = 10f64.powi(digits as i32) - 1.0;
        Self::range(logical_type, if unsigned { 0.0 } else { -max }, max)
    }
}

const TEXT_MAX: u64 = 2_147_483_647;
const NTEXT_MAX: u64 = 1_073_741_823;

/// Map one native column; `None` for types with no logical counterpart.
pub fn map_column(backend: Backend, native: &NativeColumn) -> Option<Column> {
    let token = TypeToken::parse(&native.data_type)?;
    let mapping = match backend {
        Backend::Sqlite => map_sqlite(&token),
        Backend::SqlServer => map_sqlserver(&token, native),
    }?;
    let default = native
        .default
        .as_deref()
        .and_then(|d| parse_default(backend, mapping.logical_type, d));

    Some(Column {
        name: native.name.clone(),
        logical_type: mapping.logical_type,
        length: mapping.length,
        min: mapping.min,
        max: mapping.max,
        default,
        native_type: native.data_type.clone(),
    })
}

/// SQLite declared types, following its column affinity rules
fn map_sqlite(token: &TypeToken) -> Option<Mapping> {
    let base = token.base.as_str();
    let first_arg = token.args.first().copied();

    if base.is_empty() || base.contains("blob") {
        None
    } else if base.contains("bool") {
        Some(Mapping::of(LogicalType::Bool))
    } else if base.contains("int") {
        Some(Mapping::int(64, false))
    } else if base.contains("char") || base.contains("clob") || base.contains("text") {
        Some(Mapping::text(first_arg.unwrap_or(TEXT_MAX)))
    } else if base.contains("date") || base.contains("time") {
        Some(Mapping::of(LogicalType::DateTime))
    } else if base.contains("real") || base.contains("floa") || base.contains("doub") {
        Some(Mapping::float(f64::MAX, false))
    } else if base.contains("decimal") || base.contains("numeric") {
        match token.args.as_slice() {
            [p] => Some(Mapping::decimal(*p, 0, token.unsigned)),
            [p, s] => Some(Mapping::decimal(*p, *s, token.unsigned)),
            _ => Some(Mapping::float(f64::MAX, false)),
        }
    } else {
        None
    }
}

/// SQL Server `DATA_TYPE` names; lengths and precision come from the
/// separate INFORMATION_SCHEMA columns
fn map_sqlserver(token: &TypeToken, native: &NativeColumn) -> Option<Mapping> {
    let unsigned = token.unsigned;
    let char_length = native
        .max_length
        .or_else(|| token.args.first().map(|&v| v as i64))
        .filter(|&len| len > 0)
        .map(|len| len as u64);

    let mapping = match token.base.as_str() {
        "bit" => Mapping::of(LogicalType::Bool),
        "tinyint" => Mapping::int(8, true),
        "smallint" => Mapping::int(16, unsigned),
        "int" => Mapping::int(32, unsigned),
        "bigint" => Mapping::int(64, unsigned),
        "decimal" | "numeric" => {
            let precision = native
                .precision
                .map(|p| p.max(0) as u64)
                .or_else(|| token.args.first().copied())
                .unwrap_or(18);
            let scale = native
                .scale
                .map(|s| s.max(0) as u64)
                .or_else(|| token.args.get(1).copied())
                .unwrap_or(0);
            Mapping::decimal(precision, scale, unsigned)
        }
        "real" => Mapping::float(f32::MAX as f64, unsigned),
        "float" => Mapping::float(f64::MAX, unsigned),
        "money" => Mapping::float(922_337_203_685_477.580_7, unsigned),
        "smallmoney" => Mapping::float(214_748.364_7, unsigned),
        "char" | "varchar" | "text" => Mapping::text(char_length.unwrap_or(TEXT_MAX)),
        "nchar" | "nvarchar" | "ntext" => Mapping::text(char_length.unwrap_or(NTEXT_MAX)),
        "uniqueidentifier" => Mapping::text(36),
        "date" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "time" => {
            Mapping::of(LogicalType::DateTime)
        }
        _ => return None,
    };
    Some(mapping)
}

/// Keep literal defaults that match the column type; expressions are dropped.
fn parse_default(backend: Backend, logical_type: LogicalType, raw: &str) -> Option<Value> {
    let mut text = raw.trim();
    if backend == Backend::SqlServer {
        // ((0)), ('abc'), (N'abc')
        while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
            text = text[1..text.len() - 1].trim();
        }
    }
    let quoted = text
        .strip_prefix("N'")
        .or_else(|| text.strip_prefix('\''))
        .and_then(|t| t.strip_suffix('\''))
        .map(|t| t.replace("''", "'"));

    match logical_type {
        LogicalType::Int => text.parse::<i64>().ok().map(Value::Int),
        LogicalType::Float => text.parse::<f64>().ok().map(Value::Float),
        LogicalType::String => quoted.map(Value::String),
        LogicalType::DateTime => quoted.map(Value::DateTime),
        LogicalType::Bool => match text.to_lowercase().as_str() {
            "1" | "true" => Some(Value::Bool(true)),
            "0" | "false" => Some(Value::Bool(false)),
            _ => None,
        },
    }
}
