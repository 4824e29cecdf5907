//! Filter and sort specifications
//!
//! A filter key is `[comparator]path`, where the comparator is one of
//! `= == ! != < <= > >=` (default `=`) and the path is `column` or
//! `table.table.column`. A `Null` value means "compare with NULL"; a key that
//! is absent means no filter on that column.

use crate::db::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// Comparison operator of one filter clause
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Longest prefixes first so `<=` wins over `<`.
const PREFIXES: [(&str, Comparator); 8] = [
    ("==", Comparator::Eq),
    ("!=", Comparator::Ne),
    ("<=", Comparator::Le),
    (">=", Comparator::Ge),
    ("=", Comparator::Eq),
    ("!", Comparator::Ne),
    ("<", Comparator::Lt),
    (">", Comparator::Gt),
];

impl Comparator {
    /// Split a filter key into its comparator and the remaining path.
    pub fn split(key: &str) -> (Comparator, &str) {
        PREFIXES
            .iter()
            .find_map(|(prefix, cmp)| key.strip_prefix(prefix).map(|rest| (*cmp, rest)))
            .unwrap_or((Comparator::Eq, key))
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    /// NULL test used when the filter value is `Null`.
    pub fn null_test(&self) -> &'static str {
        match self {
            Comparator::Ne | Comparator::Gt | Comparator::Ge => "IS NOT NULL",
            Comparator::Eq | Comparator::Lt | Comparator::Le => "IS NULL",
        }
    }
}

/// `table.table.column` split at the last dot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    /// Joined table names, left to right, lowercased
    pub chain: Vec<String>,
    pub column: String,
}

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((tables, column)) => Self {
                chain: tables
                    .split('.')
                    .filter(|t| !t.is_empty())
                    .map(str::to_lowercase)
                    .collect(),
                column: column.to_string(),
            },
            None => Self {
                chain: Vec::new(),
                column: path.to_string(),
            },
        }
    }

    pub fn is_joined(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Alias of the last joined table: the chain joined by `_`.
    pub fn alias(&self) -> Option<String> {
        self.is_joined().then(|| self.chain.join("_"))
    }
}

/// Ordered filter specification
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filters(IndexMap<String, Value>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (key, value) in iter {
            filters.insert(key, value);
        }
        filters
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Ordered sort specification; keys use the filter path convention.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sorts(IndexMap<String, Direction>);

impl Sorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, direction: Direction) {
        self.0.insert(key.into(), direction);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction)> {
        self.0.iter().map(|(k, d)| (k.as_str(), *d))
    }
}

/// A plain list of columns sorts ascending.
impl<K: Into<String>> FromIterator<K> for Sorts {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut sorts = Sorts::new();
        for key in iter {
            sorts.insert(key, Direction::Asc);
        }
        sorts
    }
}
