//! Compiles filter/sort specifications into SELECT statements
//!
//! Every dotted path joins its chain of tables by naming convention: the
//! joined table carries `<previous table>_id` pointing at the previous
//! alias's `id`. Aliases are the chain so far joined by `_`, and each alias is
//! joined once per statement.

use crate::db::Backend;
use crate::sql::filter::{Comparator, Direction, FieldPath, Filters, Sorts};
use indexmap::IndexMap;

/// Whether the windowed fetch removes duplicate logical rows produced by
/// one-to-many joins. Counting always deduplicates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Joined rows are returned as the database produces them
    #[default]
    None,
    /// `SELECT DISTINCT <table>.*`
    Distinct,
}

/// A compiled query over one base table
#[derive(Clone, Debug)]
pub struct Select {
    backend: Backend,
    table: String,
    /// alias -> JOIN clause, in emission order
    joins: IndexMap<String, String>,
    conditions: Vec<String>,
    order: Vec<String>,
}

impl Select {
    pub fn compile(backend: Backend, table: &str, filters: &Filters, sorts: &Sorts) -> Self {
        let mut select = Self {
            backend,
            table: table.to_lowercase(),
            joins: IndexMap::new(),
            conditions: Vec::new(),
            order: Vec::new(),
        };

        for (key, value) in filters.iter() {
            let (cmp, path) = Comparator::split(key);
            let path = FieldPath::parse(path);
            select.join_chain(&path);
            let column = select.column_ref(&path);
            let condition = if value.is_null() {
                format!("{} {}", column, cmp.null_test())
            } else {
                format!(
                    "{} {} {}",
                    column,
                    cmp.as_sql(),
                    backend.quote_literal(&value.to_sql_text())
                )
            };
            select.conditions.push(condition);
        }

        for (key, direction) in sorts.iter() {
            let path = FieldPath::parse(key);
            select.join_chain(&path);
            let column = select.column_ref(&path);
            select.order.push(format!("{} {}", column, direction.as_sql()));
        }

        select
    }

    fn join_chain(&mut self, path: &FieldPath) {
        let q = |name: &str| self.backend.quote_ident(name);
        let mut previous_table = self.table.clone();
        let mut previous_alias = self.table.clone();
        let mut alias = String::new();

        let mut emitted = Vec::new();
        for table in &path.chain {
            if !alias.is_empty() {
                alias.push('_');
            }
            alias.push_str(table);
            if !self.joins.contains_key(&alias) {
                let clause = format!(
                    "JOIN {} AS {} ON {}.{} = {}.{}",
                    q(table),
                    q(&alias),
                    q(&alias),
                    q(&format!("{}_id", previous_table)),
                    q(&previous_alias),
                    q("id"),
                );
                emitted.push((alias.clone(), clause));
            }
            previous_table = table.clone();
            previous_alias = alias.clone();
        }
        self.joins.extend(emitted);
    }

    fn column_ref(&self, path: &FieldPath) -> String {
        let owner = path.alias().unwrap_or_else(|| self.table.clone());
        format!(
            "{}.{}",
            self.backend.quote_ident(&owner),
            self.backend.quote_ident(&path.column)
        )
    }

    /// Any join makes the row count need `DISTINCT`.
    pub fn is_join_bearing(&self) -> bool {
        !self.joins.is_empty()
    }

    pub fn joins(&self) -> impl Iterator<Item = &str> {
        self.joins.values().map(String::as_str)
    }

    fn from_clause(&self) -> String {
        let mut sql = format!("FROM {}", self.backend.quote_ident(&self.table));
        for join in self.joins.values() {
            sql.push('\n');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str("\nWHERE ");
            sql.push_str(&self.conditions.join("\n\tAND "));
        }
        sql
    }

    fn id_column(&self) -> String {
        format!(
            "{}.{}",
            self.backend.quote_ident(&self.table),
            self.backend.quote_ident("id")
        )
    }

    /// `SELECT COUNT(...)` over the filtered rows
    pub fn count_sql(&self) -> String {
        let counted = if self.is_join_bearing() {
            format!("DISTINCT {}", self.id_column())
        } else {
            self.id_column()
        };
        format!(
            "SELECT COUNT({}) AS {}\n{}",
            counted,
            self.backend.quote_ident("count"),
            self.from_clause()
        )
    }

    /// One window of base-table rows: explicit sorts, then `id` ascending
    pub fn page_sql(&self, limit: usize, offset: usize, dedup: DedupPolicy) -> String {
        let distinct = match dedup {
            DedupPolicy::Distinct => "DISTINCT ",
            DedupPolicy::None => "",
        };
        let mut order = self.order.clone();
        order.push(format!("{} {}", self.id_column(), Direction::Asc.as_sql()));
        format!(
            "SELECT {}{}.*\n{}\nORDER BY {}\n{}",
            distinct,
            self.backend.quote_ident(&self.table),
            self.from_clause(),
            order.join(", "),
            self.backend.window(limit, offset)
        )
    }
}

/// Single-row fetch by id; non-positive ids never match.
pub fn record_sql(backend: Backend, table: &str, id: i64) -> String {
    let predicate = if id <= 0 {
        backend.false_predicate().to_string()
    } else {
        format!(
            "{}.{} = {}",
            backend.quote_ident(table),
            backend.quote_ident("id"),
            id
        )
    };
    backend.select_one(table, &predicate)
}
