//! Single-row access with lazy hydration, an overlay of uncommitted changes
//! and relations resolved by naming convention.
//!
//! Conventions, for a field `x` on a record of table `t`:
//!
//! - `x_id` holds the id of a row in table `x` (`get("x")` is that record)
//! - `x_list` is every row of table `x` whose `t_id` is this record's id

use crate::db::{Database, Row, Value};
use crate::error::Result;
use crate::record_set::RecordSet;
use crate::schema::{Column, TableSchema};
use crate::sql::record_sql;
use std::collections::HashMap;
use std::rc::Rc;

/// Suffix marking a field as the collection of child records
pub const COLLECTION_SUFFIX: &str = "_list";
/// Suffix marking a foreign key column
pub const FOREIGN_KEY_SUFFIX: &str = "_id";
pub const ID: &str = "id";

/// A resolved relation, memoized by the record that resolved it
#[derive(Clone)]
pub enum Relation<'db> {
    One(Box<Record<'db>>),
    Many(Box<RecordSet<'db>>),
}

/// Result of [`Record::get`]
pub enum Field<'r, 'db> {
    Value(Value),
    Record(&'r mut Record<'db>),
    Records(&'r mut RecordSet<'db>),
}

impl Field<'_, '_> {
    /// The scalar value, `Null` for relations
    pub fn into_value(self) -> Value {
        match self {
            Field::Value(v) => v,
            Field::Record(_) | Field::Records(_) => Value::Null,
        }
    }
}

#[derive(Clone)]
pub struct Record<'db> {
    db: &'db Database,
    table: String,
    persisted: Row,
    overlay: Row,
    relations: HashMap<String, Relation<'db>>,
    fetched: bool,
    /// A stored row backs `persisted`
    found: bool,
}

impl<'db> Record<'db> {
    /// Lazy record: only the id is known until a field is read.
    pub fn new(db: &'db Database, table: &str, id: i64) -> Self {
        let mut persisted = Row::new();
        persisted.insert(ID.to_string(), Value::Int(id));
        Self::build(db, table, persisted, false)
    }

    /// Hydrated record from a full row. A row without `id` has no fields.
    pub fn from_row(db: &'db Database, table: &str, row: Row) -> Self {
        let persisted = if row.contains_key(ID) { row } else { Row::new() };
        let fetched = persisted.len() != 1;
        Self::build(db, table, persisted, fetched)
    }

    fn build(db: &'db Database, table: &str, persisted: Row, fetched: bool) -> Self {
        let persisted_is_empty = persisted.is_empty();
        Self {
            db,
            table: table.to_lowercase(),
            persisted,
            overlay: Row::new(),
            relations: HashMap::new(),
            fetched,
            found: fetched && !persisted_is_empty,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Effective id (overlay first); 0 when unknown.
    pub fn id(&self) -> i64 {
        self.overlay
            .get(ID)
            .or_else(|| self.persisted.get(ID))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    fn needs_fetch(&self) -> bool {
        !self.fetched && self.persisted.len() == 1 && self.persisted.contains_key(ID)
    }

    /// Load the full row the first time a field is needed.
    fn ensure_fetched(&mut self) -> Result<()> {
        if !self.needs_fetch() {
            return Ok(());
        }
        let id = self.persisted.get(ID).and_then(Value::as_i64).unwrap_or(0);
        let sql = record_sql(self.db.backend()?, &self.table, id);
        let mut rows = self.db.query(&sql)?;
        self.fetched = true;
        if !rows.is_empty() {
            self.persisted = rows.swap_remove(0);
            self.found = true;
        } else {
            tracing::debug!(table = %self.table, id, "record not found");
        }
        Ok(())
    }

    /// Whether a stored row exists for this record. Hydrates a lazy record.
    pub fn is_found(&mut self) -> Result<bool> {
        self.ensure_fetched()?;
        Ok(self.found)
    }

    /// True for direct columns, for `x` when `x_id` is a column, and for any
    /// `*_list` field.
    pub fn exists(&mut self, field: &str) -> Result<bool> {
        self.ensure_fetched()?;
        Ok(self.persisted.contains_key(field)
            || self
                .persisted
                .contains_key(&format!("{}{}", field, FOREIGN_KEY_SUFFIX))
            || field.ends_with(COLLECTION_SUFFIX))
    }

    /// Overlay, then persisted value, then a cached relation, then a freshly
    /// resolved (and cached) relation. Unknown fields read as `Null`.
    pub fn get(&mut self, field: &str) -> Result<Field<'_, 'db>> {
        if !self.exists(field)? {
            return Ok(Field::Value(Value::Null));
        }
        if let Some(value) = self.overlay.get(field).or_else(|| self.persisted.get(field)) {
            return Ok(Field::Value(value.clone()));
        }
        if !self.relations.contains_key(field) {
            match self.resolve(field) {
                Some(relation) => {
                    self.relations.insert(field.to_string(), relation);
                }
                None => return Ok(Field::Value(Value::Null)),
            }
        }
        Ok(match self.relations.get_mut(field) {
            Some(Relation::One(record)) => Field::Record(record.as_mut()),
            Some(Relation::Many(set)) => Field::Records(set.as_mut()),
            None => Field::Value(Value::Null),
        })
    }

    /// Scalar value of a field; relations and unknown fields are `Null`.
    pub fn value(&mut self, field: &str) -> Result<Value> {
        Ok(self.get(field)?.into_value())
    }

    /// Related record through `field_id`
    pub fn one(&mut self, field: &str) -> Result<Option<&mut Record<'db>>> {
        Ok(match self.get(field)? {
            Field::Record(record) => Some(record),
            _ => None,
        })
    }

    /// Child records through `field` (which must end in `_list`)
    pub fn many(&mut self, field: &str) -> Result<Option<&mut RecordSet<'db>>> {
        Ok(match self.get(field)? {
            Field::Records(set) => Some(set),
            _ => None,
        })
    }

    fn resolve(&self, field: &str) -> Option<Relation<'db>> {
        let id = self.id();
        if let Some(child) = field.strip_suffix(COLLECTION_SUFFIX) {
            if id > 0 {
                let set = RecordSet::new(self.db, child)
                    .filter(format!("{}{}", self.table, FOREIGN_KEY_SUFFIX), id);
                return Some(Relation::Many(Box::new(set)));
            }
        }

        let key = format!("{}{}", field, FOREIGN_KEY_SUFFIX);
        let foreign = self.overlay.get(&key).or_else(|| self.persisted.get(&key))?;
        if foreign.is_null() {
            return None;
        }
        match foreign.as_i64() {
            Some(foreign_id) => Some(Relation::One(Box::new(Record::new(
                self.db, field, foreign_id,
            )))),
            None => {
                tracing::warn!(table = %self.table, key = %key, value = %foreign, "foreign key is not an id");
                None
            }
        }
    }

    /// Stage a change. Returns `false` (and stores nothing) when the field does
    /// not exist or already has that value.
    ///
    /// Changing `x_id` drops the cached `x` relation.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if !self.exists(field)? {
            return Ok(false);
        }
        let unchanged = match self.get(field)? {
            Field::Value(current) => current == value,
            Field::Record(_) | Field::Records(_) => false,
        };
        if unchanged {
            return Ok(false);
        }
        self.overlay.insert(field.to_string(), value);
        self.evict_relation(field);
        Ok(true)
    }

    /// Clear a field: `id` becomes 0, anything else `Null`. Storage is untouched.
    pub fn unset(&mut self, field: &str) -> Result<()> {
        if !self.exists(field)? {
            return Ok(());
        }
        let cleared = if field == ID { Value::Int(0) } else { Value::Null };
        self.overlay.insert(field.to_string(), cleared);
        self.evict_relation(field);
        Ok(())
    }

    fn evict_relation(&mut self, field: &str) {
        if let Some(relation) = field.strip_suffix(FOREIGN_KEY_SUFFIX) {
            self.relations.remove(relation);
        }
    }

    /// Number of hydrated columns
    pub fn count(&mut self) -> Result<usize> {
        self.ensure_fetched()?;
        Ok(self.persisted.len())
    }

    /// Hydrated columns with the overlay applied, in column order
    pub fn row(&mut self) -> Result<Row> {
        self.ensure_fetched()?;
        Ok(self
            .persisted
            .iter()
            .map(|(name, value)| {
                let value = self.overlay.get(name).unwrap_or(value);
                (name.clone(), value.clone())
            })
            .collect())
    }

    /// `(name, effective value)` pairs of the hydrated row
    pub fn fields(&mut self) -> Result<impl Iterator<Item = (String, Value)>> {
        Ok(self.row()?.into_iter())
    }

    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Staged changes, in the order they were made
    pub fn changes(&self) -> &Row {
        &self.overlay
    }

    pub fn to_text(&mut self, indent: usize) -> Result<String> {
        let row = self.row()?;
        crate::text::to_text(&row, indent)
    }

    /// Schema of this record's table
    pub fn schema(&self) -> Result<Rc<TableSchema>> {
        self.db.columns_for(&self.table)
    }

    /// Column metadata of `field`, if the schema maps it
    pub fn column(&self, field: &str) -> Result<Option<Column>> {
        Ok(self.schema()?.column(field).cloned())
    }

    /// Column metadata and the value converted to its logical type; `None`
    /// when the schema does not map the field.
    pub fn typed(&mut self, field: &str) -> Result<Option<(Column, Value)>> {
        let Some(column) = self.column(field)? else {
            return Ok(None);
        };
        let value = column.coerce(&self.value(field)?);
        Ok(Some((column, value)))
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.table)
            .field("persisted", &self.persisted)
            .field("overlay", &self.overlay)
            .finish()
    }
}
