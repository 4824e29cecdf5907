//! Filtered, sorted and paginated view over one table
//!
//! The row count and the current page are memoized. Changing the filters,
//! sorts, page size or dedup policy drops both.

use crate::db::{Database, Row, Value};
use crate::error::Result;
use crate::record::Record;
use crate::sql::{DedupPolicy, Direction, Filters, Select, Sorts};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One page slot: the raw row until it is first read
#[derive(Clone)]
enum Slot<'db> {
    Raw(Row),
    Record(Record<'db>),
}

#[derive(Clone)]
struct Page<'db> {
    index: usize,
    slots: Vec<Slot<'db>>,
}

#[derive(Clone)]
pub struct RecordSet<'db> {
    db: &'db Database,
    table: String,
    filters: Filters,
    sorts: Sorts,
    page_size: usize,
    dedup: DedupPolicy,
    total_count: Option<u64>,
    current_page: Option<Page<'db>>,
}

impl<'db> RecordSet<'db> {
    pub fn new(db: &'db Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_lowercase(),
            filters: Filters::new(),
            sorts: Sorts::new(),
            page_size: DEFAULT_PAGE_SIZE,
            dedup: DedupPolicy::default(),
            total_count: None,
            current_page: None,
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_filter(key, value);
        self
    }

    /// Replace every filter
    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self.invalidate();
        self
    }

    /// Sort ascending on `key` after any existing sort keys
    pub fn sort(self, key: impl Into<String>) -> Self {
        self.sort_by(key, Direction::Asc)
    }

    pub fn sort_by(mut self, key: impl Into<String>, direction: Direction) -> Self {
        self.sorts.insert(key, direction);
        self.invalidate();
        self
    }

    /// Rows fetched per window query; values below 1 are raised to 1.
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self.invalidate();
        self
    }

    pub fn dedup(mut self, policy: DedupPolicy) -> Self {
        self.dedup = policy;
        self.invalidate();
        self
    }

    pub fn add_filter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.filters.insert(key, value);
        self.invalidate();
    }

    pub fn remove_filter(&mut self, key: &str) -> Option<Value> {
        let removed = self.filters.remove(key);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter_spec(&self) -> &Filters {
        &self.filters
    }

    pub fn sort_spec(&self) -> &Sorts {
        &self.sorts
    }

    /// Drop the memoized count and page
    pub fn invalidate(&mut self) {
        self.total_count = None;
        self.current_page = None;
    }

    fn compile(&self) -> Result<Select> {
        Ok(Select::compile(
            self.db.backend()?,
            &self.table,
            &self.filters,
            &self.sorts,
        ))
    }

    /// Number of distinct matching rows
    pub fn count(&mut self) -> Result<u64> {
        if let Some(count) = self.total_count {
            return Ok(count);
        }
        let sql = self.compile()?.count_sql();
        let rows = self.db.query(&sql)?;
        let count = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64)
            .map_or(0, |n| n.max(0) as u64);
        debug!(table = %self.table, count, "counted rows");
        self.total_count = Some(count);
        self.current_page = None;
        Ok(count)
    }

    /// Record at `offset` in sort order, or `None` past the end
    pub fn at(&mut self, offset: usize) -> Result<Option<&mut Record<'db>>> {
        if offset as u64 >= self.count()? {
            return Ok(None);
        }
        let index = offset / self.page_size;
        if self.current_page.as_ref().map(|p| p.index) != Some(index) {
            self.load_page(index)?;
        }

        let db = self.db;
        let table = self.table.clone();
        let Some(slot) = self
            .current_page
            .as_mut()
            .and_then(|page| page.slots.get_mut(offset % self.page_size))
        else {
            return Ok(None);
        };
        if let Slot::Raw(row) = slot {
            let row = std::mem::take(row);
            *slot = Slot::Record(Record::from_row(db, &table, row));
        }
        Ok(match slot {
            Slot::Record(record) => Some(record),
            Slot::Raw(_) => None,
        })
    }

    fn load_page(&mut self, index: usize) -> Result<()> {
        let sql = self
            .compile()?
            .page_sql(self.page_size, index * self.page_size, self.dedup);
        let rows = self.db.query(&sql)?;
        debug!(table = %self.table, page = index, rows = rows.len(), "loaded page");
        self.current_page = Some(Page {
            index,
            slots: rows.into_iter().map(Slot::Raw).collect(),
        });
        Ok(())
    }

    /// Every matching record in order. Iteration stops after the first error.
    pub fn iter(&mut self) -> Iter<'_, 'db> {
        Iter {
            set: self,
            offset: 0,
            failed: false,
        }
    }

    /// Effective rows of every matching record
    pub fn to_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for record in self.iter() {
            rows.push(record?.row()?);
        }
        Ok(rows)
    }

    /// `{"table", "filter", "rows"}` as tab-indented JSON
    pub fn to_text(&mut self, indent: usize) -> Result<String> {
        #[derive(Serialize)]
        struct Dump<'a> {
            table: &'a str,
            filter: &'a Filters,
            rows: Vec<Row>,
        }

        let rows = self.to_rows()?;
        let dump = Dump {
            table: &self.table,
            filter: &self.filters,
            rows,
        };
        crate::text::to_text(&dump, indent)
    }
}

impl std::fmt::Debug for RecordSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSet")
            .field("table", &self.table)
            .field("filters", &self.filters)
            .field("sorts", &self.sorts)
            .field("page_size", &self.page_size)
            .field("total_count", &self.total_count)
            .finish()
    }
}

pub struct Iter<'s, 'db> {
    set: &'s mut RecordSet<'db>,
    offset: usize,
    failed: bool,
}

impl<'db> Iterator for Iter<'_, 'db> {
    type Item = Result<Record<'db>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.set.at(self.offset).map(|r| r.cloned());
        self.offset += 1;
        match item {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
