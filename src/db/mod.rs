//! Database module: driver abstraction, SQL Server and SQLite backends, and
//! the [`Database`] context that owns the read and write handles.

mod dialect;
mod driver;
mod schema;
pub mod sqlite;
pub mod sqlserver;
mod value;

pub use driver::*;
pub use schema::*;
pub use value::*;

use crate::cache::{Cache, MemoryCache};
use crate::config::{DatabaseConfig, Target};
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use once_cell::unsync::OnceCell;
use sqlite::SqliteDriver;
use sqlserver::SqlServerDriver;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error};

const TABLES_CACHE_KEY: &str = "tables";

/// Where a context takes its configuration from on first use
#[derive(Clone, Debug)]
enum Source {
    Environment,
    Explicit(DatabaseConfig),
}

struct Handles {
    backend: Backend,
    read: Rc<dyn DatabaseDriver>,
    write: Rc<dyn DatabaseDriver>,
}

/// Connection context: read/write drivers, the table list and the schema
/// catalog, shared by every record and record set built on it.
///
/// Connecting happens once, on first use. A failed attempt is logged and
/// remembered; later calls get [`Error::Unavailable`] without retrying.
pub struct Database {
    source: Source,
    cache: Rc<dyn Cache>,
    handles: OnceCell<std::result::Result<Handles, String>>,
    tables: RefCell<Option<Vec<String>>>,
    pub(crate) schemas: RefCell<HashMap<String, Rc<TableSchema>>>,
}

impl Default for Database {
    /// Context configured from the process environment, with a process-local cache
    fn default() -> Self {
        Self::from_env(Rc::new(MemoryCache::new()))
    }
}

impl Database {
    /// Lazy context for an explicit configuration
    pub fn new(config: DatabaseConfig, cache: Rc<dyn Cache>) -> Self {
        Self::with_source(Source::Explicit(config), cache)
    }

    /// Lazy context reading `DB_*` variables on first use
    pub fn from_env(cache: Rc<dyn Cache>) -> Self {
        Self::with_source(Source::Environment, cache)
    }

    /// Connect immediately, surfacing configuration and connection errors
    pub fn open(config: DatabaseConfig, cache: Rc<dyn Cache>) -> Result<Self> {
        let db = Self::new(config, cache);
        db.handles()?;
        Ok(db)
    }

    /// Wrap drivers that are already connected. `read` and `write` may be the
    /// same driver.
    pub fn with_drivers(
        read: Rc<dyn DatabaseDriver>,
        write: Rc<dyn DatabaseDriver>,
        cache: Rc<dyn Cache>,
    ) -> Self {
        let db = Self::with_source(Source::Environment, cache);
        let backend = read.backend();
        let _ = db.handles.set(Ok(Handles { backend, read, write }));
        db
    }

    fn with_source(source: Source, cache: Rc<dyn Cache>) -> Self {
        Self {
            source,
            cache,
            handles: OnceCell::new(),
            tables: RefCell::new(None),
            schemas: RefCell::new(HashMap::new()),
        }
    }

    fn handles(&self) -> Result<&Handles> {
        if let Some(state) = self.handles.get() {
            return state.as_ref().map_err(|msg| Error::Unavailable(msg.clone()));
        }
        match self.connect() {
            Ok(handles) => self
                .handles
                .get_or_init(|| Ok(handles))
                .as_ref()
                .map_err(|msg| Error::Unavailable(msg.clone())),
            Err(err) => {
                error!(error = %err, "database initialization failed");
                let _ = self.handles.set(Err(err.to_string()));
                Err(err)
            }
        }
    }

    fn connect(&self) -> Result<Handles> {
        let config = match &self.source {
            Source::Explicit(config) => config.clone(),
            Source::Environment => DatabaseConfig::from_env(),
        };
        let target = config.target()?;
        let backend = target.backend();
        let connection_error = |source| Error::Connection { backend, source };

        match target {
            Target::Sqlite { path } => {
                debug!(path = %path.display(), "opening sqlite database");
                let driver: Rc<dyn DatabaseDriver> =
                    Rc::new(SqliteDriver::open(&path).map_err(connection_error)?);
                Ok(Handles {
                    backend,
                    read: Rc::clone(&driver),
                    write: driver,
                })
            }
            Target::SqlServer { read, write } => {
                debug!(host = %read.host, database = %read.database, "connecting to sql server");
                let read = SqlServerDriver::connect(read).map_err(connection_error)?;
                let write = SqlServerDriver::connect(write).map_err(connection_error)?;
                Ok(Handles {
                    backend,
                    read: Rc::new(read),
                    write: Rc::new(write),
                })
            }
        }
    }

    /// The configured backend family
    pub fn backend(&self) -> Result<Backend> {
        Ok(self.handles()?.backend)
    }

    /// Read handle. Use this for every query issued by the core.
    pub fn read(&self) -> Result<Rc<dyn DatabaseDriver>> {
        Ok(Rc::clone(&self.handles()?.read))
    }

    /// Read/write handle. Same driver as [`Database::read`] for SQLite.
    pub fn write(&self) -> Result<Rc<dyn DatabaseDriver>> {
        Ok(Rc::clone(&self.handles()?.write))
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    /// Escape text for the backend's SQL without adding quotes
    pub fn escape(&self, text: &str) -> Result<String> {
        Ok(self.backend()?.escape(text))
    }

    pub fn quote_ident(&self, name: &str) -> Result<String> {
        Ok(self.backend()?.quote_ident(name))
    }

    /// Run a query on the read handle
    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let read = self.read()?;
        debug!(target: "rowset::sql", "{}", sql);
        read.query_rows(sql).map_err(|source| Error::Query {
            sql: sql.to_string(),
            source,
        })
    }

    /// Whether a table of that (lowercased) name exists.
    ///
    /// The table list is fetched once and kept until [`Database::invalidate_tables`].
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let name = name.to_lowercase();
        if let Some(tables) = self.tables.borrow().as_ref() {
            return Ok(tables.contains(&name));
        }

        let cached = self
            .cache
            .get(TABLES_CACHE_KEY)
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok());
        let tables = match cached {
            Some(tables) => tables,
            None => {
                let read = self.read()?;
                let sql = self.backend()?.table_list_query();
                debug!(target: "rowset::sql", "{}", sql);
                let tables: Vec<String> = read
                    .list_tables()
                    .map_err(|source| Error::Query {
                        sql: sql.to_string(),
                        source,
                    })?
                    .into_iter()
                    .map(|t| t.to_lowercase())
                    .collect();
                self.cache.set(TABLES_CACHE_KEY, serde_json::to_value(&tables)?);
                tables
            }
        };

        let exists = tables.contains(&name);
        *self.tables.borrow_mut() = Some(tables);
        Ok(exists)
    }

    /// Forget the table list; the next `table_exists` refetches it.
    pub fn invalidate_tables(&self) {
        self.tables.borrow_mut().take();
        self.cache.set(TABLES_CACHE_KEY, serde_json::Value::Null);
    }
}
