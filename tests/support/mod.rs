//! Shared fixtures: a seeded SQLite file per test and a driver that counts
//! round trips.

#![allow(dead_code)]

use rowset::db::sqlite::SqliteDriver;
use rowset::db::NativeColumn;
use rowset::{Backend, Cache, Database, DatabaseDriver, NoCache, Row};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub const WIDGETS: &str = "
    CREATE TABLE widget (id INTEGER PRIMARY KEY, name VARCHAR(40), qty INT);
    INSERT INTO widget VALUES (1, 'nut', 1), (2, 'bolt', 5), (3, 'gear', 2);
";

pub const SHOP: &str = "
    CREATE TABLE customer (id INTEGER PRIMARY KEY, name VARCHAR(60) NOT NULL, region TEXT);
    CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INT, status VARCHAR(20) DEFAULT 'open', total DECIMAL(10,2));
    CREATE TABLE owner (id INTEGER PRIMARY KEY, orders_id INT, region TEXT);
    CREATE TABLE line (id INTEGER PRIMARY KEY, orders_id INT, sku VARCHAR(12), qty INT);

    INSERT INTO customer VALUES (1, 'Ada', 'west'), (2, 'Brian', 'east');
    INSERT INTO orders VALUES
        (1, 1, 'open', 19.5),
        (2, 1, 'shipped', 7.25),
        (3, 2, 'open', NULL),
        (4, NULL, 'draft', 0);
    INSERT INTO owner VALUES (1, 1, 'west'), (2, 2, 'east'), (3, 3, 'west');
    INSERT INTO line VALUES
        (1, 1, 'A-1', 2),
        (2, 1, 'B-7', 3),
        (3, 2, 'A-1', 1),
        (4, 3, 'C-2', 0);
";

/// `item` with ids 1..=250
pub const ITEMS: &str = "
    CREATE TABLE item (id INTEGER PRIMARY KEY, label TEXT);
    INSERT INTO item (id, label)
        WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 250)
        SELECT n, 'item ' || n FROM seq;
";

/// Wraps the SQLite driver and counts every call that reaches the database
pub struct CountingDriver {
    inner: SqliteDriver,
    queries: Cell<usize>,
    log: std::cell::RefCell<Vec<String>>,
}

impl CountingDriver {
    pub fn open(path: &Path) -> Self {
        Self {
            inner: SqliteDriver::open(path).unwrap(),
            queries: Cell::new(0),
            log: Default::default(),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    /// Statements issued through `query_rows`, oldest first
    pub fn statements(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn reset(&self) {
        self.queries.set(0);
        self.log.borrow_mut().clear();
    }

    /// Run SQL behind the context's back (uncounted)
    pub fn execute(&self, sql: &str) {
        self.inner.execute_batch(sql).unwrap();
    }

    fn bump(&self) {
        self.queries.set(self.queries.get() + 1);
    }
}

impl DatabaseDriver for CountingDriver {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    fn query_rows(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        self.bump();
        self.log.borrow_mut().push(sql.to_string());
        self.inner.query_rows(sql)
    }

    fn list_tables(&self) -> anyhow::Result<Vec<String>> {
        self.bump();
        self.inner.list_tables()
    }

    fn native_columns(&self, table: &str) -> anyhow::Result<Vec<NativeColumn>> {
        self.bump();
        self.inner.native_columns(table)
    }

    fn database_name(&self) -> String {
        self.inner.database_name()
    }

    fn server_version(&self) -> anyhow::Result<String> {
        self.inner.server_version()
    }
}

/// Driver whose metadata queries are refused, as for a login without
/// permission on the catalog views
pub struct NoCatalogDriver;

impl DatabaseDriver for NoCatalogDriver {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn query_rows(&self, _sql: &str) -> anyhow::Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn list_tables(&self) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("permission denied on catalog")
    }

    fn native_columns(&self, _table: &str) -> anyhow::Result<Vec<NativeColumn>> {
        anyhow::bail!("permission denied on catalog")
    }

    fn database_name(&self) -> String {
        "locked".to_string()
    }

    fn server_version(&self) -> anyhow::Result<String> {
        Ok("SQLite 3".to_string())
    }
}

/// Context over [`NoCatalogDriver`]
pub fn no_catalog_db() -> Database {
    let driver: Rc<dyn DatabaseDriver> = Rc::new(NoCatalogDriver);
    Database::with_drivers(Rc::clone(&driver), driver, Rc::new(NoCache))
}

pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    pub driver: Rc<CountingDriver>,
    pub db: Database,
}

impl Fixture {
    pub fn new(seed: &str) -> Self {
        Self::with_cache(seed, Rc::new(NoCache))
    }

    pub fn with_cache(seed: &str, cache: Rc<dyn Cache>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.db");
        SqliteDriver::open(&path).unwrap().execute_batch(seed).unwrap();
        let (driver, db) = connect(&path, cache);
        Self {
            dir,
            path,
            driver,
            db,
        }
    }

    /// A second, independent context over the same file
    pub fn reopen(&self, cache: Rc<dyn Cache>) -> (Rc<CountingDriver>, Database) {
        connect(&self.path, cache)
    }

    pub fn queries(&self) -> usize {
        self.driver.queries()
    }
}

fn connect(path: &Path, cache: Rc<dyn Cache>) -> (Rc<CountingDriver>, Database) {
    let driver = Rc::new(CountingDriver::open(path));
    let handle: Rc<dyn DatabaseDriver> = driver.clone();
    let db = Database::with_drivers(Rc::clone(&handle), handle, cache);
    (driver, db)
}
