mod support;

use rowset::{Backend, Database, DatabaseConfig, Error, MemoryCache, NoCache, Record, Value};
use std::rc::Rc;
use support::{Fixture, SHOP, WIDGETS};

#[test]
fn table_list_is_fetched_once() {
    let fx = Fixture::new(SHOP);
    assert!(fx.db.table_exists("orders").unwrap());
    assert!(fx.db.table_exists("Customer").unwrap());
    assert!(!fx.db.table_exists("nowhere").unwrap());
    assert_eq!(fx.queries(), 1);
}

#[test]
fn invalidated_table_list_sees_new_tables() {
    let fx = Fixture::with_cache(WIDGETS, Rc::new(MemoryCache::new()));
    assert!(!fx.db.table_exists("gadget").unwrap());

    fx.driver.execute("CREATE TABLE gadget (id INTEGER PRIMARY KEY)");
    assert!(!fx.db.table_exists("gadget").unwrap());

    fx.db.invalidate_tables();
    assert!(fx.db.table_exists("gadget").unwrap());
}

#[test]
fn escaping_follows_the_backend() {
    let fx = Fixture::new(WIDGETS);
    assert_eq!(fx.db.backend().unwrap(), Backend::Sqlite);
    assert_eq!(fx.db.escape("it's\0").unwrap(), "it''s");
    assert_eq!(fx.db.quote_ident("order").unwrap(), "`order`");
}

#[test]
fn query_returns_ordered_rows() {
    let fx = Fixture::new(WIDGETS);
    let rows = fx.db.query("SELECT qty, name FROM widget ORDER BY id").unwrap();
    assert_eq!(rows.len(), 3);
    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, ["qty", "name"]);
    assert_eq!(rows[1]["name"], Value::from("bolt"));
}

#[test]
fn opens_from_a_toml_file() {
    let fx = Fixture::new(WIDGETS);
    let config_path = fx.dir.path().join("rowset.toml");
    std::fs::write(
        &config_path,
        format!("type = \"sqlite\"\npath = {:?}\n", fx.path.display().to_string()),
    )
    .unwrap();

    let config = DatabaseConfig::load_from(&config_path).unwrap();
    let db = Database::open(config, Rc::new(NoCache)).unwrap();
    let mut widget = Record::new(&db, "widget", 3);
    assert_eq!(widget.value("name").unwrap(), Value::from("gear"));
}

#[test]
fn lazy_context_connects_on_first_use() {
    let fx = Fixture::new(WIDGETS);
    let db = Database::new(DatabaseConfig::sqlite(&fx.path), Rc::new(NoCache));
    let mut widget = Record::new(&db, "widget", 1);
    assert_eq!(widget.value("qty").unwrap(), Value::Int(1));
}

#[test]
fn sql_server_without_credentials_is_unavailable() {
    let config = DatabaseConfig {
        backend: Some("sqlserver".into()),
        host: Some("localhost".into()),
        ..DatabaseConfig::default()
    };
    let db = Database::new(config, Rc::new(NoCache));
    let mut widget = Record::new(&db, "widget", 1);

    assert!(matches!(widget.value("name"), Err(Error::Config(_))));
    assert!(matches!(widget.value("name"), Err(Error::Unavailable(_))));
}

#[test]
fn driver_identifies_itself() {
    let fx = Fixture::new(WIDGETS);
    let read = fx.db.read().unwrap();
    assert_eq!(read.database_name(), "fixture.db");
    assert!(read.server_version().unwrap().starts_with("SQLite 3."));
}
