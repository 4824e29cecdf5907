mod support;

use rowset::{Error, Field, LogicalType, Record, Row, Value};
use support::{Fixture, SHOP, WIDGETS};

const PARTS: &str = "
    CREATE TABLE part (id INTEGER PRIMARY KEY, label VARCHAR(10), weight REAL, active BOOLEAN, stock INT, blob_data BLOB);
    INSERT INTO part VALUES (1, 'flange', 2.5, 1, 12, x'00ff');
";

#[test]
fn widget_lifecycle() {
    let fx = Fixture::new(&format!("{WIDGETS} INSERT INTO widget VALUES (7, 'bolt', 3);"));
    let mut widget = Record::new(&fx.db, "widget", 7);

    assert_eq!(widget.value("name").unwrap(), Value::from("bolt"));
    assert!(widget.set("qty", 5).unwrap());
    assert_eq!(widget.value("qty").unwrap(), Value::Int(5));
    assert_eq!(widget.count().unwrap(), 3);
    assert!(widget.is_dirty());
    assert_eq!(widget.changes().get("qty"), Some(&Value::Int(5)));
}

#[test]
fn hydrates_once() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", 2);
    assert_eq!(fx.queries(), 0);

    widget.value("name").unwrap();
    widget.value("qty").unwrap();
    widget.count().unwrap();
    widget.exists("nothing").unwrap();
    assert_eq!(fx.queries(), 1);
}

#[test]
fn record_from_full_row_never_queries() {
    let fx = Fixture::new(WIDGETS);
    let mut row = Row::new();
    row.insert("id".into(), Value::Int(3));
    row.insert("name".into(), Value::from("gear"));
    row.insert("qty".into(), Value::Int(2));

    let mut widget = Record::from_row(&fx.db, "widget", row);
    assert_eq!(widget.value("name").unwrap(), Value::from("gear"));
    assert_eq!(widget.count().unwrap(), 3);
    assert_eq!(fx.queries(), 0);
}

#[test]
fn missing_row_keeps_only_id() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", 99);

    assert_eq!(widget.count().unwrap(), 1);
    assert!(!widget.exists("name").unwrap());
    assert!(widget.value("name").unwrap().is_null());
    assert!(!widget.set("name", "ghost").unwrap());
    assert_eq!(widget.id(), 99);
    assert_eq!(fx.queries(), 1, "a missing row is looked up once");
}

#[test]
fn non_positive_id_queries_false_predicate() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", -1);
    assert_eq!(widget.count().unwrap(), 1);
    assert!(fx.driver.statements()[0].contains("WHERE FALSE"));
}

#[test]
fn table_names_are_lowercased() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "WIDGET", 1);
    assert_eq!(widget.table(), "widget");
    assert_eq!(widget.value("name").unwrap(), Value::from("nut"));
}

#[test]
fn exists_covers_columns_relations_and_collections() {
    let fx = Fixture::new(SHOP);
    let mut order = Record::new(&fx.db, "orders", 1);

    assert!(order.exists("status").unwrap());
    assert!(order.exists("customer").unwrap());
    assert!(order.exists("line_list").unwrap());
    assert!(!order.exists("colour").unwrap());
}

#[test]
fn foreign_key_resolves_to_a_lazy_record() {
    let fx = Fixture::new(SHOP);
    let mut order = Record::new(&fx.db, "orders", 1);

    let customer = order.one("customer").unwrap().expect("customer relation");
    assert_eq!(customer.table(), "customer");
    assert_eq!(customer.id(), 1);
    assert_eq!(customer.value("name").unwrap(), Value::from("Ada"));
    let after_first = fx.queries();

    let customer = order.one("customer").unwrap().unwrap();
    assert_eq!(customer.value("region").unwrap(), Value::from("west"));
    assert_eq!(fx.queries(), after_first, "relation is cached with its hydrated row");
}

#[test]
fn null_foreign_key_has_no_relation() {
    let fx = Fixture::new(SHOP);
    let mut order = Record::new(&fx.db, "orders", 4);
    assert!(order.exists("customer").unwrap());
    assert!(matches!(order.get("customer").unwrap(), Field::Value(Value::Null)));
}

#[test]
fn textual_foreign_key_is_parsed() {
    let fx = Fixture::new(SHOP);
    let mut order = Record::new(&fx.db, "orders", 4);
    assert!(order.set("customer_id", "2").unwrap());
    let customer = order.one("customer").unwrap().unwrap();
    assert_eq!(customer.value("name").unwrap(), Value::from("Brian"));
}

#[test]
fn changing_foreign_key_replaces_relation() {
    let fx = Fixture::new(SHOP);
    let mut order = Record::new(&fx.db, "orders", 1);
    assert_eq!(order.one("customer").unwrap().unwrap().id(), 1);

    order.set("customer_id", 2).unwrap();
    assert_eq!(order.one("customer").unwrap().unwrap().id(), 2);

    order.unset("customer_id").unwrap();
    assert!(order.one("customer").unwrap().is_none());
}

#[test]
fn collection_relation_filters_on_parent_id() {
    let fx = Fixture::new(SHOP);
    let mut customer = Record::new(&fx.db, "customer", 1);

    let orders = customer.many("orders_list").unwrap().expect("orders collection");
    assert_eq!(orders.table(), "orders");
    assert_eq!(orders.count().unwrap(), 2);
    let ids: Vec<i64> = orders.iter().map(|r| r.unwrap().id()).collect();
    assert_eq!(ids, [1, 2]);
}

#[test]
fn collection_needs_a_positive_id() {
    let fx = Fixture::new(SHOP);
    let mut customer = Record::new(&fx.db, "customer", 1);
    customer.unset("id").unwrap();
    assert_eq!(customer.id(), 0);
    assert!(customer.exists("orders_list").unwrap());
    assert!(customer.many("orders_list").unwrap().is_none());
}

#[test]
fn nested_relations_chain() {
    let fx = Fixture::new(SHOP);
    let mut customer = Record::new(&fx.db, "customer", 1);
    let orders = customer.many("orders_list").unwrap().unwrap();
    let first = orders.at(0).unwrap().unwrap();
    let lines = first.many("line_list").unwrap().unwrap();
    assert_eq!(lines.count().unwrap(), 2);
    let sku = lines.at(1).unwrap().unwrap().value("sku").unwrap();
    assert_eq!(sku, Value::from("B-7"));
}

#[test]
fn fields_apply_the_overlay_in_column_order() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", 1);
    widget.set("name", "washer").unwrap();

    let fields: Vec<(String, Value)> = widget.fields().unwrap().collect();
    assert_eq!(
        fields,
        [
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::from("washer")),
            ("qty".to_string(), Value::Int(1)),
        ]
    );
}

#[test]
fn unset_never_touches_storage() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", 1);
    widget.unset("name").unwrap();
    assert!(widget.value("name").unwrap().is_null());

    let mut fresh = Record::new(&fx.db, "widget", 1);
    assert_eq!(fresh.value("name").unwrap(), Value::from("nut"));
}

#[test]
fn to_text_nests_with_tabs() {
    let fx = Fixture::new(WIDGETS);
    let mut widget = Record::new(&fx.db, "widget", 2);
    assert_eq!(
        widget.to_text(1).unwrap(),
        "{\n\t\t\"id\": 2,\n\t\t\"name\": \"bolt\",\n\t\t\"qty\": 5\n\t}"
    );
}

#[test]
fn typed_values_follow_the_schema() {
    let fx = Fixture::new(PARTS);
    let mut part = Record::new(&fx.db, "part", 1);

    let (column, value) = part.typed("active").unwrap().unwrap();
    assert_eq!(column.logical_type, LogicalType::Bool);
    assert_eq!(value, Value::Bool(true));

    let (column, value) = part.typed("label").unwrap().unwrap();
    assert_eq!(column.length, Some(10));
    assert_eq!(value, Value::from("flange"));

    let (column, _) = part.typed("weight").unwrap().unwrap();
    assert_eq!(column.logical_type, LogicalType::Float);

    assert!(part.typed("blob_data").unwrap().is_none(), "blobs are not mapped");
    assert_eq!(part.schema().unwrap().columns.len(), 5);
}

#[test]
fn found_tracks_the_stored_row() {
    let fx = Fixture::new("CREATE TABLE tag (id INTEGER PRIMARY KEY); INSERT INTO tag VALUES (4);");
    let mut tag = Record::new(&fx.db, "tag", 4);
    assert!(tag.is_found().unwrap());
    assert_eq!(tag.count().unwrap(), 1);

    let mut missing = Record::new(&fx.db, "tag", 5);
    assert!(!missing.is_found().unwrap());
    assert_eq!(fx.queries(), 2);
}

#[test]
fn quoted_table_names_reach_the_database() {
    let fx = Fixture::new(
        "CREATE TABLE \"it's\" (id INTEGER PRIMARY KEY, name TEXT); INSERT INTO \"it's\" VALUES (1, 'odd');",
    );
    let mut odd = Record::new(&fx.db, "it's", 1);
    assert_eq!(odd.value("name").unwrap(), Value::from("odd"));
}

#[test]
fn failed_hydration_is_a_query_error() {
    let fx = Fixture::new(WIDGETS);
    let mut ghost = Record::new(&fx.db, "nowhere", 1);
    let err = ghost.value("name").unwrap_err();
    assert!(matches!(err, Error::Query { ref sql, .. } if sql.contains("`nowhere`")));
    assert!(!err.is_fatal());
}
