//! Fetch tests against a real SQLite database held in memory.

use dbmd_core::fetch::{DateMapping, FetchOptions, MetadataFetcher};
use dbmd_core::ident::CaseSensitivity;
use dbmd_core::introspect::sqlite::SqliteSource;
use dbmd_core::introspect::{connect_source, DatabaseType};
use dbmd_core::model::{ForeignKeyScope, RelationId, RelationType, SqlType};

const FIXTURE: &str = r#"
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name VARCHAR(40) NOT NULL
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES Customers(id),
    placed_on DATE,
    total DECIMAL(10,2)
);
CREATE TABLE order_lines (
    order_id INTEGER NOT NULL,
    line_no INTEGER NOT NULL,
    sku CHAR(12),
    PRIMARY KEY (line_no, order_id),
    FOREIGN KEY (order_id) REFERENCES orders(id)
);
CREATE TABLE line_notes (
    order_id INTEGER,
    line_no INTEGER,
    note TEXT,
    FOREIGN KEY (line_no, order_id) REFERENCES order_lines
);
CREATE VIEW big_orders AS SELECT id, total FROM orders WHERE total > 100
"#;

fn id(name: &str) -> RelationId {
    RelationId::new(None, None, name)
}

async fn setup() -> SqliteSource {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect failed");

    for stmt in FIXTURE.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt)
            .execute(&pool)
            .await
            .unwrap_or_else(|e| panic!("fixture SQL failed: {}\nStatement: {}", e, stmt));
    }

    SqliteSource::new(pool)
}

#[tokio::test]
async fn test_sqlite_fetch_metadata() {
    let source = setup().await;
    let model = MetadataFetcher::new(&source)
        .fetch_metadata(None, &FetchOptions::default())
        .await
        .expect("fetch failed");

    assert_eq!(model.case_sensitivity(), CaseSensitivity::InsensitiveStoredMixed);
    assert_eq!(model.dbms().name.as_deref(), Some("SQLite"));
    assert_eq!(model.dbms().major_version, Some(3));

    let names: Vec<&str> = model.relation_metadatas().iter().map(|r| r.relation_id.name()).collect();
    assert_eq!(names, vec!["big_orders", "customers", "line_notes", "order_lines", "orders"]);
    assert_eq!(
        model.relation_metadata(&id("big_orders")).unwrap().relation_type,
        RelationType::View
    );

    let customers = model.relation_metadata(&id("customers")).unwrap();
    let name = customers.field("name").unwrap();
    assert_eq!(name.type_code, SqlType::VarChar.code());
    assert_eq!(name.database_type, "VARCHAR");
    assert_eq!(name.length, Some(40));
    assert_eq!(name.nullable, Some(false));
    assert_eq!(customers.primary_key_field_names(None), vec!["id"]);

    let total = model.relation_metadata(&id("orders")).unwrap().field("total").unwrap();
    assert_eq!(total.type_code, SqlType::Decimal.code());
    assert_eq!(total.precision, Some(10));
    assert_eq!(total.fractional_digits, Some(2));
    assert_eq!(total.radix, Some(10));
    assert_eq!(total.nullable, Some(true));
}

#[tokio::test]
async fn test_sqlite_composite_keys() {
    let source = setup().await;
    let model = MetadataFetcher::new(&source)
        .fetch_metadata(None, &FetchOptions::default())
        .await
        .unwrap();

    // Key order follows the PRIMARY KEY clause, not column order
    assert_eq!(
        model.primary_key_field_names(&id("order_lines"), None).unwrap(),
        vec!["line_no", "order_id"]
    );

    assert_eq!(model.foreign_key_count(), 3);

    // Declared without a column list: resolved against the parent's key
    let fk = model
        .foreign_key_from_to(
            &id("line_notes"),
            &id("order_lines"),
            None,
            ForeignKeyScope::RegisteredTablesOnly,
        )
        .unwrap()
        .expect("line_notes key missing");
    assert_eq!(fk.source_field_names(), vec!["line_no", "order_id"]);
    assert_eq!(fk.target_field_names(), vec!["line_no", "order_id"]);

    // Written as `Customers` in the DDL, registered as `customers`
    let fk = model
        .foreign_key_from_to(
            &id("orders"),
            &id("customers"),
            None,
            ForeignKeyScope::RegisteredTablesOnly,
        )
        .unwrap()
        .expect("orders key missing");
    assert_eq!(fk.target_relation_id.name(), "customers");
    assert_eq!(model.foreign_keys_from_children_to(&id("customers")).len(), 1);

    assert_eq!(
        model.foreign_key_field_names(&id("orders"), Some("o")),
        vec!["o.customer_id"]
    );
}

#[tokio::test]
async fn test_sqlite_date_mapping() {
    let source = setup().await;
    let fetcher = MetadataFetcher::with_date_mapping(&source, DateMapping::DatesAsTimestamps);
    let model = fetcher.fetch_metadata(None, &FetchOptions::default()).await.unwrap();

    let placed_on = model.relation_metadata(&id("orders")).unwrap().field("placed_on").unwrap();
    assert_eq!(placed_on.database_type, "DATE");
    assert_eq!(placed_on.type_code, SqlType::Timestamp.code());
}

#[tokio::test]
async fn test_sqlite_schema_filter_ignored() {
    let source = setup().await;
    let model = MetadataFetcher::new(&source)
        .fetch_metadata(Some("main"), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(model.requested_schema(), Some("main"));
    assert_eq!(model.relation_count(), 5);
}

#[tokio::test]
async fn test_connect_source_sqlite_memory() {
    let source = connect_source("sqlite::memory:").await.expect("connect failed");
    assert_eq!(source.database_type(), DatabaseType::SQLite);

    let model = MetadataFetcher::new(&source)
        .fetch_metadata(None, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(model.relation_count(), 0);
    assert_eq!(model.dbms().name.as_deref(), Some("SQLite"));
}
