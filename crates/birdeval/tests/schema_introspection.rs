mod support;

use birdeval::schema::{ExampleRow, IntrospectionError, describe};
use birdeval::sqlite::{CatalogError, DatabaseCatalog};

use support::{TOY_DB, create_database, toy_catalog, unique_temp_dir};

#[test]
fn describes_columns_keys_and_example_rows() {
    let catalog = toy_catalog("birdeval-schema-toy");
    let schema = describe(&catalog, TOY_DB).expect("toy schema should describe");

    assert_eq!(schema.db_id, TOY_DB);
    assert_eq!(
        schema
            .tables
            .iter()
            .map(|table| table.name.as_str())
            .collect::<Vec<_>>(),
        vec!["t", "pets"]
    );

    let pets = schema.table("pets").expect("pets table");
    let species = pets
        .columns
        .iter()
        .find(|column| column.name == "species")
        .expect("species column");
    assert_eq!(species.default_value.as_deref(), Some("'cat'"));
    assert_eq!(pets.foreign_keys.len(), 1);
    assert_eq!(pets.foreign_keys[0].ref_table, "t");

    insta::assert_snapshot!(schema.to_string(), @r"
    Table: t
      - id: INTEGER (PRIMARY KEY)
      - name: TEXT NOT NULL
      Example row:
        id: 1
        name: ada

    Table: pets
      - pet_id: INTEGER (PRIMARY KEY)
      - owner_id: INTEGER
      - species: TEXT DEFAULT 'cat'
      Foreign Keys:
        - owner_id -> t.id
      Example row:
        pet_id: 10
        owner_id: 1
        species: dog
    ");
}

#[test]
fn empty_tables_get_the_no_data_marker() {
    let root = unique_temp_dir("birdeval-schema-empty-table");
    create_database(
        &root,
        "shop",
        "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, total REAL);",
    );

    let schema = describe(&DatabaseCatalog::new(root), "shop").expect("schema should describe");
    assert_eq!(schema.tables[0].example_row, ExampleRow::NoData);
    assert!(
        schema
            .to_string()
            .contains("  Example row: No data available")
    );
}

#[test]
fn empty_database_yields_empty_description() {
    let root = unique_temp_dir("birdeval-schema-empty-db");
    create_database(&root, "blank", "PRAGMA user_version = 1;");

    let schema = describe(&DatabaseCatalog::new(root), "blank").expect("empty db should describe");
    assert!(schema.is_empty());
    assert_eq!(schema.to_string(), "");
}

#[test]
fn internal_tables_are_excluded_and_odd_names_are_quoted() {
    let root = unique_temp_dir("birdeval-schema-internal");
    create_database(
        &root,
        "odd",
        r#"
        CREATE TABLE "order" (id INTEGER PRIMARY KEY AUTOINCREMENT, "select" TEXT);
        INSERT INTO "order" ("select") VALUES ('keyword');
        CREATE TABLE "it's" (value TEXT);
        "#,
    );

    let schema = describe(&DatabaseCatalog::new(root), "odd").expect("schema should describe");
    let names = schema
        .tables
        .iter()
        .map(|table| table.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["order", "it's"]);
    assert_eq!(
        schema.tables[0].example_row,
        ExampleRow::Row(vec![
            ("id".to_string(), "1".to_string()),
            ("select".to_string(), "keyword".to_string()),
        ])
    );
}

#[test]
fn null_example_values_render_as_none() {
    let root = unique_temp_dir("birdeval-schema-null");
    create_database(
        &root,
        "nulls",
        "CREATE TABLE readings (id INTEGER, value REAL); INSERT INTO readings VALUES (1, NULL);",
    );

    let schema = describe(&DatabaseCatalog::new(root), "nulls").expect("schema should describe");
    assert!(schema.to_string().contains("    value: None"));
}

#[test]
fn missing_database_is_an_error_without_partial_output() {
    let catalog = DatabaseCatalog::new(unique_temp_dir("birdeval-schema-missing"));
    let error = describe(&catalog, "ghost").expect_err("missing database must fail");

    assert!(
        matches!(error, IntrospectionError::Catalog(CatalogError::Open { .. })),
        "unexpected error: {error:?}"
    );
}

#[test]
fn path_like_database_ids_are_rejected() {
    let catalog = toy_catalog("birdeval-schema-traversal");
    let error = describe(&catalog, "../toy").expect_err("traversal must fail");

    assert!(matches!(
        error,
        IntrospectionError::Catalog(CatalogError::InvalidDatabaseId(_))
    ));
}
