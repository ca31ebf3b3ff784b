use std::sync::Arc;

use lontar::{Database, DataType, DatabaseError, MemoryStore, SqlOutcome};

async fn exec(db: &Database, sql: &str) -> Database {
    match db.execute(sql).await.unwrap() {
        SqlOutcome::Mutation(mutation) => db.commit(&mutation).await.unwrap(),
        SqlOutcome::Query(_) => panic!("expected a mutation for: {}", sql),
    }
}

fn memory_db() -> Database {
    Database::create(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn test_create_persons_table() {
    let db = memory_db();
    let db = exec(
        &db,
        "CREATE TABLE Persons (PersonID int, LastName varchar(255), FirstName varchar(255), \
         Address varchar(255), City varchar(255))",
    )
    .await;

    assert_eq!(db.table_names(), vec!["Persons"]);
    assert!(db.root().is_some());

    let table = db.load_table("Persons").await.unwrap();
    assert!(table.rows_root.is_none());
    let names: Vec<&str> = table
        .columns
        .iter()
        .map(|c| c.schema.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["PersonID", "LastName", "FirstName", "Address", "City"]
    );
    assert_eq!(table.columns[0].schema.data_type, DataType::Integer);
    assert_eq!(table.columns[1].schema.data_type, DataType::Varchar(255));
    for column in &table.columns {
        assert!(column.index_root.is_none());
    }

    let schema = table.schema();
    assert_eq!(schema.column_count(), 5);
    assert_eq!(schema.column_index("City"), Some(4));
    assert_eq!(schema.column_index("city"), None);
    assert_eq!(schema.column(1).unwrap().name, "LastName");
    assert_eq!(schema.column_names(), names);
}

#[tokio::test]
async fn test_create_table_is_case_sensitive_on_columns() {
    let db = memory_db();
    let db = exec(&db, "CREATE TABLE T (Id int, id int)").await;
    let table = db.load_table("T").await.unwrap();
    assert_eq!(table.columns.len(), 2);
}

#[tokio::test]
async fn test_duplicate_table_is_rejected() {
    let db = memory_db();
    let db = exec(&db, "CREATE TABLE T (Id int)").await;
    let err = db.execute("CREATE TABLE T (Other int)").await.unwrap_err();
    assert!(matches!(err, DatabaseError::TableExists { .. }));
}

#[tokio::test]
async fn test_duplicate_column_is_rejected() {
    let db = memory_db();
    let err = db
        .execute("CREATE TABLE T (Id int, Id int)")
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::DuplicateColumn { .. }));
}

#[tokio::test]
async fn test_unsupported_column_type_is_rejected() {
    let db = memory_db();
    let err = db.execute("CREATE TABLE T (Id BLOB)").await.unwrap_err();
    assert!(matches!(err, DatabaseError::Parse { .. }));
}

#[tokio::test]
async fn test_create_two_tables() {
    let db = memory_db();
    let db = exec(&db, "CREATE TABLE A (Id int)").await;
    let db = exec(&db, "CREATE TABLE B (Name varchar(16))").await;
    assert_eq!(db.table_names(), vec!["A", "B"]);

    // The first table is still reachable from the newer root.
    let table = db.load_table("A").await.unwrap();
    assert_eq!(table.columns[0].schema.name, "Id");
}

#[tokio::test]
async fn test_malformed_sql_is_a_parse_error() {
    let db = memory_db();
    let err = db.execute("CREATE TABLE").await.unwrap_err();
    assert!(matches!(err, DatabaseError::Parse { .. }));
}
