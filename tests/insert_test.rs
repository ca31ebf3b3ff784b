use std::sync::Arc;

use lontar::{
    Database, DatabaseError, DbIndex, Direction, MemoryStore, Row, SparseArray, SqlOutcome,
    TreeContext, Value, ValueRange,
};

async fn exec(db: &Database, sql: &str) -> Database {
    match db.execute(sql).await.unwrap() {
        SqlOutcome::Mutation(mutation) => db.commit(&mutation).await.unwrap(),
        SqlOutcome::Query(_) => panic!("expected a mutation for: {}", sql),
    }
}

async fn query(db: &Database, sql: &str) -> Vec<Row> {
    match db.execute(sql).await.unwrap() {
        SqlOutcome::Query(mut result) => result.all().await.unwrap(),
        SqlOutcome::Mutation(_) => panic!("expected a query for: {}", sql),
    }
}

async fn persons_db(store: Arc<MemoryStore>) -> Database {
    let db = Database::create(store);
    exec(
        &db,
        "CREATE TABLE Persons (PersonID int, LastName varchar(255), FirstName varchar(255), \
         Address varchar(255), City varchar(255))",
    )
    .await
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[tokio::test]
async fn test_insert_then_select_star() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let db = exec(
        &db,
        "INSERT INTO Persons VALUES (12, 'Rogers', 'Mikeal', '241 BVA', 'San Francisco')",
    )
    .await;

    let rows = query(&db, "SELECT * FROM Persons").await;
    assert_eq!(
        rows,
        vec![Row::new(vec![
            Value::Integer(12),
            text("Rogers"),
            text("Mikeal"),
            text("241 BVA"),
            text("San Francisco"),
        ])]
    );
}

#[tokio::test]
async fn test_partial_insert_pads_with_nulls() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let db = exec(&db, "INSERT INTO Persons VALUES (7, 'Short')").await;

    let rows = query(&db, "SELECT * FROM Persons").await;
    assert_eq!(
        rows,
        vec![Row::new(vec![
            Value::Integer(7),
            text("Short"),
            Value::Null,
            Value::Null,
            Value::Null,
        ])]
    );
}

#[tokio::test]
async fn test_insert_with_explicit_columns() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let db = exec(
        &db,
        "INSERT INTO Persons (FirstName, PersonID) VALUES ('Mikeal', 12)",
    )
    .await;

    let rows = query(&db, "SELECT * FROM Persons").await;
    assert_eq!(
        rows,
        vec![Row::new(vec![
            Value::Integer(12),
            Value::Null,
            text("Mikeal"),
            Value::Null,
            Value::Null,
        ])]
    );
}

#[tokio::test]
async fn test_multi_row_insert_is_one_snapshot() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let before = *db.root().unwrap();
    let db = exec(
        &db,
        "INSERT INTO Persons VALUES (1, 'A', 'a', 'x', 'y'), (2, 'B', 'b', 'x', 'y'), \
         (3, 'C', 'c', 'x', 'y')",
    )
    .await;

    assert_ne!(*db.root().unwrap(), before);
    let rows = query(&db, "SELECT * FROM Persons").await;
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_insert_arity_overflow_is_rejected() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let err = db
        .execute("INSERT INTO Persons VALUES (1, 'a', 'b', 'c', 'd', 'extra')")
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Constraint { .. }));
}

#[tokio::test]
async fn test_insert_type_mismatch_is_rejected() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let err = db
        .execute("INSERT INTO Persons VALUES ('twelve', 'Rogers')")
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_insert_overlong_string_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let db = Database::create(store);
    let db = exec(&db, "CREATE TABLE T (Name varchar(4))").await;
    let err = db
        .execute("INSERT INTO T VALUES ('too long')")
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Constraint { .. }));
}

#[tokio::test]
async fn test_insert_into_missing_table() {
    let db = Database::create(Arc::new(MemoryStore::new()));
    let err = db
        .execute("INSERT INTO Nothing VALUES (1)")
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::TableNotFound { .. }));
}

#[tokio::test]
async fn test_uncommitted_mutation_leaves_snapshot_unchanged() {
    let db = persons_db(Arc::new(MemoryStore::new())).await;
    let outcome = db
        .execute("INSERT INTO Persons VALUES (1, 'A', 'a', 'x', 'y')")
        .await
        .unwrap();
    // The mutation was produced but never committed.
    drop(outcome);

    let rows = query(&db, "SELECT * FROM Persons").await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_index_and_rows_stay_consistent() {
    let store = Arc::new(MemoryStore::new());
    let db = persons_db(store.clone()).await;
    let db = exec(
        &db,
        "INSERT INTO Persons VALUES (12, 'Rogers', 'Mikeal', '241 BVA', 'SF'), \
         (13, 'Rogers', 'NotMikeal', '241 BVA', 'SF')",
    )
    .await;

    let table = db.load_table("Persons").await.unwrap();
    let ctx = TreeContext::new(store);
    let rows = SparseArray::new(ctx.clone(), table.rows_root);

    // Every row value appears in its column's index under the row's id,
    // and every indexed id resolves to a stored row with that value.
    let mut cursor = rows.scan(Direction::Ascending).await.unwrap();
    let mut stored = Vec::new();
    while let Some(pair) = cursor.next().await.unwrap() {
        stored.push(pair);
    }
    assert_eq!(stored.len(), 2);

    for (column_position, column) in table.columns.iter().enumerate() {
        let index = DbIndex::new(ctx.clone(), column.index_root);
        for (row_id, row) in &stored {
            let value = row.values[column_position].clone();
            let mut found = index
                .range(ValueRange::Eq(value), Direction::Ascending)
                .await
                .unwrap();
            let mut ids = Vec::new();
            while let Some(id) = found.next().await.unwrap() {
                ids.push(id);
            }
            assert!(ids.contains(row_id));
        }

        let mut all = index
            .range(ValueRange::All, Direction::Ascending)
            .await
            .unwrap();
        let mut indexed = 0;
        while let Some(id) = all.next().await.unwrap() {
            assert!(rows.get(id).await.unwrap().is_some());
            indexed += 1;
        }
        assert_eq!(indexed, stored.len());
    }
}
