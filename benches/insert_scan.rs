use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use lontar::{Database, MemoryStore, SqlOutcome};

async fn exec(db: &Database, sql: &str) -> Database {
    match db.execute(sql).await.unwrap() {
        SqlOutcome::Mutation(mutation) => db.commit(&mutation).await.unwrap(),
        SqlOutcome::Query(_) => unreachable!(),
    }
}

async fn populated_db(rows: usize) -> Database {
    let db = Database::create(Arc::new(MemoryStore::new()));
    let db = exec(&db, "CREATE TABLE T (ID int, Name varchar(32))").await;
    let values: Vec<String> = (0..rows).map(|i| format!("({}, 'name{}')", i, i)).collect();
    exec(&db, &format!("INSERT INTO T VALUES {}", values.join(", "))).await
}

fn bench_insert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("insert_200_rows", |b| {
        b.iter(|| rt.block_on(populated_db(200)))
    });
}

fn bench_range_select(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let db = rt.block_on(populated_db(1000));
    c.bench_function("range_select_over_1000_rows", |b| {
        b.iter(|| {
            rt.block_on(async {
                match db
                    .execute("SELECT * FROM T WHERE ID > 250 AND ID < 750")
                    .await
                    .unwrap()
                {
                    SqlOutcome::Query(mut result) => result.all().await.unwrap().len(),
                    SqlOutcome::Mutation(_) => unreachable!(),
                }
            })
        })
    });
}

criterion_group!(benches, bench_insert, bench_range_select);
criterion_main!(benches);
