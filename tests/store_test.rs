use std::sync::Arc;

use lontar::{
    Block, BlockStore, Database, DatabaseError, DatabaseOptions, DirectoryStore, HashChunker,
    MemoryStore, NodeCache, SqlOutcome,
};

async fn exec(db: &Database, sql: &str) -> Database {
    match db.execute(sql).await.unwrap() {
        SqlOutcome::Mutation(mutation) => db.commit(&mutation).await.unwrap(),
        SqlOutcome::Query(_) => panic!("expected a mutation for: {}", sql),
    }
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    let block = Block::new(b"hello".to_vec());
    let cid = *block.cid();

    store.put(block.clone()).await.unwrap();
    let fetched = store.get(&cid).await.unwrap();
    assert_eq!(fetched.bytes(), b"hello");

    // Idempotent by cid.
    store.put(block).await.unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_memory_store_miss_is_not_found() {
    let store = MemoryStore::new();
    let absent = *Block::new(b"absent".to_vec()).cid();
    let err = store.get(&absent).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { .. }));
}

#[tokio::test]
async fn test_same_bytes_same_cid() {
    let a = Block::new(b"payload".to_vec());
    let b = Block::new(b"payload".to_vec());
    let c = Block::new(b"other".to_vec());
    assert_eq!(a.cid(), b.cid());
    assert_ne!(a.cid(), c.cid());
}

#[tokio::test]
async fn test_directory_store_persists_blocks_and_root() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(DirectoryStore::open(dir.path()).await.unwrap());
        let db = Database::create(store.clone());
        let db = exec(&db, "CREATE TABLE T (ID int)").await;
        let db = exec(&db, "INSERT INTO T VALUES (1), (2), (3)").await;
        store.write_root(db.root().unwrap()).await.unwrap();
    }

    // A fresh handle over the same directory sees the committed snapshot.
    let store = Arc::new(DirectoryStore::open(dir.path()).await.unwrap());
    let root = store.read_root().await.unwrap().unwrap();
    let db = Database::from(store, root).await.unwrap();
    assert_eq!(db.table_names(), vec!["T"]);

    match db.execute("SELECT * FROM T").await.unwrap() {
        SqlOutcome::Query(mut result) => {
            assert_eq!(result.all().await.unwrap().len(), 3);
        }
        SqlOutcome::Mutation(_) => panic!("expected query"),
    }
}

#[tokio::test]
async fn test_directory_store_miss_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::open(dir.path()).await.unwrap();
    let absent = *Block::new(b"absent".to_vec()).cid();
    let err = store.get(&absent).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { .. }));
    assert!(store.read_root().await.unwrap().is_none());
}

#[tokio::test]
async fn test_node_cache_keeps_results_identical() {
    let statements = [
        "CREATE TABLE T (ID int, Name varchar(32))",
        "INSERT INTO T VALUES (1, 'a'), (2, 'b'), (3, 'c')",
    ];

    let plain = {
        let mut db = Database::create(Arc::new(MemoryStore::new()));
        for sql in statements {
            db = exec(&db, sql).await;
        }
        db
    };

    let cache = Arc::new(NodeCache::new(64));
    let cached = {
        let options = DatabaseOptions {
            cache: Some(cache.clone()),
            chunker: Arc::new(HashChunker::default()),
        };
        let mut db =
            Database::create_with_options(Arc::new(MemoryStore::new()), options);
        for sql in statements {
            db = exec(&db, sql).await;
        }
        db
    };

    assert_eq!(plain.root().unwrap(), cached.root().unwrap());
    assert!(!cache.is_empty());
}

#[test]
fn test_node_cache_evicts_at_capacity() {
    let cache = NodeCache::new(2);
    let nodes: Vec<(lontar::Cid, lontar::storage::node::Node)> = (0..3u8)
        .map(|i| {
            let block = Block::new(vec![i]);
            (*block.cid(), lontar::storage::node::Node::Leaf(Vec::new()))
        })
        .collect();

    for (cid, node) in &nodes {
        cache.insert(*cid, node.clone());
    }
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&nodes[0].0).is_none());
    assert!(cache.get(&nodes[2].0).is_some());
}
