use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::executor;
use crate::executor::select::QueryResult;
use crate::planner::ast::Statement;
use crate::planner::parser;
use crate::storage::block::{Block, Cid};
use crate::storage::cache::NodeCache;
use crate::storage::chunker::{Chunker, HashChunker};
use crate::storage::codec;
use crate::storage::store::BlockStore;
use crate::storage::table::Table;
use crate::storage::tree::TreeContext;
use crate::types::error::{DatabaseError, Result};

/// Tunables of a database handle. The chunker decides where trees split;
/// the cache keeps decoded nodes across statements.
#[derive(Clone)]
pub struct DatabaseOptions {
    pub cache: Option<Arc<NodeCache>>,
    pub chunker: Arc<dyn Chunker>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            cache: None,
            chunker: Arc::new(HashChunker::default()),
        }
    }
}

/// The blocks a completed statement produced, children before parents. The
/// final block is the new database root; its cid names the post-mutation
/// snapshot. Nothing is persisted until the consumer puts the blocks.
pub struct Mutation {
    pub root: Cid,
    pub blocks: Vec<Block>,
}

/// Result of one SQL statement.
pub enum SqlOutcome {
    Mutation(Mutation),
    Query(QueryResult),
}

impl std::fmt::Debug for SqlOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlOutcome::Mutation(m) => write!(f, "Mutation(root: {:?})", m.root),
            SqlOutcome::Query(q) => write!(f, "Query(columns: {:?})", q.columns),
        }
    }
}

/// Immutable snapshot of the whole database: a mapping from table name to
/// table block. Statements never modify a `Database`; they return the
/// blocks of a successor snapshot instead.
pub struct Database {
    ctx: TreeContext,
    tables: BTreeMap<String, Cid>,
    root: Option<Cid>,
}

impl Database {
    /// Fresh empty database over `store`.
    pub fn create(store: Arc<dyn BlockStore>) -> Self {
        Self::create_with_options(store, DatabaseOptions::default())
    }

    pub fn create_with_options(store: Arc<dyn BlockStore>, options: DatabaseOptions) -> Self {
        Self {
            ctx: TreeContext {
                store,
                cache: options.cache,
                chunker: options.chunker,
            },
            tables: BTreeMap::new(),
            root: None,
        }
    }

    /// Opens the snapshot named by `cid`. Table headers are resolved lazily
    /// when a statement touches them.
    pub async fn from(store: Arc<dyn BlockStore>, cid: Cid) -> Result<Self> {
        Self::from_with_options(store, cid, DatabaseOptions::default()).await
    }

    pub async fn from_with_options(
        store: Arc<dyn BlockStore>,
        cid: Cid,
        options: DatabaseOptions,
    ) -> Result<Self> {
        let block = store.get(&cid).await?;
        let tables = codec::decode_database(block.bytes())?;
        Ok(Self {
            ctx: TreeContext {
                store,
                cache: options.cache,
                chunker: options.chunker,
            },
            tables,
            root: Some(cid),
        })
    }

    /// Root cid of this snapshot. `None` until the first committed
    /// mutation, since an empty database has nothing to address.
    pub fn root(&self) -> Option<&Cid> {
        self.root.as_ref()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub(crate) fn ctx(&self) -> &TreeContext {
        &self.ctx
    }

    /// Row count of one table, by walking its row tree.
    pub async fn table_row_count(&self, name: &str) -> Result<u64> {
        let table = self.load_table(name).await?;
        table.row_count(&self.ctx).await
    }

    pub async fn load_table(&self, name: &str) -> Result<Table> {
        let cid = self
            .tables
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: name.to_string(),
            })?;
        let block = self.ctx.store.get(cid).await?;
        codec::decode_table(block.bytes())
    }

    /// Runs one statement against this snapshot. DDL and DML return the
    /// blocks of the successor snapshot; SELECT returns a lazy row stream.
    pub async fn execute(&self, sql: &str) -> Result<SqlOutcome> {
        let statement = parser::parse_statement(sql)?;
        match statement {
            Statement::CreateTable(stmt) => {
                debug!(table = %stmt.name, "create table");
                let mutation = executor::create_table::execute(self, stmt).await?;
                Ok(SqlOutcome::Mutation(mutation))
            }
            Statement::Insert(stmt) => {
                debug!(table = %stmt.table, rows = stmt.rows.len(), "insert");
                let mutation = executor::insert::execute(self, stmt).await?;
                Ok(SqlOutcome::Mutation(mutation))
            }
            Statement::Select(stmt) => {
                debug!(table = %stmt.table, "select");
                let result = executor::select::execute(self, stmt).await?;
                Ok(SqlOutcome::Query(result))
            }
        }
    }

    /// Persists a mutation's blocks and reopens the database at its root.
    /// Publication is atomic in the sense that readers either hold the old
    /// snapshot or open the new cid.
    pub async fn commit(&self, mutation: &Mutation) -> Result<Database> {
        for block in &mutation.blocks {
            self.ctx.store.put(block.clone()).await?;
        }
        debug!(root = %mutation.root, blocks = mutation.blocks.len(), "commit");
        let block = self.ctx.store.get(&mutation.root).await?;
        let tables = codec::decode_database(block.bytes())?;
        Ok(Self {
            ctx: self.ctx.clone(),
            tables,
            root: Some(mutation.root),
        })
    }

    /// Finishes a mutation: swaps `table` into the mapping, encodes the new
    /// database root after the table block, and drops duplicate blocks
    /// while keeping the child-before-parent order.
    pub(crate) fn finish_mutation(&self, table: Table, mut blocks: Vec<Block>) -> Mutation {
        let table_block = table.encode();
        let mut tables = self.tables.clone();
        tables.insert(table.name.clone(), *table_block.cid());
        blocks.push(table_block);

        let root_block = Block::new(codec::encode_database(&tables));
        let root = *root_block.cid();
        blocks.push(root_block);

        let mut seen = HashSet::new();
        blocks.retain(|block| seen.insert(*block.cid()));
        Mutation { root, blocks }
    }
}
