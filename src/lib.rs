//! lontar is an embeddable relational database whose entire state lives in
//! an immutable, content-addressed block DAG. Every statement is a pure
//! function from a snapshot to either a row stream or the blocks of a
//! successor snapshot; committing a mutation publishes a new root cid and
//! leaves every earlier root readable forever.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lontar::{Database, MemoryStore, SqlOutcome};
//!
//! # async fn demo() -> lontar::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let db = Database::create(store);
//! let db = match db.execute("CREATE TABLE Persons (PersonID INT, LastName VARCHAR(255))").await? {
//!     SqlOutcome::Mutation(m) => db.commit(&m).await?,
//!     SqlOutcome::Query(_) => unreachable!(),
//! };
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod planner;
pub mod storage;
pub mod types;

pub use executor::select::QueryResult;
pub use planner::ast::Statement;
pub use storage::block::{Block, Cid};
pub use storage::cache::NodeCache;
pub use storage::chunker::{Chunker, HashChunker};
pub use storage::database::{Database, DatabaseOptions, Mutation, SqlOutcome};
pub use storage::db_index::{DbIndex, IndexCursor, ValueRange};
pub use storage::schema::{ColumnSchema, TableSchema};
pub use storage::sparse_array::{RowCursor, SparseArray};
pub use storage::store::{BlockStore, DirectoryStore, MemoryStore};
pub use storage::table::Table;
pub use storage::tree::{Direction, TreeContext};
pub use types::error::{DatabaseError, Result};
pub use types::row::Row;
pub use types::value::{DataType, Value};
pub use types::RowId;
