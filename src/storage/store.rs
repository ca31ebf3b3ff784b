use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::storage::block::{Block, Cid};
use crate::types::error::{DatabaseError, Result};

/// Content-addressed block storage. Durability is the store's concern; the
/// database core only relies on `get` returning exactly what `put` saw.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Fetches a block, failing with `NotFound` if it is absent.
    async fn get(&self, cid: &Cid) -> Result<Block>;

    /// Persists a block. Idempotent by cid.
    async fn put(&self, block: Block) -> Result<()>;
}

/// In-memory store, the default for tests and the REPL.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<HashMap<Cid, Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn get(&self, cid: &Cid) -> Result<Block> {
        self.blocks
            .lock()
            .get(cid)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound { cid: cid.to_hex() })
    }

    async fn put(&self, block: Block) -> Result<()> {
        self.blocks.lock().entry(*block.cid()).or_insert(block);
        Ok(())
    }
}

/// File-backed store keeping one file per block under a directory, named by
/// the block's hex cid. The current root cid is tracked in a `ROOT` file so
/// a session can be resumed.
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        self.dir.join(cid.to_hex())
    }

    fn root_path(&self) -> PathBuf {
        self.dir.join("ROOT")
    }

    /// Records `cid` as the current database root.
    pub async fn write_root(&self, cid: &Cid) -> Result<()> {
        tokio::fs::write(self.root_path(), cid.to_hex()).await?;
        Ok(())
    }

    /// Reads the recorded root, if a session has committed one.
    pub async fn read_root(&self) -> Result<Option<Cid>> {
        match tokio::fs::read_to_string(self.root_path()).await {
            Ok(text) => Ok(Cid::parse_hex(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlockStore for DirectoryStore {
    async fn get(&self, cid: &Cid) -> Result<Block> {
        match tokio::fs::read(self.block_path(cid)).await {
            Ok(bytes) => {
                let block = Block::new(bytes);
                if block.cid() != cid {
                    return Err(DatabaseError::Corrupted {
                        reason: format!("block file {} does not hash to its name", cid),
                    });
                }
                Ok(block)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DatabaseError::NotFound { cid: cid.to_hex() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, block: Block) -> Result<()> {
        let path = self.block_path(block.cid());
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }
        tokio::fs::write(path, block.bytes()).await?;
        Ok(())
    }
}
