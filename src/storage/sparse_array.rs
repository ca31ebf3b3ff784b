//! Row store. A persistent tree keyed by row id, holding one encoded tuple
//! per entry. Row ids are assigned in insertion order and never reused, so
//! inserts always append past the greatest existing key.

use std::ops::{Bound, RangeBounds};

use crate::storage::block::{Block, Cid};
use crate::storage::node::{LeafEntry, TreeKey};
use crate::storage::tree::{self, Direction, NodeSource, TreeContext, TreeCursor};
use crate::types::error::{DatabaseError, Result};
use crate::types::row::Row;
use crate::types::RowId;

/// Handle over one row tree root. Mutations stage their new nodes in the
/// handle, so a statement can keep reading its own writes before anything
/// is persisted.
pub struct SparseArray {
    source: NodeSource,
    root: Option<Cid>,
}

impl SparseArray {
    pub fn new(ctx: TreeContext, root: Option<Cid>) -> Self {
        Self {
            source: NodeSource::new(ctx),
            root,
        }
    }

    pub fn root(&self) -> Option<&Cid> {
        self.root.as_ref()
    }

    pub async fn get(&self, row_id: RowId) -> Result<Option<Row>> {
        match tree::tree_get(&self.source, self.root.as_ref(), &TreeKey::Row(row_id)).await? {
            Some(LeafEntry::Row { row, .. }) => Ok(Some(row)),
            Some(LeafEntry::Index { .. }) => Err(DatabaseError::Corrupted {
                reason: "index entry in row store".to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Greatest assigned row id, if any row exists.
    pub async fn max_row_id(&self) -> Result<Option<RowId>> {
        match tree::tree_last_entry(&self.source, self.root.as_ref()).await? {
            Some(LeafEntry::Row { row_id, .. }) => Ok(Some(row_id)),
            Some(LeafEntry::Index { .. }) => Err(DatabaseError::Corrupted {
                reason: "index entry in row store".to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Appends a row under `row_id`, which must be greater than every
    /// existing key. Returns the blocks produced by the walk and moves this
    /// handle to the new root.
    pub async fn insert(&mut self, row_id: RowId, row: Row) -> Result<Vec<Block>> {
        if let Some(max) = self.max_row_id().await? {
            if row_id <= max {
                return Err(DatabaseError::Corrupted {
                    reason: format!("row id {} not past current maximum {}", row_id, max),
                });
            }
        }
        let (root, blocks) = tree::tree_insert(
            &self.source,
            self.root.as_ref(),
            LeafEntry::Row { row_id, row },
        )
        .await?;
        self.root = Some(root);
        Ok(blocks)
    }

    /// Streams every `(row_id, row)` pair in the requested direction.
    pub async fn scan(&self, direction: Direction) -> Result<RowCursor> {
        self.scan_range(.., direction).await
    }

    /// Streams the pairs whose row id falls in `range`.
    pub async fn scan_range<R: RangeBounds<RowId>>(
        &self,
        range: R,
        direction: Direction,
    ) -> Result<RowCursor> {
        let (start, terminal) = match direction {
            Direction::Ascending => (range.start_bound().cloned(), range.end_bound().cloned()),
            Direction::Descending => (range.end_bound().cloned(), range.start_bound().cloned()),
        };
        let start_key = match start {
            Bound::Unbounded => None,
            Bound::Included(id) => Some((TreeKey::Row(id), true)),
            Bound::Excluded(id) => Some((TreeKey::Row(id), false)),
        };
        let cursor = match &start_key {
            Some((key, inclusive)) => {
                let bound = if *inclusive {
                    Bound::Included(key)
                } else {
                    Bound::Excluded(key)
                };
                TreeCursor::seek(self.source.clone(), self.root.as_ref(), bound, direction).await?
            }
            None => {
                TreeCursor::seek(
                    self.source.clone(),
                    self.root.as_ref(),
                    Bound::Unbounded,
                    direction,
                )
                .await?
            }
        };
        Ok(RowCursor {
            cursor,
            terminal,
            direction,
            done: false,
        })
    }
}

pub struct RowCursor {
    cursor: TreeCursor,
    /// Far end of the requested range in the scan direction.
    terminal: Bound<RowId>,
    direction: Direction,
    done: bool,
}

impl RowCursor {
    pub async fn next(&mut self) -> Result<Option<(RowId, Row)>> {
        if self.done {
            return Ok(None);
        }
        match self.cursor.next().await? {
            Some(LeafEntry::Row { row_id, row }) => {
                if self.past_bound(row_id) {
                    self.done = true;
                    return Ok(None);
                }
                Ok(Some((row_id, row)))
            }
            Some(LeafEntry::Index { .. }) => Err(DatabaseError::Corrupted {
                reason: "index entry in row store".to_string(),
            }),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    fn past_bound(&self, row_id: RowId) -> bool {
        match (self.direction, &self.terminal) {
            (_, Bound::Unbounded) => false,
            (Direction::Ascending, Bound::Included(hi)) => row_id > *hi,
            (Direction::Ascending, Bound::Excluded(hi)) => row_id >= *hi,
            (Direction::Descending, Bound::Included(lo)) => row_id < *lo,
            (Direction::Descending, Bound::Excluded(lo)) => row_id <= *lo,
        }
    }
}
