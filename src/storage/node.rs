use std::cmp::Ordering;

use crate::storage::block::Cid;
use crate::types::error::{DatabaseError, Result};
use crate::types::row::Row;
use crate::types::value::Value;
use crate::types::RowId;

/// Key of a tree entry. The row store is keyed by row id alone; a column
/// index is keyed by the column value with the row id as tie break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeKey {
    Row(RowId),
    Index { value: Value, row_id: RowId },
}

impl TreeKey {
    /// Ordering within one tree. Keys of different shapes never share a
    /// tree, so a mixed comparison means a decoded block was wired into the
    /// wrong structure.
    pub fn cmp_key(&self, other: &TreeKey) -> Result<Ordering> {
        match (self, other) {
            (TreeKey::Row(a), TreeKey::Row(b)) => Ok(a.cmp(b)),
            (
                TreeKey::Index { value: av, row_id: ar },
                TreeKey::Index { value: bv, row_id: br },
            ) => Ok(av.storage_cmp(bv).then(ar.cmp(br))),
            _ => Err(DatabaseError::Corrupted {
                reason: "mixed key kinds in one tree".to_string(),
            }),
        }
    }
}

/// Entry stored at a leaf. Row entries carry the tuple; index entries are
/// keys only, the set membership itself is the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafEntry {
    Row { row_id: RowId, row: Row },
    Index { value: Value, row_id: RowId },
}

impl LeafEntry {
    pub fn key(&self) -> TreeKey {
        match self {
            LeafEntry::Row { row_id, .. } => TreeKey::Row(*row_id),
            LeafEntry::Index { value, row_id } => TreeKey::Index {
                value: value.clone(),
                row_id: *row_id,
            },
        }
    }
}

/// Branch pointer. `key` is the greatest key in the child's subtree, so a
/// child covers the keys greater than the previous separator and up to and
/// including its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    pub key: TreeKey,
    pub child: Cid,
}

/// A tree node, one per block. The root is a leaf while the whole tree fits
/// in a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Vec<LeafEntry>),
    Branch(Vec<BranchEntry>),
}

impl Node {
    /// Greatest key in this node. Nodes are never empty, a chunk always
    /// holds at least one entry.
    pub fn last_key(&self) -> Result<TreeKey> {
        match self {
            Node::Leaf(entries) => entries
                .last()
                .map(LeafEntry::key)
                .ok_or_else(|| DatabaseError::Corrupted {
                    reason: "empty leaf node".to_string(),
                }),
            Node::Branch(entries) => entries
                .last()
                .map(|e| e.key.clone())
                .ok_or_else(|| DatabaseError::Corrupted {
                    reason: "empty branch node".to_string(),
                }),
        }
    }
}
