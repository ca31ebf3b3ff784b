//! Per-column index. A persistent set tree keyed by `(value, row_id)`,
//! ordered by the typed column value first and row id second. Range scans
//! stream row ids straight off the leaves and stop at the bound.

use std::ops::Bound;

use crate::storage::block::{Block, Cid};
use crate::storage::node::{LeafEntry, TreeKey};
use crate::storage::tree::{tree_insert, Direction, NodeSource, TreeContext, TreeCursor};
use crate::types::error::{DatabaseError, Result};
use crate::types::value::Value;
use crate::types::RowId;

/// Value-level predicate a range scan answers.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRange {
    All,
    Eq(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    Between {
        lo: Value,
        lo_inclusive: bool,
        hi: Value,
        hi_inclusive: bool,
    },
}

impl ValueRange {
    fn lower(&self) -> Bound<&Value> {
        match self {
            ValueRange::All | ValueRange::Lt(_) | ValueRange::Le(_) => Bound::Unbounded,
            ValueRange::Eq(v) | ValueRange::Ge(v) => Bound::Included(v),
            ValueRange::Gt(v) => Bound::Excluded(v),
            ValueRange::Between { lo, lo_inclusive, .. } => {
                if *lo_inclusive {
                    Bound::Included(lo)
                } else {
                    Bound::Excluded(lo)
                }
            }
        }
    }

    fn upper(&self) -> Bound<&Value> {
        match self {
            ValueRange::All | ValueRange::Gt(_) | ValueRange::Ge(_) => Bound::Unbounded,
            ValueRange::Eq(v) | ValueRange::Le(v) => Bound::Included(v),
            ValueRange::Lt(v) => Bound::Excluded(v),
            ValueRange::Between { hi, hi_inclusive, .. } => {
                if *hi_inclusive {
                    Bound::Included(hi)
                } else {
                    Bound::Excluded(hi)
                }
            }
        }
    }

    /// Null entries sort below every typed value, so typed predicates must
    /// never reach them. `All` is the one range that reads the whole set.
    fn is_typed(&self) -> bool {
        !matches!(self, ValueRange::All)
    }
}

pub struct DbIndex {
    source: NodeSource,
    root: Option<Cid>,
}

impl DbIndex {
    pub fn new(ctx: TreeContext, root: Option<Cid>) -> Self {
        Self {
            source: NodeSource::new(ctx),
            root,
        }
    }

    pub fn root(&self) -> Option<&Cid> {
        self.root.as_ref()
    }

    /// Adds the pair `(value, row_id)` to the set. Each row id enters an
    /// index exactly once, so the key cannot already exist.
    pub async fn insert(&mut self, value: Value, row_id: RowId) -> Result<Vec<Block>> {
        let (root, blocks) = tree_insert(
            &self.source,
            self.root.as_ref(),
            LeafEntry::Index { value, row_id },
        )
        .await?;
        self.root = Some(root);
        Ok(blocks)
    }

    /// Streams the row ids whose value satisfies `range`, in index order.
    /// Descending direction reverses the traversal for ORDER BY DESC.
    pub async fn range(&self, range: ValueRange, direction: Direction) -> Result<IndexCursor> {
        let start_key = match direction {
            Direction::Ascending => match range.lower() {
                Bound::Unbounded => {
                    if range.is_typed() {
                        // Skip past the null run at the bottom of the set.
                        Some((
                            TreeKey::Index {
                                value: Value::Null,
                                row_id: RowId::MAX,
                            },
                            false,
                        ))
                    } else {
                        None
                    }
                }
                Bound::Included(v) => Some((
                    TreeKey::Index {
                        value: v.clone(),
                        row_id: 0,
                    },
                    true,
                )),
                Bound::Excluded(v) => Some((
                    TreeKey::Index {
                        value: v.clone(),
                        row_id: RowId::MAX,
                    },
                    false,
                )),
            },
            Direction::Descending => match range.upper() {
                Bound::Unbounded => None,
                Bound::Included(v) => Some((
                    TreeKey::Index {
                        value: v.clone(),
                        row_id: RowId::MAX,
                    },
                    true,
                )),
                Bound::Excluded(v) => Some((
                    TreeKey::Index {
                        value: v.clone(),
                        row_id: 0,
                    },
                    false,
                )),
            },
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
        Ok(IndexCursor {
            cursor,
            range,
            direction,
            done: false,
        })
    }
}

pub struct IndexCursor {
    cursor: TreeCursor,
    range: ValueRange,
    direction: Direction,
    done: bool,
}

impl IndexCursor {
    pub async fn next(&mut self) -> Result<Option<RowId>> {
        if self.done {
            return Ok(None);
        }
        match self.cursor.next().await? {
            Some(LeafEntry::Index { value, row_id }) => {
                if self.past_bound(&value) {
                    self.done = true;
                    return Ok(None);
                }
                Ok(Some(row_id))
            }
            Some(LeafEntry::Row { .. }) => Err(DatabaseError::Corrupted {
                reason: "row entry in column index".to_string(),
            }),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Streamed entries arrive in key order, so the first value past the
    /// terminal bound ends the scan.
    fn past_bound(&self, value: &Value) -> bool {
        use std::cmp::Ordering;
        if value.is_null() {
            return self.range.is_typed();
        }
        let terminal = match self.direction {
            Direction::Ascending => self.range.upper(),
            Direction::Descending => self.range.lower(),
        };
        match (self.direction, terminal) {
            (_, Bound::Unbounded) => false,
            (Direction::Ascending, Bound::Included(v)) => {
                value.storage_cmp(v) == Ordering::Greater
            }
            (Direction::Ascending, Bound::Excluded(v)) => value.storage_cmp(v) != Ordering::Less,
            (Direction::Descending, Bound::Included(v)) => value.storage_cmp(v) == Ordering::Less,
            (Direction::Descending, Bound::Excluded(v)) => {
                value.storage_cmp(v) != Ordering::Greater
            }
        }
    }
}
