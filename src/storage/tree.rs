//! Shared machinery for the persistent trees. Both the row store and the
//! column indexes are sorted trees of immutable nodes addressed by cid. A
//! mutation walks from the covering leaf back to the root, re-chunking each
//! touched level and emitting one new block per produced node, children
//! before parents.
//!
//! Emitted blocks are not written to the store here. Each tree handle keeps
//! the nodes it produced in a staging overlay, so later walks inside the
//! same statement can read them; persisting the blocks is the caller's
//! decision at commit time.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::block::{Block, Cid};
use crate::storage::cache::NodeCache;
use crate::storage::chunker::Chunker;
use crate::storage::codec;
use crate::storage::node::{BranchEntry, LeafEntry, Node, TreeKey};
use crate::storage::store::BlockStore;
use crate::types::error::{DatabaseError, Result};

/// Collaborators every tree walk needs: the block store, the optional node
/// cache, and the split predicate.
#[derive(Clone)]
pub struct TreeContext {
    pub store: Arc<dyn BlockStore>,
    pub cache: Option<Arc<NodeCache>>,
    pub chunker: Arc<dyn Chunker>,
}

impl TreeContext {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            store,
            cache: None,
            chunker: Arc::new(crate::storage::chunker::HashChunker::default()),
        }
    }
}

/// One tree handle's view of the block space: nodes staged by its own
/// mutations first, then the shared cache, then the store.
#[derive(Clone)]
pub(crate) struct NodeSource {
    ctx: TreeContext,
    staged: Arc<Mutex<HashMap<Cid, Node>>>,
}

impl NodeSource {
    pub(crate) fn new(ctx: TreeContext) -> Self {
        Self {
            ctx,
            staged: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn chunker(&self) -> &dyn Chunker {
        self.ctx.chunker.as_ref()
    }

    async fn load(&self, cid: &Cid) -> Result<Node> {
        if let Some(node) = self.staged.lock().get(cid) {
            return Ok(node.clone());
        }
        if let Some(cache) = &self.ctx.cache {
            if let Some(node) = cache.get(cid) {
                return Ok(node);
            }
        }
        let block = self.ctx.store.get(cid).await?;
        let node = codec::decode_node(block.bytes())?;
        if let Some(cache) = &self.ctx.cache {
            cache.insert(*cid, node.clone());
        }
        Ok(node)
    }

    fn stage(&self, cid: Cid, node: Node) {
        if let Some(cache) = &self.ctx.cache {
            cache.insert(cid, node.clone());
        }
        self.staged.lock().insert(cid, node);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

// --------------------------------------------------------------- chunking

/// Partitions sorted entries into consecutive nodes, closing a node right
/// after each boundary key. The trailing run may close without a boundary.
fn split_at_boundaries<E>(
    chunker: &dyn Chunker,
    level: u32,
    entries: Vec<E>,
    key_of: impl Fn(&E) -> TreeKey,
) -> Vec<Vec<E>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for entry in entries {
        let boundary = chunker.is_boundary(level, &codec::key_bytes(&key_of(&entry)));
        current.push(entry);
        if boundary {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn emit_node(source: &NodeSource, node: Node, blocks: &mut Vec<Block>) -> Result<BranchEntry> {
    let key = node.last_key()?;
    let block = Block::new(codec::encode_node(&node));
    let cid = *block.cid();
    source.stage(cid, node);
    blocks.push(block);
    Ok(BranchEntry { key, child: cid })
}

fn rebuild_leaf_level(
    source: &NodeSource,
    entries: Vec<LeafEntry>,
    blocks: &mut Vec<Block>,
) -> Result<Vec<BranchEntry>> {
    split_at_boundaries(source.chunker(), 0, entries, LeafEntry::key)
        .into_iter()
        .map(|chunk| emit_node(source, Node::Leaf(chunk), blocks))
        .collect()
}

fn rebuild_branch_level(
    source: &NodeSource,
    level: u32,
    entries: Vec<BranchEntry>,
    blocks: &mut Vec<Block>,
) -> Result<Vec<BranchEntry>> {
    split_at_boundaries(source.chunker(), level, entries, |e| e.key.clone())
        .into_iter()
        .map(|chunk| emit_node(source, Node::Branch(chunk), blocks))
        .collect()
}

/// Builds branch levels over `entries` until a single node remains, and
/// returns its cid as the new root.
fn collapse_to_root(
    source: &NodeSource,
    mut entries: Vec<BranchEntry>,
    mut level: u32,
    blocks: &mut Vec<Block>,
) -> Result<Cid> {
    while entries.len() > 1 {
        level += 1;
        entries = rebuild_branch_level(source, level, entries, blocks)?;
    }
    match entries.pop() {
        Some(entry) => Ok(entry.child),
        None => Err(DatabaseError::Corrupted {
            reason: "tree rebuild produced no nodes".to_string(),
        }),
    }
}

// ---------------------------------------------------------------- lookups

/// Child covering `key` for insertion. Keys beyond the last separator fall
/// into the rightmost child, whose separator then grows.
fn covering_child(entries: &[BranchEntry], key: &TreeKey) -> Result<usize> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.key.cmp_key(key)? != Ordering::Less {
            return Ok(i);
        }
    }
    Ok(entries.len() - 1)
}

fn insert_position(entries: &[LeafEntry], key: &TreeKey) -> Result<usize> {
    for (i, entry) in entries.iter().enumerate() {
        match entry.key().cmp_key(key)? {
            Ordering::Less => continue,
            Ordering::Greater => return Ok(i),
            Ordering::Equal => {
                return Err(DatabaseError::Corrupted {
                    reason: "duplicate tree key".to_string(),
                })
            }
        }
    }
    Ok(entries.len())
}

/// Point lookup.
pub(crate) async fn tree_get(
    source: &NodeSource,
    root: Option<&Cid>,
    key: &TreeKey,
) -> Result<Option<LeafEntry>> {
    let Some(root) = root else {
        return Ok(None);
    };
    let mut node = source.load(root).await?;
    loop {
        match node {
            Node::Branch(entries) => {
                let mut child = None;
                for entry in &entries {
                    if entry.key.cmp_key(key)? != Ordering::Less {
                        child = Some(entry.child);
                        break;
                    }
                }
                let Some(child) = child else {
                    return Ok(None);
                };
                node = source.load(&child).await?;
            }
            Node::Leaf(entries) => {
                for entry in entries {
                    match entry.key().cmp_key(key)? {
                        Ordering::Less => continue,
                        Ordering::Equal => return Ok(Some(entry)),
                        Ordering::Greater => return Ok(None),
                    }
                }
                return Ok(None);
            }
        }
    }
}

/// Greatest entry in the tree, if any.
pub(crate) async fn tree_last_entry(
    source: &NodeSource,
    root: Option<&Cid>,
) -> Result<Option<LeafEntry>> {
    let mut cursor =
        TreeCursor::seek(source.clone(), root, Bound::Unbounded, Direction::Descending).await?;
    cursor.next().await
}

// --------------------------------------------------------------- mutation

/// Inserts one entry and returns the new root along with every block the
/// walk produced, children before parents. Old nodes stay valid under the
/// old root.
pub(crate) async fn tree_insert(
    source: &NodeSource,
    root: Option<&Cid>,
    entry: LeafEntry,
) -> Result<(Cid, Vec<Block>)> {
    let key = entry.key();
    let mut blocks = Vec::new();

    let Some(root) = root else {
        let level = rebuild_leaf_level(source, vec![entry], &mut blocks)?;
        let root = collapse_to_root(source, level, 0, &mut blocks)?;
        return Ok((root, blocks));
    };

    // Walk down to the leaf whose range covers the key, remembering the
    // branch entries and chosen child at every level.
    let mut path: Vec<(Vec<BranchEntry>, usize)> = Vec::new();
    let mut node = source.load(root).await?;
    let mut leaf_entries = loop {
        match node {
            Node::Branch(entries) => {
                if entries.is_empty() {
                    return Err(DatabaseError::Corrupted {
                        reason: "empty branch node".to_string(),
                    });
                }
                let child_index = covering_child(&entries, &key)?;
                let child = entries[child_index].child;
                path.push((entries, child_index));
                node = source.load(&child).await?;
            }
            Node::Leaf(entries) => break entries,
        }
    };

    let position = insert_position(&leaf_entries, &key)?;
    leaf_entries.insert(position, entry);
    let mut replacements = rebuild_leaf_level(source, leaf_entries, &mut blocks)?;

    // Walk back up, splicing the rebuilt child run into each branch and
    // re-chunking that level in turn.
    let mut level = 0;
    while let Some((mut branch_entries, child_index)) = path.pop() {
        level += 1;
        branch_entries.splice(child_index..child_index + 1, replacements);
        replacements = rebuild_branch_level(source, level, branch_entries, &mut blocks)?;
    }

    let root = collapse_to_root(source, replacements, level, &mut blocks)?;
    Ok((root, blocks))
}

// ---------------------------------------------------------------- cursors

struct Frame {
    entries: Vec<BranchEntry>,
    index: usize,
}

/// Pull-driven tree iterator. Holds its position as a stack of branch
/// frames plus an offset in the current leaf; each `next` may fetch blocks,
/// and dropping the cursor abandons the walk with no side effects.
pub(crate) struct TreeCursor {
    source: NodeSource,
    stack: Vec<Frame>,
    leaf: Vec<LeafEntry>,
    next_index: Option<usize>,
    direction: Direction,
    exhausted: bool,
}

impl TreeCursor {
    /// Positions a cursor at the first entry at or past `start` in the scan
    /// direction. For descending scans `start` is the upper end.
    pub(crate) async fn seek(
        source: NodeSource,
        root: Option<&Cid>,
        start: Bound<&TreeKey>,
        direction: Direction,
    ) -> Result<TreeCursor> {
        let mut cursor = TreeCursor {
            source,
            stack: Vec::new(),
            leaf: Vec::new(),
            next_index: None,
            direction,
            exhausted: true,
        };
        let Some(root) = root else {
            return Ok(cursor);
        };
        cursor.exhausted = false;
        let mut cid = *root;
        loop {
            match cursor.source.load(&cid).await? {
                Node::Branch(entries) => {
                    if entries.is_empty() {
                        return Err(DatabaseError::Corrupted {
                            reason: "empty branch node".to_string(),
                        });
                    }
                    let index = match choose_child(&entries, &start, direction)? {
                        Some(index) => index,
                        None => {
                            cursor.exhausted = true;
                            return Ok(cursor);
                        }
                    };
                    cid = entries[index].child;
                    cursor.stack.push(Frame { entries, index });
                }
                Node::Leaf(entries) => {
                    cursor.next_index = initial_index(&entries, &start, direction)?;
                    cursor.leaf = entries;
                    return Ok(cursor);
                }
            }
        }
    }

    pub(crate) async fn next(&mut self) -> Result<Option<LeafEntry>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            if let Some(i) = self.next_index {
                let entry = self.leaf[i].clone();
                self.next_index = match self.direction {
                    Direction::Ascending => {
                        if i + 1 < self.leaf.len() {
                            Some(i + 1)
                        } else {
                            None
                        }
                    }
                    Direction::Descending => i.checked_sub(1),
                };
                return Ok(Some(entry));
            }
            if !self.advance_leaf().await? {
                self.exhausted = true;
                return Ok(None);
            }
        }
    }

    /// Moves to the adjacent leaf in the scan direction. Returns false when
    /// the walk has run off the edge of the tree.
    async fn advance_leaf(&mut self) -> Result<bool> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(false);
            };
            let moved = match self.direction {
                Direction::Ascending => {
                    if frame.index + 1 < frame.entries.len() {
                        frame.index += 1;
                        true
                    } else {
                        false
                    }
                }
                Direction::Descending => {
                    if frame.index > 0 {
                        frame.index -= 1;
                        true
                    } else {
                        false
                    }
                }
            };
            if moved {
                let child = frame.entries[frame.index].child;
                self.descend_edge(child).await?;
                return Ok(true);
            }
            self.stack.pop();
        }
    }

    /// Descends along the near edge of `cid`'s subtree, leaving the cursor
    /// on that subtree's first leaf in the scan direction.
    async fn descend_edge(&mut self, mut cid: Cid) -> Result<()> {
        loop {
            match self.source.load(&cid).await? {
                Node::Branch(entries) => {
                    if entries.is_empty() {
                        return Err(DatabaseError::Corrupted {
                            reason: "empty branch node".to_string(),
                        });
                    }
                    let index = match self.direction {
                        Direction::Ascending => 0,
                        Direction::Descending => entries.len() - 1,
                    };
                    cid = entries[index].child;
                    self.stack.push(Frame { entries, index });
                }
                Node::Leaf(entries) => {
                    self.next_index = match self.direction {
                        Direction::Ascending => {
                            if entries.is_empty() {
                                None
                            } else {
                                Some(0)
                            }
                        }
                        Direction::Descending => entries.len().checked_sub(1),
                    };
                    self.leaf = entries;
                    return Ok(());
                }
            }
        }
    }
}

fn choose_child(
    entries: &[BranchEntry],
    start: &Bound<&TreeKey>,
    direction: Direction,
) -> Result<Option<usize>> {
    match direction {
        Direction::Ascending => match start {
            Bound::Unbounded => Ok(Some(0)),
            Bound::Included(key) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.key.cmp_key(key)? != Ordering::Less {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            }
            Bound::Excluded(key) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.key.cmp_key(key)? == Ordering::Greater {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            }
        },
        Direction::Descending => match start {
            Bound::Unbounded => Ok(Some(entries.len() - 1)),
            Bound::Included(key) | Bound::Excluded(key) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.key.cmp_key(key)? != Ordering::Less {
                        return Ok(Some(i));
                    }
                }
                Ok(Some(entries.len() - 1))
            }
        },
    }
}

fn initial_index(
    entries: &[LeafEntry],
    start: &Bound<&TreeKey>,
    direction: Direction,
) -> Result<Option<usize>> {
    match direction {
        Direction::Ascending => match start {
            Bound::Unbounded => Ok(if entries.is_empty() { None } else { Some(0) }),
            Bound::Included(key) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.key().cmp_key(key)? != Ordering::Less {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            }
            Bound::Excluded(key) => {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.key().cmp_key(key)? == Ordering::Greater {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            }
        },
        Direction::Descending => {
            for (i, entry) in entries.iter().enumerate().rev() {
                let keep = match start {
                    Bound::Unbounded => true,
                    Bound::Included(key) => entry.key().cmp_key(key)? != Ordering::Greater,
                    Bound::Excluded(key) => entry.key().cmp_key(key)? == Ordering::Less,
                };
                if keep {
                    return Ok(Some(i));
                }
            }
            Ok(None)
        }
    }
}
