use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::storage::block::Cid;
use crate::storage::node::Node;

/// Bounded cid-to-decoded-node cache. Nodes are immutable, so entries never
/// need invalidation, only eviction. Least recently used goes first.
pub struct NodeCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    capacity: usize,
    nodes: HashMap<Cid, Node>,
    order: VecDeque<Cid>,
}

impl NodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                capacity: capacity.max(1),
                nodes: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, cid: &Cid) -> Option<Node> {
        let mut inner = self.inner.lock();
        let node = inner.nodes.get(cid).cloned()?;
        if let Some(pos) = inner.order.iter().position(|c| c == cid) {
            inner.order.remove(pos);
            inner.order.push_back(*cid);
        }
        Some(node)
    }

    pub fn insert(&self, cid: Cid, node: Node) {
        let mut inner = self.inner.lock();
        if inner.nodes.contains_key(&cid) {
            return;
        }
        while inner.nodes.len() >= inner.capacity {
            match inner.order.pop_front() {
                Some(evicted) => {
                    inner.nodes.remove(&evicted);
                }
                None => break,
            }
        }
        inner.nodes.insert(cid, node);
        inner.order.push_back(cid);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().nodes.is_empty()
    }
}
