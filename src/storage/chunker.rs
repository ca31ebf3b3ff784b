use sha2::{Digest, Sha256};

/// Split predicate for tree nodes. A node closes right after an entry whose
/// key is a boundary at that node's level. The decision must be a pure
/// function of `(level, key)` so that converging logical states converge on
/// identical blocks no matter the insertion order. Mixing the level in
/// keeps a separator key from being a boundary at every level above it,
/// which would stack single-entry branches without limit.
pub trait Chunker: Send + Sync {
    fn is_boundary(&self, level: u32, key_bytes: &[u8]) -> bool;
}

/// Default content-defined chunker. An entry is a boundary when the low
/// `width` bits of its keyed hash are all set, giving an expected branching
/// factor of `2^width`.
#[derive(Debug, Clone)]
pub struct HashChunker {
    width: u32,
}

impl HashChunker {
    pub const DEFAULT_WIDTH: u32 = 3;

    pub fn new(width: u32) -> Self {
        Self {
            width: width.clamp(1, 16),
        }
    }
}

impl Default for HashChunker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH)
    }
}

impl Chunker for HashChunker {
    fn is_boundary(&self, level: u32, key_bytes: &[u8]) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(level.to_le_bytes());
        hasher.update(key_bytes);
        let digest = hasher.finalize();
        let tail = u16::from_le_bytes([digest[30], digest[31]]) as u32;
        let mask = (1u32 << self.width) - 1;
        tail & mask == mask
    }
}
