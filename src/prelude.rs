//! Internal prelude re-exporting the collection types used across the crate,
//! so every module pulls hashers and ordered maps from one place.

pub use rustc_hash::{FxHashMap, FxHashSet};

/// Insertion-ordered map hashed with FxHasher. Property bags use this so
/// own-key enumeration is deterministic.
pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}
