//! Allocation and collection types shared across Hearth.
//!
//! This module provides:
//! - Re-exports of hash collections using AHash
//! - `SparseSet`, an arena addressed by generational `IndexSlot`s

pub mod sparse_set;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("explosion", 3);
        assert_eq!(map.get("explosion"), Some(&3));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42);
        assert!(set.contains(&42));
    }
}
