//! Existing-record table
//!
//! Maps an entity (keyed by its identity in the producing process) to the
//! stable id its record has in the snapshot. This is the only de-duplication
//! mechanism: query it before every transitive persist.

use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Identity-keyed table of assigned record ids
#[derive(Debug, Clone)]
pub struct RecordTable<K, I> {
    ids: FxHashMap<K, I>,
    next_id: u32,
}

impl<K, I> RecordTable<K, I>
where
    K: Hash + Eq,
    I: From<u32> + Copy,
{
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Id already assigned to an entity, if any
    pub fn lookup(&self, key: &K) -> Option<I> {
        self.ids.get(key).copied()
    }

    /// Whether an entity already has an id
    pub fn contains(&self, key: &K) -> bool {
        self.ids.contains_key(key)
    }

    /// Return the entity's id, assigning the next one if it has none
    ///
    /// The flag is `true` when the id was assigned by this call.
    pub fn reserve(&mut self, key: K) -> (I, bool) {
        if let Some(id) = self.ids.get(&key) {
            return (*id, false);
        }
        let id = I::from(self.next_id);
        self.next_id += 1;
        self.ids.insert(key, id);
        (id, true)
    }

    /// Number of ids assigned
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no id has been assigned
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K, I> Default for RecordTable<K, I>
where
    K: Hash + Eq,
    I: From<u32> + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TypeId;

    #[test]
    fn test_reserve_is_idempotent() {
        let mut table: RecordTable<&str, TypeId> = RecordTable::new();
        let (a, fresh_a) = table.reserve("Foo");
        let (again, fresh_again) = table.reserve("Foo");
        assert!(fresh_a);
        assert!(!fresh_again);
        assert_eq!(a, again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut table: RecordTable<u32, TypeId> = RecordTable::new();
        let ids: Vec<_> = (10..15).map(|k| table.reserve(k).0.as_u32()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(table.lookup(&12), Some(TypeId::new(2)));
        assert_eq!(table.lookup(&99), None);
    }
}
