//! Reusable integer-handle allocator with a LIFO free list.
//!
//! The caller must free an index only after every consumer has dropped
//! it; reusing an index earlier aliases two objects on the executor side.
//! Double-free is a safe no-op.

use tether_core::Index;

/// Maps [`Index`] values to owned entries, reusing freed slots last-in
/// first-out.
#[derive(Clone, Debug)]
pub struct IndexAllocator<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Default for IndexAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IndexAllocator<T> {
    /// Create an empty allocator.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Store `value` and return its index.
    ///
    /// Pops the most recently freed index if there is one, otherwise
    /// takes the next never-used index.
    pub fn add(&mut self, value: T) -> Index {
        self.live += 1;
        if let Some(slot) = self.free_list.pop() {
            self.slots[slot as usize] = Some(value);
            Index(slot)
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Some(value));
            Index(slot)
        }
    }

    /// Entry behind `index`, or `None` if it is free or was never issued.
    pub fn get(&self, index: Index) -> Option<&T> {
        self.slots.get(index.0 as usize)?.as_ref()
    }

    /// Mutable entry behind `index`.
    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        self.slots.get_mut(index.0 as usize)?.as_mut()
    }

    /// Whether `index` is live.
    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    /// Clear the slot and make `index` available for reuse.
    ///
    /// Returns `None` if the index was not live.
    pub fn free(&mut self, index: Index) -> Option<T> {
        let value = self.slots.get_mut(index.0 as usize)?.take()?;
        self.free_list.push(index.0);
        self.live -= 1;
        Some(value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no entry is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (Index(i as u32), v)))
    }

    /// Mutable live entries in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (Index(i as u32), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn add_get_round_trip() {
        let mut alloc = IndexAllocator::new();
        let i = alloc.add("a");
        assert_eq!(alloc.get(i), Some(&"a"));
        assert_eq!(alloc.len(), 1);
    }

    #[test]
    fn freed_index_is_reused_lifo() {
        let mut alloc = IndexAllocator::new();
        let a = alloc.add(1);
        let b = alloc.add(2);
        let c = alloc.add(3);
        alloc.free(a);
        alloc.free(c);

        assert_eq!(alloc.add(4), c);
        assert_eq!(alloc.add(5), a);
        assert_eq!(alloc.add(6), Index(3));
        assert_eq!(alloc.get(b), Some(&2));
    }

    #[test]
    fn free_then_add_returns_same_index() {
        let mut alloc = IndexAllocator::new();
        let i = alloc.add(10);
        assert_eq!(alloc.free(i), Some(10));
        assert_eq!(alloc.get(i), None);
        assert_eq!(alloc.add(11), i);
    }

    #[test]
    fn double_free_is_noop() {
        let mut alloc = IndexAllocator::new();
        let i = alloc.add(1);
        assert_eq!(alloc.free(i), Some(1));
        assert_eq!(alloc.free(i), None);
        assert!(alloc.is_empty());
        // A double free must not push the index twice.
        let a = alloc.add(2);
        let b = alloc.add(3);
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_index_is_absent() {
        let alloc: IndexAllocator<u8> = IndexAllocator::new();
        assert_eq!(alloc.get(Index(99)), None);
    }

    proptest! {
        #[test]
        fn live_indices_never_collide(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let mut alloc = IndexAllocator::new();
            let mut live: Vec<Index> = Vec::new();
            for (n, add) in ops.into_iter().enumerate() {
                if add || live.is_empty() {
                    live.push(alloc.add(n));
                } else {
                    let victim = live.swap_remove(n % live.len());
                    prop_assert!(alloc.free(victim).is_some());
                }
                let unique: HashSet<_> = live.iter().collect();
                prop_assert_eq!(unique.len(), live.len());
                prop_assert_eq!(alloc.len(), live.len());
            }
        }
    }
}
