//! # Index-Stable Registry
//!
//! O(1) insert, remove and membership for elements that carry their own
//! registry position.
//!
//! ```text
//! registry.keys:  [ A ][ B ][ C ][ D ]
//!                          ▲
//! remove(B):      swap D into slot 1, shrink, D.index = 1, B.index = NO_INDEX
//! registry.keys:  [ A ][ D ][ C ]
//! ```
//!
//! The elements themselves live elsewhere (usually a [`SlotArena`]); the
//! registry stores keys and reaches the embedded index field through the
//! [`IndexOf`] selector. One element can sit in several registries at once
//! as long as each registry uses a different selector.
//!
//! Removal reorders the tail into the freed position, so never remove by
//! position while iterating. Snapshot the keys first.

use std::marker::PhantomData;

use crate::error::{CoreError, CoreResult};
use crate::slot::{SlotArena, SlotId};

/// Sentinel stored in an element that is not tracked by a registry.
pub const NO_INDEX: u32 = u32::MAX;

/// Selects which embedded index field of `T` a registry maintains.
///
/// # Example
///
/// ```rust,ignore
/// struct SceneIndex;
///
/// impl IndexOf<Record> for SceneIndex {
///     fn get(item: &Record) -> u32 { item.scene_index }
///     fn set(item: &mut Record, index: u32) { item.scene_index = index; }
/// }
/// ```
pub trait IndexOf<T: ?Sized> {
    /// Reads the tracked index, [`NO_INDEX`] when untracked.
    fn get(item: &T) -> u32;

    /// Writes the tracked index.
    fn set(item: &mut T, index: u32);
}

/// Resolves registry keys to the elements holding the index fields.
pub trait Slots<K> {
    /// Element type.
    type Item;

    /// Shared access to the element behind `key`.
    fn slot(&self, key: K) -> Option<&Self::Item>;

    /// Exclusive access to the element behind `key`.
    fn slot_mut(&mut self, key: K) -> Option<&mut Self::Item>;
}

impl<T> Slots<SlotId> for SlotArena<T> {
    type Item = T;

    #[inline]
    fn slot(&self, key: SlotId) -> Option<&T> {
        self.get(key)
    }

    #[inline]
    fn slot_mut(&mut self, key: SlotId) -> Option<&mut T> {
        self.get_mut(key)
    }
}

impl<T> Slots<usize> for Vec<T> {
    type Item = T;

    #[inline]
    fn slot(&self, key: usize) -> Option<&T> {
        self.get(key)
    }

    #[inline]
    fn slot_mut(&mut self, key: usize) -> Option<&mut T> {
        self.get_mut(key)
    }
}

/// Dense, swap-remove registry of keys with O(1) membership.
///
/// # Type Parameters
///
/// * `K` - Key type resolved through a [`Slots`] store
/// * `I` - [`IndexOf`] selector naming the embedded index field
pub struct IndexedRegistry<K, I> {
    keys: Vec<K>,
    _index: PhantomData<fn() -> I>,
}

impl<K: Copy + PartialEq, I> IndexedRegistry<K, I> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty registry with room for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            _index: PhantomData,
        }
    }

    /// Number of tracked elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key stored at `position`.
    #[inline]
    #[must_use]
    pub fn get(&self, position: usize) -> Option<K> {
        self.keys.get(position).copied()
    }

    /// Tracked keys in registry order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[K] {
        &self.keys
    }

    /// Iterates over tracked keys in registry order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.keys.iter().copied()
    }

    /// Appends `key` and records its position in the element.
    ///
    /// # Errors
    ///
    /// * [`CoreError::UnknownSlot`] if `key` does not resolve
    /// * [`CoreError::AlreadyTracked`] if the element's index is already set
    pub fn push_back<S>(&mut self, slots: &mut S, key: K) -> CoreResult<u32>
    where
        S: Slots<K> + ?Sized,
        I: IndexOf<S::Item>,
    {
        let item = slots.slot_mut(key).ok_or(CoreError::UnknownSlot)?;
        let current = I::get(item);
        if current != NO_INDEX {
            return Err(CoreError::AlreadyTracked { index: current });
        }

        let index = self.keys.len();
        debug_assert!(index < NO_INDEX as usize, "registry index space exhausted");
        let index = index as u32;
        I::set(item, index);
        self.keys.push(key);
        Ok(index)
    }

    /// Removes `key`, moving the last key into its position.
    ///
    /// The moved element's index is rewritten and the removed element's
    /// index is reset to [`NO_INDEX`].
    ///
    /// # Errors
    ///
    /// * [`CoreError::UnknownSlot`] if `key` does not resolve
    /// * [`CoreError::NotTracked`] if the element is not in this registry
    pub fn remove<S>(&mut self, slots: &mut S, key: K) -> CoreResult<()>
    where
        S: Slots<K> + ?Sized,
        I: IndexOf<S::Item>,
    {
        let item = slots.slot_mut(key).ok_or(CoreError::UnknownSlot)?;
        let index = I::get(item);
        if index == NO_INDEX || self.keys.get(index as usize) != Some(&key) {
            return Err(CoreError::NotTracked);
        }
        I::set(item, NO_INDEX);

        self.keys.swap_remove(index as usize);
        if let Some(&moved) = self.keys.get(index as usize) {
            if let Some(moved_item) = slots.slot_mut(moved) {
                I::set(moved_item, index);
            }
        }
        Ok(())
    }

    /// Removes `key` if it is tracked. Returns whether it was.
    pub fn remove_if_tracked<S>(&mut self, slots: &mut S, key: K) -> bool
    where
        S: Slots<K> + ?Sized,
        I: IndexOf<S::Item>,
    {
        self.remove(slots, key).is_ok()
    }

    /// O(1) membership test through the embedded index.
    #[inline]
    #[must_use]
    pub fn contains<S>(&self, slots: &S, key: K) -> bool
    where
        S: Slots<K> + ?Sized,
        I: IndexOf<S::Item>,
    {
        slots.slot(key).is_some_and(|item| I::get(item) != NO_INDEX)
    }

    /// Untracks every element.
    pub fn clear<S>(&mut self, slots: &mut S)
    where
        S: Slots<K> + ?Sized,
        I: IndexOf<S::Item>,
    {
        for key in self.keys.drain(..) {
            if let Some(item) = slots.slot_mut(key) {
                I::set(item, NO_INDEX);
            }
        }
    }
}

impl<K: Copy + PartialEq, I> Default for IndexedRegistry<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        live: u32,
        dirty: u32,
    }

    impl Item {
        fn new() -> Self {
            Self { live: NO_INDEX, dirty: NO_INDEX }
        }
    }

    struct Live;
    struct Dirty;

    impl IndexOf<Item> for Live {
        fn get(item: &Item) -> u32 {
            item.live
        }
        fn set(item: &mut Item, index: u32) {
            item.live = index;
        }
    }

    impl IndexOf<Item> for Dirty {
        fn get(item: &Item) -> u32 {
            item.dirty
        }
        fn set(item: &mut Item, index: u32) {
            item.dirty = index;
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|_| Item::new()).collect()
    }

    #[test]
    fn test_push_sets_index() {
        let mut store = items(3);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();

        assert_eq!(reg.push_back(&mut store, 2).unwrap(), 0);
        assert_eq!(reg.push_back(&mut store, 0).unwrap(), 1);
        assert_eq!(store[2].live, 0);
        assert_eq!(store[0].live, 1);
        assert!(reg.contains(&store, 2));
        assert!(!reg.contains(&store, 1));
    }

    #[test]
    fn test_double_push_rejected() {
        let mut store = items(1);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();

        reg.push_back(&mut store, 0).unwrap();
        assert_eq!(
            reg.push_back(&mut store, 0),
            Err(CoreError::AlreadyTracked { index: 0 })
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_remove_relocates_last() {
        let mut store = items(4);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();
        for key in 0..4 {
            reg.push_back(&mut store, key).unwrap();
        }

        reg.remove(&mut store, 1).unwrap();

        // Formerly-last element now occupies slot 1.
        assert_eq!(reg.as_slice(), &[0, 3, 2]);
        assert_eq!(store[3].live, 1);
        assert_eq!(store[1].live, NO_INDEX);
        assert_eq!(reg.remove(&mut store, 1), Err(CoreError::NotTracked));
    }

    #[test]
    fn test_remove_last_element() {
        let mut store = items(2);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();
        reg.push_back(&mut store, 0).unwrap();
        reg.push_back(&mut store, 1).unwrap();

        reg.remove(&mut store, 1).unwrap();
        assert_eq!(reg.as_slice(), &[0]);
        assert_eq!(store[0].live, 0);
    }

    #[test]
    fn test_remove_if_tracked() {
        let mut store = items(3);
        let mut reg: IndexedRegistry<usize, Dirty> = IndexedRegistry::new();
        reg.push_back(&mut store, 0).unwrap();
        reg.push_back(&mut store, 2).unwrap();

        assert!(reg.remove_if_tracked(&mut store, 0));
        assert!(!reg.remove_if_tracked(&mut store, 0));
        assert!(!reg.remove_if_tracked(&mut store, 1));
        assert!(!reg.remove_if_tracked(&mut store, 9));
        assert_eq!(reg.as_slice(), &[2]);
        assert_eq!(store[2].dirty, 0);
        assert_eq!(store[0].dirty, NO_INDEX);
    }

    #[test]
    fn test_independent_selectors() {
        let mut store = items(2);
        let mut live: IndexedRegistry<usize, Live> = IndexedRegistry::new();
        let mut dirty: IndexedRegistry<usize, Dirty> = IndexedRegistry::new();

        live.push_back(&mut store, 0).unwrap();
        live.push_back(&mut store, 1).unwrap();
        dirty.push_back(&mut store, 1).unwrap();

        assert_eq!(store[1].live, 1);
        assert_eq!(store[1].dirty, 0);

        dirty.clear(&mut store);
        assert!(dirty.is_empty());
        assert_eq!(store[1].dirty, NO_INDEX);
        assert!(live.contains(&store, 1));
    }

    #[test]
    fn test_unknown_key() {
        let mut store = items(1);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();
        assert_eq!(reg.push_back(&mut store, 9), Err(CoreError::UnknownSlot));
        assert!(!reg.contains(&store, 9));
    }

    #[test]
    fn test_membership_tracks_pushes_minus_removes() {
        const N: usize = 32;
        let mut store = items(N);
        let mut reg: IndexedRegistry<usize, Live> = IndexedRegistry::new();
        let mut expected = [false; N];
        let mut pushes = 0usize;
        let mut removes = 0usize;

        // Deterministic pseudo-random walk over push/remove.
        let mut state = 0x2545_f491_u32;
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let key = (state as usize) % N;

            if expected[key] {
                reg.remove(&mut store, key).unwrap();
                expected[key] = false;
                removes += 1;
            } else {
                reg.push_back(&mut store, key).unwrap();
                expected[key] = true;
                pushes += 1;
            }

            assert_eq!(reg.len(), pushes - removes);
            for (k, &tracked) in expected.iter().enumerate() {
                assert_eq!(reg.contains(&store, k), tracked);
            }
            for (position, key) in reg.iter().enumerate() {
                assert_eq!(store[key].live as usize, position);
            }
        }
    }

    #[test]
    fn test_slot_arena_backing() {
        let mut arena = SlotArena::new();
        let a = arena.insert(Item::new());
        let b = arena.insert(Item::new());
        let mut reg: IndexedRegistry<SlotId, Live> = IndexedRegistry::new();

        reg.push_back(&mut arena, a).unwrap();
        reg.push_back(&mut arena, b).unwrap();
        reg.remove(&mut arena, a).unwrap();

        assert_eq!(reg.as_slice(), &[b]);
        assert_eq!(arena.get(b).unwrap().live, 0);
    }
}
