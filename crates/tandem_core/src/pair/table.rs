//! # Pair Flag Table
//!
//! Order-independent map from an unordered pair of keys to a flag value.
//!
//! ## Layout
//!
//! ```text
//! buckets:  [ 2 ][ - ][ 0 ][ - ]      head entry per bucket (power of two)
//!              │        │
//! entries:  [ (a,c) next:- ][ (b,d) next:- ][ (a,b) next:1 ]
//! ```
//!
//! Entries are stored densely and chained per bucket. Keys are normalized
//! so that `k0 < k1` on every insert and lookup, which makes `(A, B)` and
//! `(B, A)` resolve to the same entry. Self-pairs are rejected.
//!
//! Hashing uses SipHash-1-3 with fixed keys, so bucket placement (and
//! therefore iteration order) is reproducible across runs.

use std::fmt;
use std::hash::{Hash, Hasher};

use siphasher::sip::SipHasher13;

use crate::error::{CoreError, CoreResult};

/// Empty bucket / end of chain marker.
const EMPTY: u32 = u32::MAX;

/// Smallest bucket array allocated.
const MIN_BUCKETS: usize = 16;

/// Fixed SipHash keys.
const HASH_KEYS: (u64, u64) = (0x7461_6e64_656d_5f70, 0x6169_725f_7461_626c);

struct Entry<K, F> {
    k0: K,
    k1: K,
    flags: F,
    next: u32,
}

/// Unordered-pair → flags map with O(1) average get/set.
///
/// # Example
///
/// ```rust,ignore
/// let mut table = PairFlagTable::new();
/// table.set(7u32, 3u32, 0b101)?;
/// assert_eq!(table.get(3, 7), Some(0b101));
/// ```
pub struct PairFlagTable<K, F> {
    buckets: Vec<u32>,
    entries: Vec<Entry<K, F>>,
}

impl<K, F> PairFlagTable<K, F>
where
    K: Copy + Ord + Hash,
    F: Copy,
{
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table sized for `capacity` pairs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let bucket_count = Self::bucket_count_for(capacity);
        Self {
            buckets: vec![EMPTY; bucket_count],
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored pairs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no pair is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets the flags for the unordered pair `{k0, k1}`.
    ///
    /// Returns the previous flags, if the pair was present.
    ///
    /// # Errors
    ///
    /// [`CoreError::SelfPair`] if `k0 == k1`.
    pub fn set(&mut self, k0: K, k1: K, flags: F) -> CoreResult<Option<F>> {
        let (k0, k1) = Self::normalize(k0, k1)?;

        if let Some(index) = self.find(k0, k1) {
            let entry = &mut self.entries[index];
            let previous = entry.flags;
            entry.flags = flags;
            return Ok(Some(previous));
        }

        if (self.entries.len() + 1) * 4 > self.buckets.len() * 3 {
            self.rehash(self.buckets.len() * 2);
        }

        let bucket = self.bucket_of(k0, k1);
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            k0,
            k1,
            flags,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = index;
        Ok(None)
    }

    /// Flags for the unordered pair `{k0, k1}`.
    ///
    /// Self-pairs are never stored, so `get(k, k)` is always `None`.
    #[must_use]
    pub fn get(&self, k0: K, k1: K) -> Option<F> {
        let (k0, k1) = Self::normalize(k0, k1).ok()?;
        self.find(k0, k1).map(|index| self.entries[index].flags)
    }

    /// Returns `true` if the unordered pair is stored.
    #[must_use]
    pub fn contains(&self, k0: K, k1: K) -> bool {
        self.get(k0, k1).is_some()
    }

    /// Removes the unordered pair `{k0, k1}`, returning its flags.
    pub fn remove(&mut self, k0: K, k1: K) -> Option<F> {
        let (k0, k1) = Self::normalize(k0, k1).ok()?;
        let bucket = self.bucket_of(k0, k1);

        // Unlink from the chain.
        let mut prev = EMPTY;
        let mut cursor = self.buckets[bucket];
        while cursor != EMPTY {
            let entry = &self.entries[cursor as usize];
            if entry.k0 == k0 && entry.k1 == k1 {
                break;
            }
            prev = cursor;
            cursor = entry.next;
        }
        if cursor == EMPTY {
            return None;
        }
        let next = self.entries[cursor as usize].next;
        if prev == EMPTY {
            self.buckets[bucket] = next;
        } else {
            self.entries[prev as usize].next = next;
        }

        // Swap-remove, then repoint whatever referenced the moved entry.
        let removed = self.entries.swap_remove(cursor as usize);
        let moved_from = self.entries.len() as u32;
        if cursor != moved_from {
            let moved = &self.entries[cursor as usize];
            let moved_bucket = self.bucket_of(moved.k0, moved.k1);
            if self.buckets[moved_bucket] == moved_from {
                self.buckets[moved_bucket] = cursor;
            } else {
                let mut link = self.buckets[moved_bucket];
                while link != EMPTY {
                    let entry = &mut self.entries[link as usize];
                    if entry.next == moved_from {
                        entry.next = cursor;
                        break;
                    }
                    link = entry.next;
                }
            }
        }

        Some(removed.flags)
    }

    /// Keeps only the pairs for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(K, K, F) -> bool) {
        let before = self.entries.len();
        self.entries.retain(|e| keep(e.k0, e.k1, e.flags));
        if self.entries.len() != before {
            self.rehash(self.buckets.len());
        }
    }

    /// Removes every pair.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.fill(EMPTY);
    }

    /// Iterates over `(k0, k1, flags)` with `k0 < k1`, in insertion order
    /// (modulo removals).
    pub fn iter(&self) -> impl Iterator<Item = (K, K, F)> + '_ {
        self.entries.iter().map(|e| (e.k0, e.k1, e.flags))
    }

    /// Orders a pair so that the smaller key comes first.
    ///
    /// # Errors
    ///
    /// [`CoreError::SelfPair`] if both keys are equal.
    #[inline]
    pub fn normalize(k0: K, k1: K) -> CoreResult<(K, K)> {
        match k0.cmp(&k1) {
            std::cmp::Ordering::Less => Ok((k0, k1)),
            std::cmp::Ordering::Greater => Ok((k1, k0)),
            std::cmp::Ordering::Equal => Err(CoreError::SelfPair),
        }
    }

    fn find(&self, k0: K, k1: K) -> Option<usize> {
        let mut cursor = self.buckets[self.bucket_of(k0, k1)];
        while cursor != EMPTY {
            let entry = &self.entries[cursor as usize];
            if entry.k0 == k0 && entry.k1 == k1 {
                return Some(cursor as usize);
            }
            cursor = entry.next;
        }
        None
    }

    fn bucket_of(&self, k0: K, k1: K) -> usize {
        let mut hasher = SipHasher13::new_with_keys(HASH_KEYS.0, HASH_KEYS.1);
        k0.hash(&mut hasher);
        k1.hash(&mut hasher);
        // Bucket count is a power of two.
        (hasher.finish() as usize) & (self.buckets.len() - 1)
    }

    fn rehash(&mut self, bucket_count: usize) {
        self.buckets.clear();
        self.buckets.resize(bucket_count.max(MIN_BUCKETS), EMPTY);
        for index in 0..self.entries.len() {
            let bucket = self.bucket_of(self.entries[index].k0, self.entries[index].k1);
            self.entries[index].next = self.buckets[bucket];
            self.buckets[bucket] = index as u32;
        }
    }

    fn bucket_count_for(capacity: usize) -> usize {
        (capacity * 4 / 3 + 1).next_power_of_two().max(MIN_BUCKETS)
    }
}

impl<K, F> Default for PairFlagTable<K, F>
where
    K: Copy + Ord + Hash,
    F: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, F: fmt::Debug> fmt::Debug for PairFlagTable<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| ((&e.k0, &e.k1), &e.flags)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_lookup() {
        let mut table = PairFlagTable::new();
        table.set(1u32, 2u32, 0xA).unwrap();

        assert_eq!(table.get(2, 1), Some(0xA));
        assert_eq!(table.get(1, 2), Some(0xA));
    }

    #[test]
    fn test_reversed_set_overwrites_same_entry() {
        let mut table = PairFlagTable::new();
        table.set(5u32, 9u32, 1).unwrap();
        let previous = table.set(9, 5, 2).unwrap();

        assert_eq!(previous, Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(5, 9), Some(2));
    }

    #[test]
    fn test_self_pair_rejected() {
        let mut table: PairFlagTable<u32, u8> = PairFlagTable::new();
        assert_eq!(table.set(4, 4, 1), Err(CoreError::SelfPair));
        assert_eq!(table.get(4, 4), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_iteration_is_normalized() {
        let mut table = PairFlagTable::new();
        table.set(8u32, 3u32, 'x').unwrap();
        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(pairs, vec![(3, 8, 'x')]);
    }

    #[test]
    fn test_growth_keeps_entries() {
        let mut table = PairFlagTable::with_capacity(2);
        for i in 0..500u32 {
            table.set(i, i + 1000, i).unwrap();
        }
        assert_eq!(table.len(), 500);
        for i in 0..500u32 {
            assert_eq!(table.get(i + 1000, i), Some(i));
        }
    }

    #[test]
    fn test_remove_relinks_moved_entry() {
        let mut table = PairFlagTable::new();
        for i in 0..200u32 {
            table.set(i, i + 1, i).unwrap();
        }

        // Remove from the front so the tail keeps getting swapped in.
        for i in (0..200u32).step_by(2) {
            assert_eq!(table.remove(i + 1, i), Some(i));
        }

        assert_eq!(table.len(), 100);
        for i in 0..200u32 {
            let expected = if i % 2 == 0 { None } else { Some(i) };
            assert_eq!(table.get(i, i + 1), expected);
        }
        assert_eq!(table.remove(0, 1), None);
    }

    #[test]
    fn test_retain_drops_pairs_of_key() {
        let mut table = PairFlagTable::new();
        table.set(1u32, 2u32, ()).unwrap();
        table.set(1, 3, ()).unwrap();
        table.set(2, 3, ()).unwrap();

        table.retain(|a, b, ()| a != 1 && b != 1);

        assert_eq!(table.len(), 1);
        assert!(table.contains(3, 2));
        assert!(!table.contains(1, 2));
    }

    #[test]
    fn test_clear() {
        let mut table = PairFlagTable::new();
        table.set(1u64, 2u64, 7u16).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.get(1, 2), None);
        table.set(2, 1, 8).unwrap();
        assert_eq!(table.get(1, 2), Some(8));
    }
}
