//! # Generational Slot Arena
//!
//! Owns values behind [`SlotId`] handles. Freed slots are recycled through a
//! free list; each reuse bumps the slot generation so stale handles are
//! rejected instead of silently aliasing the new occupant.

use super::id::SlotId;

/// One arena slot.
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational arena.
///
/// Unlike a fixed-capacity entity table the arena grows on demand; the
/// initial capacity only pre-reserves storage.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = SlotArena::with_capacity(64);
/// let id = arena.insert("actor");
/// assert_eq!(arena.get(id), Some(&"actor"));
/// arena.remove(id);
/// assert!(arena.get(id).is_none());
/// ```
pub struct SlotArena<T> {
    /// All slots, occupied or free.
    slots: Vec<Slot<T>>,
    /// Free list of slot indices for reuse.
    free_indices: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty arena with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value, returning its ID.
    ///
    /// Reuses a freed slot when one is available.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX - 1` slots would be needed.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.len += 1;

        if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotId::new(index, slot.generation);
        }

        let index = self.slots.len();
        assert!(index < u32::MAX as usize, "slot arena exhausted the u32 index space");
        let index = index as u32;
        self.slots.push(Slot { generation: 0, value: Some(value) });
        SlotId::new(index, 0)
    }

    /// Removes a value, freeing its slot for reuse.
    ///
    /// Returns `None` if the ID is null, stale or already freed.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }

        let index = id.index();
        let slot = &mut self.slots[index as usize];
        let value = slot.value.take();
        // Invalidate every outstanding handle to this slot.
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(index);
        self.len -= 1;

        value
    }

    /// Checks if an ID refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Gets a value by ID.
    #[inline]
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        if id.is_null() {
            return None;
        }
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable value by ID.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        if id.is_null() {
            return None;
        }
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Iterates over all live values with their IDs, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            // Slot indices never exceed u32 (checked on insert).
            Some((SlotId::new(index as u32, slot.generation), value))
        })
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut arena = SlotArena::with_capacity(4);

        let a = arena.insert(10);
        let b = arena.insert(20);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&10));
        assert_eq!(arena.get(b), Some(&20));

        assert_eq!(arena.remove(a), Some(10));
        assert!(!arena.contains(a));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut arena = SlotArena::new();

        let a = arena.insert("first");
        arena.remove(a);

        // Spawn again - should reuse the slot
        let b = arena.insert("second");
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());

        // The stale handle must not alias the new occupant.
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"second"));
    }

    #[test]
    fn test_null_and_out_of_range() {
        let mut arena: SlotArena<u8> = SlotArena::new();
        assert!(arena.get(SlotId::NULL).is_none());
        assert!(arena.get_mut(SlotId::new(7, 0)).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut arena = SlotArena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        let c = arena.insert(3);
        arena.remove(b);

        let live: Vec<_> = arena.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(live, vec![(a, 1), (c, 3)]);
    }
}
