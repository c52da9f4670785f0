//! # Index Pool
//!
//! Bounded free-list of small integer indices, for engine-side tables that
//! are addressed by a dense index rather than a handle.

use crate::error::{CoreError, CoreResult};

/// A pool of indices in `0..capacity`.
///
/// Indices are handed out lowest-first and recycled LIFO once freed.
/// Individual indices can be reserved up front (e.g. index 0 for a
/// built-in default entry) so they are never handed out by
/// [`allocate`](Self::allocate).
///
/// # Thread Safety
///
/// Not thread-safe. Owned by a single scene.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = IndexPool::new(4096);
/// pool.reserve(0)?;
/// let index = pool.allocate()?; // 1
/// pool.free(index);
/// ```
#[derive(Debug, Clone)]
pub struct IndexPool {
    /// Allocation state per index.
    allocated: Box<[bool]>,
    /// Free list - indices available for allocation, top is next.
    free_list: Vec<u32>,
    /// Number of allocated indices.
    allocated_count: usize,
}

impl IndexPool {
    /// Creates a pool serving indices `0..capacity`.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or does not fit in a `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= u32::MAX as usize,
            "Capacity must fit in a u32 index"
        );

        Self {
            allocated: vec![false; capacity].into_boxed_slice(),
            free_list: (0..capacity as u32).rev().collect(),
            allocated_count: 0,
        }
    }

    /// Total number of indices served.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.allocated.len()
    }

    /// Number of indices currently handed out or reserved.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Number of indices still available.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns `true` if `index` is currently allocated or reserved.
    #[inline]
    #[must_use]
    pub fn is_allocated(&self, index: u32) -> bool {
        self.allocated.get(index as usize).copied().unwrap_or(false)
    }

    /// Takes the lowest never-used (or most recently freed) index.
    ///
    /// # Errors
    ///
    /// [`CoreError::Exhausted`] if every index is in use.
    pub fn allocate(&mut self) -> CoreResult<u32> {
        let index = self.free_list.pop().ok_or(CoreError::Exhausted {
            capacity: self.capacity(),
        })?;
        self.allocated[index as usize] = true;
        self.allocated_count += 1;
        Ok(index)
    }

    /// Marks a specific index as allocated.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownSlot`] if `index` is out of range
    /// - [`CoreError::AlreadyTracked`] if it is already allocated
    pub fn reserve(&mut self, index: u32) -> CoreResult<()> {
        match self.allocated.get(index as usize) {
            None => return Err(CoreError::UnknownSlot),
            Some(true) => return Err(CoreError::AlreadyTracked { index }),
            Some(false) => {}
        }
        self.free_list.retain(|&free| free != index);
        self.allocated[index as usize] = true;
        self.allocated_count += 1;
        Ok(())
    }

    /// Returns `index` to the pool.
    ///
    /// Returns `false` if the index was not allocated.
    pub fn free(&mut self, index: u32) -> bool {
        if !self.is_allocated(index) {
            return false;
        }
        self.allocated[index as usize] = false;
        self.free_list.push(index);
        self.allocated_count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_lowest_first() {
        let mut pool = IndexPool::new(4);
        assert_eq!(pool.allocate(), Ok(0));
        assert_eq!(pool.allocate(), Ok(1));
        assert_eq!(pool.allocated_count(), 2);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_reserved_index_never_allocated() {
        let mut pool = IndexPool::new(3);
        pool.reserve(0).unwrap();

        assert_eq!(pool.allocate(), Ok(1));
        assert_eq!(pool.allocate(), Ok(2));
        assert_eq!(pool.allocate(), Err(CoreError::Exhausted { capacity: 3 }));
    }

    #[test]
    fn test_reserve_twice_fails() {
        let mut pool = IndexPool::new(2);
        pool.reserve(1).unwrap();
        assert_eq!(pool.reserve(1), Err(CoreError::AlreadyTracked { index: 1 }));
        assert_eq!(pool.reserve(2), Err(CoreError::UnknownSlot));
    }

    #[test]
    fn test_free_recycles() {
        let mut pool = IndexPool::new(2);
        let a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();

        assert!(pool.free(a));
        assert!(!pool.free(a));
        assert!(!pool.is_allocated(a));
        assert_eq!(pool.allocate(), Ok(a));
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than zero")]
    fn test_zero_capacity_panics() {
        let _ = IndexPool::new(0);
    }
}
