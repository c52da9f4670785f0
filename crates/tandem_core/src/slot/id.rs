//! # Slot Identifiers
//!
//! Slot ids are lightweight handles consisting of:
//! - An index into the arena's slot array
//! - A generation counter for detecting use after the slot was reused

use std::fmt;

/// Generational handle to a value stored in a [`SlotArena`](super::SlotArena).
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the slot array
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Creates a slot ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds an ID from [`to_bits`](Self::to_bits) output.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Null/invalid slot ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this slot ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("SlotId(null)")
        } else {
            write!(f, "SlotId({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_roundtrip() {
        let id = SlotId::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert_eq!(SlotId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_null_is_default() {
        assert!(SlotId::default().is_null());
        assert!(!SlotId::new(0, 0).is_null());
        assert_eq!(format!("{:?}", SlotId::new(3, 1)), "SlotId(3v1)");
    }
}
