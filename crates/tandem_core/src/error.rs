//! # Core Error Types
//!
//! All errors raised by the substrate containers.

use thiserror::Error;

/// Errors that can occur in the core containers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Tried to insert an element whose tracked index is already set.
    #[error("element is already tracked at index {index}")]
    AlreadyTracked {
        /// The index the element is currently tracked at.
        index: u32,
    },

    /// Tried to remove an element that is not tracked by this registry.
    #[error("element is not tracked by this registry")]
    NotTracked,

    /// The key does not resolve to a live slot.
    #[error("key does not resolve to a live slot")]
    UnknownSlot,

    /// A bounded pool has no free index left.
    #[error("index pool exhausted: capacity {capacity}")]
    Exhausted {
        /// Pool capacity.
        capacity: usize,
    },

    /// Pair tables never hold an entry pairing a key with itself.
    #[error("self-pairs are not allowed in pair tables")]
    SelfPair,
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
