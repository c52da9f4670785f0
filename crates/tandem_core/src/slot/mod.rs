//! # Slots
//!
//! Generational storage for proxy records.
//!
//! ## Design Philosophy
//!
//! - Values live in one dense slot array
//! - IDs are indices with generation counters
//! - A freed slot is recycled, but its old IDs stay invalid forever

mod arena;
mod id;

pub use arena::SlotArena;
pub use id::SlotId;
