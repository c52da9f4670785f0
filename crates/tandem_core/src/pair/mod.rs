//! # Pair Tables
//!
//! Collision-filtering overrides keyed by unordered entity pairs.

mod table;

pub use table::PairFlagTable;
