//! # Memory Management
//!
//! Pre-sized index pools.

mod index_pool;

pub use index_pool::IndexPool;
