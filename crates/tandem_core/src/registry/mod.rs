//! # Registries
//!
//! Index-stable sets used for every live, dirty and dead view of the
//! proxy layer.

mod indexed;

pub use indexed::{IndexOf, IndexedRegistry, Slots, NO_INDEX};
