//! # Tandem Core
//!
//! Substrate containers for the tandem proxy layer:
//! - Generational slot storage ([`SlotArena`], [`SlotId`])
//! - Intrusive swap-remove registries ([`IndexedRegistry`])
//! - Unordered pair flag tables ([`PairFlagTable`])
//! - Bounded index pools ([`IndexPool`])
//! - The simulation step gate ([`SimulationGate`])
//!
//! ## Architecture Rules
//!
//! 1. **O(1) membership** - registries store their own position in the element
//! 2. **No dangling handles** - every slot access goes through a generation check
//! 3. **Deterministic iteration** - no container iterates in hash order

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod memory;
pub mod pair;
pub mod registry;
pub mod slot;
pub mod sync;

pub use error::{CoreError, CoreResult};
pub use memory::IndexPool;
pub use pair::PairFlagTable;
pub use registry::{IndexOf, IndexedRegistry, Slots, NO_INDEX};
pub use slot::{SlotArena, SlotId};
pub use sync::SimulationGate;
