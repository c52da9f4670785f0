//! # Entity Proxies
//!
//! One proxy flavour per engine object kind. Every flavour follows the
//! same pattern:
//!
//! ```text
//!   Record<K>
//!   ├── desc      creation parameters, serves defaults until instanced
//!   ├── pending   one Option per settable field (None = no override)
//!   ├── handle    engine object, once instanced
//!   ├── state     Buffered ─► Instanced ─► AwaitingDelete
//!   └── links     kind-specific relations (owner, shapes, joints, ...)
//! ```
//!
//! - Reads return the pending override if any, else the engine value if
//!   instanced, else the descriptor default.
//! - Writes store an override and mark the entity dirty.
//! - A commit instances the entity if needed, then applies overrides in
//!   field declaration order and clears them.

#[macro_use]
mod macros;

mod actor;
mod cloth;
mod fluid;
mod joint;
mod material;
mod shape;
mod soft_body;

pub use actor::{ActorProxy, EngineActor};
pub use cloth::{ClothProxy, EngineCloth};
pub use fluid::{EngineFluid, FluidProxy};
pub use joint::{EngineJoint, JointProxy};
pub use material::{EngineMaterial, MaterialProxy};
pub use shape::{EngineShape, ShapeProxy};
pub use soft_body::{EngineSoftBody, SoftBodyProxy};

pub(crate) use actor::{ActorCommitter, ActorKind, ActorLinks};
pub(crate) use cloth::ClothKind;
pub(crate) use fluid::FluidKind;
pub(crate) use joint::{JointCommitter, JointKind};
pub(crate) use material::MaterialKind;
pub(crate) use shape::{ShapeFields, ShapeKind, ShapeLinks};
pub(crate) use soft_body::SoftBodyKind;

use std::fmt;
use std::hash::Hash;

use tandem_core::{IndexOf, SlotId, NO_INDEX};

use crate::engine::PhysicsScene;
use crate::error::EngineResult;
use crate::scene::CommitPass;

/// Engine object kinds the proxy layer buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Rigid actor.
    Actor,
    /// Collision shape owned by an actor.
    Shape,
    /// Joint between actors.
    Joint,
    /// Surface material.
    Material,
    /// Particle fluid.
    Fluid,
    /// Cloth.
    Cloth,
    /// Soft body.
    SoftBody,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Actor => "actor",
            Self::Shape => "shape",
            Self::Joint => "joint",
            Self::Material => "material",
            Self::Fluid => "fluid",
            Self::Cloth => "cloth",
            Self::SoftBody => "soft body",
        })
    }
}

/// Lifecycle of a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProxyState {
    /// Exists only as buffered state; no engine object yet.
    Buffered,
    /// Backed by an engine object.
    Instanced,
    /// Released; engine-side destruction deferred to the next delete commit.
    AwaitingDelete,
}

macro_rules! proxy_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(SlotId);

        impl $name {
            /// Underlying generational slot.
            #[inline]
            #[must_use]
            pub const fn slot(self) -> SlotId {
                self.0
            }

            #[inline]
            pub(crate) const fn from_slot(slot: SlotId) -> Self {
                Self(slot)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

proxy_id!(
    /// Identifies an actor proxy.
    ActorId
);
proxy_id!(
    /// Identifies a shape proxy.
    ShapeId
);
proxy_id!(
    /// Identifies a joint proxy.
    JointId
);
proxy_id!(
    /// Identifies a fluid proxy.
    FluidId
);
proxy_id!(
    /// Identifies a cloth proxy.
    ClothId
);
proxy_id!(
    /// Identifies a soft body proxy.
    SoftBodyId
);

// =============================================================================
// RECORDS
// =============================================================================

/// Static description of one proxy flavour.
pub(crate) trait ProxyKind: 'static {
    const KIND: EntityKind;
    /// Creation parameters.
    type Desc;
    /// Buffered overrides.
    type Fields: Default;
    /// Engine object handle.
    type Handle: Copy + Eq + Hash + fmt::Debug;
    /// Relations to other proxies.
    type Links;
}

/// Buffered state of one entity.
pub(crate) struct Record<K: ProxyKind> {
    pub desc: K::Desc,
    pub pending: K::Fields,
    pub handle: Option<K::Handle>,
    pub state: ProxyState,
    pub links: K::Links,
    /// Failed instancing attempts so far.
    pub attempts: u32,
    live_index: u32,
    dirty_index: u32,
}

impl<K: ProxyKind> Record<K> {
    pub fn new(desc: K::Desc, links: K::Links) -> Self {
        Self {
            desc,
            pending: K::Fields::default(),
            handle: None,
            state: ProxyState::Buffered,
            links,
            attempts: 0,
            live_index: NO_INDEX,
            dirty_index: NO_INDEX,
        }
    }

    /// Engine handle, if the entity still has one it may be read through.
    pub fn live_handle(&self) -> Option<K::Handle> {
        match self.state {
            ProxyState::Buffered => None,
            ProxyState::Instanced | ProxyState::AwaitingDelete => self.handle,
        }
    }
}

/// Position in the live registry.
pub(crate) struct LiveIndex;

/// Position in the dirty registry.
pub(crate) struct DirtyIndex;

impl<K: ProxyKind> IndexOf<Record<K>> for LiveIndex {
    fn get(item: &Record<K>) -> u32 {
        item.live_index
    }
    fn set(item: &mut Record<K>, index: u32) {
        item.live_index = index;
    }
}

impl<K: ProxyKind> IndexOf<Record<K>> for DirtyIndex {
    fn get(item: &Record<K>) -> u32 {
        item.dirty_index
    }
    fn set(item: &mut Record<K>, index: u32) {
        item.dirty_index = index;
    }
}

/// Flushes records of kind `K` into engine `E`.
pub(crate) trait Committer<K: ProxyKind, E: PhysicsScene> {
    /// Builds the engine object for a `Buffered` record.
    fn instance(&mut self, engine: &mut E, record: &Record<K>) -> EngineResult<K::Handle>;

    /// Applies and clears pending overrides.
    ///
    /// Returns `false` if something has to be retried at the next commit.
    fn flush(
        &mut self,
        engine: &mut E,
        handle: K::Handle,
        record: &mut Record<K>,
        pass: &mut CommitPass<'_>,
    ) -> bool;
}

/// Committer for kinds with no cross-kind dependencies.
pub(crate) struct DirectCommitter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(EntityKind::Actor.to_string(), "actor");
        assert_eq!(EntityKind::SoftBody.to_string(), "soft body");
    }

    #[test]
    fn test_id_display() {
        let id = ActorId::from_slot(SlotId::new(4, 2));
        assert_eq!(id.to_string(), "ActorId(4v2)");
        assert_eq!(id.slot().index(), 4);
    }
}
