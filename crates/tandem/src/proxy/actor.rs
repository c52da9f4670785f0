//! Actor proxies.
//!
//! An actor owns its shapes. Shape descriptors passed at creation become
//! shape proxies, so the engine actor is always built bare and its shapes
//! are attached by the actor's own flush:
//!
//! ```text
//!   flush(actor)
//!   ├── 1. shapes      (only if the shape set or a shape changed)
//!   ├── 2. overrides   global_pose .. sleeping, declaration order
//!   └── 3. force       accumulated since the last commit
//! ```
//!
//! A shape the engine refuses does not hold back steps 2 and 3. The actor
//! stays dirty until every shape is attached.

use tandem_core::SlotId;
use tandem_shared::{Transform, Vec3};

use crate::api::ActorApi;
use crate::engine::{ActorDesc, ActorFlags, ActorHandle, BodyFlags, PhysicsScene, ShapeDesc};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, KindStore, SceneProxy};

use super::shape::{ShapeCommitter, ShapeKind};
use super::{ActorId, Committer, EntityKind, ProxyKind, ProxyState, Record, ShapeId};

pub(crate) struct ActorKind;

#[derive(Debug, Default)]
pub(crate) struct ActorFields {
    pub global_pose: Option<Transform>,
    pub linear_velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub mass: Option<f32>,
    pub linear_damping: Option<f32>,
    pub angular_damping: Option<f32>,
    pub group: Option<u16>,
    pub dominance_group: Option<u8>,
    pub flags: Option<ActorFlags>,
    pub body_flags: Option<BodyFlags>,
    pub sleeping: Option<bool>,
    pub force: Option<Vec3>,
    /// A shape was added or written since the last flush.
    pub shapes_changed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ActorLinks {
    /// Live shapes, in creation order.
    pub shapes: Vec<SlotId>,
    /// Joints attached to this actor.
    pub joints: Vec<SlotId>,
}

impl ProxyKind for ActorKind {
    const KIND: EntityKind = EntityKind::Actor;
    type Desc = ActorDesc;
    type Fields = ActorFields;
    type Handle = ActorHandle;
    type Links = ActorLinks;
}

/// Commits actors, pulling their shapes along.
pub(crate) struct ActorCommitter<'a> {
    pub shapes: &'a mut KindStore<ShapeKind>,
}

impl<E: PhysicsScene> Committer<ActorKind, E> for ActorCommitter<'_> {
    fn instance(&mut self, engine: &mut E, record: &Record<ActorKind>) -> EngineResult<ActorHandle> {
        engine.create_actor(&record.desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: ActorHandle,
        record: &mut Record<ActorKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let mut attached = true;
        if fields.shapes_changed {
            let mut committer = ShapeCommitter { owner: handle };
            for &shape in &record.links.shapes {
                attached &= self.shapes.commit_entry(engine, &mut committer, shape, pass);
            }
            // Refused shapes keep the flag so the next commit retries them.
            fields.shapes_changed = !attached;
        }

        let kind = EntityKind::Actor;
        pass.apply(kind, "global_pose", fields.global_pose.take(), |v| {
            engine.set_actor_global_pose(handle, v)
        });
        pass.apply(kind, "linear_velocity", fields.linear_velocity.take(), |v| {
            engine.set_actor_linear_velocity(handle, v)
        });
        pass.apply(kind, "angular_velocity", fields.angular_velocity.take(), |v| {
            engine.set_actor_angular_velocity(handle, v)
        });
        pass.apply(kind, "mass", fields.mass.take(), |v| engine.set_actor_mass(handle, v));
        pass.apply(kind, "linear_damping", fields.linear_damping.take(), |v| {
            engine.set_actor_linear_damping(handle, v)
        });
        pass.apply(kind, "angular_damping", fields.angular_damping.take(), |v| {
            engine.set_actor_angular_damping(handle, v)
        });
        pass.apply(kind, "group", fields.group.take(), |v| engine.set_actor_group(handle, v));
        pass.apply(kind, "dominance_group", fields.dominance_group.take(), |v| {
            engine.set_actor_dominance_group(handle, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_actor_flags(handle, v));
        pass.apply(kind, "body_flags", fields.body_flags.take(), |v| {
            engine.set_actor_body_flags(handle, v)
        });
        pass.apply(kind, "sleeping", fields.sleeping.take(), |v| engine.set_actor_sleeping(handle, v));
        pass.apply(kind, "force", fields.force.take(), |v| engine.add_actor_force(handle, v));
        attached
    }
}

// =============================================================================
// VIEWS
// =============================================================================

/// Buffered view of one actor.
pub struct ActorProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: ActorId,
}

impl<'a, E: PhysicsScene> ActorProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: ActorId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the actor has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.actors.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    /// Live shapes of the actor, in creation order.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the actor has been deleted.
    pub fn shapes(&self) -> ProxyResult<Vec<ShapeId>> {
        let result = self
            .scene
            .actors
            .record(self.id.slot())
            .map(|record| record.links.shapes.iter().copied().map(ShapeId::from_slot).collect());
        self.scene.guard(result)
    }

    /// Buffers `desc` as a new shape of this actor.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AwaitingDelete`] if the actor was released.
    pub fn add_shape(&mut self, desc: ShapeDesc) -> ProxyResult<ShapeId> {
        self.scene.create_shape(self.id, desc)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&ActorFields) -> Option<T>,
        current: impl FnOnce(&E, ActorHandle) -> EngineResult<T>,
        initial: impl FnOnce(&ActorDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self.scene.actors.read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut ActorFields)) -> ProxyResult<()> {
        let result = self.scene.actors.write(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> ActorApi for ActorProxy<'_, E> {
    fn is_dynamic(&self) -> ProxyResult<bool> {
        self.read(|_| None, |e, h| e.actor_is_dynamic(h), |d| d.dynamic)
    }

    buffered_field!(global_pose, set_global_pose, Transform, global_pose, actor_global_pose);
    buffered_field!(linear_velocity, set_linear_velocity, Vec3, linear_velocity, actor_linear_velocity);
    buffered_field!(angular_velocity, set_angular_velocity, Vec3, angular_velocity, actor_angular_velocity);
    buffered_field!(mass, set_mass, f32, mass, actor_mass);
    buffered_field!(linear_damping, set_linear_damping, f32, linear_damping, actor_linear_damping);
    buffered_field!(angular_damping, set_angular_damping, f32, angular_damping, actor_angular_damping);
    buffered_field!(group, set_group, u16, group, actor_group);
    buffered_field!(dominance_group, set_dominance_group, u8, dominance_group, actor_dominance_group);
    buffered_field!(flags, set_flags, ActorFlags, flags, actor_flags);
    buffered_field!(body_flags, set_body_flags, BodyFlags, body_flags, actor_body_flags);
    buffered_field!(is_sleeping, set_sleeping, bool, sleeping, actor_sleeping);

    fn add_force(&mut self, force: Vec3) -> ProxyResult<()> {
        self.write(|f| f.force = Some(f.force.map_or(force, |acc| acc + force)))
    }
}

/// Direct view of an engine actor.
pub struct EngineActor<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: ActorHandle,
}

impl<'a, E: PhysicsScene> EngineActor<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: ActorHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ActorHandle {
        self.handle
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Actor, err)
    }
}

impl<E: PhysicsScene> ActorApi for EngineActor<'_, E> {
    fn is_dynamic(&self) -> ProxyResult<bool> {
        self.engine.actor_is_dynamic(self.handle).map_err(Self::fail)
    }

    engine_field!(global_pose, set_global_pose, Transform, actor_global_pose, set_actor_global_pose);
    engine_field!(linear_velocity, set_linear_velocity, Vec3, actor_linear_velocity, set_actor_linear_velocity);
    engine_field!(angular_velocity, set_angular_velocity, Vec3, actor_angular_velocity, set_actor_angular_velocity);
    engine_field!(mass, set_mass, f32, actor_mass, set_actor_mass);
    engine_field!(linear_damping, set_linear_damping, f32, actor_linear_damping, set_actor_linear_damping);
    engine_field!(angular_damping, set_angular_damping, f32, actor_angular_damping, set_actor_angular_damping);
    engine_field!(group, set_group, u16, actor_group, set_actor_group);
    engine_field!(dominance_group, set_dominance_group, u8, actor_dominance_group, set_actor_dominance_group);
    engine_field!(flags, set_flags, ActorFlags, actor_flags, set_actor_flags);
    engine_field!(body_flags, set_body_flags, BodyFlags, actor_body_flags, set_actor_body_flags);
    engine_field!(is_sleeping, set_sleeping, bool, actor_sleeping, set_actor_sleeping);

    fn add_force(&mut self, force: Vec3) -> ProxyResult<()> {
        self.engine.add_actor_force(self.handle, force).map_err(Self::fail)
    }
}
