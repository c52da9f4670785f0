//! Shape proxies.
//!
//! Shapes never sit in the dirty list themselves. A shape write marks its
//! owning actor, and the actor's flush instances and flushes the shape.

use tandem_core::SlotId;
use tandem_shared::Transform;

use crate::api::ShapeApi;
use crate::engine::{ActorHandle, MaterialIndex, PhysicsScene, ShapeDesc, ShapeFlags, ShapeHandle};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, SceneProxy};

use super::{ActorId, Committer, EntityKind, ProxyKind, ProxyState, Record, ShapeId};

pub(crate) struct ShapeKind;

#[derive(Debug, Default)]
pub(crate) struct ShapeFields {
    pub local_pose: Option<Transform>,
    pub group: Option<u16>,
    pub material: Option<MaterialIndex>,
    pub flags: Option<ShapeFlags>,
    pub skin_width: Option<f32>,
}

#[derive(Debug, Default)]
pub(crate) struct ShapeLinks {
    pub owner: SlotId,
}

impl ProxyKind for ShapeKind {
    const KIND: EntityKind = EntityKind::Shape;
    type Desc = ShapeDesc;
    type Fields = ShapeFields;
    type Handle = ShapeHandle;
    type Links = ShapeLinks;
}

/// Attaches shapes to an instanced actor.
pub(crate) struct ShapeCommitter {
    pub owner: ActorHandle,
}

impl<E: PhysicsScene> Committer<ShapeKind, E> for ShapeCommitter {
    fn instance(&mut self, engine: &mut E, record: &Record<ShapeKind>) -> EngineResult<ShapeHandle> {
        engine.create_shape(self.owner, &record.desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: ShapeHandle,
        record: &mut Record<ShapeKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::Shape;
        pass.apply(kind, "local_pose", fields.local_pose.take(), |v| {
            engine.set_shape_local_pose(handle, v)
        });
        pass.apply(kind, "group", fields.group.take(), |v| engine.set_shape_group(handle, v));
        pass.apply(kind, "material", fields.material.take(), |v| engine.set_shape_material(handle, v));
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_shape_flags(handle, v));
        pass.apply(kind, "skin_width", fields.skin_width.take(), |v| {
            engine.set_shape_skin_width(handle, v)
        });
        true
    }
}

/// Buffered view of one shape.
pub struct ShapeProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: ShapeId,
}

impl<'a, E: PhysicsScene> ShapeProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: ShapeId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the shape has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.shapes.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    /// Owning actor.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the shape has been deleted.
    pub fn actor(&self) -> ProxyResult<ActorId> {
        let result = self
            .scene
            .shapes
            .record(self.id.slot())
            .map(|record| ActorId::from_slot(record.links.owner));
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&ShapeFields) -> Option<T>,
        current: impl FnOnce(&E, ShapeHandle) -> EngineResult<T>,
        initial: impl FnOnce(&ShapeDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self.scene.shapes.read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut ShapeFields)) -> ProxyResult<()> {
        let result = self.scene.write_shape(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> ShapeApi for ShapeProxy<'_, E> {
    buffered_field!(local_pose, set_local_pose, Transform, local_pose, shape_local_pose);
    buffered_field!(group, set_group, u16, group, shape_group);
    buffered_field!(material, set_material, MaterialIndex, material, shape_material);
    buffered_field!(flags, set_flags, ShapeFlags, flags, shape_flags);
    buffered_field!(skin_width, set_skin_width, f32, skin_width, shape_skin_width);
}

/// Direct view of an engine shape.
pub struct EngineShape<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: ShapeHandle,
}

impl<'a, E: PhysicsScene> EngineShape<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: ShapeHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ShapeHandle {
        self.handle
    }

    /// Owning engine actor.
    ///
    /// # Errors
    ///
    /// Fails if the engine no longer knows the shape.
    pub fn actor(&self) -> ProxyResult<ActorHandle> {
        self.engine.shape_actor(self.handle).map_err(Self::fail)
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Shape, err)
    }
}

impl<E: PhysicsScene> ShapeApi for EngineShape<'_, E> {
    engine_field!(local_pose, set_local_pose, Transform, shape_local_pose, set_shape_local_pose);
    engine_field!(group, set_group, u16, shape_group, set_shape_group);
    engine_field!(material, set_material, MaterialIndex, shape_material, set_shape_material);
    engine_field!(flags, set_flags, ShapeFlags, shape_flags, set_shape_flags);
    engine_field!(skin_width, set_skin_width, f32, shape_skin_width, set_shape_skin_width);
}
