//! Soft body proxies.

use tandem_shared::Vec3;

use crate::api::SoftBodyApi;
use crate::engine::{PhysicsScene, SoftBodyDesc, SoftBodyFlags, SoftBodyHandle};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, SceneProxy};

use super::{Committer, DirectCommitter, EntityKind, ProxyKind, ProxyState, Record, SoftBodyId};

pub(crate) struct SoftBodyKind;

#[derive(Debug, Default)]
pub(crate) struct SoftBodyFields {
    pub volume_stiffness: Option<f32>,
    pub stretching_stiffness: Option<f32>,
    pub damping: Option<f32>,
    pub external_acceleration: Option<Vec3>,
    pub flags: Option<SoftBodyFlags>,
}

impl ProxyKind for SoftBodyKind {
    const KIND: EntityKind = EntityKind::SoftBody;
    type Desc = SoftBodyDesc;
    type Fields = SoftBodyFields;
    type Handle = SoftBodyHandle;
    type Links = ();
}

impl<E: PhysicsScene> Committer<SoftBodyKind, E> for DirectCommitter {
    fn instance(&mut self, engine: &mut E, record: &Record<SoftBodyKind>) -> EngineResult<SoftBodyHandle> {
        engine.create_soft_body(&record.desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: SoftBodyHandle,
        record: &mut Record<SoftBodyKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::SoftBody;
        pass.apply(kind, "volume_stiffness", fields.volume_stiffness.take(), |v| {
            engine.set_soft_body_volume_stiffness(handle, v)
        });
        pass.apply(kind, "stretching_stiffness", fields.stretching_stiffness.take(), |v| {
            engine.set_soft_body_stretching_stiffness(handle, v)
        });
        pass.apply(kind, "damping", fields.damping.take(), |v| engine.set_soft_body_damping(handle, v));
        pass.apply(kind, "external_acceleration", fields.external_acceleration.take(), |v| {
            engine.set_soft_body_external_acceleration(handle, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_soft_body_flags(handle, v));
        true
    }
}

/// Buffered view of one soft body.
pub struct SoftBodyProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: SoftBodyId,
}

impl<'a, E: PhysicsScene> SoftBodyProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: SoftBodyId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SoftBodyId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the soft body has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.soft_bodies.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&SoftBodyFields) -> Option<T>,
        current: impl FnOnce(&E, SoftBodyHandle) -> EngineResult<T>,
        initial: impl FnOnce(&SoftBodyDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self
            .scene
            .soft_bodies
            .read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut SoftBodyFields)) -> ProxyResult<()> {
        let result = self.scene.soft_bodies.write(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> SoftBodyApi for SoftBodyProxy<'_, E> {
    buffered_field!(volume_stiffness, set_volume_stiffness, f32, volume_stiffness, soft_body_volume_stiffness);
    buffered_field!(
        stretching_stiffness,
        set_stretching_stiffness,
        f32,
        stretching_stiffness,
        soft_body_stretching_stiffness
    );
    buffered_field!(damping, set_damping, f32, damping, soft_body_damping);
    buffered_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        external_acceleration,
        soft_body_external_acceleration
    );
    buffered_field!(flags, set_flags, SoftBodyFlags, flags, soft_body_flags);
}

/// Direct view of an engine soft body.
pub struct EngineSoftBody<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: SoftBodyHandle,
}

impl<'a, E: PhysicsScene> EngineSoftBody<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: SoftBodyHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> SoftBodyHandle {
        self.handle
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::SoftBody, err)
    }
}

impl<E: PhysicsScene> SoftBodyApi for EngineSoftBody<'_, E> {
    engine_field!(
        volume_stiffness,
        set_volume_stiffness,
        f32,
        soft_body_volume_stiffness,
        set_soft_body_volume_stiffness
    );
    engine_field!(
        stretching_stiffness,
        set_stretching_stiffness,
        f32,
        soft_body_stretching_stiffness,
        set_soft_body_stretching_stiffness
    );
    engine_field!(damping, set_damping, f32, soft_body_damping, set_soft_body_damping);
    engine_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        soft_body_external_acceleration,
        set_soft_body_external_acceleration
    );
    engine_field!(flags, set_flags, SoftBodyFlags, soft_body_flags, set_soft_body_flags);
}
