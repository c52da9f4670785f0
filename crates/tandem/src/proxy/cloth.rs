//! Cloth proxies.

use tandem_shared::Vec3;

use crate::api::ClothApi;
use crate::engine::{ClothDesc, ClothFlags, ClothHandle, PhysicsScene};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, SceneProxy};

use super::{ClothId, Committer, DirectCommitter, EntityKind, ProxyKind, ProxyState, Record};

pub(crate) struct ClothKind;

#[derive(Debug, Default)]
pub(crate) struct ClothFields {
    pub bending_stiffness: Option<f32>,
    pub stretching_stiffness: Option<f32>,
    pub damping: Option<f32>,
    pub thickness: Option<f32>,
    pub external_acceleration: Option<Vec3>,
    pub flags: Option<ClothFlags>,
}

impl ProxyKind for ClothKind {
    const KIND: EntityKind = EntityKind::Cloth;
    type Desc = ClothDesc;
    type Fields = ClothFields;
    type Handle = ClothHandle;
    type Links = ();
}

impl<E: PhysicsScene> Committer<ClothKind, E> for DirectCommitter {
    fn instance(&mut self, engine: &mut E, record: &Record<ClothKind>) -> EngineResult<ClothHandle> {
        engine.create_cloth(&record.desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: ClothHandle,
        record: &mut Record<ClothKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::Cloth;
        pass.apply(kind, "bending_stiffness", fields.bending_stiffness.take(), |v| {
            engine.set_cloth_bending_stiffness(handle, v)
        });
        pass.apply(kind, "stretching_stiffness", fields.stretching_stiffness.take(), |v| {
            engine.set_cloth_stretching_stiffness(handle, v)
        });
        pass.apply(kind, "damping", fields.damping.take(), |v| engine.set_cloth_damping(handle, v));
        pass.apply(kind, "thickness", fields.thickness.take(), |v| engine.set_cloth_thickness(handle, v));
        pass.apply(kind, "external_acceleration", fields.external_acceleration.take(), |v| {
            engine.set_cloth_external_acceleration(handle, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_cloth_flags(handle, v));
        true
    }
}

/// Buffered view of one cloth.
pub struct ClothProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: ClothId,
}

impl<'a, E: PhysicsScene> ClothProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: ClothId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ClothId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the cloth has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.cloths.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&ClothFields) -> Option<T>,
        current: impl FnOnce(&E, ClothHandle) -> EngineResult<T>,
        initial: impl FnOnce(&ClothDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self.scene.cloths.read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut ClothFields)) -> ProxyResult<()> {
        let result = self.scene.cloths.write(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> ClothApi for ClothProxy<'_, E> {
    buffered_field!(bending_stiffness, set_bending_stiffness, f32, bending_stiffness, cloth_bending_stiffness);
    buffered_field!(
        stretching_stiffness,
        set_stretching_stiffness,
        f32,
        stretching_stiffness,
        cloth_stretching_stiffness
    );
    buffered_field!(damping, set_damping, f32, damping, cloth_damping);
    buffered_field!(thickness, set_thickness, f32, thickness, cloth_thickness);
    buffered_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        external_acceleration,
        cloth_external_acceleration
    );
    buffered_field!(flags, set_flags, ClothFlags, flags, cloth_flags);
}

/// Direct view of an engine cloth.
pub struct EngineCloth<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: ClothHandle,
}

impl<'a, E: PhysicsScene> EngineCloth<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: ClothHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ClothHandle {
        self.handle
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Cloth, err)
    }
}

impl<E: PhysicsScene> ClothApi for EngineCloth<'_, E> {
    engine_field!(
        bending_stiffness,
        set_bending_stiffness,
        f32,
        cloth_bending_stiffness,
        set_cloth_bending_stiffness
    );
    engine_field!(
        stretching_stiffness,
        set_stretching_stiffness,
        f32,
        cloth_stretching_stiffness,
        set_cloth_stretching_stiffness
    );
    engine_field!(damping, set_damping, f32, cloth_damping, set_cloth_damping);
    engine_field!(thickness, set_thickness, f32, cloth_thickness, set_cloth_thickness);
    engine_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        cloth_external_acceleration,
        set_cloth_external_acceleration
    );
    engine_field!(flags, set_flags, ClothFlags, cloth_flags, set_cloth_flags);
}
