//! Material proxies.
//!
//! Materials are addressed by index in a fixed table. The proxy layer
//! picks the index at creation, so the index is known before the engine
//! material exists and shapes may reference it right away.

use crate::api::MaterialApi;
use crate::engine::{MaterialDesc, MaterialFlags, MaterialIndex, PhysicsScene};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, SceneProxy};

use super::{Committer, DirectCommitter, EntityKind, ProxyKind, ProxyState, Record};

pub(crate) struct MaterialKind;

#[derive(Debug, Default)]
pub(crate) struct MaterialFields {
    pub dynamic_friction: Option<f32>,
    pub static_friction: Option<f32>,
    pub restitution: Option<f32>,
    pub flags: Option<MaterialFlags>,
}

impl ProxyKind for MaterialKind {
    const KIND: EntityKind = EntityKind::Material;
    type Desc = MaterialDesc;
    type Fields = MaterialFields;
    type Handle = MaterialIndex;
    /// Index reserved for the material.
    type Links = MaterialIndex;
}

impl<E: PhysicsScene> Committer<MaterialKind, E> for DirectCommitter {
    fn instance(&mut self, engine: &mut E, record: &Record<MaterialKind>) -> EngineResult<MaterialIndex> {
        engine.create_material(record.links, &record.desc)?;
        Ok(record.links)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        index: MaterialIndex,
        record: &mut Record<MaterialKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::Material;
        pass.apply(kind, "dynamic_friction", fields.dynamic_friction.take(), |v| {
            engine.set_material_dynamic_friction(index, v)
        });
        pass.apply(kind, "static_friction", fields.static_friction.take(), |v| {
            engine.set_material_static_friction(index, v)
        });
        pass.apply(kind, "restitution", fields.restitution.take(), |v| {
            engine.set_material_restitution(index, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_material_flags(index, v));
        true
    }
}

/// Buffered view of one material.
pub struct MaterialProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    index: MaterialIndex,
}

impl<'a, E: PhysicsScene> MaterialProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, index: MaterialIndex) -> Self {
        Self { scene, index }
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if no material holds the index.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self
            .scene
            .material_slot(self.index)
            .and_then(|slot| self.scene.materials.record(slot))
            .map(|record| record.state);
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&MaterialFields) -> Option<T>,
        current: impl FnOnce(&E, MaterialIndex) -> EngineResult<T>,
        initial: impl FnOnce(&MaterialDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self
            .scene
            .material_slot(self.index)
            .and_then(|slot| self.scene.materials.read(&self.scene.engine, slot, pending, current, initial));
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut MaterialFields)) -> ProxyResult<()> {
        let result = match self.scene.material_slot(self.index) {
            Ok(slot) => self.scene.materials.write(slot, apply),
            Err(err) => Err(err),
        };
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> MaterialApi for MaterialProxy<'_, E> {
    fn index(&self) -> MaterialIndex {
        self.index
    }

    buffered_field!(dynamic_friction, set_dynamic_friction, f32, dynamic_friction, material_dynamic_friction);
    buffered_field!(static_friction, set_static_friction, f32, static_friction, material_static_friction);
    buffered_field!(restitution, set_restitution, f32, restitution, material_restitution);
    buffered_field!(flags, set_flags, MaterialFlags, flags, material_flags);
}

/// Direct view of an engine material.
pub struct EngineMaterial<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: MaterialIndex,
}

impl<'a, E: PhysicsScene> EngineMaterial<'a, E> {
    /// Wraps material `index` of `engine`.
    pub fn new(engine: &'a mut E, index: MaterialIndex) -> Self {
        Self { engine, handle: index }
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Material, err)
    }
}

impl<E: PhysicsScene> MaterialApi for EngineMaterial<'_, E> {
    fn index(&self) -> MaterialIndex {
        self.handle
    }

    engine_field!(dynamic_friction, set_dynamic_friction, f32, material_dynamic_friction, set_material_dynamic_friction);
    engine_field!(static_friction, set_static_friction, f32, material_static_friction, set_material_static_friction);
    engine_field!(restitution, set_restitution, f32, material_restitution, set_material_restitution);
    engine_field!(flags, set_flags, MaterialFlags, material_flags, set_material_flags);
}
