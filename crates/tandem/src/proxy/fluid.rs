//! Fluid proxies.
//!
//! Particle emission is buffered like any other write: positions queue up
//! on the proxy and are handed to the engine in one batch at commit.

use tracing::debug;

use tandem_shared::Vec3;

use crate::api::FluidApi;
use crate::engine::{FluidDesc, FluidFlags, FluidHandle, PhysicsScene};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, SceneProxy};

use super::{Committer, DirectCommitter, EntityKind, FluidId, ProxyKind, ProxyState, Record};

pub(crate) struct FluidKind;

#[derive(Debug, Default)]
pub(crate) struct FluidFields {
    pub viscosity: Option<f32>,
    pub stiffness: Option<f32>,
    pub damping: Option<f32>,
    pub external_acceleration: Option<Vec3>,
    pub flags: Option<FluidFlags>,
    /// Emitted since the last commit.
    pub particles: Vec<Vec3>,
}

impl ProxyKind for FluidKind {
    const KIND: EntityKind = EntityKind::Fluid;
    type Desc = FluidDesc;
    type Fields = FluidFields;
    type Handle = FluidHandle;
    type Links = ();
}

impl<E: PhysicsScene> Committer<FluidKind, E> for DirectCommitter {
    fn instance(&mut self, engine: &mut E, record: &Record<FluidKind>) -> EngineResult<FluidHandle> {
        engine.create_fluid(&record.desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: FluidHandle,
        record: &mut Record<FluidKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::Fluid;
        pass.apply(kind, "viscosity", fields.viscosity.take(), |v| engine.set_fluid_viscosity(handle, v));
        pass.apply(kind, "stiffness", fields.stiffness.take(), |v| engine.set_fluid_stiffness(handle, v));
        pass.apply(kind, "damping", fields.damping.take(), |v| engine.set_fluid_damping(handle, v));
        pass.apply(kind, "external_acceleration", fields.external_acceleration.take(), |v| {
            engine.set_fluid_external_acceleration(handle, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_fluid_flags(handle, v));

        let particles = std::mem::take(&mut fields.particles);
        let requested = particles.len();
        pass.apply(kind, "particles", (requested > 0).then_some(particles), |positions| {
            let added = engine.add_fluid_particles(handle, &positions)?;
            if (added as usize) < requested {
                debug!(?handle, requested, added, "fluid at capacity, particles dropped");
            }
            Ok(())
        });
        true
    }
}

/// Buffered view of one fluid.
pub struct FluidProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: FluidId,
}

impl<'a, E: PhysicsScene> FluidProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: FluidId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> FluidId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the fluid has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.fluids.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&FluidFields) -> Option<T>,
        current: impl FnOnce(&E, FluidHandle) -> EngineResult<T>,
        initial: impl FnOnce(&FluidDesc) -> T,
    ) -> ProxyResult<T> {
        let result = self.scene.fluids.read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut FluidFields)) -> ProxyResult<()> {
        let result = self.scene.fluids.write(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> FluidApi for FluidProxy<'_, E> {
    buffered_field!(viscosity, set_viscosity, f32, viscosity, fluid_viscosity);
    buffered_field!(stiffness, set_stiffness, f32, stiffness, fluid_stiffness);
    buffered_field!(damping, set_damping, f32, damping, fluid_damping);
    buffered_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        external_acceleration,
        fluid_external_acceleration
    );
    buffered_field!(flags, set_flags, FluidFlags, flags, fluid_flags);

    fn add_particles(&mut self, positions: &[Vec3]) -> ProxyResult<()> {
        self.write(|f| f.particles.extend_from_slice(positions))
    }

    fn particle_count(&self) -> ProxyResult<u32> {
        let engine = &self.scene.engine;
        let result = self.scene.fluids.record(self.id.slot()).and_then(|record| {
            let current = match record.live_handle() {
                Some(handle) => engine
                    .fluid_particle_count(handle)
                    .map_err(|err| ProxyError::engine(EntityKind::Fluid, err))?,
                None => u32::try_from(record.desc.particles.len()).unwrap_or(u32::MAX),
            };
            let queued = u32::try_from(record.pending.particles.len()).unwrap_or(u32::MAX);
            Ok(current.saturating_add(queued).min(record.desc.max_particles))
        });
        self.scene.guard(result)
    }
}

/// Direct view of an engine fluid.
pub struct EngineFluid<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: FluidHandle,
}

impl<'a, E: PhysicsScene> EngineFluid<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: FluidHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> FluidHandle {
        self.handle
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Fluid, err)
    }
}

impl<E: PhysicsScene> FluidApi for EngineFluid<'_, E> {
    engine_field!(viscosity, set_viscosity, f32, fluid_viscosity, set_fluid_viscosity);
    engine_field!(stiffness, set_stiffness, f32, fluid_stiffness, set_fluid_stiffness);
    engine_field!(damping, set_damping, f32, fluid_damping, set_fluid_damping);
    engine_field!(
        external_acceleration,
        set_external_acceleration,
        Vec3,
        fluid_external_acceleration,
        set_fluid_external_acceleration
    );
    engine_field!(flags, set_flags, FluidFlags, fluid_flags, set_fluid_flags);

    fn add_particles(&mut self, positions: &[Vec3]) -> ProxyResult<()> {
        self.engine
            .add_fluid_particles(self.handle, positions)
            .map(|_| ())
            .map_err(Self::fail)
    }

    fn particle_count(&self) -> ProxyResult<u32> {
        self.engine.fluid_particle_count(self.handle).map_err(Self::fail)
    }
}
