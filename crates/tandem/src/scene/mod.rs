//! # Scene Proxy
//!
//! Owns the engine scene and every proxy, and decides when buffered state
//! reaches the engine.
//!
//! ## Cycle
//!
//! ```text
//!   client ──► create / set / release ──► buffers (any time, never blocks)
//!
//!   fetch_results(true) ──► commit_updates() ──► commit_deletes() ──► simulate(dt)
//!        ▲                                                                │
//!        └──────────────────────── step in flight ◄───────────────────────┘
//! ```
//!
//! While a step is in flight the [`SimulationGate`] is closed: commits,
//! `simulate` and raw engine access fail with [`ProxyError::NotWritable`].
//! Buffered reads and writes keep working.
//!
//! ## Per-kind bookkeeping
//!
//! ```text
//!   live   ── every entity not released          (IndexedRegistry)
//!   dirty  ── live entities with pending state   (IndexedRegistry)
//!   dead   ── released, waiting for commit_deletes
//! ```
//!
//! Shapes are the exception: their state is folded into the owning
//! actor's commit, so they never enter a dirty registry.

mod commit;
mod events;
mod store;

pub use commit::{CommitStats, DeleteStats, KindCounts, PendingCounts};

pub(crate) use commit::CommitPass;
pub(crate) use store::KindStore;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tandem_core::{IndexPool, PairFlagTable, SimulationGate, SlotId};

use crate::api::{ActorRef, ClothRef, EntityRef, FluidRef, JointRef, ShapeRef, SoftBodyRef};
use crate::callbacks::{CommitFailureSink, EventStats, LogFailureSink, SimulationCallbacks};
use crate::config::{MisusePolicy, SceneConfig};
use crate::engine::{
    ActorDesc, ActorHandle, ClothDesc, ClothHandle, FluidDesc, FluidHandle, JointDesc, JointHandle,
    MaterialDesc, MaterialIndex, PairFlags, PhysicsScene, ShapeDesc, ShapeHandle, SoftBodyDesc,
    SoftBodyHandle,
};
use crate::error::{ConfigError, EngineResult, ProxyError, ProxyResult};
use crate::proxy::{
    ActorCommitter, ActorId, ActorKind, ActorLinks, ActorProxy, ClothId, ClothKind, ClothProxy,
    Committer, DirectCommitter, EntityKind, FluidId, FluidKind, FluidProxy, JointCommitter, JointId,
    JointKind, JointProxy, MaterialKind, MaterialProxy, ProxyKind, ProxyState, ShapeFields, ShapeId,
    ShapeKind, ShapeLinks, ShapeProxy, SoftBodyId, SoftBodyKind, SoftBodyProxy,
};

use commit::flush_pairs;
use events::EventFilter;

/// Buffered front for a [`PhysicsScene`].
pub struct SceneProxy<E: PhysicsScene> {
    pub(crate) engine: E,
    config: SceneConfig,
    gate: Arc<SimulationGate>,

    pub(crate) actors: KindStore<ActorKind>,
    pub(crate) shapes: KindStore<ShapeKind>,
    pub(crate) joints: KindStore<JointKind>,
    pub(crate) materials: KindStore<MaterialKind>,
    pub(crate) fluids: KindStore<FluidKind>,
    pub(crate) cloths: KindStore<ClothKind>,
    pub(crate) soft_bodies: KindStore<SoftBodyKind>,

    material_pool: IndexPool,
    /// Record slot per material index, `SlotId::NULL` when unused.
    material_slots: Vec<SlotId>,

    actor_pairs: PairFlagTable<SlotId, PairFlags>,
    shape_pairs: PairFlagTable<SlotId, PairFlags>,
    pending_actor_pairs: PairFlagTable<SlotId, ()>,
    pending_shape_pairs: PairFlagTable<SlotId, ()>,

    failure_sink: Arc<dyn CommitFailureSink>,
    callbacks: Box<dyn SimulationCallbacks>,
    event_stats: EventStats,
}

impl<E: PhysicsScene> SceneProxy<E> {
    /// Wraps `engine`.
    ///
    /// Material index 0 is the engine's default material and exists from
    /// the start.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` does not validate.
    pub fn new(engine: E, config: SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.initial_capacity;
        let max_materials = usize::from(config.max_materials);

        let mut material_pool = IndexPool::new(max_materials);
        material_pool
            .reserve(u32::from(MaterialIndex::DEFAULT.0))
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let mut materials = KindStore::with_capacity(capacity.min(max_materials));
        let default_slot = materials
            .adopt(MaterialDesc::default(), MaterialIndex::DEFAULT, MaterialIndex::DEFAULT)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let mut material_slots = vec![SlotId::NULL; max_materials];
        material_slots[usize::from(MaterialIndex::DEFAULT.0)] = default_slot;

        info!(max_materials, capacity, misuse = ?config.misuse, "scene proxy created");

        Ok(Self {
            engine,
            gate: SimulationGate::shared(),
            actors: KindStore::with_capacity(capacity),
            shapes: KindStore::with_capacity(capacity),
            joints: KindStore::with_capacity(capacity),
            materials,
            fluids: KindStore::with_capacity(capacity),
            cloths: KindStore::with_capacity(capacity),
            soft_bodies: KindStore::with_capacity(capacity),
            material_pool,
            material_slots,
            actor_pairs: PairFlagTable::new(),
            shape_pairs: PairFlagTable::new(),
            pending_actor_pairs: PairFlagTable::new(),
            pending_shape_pairs: PairFlagTable::new(),
            failure_sink: Arc::new(LogFailureSink),
            callbacks: Box::new(()),
            event_stats: EventStats::default(),
            config,
        })
    }

    /// Replaces the instancing failure sink.
    #[must_use]
    pub fn with_failure_sink(mut self, sink: Arc<dyn CommitFailureSink>) -> Self {
        self.failure_sink = sink;
        self
    }

    /// Installs the receiver of filtered simulation events.
    pub fn set_callbacks(&mut self, callbacks: Box<dyn SimulationCallbacks>) {
        self.callbacks = callbacks;
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    /// The wrapped engine, read only.
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The wrapped engine, for direct writes between steps.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight.
    pub fn engine_mut(&mut self) -> ProxyResult<&mut E> {
        if let Err(err) = self.writable() {
            return self.guard(Err(err));
        }
        Ok(&mut self.engine)
    }

    /// The write barrier, shareable with other threads.
    #[must_use]
    pub fn gate(&self) -> Arc<SimulationGate> {
        Arc::clone(&self.gate)
    }

    /// Returns `true` if no step is in flight.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.gate.is_writable()
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Delivered and filtered event counts since creation.
    #[inline]
    #[must_use]
    pub fn event_stats(&self) -> EventStats {
        self.event_stats
    }

    /// Live, dirty and dead counts per kind.
    #[must_use]
    pub fn pending(&self) -> PendingCounts {
        PendingCounts {
            actors: self.actors.counts(),
            shapes: self.shapes.counts(),
            joints: self.joints.counts(),
            materials: self.materials.counts(),
            fluids: self.fluids.counts(),
            cloths: self.cloths.counts(),
            soft_bodies: self.soft_bodies.counts(),
        }
    }

    /// Applies the misuse policy to `result`.
    ///
    /// # Panics
    ///
    /// On a misuse error under [`MisusePolicy::Panic`].
    pub(crate) fn guard<T>(&self, result: ProxyResult<T>) -> ProxyResult<T> {
        if let Err(err) = &result {
            if err.is_misuse() {
                match self.config.misuse {
                    MisusePolicy::Panic => panic!("proxy misuse: {err}"),
                    MisusePolicy::Report => warn!(error = %err, "proxy misuse"),
                }
            }
        }
        result
    }

    fn writable(&self) -> ProxyResult<()> {
        if self.gate.is_writable() {
            Ok(())
        } else {
            Err(ProxyError::NotWritable)
        }
    }

    // =========================================================================
    // ACTORS AND SHAPES
    // =========================================================================

    /// Buffers a new actor. Shapes in `desc` become shape proxies.
    ///
    /// # Errors
    ///
    /// Only on internal registry corruption.
    pub fn create_actor(&mut self, mut desc: ActorDesc) -> ProxyResult<ActorId> {
        let shapes = std::mem::take(&mut desc.shapes);
        let result = buffer_new(&mut self.actors, desc, ActorLinks::default()).and_then(|slot| {
            for shape in shapes {
                self.attach_shape(slot, shape)?;
            }
            Ok(ActorId::from_slot(slot))
        });
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn actor(&mut self, id: ActorId) -> ActorProxy<'_, E> {
        ActorProxy::new(self, id)
    }

    /// Releases `id` together with its shapes and attached joints.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_actor(&mut self, id: ActorId) -> ProxyResult<()> {
        let result = self.drop_actor(id.slot());
        self.guard(result)
    }

    /// Live actors.
    #[must_use]
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.live_ids().iter().copied().map(ActorId::from_slot).collect()
    }

    /// Number of live actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.live_ids().len()
    }

    /// Buffers a new shape on `actor`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AwaitingDelete`] if the actor was released.
    pub fn create_shape(&mut self, actor: ActorId, desc: ShapeDesc) -> ProxyResult<ShapeId> {
        let result = self.attach_shape(actor.slot(), desc).map(ShapeId::from_slot);
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn shape(&mut self, id: ShapeId) -> ShapeProxy<'_, E> {
        ShapeProxy::new(self, id)
    }

    /// Releases `id` and detaches it from its actor.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_shape(&mut self, id: ShapeId) -> ProxyResult<()> {
        let result = self.drop_shape(id.slot());
        self.guard(result)
    }

    /// Live shapes.
    #[must_use]
    pub fn shape_ids(&self) -> Vec<ShapeId> {
        self.shapes.live_ids().iter().copied().map(ShapeId::from_slot).collect()
    }

    /// Number of live shapes.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.live_ids().len()
    }

    fn attach_shape(&mut self, owner: SlotId, desc: ShapeDesc) -> ProxyResult<SlotId> {
        self.actors.writable(owner)?;
        let slot = self.shapes.create(desc, ShapeLinks { owner })?;
        let actor = self.actors.writable(owner)?;
        actor.links.shapes.push(slot);
        actor.pending.shapes_changed = true;
        self.actors.mark_dirty(owner)?;
        Ok(slot)
    }

    /// Buffered shape write; the owner carries the change to the engine.
    pub(crate) fn write_shape(&mut self, slot: SlotId, apply: impl FnOnce(&mut ShapeFields)) -> ProxyResult<()> {
        apply(&mut self.shapes.writable(slot)?.pending);
        let owner = self.shapes.record(slot)?.links.owner;
        self.actors.writable(owner)?.pending.shapes_changed = true;
        self.actors.mark_dirty(owner)
    }

    fn drop_actor(&mut self, slot: SlotId) -> ProxyResult<()> {
        self.actors.release(slot)?;
        let links = &self.actors.record(slot)?.links;
        let (shapes, joints) = (links.shapes.clone(), links.joints.clone());

        for shape in shapes {
            if self.shapes.is_live(shape) {
                self.shapes.release(shape)?;
            }
        }
        for joint in joints {
            if self.joints.is_live(joint) {
                warn!(%joint, actor = %slot, "releasing joint attached to released actor");
                self.drop_joint(joint)?;
            }
        }
        Ok(())
    }

    fn drop_shape(&mut self, slot: SlotId) -> ProxyResult<()> {
        self.shapes.release(slot)?;
        let owner = self.shapes.record(slot)?.links.owner;
        if let Ok(actor) = self.actors.record_mut(owner) {
            actor.links.shapes.retain(|&shape| shape != slot);
        }
        Ok(())
    }

    // =========================================================================
    // JOINTS
    // =========================================================================

    /// Buffers a new joint between live actors.
    ///
    /// # Errors
    ///
    /// [`ProxyError::SelfPair`] if both sides name the same actor,
    /// [`ProxyError::AwaitingDelete`] if an actor was released.
    pub fn create_joint(&mut self, desc: JointDesc<ActorId>) -> ProxyResult<JointId> {
        let result = self.insert_joint(desc);
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn joint(&mut self, id: JointId) -> JointProxy<'_, E> {
        JointProxy::new(self, id)
    }

    /// Releases `id`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_joint(&mut self, id: JointId) -> ProxyResult<()> {
        let result = self.drop_joint(id.slot());
        self.guard(result)
    }

    /// Live joints.
    #[must_use]
    pub fn joint_ids(&self) -> Vec<JointId> {
        self.joints.live_ids().iter().copied().map(JointId::from_slot).collect()
    }

    /// Number of live joints.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.live_ids().len()
    }

    fn insert_joint(&mut self, desc: JointDesc<ActorId>) -> ProxyResult<JointId> {
        if let [Some(a), Some(b)] = desc.actors {
            if a == b {
                return Err(ProxyError::SelfPair);
            }
        }
        for actor in desc.actors.iter().flatten() {
            self.actors.writable(actor.slot())?;
        }

        let actors = desc.actors;
        let slot = buffer_new(&mut self.joints, desc, ())?;
        for actor in actors.iter().flatten() {
            self.actors.record_mut(actor.slot())?.links.joints.push(slot);
        }
        Ok(JointId::from_slot(slot))
    }

    fn drop_joint(&mut self, slot: SlotId) -> ProxyResult<()> {
        self.joints.release(slot)?;
        let actors = self.joints.record(slot)?.desc.actors;
        for actor in actors.iter().flatten() {
            if let Ok(record) = self.actors.record_mut(actor.slot()) {
                record.links.joints.retain(|&joint| joint != slot);
            }
        }
        Ok(())
    }

    // =========================================================================
    // MATERIALS
    // =========================================================================

    /// Reserves a material index and buffers the material behind it.
    ///
    /// # Errors
    ///
    /// [`ProxyError::MaterialIndicesExhausted`] when every index is in use
    /// or waiting for `commit_deletes`.
    pub fn create_material(&mut self, desc: MaterialDesc) -> ProxyResult<MaterialIndex> {
        let capacity = self.material_pool.capacity();
        let Some(index) = self
            .material_pool
            .allocate()
            .ok()
            .and_then(|raw| u16::try_from(raw).ok())
            .map(MaterialIndex)
        else {
            return Err(ProxyError::MaterialIndicesExhausted { capacity });
        };

        let result = buffer_new(&mut self.materials, desc, index).map(|slot| {
            self.material_slots[usize::from(index.0)] = slot;
            index
        });
        self.guard(result)
    }

    /// Buffered view of material `index`.
    pub fn material(&mut self, index: MaterialIndex) -> MaterialProxy<'_, E> {
        MaterialProxy::new(self, index)
    }

    /// Releases material `index`. The index is reusable after
    /// `commit_deletes`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::DefaultMaterial`] for index 0,
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_material(&mut self, index: MaterialIndex) -> ProxyResult<()> {
        let result = if index.is_default() {
            Err(ProxyError::DefaultMaterial)
        } else {
            self.material_slot(index).and_then(|slot| self.materials.release(slot))
        };
        self.guard(result)
    }

    /// Indices of live materials, including the default one.
    #[must_use]
    pub fn material_indices(&self) -> Vec<MaterialIndex> {
        self.materials
            .live_ids()
            .iter()
            .filter_map(|&slot| self.materials.record(slot).ok())
            .map(|record| record.links)
            .collect()
    }

    /// Number of live materials, including the default one.
    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.live_ids().len()
    }

    pub(crate) fn material_slot(&self, index: MaterialIndex) -> ProxyResult<SlotId> {
        self.material_slots
            .get(usize::from(index.0))
            .copied()
            .filter(|slot| !slot.is_null())
            .ok_or(ProxyError::StaleHandle { kind: EntityKind::Material })
    }

    // =========================================================================
    // FLUIDS, CLOTHS, SOFT BODIES
    // =========================================================================

    /// Buffers a new fluid.
    ///
    /// # Errors
    ///
    /// Only on internal registry corruption.
    pub fn create_fluid(&mut self, desc: FluidDesc) -> ProxyResult<FluidId> {
        let result = buffer_new(&mut self.fluids, desc, ()).map(FluidId::from_slot);
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn fluid(&mut self, id: FluidId) -> FluidProxy<'_, E> {
        FluidProxy::new(self, id)
    }

    /// Releases `id`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_fluid(&mut self, id: FluidId) -> ProxyResult<()> {
        let result = self.fluids.release(id.slot());
        self.guard(result)
    }

    /// Live fluids.
    #[must_use]
    pub fn fluid_ids(&self) -> Vec<FluidId> {
        self.fluids.live_ids().iter().copied().map(FluidId::from_slot).collect()
    }

    /// Number of live fluids.
    #[must_use]
    pub fn fluid_count(&self) -> usize {
        self.fluids.live_ids().len()
    }

    /// Buffers a new cloth.
    ///
    /// # Errors
    ///
    /// Only on internal registry corruption.
    pub fn create_cloth(&mut self, desc: ClothDesc) -> ProxyResult<ClothId> {
        let result = buffer_new(&mut self.cloths, desc, ()).map(ClothId::from_slot);
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn cloth(&mut self, id: ClothId) -> ClothProxy<'_, E> {
        ClothProxy::new(self, id)
    }

    /// Releases `id`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_cloth(&mut self, id: ClothId) -> ProxyResult<()> {
        let result = self.cloths.release(id.slot());
        self.guard(result)
    }

    /// Live cloths.
    #[must_use]
    pub fn cloth_ids(&self) -> Vec<ClothId> {
        self.cloths.live_ids().iter().copied().map(ClothId::from_slot).collect()
    }

    /// Number of live cloths.
    #[must_use]
    pub fn cloth_count(&self) -> usize {
        self.cloths.live_ids().len()
    }

    /// Buffers a new soft body.
    ///
    /// # Errors
    ///
    /// Only on internal registry corruption.
    pub fn create_soft_body(&mut self, desc: SoftBodyDesc) -> ProxyResult<SoftBodyId> {
        let result = buffer_new(&mut self.soft_bodies, desc, ()).map(SoftBodyId::from_slot);
        self.guard(result)
    }

    /// Buffered view of `id`.
    pub fn soft_body(&mut self, id: SoftBodyId) -> SoftBodyProxy<'_, E> {
        SoftBodyProxy::new(self, id)
    }

    /// Releases `id`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::AlreadyReleased`] or [`ProxyError::StaleHandle`].
    pub fn release_soft_body(&mut self, id: SoftBodyId) -> ProxyResult<()> {
        let result = self.soft_bodies.release(id.slot());
        self.guard(result)
    }

    /// Live soft bodies.
    #[must_use]
    pub fn soft_body_ids(&self) -> Vec<SoftBodyId> {
        self.soft_bodies.live_ids().iter().copied().map(SoftBodyId::from_slot).collect()
    }

    /// Number of live soft bodies.
    #[must_use]
    pub fn soft_body_count(&self) -> usize {
        self.soft_bodies.live_ids().len()
    }

    // =========================================================================
    // PAIR FLAGS
    // =========================================================================

    /// Sets the contact flags of an actor pair. Order does not matter.
    ///
    /// The value is visible through [`actor_pair_flags`](Self::actor_pair_flags)
    /// at once and reaches the engine at the first commit where both actors
    /// are instanced.
    ///
    /// # Errors
    ///
    /// [`ProxyError::SelfPair`] if `a == b`, [`ProxyError::AwaitingDelete`]
    /// if either actor was released.
    pub fn set_actor_pair_flags(&mut self, a: ActorId, b: ActorId, flags: PairFlags) -> ProxyResult<()> {
        let result = set_pair(
            &self.actors,
            &mut self.actor_pairs,
            &mut self.pending_actor_pairs,
            a.slot(),
            b.slot(),
            flags,
        );
        self.guard(result)
    }

    /// Flags last set for an actor pair.
    #[must_use]
    pub fn actor_pair_flags(&self, a: ActorId, b: ActorId) -> Option<PairFlags> {
        self.actor_pairs.get(a.slot(), b.slot())
    }

    /// Sets the contact flags of a shape pair. Order does not matter.
    ///
    /// # Errors
    ///
    /// [`ProxyError::SelfPair`] if `a == b`, [`ProxyError::AwaitingDelete`]
    /// if either shape was released.
    pub fn set_shape_pair_flags(&mut self, a: ShapeId, b: ShapeId, flags: PairFlags) -> ProxyResult<()> {
        let result = set_pair(
            &self.shapes,
            &mut self.shape_pairs,
            &mut self.pending_shape_pairs,
            a.slot(),
            b.slot(),
            flags,
        );
        self.guard(result)
    }

    /// Flags last set for a shape pair.
    #[must_use]
    pub fn shape_pair_flags(&self, a: ShapeId, b: ShapeId) -> Option<PairFlags> {
        self.shape_pairs.get(a.slot(), b.slot())
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Pushes every buffered change to the engine.
    ///
    /// Kinds commit in the order materials, actors (with their shapes),
    /// joints, fluids, cloths, soft bodies, then pair flags. An entity the
    /// engine refuses to instance is reported to the failure sink and
    /// stays dirty; the rest of the pass goes on.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight.
    pub fn commit_updates(&mut self) -> ProxyResult<CommitStats> {
        if let Err(err) = self.writable() {
            return self.guard(Err(err));
        }

        let mut pass = CommitPass::new(&*self.failure_sink);
        self.materials.commit_dirty(&mut self.engine, &mut DirectCommitter, &mut pass);
        self.actors.commit_dirty(
            &mut self.engine,
            &mut ActorCommitter { shapes: &mut self.shapes },
            &mut pass,
        );
        self.joints.commit_dirty(
            &mut self.engine,
            &mut JointCommitter { actors: &self.actors },
            &mut pass,
        );
        self.fluids.commit_dirty(&mut self.engine, &mut DirectCommitter, &mut pass);
        self.cloths.commit_dirty(&mut self.engine, &mut DirectCommitter, &mut pass);
        self.soft_bodies.commit_dirty(&mut self.engine, &mut DirectCommitter, &mut pass);

        flush_pairs(
            &mut self.engine,
            &self.actors,
            &self.actor_pairs,
            &mut self.pending_actor_pairs,
            &mut pass.stats,
            |engine, a, b, flags| engine.set_actor_pair_flags(a, b, flags),
        );
        flush_pairs(
            &mut self.engine,
            &self.shapes,
            &self.shape_pairs,
            &mut self.pending_shape_pairs,
            &mut pass.stats,
            |engine, a, b, flags| engine.set_shape_pair_flags(a, b, flags),
        );

        let stats = pass.stats;
        debug!(
            instanced = stats.instanced,
            flushed = stats.flushed,
            failed = stats.failed,
            rejected = stats.rejected,
            pairs = stats.pairs_applied,
            "updates committed"
        );
        Ok(stats)
    }

    /// Destroys the engine objects of released entities and frees their
    /// proxies. Ids of freed proxies turn stale; released material
    /// indices become reusable.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight.
    pub fn commit_deletes(&mut self) -> ProxyResult<DeleteStats> {
        if let Err(err) = self.writable() {
            return self.guard(Err(err));
        }
        let mut stats = DeleteStats::default();

        for (_, record) in self.joints.drain_dead() {
            destroy(&mut stats, EntityKind::Joint, record.handle, |h| self.engine.release_joint(h));
        }

        let mut freed_shapes = HashSet::new();
        for (slot, record) in self.shapes.drain_dead() {
            // Destroying the actor takes its shapes along.
            let owner_live = self.actors.is_live(record.links.owner);
            destroy(&mut stats, EntityKind::Shape, record.handle, |h| {
                if owner_live {
                    self.engine.release_shape(h)
                } else {
                    Ok(())
                }
            });
            freed_shapes.insert(slot);
        }

        let mut freed_actors = HashSet::new();
        for (slot, record) in self.actors.drain_dead() {
            destroy(&mut stats, EntityKind::Actor, record.handle, |h| self.engine.release_actor(h));
            freed_actors.insert(slot);
        }

        for (_, record) in self.fluids.drain_dead() {
            destroy(&mut stats, EntityKind::Fluid, record.handle, |h| self.engine.release_fluid(h));
        }
        for (_, record) in self.cloths.drain_dead() {
            destroy(&mut stats, EntityKind::Cloth, record.handle, |h| self.engine.release_cloth(h));
        }
        for (_, record) in self.soft_bodies.drain_dead() {
            destroy(&mut stats, EntityKind::SoftBody, record.handle, |h| {
                self.engine.release_soft_body(h)
            });
        }

        for (_, record) in self.materials.drain_dead() {
            let index = record.links;
            destroy(&mut stats, EntityKind::Material, record.handle, |i| {
                self.engine.release_material(i)
            });
            self.material_pool.free(u32::from(index.0));
            if let Some(slot) = self.material_slots.get_mut(usize::from(index.0)) {
                *slot = SlotId::NULL;
            }
            stats.materials_recycled += 1;
        }

        stats.pairs_purged += purge_pairs(&mut self.actor_pairs, &mut self.pending_actor_pairs, &freed_actors);
        stats.pairs_purged += purge_pairs(&mut self.shape_pairs, &mut self.pending_shape_pairs, &freed_shapes);

        debug!(
            destroyed = stats.destroyed,
            discarded = stats.discarded,
            materials = stats.materials_recycled,
            pairs = stats.pairs_purged,
            "deletes committed"
        );
        Ok(stats)
    }

    /// `commit_updates` followed by `commit_deletes`.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight.
    pub fn flush(&mut self) -> ProxyResult<(CommitStats, DeleteStats)> {
        let updates = self.commit_updates()?;
        let deletes = self.commit_deletes()?;
        Ok((updates, deletes))
    }

    // =========================================================================
    // STEPPING
    // =========================================================================

    /// Closes the gate and starts a step.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] if a step is already in flight.
    pub fn simulate(&mut self, dt: f32) -> ProxyResult<()> {
        if !self.gate.try_begin() {
            return self.guard(Err(ProxyError::NotWritable));
        }
        debug!(dt, frame = self.gate.frame_count(), "step started");
        self.engine.simulate(dt);
        Ok(())
    }

    /// Polls or waits for the step in flight and delivers its events.
    ///
    /// Returns `false` if a non-blocking poll found the step unfinished.
    /// On completion the gate reopens and joints whose break callback
    /// asked for it are released.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotSimulating`] if no step is in flight.
    pub fn fetch_results(&mut self, block: bool) -> ProxyResult<bool> {
        if self.gate.is_writable() {
            return self.guard(Err(ProxyError::NotSimulating));
        }

        let mut filter = EventFilter {
            actors: &self.actors,
            shapes: &self.shapes,
            joints: &self.joints,
            callbacks: &mut *self.callbacks,
            stats: &mut self.event_stats,
            broken: Vec::new(),
        };
        let done = self.engine.fetch_results(block, &mut filter);
        let broken = filter.broken;
        if !done {
            return Ok(false);
        }
        self.gate.finish();

        if self.config.release_broken_joints {
            for joint in broken {
                if !self.joints.is_live(joint.slot()) {
                    continue;
                }
                match self.drop_joint(joint.slot()) {
                    Ok(()) => debug!(%joint, "broken joint released"),
                    Err(err) => warn!(%joint, error = %err, "broken joint could not be released"),
                }
            }
        }
        debug!(frame = self.gate.frame_count(), "step finished");
        Ok(true)
    }

    // =========================================================================
    // BUFFERED / UNBUFFERED CONVERSION
    // =========================================================================

    /// Resolves `actor` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known actor.
    pub fn as_buffered_actor(&self, actor: ActorRef) -> ProxyResult<ActorId> {
        let result = to_buffered(&self.actors, actor.map_proxy(ActorId::slot)).map(ActorId::from_slot);
        self.guard(result)
    }

    /// Resolves `actor` to its engine handle, committing it first if it
    /// has pending state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the actor.
    pub fn as_unbuffered_actor(&mut self, actor: ActorRef) -> ProxyResult<ActorHandle> {
        let result = self.unbuffer_actor(actor);
        self.guard(result)
    }

    /// Resolves `shape` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known shape.
    pub fn as_buffered_shape(&self, shape: ShapeRef) -> ProxyResult<ShapeId> {
        let result = to_buffered(&self.shapes, shape.map_proxy(ShapeId::slot)).map(ShapeId::from_slot);
        self.guard(result)
    }

    /// Resolves `shape` to its engine handle, committing its actor first
    /// if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the shape.
    pub fn as_unbuffered_shape(&mut self, shape: ShapeRef) -> ProxyResult<ShapeHandle> {
        let result = self.unbuffer_shape(shape);
        self.guard(result)
    }

    /// Resolves `joint` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known joint.
    pub fn as_buffered_joint(&self, joint: JointRef) -> ProxyResult<JointId> {
        let result = to_buffered(&self.joints, joint.map_proxy(JointId::slot)).map(JointId::from_slot);
        self.guard(result)
    }

    /// Resolves `joint` to its engine handle, committing it and its actors
    /// first if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the joint.
    pub fn as_unbuffered_joint(&mut self, joint: JointRef) -> ProxyResult<JointHandle> {
        let result = self.unbuffer_joint(joint);
        self.guard(result)
    }

    /// Resolves `fluid` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known fluid.
    pub fn as_buffered_fluid(&self, fluid: FluidRef) -> ProxyResult<FluidId> {
        let result = to_buffered(&self.fluids, fluid.map_proxy(FluidId::slot)).map(FluidId::from_slot);
        self.guard(result)
    }

    /// Resolves `fluid` to its engine handle, committing it first if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the fluid.
    pub fn as_unbuffered_fluid(&mut self, fluid: FluidRef) -> ProxyResult<FluidHandle> {
        let result = self.writable().and_then(|()| {
            let slot = to_buffered(&self.fluids, fluid.map_proxy(FluidId::slot))?;
            let sink = &*self.failure_sink;
            commit_now(&mut self.fluids, &mut self.engine, &mut DirectCommitter, sink, slot)
        });
        self.guard(result)
    }

    /// Resolves `cloth` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known cloth.
    pub fn as_buffered_cloth(&self, cloth: ClothRef) -> ProxyResult<ClothId> {
        let result = to_buffered(&self.cloths, cloth.map_proxy(ClothId::slot)).map(ClothId::from_slot);
        self.guard(result)
    }

    /// Resolves `cloth` to its engine handle, committing it first if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the cloth.
    pub fn as_unbuffered_cloth(&mut self, cloth: ClothRef) -> ProxyResult<ClothHandle> {
        let result = self.writable().and_then(|()| {
            let slot = to_buffered(&self.cloths, cloth.map_proxy(ClothId::slot))?;
            let sink = &*self.failure_sink;
            commit_now(&mut self.cloths, &mut self.engine, &mut DirectCommitter, sink, slot)
        });
        self.guard(result)
    }

    /// Resolves `body` to its proxy id.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] if neither side names a known soft body.
    pub fn as_buffered_soft_body(&self, body: SoftBodyRef) -> ProxyResult<SoftBodyId> {
        let result =
            to_buffered(&self.soft_bodies, body.map_proxy(SoftBodyId::slot)).map(SoftBodyId::from_slot);
        self.guard(result)
    }

    /// Resolves `body` to its engine handle, committing it first if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::NotWritable`] while a step is in flight,
    /// [`ProxyError::NotInstanced`] if the engine refused the soft body.
    pub fn as_unbuffered_soft_body(&mut self, body: SoftBodyRef) -> ProxyResult<SoftBodyHandle> {
        let result = self.writable().and_then(|()| {
            let slot = to_buffered(&self.soft_bodies, body.map_proxy(SoftBodyId::slot))?;
            let sink = &*self.failure_sink;
            commit_now(&mut self.soft_bodies, &mut self.engine, &mut DirectCommitter, sink, slot)
        });
        self.guard(result)
    }

    fn unbuffer_actor(&mut self, actor: ActorRef) -> ProxyResult<ActorHandle> {
        self.writable()?;
        let slot = to_buffered(&self.actors, actor.map_proxy(ActorId::slot))?;
        let sink = &*self.failure_sink;
        commit_now(
            &mut self.actors,
            &mut self.engine,
            &mut ActorCommitter { shapes: &mut self.shapes },
            sink,
            slot,
        )
    }

    fn unbuffer_shape(&mut self, shape: ShapeRef) -> ProxyResult<ShapeHandle> {
        self.writable()?;
        let slot = to_buffered(&self.shapes, shape.map_proxy(ShapeId::slot))?;
        let owner = self.shapes.record(slot)?.links.owner;
        if self.actors.is_live(owner) {
            self.unbuffer_actor(EntityRef::Proxy(ActorId::from_slot(owner)))?;
        }
        self.shapes
            .handle_of(slot)
            .ok_or(ProxyError::NotInstanced { kind: EntityKind::Shape })
    }

    fn unbuffer_joint(&mut self, joint: JointRef) -> ProxyResult<JointHandle> {
        self.writable()?;
        let slot = to_buffered(&self.joints, joint.map_proxy(JointId::slot))?;
        let actors = self.joints.record(slot)?.desc.actors;
        for actor in actors.iter().flatten() {
            if self.actors.is_live(actor.slot()) {
                self.unbuffer_actor(EntityRef::Proxy(*actor))?;
            }
        }
        let sink = &*self.failure_sink;
        commit_now(
            &mut self.joints,
            &mut self.engine,
            &mut JointCommitter { actors: &self.actors },
            sink,
            slot,
        )
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Creates a record and queues it for instancing.
fn buffer_new<K: ProxyKind>(store: &mut KindStore<K>, desc: K::Desc, links: K::Links) -> ProxyResult<SlotId> {
    let slot = store.create(desc, links)?;
    store.mark_dirty(slot)?;
    Ok(slot)
}

fn to_buffered<K: ProxyKind>(store: &KindStore<K>, reference: EntityRef<SlotId, K::Handle>) -> ProxyResult<SlotId> {
    match reference {
        EntityRef::Proxy(slot) => store.record(slot).map(|_| slot),
        EntityRef::Real(handle) => store
            .resolve(handle)
            .ok_or(ProxyError::StaleHandle { kind: K::KIND }),
    }
}

/// Commits `slot` right away if it has pending state, then returns its
/// engine handle.
fn commit_now<K, E, C>(
    store: &mut KindStore<K>,
    engine: &mut E,
    committer: &mut C,
    sink: &dyn CommitFailureSink,
    slot: SlotId,
) -> ProxyResult<K::Handle>
where
    K: ProxyKind,
    E: PhysicsScene,
    C: Committer<K, E>,
{
    if store.is_dirty(slot) {
        let mut pass = CommitPass::new(sink);
        store.commit_entry(engine, committer, slot, &mut pass);
    }
    let record = store.record(slot)?;
    match (record.state, record.handle) {
        (ProxyState::Buffered, _) | (_, None) => Err(ProxyError::NotInstanced { kind: K::KIND }),
        (_, Some(handle)) => Ok(handle),
    }
}

fn set_pair<K: ProxyKind>(
    store: &KindStore<K>,
    table: &mut PairFlagTable<SlotId, PairFlags>,
    pending: &mut PairFlagTable<SlotId, ()>,
    a: SlotId,
    b: SlotId,
    flags: PairFlags,
) -> ProxyResult<()> {
    if a == b {
        return Err(ProxyError::SelfPair);
    }
    for id in [a, b] {
        if store.record(id)?.state == ProxyState::AwaitingDelete {
            return Err(ProxyError::AwaitingDelete { kind: K::KIND });
        }
    }
    table.set(a, b, flags)?;
    pending.set(a, b, ())?;
    Ok(())
}

fn destroy<H>(stats: &mut DeleteStats, kind: EntityKind, handle: Option<H>, release: impl FnOnce(H) -> EngineResult<()>) {
    match handle {
        Some(handle) => {
            if let Err(err) = release(handle) {
                warn!(%kind, error = %err, "engine failed to destroy object");
            }
            stats.destroyed += 1;
        }
        None => stats.discarded += 1,
    }
}

/// Drops pair entries touching a freed entity. Returns how many flag
/// entries went away.
fn purge_pairs(
    table: &mut PairFlagTable<SlotId, PairFlags>,
    pending: &mut PairFlagTable<SlotId, ()>,
    freed: &HashSet<SlotId>,
) -> usize {
    if freed.is_empty() {
        return 0;
    }
    let before = table.len();
    table.retain(|a, b, _| !freed.contains(&a) && !freed.contains(&b));
    pending.retain(|a, b, ()| !freed.contains(&a) && !freed.contains(&b));
    before - table.len()
}
