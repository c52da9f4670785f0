//! # Headless Scene
//!
//! In-memory [`PhysicsScene`] with no solver behind it.
//!
//! ## What it does
//!
//! - Validates descriptors the way a native engine would and rejects bad ones
//! - Stores every field and counts every mutating call by method name
//! - Derives actor mass from shape density when a shape is attached
//! - On a completed step, integrates dynamic actor poses by their velocity
//! - Completes steps asynchronously: with [`set_latency`](HeadlessScene::set_latency)
//!   non-blocking fetches report "not done" that many times per step
//! - Delivers events queued with [`queue_event`](HeadlessScene::queue_event)
//!   at the next completed fetch
//!
//! ## What it does not do
//!
//! Collision detection, constraint solving, particles, deformation.

use std::collections::{BTreeMap, HashMap};

use tandem_core::PairFlagTable;
use tandem_shared::{Transform, Vec3};

use super::desc::{
    ActorDesc, ClothDesc, FluidDesc, Geometry, JointDesc, JointState, MaterialDesc, ShapeDesc,
    SoftBodyDesc,
};
use super::flags::{
    ActorFlags, BodyFlags, ClothFlags, FluidFlags, JointFlags, MaterialFlags, PairFlags,
    ShapeFlags, SoftBodyFlags, TriggerFlags,
};
use super::handle::{
    ActorHandle, ClothHandle, FluidHandle, JointHandle, MaterialIndex, ShapeHandle,
    SoftBodyHandle,
};
use super::{ContactPair, EngineEvents, PhysicsScene};
use crate::error::{EngineError, EngineResult};

/// Largest dominance group the engine accepts.
const MAX_DOMINANCE_GROUP: u8 = 31;

/// A notification queued for delivery at the next completed fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum HeadlessEvent {
    /// Actors wake up.
    Wake(Vec<ActorHandle>),
    /// Actors fall asleep.
    Sleep(Vec<ActorHandle>),
    /// A joint breaks.
    JointBreak {
        /// The joint.
        joint: JointHandle,
        /// Force that broke it.
        force: f32,
    },
    /// A pair touches.
    Contact {
        /// Contact forces.
        pair: ContactPair<ActorHandle>,
        /// Which contact events fired.
        events: PairFlags,
    },
    /// A shape interacts with a trigger.
    Trigger {
        /// The trigger shape.
        trigger: ShapeHandle,
        /// The other shape.
        other: ShapeHandle,
        /// Enter / leave / stay.
        status: TriggerFlags,
    },
    /// The engine asks whether a pair should collide. A `false` answer
    /// marks the pair [`PairFlags::IGNORE_PAIR`].
    PairFilter(ActorHandle, ActorHandle),
}

#[derive(Debug)]
struct Body {
    dynamic: bool,
    pose: Transform,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    linear_damping: f32,
    angular_damping: f32,
    group: u16,
    dominance_group: u8,
    flags: ActorFlags,
    body_flags: BodyFlags,
    sleeping: bool,
    force: Vec3,
    shapes: Vec<ShapeHandle>,
}

#[derive(Debug)]
struct AttachedShape {
    actor: ActorHandle,
    desc: ShapeDesc,
}

#[derive(Debug)]
struct Joint {
    desc: JointDesc<ActorHandle>,
    state: JointState,
}

#[derive(Debug)]
struct Fluid {
    desc: FluidDesc,
    particle_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingStep {
    dt: f32,
    polls_left: u32,
}

/// In-memory reference engine.
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = HeadlessScene::new();
/// let actor = engine.create_actor(&ActorDesc::dynamic(Transform::IDENTITY))?;
/// engine.set_actor_linear_velocity(actor, Vec3::X)?;
/// engine.simulate(1.0);
/// engine.fetch_results(true, &mut ());
/// assert_eq!(engine.actor_global_pose(actor)?.position, Vec3::X);
/// ```
#[derive(Debug)]
pub struct HeadlessScene {
    next_handle: u64,
    actors: BTreeMap<ActorHandle, Body>,
    shapes: HashMap<ShapeHandle, AttachedShape>,
    joints: HashMap<JointHandle, Joint>,
    materials: HashMap<u16, MaterialDesc>,
    material_capacity: usize,
    fluids: HashMap<FluidHandle, Fluid>,
    cloths: HashMap<ClothHandle, ClothDesc>,
    soft_bodies: HashMap<SoftBodyHandle, SoftBodyDesc>,
    actor_pairs: PairFlagTable<ActorHandle, PairFlags>,
    shape_pairs: PairFlagTable<ShapeHandle, PairFlags>,
    calls: HashMap<&'static str, usize>,
    step: Option<PendingStep>,
    latency: u32,
    queued: Vec<HeadlessEvent>,
    frame_count: u64,
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessScene {
    /// Creates an empty scene with the full 16-bit material index space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_material_capacity(1 << 16)
    }

    /// Creates an empty scene whose material table holds `capacity` entries,
    /// the default material included.
    #[must_use]
    pub fn with_material_capacity(capacity: usize) -> Self {
        let mut materials = HashMap::new();
        materials.insert(MaterialIndex::DEFAULT.0, MaterialDesc::default());
        Self {
            next_handle: 1,
            actors: BTreeMap::new(),
            shapes: HashMap::new(),
            joints: HashMap::new(),
            materials,
            material_capacity: capacity.max(1),
            fluids: HashMap::new(),
            cloths: HashMap::new(),
            soft_bodies: HashMap::new(),
            actor_pairs: PairFlagTable::new(),
            shape_pairs: PairFlagTable::new(),
            calls: HashMap::new(),
            step: None,
            latency: 0,
            queued: Vec::new(),
            frame_count: 0,
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Number of times the mutating method `name` was called.
    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.get(name).copied().unwrap_or(0)
    }

    /// Forgets all recorded calls.
    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of completed steps.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns `true` while a step is scheduled and not fetched.
    #[must_use]
    pub const fn is_stepping(&self) -> bool {
        self.step.is_some()
    }

    /// Live actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Live shapes.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Live joints.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Live materials, the default material included.
    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Live fluids.
    #[must_use]
    pub fn fluid_count(&self) -> usize {
        self.fluids.len()
    }

    /// Live cloths.
    #[must_use]
    pub fn cloth_count(&self) -> usize {
        self.cloths.len()
    }

    /// Live soft bodies.
    #[must_use]
    pub fn soft_body_count(&self) -> usize {
        self.soft_bodies.len()
    }

    /// Shapes attached to `actor`, in attachment order.
    #[must_use]
    pub fn actor_shapes(&self, actor: ActorHandle) -> Vec<ShapeHandle> {
        self.actors
            .get(&actor)
            .map(|body| body.shapes.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // SCRIPTING
    // =========================================================================

    /// Number of non-blocking fetches that report "not done" per step.
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Queues an event for the next completed fetch.
    pub fn queue_event(&mut self, event: HeadlessEvent) {
        self.queued.push(event);
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn record(&mut self, name: &'static str) {
        *self.calls.entry(name).or_insert(0) += 1;
    }

    fn mint(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }

    fn body(&self, actor: ActorHandle) -> EngineResult<&Body> {
        self.actors.get(&actor).ok_or(EngineError::UnknownHandle)
    }

    fn body_mut(&mut self, actor: ActorHandle, call: &'static str) -> EngineResult<&mut Body> {
        self.record(call);
        self.actors.get_mut(&actor).ok_or(EngineError::UnknownHandle)
    }

    fn shape(&self, shape: ShapeHandle) -> EngineResult<&ShapeDesc> {
        self.shapes
            .get(&shape)
            .map(|s| &s.desc)
            .ok_or(EngineError::UnknownHandle)
    }

    fn shape_mut(&mut self, shape: ShapeHandle, call: &'static str) -> EngineResult<&mut ShapeDesc> {
        self.record(call);
        self.shapes
            .get_mut(&shape)
            .map(|s| &mut s.desc)
            .ok_or(EngineError::UnknownHandle)
    }

    fn joint(&self, joint: JointHandle) -> EngineResult<&Joint> {
        self.joints.get(&joint).ok_or(EngineError::UnknownHandle)
    }

    fn joint_mut(&mut self, joint: JointHandle, call: &'static str) -> EngineResult<&mut Joint> {
        self.record(call);
        self.joints.get_mut(&joint).ok_or(EngineError::UnknownHandle)
    }

    fn material(&self, index: MaterialIndex) -> EngineResult<&MaterialDesc> {
        self.materials
            .get(&index.0)
            .ok_or(EngineError::UnknownMaterial(index.0))
    }

    fn material_mut(
        &mut self,
        index: MaterialIndex,
        call: &'static str,
    ) -> EngineResult<&mut MaterialDesc> {
        self.record(call);
        self.materials
            .get_mut(&index.0)
            .ok_or(EngineError::UnknownMaterial(index.0))
    }

    fn fluid(&self, fluid: FluidHandle) -> EngineResult<&Fluid> {
        self.fluids.get(&fluid).ok_or(EngineError::UnknownHandle)
    }

    fn fluid_mut(&mut self, fluid: FluidHandle, call: &'static str) -> EngineResult<&mut Fluid> {
        self.record(call);
        self.fluids.get_mut(&fluid).ok_or(EngineError::UnknownHandle)
    }

    fn cloth(&self, cloth: ClothHandle) -> EngineResult<&ClothDesc> {
        self.cloths.get(&cloth).ok_or(EngineError::UnknownHandle)
    }

    fn cloth_mut(&mut self, cloth: ClothHandle, call: &'static str) -> EngineResult<&mut ClothDesc> {
        self.record(call);
        self.cloths.get_mut(&cloth).ok_or(EngineError::UnknownHandle)
    }

    fn soft_body(&self, body: SoftBodyHandle) -> EngineResult<&SoftBodyDesc> {
        self.soft_bodies.get(&body).ok_or(EngineError::UnknownHandle)
    }

    fn soft_body_mut(
        &mut self,
        body: SoftBodyHandle,
        call: &'static str,
    ) -> EngineResult<&mut SoftBodyDesc> {
        self.record(call);
        self.soft_bodies
            .get_mut(&body)
            .ok_or(EngineError::UnknownHandle)
    }

    fn validate_shape(&self, dynamic: bool, desc: &ShapeDesc) -> EngineResult<()> {
        if !desc.geometry.is_valid() {
            return Err(invalid("shape geometry has a non-positive or non-finite dimension"));
        }
        if dynamic && matches!(desc.geometry, Geometry::Plane { .. }) {
            return Err(invalid("plane shapes can only be attached to static actors"));
        }
        if !desc.local_pose.is_finite() {
            return Err(invalid("shape local pose is not finite"));
        }
        if !(desc.density.is_finite() && desc.density >= 0.0) {
            return Err(invalid("shape density must be finite and non-negative"));
        }
        if !self.materials.contains_key(&desc.material.0) {
            return Err(EngineError::UnknownMaterial(desc.material.0));
        }
        Ok(())
    }

    fn attach_shape(&mut self, actor: ActorHandle, desc: &ShapeDesc) -> ShapeHandle {
        let handle = ShapeHandle::from_raw(self.mint());
        if let Some(body) = self.actors.get_mut(&actor) {
            if body.dynamic && desc.density > 0.0 {
                body.mass += desc.density * desc.geometry.volume();
            }
            body.shapes.push(handle);
        }
        self.shapes.insert(
            handle,
            AttachedShape {
                actor,
                desc: desc.clone(),
            },
        );
        handle
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.actors.values_mut() {
            let force = std::mem::replace(&mut body.force, Vec3::ZERO);
            if !body.dynamic || body.sleeping || body.body_flags.contains(BodyFlags::KINEMATIC) {
                continue;
            }
            if body.mass > 0.0 {
                body.linear_velocity += force * (dt / body.mass);
            }
            let damping = (1.0 - body.linear_damping * dt).max(0.0);
            body.linear_velocity = body.linear_velocity * damping;
            body.pose.position += body.linear_velocity * dt;
        }
    }

    fn deliver(&mut self, events: &mut dyn EngineEvents) {
        for event in std::mem::take(&mut self.queued) {
            match event {
                HeadlessEvent::Wake(actors) => {
                    for actor in &actors {
                        if let Some(body) = self.actors.get_mut(actor) {
                            body.sleeping = false;
                        }
                    }
                    events.on_wake(&actors);
                }
                HeadlessEvent::Sleep(actors) => {
                    for actor in &actors {
                        if let Some(body) = self.actors.get_mut(actor) {
                            body.sleeping = true;
                        }
                    }
                    events.on_sleep(&actors);
                }
                HeadlessEvent::JointBreak { joint, force } => {
                    if let Some(entry) = self.joints.get_mut(&joint) {
                        entry.state = JointState::Broken;
                    }
                    events.on_joint_break(force, joint);
                }
                HeadlessEvent::Contact { pair, events: fired } => {
                    events.on_contact(&pair, fired);
                }
                HeadlessEvent::Trigger {
                    trigger,
                    other,
                    status,
                } => {
                    events.on_trigger(trigger, other, status);
                }
                HeadlessEvent::PairFilter(a, b) => {
                    if !events.filter_actor_pair(a, b) {
                        let flags = self.actor_pairs.get(a, b).unwrap_or_default();
                        // Rejected self-pairs cannot be stored; nothing to mark.
                        let _ = self.actor_pairs.set(a, b, flags | PairFlags::IGNORE_PAIR);
                    }
                }
            }
        }
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidDescriptor(reason.to_string())
}

fn unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl PhysicsScene for HeadlessScene {
    // =========================================================================
    // ACTORS
    // =========================================================================

    fn create_actor(&mut self, desc: &ActorDesc) -> EngineResult<ActorHandle> {
        self.record("create_actor");

        if !desc.global_pose.is_finite() {
            return Err(invalid("actor pose is not finite"));
        }
        if !(desc.mass.is_finite() && desc.mass >= 0.0) {
            return Err(invalid("actor mass must be finite and non-negative"));
        }
        if desc.linear_damping < 0.0 || desc.angular_damping < 0.0 {
            return Err(invalid("actor damping must be non-negative"));
        }
        if desc.dominance_group > MAX_DOMINANCE_GROUP {
            return Err(invalid("dominance group out of range"));
        }
        for shape in &desc.shapes {
            self.validate_shape(desc.dynamic, shape)?;
        }

        let handle = ActorHandle::from_raw(self.mint());
        self.actors.insert(
            handle,
            Body {
                dynamic: desc.dynamic,
                pose: desc.global_pose,
                linear_velocity: desc.linear_velocity,
                angular_velocity: desc.angular_velocity,
                mass: desc.mass,
                linear_damping: desc.linear_damping,
                angular_damping: desc.angular_damping,
                group: desc.group,
                dominance_group: desc.dominance_group,
                flags: desc.flags,
                body_flags: desc.body_flags,
                sleeping: desc.sleeping,
                force: Vec3::ZERO,
                shapes: Vec::new(),
            },
        );
        for shape in &desc.shapes {
            self.attach_shape(handle, shape);
        }
        Ok(handle)
    }

    fn release_actor(&mut self, actor: ActorHandle) -> EngineResult<()> {
        self.record("release_actor");
        let body = self.actors.remove(&actor).ok_or(EngineError::UnknownHandle)?;
        for shape in &body.shapes {
            self.shapes.remove(shape);
        }
        self.actor_pairs.retain(|a, b, _| a != actor && b != actor);
        self.shape_pairs
            .retain(|a, b, _| !body.shapes.contains(&a) && !body.shapes.contains(&b));
        Ok(())
    }

    fn actor_is_dynamic(&self, actor: ActorHandle) -> EngineResult<bool> {
        Ok(self.body(actor)?.dynamic)
    }

    fn actor_global_pose(&self, actor: ActorHandle) -> EngineResult<Transform> {
        Ok(self.body(actor)?.pose)
    }

    fn set_actor_global_pose(&mut self, actor: ActorHandle, pose: Transform) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_global_pose")?.pose = pose;
        Ok(())
    }

    fn actor_linear_velocity(&self, actor: ActorHandle) -> EngineResult<Vec3> {
        Ok(self.body(actor)?.linear_velocity)
    }

    fn set_actor_linear_velocity(&mut self, actor: ActorHandle, velocity: Vec3) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_linear_velocity")?.linear_velocity = velocity;
        Ok(())
    }

    fn actor_angular_velocity(&self, actor: ActorHandle) -> EngineResult<Vec3> {
        Ok(self.body(actor)?.angular_velocity)
    }

    fn set_actor_angular_velocity(
        &mut self,
        actor: ActorHandle,
        velocity: Vec3,
    ) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_angular_velocity")?.angular_velocity = velocity;
        Ok(())
    }

    fn actor_mass(&self, actor: ActorHandle) -> EngineResult<f32> {
        Ok(self.body(actor)?.mass)
    }

    fn set_actor_mass(&mut self, actor: ActorHandle, mass: f32) -> EngineResult<()> {
        if !(mass.is_finite() && mass >= 0.0) {
            self.record("set_actor_mass");
            return Err(invalid("actor mass must be finite and non-negative"));
        }
        self.body_mut(actor, "set_actor_mass")?.mass = mass;
        Ok(())
    }

    fn actor_linear_damping(&self, actor: ActorHandle) -> EngineResult<f32> {
        Ok(self.body(actor)?.linear_damping)
    }

    fn set_actor_linear_damping(&mut self, actor: ActorHandle, damping: f32) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_linear_damping")?.linear_damping = damping;
        Ok(())
    }

    fn actor_angular_damping(&self, actor: ActorHandle) -> EngineResult<f32> {
        Ok(self.body(actor)?.angular_damping)
    }

    fn set_actor_angular_damping(&mut self, actor: ActorHandle, damping: f32) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_angular_damping")?.angular_damping = damping;
        Ok(())
    }

    fn actor_group(&self, actor: ActorHandle) -> EngineResult<u16> {
        Ok(self.body(actor)?.group)
    }

    fn set_actor_group(&mut self, actor: ActorHandle, group: u16) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_group")?.group = group;
        Ok(())
    }

    fn actor_dominance_group(&self, actor: ActorHandle) -> EngineResult<u8> {
        Ok(self.body(actor)?.dominance_group)
    }

    fn set_actor_dominance_group(&mut self, actor: ActorHandle, group: u8) -> EngineResult<()> {
        let body = self.body_mut(actor, "set_actor_dominance_group")?;
        if group > MAX_DOMINANCE_GROUP {
            return Err(invalid("dominance group out of range"));
        }
        body.dominance_group = group;
        Ok(())
    }

    fn actor_flags(&self, actor: ActorHandle) -> EngineResult<ActorFlags> {
        Ok(self.body(actor)?.flags)
    }

    fn set_actor_flags(&mut self, actor: ActorHandle, flags: ActorFlags) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_flags")?.flags = flags;
        Ok(())
    }

    fn actor_body_flags(&self, actor: ActorHandle) -> EngineResult<BodyFlags> {
        Ok(self.body(actor)?.body_flags)
    }

    fn set_actor_body_flags(&mut self, actor: ActorHandle, flags: BodyFlags) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_body_flags")?.body_flags = flags;
        Ok(())
    }

    fn actor_sleeping(&self, actor: ActorHandle) -> EngineResult<bool> {
        Ok(self.body(actor)?.sleeping)
    }

    fn set_actor_sleeping(&mut self, actor: ActorHandle, sleeping: bool) -> EngineResult<()> {
        self.body_mut(actor, "set_actor_sleeping")?.sleeping = sleeping;
        Ok(())
    }

    fn add_actor_force(&mut self, actor: ActorHandle, force: Vec3) -> EngineResult<()> {
        self.body_mut(actor, "add_actor_force")?.force += force;
        Ok(())
    }

    // =========================================================================
    // SHAPES
    // =========================================================================

    fn create_shape(&mut self, actor: ActorHandle, desc: &ShapeDesc) -> EngineResult<ShapeHandle> {
        self.record("create_shape");
        let dynamic = self.body(actor)?.dynamic;
        self.validate_shape(dynamic, desc)?;
        Ok(self.attach_shape(actor, desc))
    }

    fn release_shape(&mut self, shape: ShapeHandle) -> EngineResult<()> {
        self.record("release_shape");
        let attached = self.shapes.remove(&shape).ok_or(EngineError::UnknownHandle)?;
        if let Some(body) = self.actors.get_mut(&attached.actor) {
            body.shapes.retain(|&s| s != shape);
        }
        self.shape_pairs.retain(|a, b, _| a != shape && b != shape);
        Ok(())
    }

    fn shape_actor(&self, shape: ShapeHandle) -> EngineResult<ActorHandle> {
        self.shapes
            .get(&shape)
            .map(|s| s.actor)
            .ok_or(EngineError::UnknownHandle)
    }

    fn shape_local_pose(&self, shape: ShapeHandle) -> EngineResult<Transform> {
        Ok(self.shape(shape)?.local_pose)
    }

    fn set_shape_local_pose(&mut self, shape: ShapeHandle, pose: Transform) -> EngineResult<()> {
        self.shape_mut(shape, "set_shape_local_pose")?.local_pose = pose;
        Ok(())
    }

    fn shape_group(&self, shape: ShapeHandle) -> EngineResult<u16> {
        Ok(self.shape(shape)?.group)
    }

    fn set_shape_group(&mut self, shape: ShapeHandle, group: u16) -> EngineResult<()> {
        self.shape_mut(shape, "set_shape_group")?.group = group;
        Ok(())
    }

    fn shape_material(&self, shape: ShapeHandle) -> EngineResult<MaterialIndex> {
        Ok(self.shape(shape)?.material)
    }

    fn set_shape_material(&mut self, shape: ShapeHandle, material: MaterialIndex) -> EngineResult<()> {
        if !self.materials.contains_key(&material.0) {
            self.record("set_shape_material");
            return Err(EngineError::UnknownMaterial(material.0));
        }
        self.shape_mut(shape, "set_shape_material")?.material = material;
        Ok(())
    }

    fn shape_flags(&self, shape: ShapeHandle) -> EngineResult<ShapeFlags> {
        Ok(self.shape(shape)?.flags)
    }

    fn set_shape_flags(&mut self, shape: ShapeHandle, flags: ShapeFlags) -> EngineResult<()> {
        self.shape_mut(shape, "set_shape_flags")?.flags = flags;
        Ok(())
    }

    fn shape_skin_width(&self, shape: ShapeHandle) -> EngineResult<f32> {
        Ok(self.shape(shape)?.skin_width)
    }

    fn set_shape_skin_width(&mut self, shape: ShapeHandle, width: f32) -> EngineResult<()> {
        self.shape_mut(shape, "set_shape_skin_width")?.skin_width = width;
        Ok(())
    }

    // =========================================================================
    // JOINTS
    // =========================================================================

    fn create_joint(&mut self, desc: &JointDesc<ActorHandle>) -> EngineResult<JointHandle> {
        self.record("create_joint");

        match desc.actors {
            [None, None] => return Err(invalid("joint needs at least one actor")),
            [Some(a), Some(b)] if a == b => return Err(invalid("joint actors must differ")),
            _ => {}
        }
        for actor in desc.actors.iter().flatten() {
            self.body(*actor)?;
        }
        if !(desc.max_force > 0.0 && desc.max_torque > 0.0) {
            return Err(invalid("joint break limits must be positive"));
        }
        if !(desc.global_anchor.is_finite() && desc.global_axis.is_finite()) {
            return Err(invalid("joint frame is not finite"));
        }

        let handle = JointHandle::from_raw(self.mint());
        self.joints.insert(
            handle,
            Joint {
                desc: desc.clone(),
                state: JointState::Simulating,
            },
        );
        Ok(handle)
    }

    fn release_joint(&mut self, joint: JointHandle) -> EngineResult<()> {
        self.record("release_joint");
        self.joints
            .remove(&joint)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle)
    }

    fn joint_actors(&self, joint: JointHandle) -> EngineResult<[Option<ActorHandle>; 2]> {
        Ok(self.joint(joint)?.desc.actors)
    }

    fn joint_state(&self, joint: JointHandle) -> EngineResult<JointState> {
        Ok(self.joint(joint)?.state)
    }

    fn joint_breakable(&self, joint: JointHandle) -> EngineResult<(f32, f32)> {
        let desc = &self.joint(joint)?.desc;
        Ok((desc.max_force, desc.max_torque))
    }

    fn set_joint_breakable(
        &mut self,
        joint: JointHandle,
        max_force: f32,
        max_torque: f32,
    ) -> EngineResult<()> {
        let entry = self.joint_mut(joint, "set_joint_breakable")?;
        if !(max_force > 0.0 && max_torque > 0.0) {
            return Err(invalid("joint break limits must be positive"));
        }
        entry.desc.max_force = max_force;
        entry.desc.max_torque = max_torque;
        Ok(())
    }

    fn joint_global_anchor(&self, joint: JointHandle) -> EngineResult<Vec3> {
        Ok(self.joint(joint)?.desc.global_anchor)
    }

    fn set_joint_global_anchor(&mut self, joint: JointHandle, anchor: Vec3) -> EngineResult<()> {
        self.joint_mut(joint, "set_joint_global_anchor")?.desc.global_anchor = anchor;
        Ok(())
    }

    fn joint_global_axis(&self, joint: JointHandle) -> EngineResult<Vec3> {
        Ok(self.joint(joint)?.desc.global_axis)
    }

    fn set_joint_global_axis(&mut self, joint: JointHandle, axis: Vec3) -> EngineResult<()> {
        self.joint_mut(joint, "set_joint_global_axis")?.desc.global_axis = axis;
        Ok(())
    }

    fn joint_flags(&self, joint: JointHandle) -> EngineResult<JointFlags> {
        Ok(self.joint(joint)?.desc.flags)
    }

    fn set_joint_flags(&mut self, joint: JointHandle, flags: JointFlags) -> EngineResult<()> {
        self.joint_mut(joint, "set_joint_flags")?.desc.flags = flags;
        Ok(())
    }

    // =========================================================================
    // MATERIALS
    // =========================================================================

    fn create_material(&mut self, index: MaterialIndex, desc: &MaterialDesc) -> EngineResult<()> {
        self.record("create_material");
        if usize::from(index.0) >= self.material_capacity {
            return Err(EngineError::CapacityExceeded);
        }
        if self.materials.contains_key(&index.0) {
            return Err(invalid("material index already in use"));
        }
        if !desc.is_valid() {
            return Err(invalid("material coefficients out of range"));
        }
        self.materials.insert(index.0, *desc);
        Ok(())
    }

    fn release_material(&mut self, index: MaterialIndex) -> EngineResult<()> {
        self.record("release_material");
        if index.is_default() {
            return Err(invalid("the default material cannot be released"));
        }
        self.materials
            .remove(&index.0)
            .map(|_| ())
            .ok_or(EngineError::UnknownMaterial(index.0))
    }

    fn material_dynamic_friction(&self, index: MaterialIndex) -> EngineResult<f32> {
        Ok(self.material(index)?.dynamic_friction)
    }

    fn set_material_dynamic_friction(&mut self, index: MaterialIndex, value: f32) -> EngineResult<()> {
        self.material_mut(index, "set_material_dynamic_friction")?
            .dynamic_friction = value;
        Ok(())
    }

    fn material_static_friction(&self, index: MaterialIndex) -> EngineResult<f32> {
        Ok(self.material(index)?.static_friction)
    }

    fn set_material_static_friction(&mut self, index: MaterialIndex, value: f32) -> EngineResult<()> {
        self.material_mut(index, "set_material_static_friction")?
            .static_friction = value;
        Ok(())
    }

    fn material_restitution(&self, index: MaterialIndex) -> EngineResult<f32> {
        Ok(self.material(index)?.restitution)
    }

    fn set_material_restitution(&mut self, index: MaterialIndex, value: f32) -> EngineResult<()> {
        let material = self.material_mut(index, "set_material_restitution")?;
        if !unit_range(value) {
            return Err(invalid("restitution must be in 0..=1"));
        }
        material.restitution = value;
        Ok(())
    }

    fn material_flags(&self, index: MaterialIndex) -> EngineResult<MaterialFlags> {
        Ok(self.material(index)?.flags)
    }

    fn set_material_flags(&mut self, index: MaterialIndex, flags: MaterialFlags) -> EngineResult<()> {
        self.material_mut(index, "set_material_flags")?.flags = flags;
        Ok(())
    }

    // =========================================================================
    // FLUIDS
    // =========================================================================

    fn create_fluid(&mut self, desc: &FluidDesc) -> EngineResult<FluidHandle> {
        self.record("create_fluid");
        if desc.max_particles == 0 {
            return Err(invalid("fluid particle capacity must be positive"));
        }
        if !(desc.rest_density.is_finite() && desc.rest_density > 0.0) {
            return Err(invalid("fluid rest density must be positive"));
        }
        if desc.particles.len() > desc.max_particles as usize {
            return Err(invalid("more initial particles than capacity"));
        }

        let handle = FluidHandle::from_raw(self.mint());
        self.fluids.insert(
            handle,
            Fluid {
                desc: desc.clone(),
                particle_count: desc.particles.len() as u32,
            },
        );
        Ok(handle)
    }

    fn release_fluid(&mut self, fluid: FluidHandle) -> EngineResult<()> {
        self.record("release_fluid");
        self.fluids
            .remove(&fluid)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle)
    }

    fn fluid_viscosity(&self, fluid: FluidHandle) -> EngineResult<f32> {
        Ok(self.fluid(fluid)?.desc.viscosity)
    }

    fn set_fluid_viscosity(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()> {
        self.fluid_mut(fluid, "set_fluid_viscosity")?.desc.viscosity = value;
        Ok(())
    }

    fn fluid_stiffness(&self, fluid: FluidHandle) -> EngineResult<f32> {
        Ok(self.fluid(fluid)?.desc.stiffness)
    }

    fn set_fluid_stiffness(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()> {
        self.fluid_mut(fluid, "set_fluid_stiffness")?.desc.stiffness = value;
        Ok(())
    }

    fn fluid_damping(&self, fluid: FluidHandle) -> EngineResult<f32> {
        Ok(self.fluid(fluid)?.desc.damping)
    }

    fn set_fluid_damping(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()> {
        self.fluid_mut(fluid, "set_fluid_damping")?.desc.damping = value;
        Ok(())
    }

    fn fluid_external_acceleration(&self, fluid: FluidHandle) -> EngineResult<Vec3> {
        Ok(self.fluid(fluid)?.desc.external_acceleration)
    }

    fn set_fluid_external_acceleration(&mut self, fluid: FluidHandle, value: Vec3) -> EngineResult<()> {
        self.fluid_mut(fluid, "set_fluid_external_acceleration")?
            .desc
            .external_acceleration = value;
        Ok(())
    }

    fn fluid_flags(&self, fluid: FluidHandle) -> EngineResult<FluidFlags> {
        Ok(self.fluid(fluid)?.desc.flags)
    }

    fn set_fluid_flags(&mut self, fluid: FluidHandle, flags: FluidFlags) -> EngineResult<()> {
        self.fluid_mut(fluid, "set_fluid_flags")?.desc.flags = flags;
        Ok(())
    }

    fn add_fluid_particles(&mut self, fluid: FluidHandle, positions: &[Vec3]) -> EngineResult<u32> {
        let entry = self.fluid_mut(fluid, "add_fluid_particles")?;
        let room = entry.desc.max_particles - entry.particle_count;
        let added = room.min(u32::try_from(positions.len()).unwrap_or(u32::MAX));
        entry.particle_count += added;
        Ok(added)
    }

    fn fluid_particle_count(&self, fluid: FluidHandle) -> EngineResult<u32> {
        Ok(self.fluid(fluid)?.particle_count)
    }

    // =========================================================================
    // CLOTHS
    // =========================================================================

    fn create_cloth(&mut self, desc: &ClothDesc) -> EngineResult<ClothHandle> {
        self.record("create_cloth");
        if !desc.mesh.is_valid(3) {
            return Err(invalid("cloth mesh must be a non-empty triangle list"));
        }
        if !(desc.thickness > 0.0 && desc.density > 0.0) {
            return Err(invalid("cloth thickness and density must be positive"));
        }
        if ![desc.bending_stiffness, desc.stretching_stiffness, desc.damping]
            .into_iter()
            .all(unit_range)
        {
            return Err(invalid("cloth coefficients must be in 0..=1"));
        }

        let handle = ClothHandle::from_raw(self.mint());
        self.cloths.insert(handle, desc.clone());
        Ok(handle)
    }

    fn release_cloth(&mut self, cloth: ClothHandle) -> EngineResult<()> {
        self.record("release_cloth");
        self.cloths
            .remove(&cloth)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle)
    }

    fn cloth_bending_stiffness(&self, cloth: ClothHandle) -> EngineResult<f32> {
        Ok(self.cloth(cloth)?.bending_stiffness)
    }

    fn set_cloth_bending_stiffness(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_bending_stiffness")?
            .bending_stiffness = value;
        Ok(())
    }

    fn cloth_stretching_stiffness(&self, cloth: ClothHandle) -> EngineResult<f32> {
        Ok(self.cloth(cloth)?.stretching_stiffness)
    }

    fn set_cloth_stretching_stiffness(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_stretching_stiffness")?
            .stretching_stiffness = value;
        Ok(())
    }

    fn cloth_damping(&self, cloth: ClothHandle) -> EngineResult<f32> {
        Ok(self.cloth(cloth)?.damping)
    }

    fn set_cloth_damping(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_damping")?.damping = value;
        Ok(())
    }

    fn cloth_thickness(&self, cloth: ClothHandle) -> EngineResult<f32> {
        Ok(self.cloth(cloth)?.thickness)
    }

    fn set_cloth_thickness(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_thickness")?.thickness = value;
        Ok(())
    }

    fn cloth_external_acceleration(&self, cloth: ClothHandle) -> EngineResult<Vec3> {
        Ok(self.cloth(cloth)?.external_acceleration)
    }

    fn set_cloth_external_acceleration(&mut self, cloth: ClothHandle, value: Vec3) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_external_acceleration")?
            .external_acceleration = value;
        Ok(())
    }

    fn cloth_flags(&self, cloth: ClothHandle) -> EngineResult<ClothFlags> {
        Ok(self.cloth(cloth)?.flags)
    }

    fn set_cloth_flags(&mut self, cloth: ClothHandle, flags: ClothFlags) -> EngineResult<()> {
        self.cloth_mut(cloth, "set_cloth_flags")?.flags = flags;
        Ok(())
    }

    // =========================================================================
    // SOFT BODIES
    // =========================================================================

    fn create_soft_body(&mut self, desc: &SoftBodyDesc) -> EngineResult<SoftBodyHandle> {
        self.record("create_soft_body");
        if !desc.mesh.is_valid(4) {
            return Err(invalid("soft body mesh must be a non-empty tetrahedron list"));
        }
        if !(desc.particle_radius > 0.0 && desc.density > 0.0) {
            return Err(invalid("soft body particle radius and density must be positive"));
        }
        if ![desc.volume_stiffness, desc.stretching_stiffness, desc.damping]
            .into_iter()
            .all(unit_range)
        {
            return Err(invalid("soft body coefficients must be in 0..=1"));
        }

        let handle = SoftBodyHandle::from_raw(self.mint());
        self.soft_bodies.insert(handle, desc.clone());
        Ok(handle)
    }

    fn release_soft_body(&mut self, body: SoftBodyHandle) -> EngineResult<()> {
        self.record("release_soft_body");
        self.soft_bodies
            .remove(&body)
            .map(|_| ())
            .ok_or(EngineError::UnknownHandle)
    }

    fn soft_body_volume_stiffness(&self, body: SoftBodyHandle) -> EngineResult<f32> {
        Ok(self.soft_body(body)?.volume_stiffness)
    }

    fn set_soft_body_volume_stiffness(&mut self, body: SoftBodyHandle, value: f32) -> EngineResult<()> {
        self.soft_body_mut(body, "set_soft_body_volume_stiffness")?
            .volume_stiffness = value;
        Ok(())
    }

    fn soft_body_stretching_stiffness(&self, body: SoftBodyHandle) -> EngineResult<f32> {
        Ok(self.soft_body(body)?.stretching_stiffness)
    }

    fn set_soft_body_stretching_stiffness(
        &mut self,
        body: SoftBodyHandle,
        value: f32,
    ) -> EngineResult<()> {
        self.soft_body_mut(body, "set_soft_body_stretching_stiffness")?
            .stretching_stiffness = value;
        Ok(())
    }

    fn soft_body_damping(&self, body: SoftBodyHandle) -> EngineResult<f32> {
        Ok(self.soft_body(body)?.damping)
    }

    fn set_soft_body_damping(&mut self, body: SoftBodyHandle, value: f32) -> EngineResult<()> {
        self.soft_body_mut(body, "set_soft_body_damping")?.damping = value;
        Ok(())
    }

    fn soft_body_external_acceleration(&self, body: SoftBodyHandle) -> EngineResult<Vec3> {
        Ok(self.soft_body(body)?.external_acceleration)
    }

    fn set_soft_body_external_acceleration(
        &mut self,
        body: SoftBodyHandle,
        value: Vec3,
    ) -> EngineResult<()> {
        self.soft_body_mut(body, "set_soft_body_external_acceleration")?
            .external_acceleration = value;
        Ok(())
    }

    fn soft_body_flags(&self, body: SoftBodyHandle) -> EngineResult<SoftBodyFlags> {
        Ok(self.soft_body(body)?.flags)
    }

    fn set_soft_body_flags(&mut self, body: SoftBodyHandle, flags: SoftBodyFlags) -> EngineResult<()> {
        self.soft_body_mut(body, "set_soft_body_flags")?.flags = flags;
        Ok(())
    }

    // =========================================================================
    // PAIR FILTERING
    // =========================================================================

    fn actor_pair_flags(&self, a: ActorHandle, b: ActorHandle) -> EngineResult<PairFlags> {
        self.body(a)?;
        self.body(b)?;
        Ok(self.actor_pairs.get(a, b).unwrap_or_default())
    }

    fn set_actor_pair_flags(&mut self, a: ActorHandle, b: ActorHandle, flags: PairFlags) -> EngineResult<()> {
        self.record("set_actor_pair_flags");
        self.body(a)?;
        self.body(b)?;
        self.actor_pairs
            .set(a, b, flags)
            .map(|_| ())
            .map_err(|_| invalid("an actor cannot be paired with itself"))
    }

    fn shape_pair_flags(&self, a: ShapeHandle, b: ShapeHandle) -> EngineResult<PairFlags> {
        self.shape(a)?;
        self.shape(b)?;
        Ok(self.shape_pairs.get(a, b).unwrap_or_default())
    }

    fn set_shape_pair_flags(&mut self, a: ShapeHandle, b: ShapeHandle, flags: PairFlags) -> EngineResult<()> {
        self.record("set_shape_pair_flags");
        self.shape(a)?;
        self.shape(b)?;
        self.shape_pairs
            .set(a, b, flags)
            .map(|_| ())
            .map_err(|_| invalid("a shape cannot be paired with itself"))
    }

    // =========================================================================
    // STEPPING
    // =========================================================================

    fn simulate(&mut self, dt: f32) {
        self.record("simulate");
        self.step = Some(PendingStep {
            dt,
            polls_left: self.latency,
        });
    }

    fn fetch_results(&mut self, block: bool, events: &mut dyn EngineEvents) -> bool {
        let Some(step) = self.step.as_mut() else {
            return false;
        };
        if !block && step.polls_left > 0 {
            step.polls_left -= 1;
            return false;
        }
        let dt = step.dt;
        self.step = None;

        self.integrate(dt);
        self.deliver(events);
        self.frame_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JointType;

    fn cube() -> ShapeDesc {
        ShapeDesc::new(Geometry::Box {
            half_extents: Vec3::new(0.5, 0.5, 0.5),
        })
    }

    #[test]
    fn test_actor_roundtrip_and_call_count() {
        let mut engine = HeadlessScene::new();
        let actor = engine.create_actor(&ActorDesc::default()).unwrap();

        engine.set_actor_mass(actor, 3.0).unwrap();
        engine.set_actor_mass(actor, 4.0).unwrap();

        assert_eq!(engine.actor_mass(actor), Ok(4.0));
        assert_eq!(engine.call_count("set_actor_mass"), 2);
        assert_eq!(engine.call_count("create_actor"), 1);
    }

    #[test]
    fn test_shape_density_adds_mass() {
        let mut engine = HeadlessScene::new();
        let actor = engine
            .create_actor(&ActorDesc::default().with_shape(cube().with_density(2.0)))
            .unwrap();

        assert!((engine.actor_mass(actor).unwrap() - 2.0).abs() < 1e-5);
        assert_eq!(engine.actor_shapes(actor).len(), 1);
    }

    #[test]
    fn test_invalid_descriptors_rejected() {
        let mut engine = HeadlessScene::new();

        let negative = ActorDesc::default().with_mass(-1.0);
        assert!(matches!(
            engine.create_actor(&negative),
            Err(EngineError::InvalidDescriptor(_))
        ));

        let plane = ShapeDesc::new(Geometry::Plane {
            normal: Vec3::Y,
            distance: 0.0,
        });
        let dynamic_plane = ActorDesc::default().with_shape(plane);
        assert!(engine.create_actor(&dynamic_plane).is_err());
        assert_eq!(engine.actor_count(), 0);

        let unknown_material = ActorDesc::default().with_shape(cube().with_material(MaterialIndex(9)));
        assert_eq!(
            engine.create_actor(&unknown_material),
            Err(EngineError::UnknownMaterial(9))
        );
    }

    #[test]
    fn test_material_index_space() {
        let mut engine = HeadlessScene::with_material_capacity(2);
        let desc = MaterialDesc::default();

        assert!(engine.create_material(MaterialIndex(1), &desc).is_ok());
        assert!(engine.create_material(MaterialIndex(1), &desc).is_err());
        assert_eq!(
            engine.create_material(MaterialIndex(2), &desc),
            Err(EngineError::CapacityExceeded)
        );
        assert!(engine.release_material(MaterialIndex::DEFAULT).is_err());
        assert!(engine.release_material(MaterialIndex(1)).is_ok());
        assert_eq!(engine.material_count(), 1);
    }

    #[test]
    fn test_latency_and_integration() {
        let mut engine = HeadlessScene::new();
        let actor = engine.create_actor(&ActorDesc::default()).unwrap();
        engine.set_actor_linear_velocity(actor, Vec3::X).unwrap();
        engine.set_latency(1);

        engine.simulate(0.5);
        assert!(!engine.fetch_results(false, &mut ()));
        assert!(engine.fetch_results(false, &mut ()));
        assert!(!engine.is_stepping());

        let pose = engine.actor_global_pose(actor).unwrap();
        assert!((pose.position.x - 0.5).abs() < 1e-6);
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn test_release_actor_drops_shapes_and_pairs() {
        let mut engine = HeadlessScene::new();
        let a = engine.create_actor(&ActorDesc::default().with_shape(cube())).unwrap();
        let b = engine.create_actor(&ActorDesc::default()).unwrap();
        engine
            .set_actor_pair_flags(a, b, PairFlags::IGNORE_PAIR)
            .unwrap();

        engine.release_actor(a).unwrap();

        assert_eq!(engine.shape_count(), 0);
        assert_eq!(engine.actor_pair_flags(a, b), Err(EngineError::UnknownHandle));
        assert_eq!(engine.release_actor(a), Err(EngineError::UnknownHandle));
    }

    #[test]
    fn test_queued_joint_break_marks_broken() {
        struct Recorder(Vec<JointHandle>);
        impl EngineEvents for Recorder {
            fn on_joint_break(&mut self, _force: f32, joint: JointHandle) -> bool {
                self.0.push(joint);
                true
            }
        }

        let mut engine = HeadlessScene::new();
        let actor = engine.create_actor(&ActorDesc::default()).unwrap();
        let joint = engine
            .create_joint(&JointDesc::new(JointType::Fixed, [Some(actor), None]))
            .unwrap();
        engine.queue_event(HeadlessEvent::JointBreak { joint, force: 10.0 });

        let mut recorder = Recorder(Vec::new());
        engine.simulate(0.1);
        assert!(engine.fetch_results(true, &mut recorder));

        assert_eq!(recorder.0, vec![joint]);
        assert_eq!(engine.joint_state(joint), Ok(JointState::Broken));
    }

    #[test]
    fn test_fluid_capacity_clamps() {
        let mut engine = HeadlessScene::new();
        let fluid = engine
            .create_fluid(&FluidDesc {
                max_particles: 3,
                particles: vec![Vec3::ZERO],
                ..FluidDesc::default()
            })
            .unwrap();

        let added = engine
            .add_fluid_particles(fluid, &[Vec3::X, Vec3::Y, Vec3::Z])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(engine.fluid_particle_count(fluid), Ok(3));
    }
}
