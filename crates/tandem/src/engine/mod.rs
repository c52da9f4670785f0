//! # Engine Interface
//!
//! The entity API a physics backend exposes to the proxy layer.
//!
//! ## Contract
//!
//! ```text
//!   create_X(desc) ──► handle ──► X getters / setters ──► release_X(handle)
//!
//!   simulate(dt) ──► ... step runs ... ──► fetch_results(block, events)
//! ```
//!
//! - Every object kind has a creation function from a descriptor, a
//!   release function, and one getter/setter pair per field.
//! - Between `simulate` and a completed `fetch_results` the proxy layer
//!   calls no mutating method.
//! - Materials live in a fixed index space chosen by the caller.
//!
//! [`HeadlessScene`] is an in-memory implementation used for tests and
//! tooling.

mod desc;
mod flags;
mod handle;
mod headless;

pub use desc::{
    ActorDesc, ClothDesc, FluidDesc, Geometry, JointDesc, JointState, JointType, MaterialDesc,
    MeshDesc, ShapeDesc, SoftBodyDesc,
};
pub use flags::{
    ActorFlags, BodyFlags, ClothFlags, FluidFlags, JointFlags, MaterialFlags, PairFlags,
    ShapeFlags, SoftBodyFlags, TriggerFlags,
};
pub use handle::{
    ActorHandle, ClothHandle, FluidHandle, JointHandle, MaterialIndex, ShapeHandle,
    SoftBodyHandle,
};
pub use headless::{HeadlessEvent, HeadlessScene};

use tandem_shared::{Transform, Vec3};

use crate::error::EngineResult;

/// Forces exchanged by a touching actor pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPair<A> {
    /// The two actors.
    pub actors: [A; 2],
    /// Total normal force applied this step.
    pub normal_force: Vec3,
    /// Total friction force applied this step.
    pub friction_force: Vec3,
}

/// Engine-side notifications, delivered while results are fetched.
///
/// All methods default to doing nothing.
pub trait EngineEvents {
    /// Actors that woke up this step.
    fn on_wake(&mut self, _actors: &[ActorHandle]) {}

    /// Actors that fell asleep this step.
    fn on_sleep(&mut self, _actors: &[ActorHandle]) {}

    /// A joint exceeded its break limits.
    ///
    /// Returns `true` to ask for the joint to be released.
    fn on_joint_break(&mut self, _breaking_force: f32, _joint: JointHandle) -> bool {
        false
    }

    /// Contact report for an actor pair.
    fn on_contact(&mut self, _pair: &ContactPair<ActorHandle>, _events: PairFlags) {}

    /// A shape entered, left, or stayed in a trigger shape.
    fn on_trigger(&mut self, _trigger: ShapeHandle, _other: ShapeHandle, _status: TriggerFlags) {}

    /// Asks whether contacts between a pair should be generated.
    fn filter_actor_pair(&mut self, _a: ActorHandle, _b: ActorHandle) -> bool {
        true
    }
}

/// Event sink that drops everything.
impl EngineEvents for () {}

/// A single-threaded physics scene.
///
/// Getters take `&self` and setters `&mut self`; every call naming an
/// object that does not exist returns [`EngineError::UnknownHandle`].
///
/// [`EngineError::UnknownHandle`]: crate::EngineError::UnknownHandle
pub trait PhysicsScene {
    // =========================================================================
    // ACTORS
    // =========================================================================

    /// Creates an actor and the shapes listed in its descriptor.
    ///
    /// # Errors
    ///
    /// Rejects descriptors the engine cannot build.
    fn create_actor(&mut self, desc: &ActorDesc) -> EngineResult<ActorHandle>;
    /// Destroys an actor and every shape attached to it.
    fn release_actor(&mut self, actor: ActorHandle) -> EngineResult<()>;
    /// Whether the actor is dynamic.
    fn actor_is_dynamic(&self, actor: ActorHandle) -> EngineResult<bool>;

    /// World pose.
    fn actor_global_pose(&self, actor: ActorHandle) -> EngineResult<Transform>;
    /// Sets the world pose.
    fn set_actor_global_pose(&mut self, actor: ActorHandle, pose: Transform) -> EngineResult<()>;
    /// Linear velocity.
    fn actor_linear_velocity(&self, actor: ActorHandle) -> EngineResult<Vec3>;
    /// Sets the linear velocity.
    fn set_actor_linear_velocity(&mut self, actor: ActorHandle, velocity: Vec3)
        -> EngineResult<()>;
    /// Angular velocity.
    fn actor_angular_velocity(&self, actor: ActorHandle) -> EngineResult<Vec3>;
    /// Sets the angular velocity.
    fn set_actor_angular_velocity(
        &mut self,
        actor: ActorHandle,
        velocity: Vec3,
    ) -> EngineResult<()>;
    /// Mass.
    fn actor_mass(&self, actor: ActorHandle) -> EngineResult<f32>;
    /// Sets the mass.
    fn set_actor_mass(&mut self, actor: ActorHandle, mass: f32) -> EngineResult<()>;
    /// Linear damping.
    fn actor_linear_damping(&self, actor: ActorHandle) -> EngineResult<f32>;
    /// Sets the linear damping.
    fn set_actor_linear_damping(&mut self, actor: ActorHandle, damping: f32) -> EngineResult<()>;
    /// Angular damping.
    fn actor_angular_damping(&self, actor: ActorHandle) -> EngineResult<f32>;
    /// Sets the angular damping.
    fn set_actor_angular_damping(&mut self, actor: ActorHandle, damping: f32)
        -> EngineResult<()>;
    /// Actor group.
    fn actor_group(&self, actor: ActorHandle) -> EngineResult<u16>;
    /// Sets the actor group.
    fn set_actor_group(&mut self, actor: ActorHandle, group: u16) -> EngineResult<()>;
    /// Dominance group.
    fn actor_dominance_group(&self, actor: ActorHandle) -> EngineResult<u8>;
    /// Sets the dominance group.
    fn set_actor_dominance_group(&mut self, actor: ActorHandle, group: u8) -> EngineResult<()>;
    /// Actor flags.
    fn actor_flags(&self, actor: ActorHandle) -> EngineResult<ActorFlags>;
    /// Sets the actor flags.
    fn set_actor_flags(&mut self, actor: ActorHandle, flags: ActorFlags) -> EngineResult<()>;
    /// Body flags.
    fn actor_body_flags(&self, actor: ActorHandle) -> EngineResult<BodyFlags>;
    /// Sets the body flags.
    fn set_actor_body_flags(&mut self, actor: ActorHandle, flags: BodyFlags) -> EngineResult<()>;
    /// Whether the actor is asleep.
    fn actor_sleeping(&self, actor: ActorHandle) -> EngineResult<bool>;
    /// Puts the actor to sleep or wakes it up.
    fn set_actor_sleeping(&mut self, actor: ActorHandle, sleeping: bool) -> EngineResult<()>;
    /// Applies a force for the next step.
    fn add_actor_force(&mut self, actor: ActorHandle, force: Vec3) -> EngineResult<()>;

    // =========================================================================
    // SHAPES
    // =========================================================================

    /// Attaches a new shape to an actor.
    ///
    /// # Errors
    ///
    /// Rejects invalid geometry and unknown materials.
    fn create_shape(&mut self, actor: ActorHandle, desc: &ShapeDesc) -> EngineResult<ShapeHandle>;
    /// Detaches and destroys a shape.
    fn release_shape(&mut self, shape: ShapeHandle) -> EngineResult<()>;
    /// Actor the shape is attached to.
    fn shape_actor(&self, shape: ShapeHandle) -> EngineResult<ActorHandle>;

    /// Pose relative to the owning actor.
    fn shape_local_pose(&self, shape: ShapeHandle) -> EngineResult<Transform>;
    /// Sets the local pose.
    fn set_shape_local_pose(&mut self, shape: ShapeHandle, pose: Transform) -> EngineResult<()>;
    /// Collision group.
    fn shape_group(&self, shape: ShapeHandle) -> EngineResult<u16>;
    /// Sets the collision group.
    fn set_shape_group(&mut self, shape: ShapeHandle, group: u16) -> EngineResult<()>;
    /// Material.
    fn shape_material(&self, shape: ShapeHandle) -> EngineResult<MaterialIndex>;
    /// Sets the material.
    fn set_shape_material(&mut self, shape: ShapeHandle, material: MaterialIndex)
        -> EngineResult<()>;
    /// Shape flags.
    fn shape_flags(&self, shape: ShapeHandle) -> EngineResult<ShapeFlags>;
    /// Sets the shape flags.
    fn set_shape_flags(&mut self, shape: ShapeHandle, flags: ShapeFlags) -> EngineResult<()>;
    /// Skin width.
    fn shape_skin_width(&self, shape: ShapeHandle) -> EngineResult<f32>;
    /// Sets the skin width.
    fn set_shape_skin_width(&mut self, shape: ShapeHandle, width: f32) -> EngineResult<()>;

    // =========================================================================
    // JOINTS
    // =========================================================================

    /// Creates a joint.
    ///
    /// # Errors
    ///
    /// Rejects unknown actors and invalid limits.
    fn create_joint(&mut self, desc: &JointDesc<ActorHandle>) -> EngineResult<JointHandle>;
    /// Destroys a joint.
    fn release_joint(&mut self, joint: JointHandle) -> EngineResult<()>;
    /// Jointed actors.
    fn joint_actors(&self, joint: JointHandle) -> EngineResult<[Option<ActorHandle>; 2]>;
    /// Lifecycle state.
    fn joint_state(&self, joint: JointHandle) -> EngineResult<JointState>;

    /// Break limits as `(max_force, max_torque)`.
    fn joint_breakable(&self, joint: JointHandle) -> EngineResult<(f32, f32)>;
    /// Sets the break limits.
    fn set_joint_breakable(
        &mut self,
        joint: JointHandle,
        max_force: f32,
        max_torque: f32,
    ) -> EngineResult<()>;
    /// Anchor in world space.
    fn joint_global_anchor(&self, joint: JointHandle) -> EngineResult<Vec3>;
    /// Sets the anchor.
    fn set_joint_global_anchor(&mut self, joint: JointHandle, anchor: Vec3) -> EngineResult<()>;
    /// Axis in world space.
    fn joint_global_axis(&self, joint: JointHandle) -> EngineResult<Vec3>;
    /// Sets the axis.
    fn set_joint_global_axis(&mut self, joint: JointHandle, axis: Vec3) -> EngineResult<()>;
    /// Joint flags.
    fn joint_flags(&self, joint: JointHandle) -> EngineResult<JointFlags>;
    /// Sets the joint flags.
    fn set_joint_flags(&mut self, joint: JointHandle, flags: JointFlags) -> EngineResult<()>;

    // =========================================================================
    // MATERIALS
    // =========================================================================

    /// Creates a material at `index`.
    ///
    /// # Errors
    ///
    /// Rejects occupied or out-of-range indices and invalid coefficients.
    fn create_material(&mut self, index: MaterialIndex, desc: &MaterialDesc) -> EngineResult<()>;
    /// Frees a material index. The default material cannot be released.
    fn release_material(&mut self, index: MaterialIndex) -> EngineResult<()>;

    /// Dynamic friction.
    fn material_dynamic_friction(&self, index: MaterialIndex) -> EngineResult<f32>;
    /// Sets the dynamic friction.
    fn set_material_dynamic_friction(&mut self, index: MaterialIndex, value: f32)
        -> EngineResult<()>;
    /// Static friction.
    fn material_static_friction(&self, index: MaterialIndex) -> EngineResult<f32>;
    /// Sets the static friction.
    fn set_material_static_friction(&mut self, index: MaterialIndex, value: f32)
        -> EngineResult<()>;
    /// Restitution.
    fn material_restitution(&self, index: MaterialIndex) -> EngineResult<f32>;
    /// Sets the restitution.
    fn set_material_restitution(&mut self, index: MaterialIndex, value: f32) -> EngineResult<()>;
    /// Material flags.
    fn material_flags(&self, index: MaterialIndex) -> EngineResult<MaterialFlags>;
    /// Sets the material flags.
    fn set_material_flags(&mut self, index: MaterialIndex, flags: MaterialFlags)
        -> EngineResult<()>;

    // =========================================================================
    // FLUIDS
    // =========================================================================

    /// Creates a fluid with its initial particles.
    ///
    /// # Errors
    ///
    /// Rejects invalid densities and capacities.
    fn create_fluid(&mut self, desc: &FluidDesc) -> EngineResult<FluidHandle>;
    /// Destroys a fluid.
    fn release_fluid(&mut self, fluid: FluidHandle) -> EngineResult<()>;

    /// Viscosity.
    fn fluid_viscosity(&self, fluid: FluidHandle) -> EngineResult<f32>;
    /// Sets the viscosity.
    fn set_fluid_viscosity(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()>;
    /// Stiffness.
    fn fluid_stiffness(&self, fluid: FluidHandle) -> EngineResult<f32>;
    /// Sets the stiffness.
    fn set_fluid_stiffness(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()>;
    /// Damping.
    fn fluid_damping(&self, fluid: FluidHandle) -> EngineResult<f32>;
    /// Sets the damping.
    fn set_fluid_damping(&mut self, fluid: FluidHandle, value: f32) -> EngineResult<()>;
    /// External acceleration.
    fn fluid_external_acceleration(&self, fluid: FluidHandle) -> EngineResult<Vec3>;
    /// Sets the external acceleration.
    fn set_fluid_external_acceleration(&mut self, fluid: FluidHandle, value: Vec3)
        -> EngineResult<()>;
    /// Fluid flags.
    fn fluid_flags(&self, fluid: FluidHandle) -> EngineResult<FluidFlags>;
    /// Sets the fluid flags.
    fn set_fluid_flags(&mut self, fluid: FluidHandle, flags: FluidFlags) -> EngineResult<()>;
    /// Adds particles, returning how many fit.
    fn add_fluid_particles(&mut self, fluid: FluidHandle, positions: &[Vec3])
        -> EngineResult<u32>;
    /// Live particle count.
    fn fluid_particle_count(&self, fluid: FluidHandle) -> EngineResult<u32>;

    // =========================================================================
    // CLOTHS
    // =========================================================================

    /// Creates a cloth.
    ///
    /// # Errors
    ///
    /// Rejects malformed meshes and out-of-range coefficients.
    fn create_cloth(&mut self, desc: &ClothDesc) -> EngineResult<ClothHandle>;
    /// Destroys a cloth.
    fn release_cloth(&mut self, cloth: ClothHandle) -> EngineResult<()>;

    /// Bending stiffness.
    fn cloth_bending_stiffness(&self, cloth: ClothHandle) -> EngineResult<f32>;
    /// Sets the bending stiffness.
    fn set_cloth_bending_stiffness(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()>;
    /// Stretching stiffness.
    fn cloth_stretching_stiffness(&self, cloth: ClothHandle) -> EngineResult<f32>;
    /// Sets the stretching stiffness.
    fn set_cloth_stretching_stiffness(&mut self, cloth: ClothHandle, value: f32)
        -> EngineResult<()>;
    /// Damping.
    fn cloth_damping(&self, cloth: ClothHandle) -> EngineResult<f32>;
    /// Sets the damping.
    fn set_cloth_damping(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()>;
    /// Thickness.
    fn cloth_thickness(&self, cloth: ClothHandle) -> EngineResult<f32>;
    /// Sets the thickness.
    fn set_cloth_thickness(&mut self, cloth: ClothHandle, value: f32) -> EngineResult<()>;
    /// External acceleration.
    fn cloth_external_acceleration(&self, cloth: ClothHandle) -> EngineResult<Vec3>;
    /// Sets the external acceleration.
    fn set_cloth_external_acceleration(&mut self, cloth: ClothHandle, value: Vec3)
        -> EngineResult<()>;
    /// Cloth flags.
    fn cloth_flags(&self, cloth: ClothHandle) -> EngineResult<ClothFlags>;
    /// Sets the cloth flags.
    fn set_cloth_flags(&mut self, cloth: ClothHandle, flags: ClothFlags) -> EngineResult<()>;

    // =========================================================================
    // SOFT BODIES
    // =========================================================================

    /// Creates a soft body.
    ///
    /// # Errors
    ///
    /// Rejects malformed meshes and out-of-range coefficients.
    fn create_soft_body(&mut self, desc: &SoftBodyDesc) -> EngineResult<SoftBodyHandle>;
    /// Destroys a soft body.
    fn release_soft_body(&mut self, body: SoftBodyHandle) -> EngineResult<()>;

    /// Volume stiffness.
    fn soft_body_volume_stiffness(&self, body: SoftBodyHandle) -> EngineResult<f32>;
    /// Sets the volume stiffness.
    fn set_soft_body_volume_stiffness(&mut self, body: SoftBodyHandle, value: f32)
        -> EngineResult<()>;
    /// Stretching stiffness.
    fn soft_body_stretching_stiffness(&self, body: SoftBodyHandle) -> EngineResult<f32>;
    /// Sets the stretching stiffness.
    fn set_soft_body_stretching_stiffness(
        &mut self,
        body: SoftBodyHandle,
        value: f32,
    ) -> EngineResult<()>;
    /// Damping.
    fn soft_body_damping(&self, body: SoftBodyHandle) -> EngineResult<f32>;
    /// Sets the damping.
    fn set_soft_body_damping(&mut self, body: SoftBodyHandle, value: f32) -> EngineResult<()>;
    /// External acceleration.
    fn soft_body_external_acceleration(&self, body: SoftBodyHandle) -> EngineResult<Vec3>;
    /// Sets the external acceleration.
    fn set_soft_body_external_acceleration(
        &mut self,
        body: SoftBodyHandle,
        value: Vec3,
    ) -> EngineResult<()>;
    /// Soft body flags.
    fn soft_body_flags(&self, body: SoftBodyHandle) -> EngineResult<SoftBodyFlags>;
    /// Sets the soft body flags.
    fn set_soft_body_flags(&mut self, body: SoftBodyHandle, flags: SoftBodyFlags)
        -> EngineResult<()>;

    // =========================================================================
    // PAIR FILTERING
    // =========================================================================

    /// Contact flags for an actor pair.
    fn actor_pair_flags(&self, a: ActorHandle, b: ActorHandle) -> EngineResult<PairFlags>;
    /// Sets contact flags for an actor pair.
    fn set_actor_pair_flags(&mut self, a: ActorHandle, b: ActorHandle, flags: PairFlags)
        -> EngineResult<()>;
    /// Contact flags for a shape pair.
    fn shape_pair_flags(&self, a: ShapeHandle, b: ShapeHandle) -> EngineResult<PairFlags>;
    /// Sets contact flags for a shape pair.
    fn set_shape_pair_flags(&mut self, a: ShapeHandle, b: ShapeHandle, flags: PairFlags)
        -> EngineResult<()>;

    // =========================================================================
    // STEPPING
    // =========================================================================

    /// Starts a step of `dt` seconds. May return before the step finishes.
    fn simulate(&mut self, dt: f32);

    /// Completes the running step.
    ///
    /// With `block == false` returns `false` immediately if the step is not
    /// done yet. On completion, notifications are delivered to `events`
    /// and `true` is returned.
    fn fetch_results(&mut self, block: bool, events: &mut dyn EngineEvents) -> bool;
}
