//! # Entity Capability Traits
//!
//! One trait per entity kind, implemented twice:
//!
//! | Implementor | Reads | Writes |
//! |---|---|---|
//! | proxy view (`ActorProxy`, ...) | pending override, engine, descriptor | buffered until commit |
//! | engine view (`EngineActor`, ...) | engine | straight to the engine |
//!
//! Code written against the traits runs unchanged on either side, so the
//! same controller can drive buffered proxies during a step and the raw
//! engine objects in between.
//!
//! ```rust,ignore
//! fn brake<A: ActorApi>(actor: &mut A) -> ProxyResult<()> {
//!     let velocity = actor.linear_velocity()?;
//!     actor.set_linear_velocity(velocity * 0.5)
//! }
//! ```

use tandem_shared::{Transform, Vec3};

use crate::engine::{
    ActorFlags, ActorHandle, BodyFlags, ClothFlags, ClothHandle, FluidFlags, FluidHandle, JointFlags,
    JointHandle, JointState, MaterialFlags, MaterialIndex, ShapeFlags, ShapeHandle, SoftBodyFlags,
    SoftBodyHandle,
};
use crate::error::ProxyResult;
use crate::proxy::{ActorId, ClothId, FluidId, JointId, ShapeId, SoftBodyId};

/// Rigid actor.
pub trait ActorApi {
    /// Whether the actor has a dynamic body.
    fn is_dynamic(&self) -> ProxyResult<bool>;

    /// World pose.
    fn global_pose(&self) -> ProxyResult<Transform>;
    /// Sets the world pose.
    fn set_global_pose(&mut self, pose: Transform) -> ProxyResult<()>;

    /// Linear velocity.
    fn linear_velocity(&self) -> ProxyResult<Vec3>;
    /// Sets the linear velocity.
    fn set_linear_velocity(&mut self, velocity: Vec3) -> ProxyResult<()>;

    /// Angular velocity.
    fn angular_velocity(&self) -> ProxyResult<Vec3>;
    /// Sets the angular velocity.
    fn set_angular_velocity(&mut self, velocity: Vec3) -> ProxyResult<()>;

    /// Body mass.
    fn mass(&self) -> ProxyResult<f32>;
    /// Sets the body mass.
    fn set_mass(&mut self, mass: f32) -> ProxyResult<()>;

    /// Linear damping coefficient.
    fn linear_damping(&self) -> ProxyResult<f32>;
    /// Sets the linear damping coefficient.
    fn set_linear_damping(&mut self, damping: f32) -> ProxyResult<()>;

    /// Angular damping coefficient.
    fn angular_damping(&self) -> ProxyResult<f32>;
    /// Sets the angular damping coefficient.
    fn set_angular_damping(&mut self, damping: f32) -> ProxyResult<()>;

    /// Collision group.
    fn group(&self) -> ProxyResult<u16>;
    /// Sets the collision group.
    fn set_group(&mut self, group: u16) -> ProxyResult<()>;

    /// Dominance group, 0..=31.
    fn dominance_group(&self) -> ProxyResult<u8>;
    /// Sets the dominance group.
    fn set_dominance_group(&mut self, group: u8) -> ProxyResult<()>;

    /// Actor flags.
    fn flags(&self) -> ProxyResult<ActorFlags>;
    /// Sets the actor flags.
    fn set_flags(&mut self, flags: ActorFlags) -> ProxyResult<()>;

    /// Body flags.
    fn body_flags(&self) -> ProxyResult<BodyFlags>;
    /// Sets the body flags.
    fn set_body_flags(&mut self, flags: BodyFlags) -> ProxyResult<()>;

    /// Whether the body sleeps.
    fn is_sleeping(&self) -> ProxyResult<bool>;
    /// Puts the body to sleep or wakes it.
    fn set_sleeping(&mut self, sleeping: bool) -> ProxyResult<()>;

    /// Applies a force for the next step. Buffered forces accumulate.
    fn add_force(&mut self, force: Vec3) -> ProxyResult<()>;
}

/// Collision shape.
pub trait ShapeApi {
    /// Pose relative to the owning actor.
    fn local_pose(&self) -> ProxyResult<Transform>;
    /// Sets the local pose.
    fn set_local_pose(&mut self, pose: Transform) -> ProxyResult<()>;

    /// Collision group.
    fn group(&self) -> ProxyResult<u16>;
    /// Sets the collision group.
    fn set_group(&mut self, group: u16) -> ProxyResult<()>;

    /// Material index.
    fn material(&self) -> ProxyResult<MaterialIndex>;
    /// Sets the material index.
    fn set_material(&mut self, material: MaterialIndex) -> ProxyResult<()>;

    /// Shape flags.
    fn flags(&self) -> ProxyResult<ShapeFlags>;
    /// Sets the shape flags.
    fn set_flags(&mut self, flags: ShapeFlags) -> ProxyResult<()>;

    /// Contact skin width; negative selects the scene default.
    fn skin_width(&self) -> ProxyResult<f32>;
    /// Sets the contact skin width.
    fn set_skin_width(&mut self, width: f32) -> ProxyResult<()>;
}

/// Joint between one or two actors.
pub trait JointApi {
    /// How this side names actors.
    type Actor;

    /// Jointed actors; `None` is the world frame.
    fn actors(&self) -> ProxyResult<[Option<Self::Actor>; 2]>;

    /// Binding state.
    fn joint_state(&self) -> ProxyResult<JointState>;

    /// Break limits as `(max_force, max_torque)`.
    fn breakable(&self) -> ProxyResult<(f32, f32)>;
    /// Sets the break limits.
    fn set_breakable(&mut self, max_force: f32, max_torque: f32) -> ProxyResult<()>;

    /// Anchor in world space.
    fn global_anchor(&self) -> ProxyResult<Vec3>;
    /// Sets the anchor in world space.
    fn set_global_anchor(&mut self, anchor: Vec3) -> ProxyResult<()>;

    /// Axis in world space.
    fn global_axis(&self) -> ProxyResult<Vec3>;
    /// Sets the axis in world space.
    fn set_global_axis(&mut self, axis: Vec3) -> ProxyResult<()>;

    /// Joint flags.
    fn flags(&self) -> ProxyResult<JointFlags>;
    /// Sets the joint flags.
    fn set_flags(&mut self, flags: JointFlags) -> ProxyResult<()>;
}

/// Surface material.
pub trait MaterialApi {
    /// Index in the scene's material table.
    fn index(&self) -> MaterialIndex;

    /// Dynamic friction coefficient.
    fn dynamic_friction(&self) -> ProxyResult<f32>;
    /// Sets the dynamic friction coefficient.
    fn set_dynamic_friction(&mut self, value: f32) -> ProxyResult<()>;

    /// Static friction coefficient.
    fn static_friction(&self) -> ProxyResult<f32>;
    /// Sets the static friction coefficient.
    fn set_static_friction(&mut self, value: f32) -> ProxyResult<()>;

    /// Restitution, 0..=1.
    fn restitution(&self) -> ProxyResult<f32>;
    /// Sets the restitution.
    fn set_restitution(&mut self, value: f32) -> ProxyResult<()>;

    /// Material flags.
    fn flags(&self) -> ProxyResult<MaterialFlags>;
    /// Sets the material flags.
    fn set_flags(&mut self, flags: MaterialFlags) -> ProxyResult<()>;
}

/// Particle fluid.
pub trait FluidApi {
    /// Viscosity.
    fn viscosity(&self) -> ProxyResult<f32>;
    /// Sets the viscosity.
    fn set_viscosity(&mut self, value: f32) -> ProxyResult<()>;

    /// Stiffness.
    fn stiffness(&self) -> ProxyResult<f32>;
    /// Sets the stiffness.
    fn set_stiffness(&mut self, value: f32) -> ProxyResult<()>;

    /// Velocity damping.
    fn damping(&self) -> ProxyResult<f32>;
    /// Sets the velocity damping.
    fn set_damping(&mut self, value: f32) -> ProxyResult<()>;

    /// Acceleration added to gravity.
    fn external_acceleration(&self) -> ProxyResult<Vec3>;
    /// Sets the external acceleration.
    fn set_external_acceleration(&mut self, value: Vec3) -> ProxyResult<()>;

    /// Fluid flags.
    fn flags(&self) -> ProxyResult<FluidFlags>;
    /// Sets the fluid flags.
    fn set_flags(&mut self, flags: FluidFlags) -> ProxyResult<()>;

    /// Emits particles. Particles beyond the fluid's capacity are dropped.
    fn add_particles(&mut self, positions: &[Vec3]) -> ProxyResult<()>;

    /// Number of particles, including buffered emissions.
    fn particle_count(&self) -> ProxyResult<u32>;
}

/// Cloth.
pub trait ClothApi {
    /// Bending stiffness, 0..=1.
    fn bending_stiffness(&self) -> ProxyResult<f32>;
    /// Sets the bending stiffness.
    fn set_bending_stiffness(&mut self, value: f32) -> ProxyResult<()>;

    /// Stretching stiffness, 0..=1.
    fn stretching_stiffness(&self) -> ProxyResult<f32>;
    /// Sets the stretching stiffness.
    fn set_stretching_stiffness(&mut self, value: f32) -> ProxyResult<()>;

    /// Damping, 0..=1.
    fn damping(&self) -> ProxyResult<f32>;
    /// Sets the damping.
    fn set_damping(&mut self, value: f32) -> ProxyResult<()>;

    /// Collision thickness.
    fn thickness(&self) -> ProxyResult<f32>;
    /// Sets the collision thickness.
    fn set_thickness(&mut self, value: f32) -> ProxyResult<()>;

    /// Acceleration added to gravity.
    fn external_acceleration(&self) -> ProxyResult<Vec3>;
    /// Sets the external acceleration.
    fn set_external_acceleration(&mut self, value: Vec3) -> ProxyResult<()>;

    /// Cloth flags.
    fn flags(&self) -> ProxyResult<ClothFlags>;
    /// Sets the cloth flags.
    fn set_flags(&mut self, flags: ClothFlags) -> ProxyResult<()>;
}

/// Soft body.
pub trait SoftBodyApi {
    /// Volume stiffness, 0..=1.
    fn volume_stiffness(&self) -> ProxyResult<f32>;
    /// Sets the volume stiffness.
    fn set_volume_stiffness(&mut self, value: f32) -> ProxyResult<()>;

    /// Stretching stiffness, 0..=1.
    fn stretching_stiffness(&self) -> ProxyResult<f32>;
    /// Sets the stretching stiffness.
    fn set_stretching_stiffness(&mut self, value: f32) -> ProxyResult<()>;

    /// Damping, 0..=1.
    fn damping(&self) -> ProxyResult<f32>;
    /// Sets the damping.
    fn set_damping(&mut self, value: f32) -> ProxyResult<()>;

    /// Acceleration added to gravity.
    fn external_acceleration(&self) -> ProxyResult<Vec3>;
    /// Sets the external acceleration.
    fn set_external_acceleration(&mut self, value: Vec3) -> ProxyResult<()>;

    /// Soft body flags.
    fn flags(&self) -> ProxyResult<SoftBodyFlags>;
    /// Sets the soft body flags.
    fn set_flags(&mut self, flags: SoftBodyFlags) -> ProxyResult<()>;
}

// =============================================================================
// EITHER-SIDE REFERENCES
// =============================================================================

/// Names an entity either by proxy id or by engine handle.
///
/// Converted with the scene's `as_buffered_*` and `as_unbuffered_*`
/// methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef<P, R> {
    /// Proxy id.
    Proxy(P),
    /// Engine handle.
    Real(R),
}

impl<P: Copy, R: Copy> EntityRef<P, R> {
    /// Returns `true` for a proxy id.
    #[inline]
    #[must_use]
    pub const fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }

    /// The proxy id, if this is one.
    #[inline]
    #[must_use]
    pub fn proxy(&self) -> Option<P> {
        match self {
            Self::Proxy(id) => Some(*id),
            Self::Real(_) => None,
        }
    }

    /// The engine handle, if this is one.
    #[inline]
    #[must_use]
    pub fn real(&self) -> Option<R> {
        match self {
            Self::Proxy(_) => None,
            Self::Real(handle) => Some(*handle),
        }
    }

    /// Maps the proxy side, keeping an engine handle as is.
    #[inline]
    pub fn map_proxy<Q>(self, f: impl FnOnce(P) -> Q) -> EntityRef<Q, R> {
        match self {
            Self::Proxy(id) => EntityRef::Proxy(f(id)),
            Self::Real(handle) => EntityRef::Real(handle),
        }
    }
}

/// Actor by id or handle.
pub type ActorRef = EntityRef<ActorId, ActorHandle>;
/// Shape by id or handle.
pub type ShapeRef = EntityRef<ShapeId, ShapeHandle>;
/// Joint by id or handle.
pub type JointRef = EntityRef<JointId, JointHandle>;
/// Fluid by id or handle.
pub type FluidRef = EntityRef<FluidId, FluidHandle>;
/// Cloth by id or handle.
pub type ClothRef = EntityRef<ClothId, ClothHandle>;
/// Soft body by id or handle.
pub type SoftBodyRef = EntityRef<SoftBodyId, SoftBodyHandle>;
