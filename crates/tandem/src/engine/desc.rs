//! # Descriptors
//!
//! Creation parameters for every engine object kind. Descriptors are plain
//! values: the proxy layer copies them wholesale and never interprets them
//! beyond serving default field values before an object is instanced.

use std::f32::consts::PI;

use tandem_shared::{Transform, Vec3};

use super::flags::{
    ActorFlags, BodyFlags, ClothFlags, FluidFlags, JointFlags, MaterialFlags, ShapeFlags,
    SoftBodyFlags,
};
use super::handle::MaterialIndex;

// =============================================================================
// SHAPES
// =============================================================================

/// Collision geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    /// Sphere around the shape origin.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Axis-aligned box in shape space.
    Box {
        /// Half extents along each axis.
        half_extents: Vec3,
    },
    /// Capsule along the shape's Y axis.
    Capsule {
        /// Radius of the caps and the cylinder.
        radius: f32,
        /// Length of the cylinder part.
        height: f32,
    },
    /// Infinite half-space. Only valid on static actors.
    Plane {
        /// Plane normal.
        normal: Vec3,
        /// Distance from the origin along the normal.
        distance: f32,
    },
}

impl Geometry {
    /// Enclosed volume; zero for planes.
    #[must_use]
    pub fn volume(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Self::Box { half_extents: h } => 8.0 * h.x * h.y * h.z,
            Self::Capsule { radius, height } => {
                PI * radius * radius * height + 4.0 / 3.0 * PI * radius.powi(3)
            }
            Self::Plane { .. } => 0.0,
        }
    }

    /// Returns `true` if every dimension is finite and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Sphere { radius } => radius.is_finite() && radius > 0.0,
            Self::Box { half_extents: h } => {
                h.is_finite() && h.x > 0.0 && h.y > 0.0 && h.z > 0.0
            }
            Self::Capsule { radius, height } => {
                radius.is_finite() && height.is_finite() && radius > 0.0 && height >= 0.0
            }
            Self::Plane { normal, distance } => {
                normal.is_finite() && distance.is_finite() && normal.length_squared() > 0.0
            }
        }
    }
}

/// Creation parameters for a shape attached to an actor.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeDesc {
    /// Collision geometry.
    pub geometry: Geometry,
    /// Pose relative to the owning actor.
    pub local_pose: Transform,
    /// Collision group.
    pub group: u16,
    /// Surface material.
    pub material: MaterialIndex,
    /// Behaviour flags.
    pub flags: ShapeFlags,
    /// Contact skin width; negative means "engine default".
    pub skin_width: f32,
    /// Density used to derive the owner's mass; zero contributes no mass.
    pub density: f32,
}

impl ShapeDesc {
    /// Shape with the given geometry and engine defaults elsewhere.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            local_pose: Transform::IDENTITY,
            group: 0,
            material: MaterialIndex::DEFAULT,
            flags: ShapeFlags::VISUALIZATION,
            skin_width: -1.0,
            density: 1.0,
        }
    }

    /// Same shape with another material.
    #[must_use]
    pub fn with_material(mut self, material: MaterialIndex) -> Self {
        self.material = material;
        self
    }

    /// Same shape with another density.
    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }
}

// =============================================================================
// ACTORS
// =============================================================================

/// Creation parameters for a rigid actor.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorDesc {
    /// Debug name.
    pub name: String,
    /// Dynamic actors are integrated; static actors never move.
    pub dynamic: bool,
    /// World pose.
    pub global_pose: Transform,
    /// Initial linear velocity.
    pub linear_velocity: Vec3,
    /// Initial angular velocity.
    pub angular_velocity: Vec3,
    /// Mass; zero lets the engine derive it from shape densities.
    pub mass: f32,
    /// Linear velocity damping.
    pub linear_damping: f32,
    /// Angular velocity damping.
    pub angular_damping: f32,
    /// Actor group for pair filtering.
    pub group: u16,
    /// Dominance group (0..32).
    pub dominance_group: u8,
    /// Actor flags.
    pub flags: ActorFlags,
    /// Dynamic body flags.
    pub body_flags: BodyFlags,
    /// Start asleep.
    pub sleeping: bool,
    /// Shapes created together with the actor.
    pub shapes: Vec<ShapeDesc>,
}

impl Default for ActorDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            dynamic: true,
            global_pose: Transform::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
            group: 0,
            dominance_group: 0,
            flags: ActorFlags::empty(),
            body_flags: BodyFlags::empty(),
            sleeping: false,
            shapes: Vec::new(),
        }
    }
}

impl ActorDesc {
    /// Dynamic actor at `pose` with no shapes.
    #[must_use]
    pub fn dynamic(pose: Transform) -> Self {
        Self {
            global_pose: pose,
            ..Self::default()
        }
    }

    /// Static actor at `pose` with no shapes.
    #[must_use]
    pub fn fixed(pose: Transform) -> Self {
        Self {
            dynamic: false,
            global_pose: pose,
            ..Self::default()
        }
    }

    /// Adds a shape.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeDesc) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Sets an explicit mass.
    #[must_use]
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Sets the debug name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// =============================================================================
// JOINTS
// =============================================================================

/// Joint type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JointType {
    /// No relative motion.
    #[default]
    Fixed,
    /// Rotation about one axis.
    Revolute,
    /// Rotation about a point.
    Spherical,
    /// Translation along one axis.
    Prismatic,
    /// Keeps a distance range.
    Distance,
}

/// Lifecycle of an engine-side joint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JointState {
    /// Not yet bound to its actors.
    #[default]
    Unbound,
    /// Participating in the simulation.
    Simulating,
    /// Exceeded its break limits.
    Broken,
}

/// Creation parameters for a joint between up to two actors.
///
/// `A` is how actors are named: proxy ids on the client side, engine
/// handles on the engine side. A `None` slot attaches to the world frame.
#[derive(Clone, Debug, PartialEq)]
pub struct JointDesc<A> {
    /// Joint type.
    pub joint_type: JointType,
    /// Jointed actors.
    pub actors: [Option<A>; 2],
    /// Anchor point in world space.
    pub global_anchor: Vec3,
    /// Joint axis in world space.
    pub global_axis: Vec3,
    /// Force above which the joint breaks.
    pub max_force: f32,
    /// Torque above which the joint breaks.
    pub max_torque: f32,
    /// Joint flags.
    pub flags: JointFlags,
}

impl<A> JointDesc<A> {
    /// Joint of `joint_type` between `actors`, anchored at the origin.
    #[must_use]
    pub fn new(joint_type: JointType, actors: [Option<A>; 2]) -> Self {
        Self {
            joint_type,
            actors,
            global_anchor: Vec3::ZERO,
            global_axis: Vec3::Z,
            max_force: f32::MAX,
            max_torque: f32::MAX,
            flags: JointFlags::VISUALIZATION,
        }
    }

    /// Same joint anchored at `anchor`.
    #[must_use]
    pub fn with_anchor(mut self, anchor: Vec3) -> Self {
        self.global_anchor = anchor;
        self
    }

    /// Same joint with break limits.
    #[must_use]
    pub fn breakable(mut self, max_force: f32, max_torque: f32) -> Self {
        self.max_force = max_force;
        self.max_torque = max_torque;
        self
    }

    /// Renames the actors, failing on the first actor `resolve` rejects.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `resolve`.
    pub fn try_map_actors<B, E>(
        &self,
        mut resolve: impl FnMut(&A) -> Result<B, E>,
    ) -> Result<JointDesc<B>, E> {
        let first = self.actors[0].as_ref().map(&mut resolve).transpose()?;
        let second = self.actors[1].as_ref().map(&mut resolve).transpose()?;
        Ok(JointDesc {
            joint_type: self.joint_type,
            actors: [first, second],
            global_anchor: self.global_anchor,
            global_axis: self.global_axis,
            max_force: self.max_force,
            max_torque: self.max_torque,
            flags: self.flags,
        })
    }
}

// =============================================================================
// MATERIALS
// =============================================================================

/// Surface material parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDesc {
    /// Coefficient of dynamic friction.
    pub dynamic_friction: f32,
    /// Coefficient of static friction.
    pub static_friction: f32,
    /// Coefficient of restitution in `0..=1`.
    pub restitution: f32,
    /// Material flags.
    pub flags: MaterialFlags,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            dynamic_friction: 0.5,
            static_friction: 0.5,
            restitution: 0.0,
            flags: MaterialFlags::empty(),
        }
    }
}

impl MaterialDesc {
    /// Returns `true` if every coefficient is in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.dynamic_friction.is_finite()
            && self.static_friction.is_finite()
            && self.dynamic_friction >= 0.0
            && self.static_friction >= 0.0
            && (0.0..=1.0).contains(&self.restitution)
    }
}

// =============================================================================
// DEFORMABLES
// =============================================================================

/// Indexed mesh for cloths (triangles) and soft bodies (tetrahedra).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshDesc {
    /// Vertex positions in object space.
    pub vertices: Vec<Vec3>,
    /// Vertex indices, three per triangle or four per tetrahedron.
    pub indices: Vec<u32>,
}

impl MeshDesc {
    /// Returns `true` if the mesh is non-empty, made of whole primitives
    /// of `arity` vertices, and every index is in range.
    #[must_use]
    pub fn is_valid(&self, arity: usize) -> bool {
        !self.indices.is_empty()
            && self.indices.len() % arity == 0
            && self
                .indices
                .iter()
                .all(|&i| (i as usize) < self.vertices.len())
    }
}

/// Creation parameters for a particle fluid.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidDesc {
    /// Particle capacity.
    pub max_particles: u32,
    /// Rest density.
    pub rest_density: f32,
    /// Viscosity.
    pub viscosity: f32,
    /// Pressure stiffness.
    pub stiffness: f32,
    /// Velocity damping.
    pub damping: f32,
    /// Acceleration applied to every particle.
    pub external_acceleration: Vec3,
    /// Fluid flags.
    pub flags: FluidFlags,
    /// Particles present at creation.
    pub particles: Vec<Vec3>,
}

impl Default for FluidDesc {
    fn default() -> Self {
        Self {
            max_particles: 32_767,
            rest_density: 1000.0,
            viscosity: 6.0,
            stiffness: 20.0,
            damping: 0.0,
            external_acceleration: Vec3::ZERO,
            flags: FluidFlags::VISUALIZATION | FluidFlags::ENABLED,
            particles: Vec::new(),
        }
    }
}

/// Creation parameters for a cloth.
#[derive(Clone, Debug, PartialEq)]
pub struct ClothDesc {
    /// Triangle mesh.
    pub mesh: MeshDesc,
    /// World pose of the mesh.
    pub global_pose: Transform,
    /// Collision thickness.
    pub thickness: f32,
    /// Area density.
    pub density: f32,
    /// Bending stiffness in `0..=1`.
    pub bending_stiffness: f32,
    /// Stretching stiffness in `0..=1`.
    pub stretching_stiffness: f32,
    /// Velocity damping in `0..=1`.
    pub damping: f32,
    /// Acceleration applied to every vertex.
    pub external_acceleration: Vec3,
    /// Cloth flags.
    pub flags: ClothFlags,
}

impl ClothDesc {
    /// Cloth over `mesh` with engine defaults elsewhere.
    #[must_use]
    pub fn new(mesh: MeshDesc) -> Self {
        Self {
            mesh,
            global_pose: Transform::IDENTITY,
            thickness: 0.01,
            density: 1.0,
            bending_stiffness: 1.0,
            stretching_stiffness: 1.0,
            damping: 0.5,
            external_acceleration: Vec3::ZERO,
            flags: ClothFlags::GRAVITY,
        }
    }
}

/// Creation parameters for a soft body.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftBodyDesc {
    /// Tetrahedral mesh.
    pub mesh: MeshDesc,
    /// World pose of the mesh.
    pub global_pose: Transform,
    /// Collision radius of each particle.
    pub particle_radius: f32,
    /// Volume density.
    pub density: f32,
    /// Volume stiffness in `0..=1`.
    pub volume_stiffness: f32,
    /// Stretching stiffness in `0..=1`.
    pub stretching_stiffness: f32,
    /// Velocity damping in `0..=1`.
    pub damping: f32,
    /// Acceleration applied to every particle.
    pub external_acceleration: Vec3,
    /// Soft body flags.
    pub flags: SoftBodyFlags,
}

impl SoftBodyDesc {
    /// Soft body over `mesh` with engine defaults elsewhere.
    #[must_use]
    pub fn new(mesh: MeshDesc) -> Self {
        Self {
            mesh,
            global_pose: Transform::IDENTITY,
            particle_radius: 0.1,
            density: 1.0,
            volume_stiffness: 1.0,
            stretching_stiffness: 1.0,
            damping: 0.5,
            external_acceleration: Vec3::ZERO,
            flags: SoftBodyFlags::GRAVITY | SoftBodyFlags::VOLUME_CONSERVATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_volume() {
        let cube = Geometry::Box { half_extents: Vec3::new(0.5, 0.5, 0.5) };
        assert!((cube.volume() - 1.0).abs() < 1e-6);
        assert_eq!(Geometry::Plane { normal: Vec3::Y, distance: 0.0 }.volume(), 0.0);
    }

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::Sphere { radius: 1.0 }.is_valid());
        assert!(!Geometry::Sphere { radius: 0.0 }.is_valid());
        assert!(!Geometry::Plane { normal: Vec3::ZERO, distance: 0.0 }.is_valid());
    }

    #[test]
    fn test_try_map_actors() {
        let desc = JointDesc::new(JointType::Revolute, [Some(1u32), None]);
        let mapped: Result<JointDesc<u64>, ()> = desc.try_map_actors(|a| Ok(u64::from(*a) * 10));
        assert_eq!(mapped.unwrap().actors, [Some(10), None]);

        let failed: Result<JointDesc<u64>, &str> = desc.try_map_actors(|_| Err("missing"));
        assert_eq!(failed.unwrap_err(), "missing");
    }

    #[test]
    fn test_mesh_validation() {
        let tri = MeshDesc {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![0, 1, 2],
        };
        assert!(tri.is_valid(3));
        assert!(!tri.is_valid(4));
        assert!(!MeshDesc::default().is_valid(3));
    }

    #[test]
    fn test_material_validation() {
        assert!(MaterialDesc::default().is_valid());
        let bouncy = MaterialDesc { restitution: 1.5, ..MaterialDesc::default() };
        assert!(!bouncy.is_valid());
    }
}
