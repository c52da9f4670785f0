//! Mathematical types passed through to the simulation engine.
//!
//! All of them are `#[repr(C)]` plain old data so a native backend can
//! reinterpret them without conversion. Only the arithmetic the headless
//! engine and descriptor validation need lives here.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Position, velocity, force or acceleration.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit Y vector
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit Z vector
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Creates a vector from components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared Euclidean length.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Orientation as a unit quaternion. Stored and forwarded, never composed.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quat {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quat {
    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a quaternion from components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Returns `true` if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid pose of an actor, shape, cloth or soft body.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
}

impl Transform {
    /// Identity pose
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quat::IDENTITY);

    /// Creates a pose.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Pure translation.
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Returns `true` if every component is finite. Engines reject
    /// non-finite poses.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_step() {
        let mut position = Vec3::new(1.0, 2.0, 3.0);
        position += Vec3::Y * 0.5;

        assert_eq!(position, Vec3::new(1.0, 2.5, 3.0));
        assert_eq!(Vec3::new(1.0, 2.0, 2.0).length_squared(), 9.0);
    }

    #[test]
    fn test_non_finite_pose_detected() {
        assert!(Transform::from_position(Vec3::X).is_finite());
        assert!(!Transform::new(Vec3::new(f32::NAN, 0.0, 0.0), Quat::IDENTITY).is_finite());
        assert!(!Transform::new(Vec3::ZERO, Quat::new(0.0, f32::INFINITY, 0.0, 1.0)).is_finite());
        assert_eq!(Quat::default(), Quat::IDENTITY);
    }

    #[test]
    fn test_pod_layout() {
        let t = Transform::IDENTITY;
        let bytes: &[u8] = bytemuck::bytes_of(&t);
        assert_eq!(bytes.len(), 28); // 3 + 4 floats
    }
}
