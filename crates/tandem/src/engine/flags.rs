//! # Engine Flag Sets
//!
//! Bitmask newtypes for every flag word the engine API exposes. Bit values
//! follow the engine's native enumerations so a native backend can pass
//! [`bits`](ActorFlags::bits) straight through.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$flag_meta:meta])* $flag:ident = $bit:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            $( $(#[$flag_meta])* pub const $flag: Self = Self($bit); )*

            /// No flag set.
            #[inline]
            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Builds a set from raw bits.
            #[inline]
            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Raw bits.
            #[inline]
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Returns `true` if no flag is set.
            #[inline]
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns `true` if every flag of `other` is set.
            #[inline]
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns `true` if any flag of `other` is set.
            #[inline]
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Sets the flags of `other`.
            #[inline]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clears the flags of `other`.
            #[inline]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self(!self.0)
            }
        }
    };
}

flag_set! {
    /// Actor-level collision behaviour.
    ActorFlags {
        /// Ignore all collisions with this actor.
        DISABLE_COLLISION = 1 << 0;
        /// Collide but generate no contact response.
        DISABLE_RESPONSE = 1 << 1;
        /// Keep the centre of mass fixed when shapes change.
        LOCK_COM = 1 << 2;
        /// Fluids pass through this actor.
        FLUID_DISABLE_COLLISION = 1 << 3;
        /// Contacts are routed through contact modification.
        CONTACT_MODIFICATION = 1 << 4;
    }
}

flag_set! {
    /// Dynamic body behaviour.
    BodyFlags {
        /// Gravity does not act on the body.
        DISABLE_GRAVITY = 1 << 0;
        /// Translation along X is locked.
        FROZEN_POS_X = 1 << 1;
        /// Translation along Y is locked.
        FROZEN_POS_Y = 1 << 2;
        /// Translation along Z is locked.
        FROZEN_POS_Z = 1 << 3;
        /// Rotation about X is locked.
        FROZEN_ROT_X = 1 << 4;
        /// Rotation about Y is locked.
        FROZEN_ROT_Y = 1 << 5;
        /// Rotation about Z is locked.
        FROZEN_ROT_Z = 1 << 6;
        /// Pose is driven by the client, not integrated.
        KINEMATIC = 1 << 7;
    }
}

flag_set! {
    /// Per-shape behaviour.
    ShapeFlags {
        /// Report objects entering the trigger volume.
        TRIGGER_ON_ENTER = 1 << 0;
        /// Report objects leaving the trigger volume.
        TRIGGER_ON_LEAVE = 1 << 1;
        /// Report objects staying in the trigger volume.
        TRIGGER_ON_STAY = 1 << 2;
        /// Draw in debug visualization.
        VISUALIZATION = 1 << 3;
        /// Exclude from collision detection.
        DISABLE_COLLISION = 1 << 4;
        /// Exclude from raycasts.
        DISABLE_RAYCASTING = 1 << 6;
        /// Fluid particles touching the shape are removed.
        FLUID_DRAIN = 1 << 8;
        /// Collide but generate no contact response.
        DISABLE_RESPONSE = 1 << 12;
    }
}

flag_set! {
    /// Trigger event status.
    TriggerFlags {
        /// The other shape entered.
        ON_ENTER = 1 << 0;
        /// The other shape left.
        ON_LEAVE = 1 << 1;
        /// The other shape stayed.
        ON_STAY = 1 << 2;
    }
}

flag_set! {
    /// Contact reporting for an actor or shape pair.
    PairFlags {
        /// Never generate contacts for the pair.
        IGNORE_PAIR = 1 << 0;
        /// Report when the pair starts touching.
        NOTIFY_ON_START_TOUCH = 1 << 1;
        /// Report when the pair stops touching.
        NOTIFY_ON_END_TOUCH = 1 << 2;
        /// Report every step the pair touches.
        NOTIFY_ON_TOUCH = 1 << 3;
        /// Report impacts.
        NOTIFY_ON_IMPACT = 1 << 4;
        /// Report rolling contact.
        NOTIFY_ON_ROLL = 1 << 5;
        /// Report sliding contact.
        NOTIFY_ON_SLIDE = 1 << 6;
    }
}

flag_set! {
    /// Joint behaviour.
    JointFlags {
        /// The two jointed actors collide with each other.
        COLLISION_ENABLED = 1 << 0;
        /// Draw in debug visualization.
        VISUALIZATION = 1 << 1;
    }
}

flag_set! {
    /// Material behaviour.
    MaterialFlags {
        /// Friction differs along the anisotropy direction.
        ANISOTROPIC = 1 << 0;
        /// No friction at all.
        DISABLE_FRICTION = 1 << 4;
        /// No strong (static) friction.
        DISABLE_STRONG_FRICTION = 1 << 5;
    }
}

flag_set! {
    /// Fluid behaviour.
    FluidFlags {
        /// Draw in debug visualization.
        VISUALIZATION = 1 << 0;
        /// Gravity does not act on particles.
        DISABLE_GRAVITY = 1 << 1;
        /// Particles push back on rigid bodies.
        COLLISION_TWOWAY = 1 << 2;
        /// Simulation enabled.
        ENABLED = 1 << 3;
    }
}

flag_set! {
    /// Cloth behaviour.
    ClothFlags {
        /// Enclosed volume keeps its pressure.
        PRESSURE = 1 << 0;
        /// Cloth does not move.
        STATIC = 1 << 1;
        /// Exclude from collision detection.
        DISABLE_COLLISION = 1 << 2;
        /// Cloth collides with itself.
        SELF_COLLISION = 1 << 3;
        /// Draw in debug visualization.
        VISUALIZATION = 1 << 4;
        /// Gravity acts on the cloth.
        GRAVITY = 1 << 5;
        /// Bending resistance enabled.
        BENDING = 1 << 6;
    }
}

flag_set! {
    /// Soft body behaviour.
    SoftBodyFlags {
        /// Soft body does not move.
        STATIC = 1 << 1;
        /// Exclude from collision detection.
        DISABLE_COLLISION = 1 << 2;
        /// Soft body collides with itself.
        SELF_COLLISION = 1 << 3;
        /// Draw in debug visualization.
        VISUALIZATION = 1 << 4;
        /// Gravity acts on the soft body.
        GRAVITY = 1 << 5;
        /// Volume is conserved.
        VOLUME_CONSERVATION = 1 << 6;
        /// Velocity damping enabled.
        DAMPING = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_match_native_values() {
        assert_eq!(BodyFlags::KINEMATIC.bits(), 0x80);
        assert_eq!(ShapeFlags::DISABLE_RESPONSE.bits(), 0x1000);
        assert_eq!(PairFlags::NOTIFY_ON_START_TOUCH.bits(), 0x2);
    }

    #[test]
    fn test_set_operations() {
        let mut flags = BodyFlags::FROZEN_POS_X | BodyFlags::FROZEN_POS_Y;
        assert!(flags.contains(BodyFlags::FROZEN_POS_X));
        assert!(!flags.contains(BodyFlags::FROZEN_POS_X | BodyFlags::KINEMATIC));
        assert!(flags.intersects(BodyFlags::FROZEN_POS_Y | BodyFlags::KINEMATIC));

        flags.remove(BodyFlags::FROZEN_POS_X);
        flags.insert(BodyFlags::KINEMATIC);
        assert_eq!(flags, BodyFlags::FROZEN_POS_Y | BodyFlags::KINEMATIC);
        assert!((flags & !flags).is_empty());
    }
}
