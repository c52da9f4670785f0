//! Opaque engine object handles.
//!
//! Handles are minted by the engine backend. The proxy layer only stores
//! them, compares them and hashes them.

use std::fmt;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw engine handle.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw engine handle.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{:x}", self.0)
            }
        }
    };
}

engine_handle!(
    /// Engine-side rigid actor.
    ActorHandle
);
engine_handle!(
    /// Engine-side collision shape.
    ShapeHandle
);
engine_handle!(
    /// Engine-side joint.
    JointHandle
);
engine_handle!(
    /// Engine-side particle fluid.
    FluidHandle
);
engine_handle!(
    /// Engine-side cloth.
    ClothHandle
);
engine_handle!(
    /// Engine-side soft body.
    SoftBodyHandle
);

/// Index into the engine's material table.
///
/// The index space is shared between the engine and the proxy layer, so
/// the proxy picks the index and the engine creates the material there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialIndex(pub u16);

impl MaterialIndex {
    /// The engine's built-in material.
    pub const DEFAULT: Self = Self(0);

    /// Returns `true` for the built-in material.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for MaterialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material {}", self.0)
    }
}
