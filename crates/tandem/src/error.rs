//! # Proxy Error Types
//!
//! Three families of failure reach the caller:
//!
//! | Family | Examples | Handling |
//! |---|---|---|
//! | Misuse | writing a released entity, committing mid-step | governed by [`MisusePolicy`](crate::MisusePolicy) |
//! | Exhaustion | material index space full | always returned |
//! | Initialization | engine rejected a descriptor | reported to the failure sink during commit |

use thiserror::Error;

use tandem_core::CoreError;

use crate::proxy::EntityKind;

/// Errors raised by an engine backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused to build an object from its descriptor.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The handle does not name a live engine object.
    #[error("unknown engine handle")]
    UnknownHandle,

    /// A joint references an actor that has no engine object yet.
    #[error("joint references an actor that is not instanced")]
    UnresolvedActor,

    /// A shape references a material index the engine does not know.
    #[error("unknown material index {0}")]
    UnknownMaterial(u16),

    /// The engine ran out of room for objects of this kind.
    #[error("engine capacity exceeded")]
    CapacityExceeded,
}

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the proxy layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Mutation of an entity that was already released.
    #[error("{kind} is awaiting deletion and cannot be modified")]
    AwaitingDelete {
        /// Entity kind.
        kind: EntityKind,
    },

    /// The id or handle no longer names an entity of this scene.
    #[error("stale {kind} handle")]
    StaleHandle {
        /// Entity kind.
        kind: EntityKind,
    },

    /// Release of an entity that was already released.
    #[error("{kind} was already released")]
    AlreadyReleased {
        /// Entity kind.
        kind: EntityKind,
    },

    /// The engine object does not exist yet.
    #[error("{kind} has not been instanced")]
    NotInstanced {
        /// Entity kind.
        kind: EntityKind,
    },

    /// The engine is advancing a step and must not be written.
    #[error("scene is not writable while a simulation step is in flight")]
    NotWritable,

    /// `fetch_results` without a preceding `simulate`.
    #[error("no simulation step is in flight")]
    NotSimulating,

    /// Every material index is in use.
    #[error("material indices exhausted: capacity {capacity}")]
    MaterialIndicesExhausted {
        /// Size of the material index space.
        capacity: usize,
    },

    /// The default material cannot be released.
    #[error("the default material cannot be released")]
    DefaultMaterial,

    /// An entity cannot be paired with itself.
    #[error("an entity cannot be paired with itself")]
    SelfPair,

    /// Internal container invariant violated.
    #[error("registry error: {0}")]
    Registry(#[from] CoreError),

    /// The engine rejected a call.
    #[error("engine rejected {kind} operation: {source}")]
    Engine {
        /// Entity kind.
        kind: EntityKind,
        /// Engine error.
        #[source]
        source: EngineError,
    },
}

impl ProxyError {
    /// Returns `true` for precondition violations that correct client code
    /// never triggers.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::AwaitingDelete { .. }
                | Self::StaleHandle { .. }
                | Self::AlreadyReleased { .. }
                | Self::NotWritable
                | Self::NotSimulating
                | Self::DefaultMaterial
                | Self::SelfPair
                | Self::Registry(_)
        )
    }

    pub(crate) const fn engine(kind: EntityKind, source: EngineError) -> Self {
        Self::Engine { kind, source }
    }
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while loading a [`SceneConfig`](crate::SceneConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document did not parse into a config.
    #[error("invalid scene config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid scene config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misuse_classification() {
        assert!(ProxyError::NotWritable.is_misuse());
        assert!(ProxyError::AwaitingDelete { kind: EntityKind::Actor }.is_misuse());
        assert!(ProxyError::Registry(CoreError::NotTracked).is_misuse());

        assert!(!ProxyError::MaterialIndicesExhausted { capacity: 4 }.is_misuse());
        assert!(!ProxyError::NotInstanced { kind: EntityKind::Joint }.is_misuse());
        assert!(!ProxyError::engine(EntityKind::Shape, EngineError::UnknownHandle).is_misuse());
    }

    #[test]
    fn test_display_names_kind() {
        let err = ProxyError::AwaitingDelete { kind: EntityKind::SoftBody };
        assert_eq!(err.to_string(), "soft body is awaiting deletion and cannot be modified");
    }
}
