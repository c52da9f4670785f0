//! # Scene Configuration
//!
//! Tunables for a [`SceneProxy`](crate::SceneProxy), loaded from TOML:
//!
//! ```toml
//! max_materials = 1024
//! initial_capacity = 512
//! misuse = "report"
//! release_broken_joints = true
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What happens when client code violates a precondition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MisusePolicy {
    /// Fail fast.
    Panic,
    /// Log a warning and return the error.
    Report,
}

impl Default for MisusePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Report
        }
    }
}

/// Configuration for one proxied scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Size of the material index space, including the default material.
    pub max_materials: u16,
    /// Slots reserved up front per entity kind.
    pub initial_capacity: usize,
    /// Precondition violation handling.
    pub misuse: MisusePolicy,
    /// Release joints whose break callback asked for it.
    pub release_broken_joints: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_materials: 4096,
            initial_capacity: 256,
            misuse: MisusePolicy::default(),
            release_broken_joints: true,
        }
    }
}

impl SceneConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or a value is out
    /// of range.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `max_materials` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_materials == 0 {
            return Err(ConfigError::Invalid(
                "max_materials must leave room for the default material".to_string(),
            ));
        }
        Ok(())
    }

    /// Same config with a different misuse policy.
    #[must_use]
    pub fn with_misuse(mut self, misuse: MisusePolicy) -> Self {
        self.misuse = misuse;
        self
    }
}
