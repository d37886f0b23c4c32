//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file at all) yields [`EngineConfig::default`].
//!
//! ```toml
//! physics_tick_micros = 4000
//! default_priority = 32768
//! time_factor = 1.0
//! gravity = [0.0, -9.81, 0.0]
//! entity_capacity = 1024
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_GRAVITY, DEFAULT_PRIORITY, DEFAULT_TIME_FACTOR, ENTITY_CAPACITY, MAX_PHYSICS_OBJECTS,
    PHYSICS_TICK_MICROS,
};
use crate::math::Vec3;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Startup configuration for the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fixed physics step in microseconds.
    pub physics_tick_micros: u64,
    /// Priority used for write batches created without an explicit one.
    pub default_priority: u16,
    /// World seconds per real second.
    pub time_factor: f32,
    /// Gravity applied by the reference backend.
    pub gravity: [f32; 3],
    /// ECS world capacity.
    pub entity_capacity: usize,
    /// Pre-sizing hint for the body collection.
    pub max_physics_objects: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics_tick_micros: PHYSICS_TICK_MICROS,
            default_priority: DEFAULT_PRIORITY,
            time_factor: DEFAULT_TIME_FACTOR,
            gravity: DEFAULT_GRAVITY,
            entity_capacity: ENTITY_CAPACITY,
            max_physics_objects: MAX_PHYSICS_OBJECTS,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            tick_us = config.physics_tick_micros,
            time_factor = config.time_factor,
            "loaded engine config"
        );
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physics_tick_micros == 0 {
            return Err(ConfigError::Invalid("physics_tick_micros must be > 0".into()));
        }
        if !self.time_factor.is_finite() || self.time_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_factor must be finite and > 0, got {}",
                self.time_factor
            )));
        }
        if self.entity_capacity == 0 || u32::try_from(self.entity_capacity).is_err() {
            return Err(ConfigError::Invalid(format!(
                "entity_capacity must be in 1..=u32::MAX, got {}",
                self.entity_capacity
            )));
        }
        if !Vec3::from_array(self.gravity).is_finite() {
            return Err(ConfigError::Invalid("gravity must be finite".into()));
        }
        Ok(())
    }

    /// The physics step as a [`Duration`].
    #[must_use]
    pub const fn physics_tick(&self) -> Duration {
        Duration::from_micros(self.physics_tick_micros)
    }

    /// Gravity as a vector.
    #[must_use]
    pub const fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }
}
