//! Particle system configuration.
//!
//! Two kinds of settings exist:
//!
//! - [`FlowFieldParams`]: live parameters, read every frame. They can change
//!   at any time and may be loaded from JSON.
//! - [`ParticleConfig`]: construction parameters. They choose the model, the
//!   dedicated mesh, the placement and the decay rate, and stay fixed for the
//!   lifetime of the system.

use std::fs;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mesh::AssetHandle;

/// Live flow field and sprite parameters.
///
/// # Example
///
/// ```
/// use meshdust::config::FlowFieldParams;
///
/// let params = FlowFieldParams::from_json(r#"{ "strength": 4.0 }"#).unwrap();
/// assert_eq!(params.strength, 4.0);
/// assert_eq!(params.frequency, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowFieldParams {
    /// Sprite size multiplier. Must be > 0.
    pub particle_size: f32,
    /// Fraction of the flow field applied each step. 0 freezes the particles.
    pub influence: f32,
    /// Flow speed in world units per second at full influence.
    pub strength: f32,
    /// Spatial frequency of the noise field.
    pub frequency: f32,
}

impl Default for FlowFieldParams {
    fn default() -> Self {
        Self {
            particle_size: 0.07,
            influence: 0.5,
            strength: 2.0,
            frequency: 0.5,
        }
    }
}

impl FlowFieldParams {
    pub fn with_particle_size(mut self, size: f32) -> Self {
        self.particle_size = size;
        self
    }

    pub fn with_influence(mut self, influence: f32) -> Self {
        self.influence = influence;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Check every value is finite and the particle size is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("particle_size", self.particle_size),
            ("influence", self.influence),
            ("strength", self.strength),
            ("frequency", self.frequency),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        if self.particle_size <= 0.0 {
            return Err(ConfigError::InvalidParticleSize(self.particle_size));
        }
        Ok(())
    }

    /// Parse and validate params from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load params from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write params to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Construction parameters of one particle system.
#[derive(Debug, Clone)]
pub struct ParticleConfig {
    /// The model this system initializes from.
    pub asset: AssetHandle,
    /// Mesh used on its own when the model contains it.
    pub dedicated_mesh: Option<String>,
    /// Placement of the point set in the scene.
    pub transform: Mat4,
    /// Phase lost per second. A particle respawns every `1 / decay_rate` s.
    pub decay_rate: f32,
}

impl ParticleConfig {
    pub fn new(asset: impl Into<AssetHandle>) -> Self {
        Self {
            asset: asset.into(),
            dedicated_mesh: None,
            transform: Mat4::IDENTITY,
            decay_rate: 0.3,
        }
    }

    pub fn with_dedicated_mesh(mut self, name: impl Into<String>) -> Self {
        self.dedicated_mesh = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Place the point set from scale, rotation and translation.
    pub fn with_placement(self, scale: f32, rotation: Quat, translation: Vec3) -> Self {
        self.with_transform(Mat4::from_scale_rotation_translation(
            Vec3::splat(scale),
            rotation,
            translation,
        ))
    }

    pub fn with_decay_rate(mut self, decay_rate: f32) -> Self {
        self.decay_rate = decay_rate.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = FlowFieldParams::default();
        assert_eq!(params.particle_size, 0.07);
        assert_eq!(params.influence, 0.5);
        assert_eq!(params.strength, 2.0);
        assert_eq!(params.frequency, 0.5);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = FlowFieldParams::default().with_particle_size(0.0);
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidParticleSize(s)) if s == 0.0
        ));

        let nan = FlowFieldParams::default().with_strength(f32::NAN);
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::NonFinite { name: "strength", .. })
        ));
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let params = FlowFieldParams::default()
            .with_particle_size(0.9)
            .with_strength(4.0);
        let json = params.to_json().unwrap();
        assert_eq!(FlowFieldParams::from_json(&json).unwrap(), params);

        assert!(matches!(
            FlowFieldParams::from_json(r#"{ "particle_size": -1.0 }"#),
            Err(ConfigError::InvalidParticleSize(_))
        ));
        assert!(matches!(
            FlowFieldParams::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_particle_config_builder() {
        let config = ParticleConfig::new("models/ship.glb")
            .with_dedicated_mesh("hull")
            .with_placement(0.5, Quat::IDENTITY, Vec3::X)
            .with_decay_rate(-2.0);

        assert_eq!(config.asset.as_str(), "models/ship.glb");
        assert_eq!(config.dedicated_mesh.as_deref(), Some("hull"));
        assert_eq!(config.transform.transform_point3(Vec3::Y), Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(config.decay_rate, 0.0);
    }
}
