//! Error types for meshdust.
//!
//! Only [`SamplerError::NoGeometry`] and [`InitError::TooManyParticles`] are
//! fatal to a particle system. Texture fallbacks, repeated initialization and early resizes are recovered
//! in place and only show up in the log.

use thiserror::Error;

/// Errors raised while flattening a model into a point population.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// None of the model's meshes carries a position buffer.
    #[error("no geometry found in model '{asset}': no mesh carries a position buffer")]
    NoGeometry { asset: String },
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a GPU with Vulkan/Metal/DX12/WebGPU support is required")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Particle size must be strictly positive.
    #[error("particle size must be > 0, got {0}")]
    InvalidParticleSize(f32),
    /// A parameter was NaN or infinite.
    #[error("parameter '{name}' must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },
    /// The JSON document could not be parsed.
    #[error("invalid flow field config: {0}")]
    Json(#[from] serde_json::Error),
    /// The config file could not be read or written.
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort initialization of one particle system.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The model could not be turned into particles.
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    /// The delivered model is not the one this system was built for.
    #[error("particle system expects model '{expected}', got '{got}'")]
    AssetMismatch { expected: String, got: String },
    /// The model has more points than fit in one state texture.
    #[error("{count} particles need a {size}x{size} state image, the device allows at most {max_size}")]
    TooManyParticles { count: u32, size: u32, max_size: u32 },
}
