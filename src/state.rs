//! Particle state images.
//!
//! Particle state lives in a square RGBA float image, one texel per
//! particle: RGB is the position, A the decay phase in `[0, 1)`. The image
//! side is the smallest integer whose square holds every particle; texels
//! past the particle count are zero padding.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rand::Rng;

use crate::geometry::SampledGeometry;

/// One particle as stored in a state texel.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Texel {
    pub position: [f32; 3],
    /// Decay phase in `[0, 1)`.
    pub phase: f32,
}

impl Texel {
    pub fn new(position: Vec3, phase: f32) -> Self {
        Self {
            position: position.to_array(),
            phase,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn to_vec4(self) -> Vec4 {
        self.position().extend(self.phase)
    }
}

/// Largest state image side every device accepts.
///
/// This is the default 2D texture limit of wgpu. Backends on devices with a
/// higher limit report their own through
/// [`ParticleBackend::max_state_size`](crate::compute::ParticleBackend::max_state_size).
pub const MAX_STATE_SIZE: u32 = 8192;

/// Side of the square state image for `count` particles: `ceil(sqrt(count))`.
///
/// Uses integer arithmetic so large counts are not off by one.
pub fn gpu_size(count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let mut side = (count as f64).sqrt() as u32;
    while (side as u64) * (side as u64) < count as u64 {
        side += 1;
    }
    while side > 1 && ((side - 1) as u64) * ((side - 1) as u64) >= count as u64 {
        side -= 1;
    }
    side
}

/// Number of texels in a state image of side `size`.
pub fn texel_count(size: u32) -> usize {
    size as usize * size as usize
}

/// A square image of particle texels in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct StateImage {
    size: u32,
    count: u32,
    texels: Vec<Texel>,
}

impl StateImage {
    /// A zeroed image large enough for `count` particles.
    pub fn zeroed(count: u32) -> Self {
        let size = gpu_size(count);
        Self {
            size,
            count,
            texels: vec![Texel::zeroed(); texel_count(size)],
        }
    }

    /// An image for `count` particles over texels read back from a device.
    /// Returns `None` if `texels` does not fill the square for `count`.
    pub(crate) fn from_texels(count: u32, texels: Vec<Texel>) -> Option<Self> {
        let size = gpu_size(count);
        (texels.len() == texel_count(size)).then_some(Self {
            size,
            count,
            texels,
        })
    }

    /// Image side in texels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of live particles (texels before the padding).
    pub fn particle_count(&self) -> u32 {
        self.count
    }

    /// Number of padding texels.
    pub fn padding(&self) -> u32 {
        (texel_count(self.size) - self.count as usize) as u32
    }

    /// All texels, padding included.
    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Texel] {
        &mut self.texels
    }

    /// The live particles, padding excluded.
    pub fn particles(&self) -> &[Texel] {
        &self.texels[..self.count as usize]
    }

    /// Raw bytes for texture upload (`Rgba32Float`, tightly packed rows).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> Texel {
        self.texels[y as usize * self.size as usize + x as usize]
    }
}

/// Encode sampled positions into a fresh state image with random phases.
pub fn encode(geometry: &SampledGeometry) -> StateImage {
    encode_with_rng(geometry, &mut rand::thread_rng())
}

/// Encode with a caller-supplied RNG.
///
/// Each particle draws its own phase in `[0, 1)` so respawns are staggered.
pub fn encode_with_rng<R: Rng>(geometry: &SampledGeometry, rng: &mut R) -> StateImage {
    let mut image = StateImage::zeroed(geometry.len() as u32);
    for (texel, &position) in image.texels.iter_mut().zip(geometry.positions()) {
        *texel = Texel::new(position, rng.gen::<f32>());
    }
    image
}
