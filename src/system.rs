//! Frame orchestration for one particle system.
//!
//! A [`ParticleSystem`] is built for one model and sits idle until that
//! model is delivered. The first matching delivery samples the geometry,
//! encodes the initial state and brings up both stages. From then on, each
//! displayed frame runs, in this order:
//!
//! 1. push time and flow parameters into the compute stage,
//! 2. run one compute step,
//! 3. take the handle of the image just written,
//! 4. bind it as the render stage's source,
//! 5. draw.
//!
//! Steps 1-4 are [`ParticleSystem::frame`], step 5 is
//! [`ParticleSystem::draw`]. A draw without a compute in the same frame is
//! refused.
//!
//! # Example
//!
//! ```
//! use meshdust::prelude::*;
//!
//! let asset = ModelAsset::new("ring").with_mesh(primitives::torus("ring", 1.0, 0.3, 24, 12));
//! let mut system = ParticleSystem::new(ParticleConfig::new("ring"), CpuBackend::new());
//! assert!(!system.is_ready());
//!
//! system.on_asset(&asset).unwrap();
//! system.resize(Viewport::new(800.0, 600.0, 1.0));
//!
//! let mut time = Time::new();
//! time.advance(1.0 / 60.0);
//! system.frame(&time, Mat4::IDENTITY);
//!
//! let mut points = Vec::new();
//! assert!(system.draw(&mut points));
//! assert_eq!(points.len(), 24 * 12);
//! ```

use std::sync::Arc;

use glam::Mat4;
use rand::Rng;

use crate::compute::{ComputeStage, InitOutcome, ParticleBackend, StageState, StateSlot};
use crate::config::{FlowFieldParams, ParticleConfig};
use crate::error::{ConfigError, InitError};
use crate::geometry::{GeometrySampler, SampledGeometry};
use crate::mesh::{AssetHandle, ModelAsset};
use crate::render::{RenderGeometry, RenderStage};
use crate::state;
use crate::time::Time;
use crate::uniforms::Viewport;

/// Where a particle system is in its life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SystemState {
    /// The model has not arrived yet.
    Waiting,
    /// Initialized; computes and draws every frame.
    Ready,
    /// The model had no usable geometry. Nothing is computed or drawn.
    Failed,
}

/// One mesh-driven particle system and its backend.
pub struct ParticleSystem<B: ParticleBackend> {
    config: ParticleConfig,
    params: FlowFieldParams,
    sampler: GeometrySampler,
    backend: B,
    compute: ComputeStage,
    render: Option<RenderStage>,
    geometry: Option<Arc<SampledGeometry>>,
    viewport: Option<Viewport>,
    failure: Option<InitError>,
    computed: bool,
}

impl<B: ParticleBackend> ParticleSystem<B> {
    pub fn new(config: ParticleConfig, backend: B) -> Self {
        let sampler = match &config.dedicated_mesh {
            Some(name) => GeometrySampler::new().with_dedicated_mesh(name.clone()),
            None => GeometrySampler::new(),
        };
        Self {
            config,
            params: FlowFieldParams::default(),
            sampler,
            backend,
            compute: ComputeStage::new(),
            render: None,
            geometry: None,
            viewport: None,
            failure: None,
            computed: false,
        }
    }

    /// Start from `params` instead of the defaults.
    ///
    /// Invalid parameters are rejected with a warning and the defaults kept;
    /// use [`set_params`](Self::set_params) to get the error back.
    pub fn with_params(mut self, params: FlowFieldParams) -> Self {
        if let Err(err) = self.set_params(params) {
            log::warn!(
                "system for '{}' keeps its previous parameters: {}",
                self.config.asset,
                err
            );
        }
        self
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// The model this system waits for.
    pub fn asset(&self) -> &AssetHandle {
        &self.config.asset
    }

    pub fn params(&self) -> &FlowFieldParams {
        &self.params
    }

    /// Replace the live parameters. Takes effect on the next frame.
    pub fn set_params(&mut self, params: FlowFieldParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn state(&self) -> SystemState {
        if self.failure.is_some() {
            SystemState::Failed
        } else if self.render.is_some() {
            SystemState::Ready
        } else {
            SystemState::Waiting
        }
    }

    /// Initialized and at least one compute step done, so the next
    /// [`draw`](Self::draw) after a [`frame`](Self::frame) shows real state.
    pub fn is_ready(&self) -> bool {
        self.state() == SystemState::Ready && self.compute.steps() > 0
    }

    /// Why initialization failed, if it did.
    pub fn failure(&self) -> Option<&InitError> {
        self.failure.as_ref()
    }

    /// The sampled model, once initialized.
    pub fn geometry(&self) -> Option<&Arc<SampledGeometry>> {
        self.geometry.as_ref()
    }

    pub fn compute_stage(&self) -> &ComputeStage {
        &self.compute
    }

    pub fn render_stage(&self) -> Option<&RenderStage> {
        self.render.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Move the drawn point set. The simulation itself is unaffected.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.config.transform = transform;
        if let Some(render) = &mut self.render {
            render.set_transform(transform);
        }
    }

    /// Offer a delivered model. Initializes on the first matching delivery.
    ///
    /// Models with another handle are left alone and reported as
    /// [`InitError::AssetMismatch`]. Later deliveries of the right model
    /// return [`InitOutcome::AlreadyInitialized`] without touching any state.
    pub fn on_asset(&mut self, asset: &ModelAsset) -> Result<InitOutcome, InitError> {
        self.initialize_with_rng(asset, &mut rand::thread_rng())
    }

    /// [`on_asset`](Self::on_asset) with a caller-supplied RNG for the
    /// particle phases and sizes.
    pub fn initialize_with_rng<R: Rng>(
        &mut self,
        asset: &ModelAsset,
        rng: &mut R,
    ) -> Result<InitOutcome, InitError> {
        if asset.handle != self.config.asset {
            log::debug!(
                "system for '{}' ignoring model '{}'",
                self.config.asset,
                asset.handle
            );
            return Err(InitError::AssetMismatch {
                expected: self.config.asset.to_string(),
                got: asset.handle.to_string(),
            });
        }
        if self.compute.state() != StageState::Uninitialized {
            log::debug!("system for '{}' already initialized", self.config.asset);
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let geometry = match self.sample_within_limits(asset) {
            Ok(geometry) => Arc::new(geometry),
            Err(err) => {
                log::error!("particle system for '{}' failed: {}", self.config.asset, err);
                self.failure = Some(err.clone());
                return Err(err);
            }
        };
        self.failure = None;

        let initial = state::encode_with_rng(&geometry, rng);
        let outcome = self
            .compute
            .initialize(&mut self.backend, &initial, self.config.decay_rate);

        let drawable = RenderGeometry::with_rng(geometry.clone(), initial.size(), rng);
        self.backend.allocate_drawable(&drawable);

        let mut render = RenderStage::new(drawable, initial.size(), self.config.transform);
        render.set_frame(Mat4::IDENTITY, self.params.particle_size);
        if let Some(viewport) = &self.viewport {
            render.resize(viewport);
        }
        self.render = Some(render);
        self.geometry = Some(geometry);

        log::info!(
            "particle system for '{}' ready with {} points",
            self.config.asset,
            initial.particle_count()
        );
        Ok(outcome)
    }

    fn sample_within_limits(&self, asset: &ModelAsset) -> Result<SampledGeometry, InitError> {
        let geometry = self.sampler.sample(asset)?;
        let count = u32::try_from(geometry.len()).unwrap_or(u32::MAX);
        let size = state::gpu_size(count);
        let max_size = self.backend.max_state_size();
        if size > max_size {
            return Err(InitError::TooManyParticles {
                count,
                size,
                max_size,
            });
        }
        Ok(geometry)
    }

    /// Push a new viewport. Only the resolution uniform changes.
    ///
    /// Before initialization the viewport is remembered and applied once
    /// the render stage exists. Returns whether it was applied now.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        self.viewport = Some(viewport);
        match &mut self.render {
            Some(render) => {
                render.resize(&viewport);
                true
            }
            None => {
                log::debug!("resize before initialization, deferring");
                false
            }
        }
    }

    /// Run steps 1-4 of a frame. Returns the bound state slot, or `None`
    /// when the system is not ready.
    pub fn frame(&mut self, time: &Time, view_proj: Mat4) -> Option<StateSlot> {
        self.computed = false;
        let render = self.render.as_mut()?;

        self.compute
            .set_uniforms(time.elapsed(), time.delta(), &self.params);
        let slot = self.compute.compute(&mut self.backend)?;
        render.bind(slot);
        render.set_frame(view_proj, self.params.particle_size);

        self.computed = true;
        Some(slot)
    }

    /// Step 5: draw from the slot bound by [`frame`](Self::frame).
    ///
    /// Returns `false`, drawing nothing, when the system is not ready or no
    /// compute ran since the last draw.
    pub fn draw(&mut self, target: &mut B::DrawTarget<'_>) -> bool {
        let Some(render) = self.render.as_mut() else {
            return false;
        };
        if !self.computed {
            log::warn!(
                "refusing to draw '{}': no compute step ran this frame",
                self.config.asset
            );
            return false;
        }
        let Some(source) = render.end_frame() else {
            return false;
        };

        self.backend.draw(source, render.uniforms(), target);
        self.computed = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SourceMesh;
    use crate::reference::CpuBackend;
    use glam::Vec3;

    fn asset(name: &str, count: usize) -> ModelAsset {
        ModelAsset::new(name).with_mesh(SourceMesh::new(
            "points",
            (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
        ))
    }

    fn stepped(delta: f32) -> Time {
        let mut time = Time::new();
        time.advance(delta);
        time
    }

    #[test]
    fn test_waits_for_matching_asset() {
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());
        assert_eq!(system.state(), SystemState::Waiting);
        assert_eq!(system.frame(&stepped(0.016), Mat4::IDENTITY), None);

        let err = system.on_asset(&asset("b", 4)).unwrap_err();
        assert!(matches!(err, InitError::AssetMismatch { .. }));
        assert_eq!(system.state(), SystemState::Waiting);

        assert_eq!(system.on_asset(&asset("a", 4)), Ok(InitOutcome::Initialized));
        assert_eq!(system.state(), SystemState::Ready);
        assert_eq!(system.on_asset(&asset("a", 4)), Ok(InitOutcome::AlreadyInitialized));
    }

    #[test]
    fn test_ready_after_first_compute() {
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());
        system.on_asset(&asset("a", 5)).unwrap();
        assert_eq!(system.state(), SystemState::Ready);
        assert!(!system.is_ready());

        system.frame(&stepped(0.016), Mat4::IDENTITY);
        assert!(system.is_ready());
        assert!(system.draw(&mut Vec::new()));
        // Stays ready across frames.
        assert!(system.is_ready());
    }

    #[test]
    fn test_with_params_rejects_invalid() {
        let bad = FlowFieldParams::default().with_particle_size(-1.0);
        let system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new()).with_params(bad);
        assert_eq!(system.params(), &FlowFieldParams::default());

        let nan = FlowFieldParams::default().with_strength(f32::NAN);
        let system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new()).with_params(nan);
        assert_eq!(system.params(), &FlowFieldParams::default());

        let good = FlowFieldParams::default().with_strength(3.0);
        let system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new()).with_params(good);
        assert_eq!(system.params().strength, 3.0);
    }

    #[test]
    fn test_rejects_state_larger_than_device_allows() {
        // 17 points need a 5x5 image.
        let backend = CpuBackend::new().with_max_state_size(4);
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), backend);

        let err = system.on_asset(&asset("a", 17)).unwrap_err();
        assert_eq!(
            err,
            InitError::TooManyParticles {
                count: 17,
                size: 5,
                max_size: 4
            }
        );
        assert_eq!(system.state(), SystemState::Failed);
        assert!(system.backend().images().is_none());
        assert!(system.frame(&stepped(0.016), Mat4::IDENTITY).is_none());

        // 16 points fit exactly.
        let backend = CpuBackend::new().with_max_state_size(4);
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), backend);
        assert!(system.on_asset(&asset("a", 16)).is_ok());
        assert_eq!(system.backend().current_image().unwrap().size(), 4);
    }

    #[test]
    fn test_draw_requires_compute() {
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());
        system.on_asset(&asset("a", 9)).unwrap();

        let mut points = Vec::new();
        assert!(!system.draw(&mut points));
        assert!(points.is_empty());

        assert_eq!(system.frame(&stepped(0.016), Mat4::IDENTITY), Some(StateSlot::BACK));
        assert!(system.draw(&mut points));
        assert_eq!(points.len(), 9);

        // The handle does not outlive its frame.
        assert!(!system.draw(&mut points));
        assert_eq!(system.render_stage().unwrap().source(), None);
    }

    #[test]
    fn test_failed_system_never_computes() {
        let empty = ModelAsset::new("a").with_mesh(SourceMesh::new("hull", Vec::new()));
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());

        let err = system.on_asset(&empty).unwrap_err();
        assert!(matches!(err, InitError::Sampler(_)));
        assert_eq!(system.state(), SystemState::Failed);
        assert_eq!(system.frame(&stepped(0.016), Mat4::IDENTITY), None);
        assert!(!system.draw(&mut Vec::new()));
        assert_eq!(system.compute_stage().steps(), 0);
    }

    #[test]
    fn test_resize_before_init_is_deferred() {
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());
        assert!(!system.resize(Viewport::new(400.0, 300.0, 2.5)));

        system.on_asset(&asset("a", 3)).unwrap();
        let uniforms = system.render_stage().unwrap().uniforms();
        assert_eq!(uniforms.resolution, [800.0, 600.0]);
    }

    #[test]
    fn test_set_params_validates() {
        let mut system = ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new());
        assert!(system.set_params(FlowFieldParams::default().with_particle_size(0.0)).is_err());
        assert_eq!(system.params(), &FlowFieldParams::default());

        let params = FlowFieldParams::default().with_strength(4.0);
        system.set_params(params).unwrap();
        assert_eq!(system.params().strength, 4.0);
    }

    #[test]
    fn test_frame_pushes_live_params() {
        let params = FlowFieldParams::default().with_particle_size(0.9).with_influence(0.25);
        let mut system =
            ParticleSystem::new(ParticleConfig::new("a"), CpuBackend::new()).with_params(params);
        system.on_asset(&asset("a", 3)).unwrap();
        system.frame(&stepped(0.02), Mat4::IDENTITY);

        let sim = system.compute_stage().uniforms();
        assert_eq!(sim.flow_field_influence, 0.25);
        assert_eq!(sim.delta_time, 0.02);
        assert_eq!(system.render_stage().unwrap().uniforms().particle_size, 0.9);
    }
}
