//! The compute stage: double-buffered particle state and its state machine.
//!
//! State lives in two equal images. Each step reads the image written last
//! and writes the other one; the two are then swapped by flipping an index,
//! never by copying. Where the images live is up to the [`ParticleBackend`]:
//! GPU textures in [`crate::gpu::GpuBackend`], host memory in
//! [`crate::reference::CpuBackend`].
//!
//! ```text
//!  Uninitialized ──initialize──▶ Ready ──compute──▶ Computing
//!                                  ▲                    │
//!                                  └────────────────────┘
//! ```

use crate::config::FlowFieldParams;
use crate::render::RenderGeometry;
use crate::state::{StateImage, MAX_STATE_SIZE};
use crate::uniforms::{RenderUniforms, SimulationUniforms};

/// Which of the two state images a handle refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StateSlot(u8);

impl StateSlot {
    /// The image holding the initial state.
    pub const FRONT: StateSlot = StateSlot(0);
    pub const BACK: StateSlot = StateSlot(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The other image.
    pub fn other(self) -> StateSlot {
        StateSlot(self.0 ^ 1)
    }
}

/// Two buffers and the index of the one written last.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    current: StateSlot,
}

impl<T> PingPong<T> {
    /// `front` starts out as the current buffer.
    pub fn new(front: T, back: T) -> Self {
        Self {
            buffers: [front, back],
            current: StateSlot::FRONT,
        }
    }

    pub fn current_slot(&self) -> StateSlot {
        self.current
    }

    pub fn current(&self) -> &T {
        &self.buffers[self.current.index()]
    }

    pub fn get(&self, slot: StateSlot) -> &T {
        &self.buffers[slot.index()]
    }

    pub fn buffers(&self) -> &[T; 2] {
        &self.buffers
    }

    /// Borrow `(read, write)` for the next step: the current buffer and the
    /// other one.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [front, back] = &mut self.buffers;
        if self.current == StateSlot::FRONT {
            (&*front, back)
        } else {
            (&*back, front)
        }
    }

    /// Make the other buffer current.
    pub fn swap(&mut self) {
        self.current = self.current.other();
    }
}

/// Storage and execution of particle state, on some device.
///
/// Implementations own the two state images, the base image and the
/// drawable's vertex data. The stages above decide when each call happens.
pub trait ParticleBackend {
    /// What a draw records into: a render pass, or a list of points.
    type DrawTarget<'a>;

    /// Allocate front, back and base images, all holding `initial`.
    /// Returns the slot holding the current state.
    fn allocate_state(&mut self, initial: &StateImage) -> StateSlot;

    /// Run one update over texels `0..particle_count`, reading the current
    /// image and writing the other, then swap. Returns the slot just written,
    /// or `None` if no state was allocated.
    fn compute(&mut self, uniforms: &SimulationUniforms) -> Option<StateSlot>;

    /// Upload the drawable's per-point attributes.
    fn allocate_drawable(&mut self, drawable: &RenderGeometry);

    /// Draw every point from the state image in `source`.
    fn draw(&self, source: StateSlot, uniforms: &RenderUniforms, target: &mut Self::DrawTarget<'_>);

    /// Largest state image side this backend can allocate.
    fn max_state_size(&self) -> u32 {
        MAX_STATE_SIZE
    }
}

/// Lifecycle of a [`ComputeStage`]. Never returns to `Uninitialized`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StageState {
    Uninitialized,
    Ready,
    /// A step is in flight.
    Computing,
}

/// Result of an initialization request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    /// Already initialized; nothing was touched.
    AlreadyInitialized,
}

/// Drives the backend's state images through the update cycle.
#[derive(Debug)]
pub struct ComputeStage {
    state: StageState,
    uniforms: SimulationUniforms,
    current: Option<StateSlot>,
    steps: u64,
}

impl Default for ComputeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeStage {
    pub fn new() -> Self {
        Self {
            state: StageState::Uninitialized,
            uniforms: SimulationUniforms::default(),
            current: None,
            steps: 0,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn uniforms(&self) -> &SimulationUniforms {
        &self.uniforms
    }

    /// The image written by the last step, or the initial one.
    pub fn current(&self) -> Option<StateSlot> {
        self.current
    }

    /// Steps run since initialization.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Seed the backend with `initial`. Runs at most once.
    pub fn initialize<B: ParticleBackend>(
        &mut self,
        backend: &mut B,
        initial: &StateImage,
        decay_rate: f32,
    ) -> InitOutcome {
        if self.state != StageState::Uninitialized {
            log::debug!("compute stage already initialized, ignoring");
            return InitOutcome::AlreadyInitialized;
        }

        self.uniforms = SimulationUniforms::new(initial.particle_count(), initial.size(), decay_rate);
        self.current = Some(backend.allocate_state(initial));
        self.state = StageState::Ready;
        log::info!(
            "compute stage ready: {} particles on a {}x{} state image ({} padding texels)",
            initial.particle_count(),
            initial.size(),
            initial.size(),
            initial.padding()
        );
        InitOutcome::Initialized
    }

    /// Refresh the per-frame uniforms.
    pub fn set_uniforms(&mut self, time: f32, delta_time: f32, params: &FlowFieldParams) {
        self.uniforms.set_frame(time, delta_time, params);
    }

    /// Run one step. Returns the slot to render from, or `None` before
    /// initialization.
    pub fn compute<B: ParticleBackend>(&mut self, backend: &mut B) -> Option<StateSlot> {
        if self.state != StageState::Ready {
            return None;
        }

        self.state = StageState::Computing;
        let written = backend.compute(&self.uniforms);
        self.state = StageState::Ready;

        if written.is_some() {
            self.current = written;
            self.steps += 1;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong_swaps_without_copying() {
        let mut pp = PingPong::new(vec![1], vec![2]);
        assert_eq!(pp.current_slot(), StateSlot::FRONT);

        {
            let (read, write) = pp.split();
            assert_eq!(read, &vec![1]);
            write[0] = read[0] + 10;
        }
        pp.swap();
        assert_eq!(pp.current_slot(), StateSlot::BACK);
        assert_eq!(pp.current(), &vec![11]);

        let (read, _) = pp.split();
        assert_eq!(read, &vec![11]);
        pp.swap();
        assert_eq!(pp.current(), &vec![1]);
        assert_eq!(pp.get(StateSlot::BACK), &vec![11]);
    }

    #[test]
    fn test_slot_other() {
        assert_eq!(StateSlot::FRONT.other(), StateSlot::BACK);
        assert_eq!(StateSlot::BACK.other(), StateSlot::FRONT);
        assert_eq!(StateSlot::BACK.index(), 1);
    }

    /// Counts calls without storing anything.
    #[derive(Default)]
    struct CountingBackend {
        allocations: u32,
        computes: u32,
        slot: Option<PingPong<()>>,
    }

    impl ParticleBackend for CountingBackend {
        type DrawTarget<'a> = u32;

        fn allocate_state(&mut self, _initial: &StateImage) -> StateSlot {
            self.allocations += 1;
            let pp = PingPong::new((), ());
            let slot = pp.current_slot();
            self.slot = Some(pp);
            slot
        }

        fn compute(&mut self, _uniforms: &SimulationUniforms) -> Option<StateSlot> {
            self.computes += 1;
            let pp = self.slot.as_mut()?;
            pp.swap();
            Some(pp.current_slot())
        }

        fn allocate_drawable(&mut self, _drawable: &RenderGeometry) {}

        fn draw(&self, _source: StateSlot, _uniforms: &RenderUniforms, target: &mut u32) {
            *target += 1;
        }
    }

    #[test]
    fn test_compute_before_initialize_does_nothing() {
        let mut stage = ComputeStage::new();
        let mut backend = CountingBackend::default();
        assert_eq!(stage.compute(&mut backend), None);
        assert_eq!(backend.computes, 0);
        assert_eq!(stage.state(), StageState::Uninitialized);
    }

    #[test]
    fn test_initialize_runs_once() {
        let mut stage = ComputeStage::new();
        let mut backend = CountingBackend::default();
        let image = StateImage::zeroed(5);

        assert_eq!(stage.initialize(&mut backend, &image, 0.3), InitOutcome::Initialized);
        assert_eq!(
            stage.initialize(&mut backend, &image, 0.3),
            InitOutcome::AlreadyInitialized
        );
        assert_eq!(backend.allocations, 1);
        assert_eq!(stage.state(), StageState::Ready);
        assert_eq!(stage.uniforms().particle_count, 5);
        assert_eq!(stage.uniforms().size, 3);
    }

    #[test]
    fn test_compute_alternates_slots() {
        let mut stage = ComputeStage::new();
        let mut backend = CountingBackend::default();
        stage.initialize(&mut backend, &StateImage::zeroed(4), 0.3);
        assert_eq!(stage.current(), Some(StateSlot::FRONT));

        assert_eq!(stage.compute(&mut backend), Some(StateSlot::BACK));
        assert_eq!(stage.compute(&mut backend), Some(StateSlot::FRONT));
        assert_eq!(stage.current(), Some(StateSlot::FRONT));
        assert_eq!(stage.steps(), 2);
        assert_eq!(stage.state(), StageState::Ready);
    }
}
