//! Frame clock feeding the simulation uniforms.
//!
//! The orchestrator reads `elapsed` and `delta` once per frame. Elapsed time
//! is the sum of the scaled deltas, so a paused or slowed clock slows the
//! flow field animation along with the particle motion.
//!
//! # Example
//!
//! ```
//! use meshdust::time::Time;
//!
//! let mut time = Time::new();
//! time.advance(0.5);
//! time.advance(0.25);
//! assert_eq!(time.elapsed(), 0.75);
//! assert_eq!(time.delta(), 0.25);
//! assert_eq!(time.frame(), 2);
//! ```

use std::time::{Duration, Instant};

/// Frame timing for a particle scene.
#[derive(Debug, Clone)]
pub struct Time {
    last_frame: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Fixed delta time for deterministic stepping.
    fixed_delta: Option<f32>,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
    /// Upper bound on a single wall-clock delta, so a stalled window does
    /// not fling every particle at once.
    max_delta: f32,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
            max_delta: 0.1,
        }
    }

    /// Advance from the wall clock. Call once per displayed frame.
    ///
    /// Returns `(elapsed_time, delta_time)`.
    pub fn update(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let delta = self.fixed_delta.unwrap_or(raw_delta.min(self.max_delta));
        self.step(delta);

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        (self.elapsed_secs, self.delta_secs)
    }

    /// Advance by an explicit delta, ignoring the wall clock.
    ///
    /// Used for headless and deterministic runs. Pause and time scale
    /// still apply.
    pub fn advance(&mut self, delta: f32) -> (f32, f32) {
        self.step(delta.max(0.0));
        (self.elapsed_secs, self.delta_secs)
    }

    fn step(&mut self, raw_delta: f32) {
        self.delta_secs = if self.paused {
            0.0
        } else {
            raw_delta * self.time_scale
        };
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;
    }

    /// Simulated seconds since start.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Simulated seconds covered by the last frame.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Freeze the simulation: `delta()` reads 0 until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.last_frame = Instant::now();
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Use a constant delta per `update()` instead of wall-clock time.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Set time scale multiplier. Negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Clamp applied to wall-clock deltas in `update()`.
    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.frame(), 0);
        assert_eq!(time.elapsed(), 0.0);
        assert!(!time.is_paused());
        assert_eq!(time.time_scale(), 1.0);
    }

    #[test]
    fn test_time_update() {
        let mut time = Time::new();
        thread::sleep(Duration::from_millis(10));
        let (elapsed, delta) = time.update();

        assert!(elapsed > 0.0);
        assert!(delta > 0.0);
        assert_eq!(elapsed, delta);
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_wall_clock_delta_is_clamped() {
        let mut time = Time::new();
        time.set_max_delta(0.001);
        thread::sleep(Duration::from_millis(20));
        time.update();
        assert_eq!(time.delta(), 0.001);
    }

    #[test]
    fn test_time_pause() {
        let mut time = Time::new();
        time.advance(0.1);

        time.pause();
        assert!(time.is_paused());

        let elapsed_before = time.elapsed();
        time.advance(0.1);
        assert_eq!(time.elapsed(), elapsed_before);
        assert_eq!(time.delta(), 0.0);

        time.toggle_pause();
        time.advance(0.1);
        assert!(time.elapsed() > elapsed_before);
    }

    #[test]
    fn test_time_scale() {
        let mut time = Time::new();
        time.set_time_scale(2.0);
        time.advance(0.25);
        assert_eq!(time.delta(), 0.5);

        time.set_time_scale(-1.0);
        assert_eq!(time.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta() {
        let mut time = Time::new();
        time.set_fixed_delta(Some(1.0 / 60.0));

        thread::sleep(Duration::from_millis(50));
        time.update();

        assert!((time.delta() - 1.0 / 60.0).abs() < 0.0001);
    }
}
