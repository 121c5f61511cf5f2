//! Per-frame driver. Owns the live uniform block, applies queued parameter
//! writes, and hands a frozen [`FrameSnapshot`] to the presentation backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use glam::Vec3;
use tracing::{debug, info};

use crate::params::{CloudParameters, ParameterUpdate, UniformParameters};

/// Shared flag the windowing side flips to end the loop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Interactive camera state the scheduler reads and advances once per tick.
pub trait CameraRig {
    fn world_position(&self) -> Vec3;
    /// Steps damping/inertia by `dt` seconds.
    fn advance(&mut self, dt: f32);
}

pub trait PresentationBackend {
    /// Blocks until the surface can take another frame and returns the time
    /// since the previous one. `None` means the surface is gone.
    fn wait_for_frame(&mut self) -> Option<Duration>;
    fn present(&mut self, frame: &FrameSnapshot);
}

/// Everything the cloud material reads in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudUniforms {
    pub params: CloudParameters,
    pub camera_position: Vec3,
    /// Keys the per-pixel jitter.
    pub frame: u32,
}

/// Uniform state frozen at the start of a tick. Stages read this, never the
/// live block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    pub index: u64,
    pub elapsed: Duration,
    pub delta: Duration,
    pub uniforms: UniformParameters,
    pub clouds: CloudUniforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    SurfaceClosed,
}

/// Cloneable write end for the configuration side.
#[derive(Debug, Clone)]
pub struct ParameterSender(Sender<ParameterUpdate>);

impl ParameterSender {
    /// Queues a write for the next tick. Returns `false` once the scheduler is gone.
    pub fn send(&self, update: ParameterUpdate) -> bool {
        self.0.send(update).is_ok()
    }
}

pub struct FrameScheduler {
    uniforms: UniformParameters,
    clouds: CloudUniforms,
    elapsed: Duration,
    index: u64,
    updates_tx: Sender<ParameterUpdate>,
    updates_rx: Receiver<ParameterUpdate>,
    stop: StopHandle,
}

impl FrameScheduler {
    pub fn new(uniforms: UniformParameters, cloud: CloudParameters) -> Self {
        let (updates_tx, updates_rx) = unbounded();
        Self {
            uniforms,
            clouds: CloudUniforms {
                params: cloud.clamped(),
                camera_position: Vec3::ZERO,
                frame: 0,
            },
            elapsed: Duration::ZERO,
            index: 0,
            updates_tx,
            updates_rx,
            stop: StopHandle::default(),
        }
    }

    pub fn parameter_sender(&self) -> ParameterSender {
        ParameterSender(self.updates_tx.clone())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn uniforms(&self) -> &UniformParameters {
        &self.uniforms
    }

    pub fn cloud_uniforms(&self) -> &CloudUniforms {
        &self.clouds
    }

    pub fn frame_index(&self) -> u64 {
        self.index
    }

    /// Drains queued writes into the live block. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        for update in self.updates_rx.try_iter() {
            update.apply(&mut self.uniforms, &mut self.clouds.params);
            applied += 1;
        }
        if applied > 0 {
            debug!("applied {applied} parameter updates before frame {}", self.index);
        }
        applied
    }

    /// One tick: pending writes, then time, camera position and frame
    /// counter, then the camera advances. The returned snapshot is what the
    /// frame gets submitted with.
    pub fn tick(&mut self, delta: Duration, camera: &mut impl CameraRig) -> FrameSnapshot {
        self.apply_pending();

        self.elapsed += delta;
        self.uniforms.time = self.elapsed.as_secs_f32();
        self.clouds.camera_position = camera.world_position();
        self.clouds.frame = self.clouds.frame.wrapping_add(1);

        let snapshot = FrameSnapshot {
            index: self.index,
            elapsed: self.elapsed,
            delta,
            uniforms: self.uniforms,
            clouds: self.clouds,
        };

        camera.advance(delta.as_secs_f32());
        self.index += 1;
        snapshot
    }

    /// Runs until stopped or until the backend reports the surface closed.
    /// Each iteration blocks in [`PresentationBackend::wait_for_frame`].
    pub fn run_loop(
        &mut self,
        backend: &mut impl PresentationBackend,
        camera: &mut impl CameraRig,
    ) -> LoopExit {
        info!("frame loop started");
        let exit = loop {
            if self.stop.is_stopped() {
                break LoopExit::Stopped;
            }
            let Some(delta) = backend.wait_for_frame() else {
                break LoopExit::SurfaceClosed;
            };
            let snapshot = self.tick(delta, camera);
            backend.present(&snapshot);
        };
        info!("frame loop ended after {} frames: {exit:?}", self.index);
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Moves one unit along +x per second.
    struct SlidingCamera(Vec3);

    impl CameraRig for SlidingCamera {
        fn world_position(&self) -> Vec3 {
            self.0
        }
        fn advance(&mut self, dt: f32) {
            self.0.x += dt;
        }
    }

    fn scheduler() -> FrameScheduler {
        FrameScheduler::new(UniformParameters::default(), CloudParameters::default())
    }

    #[test]
    fn tick_reads_camera_before_advancing_it() {
        let mut s = scheduler();
        let mut camera = SlidingCamera(Vec3::new(-10.0, 6.0, -2.0));
        let first = s.tick(Duration::from_millis(500), &mut camera);
        let second = s.tick(Duration::from_millis(500), &mut camera);

        assert_eq!(first.clouds.camera_position, Vec3::new(-10.0, 6.0, -2.0));
        assert_eq!(second.clouds.camera_position, Vec3::new(-9.5, 6.0, -2.0));
        assert_eq!(first.clouds.frame, 1);
        assert_eq!(second.clouds.frame, 2);
        assert_eq!(second.uniforms.time, 1.0);
        assert_eq!((first.index, second.index), (0, 1));
    }

    #[test]
    fn queued_updates_land_before_the_snapshot() {
        let mut s = scheduler();
        let sender = s.parameter_sender();
        assert!(sender.send(ParameterUpdate::Strength(4.0)));
        assert!(sender.send(ParameterUpdate::CloudThreshold(0.6)));

        let mut camera = SlidingCamera(Vec3::ZERO);
        let snap = s.tick(Duration::from_millis(16), &mut camera);
        assert_eq!(snap.uniforms.shape.strength, 4.0);
        assert_eq!(snap.clouds.params.threshold, 0.6);
        assert_eq!(s.apply_pending(), 0);
    }

    #[test]
    fn frozen_snapshot_ignores_later_writes() {
        let mut s = scheduler();
        let mut camera = SlidingCamera(Vec3::ZERO);
        let snap = s.tick(Duration::from_millis(16), &mut camera);
        s.parameter_sender().send(ParameterUpdate::WarpStrength(0.9));
        assert_eq!(snap.uniforms.shape.warp_strength, 0.5);
        s.apply_pending();
        assert_eq!(s.uniforms().shape.warp_strength, 0.9);
    }

    struct FixedFrames {
        remaining: usize,
        presented: Vec<u64>,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl PresentationBackend for FixedFrames {
        fn wait_for_frame(&mut self) -> Option<Duration> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Duration::from_millis(16))
        }

        fn present(&mut self, frame: &FrameSnapshot) {
            self.presented.push(frame.index);
            if let Some((n, handle)) = &self.stop_after {
                if self.presented.len() == *n {
                    handle.stop();
                }
            }
        }
    }

    #[test]
    fn loop_ends_when_surface_closes() {
        let mut s = scheduler();
        let mut backend = FixedFrames { remaining: 5, presented: Vec::new(), stop_after: None };
        let exit = s.run_loop(&mut backend, &mut SlidingCamera(Vec3::ZERO));
        assert_eq!(exit, LoopExit::SurfaceClosed);
        assert_eq!(backend.presented, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stop_flag_is_checked_once_per_iteration() {
        let mut s = scheduler();
        let handle = s.stop_handle();
        let mut backend = FixedFrames {
            remaining: 100,
            presented: Vec::new(),
            stop_after: Some((3, handle)),
        };
        let exit = s.run_loop(&mut backend, &mut SlidingCamera(Vec3::ZERO));
        assert_eq!(exit, LoopExit::Stopped);
        assert_eq!(backend.presented.len(), 3);
        assert_eq!(s.frame_index(), 3);
    }

    #[test]
    fn sender_reports_dropped_scheduler() {
        let sender = scheduler().parameter_sender();
        assert!(!sender.send(ParameterUpdate::Strength(1.0)));
    }
}
