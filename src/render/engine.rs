//! The render engine: public command surface plus the render-thread loop.
//!
//! The engine is the sole caller of the GPU API. Commands arrive over three
//! queues with distinct semantics:
//!
//! - scene queue: lossless FIFO, one package processed per loop iteration
//! - camera queue: drained to the last value each iteration
//! - sky queue: drained to the last value each iteration
//!
//! The drain-to-last rule keeps the engine from lagging behind
//! high-frequency UI updates; intermediate values are intentionally
//! dropped. Finished frames go out through the single-slot [`FrameSlot`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::gpu::{GpuContext, GpuScene};
use crate::render::{BuiltScene, CameraUniform, Frame, FrameSlot};
use crate::scene::Camera;
use crate::util::Result;

/// Sleep while no scene and no camera have ever been received.
const IDLE_SLEEP: Duration = Duration::from_millis(16);

/// How long `stop()` waits for the render thread before detaching it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Render engine configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// The compute kernel, loaded at engine startup.
    pub shader_path: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            shader_path: PathBuf::from("shaders/raytrace.wgsl"),
        }
    }
}

/// Receiver halves of the command queues, moved onto the render thread.
struct EngineChannels {
    scene_rx: Receiver<BuiltScene>,
    camera_rx: Receiver<Camera>,
    sky_rx: Receiver<bool>,
    done_tx: Sender<()>,
}

/// Handle to the render role.
///
/// All submit methods are thread-safe and non-blocking. The engine thread
/// exclusively owns every GPU object from `start()` until `stop()`.
pub struct RenderEngine {
    config: RenderConfig,
    scene_tx: Sender<BuiltScene>,
    camera_tx: Sender<Camera>,
    sky_tx: Sender<bool>,
    running: Arc<AtomicBool>,
    frame_slot: Arc<FrameSlot>,
    last_error: Arc<Mutex<Option<String>>>,
    channels: Option<EngineChannels>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl RenderEngine {
    pub fn new(config: RenderConfig) -> Self {
        let (scene_tx, scene_rx) = channel();
        let (camera_tx, camera_rx) = channel();
        let (sky_tx, sky_rx) = channel();
        let (done_tx, done_rx) = channel();

        Self {
            config,
            scene_tx,
            camera_tx,
            sky_tx,
            running: Arc::new(AtomicBool::new(false)),
            frame_slot: Arc::new(FrameSlot::new()),
            last_error: Arc::new(Mutex::new(None)),
            channels: Some(EngineChannels {
                scene_rx,
                camera_rx,
                sky_rx,
                done_tx,
            }),
            done_rx,
            thread: None,
        }
    }

    /// Spawn the render thread. May be called once.
    pub fn start(&mut self) {
        let channels = match self.channels.take() {
            Some(c) => c,
            None => return, // already started
        };

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let frame_slot = Arc::clone(&self.frame_slot);
        let last_error = Arc::clone(&self.last_error);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("render-engine".into())
            .spawn(move || {
                if let Err(e) = engine_loop(&config, &channels, &running, &frame_slot) {
                    tracing::error!(error = %e, "render thread terminated");
                    *last_error.lock() = Some(e.to_string());
                }
                running.store(false, Ordering::Relaxed);
                let _ = channels.done_tx.send(());
            })
            .expect("failed to spawn render-engine thread");

        self.thread = Some(handle);
    }

    /// Signal shutdown and join the render thread with a bounded timeout.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let Some(handle) = self.thread.take() else {
            return;
        };
        match self.done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout = ?SHUTDOWN_TIMEOUT,
                    "render thread did not stop in time; detaching"
                );
            }
        }
    }

    /// Enqueue a new scene package for upload.
    pub fn submit_scene(&self, package: BuiltScene) {
        let _ = self.scene_tx.send(package);
    }

    /// Enqueue a camera update (viewport vectors plus accumulation counter).
    pub fn submit_camera(&self, camera: Camera) {
        let _ = self.camera_tx.send(camera);
    }

    /// Enqueue a sky-enabled update.
    pub fn submit_sky(&self, enabled: bool) {
        let _ = self.sky_tx.send(enabled);
    }

    /// Take the latest published frame, if any.
    pub fn take_frame(&self) -> Option<Frame> {
        self.frame_slot.take()
    }

    /// Whether the render thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Take the fatal error the render thread died with, if any.
    pub fn take_error(&self) -> Option<String> {
        self.last_error.lock().take()
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The render-thread main loop.
fn engine_loop(
    config: &RenderConfig,
    channels: &EngineChannels,
    running: &AtomicBool,
    frame_slot: &FrameSlot,
) -> Result<()> {
    let mut gpu = GpuContext::new(config.width, config.height, &config.shader_path)?;

    let mut scene: Option<GpuScene> = None;
    let mut camera: Option<Camera> = None;
    let mut sky_enabled = false;

    while running.load(Ordering::Relaxed) {
        // Scene uploads are the slow path: at most one per iteration.
        if let Ok(package) = channels.scene_rx.try_recv() {
            scene = Some(gpu.upload_scene(&package, scene.take())?);
        }
        if let Some(cam) = drain_to_last(&channels.camera_rx) {
            camera = Some(cam);
        }
        if let Some(flag) = drain_to_last(&channels.sky_rx) {
            sky_enabled = flag;
        }

        // Nothing to render against until the UI says something.
        if scene.is_none() && camera.is_none() {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        // The uniform write must precede the submit inside render_frame so
        // the dispatch observes this frame's camera and counter.
        let uniform = match &camera {
            Some(cam) => CameraUniform::new(cam, sky_enabled),
            None => CameraUniform::new(&Camera::default(), sky_enabled),
        };
        gpu.write_uniform(&uniform);

        let triangle_count = scene.as_ref().map_or(0, |s| s.triangle_count);
        let pixels = gpu.render_frame(triangle_count)?;

        frame_slot.publish(Frame {
            pixels,
            width: config.width,
            height: config.height,
        });
    }

    // Cleanup: drop anything still queued, then release GPU resources
    // behind one final idle wait.
    while channels.scene_rx.try_recv().is_ok() {}
    while channels.camera_rx.try_recv().is_ok() {}
    while channels.sky_rx.try_recv().is_ok() {}

    gpu.wait_idle();
    if let Some(scene) = scene.take() {
        scene.destroy();
    }
    tracing::info!("render thread shut down");
    Ok(())
}

/// Drain a queue, keeping only the most recent value.
fn drain_to_last<T>(rx: &Receiver<T>) -> Option<T> {
    let mut latest = None;
    while let Ok(value) = rx.try_recv() {
        latest = Some(value);
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_to_last_keeps_latest() {
        let (tx, rx) = channel();
        for i in 0..10 {
            tx.send(i).unwrap();
        }
        assert_eq!(drain_to_last(&rx), Some(9));
        assert_eq!(drain_to_last(&rx), None);
    }

    #[test]
    fn test_drain_to_last_empty() {
        let (_tx, rx) = channel::<u32>();
        assert_eq!(drain_to_last(&rx), None);
    }

    #[test]
    fn test_scene_queue_is_lossless_fifo() {
        let (tx, rx) = channel();
        tx.send(1u32).unwrap();
        tx.send(2u32).unwrap();
        // One per iteration, in order
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[test]
    fn test_engine_submits_are_nonblocking_without_thread() {
        // Senders must not block or panic before start(); a stopped engine
        // simply discards submissions.
        let engine = RenderEngine::new(RenderConfig::default());
        engine.submit_sky(true);
        engine.submit_camera(Camera::default());
        engine.submit_scene(BuiltScene::empty());
        assert!(engine.take_frame().is_none());
        assert!(!engine.is_running());
    }
}
