//! The render host: surface lifecycle, frame loop and teardown.
//!
//! A [`GraphicsHost`] moves through `Uninitialized → Initializing → Running
//! → Disposed`. Disposal is requested through a cloneable [`DisposeHandle`]
//! that flips a first-class flag; the host checks the flag at every resume
//! point, which is what makes a disposal requested during asynchronous
//! surface acquisition safe: the transition to `Running` is suppressed and
//! the just-acquired surface is released before anything is scheduled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::{
    config::RenderConfig,
    midi::MidiEvent,
    platform::{EventPump, FrameEvent, RenderSurface, SurfaceProvider},
    scene::{Camera, Scene},
    visual::VisualPool,
    Result,
};

/// Lifecycle state of a [`GraphicsHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Uninitialized,
    Initializing,
    Running,
    Disposed,
}

/// Requests disposal of the host that issued it.
///
/// Safe to invoke at any point of the host's life, including before
/// initialization completed, and safe to invoke more than once. The host
/// finishes the teardown at its next resume point.
#[derive(Clone)]
pub struct DisposeHandle {
    requested: Arc<AtomicBool>,
}

impl DisposeHandle {
    pub fn dispose(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Owns the drawable surface, the scene, the camera and every visual pool,
/// and drives the per-frame update/render cycle.
pub struct GraphicsHost {
    state: HostState,
    disposal: Arc<AtomicBool>,
    provider: Option<Box<dyn SurfaceProvider>>,
    surface: Option<Box<dyn RenderSurface>>,
    scene: Scene,
    camera: Camera,
    pools: Vec<Box<dyn VisualPool>>,
    last_frame: Option<Instant>,
    frames_rendered: u64,
}

impl GraphicsHost {
    /// Builds a host around an unacquired surface and the pools it will
    /// drive. Returns the host together with its disposal handle.
    pub fn new(
        provider: Box<dyn SurfaceProvider>,
        pools: Vec<Box<dyn VisualPool>>,
        config: &RenderConfig,
    ) -> (Self, DisposeHandle) {
        let disposal = Arc::new(AtomicBool::new(false));
        let mut camera = Camera::new(config.fov_degrees, 1.0, config.near, config.far);
        camera.position = [0.0, 0.0, config.camera_z];

        let host = Self {
            state: HostState::Uninitialized,
            disposal: Arc::clone(&disposal),
            provider: Some(provider),
            surface: None,
            scene: Scene::new(),
            camera,
            pools,
            last_frame: None,
            frames_rendered: 0,
        };
        (host, DisposeHandle { requested: disposal })
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Frames presented so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn dispose_handle(&self) -> DisposeHandle {
        DisposeHandle {
            requested: Arc::clone(&self.disposal),
        }
    }

    /// Acquires the surface and transitions to `Running`.
    ///
    /// This is the asynchronous suspension point of the lifecycle. If
    /// disposal was requested before or while the provider resolved, the
    /// acquired surface is released immediately, no frame is ever
    /// scheduled, and the call still returns `Ok`. Acquisition failures are
    /// surfaced exactly once; the host does not retry.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != HostState::Uninitialized {
            return Ok(());
        }
        if self.disposal.load(Ordering::SeqCst) {
            self.finish_dispose();
            return Ok(());
        }

        self.state = HostState::Initializing;
        let mut provider = self.provider.take().expect("provider present until init");

        match provider.acquire() {
            Ok(surface) => {
                let (width, height) = surface.size();
                self.camera.set_viewport(width, height);
                self.surface = Some(surface);

                if self.disposal.load(Ordering::SeqCst) {
                    // Disposal raced the acquisition; release everything
                    // and never start animating.
                    self.finish_dispose();
                    return Ok(());
                }

                self.state = HostState::Running;
                self.last_frame = None;
                tracing::info!(width, height, "render host running");
                Ok(())
            }
            Err(err) => {
                self.finish_dispose();
                Err(err)
            }
        }
    }

    /// Forwards one decoded event to every attached pool, in order.
    pub fn on_midi_event(&mut self, event: &MidiEvent) {
        if self.state != HostState::Running {
            return;
        }
        for pool in &mut self.pools {
            pool.on_event(&mut self.scene, event);
        }
    }

    /// Produces one frame: advances every pool by the elapsed time, then
    /// submits exactly one render. No-op unless `Running`.
    pub fn render_frame(&mut self, now: Instant) -> Result<()> {
        if self.disposal.load(Ordering::SeqCst) {
            self.finish_dispose();
            return Ok(());
        }
        if self.state != HostState::Running {
            return Ok(());
        }

        let delta_seconds = self
            .last_frame
            .map(|previous| now.saturating_duration_since(previous).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        for pool in &mut self.pools {
            pool.update(&mut self.scene, delta_seconds);
        }

        let surface = self.surface.as_mut().expect("surface present while running");
        surface.present(&self.scene, &self.camera)?;
        self.frames_rendered += 1;
        Ok(())
    }

    /// Reacts to an environment resize: recomputes the projection and
    /// resizes the surface. Visual state is left untouched.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        if self.state != HostState::Running {
            return;
        }
        self.camera.set_viewport(width, height);
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
        tracing::debug!(width, height, "surface resized");
    }

    /// Drives the frame loop until shutdown or disposal.
    ///
    /// Decoded events arriving on `intake` are forwarded to the pools at
    /// tick granularity, before that frame's update. The pump serializes
    /// frames; the disposal flag is re-checked ahead of every event so a
    /// request made from outside the loop tears down at the next tick.
    pub fn run(&mut self, pump: &mut dyn EventPump, intake: &Receiver<MidiEvent>) -> Result<()> {
        loop {
            if self.disposal.load(Ordering::SeqCst) || self.state == HostState::Disposed {
                self.finish_dispose();
                return Ok(());
            }

            match pump.next_event() {
                FrameEvent::Tick(now) => {
                    for event in intake.try_iter() {
                        self.on_midi_event(&event);
                    }
                    self.render_frame(now)?;
                }
                FrameEvent::Resized(width, height) => self.handle_resize(width, height),
                FrameEvent::Shutdown => {
                    self.dispose();
                    return Ok(());
                }
            }
        }
    }

    /// Tears the host down in place: disposes every pool, releases the
    /// surface and detaches from the provider. Idempotent, and a no-op on
    /// an already-disposed host.
    pub fn dispose(&mut self) {
        self.disposal.store(true, Ordering::SeqCst);
        self.finish_dispose();
    }

    fn finish_dispose(&mut self) {
        if self.state == HostState::Disposed {
            return;
        }
        for pool in &mut self.pools {
            pool.dispose(&mut self.scene);
        }
        self.surface = None;
        self.provider = None;
        self.last_frame = None;
        self.state = HostState::Disposed;
        tracing::debug!("render host disposed");
    }
}

impl Drop for GraphicsHost {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::visual::GeometryPool;

    struct FakeSurface {
        size: (u32, u32),
        released: Arc<AtomicBool>,
        presented_scene_sizes: Arc<Mutex<Vec<usize>>>,
    }

    impl RenderSurface for FakeSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn present(&mut self, scene: &Scene, _camera: &Camera) -> Result<()> {
            self.presented_scene_sizes.lock().unwrap().push(scene.len());
            Ok(())
        }
    }

    impl Drop for FakeSurface {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        released: Arc<AtomicBool>,
        presented_scene_sizes: Arc<Mutex<Vec<usize>>>,
        acquisitions: Arc<AtomicUsize>,
        fail: bool,
        dispose_during_acquire: Arc<Mutex<Option<DisposeHandle>>>,
    }

    impl SurfaceProvider for FakeProvider {
        fn acquire(&mut self) -> Result<Box<dyn RenderSurface>> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::MidiMotionError::Acquisition(
                    "no adapter".to_string(),
                ));
            }
            // Models a disposal that lands while acquisition is in flight.
            if let Some(handle) = self.dispose_during_acquire.lock().unwrap().take() {
                handle.dispose();
            }
            Ok(Box::new(FakeSurface {
                size: (640, 480),
                released: Arc::clone(&self.released),
                presented_scene_sizes: Arc::clone(&self.presented_scene_sizes),
            }))
        }
    }

    struct ScriptedPump {
        events: VecDeque<FrameEvent>,
    }

    impl ScriptedPump {
        fn new(events: Vec<FrameEvent>) -> Self {
            Self {
                events: events.into(),
            }
        }
    }

    impl EventPump for ScriptedPump {
        fn next_event(&mut self) -> FrameEvent {
            self.events.pop_front().unwrap_or(FrameEvent::Shutdown)
        }
    }

    fn note_on() -> MidiEvent {
        MidiEvent::NoteOn {
            note: 64,
            velocity: 100,
            channel: 0,
        }
    }

    fn host_with(provider: FakeProvider) -> (GraphicsHost, DisposeHandle) {
        GraphicsHost::new(
            Box::new(provider),
            vec![Box::new(GeometryPool::with_seed(20, 7))],
            &RenderConfig::default(),
        )
    }

    #[test]
    fn initializes_into_running_with_surface_aspect() {
        let (mut host, _handle) = host_with(FakeProvider::default());

        host.initialize().unwrap();

        assert_eq!(host.state(), HostState::Running);
        assert!((host.camera().aspect - 640.0 / 480.0).abs() < 1e-6);
    }

    #[test]
    fn events_update_pools_before_the_frame_presents() {
        let provider = FakeProvider::default();
        let presented = Arc::clone(&provider.presented_scene_sizes);
        let (mut host, _handle) = host_with(provider);
        host.initialize().unwrap();

        let (sender, receiver) = unbounded();
        sender.send(note_on()).unwrap();
        let mut pump = ScriptedPump::new(vec![
            FrameEvent::Tick(Instant::now()),
            FrameEvent::Shutdown,
        ]);

        host.run(&mut pump, &receiver).unwrap();

        // The cube inserted at tick time is part of the presented scene.
        assert_eq!(*presented.lock().unwrap(), vec![1]);
        assert_eq!(host.frames_rendered(), 1);
        assert_eq!(host.state(), HostState::Disposed);
        assert!(host.scene().is_empty());
    }

    #[test]
    fn renders_consecutive_frames() {
        let (mut host, _handle) = host_with(FakeProvider::default());
        host.initialize().unwrap();

        let first = Instant::now();
        host.render_frame(first).unwrap();
        host.render_frame(first + Duration::from_millis(16)).unwrap();

        assert_eq!(host.frames_rendered(), 2);
    }

    #[test]
    fn dispose_before_initialize_never_acquires() {
        let provider = FakeProvider::default();
        let acquisitions = Arc::clone(&provider.acquisitions);
        let (mut host, handle) = host_with(provider);

        handle.dispose();
        host.initialize().unwrap();

        assert_eq!(host.state(), HostState::Disposed);
        assert_eq!(acquisitions.load(Ordering::SeqCst), 0);
        assert_eq!(host.frames_rendered(), 0);
    }

    #[test]
    fn dispose_during_acquisition_releases_surface_and_schedules_nothing() {
        let provider = FakeProvider::default();
        let released = Arc::clone(&provider.released);
        let presented = Arc::clone(&provider.presented_scene_sizes);
        let trip = Arc::clone(&provider.dispose_during_acquire);

        let (mut host, handle) = host_with(provider);
        // The provider trips this host's own handle mid-acquire.
        *trip.lock().unwrap() = Some(handle);

        host.initialize().unwrap();

        assert_eq!(host.state(), HostState::Disposed);
        assert!(released.load(Ordering::SeqCst));

        // The loop exits immediately; no frame ever executes.
        let (_sender, receiver) = unbounded::<MidiEvent>();
        let mut pump = ScriptedPump::new(vec![FrameEvent::Tick(Instant::now())]);
        host.run(&mut pump, &receiver).unwrap();
        assert_eq!(host.frames_rendered(), 0);
        assert!(presented.lock().unwrap().is_empty());
    }

    #[test]
    fn acquisition_failure_surfaces_once_and_disposes() {
        let provider = FakeProvider {
            fail: true,
            ..FakeProvider::default()
        };
        let acquisitions = Arc::clone(&provider.acquisitions);
        let (mut host, _handle) = host_with(provider);

        assert!(host.initialize().is_err());
        assert_eq!(host.state(), HostState::Disposed);

        // No internal retry: a second initialize is a plain no-op.
        host.initialize().unwrap();
        assert_eq!(acquisitions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resize_updates_projection_without_resetting_visuals() {
        let (mut host, _handle) = host_with(FakeProvider::default());
        host.initialize().unwrap();
        host.on_midi_event(&note_on());
        assert_eq!(host.scene().len(), 1);

        host.handle_resize(200, 100);

        assert!((host.camera().aspect - 2.0).abs() < 1e-6);
        assert_eq!(host.scene().len(), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let provider = FakeProvider::default();
        let released = Arc::clone(&provider.released);
        let (mut host, handle) = host_with(provider);
        host.initialize().unwrap();
        host.on_midi_event(&note_on());

        host.dispose();
        host.dispose();
        handle.dispose();

        assert_eq!(host.state(), HostState::Disposed);
        assert!(released.load(Ordering::SeqCst));
        assert!(host.scene().is_empty());

        // Use after dispose is a no-op everywhere.
        host.on_midi_event(&note_on());
        host.render_frame(Instant::now()).unwrap();
        host.handle_resize(10, 10);
        assert_eq!(host.frames_rendered(), 0);
        assert!(host.scene().is_empty());
    }
}
