//! Bridging hardware MIDI sources to decoded-event listeners.
//!
//! The hardware side of the world is injected through [`MidiPlatform`] and
//! [`MidiAccess`] so the router has no ambient state and tests can
//! substitute the environment wholesale. The router owns at most one active
//! source subscription at a time and forwards decoded events to an explicit
//! observer list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    midi::{decode, MidiEvent},
    Result,
};

/// One enumerable hardware MIDI source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
}

/// Callback invoked with each raw byte frame a source produces.
pub type RawFrameCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Listener invoked with each decoded event.
pub type EventListener = Box<dyn FnMut(&MidiEvent) + Send>;

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Low-level access to the environment's MIDI sources.
///
/// `attach` subscribes a raw-frame callback to one source; `detach` drops
/// the subscription. Implementations may keep delivering frames from an
/// in-flight callback after `detach` returns; the router guards against
/// that with a generation counter, so implementations only need best-effort
/// detachment.
pub trait MidiAccess: Send {
    fn sources(&mut self) -> Vec<SourceInfo>;
    fn attach(&mut self, source_id: &str, callback: RawFrameCallback) -> Result<()>;
    fn detach(&mut self, source_id: &str);
}

/// Outcome of requesting MIDI capability from the environment.
///
/// `Unavailable` is a normal degraded state, not an error: rendering
/// proceeds without MIDI-driven events.
pub enum MidiCapability {
    Available(Box<dyn MidiAccess>),
    Unavailable,
}

/// Environment entry point for acquiring MIDI capability.
pub trait MidiPlatform {
    fn request_access(&mut self) -> Result<MidiCapability>;
}

/// Owns the active hardware subscription and the decoded-event listeners.
pub struct InputRouter {
    access: Option<Box<dyn MidiAccess>>,
    sources: Vec<SourceInfo>,
    selected: Option<String>,
    listeners: Arc<Mutex<Vec<(u64, EventListener)>>>,
    next_listener: u64,
    generation: Arc<AtomicU64>,
    disposed: bool,
}

impl InputRouter {
    /// Requests MIDI capability from the environment and builds a router.
    ///
    /// An unavailable environment yields a functioning router with no
    /// sources; acquisition failures propagate to the caller once.
    pub fn connect(platform: &mut dyn MidiPlatform) -> Result<Self> {
        let access = match platform.request_access()? {
            MidiCapability::Available(access) => Some(access),
            MidiCapability::Unavailable => {
                tracing::warn!("MIDI access is not available; continuing without input");
                None
            }
        };

        let mut router = Self {
            access,
            sources: Vec::new(),
            selected: None,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: 0,
            generation: Arc::new(AtomicU64::new(0)),
            disposed: false,
        };
        router.refresh_sources();
        Ok(router)
    }

    /// Whether the environment granted MIDI capability.
    pub fn is_available(&self) -> bool {
        self.access.is_some()
    }

    /// Currently known sources, in provider-reported order.
    pub fn list_sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    /// Id of the currently selected source, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Registers a listener for decoded events. Listeners may be added
    /// before any source is selected; they simply see no events until one
    /// is.
    pub fn add_listener(&mut self, listener: EventListener) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, listener));
        }
        ListenerId(id)
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(&mut self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(listener_id, _)| *listener_id != id.0);
        }
    }

    /// Selects `source` as the active input, or disables forwarding when
    /// `None`.
    ///
    /// The previously selected source is always detached first, and its
    /// callback is invalidated before this call returns, so no event from
    /// the old source can be delivered afterwards even if the hardware
    /// layer still fires it.
    pub fn select(&mut self, source: Option<&str>) -> Result<()> {
        if self.disposed {
            return Ok(());
        }

        // Invalidate whatever callback is out there before touching the
        // hardware layer.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.selected.take() {
            if let Some(access) = self.access.as_mut() {
                access.detach(&previous);
            }
            tracing::debug!(source = %previous, "detached MIDI source");
        }

        let Some(source_id) = source else {
            return Ok(());
        };
        let Some(access) = self.access.as_mut() else {
            return Ok(());
        };

        let attached_generation = self.generation.load(Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let listeners = Arc::clone(&self.listeners);
        access.attach(
            source_id,
            Box::new(move |frame| {
                if generation.load(Ordering::SeqCst) != attached_generation {
                    return;
                }
                let Some(event) = decode(frame) else {
                    return;
                };
                if let Ok(mut listeners) = listeners.lock() {
                    for (_, listener) in listeners.iter_mut() {
                        listener(&event);
                    }
                }
            }),
        )?;

        self.selected = Some(source_id.to_string());
        tracing::debug!(source = %source_id, "attached MIDI source");
        Ok(())
    }

    /// Reacts to a hot-plug notification from the environment.
    ///
    /// Refreshes the source list and, when nothing is selected, falls back
    /// to the first available source. An explicit earlier selection is
    /// never overridden.
    pub fn on_hot_plug(&mut self) {
        if self.disposed {
            return;
        }
        self.refresh_sources();

        if self.selected.is_none() {
            if let Some(first) = self.sources.first().map(|source| source.id.clone()) {
                if let Err(err) = self.select(Some(&first)) {
                    tracing::warn!(source = %first, %err, "auto-select failed");
                }
            }
        }
    }

    /// Detaches the active subscription and drops every listener.
    ///
    /// Idempotent; after this call no event is ever delivered again, even
    /// if the environment keeps firing hardware callbacks.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.selected.take() {
            if let Some(access) = self.access.as_mut() {
                access.detach(&previous);
            }
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
        tracing::debug!("input router disposed");
    }

    fn refresh_sources(&mut self) {
        if let Some(access) = self.access.as_mut() {
            self.sources = access.sources();
        }
    }
}

impl Drop for InputRouter {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted stand-in for the hardware layer. Detached callbacks are
    /// retained so tests can replay "in-flight" hardware frames and prove
    /// the router drops them.
    #[derive(Default)]
    struct FakeState {
        sources: Vec<SourceInfo>,
        attachments: Vec<(String, bool, RawFrameCallback)>,
        log: Vec<String>,
    }

    impl FakeState {
        fn fire(&mut self, slot: usize, frame: &[u8]) {
            let callback = &mut self.attachments[slot].2;
            callback(frame);
        }
    }

    struct FakeAccess {
        state: Arc<Mutex<FakeState>>,
    }

    impl MidiAccess for FakeAccess {
        fn sources(&mut self) -> Vec<SourceInfo> {
            self.state.lock().unwrap().sources.clone()
        }

        fn attach(&mut self, source_id: &str, callback: RawFrameCallback) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.log.push(format!("attach:{source_id}"));
            state
                .attachments
                .push((source_id.to_string(), true, callback));
            Ok(())
        }

        fn detach(&mut self, source_id: &str) {
            let mut state = self.state.lock().unwrap();
            state.log.push(format!("detach:{source_id}"));
            for (id, active, _) in state.attachments.iter_mut() {
                if id == source_id {
                    *active = false;
                }
            }
        }
    }

    struct FakePlatform {
        state: Arc<Mutex<FakeState>>,
        available: bool,
    }

    impl MidiPlatform for FakePlatform {
        fn request_access(&mut self) -> Result<MidiCapability> {
            if self.available {
                Ok(MidiCapability::Available(Box::new(FakeAccess {
                    state: Arc::clone(&self.state),
                })))
            } else {
                Ok(MidiCapability::Unavailable)
            }
        }
    }

    fn source(id: &str) -> SourceInfo {
        SourceInfo {
            id: id.to_string(),
            name: format!("Device {id}"),
        }
    }

    fn platform_with(sources: Vec<SourceInfo>) -> (FakePlatform, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState {
            sources,
            ..FakeState::default()
        }));
        (
            FakePlatform {
                state: Arc::clone(&state),
                available: true,
            },
            state,
        )
    }

    fn recording_listener(router: &mut InputRouter) -> Arc<Mutex<Vec<MidiEvent>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        router.add_listener(Box::new(move |event| {
            sink.lock().unwrap().push(*event);
        }));
        received
    }

    #[test]
    fn forwards_decoded_events_to_listeners() {
        let (mut platform, state) = platform_with(vec![source("a")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();
        let received = recording_listener(&mut router);

        router.select(Some("a")).unwrap();
        state.lock().unwrap().fire(0, &[0x90, 0x40, 0x64]);
        // Unsupported and truncated frames are dropped silently.
        state.lock().unwrap().fire(0, &[0xc0, 0x01, 0x02]);
        state.lock().unwrap().fire(0, &[0x90]);

        let events = received.lock().unwrap();
        assert_eq!(
            *events,
            vec![MidiEvent::NoteOn {
                note: 0x40,
                velocity: 0x64,
                channel: 0,
            }]
        );
    }

    #[test]
    fn listeners_added_before_selection_receive_events() {
        let (mut platform, state) = platform_with(vec![source("a")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();
        let received = recording_listener(&mut router);

        router.select(Some("a")).unwrap();
        state.lock().unwrap().fire(0, &[0x91, 0x30, 0x40]);

        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn reselection_detaches_before_attaching() {
        let (mut platform, state) = platform_with(vec![source("a"), source("b")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();
        let received = recording_listener(&mut router);

        router.select(Some("a")).unwrap();
        router.select(Some("b")).unwrap();

        assert_eq!(
            state.lock().unwrap().log,
            vec!["attach:a", "detach:a", "attach:b"]
        );

        // A straggling frame from the old source must not be delivered,
        // even though the fake kept its callback alive.
        state.lock().unwrap().fire(0, &[0x90, 0x40, 0x64]);
        assert!(received.lock().unwrap().is_empty());

        state.lock().unwrap().fire(1, &[0x90, 0x41, 0x64]);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn selecting_none_disables_forwarding() {
        let (mut platform, state) = platform_with(vec![source("a")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();
        let received = recording_listener(&mut router);

        router.select(Some("a")).unwrap();
        router.select(None).unwrap();
        state.lock().unwrap().fire(0, &[0x90, 0x40, 0x64]);

        assert_eq!(router.selected(), None);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn hot_plug_auto_selects_first_source_only_when_unselected() {
        let (mut platform, state) = platform_with(Vec::new());
        let mut router = InputRouter::connect(&mut platform).unwrap();
        assert_eq!(router.selected(), None);

        state.lock().unwrap().sources = vec![source("a"), source("b")];
        router.on_hot_plug();
        assert_eq!(router.selected(), Some("a"));
        assert_eq!(router.list_sources().len(), 2);

        // An explicit choice survives later hot-plug notifications.
        router.select(Some("b")).unwrap();
        state.lock().unwrap().sources = vec![source("c"), source("b")];
        router.on_hot_plug();
        assert_eq!(router.selected(), Some("b"));
    }

    #[test]
    fn dispose_is_idempotent_and_stops_delivery() {
        let (mut platform, state) = platform_with(vec![source("a")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();
        let received = recording_listener(&mut router);
        router.select(Some("a")).unwrap();

        router.dispose();
        router.dispose();

        // The environment fires a late hardware callback after disposal.
        state.lock().unwrap().fire(0, &[0x90, 0x40, 0x64]);
        assert!(received.lock().unwrap().is_empty());

        // Every public operation is a no-op afterwards.
        router.select(Some("a")).unwrap();
        router.on_hot_plug();
        assert_eq!(router.selected(), None);
    }

    #[test]
    fn unavailable_environment_degrades_gracefully() {
        let mut platform = FakePlatform {
            state: Arc::new(Mutex::new(FakeState::default())),
            available: false,
        };
        let mut router = InputRouter::connect(&mut platform).unwrap();

        assert!(!router.is_available());
        assert!(router.list_sources().is_empty());
        router.select(Some("ghost")).unwrap();
        assert_eq!(router.selected(), None);
        let _ = recording_listener(&mut router);
        router.on_hot_plug();
        router.dispose();
    }

    #[test]
    fn removed_listeners_stop_receiving() {
        let (mut platform, state) = platform_with(vec![source("a")]);
        let mut router = InputRouter::connect(&mut platform).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let id = router.add_listener(Box::new(move |event| {
            sink.lock().unwrap().push(*event);
        }));
        router.select(Some("a")).unwrap();

        router.remove_listener(id);
        state.lock().unwrap().fire(0, &[0x90, 0x40, 0x64]);

        assert!(received.lock().unwrap().is_empty());
    }
}
