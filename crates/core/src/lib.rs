//! Core library for the MIDI motion graphics engine.
//!
//! Each module owns a distinct subsystem: `midi` decodes raw hardware
//! frames into typed events, `input` routes them from a selected source to
//! registered listeners, `visual` keeps the bounded pools of transient
//! objects those events spawn, and `render` owns the drawable surface and
//! the frame loop that ties everything together. The hardware and surface
//! sides of the world are injected through the `input` and `platform`
//! traits, so the whole pipeline runs against test doubles as well as real
//! devices.

pub mod config;
pub mod error;
pub mod input;
pub mod midi;
pub mod platform;
pub mod render;
pub mod scene;
pub mod visual;

pub use config::{AppConfig, RenderConfig, VisualConfig};
pub use error::{MidiMotionError, Result};
pub use input::{
    EventListener, InputRouter, ListenerId, MidiAccess, MidiCapability, MidiPlatform,
    RawFrameCallback, SourceInfo,
};
pub use midi::{decode, MidiEvent};
pub use platform::{EventPump, FrameEvent, RenderSurface, SurfaceProvider};
pub use render::{DisposeHandle, GraphicsHost, HostState};
pub use scene::{Camera, Color, Lighting, Material, Mesh, MeshId, Scene, Shape};
pub use visual::{GeometryPool, RipplePool, VisualPool};
