//! Event-driven pools of transient visual objects.
//!
//! Two lifecycle policies coexist: [`GeometryPool`] keeps a fixed number of
//! persistent rotating cubes and evicts the oldest on overflow, while
//! [`RipplePool`] ages every ring out after its own lifetime. Both insert on
//! note-on only and own nothing but the scene handles of their objects.

use std::collections::VecDeque;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    midi::MidiEvent,
    scene::{Color, Material, Mesh, MeshId, Scene, Shape},
};

/// Default object bound of the capacity-bounded cube pool.
pub const DEFAULT_CUBE_CAPACITY: usize = 20;
/// Default object bound of the age-bounded ripple pool.
pub const DEFAULT_RIPPLE_CAPACITY: usize = 10;

/// A collection of visual objects driven by decoded MIDI events.
///
/// The render host calls `update` once per frame, in a fixed order across
/// pools, before submitting the render. `dispose` must leave the pool empty
/// and inert and is idempotent.
pub trait VisualPool {
    fn on_event(&mut self, scene: &mut Scene, event: &MidiEvent);
    fn update(&mut self, scene: &mut Scene, delta_seconds: f32);
    fn dispose(&mut self, scene: &mut Scene);
}

fn note_hue(note: u8) -> f32 {
    note as f32 / 127.0 * 360.0
}

fn velocity_intensity(velocity: u8) -> f32 {
    velocity as f32 / 127.0
}

/// Capacity-bounded pool of slowly rotating cubes.
///
/// Opacity decays multiplicatively each update, so cubes fade asymptotically
/// and never reach zero; eviction is what ultimately removes them.
pub struct GeometryPool {
    cubes: VecDeque<MeshId>,
    capacity: usize,
    elapsed: f32,
    rng: StdRng,
}

const CUBE_SIZE: f32 = 0.5;
const CUBE_FADE: f32 = 0.98;

impl GeometryPool {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            cubes: VecDeque::new(),
            capacity: capacity.max(1),
            elapsed: 0.0,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    /// Scene handles of the live cubes, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = MeshId> + '_ {
        self.cubes.iter().copied()
    }

    fn spawn(&mut self, scene: &mut Scene, note: u8, velocity: u8) {
        let intensity = velocity_intensity(velocity);
        let mut mesh = Mesh::new(
            Shape::Cube { size: CUBE_SIZE },
            Material {
                color: Color::from_hsl(note_hue(note), 1.0, 0.5),
                opacity: intensity,
            },
            [
                (note as f32 - 64.0) / 10.0,
                self.rng.gen_range(-2.0..2.0),
                self.rng.gen_range(-2.0..2.0),
            ],
        );
        mesh.scale = intensity;

        self.cubes.push_back(scene.add(mesh));

        if self.cubes.len() > self.capacity {
            if let Some(oldest) = self.cubes.pop_front() {
                scene.remove(oldest);
            }
        }
    }
}

impl VisualPool for GeometryPool {
    fn on_event(&mut self, scene: &mut Scene, event: &MidiEvent) {
        if let MidiEvent::NoteOn { note, velocity, .. } = *event {
            self.spawn(scene, note, velocity);
        }
    }

    fn update(&mut self, scene: &mut Scene, delta_seconds: f32) {
        self.elapsed += delta_seconds;
        for (index, id) in self.cubes.iter().enumerate() {
            let Some(mesh) = scene.mesh_mut(*id) else {
                continue;
            };
            let spin = delta_seconds * (index as f32 + 1.0) * 0.01;
            mesh.rotation[0] += spin;
            mesh.rotation[1] += spin;
            mesh.position[1] += (self.elapsed + index as f32).sin() * 0.01;
            mesh.material.opacity *= CUBE_FADE;
        }
    }

    fn dispose(&mut self, scene: &mut Scene) {
        for id in self.cubes.drain(..) {
            scene.remove(id);
        }
    }
}

struct Ripple {
    id: MeshId,
    age: f32,
    max_age: f32,
}

/// Age-bounded pool of expanding rings.
///
/// Each ring carries its own lifetime scaled by note velocity; opacity fades
/// linearly and reaches zero exactly at expiry. A secondary capacity bound
/// evicts the oldest ring on overflow independent of age.
pub struct RipplePool {
    ripples: VecDeque<Ripple>,
    capacity: usize,
    rng: StdRng,
}

const RING_INNER_RADIUS: f32 = 0.01;
const RING_OUTER_RADIUS: f32 = 0.011;
const RING_SEGMENTS: u32 = 32;
const RIPPLE_BASE_AGE: f32 = 1.5;
const RIPPLE_VELOCITY_AGE: f32 = 1.0;
const RIPPLE_PEAK_OPACITY: f32 = 0.4;
const RIPPLE_GROWTH: f32 = 500.0;

impl RipplePool {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            ripples: VecDeque::new(),
            capacity: capacity.max(1),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    fn spawn(&mut self, scene: &mut Scene, note: u8, velocity: u8) {
        let intensity = velocity_intensity(velocity);
        let mesh = Mesh::new(
            Shape::Ring {
                inner_radius: RING_INNER_RADIUS,
                outer_radius: RING_OUTER_RADIUS,
                segments: RING_SEGMENTS,
            },
            Material {
                color: Color::from_hsl(note_hue(note), 1.0, 0.6),
                opacity: intensity,
            },
            [
                (note as f32 - 64.0) / 8.0,
                self.rng.gen_range(-1.0..1.0),
                0.0,
            ],
        );

        self.ripples.push_back(Ripple {
            id: scene.add(mesh),
            age: 0.0,
            max_age: RIPPLE_BASE_AGE + intensity * RIPPLE_VELOCITY_AGE,
        });

        if self.ripples.len() > self.capacity {
            if let Some(oldest) = self.ripples.pop_front() {
                scene.remove(oldest.id);
            }
        }
    }
}

impl VisualPool for RipplePool {
    fn on_event(&mut self, scene: &mut Scene, event: &MidiEvent) {
        if let MidiEvent::NoteOn { note, velocity, .. } = *event {
            self.spawn(scene, note, velocity);
        }
    }

    fn update(&mut self, scene: &mut Scene, delta_seconds: f32) {
        let mut index = 0;
        while index < self.ripples.len() {
            let ripple = &mut self.ripples[index];
            ripple.age += delta_seconds;
            let progress = (ripple.age / ripple.max_age).min(1.0);

            if let Some(mesh) = scene.mesh_mut(ripple.id) {
                mesh.scale = 1.0 + progress * RIPPLE_GROWTH;
                mesh.material.opacity = (1.0 - progress) * RIPPLE_PEAK_OPACITY;
            }

            if ripple.age >= ripple.max_age {
                let expired = self.ripples.remove(index).expect("index is in bounds");
                scene.remove(expired.id);
            } else {
                index += 1;
            }
        }
    }

    fn dispose(&mut self, scene: &mut Scene) {
        for ripple in self.ripples.drain(..) {
            scene.remove(ripple.id);
        }
    }
}
