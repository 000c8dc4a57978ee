//! Terminal rendering backend.
//!
//! The "surface" is the terminal itself: acquiring it enters the alternate
//! screen in raw mode, dropping it restores the terminal. Meshes are
//! perspective-projected through the core camera and drawn as colored
//! glyphs. The same terminal doubles as the event pump, yielding fixed-rate
//! ticks plus resize and quit events.

use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color as TermColor, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use midi_motion_core::{
    Camera, EventPump, FrameEvent, MidiMotionError, RenderSurface, Result, Scene, Shape,
    SurfaceProvider,
};

// Terminal cells are roughly twice as tall as wide.
const CELL_ASPECT: f32 = 0.5;

pub struct TerminalSurfaceProvider;

impl SurfaceProvider for TerminalSurfaceProvider {
    fn acquire(&mut self) -> Result<Box<dyn RenderSurface>> {
        enable_raw_mode().map_err(|err| MidiMotionError::Acquisition(err.to_string()))?;

        let mut out = io::stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(MidiMotionError::Acquisition(err.to_string()));
        }
        let (cols, rows) =
            terminal::size().map_err(|err| MidiMotionError::Acquisition(err.to_string()))?;

        Ok(Box::new(TerminalSurface {
            out,
            cols: cols as u32,
            rows: rows as u32,
        }))
    }
}

pub struct TerminalSurface {
    out: Stdout,
    cols: u32,
    rows: u32,
}

impl TerminalSurface {
    fn plot(&mut self, col: f32, row: f32, color: TermColor, glyph: char) -> io::Result<()> {
        if col < 0.0 || row < 0.0 || col >= self.cols as f32 || row >= self.rows as f32 {
            return Ok(());
        }
        queue!(
            self.out,
            MoveTo(col as u16, row as u16),
            SetForegroundColor(color),
            Print(glyph)
        )
    }
}

impl RenderSurface for TerminalSurface {
    fn size(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.cols = width;
        self.rows = height;
    }

    fn present(&mut self, scene: &Scene, camera: &Camera) -> Result<()> {
        queue!(self.out, Clear(ClearType::All))?;

        let viewport = (self.cols as f32, self.rows as f32);
        let lighting = scene.lighting;
        let brightness = (lighting.ambient.intensity + lighting.directional.intensity).min(1.0);

        for (_, mesh) in scene.meshes() {
            let Some((col, row)) = camera.project(mesh.position, viewport) else {
                continue;
            };
            let opacity = mesh.material.opacity.clamp(0.0, 1.0);
            if opacity <= f32::EPSILON {
                continue;
            }
            let shade = opacity * brightness;
            let color = TermColor::Rgb {
                r: (mesh.material.color.r.clamp(0.0, 1.0) * shade * 255.0) as u8,
                g: (mesh.material.color.g.clamp(0.0, 1.0) * shade * 255.0) as u8,
                b: (mesh.material.color.b.clamp(0.0, 1.0) * shade * 255.0) as u8,
            };

            match mesh.shape {
                Shape::Cube { size } => {
                    // Project a point one half-extent to the side to get the
                    // on-screen radius.
                    let half = size * 0.5 * mesh.scale;
                    let offset = [mesh.position[0] + half, mesh.position[1], mesh.position[2]];
                    let half_cols = camera
                        .project(offset, viewport)
                        .map(|(edge, _)| (edge - col).abs())
                        .unwrap_or(0.0);
                    let span_x = (half_cols as i32).clamp(0, 3);
                    let span_y = ((half_cols * CELL_ASPECT) as i32).clamp(0, 3);
                    for dy in -span_y..=span_y {
                        for dx in -span_x..=span_x {
                            self.plot(col + dx as f32, row + dy as f32, color, '█')?;
                        }
                    }
                }
                Shape::Ring {
                    outer_radius,
                    segments,
                    ..
                } => {
                    let radius = outer_radius * mesh.scale;
                    let offset = [mesh.position[0] + radius, mesh.position[1], mesh.position[2]];
                    let radius_cols = camera
                        .project(offset, viewport)
                        .map(|(edge, _)| (edge - col).abs())
                        .unwrap_or(0.0);
                    for segment in 0..segments {
                        let angle = segment as f32 / segments as f32 * std::f32::consts::TAU;
                        self.plot(
                            col + angle.cos() * radius_cols,
                            row + angle.sin() * radius_cols * CELL_ASPECT,
                            color,
                            'o',
                        )?;
                    }
                }
            }
        }

        queue!(self.out, ResetColor)?;
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Fixed-rate frame pump over the terminal's input events.
pub struct TerminalPump {
    interval: Duration,
    next_tick: Instant,
}

impl TerminalPump {
    pub fn new(target_fps: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / target_fps.max(1) as f64);
        Self {
            interval,
            next_tick: Instant::now() + interval,
        }
    }
}

impl EventPump for TerminalPump {
    fn next_event(&mut self) -> FrameEvent {
        loop {
            let now = Instant::now();
            if now >= self.next_tick {
                self.next_tick = now + self.interval;
                return FrameEvent::Tick(now);
            }

            match event::poll(self.next_tick - now) {
                Ok(true) => match event::read() {
                    Ok(Event::Resize(cols, rows)) => {
                        return FrameEvent::Resized(cols as u32, rows as u32)
                    }
                    Ok(Event::Key(key)) if is_quit(&key) => return FrameEvent::Shutdown,
                    Ok(_) => {}
                    Err(_) => return FrameEvent::Shutdown,
                },
                Ok(false) => {}
                Err(_) => return FrameEvent::Shutdown,
            }
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}
