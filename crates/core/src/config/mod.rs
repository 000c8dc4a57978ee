use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    visual::{DEFAULT_CUBE_CAPACITY, DEFAULT_RIPPLE_CAPACITY},
    Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderConfig,
    pub visual: VisualConfig,
}

impl AppConfig {
    /// Loads a configuration file, filling omitted fields with defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Configuration for the camera and the frame loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub camera_z: f32,
    pub target_fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            camera_z: 5.0,
            target_fps: 60,
        }
    }
}

/// Configuration for the visual object pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub cube_capacity: usize,
    pub ripple_capacity: usize,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            cube_capacity: DEFAULT_CUBE_CAPACITY,
            ripple_capacity: DEFAULT_RIPPLE_CAPACITY,
        }
    }
}
