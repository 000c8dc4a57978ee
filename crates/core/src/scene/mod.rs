use std::collections::HashMap;

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Builds a color from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Builds a color from hue (degrees), saturation and lightness, both in
    /// `[0, 1]`.
    pub fn from_hsl(hue_degrees: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue_degrees.rem_euclid(360.0);
        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let segment = hue / 60.0;
        let x = chroma * (1.0 - (segment % 2.0 - 1.0).abs());
        let (r, g, b) = match segment as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = lightness - chroma * 0.5;
        Self {
            r: r + m,
            g: g + m,
            b: b + m,
        }
    }
}

/// Geometric primitive a mesh is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cube {
        size: f32,
    },
    Ring {
        inner_radius: f32,
        outer_radius: f32,
        segments: u32,
    },
}

/// Surface appearance of a mesh. Opacity is always kept in `[0, 1]` by the
/// pools that drive it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
}

/// A drawable object: shape, material and transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub shape: Shape,
    pub material: Material,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
}

impl Mesh {
    pub fn new(shape: Shape, material: Material, position: [f32; 3]) -> Self {
        Self {
            shape,
            material,
            position,
            rotation: [0.0; 3],
            scale: 1.0,
        }
    }
}

/// Handle to a mesh registered in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

/// Ambient light applied uniformly to every mesh.
#[derive(Debug, Clone, Copy)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Single directional light.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: [f32; 3],
}

/// Light rig owned by the scene.
#[derive(Debug, Clone, Copy)]
pub struct Lighting {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: Color::from_hex(0x404040),
                intensity: 0.6,
            },
            directional: DirectionalLight {
                color: Color::WHITE,
                intensity: 0.8,
                position: [10.0, 10.0, 5.0],
            },
        }
    }
}

/// Registry of every drawable in the world, keyed by [`MeshId`].
///
/// The scene is exclusively owned by the render host; pools receive it by
/// mutable reference and only touch the meshes they inserted. Removing a
/// mesh releases its drawable resources, and removal is idempotent so a
/// double dispose can never double-free.
#[derive(Debug, Default)]
pub struct Scene {
    meshes: Vec<(MeshId, Mesh)>,
    index: HashMap<MeshId, usize>,
    next_id: u64,
    pub lighting: Lighting,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mesh and returns its handle. Draw order is insertion order.
    pub fn add(&mut self, mesh: Mesh) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.index.insert(id, self.meshes.len());
        self.meshes.push((id, mesh));
        id
    }

    /// Removes a mesh, releasing its resources. Returns `false` if the id
    /// was already removed.
    pub fn remove(&mut self, id: MeshId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        self.meshes.remove(slot);
        for entry in self.index.values_mut() {
            if *entry > slot {
                *entry -= 1;
            }
        }
        true
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        let slot = *self.index.get(&id)?;
        Some(&mut self.meshes[slot].1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        let slot = *self.index.get(&id)?;
        Some(&self.meshes[slot].1)
    }

    /// Meshes in draw order.
    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.meshes.iter().map(|(id, mesh)| (*id, mesh))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// Perspective camera looking down the negative z axis.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Camera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: [0.0, 0.0, 0.0],
        }
    }

    /// Recomputes the projection aspect from new surface dimensions.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Projects a world point onto a viewport of the given pixel size.
    ///
    /// Returns `None` for points outside the near/far range. Surface
    /// backends use this to place each mesh on screen.
    pub fn project(&self, point: [f32; 3], viewport: (f32, f32)) -> Option<(f32, f32)> {
        let (width, height) = viewport;
        let x = point[0] - self.position[0];
        let y = point[1] - self.position[1];
        let depth = self.position[2] - point[2];
        if depth < self.near || depth > self.far {
            return None;
        }
        let focal = (height * 0.5) / (self.fov_degrees.to_radians() * 0.5).tan();
        Some((
            width * 0.5 + x * focal / depth,
            height * 0.5 - y * focal / depth,
        ))
    }
}
