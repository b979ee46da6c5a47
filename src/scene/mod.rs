//! Minimal host-side scene: meshes seen through a camera, drawn through a [`DrawCallback`].
//!
//! Only here so the CLI, demos and tests have something to peel.

mod camera;
mod mesh;

use glam::{Vec3, Vec4};

use crate::device::pipeline::{DrawCallback, DrawContext};
use crate::device::raster::Vertex;
use crate::foundation::core::{Rgba, Viewport};
use crate::foundation::error::{PeelError, PeelResult};

pub use camera::Camera;
pub use mesh::Mesh;

/// Clip-space `w` below which a vertex counts as behind the eye; its triangle is dropped.
const MIN_CLIP_W: f32 = 1e-6;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub camera: Camera,
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn new(camera: Camera, meshes: Vec<Mesh>) -> Self {
        Self { camera, meshes }
    }

    /// Three intersecting cubes offset by half their width along the diagonal: an opaque blue
    /// one at the origin, then half-transparent red and green ones.
    pub fn three_cubes() -> Self {
        let meshes = three_cube_layout()
            .into_iter()
            .map(|(center, width, color)| Mesh::cube(center, width, color))
            .collect();
        Self::new(Camera::default(), meshes)
    }

    pub fn validate(&self) -> PeelResult<()> {
        self.camera.validate()?;
        for (i, mesh) in self.meshes.iter().enumerate() {
            mesh.validate()
                .map_err(|e| PeelError::config(format!("mesh {i}: {e}")))?;
        }
        Ok(())
    }

    /// Same scene with meshes and their triangles submitted in reverse order.
    pub fn reversed(&self) -> Self {
        Self {
            camera: self.camera,
            meshes: self.meshes.iter().rev().map(Mesh::reversed).collect(),
        }
    }

    /// Project every triangle to normalized device coordinates, in submission order.
    pub fn project(&self, viewport: Viewport) -> Vec<[Vertex; 3]> {
        let view_proj = self.camera.view_projection(viewport.aspect());
        let mut out = Vec::with_capacity(self.meshes.iter().map(Mesh::triangle_count).sum());
        for mesh in &self.meshes {
            let to_ndc = |i: u32| -> Option<Vertex> {
                let p = *mesh.positions.get(i as usize)?;
                let clip: Vec4 = view_proj * p.extend(1.0);
                (clip.w > MIN_CLIP_W).then(|| Vertex::new(clip.truncate() / clip.w, mesh.color))
            };
            for tri in mesh.indices.chunks_exact(3) {
                if let (Some(a), Some(b), Some(c)) = (to_ndc(tri[0]), to_ndc(tri[1]), to_ndc(tri[2]))
                {
                    out.push([a, b, c]);
                }
            }
        }
        out
    }
}

impl DrawCallback for Scene {
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()> {
        for tri in self.project(ctx.viewport()) {
            ctx.draw_triangle(&tri);
        }
        Ok(())
    }
}

/// JSON scene file: camera, optional background, and objects.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SceneDesc {
    pub camera: Camera,
    pub background: Option<Rgba>,
    pub objects: Vec<ObjectDesc>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectDesc {
    Cuboid {
        center: Vec3,
        size: Vec3,
        color: Rgba,
    },
    Mesh(Mesh),
}

impl SceneDesc {
    pub fn from_json(json: &str) -> PeelResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PeelError::config(format!("invalid scene json: {e}")))
    }

    pub fn to_json_pretty(&self) -> PeelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PeelError::Other(e.into()))
    }

    /// Build and validate the scene.
    pub fn build(&self) -> PeelResult<Scene> {
        let meshes = self
            .objects
            .iter()
            .map(|o| match o {
                ObjectDesc::Cuboid {
                    center,
                    size,
                    color,
                } => Mesh::cuboid(*center, *size, *color),
                ObjectDesc::Mesh(mesh) => mesh.clone(),
            })
            .collect();
        let scene = Scene::new(self.camera, meshes);
        scene.validate()?;
        Ok(scene)
    }

    /// Description of [`Scene::three_cubes`].
    pub fn three_cubes() -> Self {
        Self {
            camera: Camera::default(),
            background: None,
            objects: three_cube_layout()
                .into_iter()
                .map(|(center, width, color)| ObjectDesc::Cuboid {
                    center,
                    size: Vec3::splat(width),
                    color,
                })
                .collect(),
        }
    }
}

fn three_cube_layout() -> [(Vec3, f32, Rgba); 3] {
    let width = 1.0;
    let step = Vec3::splat(width * 0.5);
    [
        (Vec3::ZERO, width, Rgba::BLUE),
        (step, width, Rgba::RED.alpha(0.5)),
        (step * 2.0, width, Rgba::GREEN.alpha(0.5)),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/scene/mod.rs"]
mod tests;
