use glam::Vec3;

use crate::foundation::core::Rgba;
use crate::foundation::error::{PeelError, PeelResult};

/// Indexed triangle mesh with a single straight-alpha color.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub color: Rgba,
}

// Corner `i` has x from bit 0, y from bit 1, z from bit 2.
const CUBOID_INDICES: [u32; 36] = [
    0, 2, 1, 1, 2, 3, // -z
    4, 5, 6, 5, 7, 6, // +z
    0, 1, 4, 1, 5, 4, // -y
    2, 6, 3, 3, 6, 7, // +y
    0, 4, 2, 2, 4, 6, // -x
    1, 3, 5, 3, 7, 5, // +x
];

impl Mesh {
    /// Axis-aligned box centered at `center`, closed, 12 triangles.
    pub fn cuboid(center: Vec3, size: Vec3, color: Rgba) -> Self {
        let half = size * 0.5;
        let positions = (0..8)
            .map(|i| {
                let pick = |bit: u32, axis: usize| {
                    if i & (1 << bit) != 0 {
                        center[axis] + half[axis]
                    } else {
                        center[axis] - half[axis]
                    }
                };
                Vec3::new(pick(0, 0), pick(1, 1), pick(2, 2))
            })
            .collect();
        Self {
            positions,
            indices: CUBOID_INDICES.to_vec(),
            color,
        }
    }

    /// Cube of edge `width` centered at `center`.
    pub fn cube(center: Vec3, width: f32, color: Rgba) -> Self {
        Self::cuboid(center, Vec3::splat(width), color)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn validate(&self) -> PeelResult<()> {
        self.color.validate()?;
        if self.indices.len() % 3 != 0 {
            return Err(PeelError::config(format!(
                "mesh index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(PeelError::config(format!(
                "mesh index {bad} out of range for {} positions",
                self.positions.len()
            )));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(PeelError::config("mesh positions must be finite"));
        }
        Ok(())
    }

    /// Same mesh with its triangles submitted in reverse order.
    pub fn reversed(&self) -> Self {
        let indices = self
            .indices
            .chunks_exact(3)
            .rev()
            .flatten()
            .copied()
            .collect();
        Self {
            positions: self.positions.clone(),
            indices,
            color: self.color,
        }
    }
}
