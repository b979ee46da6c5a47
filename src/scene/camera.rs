use glam::{Mat4, Vec3};

use crate::foundation::error::{PeelError, PeelResult};

/// Perspective camera producing clip space with depth in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.7, 1.9, 3.3),
            target: Vec3::new(0.45, 0.5, 0.55),
            up: Vec3::Y,
            fov_y_deg: 41.0,
            near: 0.5,
            far: 12.0,
        }
    }
}

impl Camera {
    pub fn validate(&self) -> PeelResult<()> {
        let finite = self.eye.is_finite() && self.target.is_finite() && self.up.is_finite();
        if !finite || self.eye == self.target {
            return Err(PeelError::config("camera eye and target must be distinct finite points"));
        }
        if !(self.fov_y_deg > 0.0 && self.fov_y_deg < 180.0) {
            return Err(PeelError::config(format!(
                "camera field of view must be within (0, 180) degrees, got {}",
                self.fov_y_deg
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(PeelError::config(format!(
                "camera clip range must satisfy 0 < near < far, got {}..{}",
                self.near, self.far
            )));
        }
        Ok(())
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}
