use crate::foundation::error::{PeelError, PeelResult};

/// One texel of any render target: four `f32` channels.
///
/// Single-channel formats only use index 0, min-max depth uses indices 0 and 1.
pub type Texel = [f32; 4];

/// Viewport size in pixels. Both dimensions are strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Validate a host-provided size.
    ///
    /// Takes signed dimensions because windowing toolkits report them that way; anything `<= 0`
    /// is rejected before a single target is allocated.
    pub fn new(width: i64, height: i64) -> PeelResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(PeelError::viewport(format!(
                "viewport must be positive, got {width}x{height}"
            )));
        }
        let width = u32::try_from(width)
            .map_err(|_| PeelError::viewport(format!("viewport width {width} exceeds u32")))?;
        let height = u32::try_from(height)
            .map_err(|_| PeelError::viewport(format!("viewport height {height} exceeds u32")))?;
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Straight (non-premultiplied) RGBA color with `f32` channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with a different alpha.
    pub const fn alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_texel(self) -> Texel {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_texel(t: Texel) -> Self {
        Self::new(t[0], t[1], t[2], t[3])
    }

    /// `(r·a, g·a, b·a, a)`.
    pub fn premultiplied(self) -> Texel {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }

    pub fn rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn validate(self) -> PeelResult<()> {
        let in_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !(in_range(self.r) && in_range(self.g) && in_range(self.b) && in_range(self.a)) {
            return Err(PeelError::config(format!(
                "color channels must be finite and within [0, 1], got {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Rgba {
    fn from(t: [f32; 4]) -> Self {
        Self::from_texel(t)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
