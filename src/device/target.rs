use crate::foundation::core::{Texel, Viewport};
use crate::foundation::math::{unorm8_encode, unorm8_quantize};

/// Storage format of a [`RenderTarget`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TargetFormat {
    /// 8-bit normalized RGBA; the host output target.
    Rgba8Unorm,
    /// Floating-point RGBA accumulation.
    Rgba32Float,
    /// Two-channel float; the `(-near, far)` min-max depth buffer.
    Rg32Float,
    /// Single-channel float; coverage counters.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TargetFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgba8Unorm | Self::Rgba32Float => 4,
            Self::Rg32Float => 2,
            Self::R32Float | Self::Depth32Float => 1,
        }
    }

    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Rgba32Float => 16,
            Self::Rg32Float => 8,
            Self::R32Float | Self::Depth32Float => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Apply storage precision and channel mask to a shaded value.
    pub(crate) fn encode(self, t: Texel) -> Texel {
        match self {
            Self::Rgba8Unorm => [
                unorm8_quantize(t[0]),
                unorm8_quantize(t[1]),
                unorm8_quantize(t[2]),
                unorm8_quantize(t[3]),
            ],
            Self::Rgba32Float => t,
            Self::Rg32Float => [t[0], t[1], 0.0, 1.0],
            Self::R32Float | Self::Depth32Float => [t[0], 0.0, 0.0, 1.0],
        }
    }
}

/// Identity of one allocation. A reallocated target never reuses an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(pub(crate) u64);

impl TargetId {
    /// Id carried by host-owned output targets, which live outside any framebuffer set.
    pub const OUTPUT: Self = Self(0);
}

/// A 2D image the device renders into or samples from.
#[derive(Clone, Debug)]
pub struct RenderTarget {
    id: TargetId,
    format: TargetFormat,
    viewport: Viewport,
    texels: Vec<Texel>,
}

impl RenderTarget {
    pub(crate) fn new(id: TargetId, format: TargetFormat, viewport: Viewport) -> Self {
        Self {
            id,
            format,
            viewport,
            texels: vec![[0.0; 4]; viewport.pixel_count()],
        }
    }

    /// Allocate a host-owned RGBA8 output target (the "default framebuffer").
    pub fn output(viewport: Viewport) -> Self {
        Self::new(TargetId::OUTPUT, TargetFormat::Rgba8Unorm, viewport)
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    pub fn byte_len(&self) -> usize {
        self.viewport
            .pixel_count()
            .saturating_mul(self.format.bytes_per_texel())
    }

    /// Read the texel at `(x, y)`, row 0 being the top row.
    ///
    /// Panics when the coordinate is outside the target, like an out-of-range slice index.
    pub fn texel(&self, x: u32, y: u32) -> Texel {
        self.texels[self.index(x, y)]
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.viewport.width && y < self.viewport.height);
        (y as usize) * (self.viewport.width as usize) + (x as usize)
    }

    pub(crate) fn load(&self, idx: usize) -> Texel {
        self.texels[idx]
    }

    pub(crate) fn store(&mut self, idx: usize, value: Texel) {
        self.texels[idx] = self.format.encode(value);
    }

    pub(crate) fn clear(&mut self, value: Texel) {
        let v = self.format.encode(value);
        self.texels.fill(v);
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Texel] {
        &mut self.texels
    }

    /// Read the target back as tightly packed, straight-alpha RGBA8.
    pub fn to_frame_rgba(&self) -> FrameRGBA {
        let mut data = Vec::with_capacity(self.texels.len() * 4);
        for t in &self.texels {
            data.extend(t.iter().map(|&c| unorm8_encode(c)));
        }
        FrameRGBA {
            width: self.viewport.width,
            height: self.viewport.height,
            data,
            premultiplied: false,
        }
    }
}

/// A composited frame as RGBA8 pixels, ready for image export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, top row first.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha. Peeling composites are opaque, so this is `false`.
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Largest per-channel absolute difference to another frame of the same size.
    pub fn max_channel_diff(&self, other: &FrameRGBA) -> Option<u8> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a.abs_diff(*b))
                .max()
                .unwrap_or(0),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/target.rs"]
mod tests;
