//! Fixed-function blend stage.
//!
//! Mirrors the blend state of a hardware color attachment: each written channel is
//! `op(src · src_factor, dst · dst_factor)`, configured separately for color and alpha.
//! `Min`/`Max` ignore the factors, as graphics APIs define them.

use crate::foundation::core::Texel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    fn weight(self, src_alpha: f32, dst_alpha: f32) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::SrcAlpha => src_alpha,
            Self::OneMinusSrcAlpha => 1.0 - src_alpha,
            Self::DstAlpha => dst_alpha,
            Self::OneMinusDstAlpha => 1.0 - dst_alpha,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendOperation {
    Add,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: Self = Self::new(BlendFactor::One, BlendFactor::Zero, BlendOperation::Add);
    pub const ADD: Self = Self::new(BlendFactor::One, BlendFactor::One, BlendOperation::Add);
    pub const MAX: Self = Self::new(BlendFactor::One, BlendFactor::One, BlendOperation::Max);

    pub const fn new(src_factor: BlendFactor, dst_factor: BlendFactor, operation: BlendOperation) -> Self {
        Self {
            src_factor,
            dst_factor,
            operation,
        }
    }

    fn apply(self, src: f32, dst: f32, src_alpha: f32, dst_alpha: f32) -> f32 {
        match self.operation {
            BlendOperation::Add => {
                src * self.src_factor.weight(src_alpha, dst_alpha)
                    + dst * self.dst_factor.weight(src_alpha, dst_alpha)
            }
            BlendOperation::Min => src.min(dst),
            BlendOperation::Max => src.max(dst),
        }
    }
}

/// Blend equation of one color attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Plain write: `dst = src`.
    pub const REPLACE: Self = Self::uniform(BlendComponent::REPLACE);

    /// Additive accumulation used by the weighted variants.
    pub const ADDITIVE: Self = Self::uniform(BlendComponent::ADD);

    /// Per-channel maximum; keeps dual peeling order independent.
    pub const MAX: Self = Self::uniform(BlendComponent::MAX);

    /// Straight-alpha `under` into a back-to-front accumulator:
    /// `dst = src·src.a + dst·(1 − src.a)` on every channel.
    pub const BACK_TO_FRONT: Self = Self::uniform(BlendComponent::new(
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        BlendOperation::Add,
    ));

    /// Premultiplied layer `under` a front-to-back accumulator whose alpha holds the remaining
    /// transmittance: `dst.rgb += dst.a · src.rgb`, `dst.a *= 1 − src.a`.
    pub const FRONT_TO_BACK: Self = Self {
        color: BlendComponent::new(BlendFactor::DstAlpha, BlendFactor::One, BlendOperation::Add),
        alpha: BlendComponent::new(
            BlendFactor::Zero,
            BlendFactor::OneMinusSrcAlpha,
            BlendOperation::Add,
        ),
    };

    pub const fn uniform(component: BlendComponent) -> Self {
        Self {
            color: component,
            alpha: component,
        }
    }

    pub fn blend(&self, src: Texel, dst: Texel) -> Texel {
        let (sa, da) = (src[3], dst[3]);
        [
            self.color.apply(src[0], dst[0], sa, da),
            self.color.apply(src[1], dst[1], sa, da),
            self.color.apply(src[2], dst[2], sa, da),
            self.alpha.apply(src[3], dst[3], sa, da),
        ]
    }
}

/// Resolve an optional blend state against the destination, as an attachment write does.
pub fn blend_or_replace(blend: Option<BlendState>, src: Texel, dst: Texel) -> Texel {
    match blend {
        Some(b) => b.blend(src, dst),
        None => src,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/blend.rs"]
mod tests;
