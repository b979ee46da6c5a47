/// Largest depth value the device produces.
pub(crate) const MAX_DEPTH: f32 = 1.0;

/// Clear value of `Less`-tested depth targets; fragments at `MAX_DEPTH` still pass against it.
pub(crate) const DEPTH_CLEAR: f32 = f32::MAX;

pub(crate) fn saturate(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Encode a normalized channel into its 8-bit UNORM representation.
pub(crate) fn unorm8_encode(v: f32) -> u8 {
    (saturate(v) * 255.0).round() as u8
}

pub(crate) fn unorm8_decode(v: u8) -> f32 {
    f32::from(v) / 255.0
}

/// Round-trip a channel through UNORM8 storage, as an 8-bit color attachment would.
pub(crate) fn unorm8_quantize(v: f32) -> f32 {
    unorm8_decode(unorm8_encode(v))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
