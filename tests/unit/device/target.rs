use super::*;

fn vp(w: u32, h: u32) -> Viewport {
    Viewport::new(i64::from(w), i64::from(h)).unwrap()
}

#[test]
fn store_applies_format_precision_and_mask() {
    let mut rgba8 = RenderTarget::new(TargetId(1), TargetFormat::Rgba8Unorm, vp(2, 2));
    rgba8.store(0, [0.25, 1.7, -0.2, 0.5]);
    let t = rgba8.load(0);
    assert_eq!(t[1], 1.0);
    assert_eq!(t[2], 0.0);
    assert!((t[0] - 0.25).abs() <= 0.5 / 255.0);

    let mut minmax = RenderTarget::new(TargetId(2), TargetFormat::Rg32Float, vp(2, 2));
    minmax.store(3, [-0.25, 0.75, 9.0, 9.0]);
    assert_eq!(minmax.load(3), [-0.25, 0.75, 0.0, 1.0]);

    let mut depth = RenderTarget::new(TargetId(3), TargetFormat::Depth32Float, vp(2, 2));
    depth.clear([1.0, 5.0, 5.0, 5.0]);
    assert!(depth.texels_mut().iter().all(|t| *t == [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn index_is_row_major_top_first() {
    let mut t = RenderTarget::new(TargetId(1), TargetFormat::Rgba32Float, vp(3, 2));
    let idx = t.index(2, 1);
    assert_eq!(idx, 5);
    t.store(idx, [0.1, 0.2, 0.3, 0.4]);
    assert_eq!(t.texel(2, 1), [0.1, 0.2, 0.3, 0.4]);
}

#[test]
fn readback_encodes_straight_rgba8() {
    let mut out = RenderTarget::output(vp(2, 1));
    out.store(1, [1.0, 0.5, 0.0, 1.0]);
    let frame = out.to_frame_rgba();
    assert_eq!(frame.width, 2);
    assert_eq!(frame.height, 1);
    assert!(!frame.premultiplied);
    assert_eq!(frame.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(frame.pixel(1, 0), [255, 128, 0, 255]);
    assert_eq!(out.id(), TargetId::OUTPUT);
    assert_eq!(out.byte_len(), 8);
}

#[test]
fn frame_diff_requires_equal_sizes() {
    let a = RenderTarget::output(vp(2, 2)).to_frame_rgba();
    let b = RenderTarget::output(vp(2, 1)).to_frame_rgba();
    assert_eq!(a.max_channel_diff(&b), None);
    assert_eq!(a.max_channel_diff(&a.clone()), Some(0));
}
