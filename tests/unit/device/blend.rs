use super::*;

fn close(a: Texel, b: Texel) -> bool {
    a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-6)
}

#[test]
fn replace_and_none_write_source() {
    let src = [0.1, 0.2, 0.3, 0.4];
    let dst = [0.9, 0.9, 0.9, 0.9];
    assert_eq!(BlendState::REPLACE.blend(src, dst), src);
    assert_eq!(blend_or_replace(None, src, dst), src);
}

#[test]
fn max_ignores_factors() {
    let out = BlendState::MAX.blend([-1.0, 0.5, 0.0, 0.2], [-0.3, 0.1, 0.7, 0.0]);
    assert_eq!(out, [-0.3, 0.5, 0.7, 0.2]);
}

#[test]
fn additive_sums_every_channel() {
    let out = BlendState::ADDITIVE.blend([0.25, 0.5, 0.0, 0.5], [0.25, 0.25, 1.0, 0.75]);
    assert_eq!(out, [0.5, 0.75, 1.0, 1.25]);
}

#[test]
fn back_to_front_composites_layer_over_accumulator() {
    let bg = [1.0, 1.0, 1.0, 0.0];
    let red = [1.0, 0.0, 0.0, 0.5];
    let out = BlendState::BACK_TO_FRONT.blend(red, bg);
    assert!(close(out, [1.0, 0.5, 0.5, 0.25]));
}

#[test]
fn front_to_back_keeps_transmittance_in_alpha() {
    // Accumulator after one red layer at 50%: premultiplied rgb, transmittance 0.5.
    let acc = [0.5, 0.0, 0.0, 0.5];
    let green = [0.0, 0.5, 0.0, 0.5];
    let out = BlendState::FRONT_TO_BACK.blend(green, acc);
    assert!(close(out, [0.5, 0.25, 0.0, 0.25]));
}
