use glam::Vec3;

use super::*;
use crate::device::pipeline::draw_fn;
use crate::device::raster::Vertex;
use crate::foundation::core::Viewport;
use crate::peel::{PeelingAlgorithm, Phase};

fn quad(z: f32, color: Rgba) -> Vec<Vertex> {
    let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, z), color);
    vec![
        v(-1.0, -1.0),
        v(1.0, -1.0),
        v(1.0, 1.0),
        v(-1.0, -1.0),
        v(1.0, 1.0),
        v(-1.0, 1.0),
    ]
}

fn expected(sorted: &[Rgba], bg: Rgba) -> [u8; 4] {
    let mut acc = [0.0f32; 3];
    let mut t = 1.0;
    for c in sorted {
        for (i, ch) in c.rgb().into_iter().enumerate() {
            acc[i] += ch * c.a * t;
        }
        t *= 1.0 - c.a;
    }
    let bg = bg.rgb();
    let ch = |i: usize| ((acc[i] + bg[i] * t) * 255.0).round() as u8;
    [ch(0), ch(1), ch(2), 255]
}

fn render(layers: &[(f32, Rgba)], opts: PeelOpts) -> ([u8; 4], FrameStats) {
    let viewport = Viewport::new(2, 2).unwrap();
    let mut peeler = FrontToBackPeeling::new(opts).unwrap();
    peeler.init(viewport).unwrap();
    let verts: Vec<Vertex> = layers.iter().flat_map(|&(z, c)| quad(z, c)).collect();
    let mut draw = draw_fn(move |ctx| {
        ctx.draw_triangles(&verts)?;
        Ok(())
    });
    let mut output = RenderTarget::output(viewport);
    let stats = peeler.display(&mut draw, &mut output).unwrap();
    assert!(peeler.gpu_state().is_default());
    (output.to_frame_rgba().pixel(0, 1), stats)
}

fn assert_close(a: [u8; 4], b: [u8; 4]) {
    assert!(
        a.iter().zip(&b).all(|(x, y)| x.abs_diff(*y) <= 1),
        "{a:?} vs {b:?}"
    );
}

const RED: Rgba = Rgba::new(1.0, 0.0, 0.0, 0.5);
const GREEN: Rgba = Rgba::new(0.0, 1.0, 0.0, 0.4);
const BLUE: Rgba = Rgba::new(0.0, 0.0, 1.0, 0.6);

#[test]
fn peels_layers_nearest_first() {
    let layers = [(0.7, BLUE), (0.2, RED), (0.45, GREEN)];
    let (px, stats) = render(&layers, PeelOpts::default());
    assert_close(px, expected(&[RED, GREEN, BLUE], Rgba::WHITE));
    assert_eq!(stats.geometry_passes(), 4);
    // The fourth pass finds nothing left to peel.
    assert_eq!(stats.passes[3].samples_passed, 0);
    assert_eq!(stats.passes[3].composite_samples, None);
    assert!(!stats.early_exit);
}

#[test]
fn submission_order_does_not_matter() {
    let a = [(0.2, RED), (0.45, GREEN), (0.7, BLUE)];
    let b = [(0.7, BLUE), (0.45, GREEN), (0.2, RED)];
    assert_eq!(render(&a, PeelOpts::default()).0, render(&b, PeelOpts::default()).0);
}

#[test]
fn layer_budget_drops_the_farthest_layers() {
    let layers = [(0.2, RED), (0.45, GREEN), (0.7, BLUE)];
    let (px, stats) = render(&layers, PeelOpts::default().with_layers(2));
    assert_eq!(stats.geometry_passes(), 2);
    assert_close(px, expected(&[RED, GREEN], Rgba::WHITE));
}

#[test]
fn empty_layer_ends_the_frame_early() {
    let layers = [(0.2, RED), (0.45, GREEN)];
    let bg = Rgba::new(0.2, 0.2, 0.2, 1.0);
    let (px, stats) = render(&layers, PeelOpts::default().with_layers(6).with_background(bg));
    assert_eq!(stats.geometry_passes(), 3);
    assert!(stats.early_exit);
    assert_eq!(stats.composite_passes(), 1);
    assert_close(px, expected(&[RED, GREEN], bg));

    let (all, stats) = render(
        &layers,
        PeelOpts::default()
            .with_layers(6)
            .with_background(bg)
            .with_occlusion_query(false),
    );
    assert_eq!(stats.geometry_passes(), 6);
    assert_eq!(all, px);
}

#[test]
fn coincident_fragments_keep_the_first_submitted() {
    let (first_red, _) = render(&[(0.5, RED), (0.5, BLUE)], PeelOpts::default());
    let (first_blue, _) = render(&[(0.5, BLUE), (0.5, RED)], PeelOpts::default());
    assert_close(first_red, expected(&[RED], Rgba::WHITE));
    assert_close(first_blue, expected(&[BLUE], Rgba::WHITE));
}

#[test]
fn draw_failure_restores_state_and_keeps_the_algorithm_usable() {
    let viewport = Viewport::new(2, 2).unwrap();
    let mut peeler = FrontToBackPeeling::new(PeelOpts::default()).unwrap();
    peeler.init(viewport).unwrap();
    let mut output = RenderTarget::output(viewport);

    let mut calls = 0;
    let mut flaky = draw_fn(|ctx| {
        calls += 1;
        if calls == 2 {
            anyhow::bail!("lost the scene");
        }
        ctx.draw_triangles(&quad(0.3, RED))?;
        Ok(())
    });
    let err = peeler.display(&mut flaky, &mut output).unwrap_err();
    assert!(matches!(err, PeelError::Draw(_)), "{err}");
    assert!(peeler.gpu_state().is_default());
    assert_eq!(peeler.phase(), Phase::Ready);

    let mut fine = draw_fn(|ctx| {
        ctx.draw_triangles(&quad(0.3, RED))?;
        Ok(())
    });
    peeler.display(&mut fine, &mut output).unwrap();
    assert_close(output.to_frame_rgba().pixel(1, 1), expected(&[RED], Rgba::WHITE));
}

#[test]
fn far_plane_fragments_are_peeled() {
    let (px, stats) = render(&[(1.0, RED)], PeelOpts::default());
    assert_close(px, expected(&[RED], Rgba::WHITE));
    assert_eq!(stats.passes[0].samples_passed, 4);

    let (px, _) = render(&[(1.0, BLUE), (0.3, GREEN)], PeelOpts::default());
    assert_close(px, expected(&[GREEN, BLUE], Rgba::WHITE));
}
