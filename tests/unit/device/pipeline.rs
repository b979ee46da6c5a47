use glam::Vec3;

use super::*;
use crate::device::framebuffer::{BufferRole, FramebufferSet};
use crate::device::target::TargetFormat;

const COLOR: BufferRef = BufferRef::single(BufferRole::Accumulation);
const DEPTH: BufferRef = BufferRef::single(BufferRole::PeelDepth);

struct PassColor;

impl FragmentProgram for PassColor {
    fn shade(&self, frag: &Fragment, _index: usize) -> Option<Outputs> {
        Some(smallvec::smallvec![frag.color.to_texel()])
    }
}

struct DiscardAll;

impl FragmentProgram for DiscardAll {
    fn shade(&self, _frag: &Fragment, _index: usize) -> Option<Outputs> {
        None
    }
}

fn fullscreen_quad(z: f32, color: Rgba) -> Vec<Vertex> {
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

fn framebuffers() -> FramebufferSet {
    let viewport = Viewport::new(4, 2).unwrap();
    let mut fb = FramebufferSet::new(viewport, DeviceLimits::default()).unwrap();
    fb.allocate(COLOR, TargetFormat::Rgba32Float).unwrap();
    fb.allocate(DEPTH, TargetFormat::Depth32Float).unwrap();
    fb
}

fn geometry(
    fb: &mut FramebufferSet,
    state: &mut GpuState,
    blend: Option<BlendState>,
    compare: CompareFunction,
    program: &dyn FragmentProgram,
    draw: &mut dyn DrawCallback,
) -> PeelResult<PassCounters> {
    let viewport = fb.viewport();
    let limits = fb.limits();
    let colors = [ColorAttachment {
        buffer: COLOR,
        blend,
        clear: Some([0.0; 4]),
    }];
    let depth = DepthAttachment {
        buffer: DEPTH,
        compare,
        write: true,
        clear: Some(1.0),
    };
    fb.with_pass(&[COLOR, DEPTH], |_, targets| {
        run_geometry(viewport, &limits, state, targets, &colors, Some(&depth), program, draw)
    })
}

#[test]
fn compare_functions() {
    assert!(CompareFunction::Less.passes(0.2, 0.3));
    assert!(!CompareFunction::Less.passes(0.3, 0.3));
    assert!(CompareFunction::LessEqual.passes(0.3, 0.3));
    assert!(CompareFunction::Always.passes(2.0, 0.0));
}

#[test]
fn depth_test_keeps_nearest_and_counts_samples() {
    let mut fb = framebuffers();
    let mut state = GpuState::default();
    let mut draw = draw_fn(|ctx| {
        ctx.draw_triangles(&fullscreen_quad(0.6, Rgba::RED))?;
        ctx.draw_triangles(&fullscreen_quad(0.3, Rgba::GREEN))?;
        // Farther than what is stored: rejected.
        ctx.draw_triangles(&fullscreen_quad(0.9, Rgba::BLUE))?;
        Ok(())
    });
    let counters = geometry(
        &mut fb,
        &mut state,
        None,
        CompareFunction::Less,
        &PassColor,
        &mut draw,
    )
    .unwrap();

    assert_eq!(counters.fragments, 24);
    assert_eq!(counters.samples_passed, 16);
    let color = fb.get(COLOR).unwrap();
    assert_eq!(color.texel(3, 1), Rgba::GREEN.to_texel());
    let depth = fb.get(DEPTH).unwrap();
    assert!((depth.texel(0, 0)[0] - 0.3).abs() < 1e-6);
    assert_eq!(state.draw_buffers.as_slice(), &[COLOR]);
    assert_eq!(state.depth_test, Some(CompareFunction::Less));
}

#[test]
fn additive_blend_accumulates_every_fragment() {
    let mut fb = framebuffers();
    let mut state = GpuState::default();
    let half = Rgba::new(0.25, 0.5, 0.0, 0.5);
    let mut draw = draw_fn(|ctx| {
        ctx.draw_triangles(&fullscreen_quad(0.5, half))?;
        ctx.draw_triangles(&fullscreen_quad(0.5, half))?;
        Ok(())
    });
    geometry(
        &mut fb,
        &mut state,
        Some(BlendState::ADDITIVE),
        CompareFunction::Always,
        &PassColor,
        &mut draw,
    )
    .unwrap();
    assert_eq!(fb.get(COLOR).unwrap().texel(1, 1), [0.5, 1.0, 0.0, 1.0]);
}

#[test]
fn discarded_fragments_write_nothing() {
    let mut fb = framebuffers();
    let mut state = GpuState::default();
    let mut draw = draw_fn(|ctx| ctx.draw_triangles(&fullscreen_quad(0.5, Rgba::RED)).map_err(Into::into));
    let counters = geometry(
        &mut fb,
        &mut state,
        None,
        CompareFunction::Less,
        &DiscardAll,
        &mut draw,
    )
    .unwrap();
    assert_eq!(counters.fragments, 8);
    assert_eq!(counters.samples_passed, 0);
    assert_eq!(fb.get(DEPTH).unwrap().texel(0, 0)[0], 1.0);
    assert_eq!(fb.get(COLOR).unwrap().texel(0, 0), [0.0; 4]);
}

#[test]
fn draw_callback_errors_are_wrapped_and_targets_returned() {
    let mut fb = framebuffers();
    let mut state = GpuState::default();
    let mut draw = draw_fn(|_ctx| Err(anyhow::anyhow!("scene exploded")));
    let err = geometry(
        &mut fb,
        &mut state,
        None,
        CompareFunction::Less,
        &PassColor,
        &mut draw,
    )
    .unwrap_err();
    assert!(matches!(err, PeelError::Draw(_)), "{err}");
    assert!(err.to_string().contains("scene exploded"));
    assert!(fb.get(COLOR).is_ok());
    assert!(fb.get(DEPTH).is_ok());
}

#[test]
fn malformed_triangle_lists_are_rejected() {
    let mut fb = framebuffers();
    let mut state = GpuState::default();
    let mut seen = Vec::new();
    let mut draw = draw_fn(|ctx| {
        let quad = fullscreen_quad(0.5, Rgba::RED);
        seen.push(ctx.draw_triangles(&quad[..4]).is_err());
        seen.push(ctx.draw_indexed(&quad, &[0, 1]).is_err());
        seen.push(ctx.draw_indexed(&quad, &[0, 1, 9]).is_err());
        seen.push(ctx.draw_indexed(&quad, &[0, 1, 2]).is_err());
        Ok(())
    });
    let counters = geometry(
        &mut fb,
        &mut state,
        None,
        CompareFunction::Less,
        &PassColor,
        &mut draw,
    )
    .unwrap();
    drop(draw);
    assert_eq!(seen, [true, true, true, false]);
    assert_eq!(counters.samples_passed, 4);
}

#[test]
fn too_many_color_attachments_is_an_allocation_error() {
    let viewport = Viewport::new(2, 2).unwrap();
    let limits = DeviceLimits {
        max_color_attachments: 1,
        ..DeviceLimits::default()
    };
    let mut fb = FramebufferSet::new(viewport, limits).unwrap();
    let a = BufferRef::new(BufferRole::FrontBlender, 0);
    let b = BufferRef::new(BufferRole::FrontBlender, 1);
    fb.allocate(a, TargetFormat::Rgba32Float).unwrap();
    fb.allocate(b, TargetFormat::Rgba32Float).unwrap();
    let colors = [a, b].map(|buffer| ColorAttachment {
        buffer,
        blend: None,
        clear: None,
    });
    let mut state = GpuState::default();
    let mut draw = draw_fn(|_ctx| Ok(()));
    let err = fb
        .with_pass(&[a, b], |_, targets| {
            run_geometry(viewport, &limits, &mut state, targets, &colors, None, &PassColor, &mut draw)
        })
        .unwrap_err();
    assert!(matches!(err, PeelError::Allocation(_)), "{err}");
}

struct Constant(Texel);

impl FragmentProgram for Constant {
    fn shade(&self, frag: &Fragment, _index: usize) -> Option<Outputs> {
        (frag.x % 2 == 0).then(|| smallvec::smallvec![self.0])
    }
}

#[test]
fn fullscreen_pass_blends_covered_texels() {
    let viewport = Viewport::new(4, 3).unwrap();
    let mut dst = RenderTarget::output(viewport);
    dst.clear([0.0, 0.0, 1.0, 1.0]);
    let mut state = GpuState::default();
    let counters = run_fullscreen(
        &mut state,
        &mut dst,
        None,
        Some(BlendState::BACK_TO_FRONT),
        &Constant([1.0, 0.0, 0.0, 0.5]),
    );
    assert_eq!(counters.fragments, 12);
    assert_eq!(counters.samples_passed, 6);
    assert_eq!(dst.to_frame_rgba().pixel(0, 0), [128, 0, 128, 191]);
    assert_eq!(dst.to_frame_rgba().pixel(1, 0), [0, 0, 255, 255]);
    assert!(state.draw_buffers.is_empty());
}

#[test]
fn gpu_state_restores_to_default() {
    let mut state = GpuState {
        draw_buffers: smallvec::smallvec![COLOR],
        blend: Some(BlendState::MAX),
        depth_test: Some(CompareFunction::Less),
    };
    assert!(!state.is_default());
    state.restore_defaults();
    assert!(state.is_default());
}
