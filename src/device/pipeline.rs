//! Pass execution on the software device.
//!
//! A geometry pass clears its attachments, hands a [`DrawContext`] to the host callback, and
//! pushes every rasterized fragment through depth test, fragment program and blend stage.
//! A full-screen pass runs the program once per texel of a single target.

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::device::blend::{BlendState, blend_or_replace};
use crate::device::framebuffer::{BufferRef, DeviceLimits, PassTargets};
use crate::device::raster::{Fragment, Vertex, rasterize_triangle};
use crate::device::target::RenderTarget;
use crate::foundation::core::{Rgba, Texel, Viewport};
use crate::foundation::error::{PeelError, PeelResult};

/// Values a fragment program writes, one per color attachment.
pub type Outputs = SmallVec<[Texel; 4]>;

/// Per-fragment program of a pass. Returning `None` discards the fragment.
///
/// `index` addresses the fragment's texel in every bound read target.
pub trait FragmentProgram: Sync {
    fn shade(&self, frag: &Fragment, index: usize) -> Option<Outputs>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CompareFunction {
    Less,
    LessEqual,
    Always,
}

impl CompareFunction {
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Always => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorAttachment {
    pub buffer: BufferRef,
    pub blend: Option<BlendState>,
    pub clear: Option<Texel>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DepthAttachment {
    pub buffer: BufferRef,
    pub compare: CompareFunction,
    pub write: bool,
    pub clear: Option<f32>,
}

/// Device state observable by the host between frames.
///
/// Passes change it; every `display` leaves it at [`GpuState::default`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpuState {
    /// Offscreen buffers bound for drawing; empty means the host output target.
    pub draw_buffers: SmallVec<[BufferRef; 4]>,
    pub blend: Option<BlendState>,
    pub depth_test: Option<CompareFunction>,
}

impl GpuState {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn restore_defaults(&mut self) {
        *self = Self::default();
    }

    fn bind(&mut self, colors: &[ColorAttachment], depth: Option<&DepthAttachment>) {
        self.draw_buffers = colors.iter().map(|c| c.buffer).collect();
        self.blend = colors.first().and_then(|c| c.blend);
        self.depth_test = depth.map(|d| d.compare);
    }
}

/// The host's scene renderer, invoked once per geometry pass.
///
/// It must submit identical geometry on every invocation within one frame; the peeling passes
/// rely on seeing the same fragments each time.
pub trait DrawCallback {
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()>;
}

impl<F> DrawCallback for F
where
    F: FnMut(&mut DrawContext<'_>) -> anyhow::Result<()>,
{
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Pin a closure to the [`DrawCallback`] signature so its argument type is inferred.
pub fn draw_fn<F>(f: F) -> F
where
    F: FnMut(&mut DrawContext<'_>) -> anyhow::Result<()>,
{
    f
}

/// Capability handed to the draw callback: submit triangles into whatever the pass has bound.
pub struct DrawContext<'a> {
    viewport: Viewport,
    targets: &'a mut PassTargets,
    colors: &'a [(usize, Option<BlendState>)],
    depth: Option<(usize, CompareFunction, bool)>,
    program: &'a dyn FragmentProgram,
    fragments: u64,
    samples_passed: u64,
}

impl DrawContext<'_> {
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn draw_triangle(&mut self, tri: &[Vertex; 3]) {
        let viewport = self.viewport;
        rasterize_triangle(viewport, tri, |f| self.process(f));
    }

    /// Draw a triangle list. `vertices.len()` must be a multiple of three.
    pub fn draw_triangles(&mut self, vertices: &[Vertex]) -> PeelResult<()> {
        if vertices.len() % 3 != 0 {
            return Err(PeelError::config(format!(
                "triangle list length {} is not a multiple of 3",
                vertices.len()
            )));
        }
        for tri in vertices.chunks_exact(3) {
            self.draw_triangle(&[tri[0], tri[1], tri[2]]);
        }
        Ok(())
    }

    /// Draw an indexed triangle list.
    pub fn draw_indexed(&mut self, vertices: &[Vertex], indices: &[u32]) -> PeelResult<()> {
        if indices.len() % 3 != 0 {
            return Err(PeelError::config(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        let fetch = |i: u32| {
            vertices.get(i as usize).copied().ok_or_else(|| {
                PeelError::config(format!(
                    "index {i} out of range for {} vertices",
                    vertices.len()
                ))
            })
        };
        for tri in indices.chunks_exact(3) {
            let tri = [fetch(tri[0])?, fetch(tri[1])?, fetch(tri[2])?];
            self.draw_triangle(&tri);
        }
        Ok(())
    }

    fn process(&mut self, frag: Fragment) {
        self.fragments += 1;
        let idx = (frag.y as usize) * (self.viewport.width as usize) + frag.x as usize;

        if let Some((di, compare, _)) = self.depth {
            let stored = self.targets.get(di).load(idx)[0];
            if !compare.passes(frag.depth, stored) {
                return;
            }
        }

        let Some(out) = self.program.shade(&frag, idx) else {
            return;
        };
        self.samples_passed += 1;

        if let Some((di, _, true)) = self.depth {
            self.targets.get_mut(di).store(idx, [frag.depth, 0.0, 0.0, 1.0]);
        }
        for (&(ti, blend), &src) in self.colors.iter().zip(out.iter()) {
            let target = self.targets.get_mut(ti);
            let dst = target.load(idx);
            target.store(idx, blend_or_replace(blend, src, dst));
        }
    }
}

/// Counters of one executed pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PassCounters {
    /// Fragments produced by the rasterizer.
    pub fragments: u64,
    /// Fragments that survived depth test and program (occlusion query result).
    pub samples_passed: u64,
}

/// Run one geometry pass over checked-out `targets`.
#[allow(clippy::too_many_arguments)]
pub fn run_geometry(
    viewport: Viewport,
    limits: &DeviceLimits,
    state: &mut GpuState,
    targets: &mut PassTargets,
    colors: &[ColorAttachment],
    depth: Option<&DepthAttachment>,
    program: &dyn FragmentProgram,
    draw: &mut dyn DrawCallback,
) -> PeelResult<PassCounters> {
    if colors.len() > limits.max_color_attachments as usize {
        return Err(PeelError::allocation(format!(
            "{} color attachments exceed the device limit of {}",
            colors.len(),
            limits.max_color_attachments
        )));
    }

    let locate = |buffer: BufferRef, targets: &PassTargets| {
        targets
            .position(buffer)
            .ok_or_else(|| PeelError::hazard(format!("{buffer} is not bound for writing")))
    };

    let mut bound: SmallVec<[(usize, Option<BlendState>); 4]> = SmallVec::new();
    for c in colors {
        let i = locate(c.buffer, targets)?;
        if let Some(clear) = c.clear {
            targets.get_mut(i).clear(clear);
        }
        bound.push((i, c.blend));
    }
    let depth_slot = match depth {
        Some(d) => {
            let i = locate(d.buffer, targets)?;
            if let Some(clear) = d.clear {
                targets.get_mut(i).clear([clear, 0.0, 0.0, 1.0]);
            }
            Some((i, d.compare, d.write))
        }
        None => None,
    };

    state.bind(colors, depth);

    let mut ctx = DrawContext {
        viewport,
        targets,
        colors: &bound,
        depth: depth_slot,
        program,
        fragments: 0,
        samples_passed: 0,
    };
    draw.draw(&mut ctx).map_err(PeelError::Draw)?;

    Ok(PassCounters {
        fragments: ctx.fragments,
        samples_passed: ctx.samples_passed,
    })
}

/// Run `program` once per texel of `dst`, rows in parallel.
pub fn run_fullscreen(
    state: &mut GpuState,
    dst: &mut RenderTarget,
    attachment: Option<BufferRef>,
    blend: Option<BlendState>,
    program: &dyn FragmentProgram,
) -> PassCounters {
    state.draw_buffers = attachment.into_iter().collect();
    state.blend = blend;
    state.depth_test = None;

    let width = dst.width() as usize;
    let format = dst.format();
    let samples: u64 = dst
        .texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .map(|(y, row)| {
            let mut passed = 0u64;
            for (x, texel) in row.iter_mut().enumerate() {
                let frag = Fragment {
                    x: x as u32,
                    y: y as u32,
                    depth: 0.0,
                    color: Rgba::TRANSPARENT,
                };
                if let Some(out) = program.shade(&frag, y * width + x)
                    && let Some(&src) = out.first()
                {
                    *texel = format.encode(blend_or_replace(blend, src, *texel));
                    passed += 1;
                }
            }
            passed
        })
        .sum();

    PassCounters {
        fragments: (width * dst.height() as usize) as u64,
        samples_passed: samples,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/pipeline.rs"]
mod tests;
