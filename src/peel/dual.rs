//! Dual depth peeling: peels the nearest and the farthest layer in the same geometry pass.
//!
//! The min-max buffer stores `(-near, far)` so a single MAX blend yields both bounds. Each peel
//! pass composites fragments lying exactly on `near` into the front blender, writes fragments on
//! `far` to the back-temp target, and forwards everything strictly inside to the next pass.
//! Back layers are then blended under the back blender, which starts out as the background.
//! With the occlusion query enabled, peeling stops after the first pass that forwards nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::smallvec;

use crate::device::framebuffer::FramebufferSet;
use crate::device::pipeline::{DrawCallback, FragmentProgram, GpuState, Outputs, run_fullscreen};
use crate::device::raster::Fragment;
use crate::device::target::RenderTarget;
use crate::foundation::error::{PeelError, PeelResult};
use crate::peel::lifecycle::Lifecycle;
use crate::peel::plan::{MIN_MAX_CLEAR, PassPlan};
use crate::peel::{FrameStats, PassStats, PeelOpts, PeelingMethod, impl_peeling_algorithm};

#[derive(Debug)]
pub struct DualPeeling {
    opts: PeelOpts,
    plan: PassPlan,
    lifecycle: Lifecycle,
}

impl DualPeeling {
    pub fn new(opts: PeelOpts) -> PeelResult<Self> {
        opts.validate()?;
        Ok(Self {
            plan: PassPlan::for_method(PeelingMethod::DualPeeling, &opts)?,
            lifecycle: Lifecycle::new(opts.limits),
            opts,
        })
    }

    fn run_frame(
        plan: &PassPlan,
        opts: &PeelOpts,
        fb: &mut FramebufferSet,
        gpu: &mut GpuState,
        draw: &mut dyn DrawCallback,
        output: &mut RenderTarget,
    ) -> PeelResult<FrameStats> {
        let mut stats = FrameStats::new(plan.method);
        // Front blender slot written by the last executed pass.
        let mut front = plan.passes[0].colors[1].buffer;

        for pass in &plan.passes {
            let inside = AtomicU64::new(0);
            let counters = pass.bind(fb, |fb, targets| match pass.reads.as_slice() {
                [] => pass.run(fb, gpu, targets, &MinMaxInit, draw),
                [depth, front] => {
                    let program = Peel {
                        depth: fb.get(*depth)?,
                        front: fb.get(*front)?,
                        inside: &inside,
                    };
                    pass.run(fb, gpu, targets, &program, draw)
                }
                reads => Err(PeelError::hazard(format!(
                    "dual pass {} reads {} buffers, expected the depth and front pair",
                    pass.index,
                    reads.len()
                ))),
            })?;
            front = pass.colors[1].buffer;
            let inside = inside.into_inner();

            let composite = match &pass.composite {
                Some(step) => Some(step.execute(fb, gpu)?.samples_passed),
                None => None,
            };
            tracing::debug!(
                pass = pass.index,
                fragments = counters.fragments,
                back_samples = composite,
                inside,
                "dual peel pass"
            );
            stats.passes.push(PassStats {
                index: pass.index,
                kind: pass.kind,
                fragments: counters.fragments,
                samples_passed: counters.samples_passed,
                composite_samples: composite,
            });

            // Transparent back layers pass no samples; only an empty interior ends the peel.
            if opts.occlusion_query && pass.composite.is_some() && inside == 0 {
                stats.early_exit = pass.index as usize + 1 < plan.passes.len();
                if stats.early_exit {
                    tracing::debug!(pass = pass.index, "no layer left inside; stopping early");
                }
                break;
            }
        }

        let program = Resolve {
            front: fb.get(front)?,
            back: fb.get(plan.resolve.reads[1])?,
        };
        run_fullscreen(gpu, output, None, None, &program);
        Ok(stats)
    }
}

impl_peeling_algorithm!(DualPeeling);

/// Writes `(-z, z)` so MAX blending keeps `(-near, far)`.
struct MinMaxInit;

impl FragmentProgram for MinMaxInit {
    fn shade(&self, frag: &Fragment, _index: usize) -> Option<Outputs> {
        Some(smallvec![[-frag.depth, frag.depth, 0.0, 1.0]])
    }
}

struct Peel<'a> {
    depth: &'a RenderTarget,
    front: &'a RenderTarget,
    /// Fragments strictly between the bounds, left for the next pass.
    inside: &'a AtomicU64,
}

impl FragmentProgram for Peel<'_> {
    fn shade(&self, frag: &Fragment, index: usize) -> Option<Outputs> {
        let bounds = self.depth.load(index);
        let (near, far) = (-bounds[0], bounds[1]);
        let front = self.front.load(index);
        let z = frag.depth;

        let mut out: Outputs = smallvec![MIN_MAX_CLEAR, front, [0.0; 4]];
        if z < near || z > far {
            // Already peeled.
            return Some(out);
        }
        if z > near && z < far {
            self.inside.fetch_add(1, Ordering::Relaxed);
            out[0] = [-z, z, 0.0, 1.0];
            return Some(out);
        }

        let c = frag.color;
        if z == near {
            let t = 1.0 - front[3];
            out[1] = [
                front[0] + c.r * c.a * t,
                front[1] + c.g * c.a * t,
                front[2] + c.b * c.a * t,
                1.0 - t * (1.0 - c.a),
            ];
        } else {
            out[2] = c.to_texel();
        }
        Some(out)
    }
}

struct Resolve<'a> {
    front: &'a RenderTarget,
    back: &'a RenderTarget,
}

impl FragmentProgram for Resolve<'_> {
    fn shade(&self, _frag: &Fragment, index: usize) -> Option<Outputs> {
        let f = self.front.load(index);
        let b = self.back.load(index);
        let t = 1.0 - f[3];
        Some(smallvec![[
            f[0] + b[0] * t,
            f[1] + b[1] * t,
            f[2] + b[2] * t,
            1.0
        ]])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/peel/dual.rs"]
mod tests;
