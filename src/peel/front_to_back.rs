//! Front-to-back depth peeling: one layer per geometry pass, nearest first.
//!
//! The color blender keeps premultiplied color in rgb and the remaining transmittance in alpha.
//! Every peel pass discards fragments at or in front of the previously peeled depth, keeps the
//! nearest survivor with a `Less` depth test and blends it under the accumulated result.

use smallvec::smallvec;

use crate::device::framebuffer::FramebufferSet;
use crate::device::pipeline::{DrawCallback, FragmentProgram, GpuState, Outputs, run_fullscreen};
use crate::device::raster::Fragment;
use crate::device::target::RenderTarget;
use crate::foundation::core::Rgba;
use crate::foundation::error::{PeelError, PeelResult};
use crate::peel::lifecycle::Lifecycle;
use crate::peel::plan::PassPlan;
use crate::peel::{FrameStats, PassStats, PeelOpts, PeelingMethod, impl_peeling_algorithm};

#[derive(Debug)]
pub struct FrontToBackPeeling {
    opts: PeelOpts,
    plan: PassPlan,
    lifecycle: Lifecycle,
}

impl FrontToBackPeeling {
    pub fn new(opts: PeelOpts) -> PeelResult<Self> {
        opts.validate()?;
        Ok(Self {
            plan: PassPlan::for_method(PeelingMethod::FrontToBack, &opts)?,
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

        for pass in &plan.passes {
            let counters = pass.bind(fb, |fb, targets| match pass.reads.as_slice() {
                [] => pass.run(fb, gpu, targets, &NearestLayer, draw),
                [depth] => {
                    let program = PeelBehind {
                        depth: fb.get(*depth)?,
                    };
                    pass.run(fb, gpu, targets, &program, draw)
                }
                reads => Err(PeelError::hazard(format!(
                    "front-to-back pass {} reads {} buffers, expected the previous depth",
                    pass.index,
                    reads.len()
                ))),
            })?;

            let mut record = PassStats {
                index: pass.index,
                kind: pass.kind,
                fragments: counters.fragments,
                samples_passed: counters.samples_passed,
                composite_samples: None,
            };

            if pass.composite.is_some() && opts.occlusion_query && counters.samples_passed == 0 {
                stats.passes.push(record);
                stats.early_exit = pass.index as usize + 1 < plan.passes.len();
                tracing::debug!(pass = pass.index, "layer is empty; stopping early");
                break;
            }

            if let Some(step) = &pass.composite {
                record.composite_samples = Some(step.execute(fb, gpu)?.samples_passed);
            }
            tracing::debug!(
                pass = pass.index,
                fragments = counters.fragments,
                samples = counters.samples_passed,
                "front-to-back pass"
            );
            stats.passes.push(record);
        }

        let program = Resolve {
            blender: fb.get(plan.resolve.reads[0])?,
            background: opts.background,
        };
        run_fullscreen(gpu, output, None, None, &program);
        Ok(stats)
    }
}

impl_peeling_algorithm!(FrontToBackPeeling);

/// Nearest layer straight into the blender: `(rgb·a, 1 − a)`.
struct NearestLayer;

impl FragmentProgram for NearestLayer {
    fn shade(&self, frag: &Fragment, _index: usize) -> Option<Outputs> {
        let c = frag.color;
        Some(smallvec![[c.r * c.a, c.g * c.a, c.b * c.a, 1.0 - c.a]])
    }
}

/// Discards fragments at or in front of the previously peeled depth.
struct PeelBehind<'a> {
    depth: &'a RenderTarget,
}

impl FragmentProgram for PeelBehind<'_> {
    fn shade(&self, frag: &Fragment, index: usize) -> Option<Outputs> {
        if frag.depth <= self.depth.load(index)[0] {
            return None;
        }
        Some(smallvec![frag.color.premultiplied()])
    }
}

struct Resolve<'a> {
    blender: &'a RenderTarget,
    background: Rgba,
}

impl FragmentProgram for Resolve<'_> {
    fn shade(&self, _frag: &Fragment, index: usize) -> Option<Outputs> {
        let b = self.blender.load(index);
        let bg = self.background;
        Some(smallvec![[
            b[0] + bg.r * b[3],
            b[1] + bg.g * b[3],
            b[2] + bg.b * b[3],
            1.0
        ]])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/peel/front_to_back.rs"]
mod tests;
