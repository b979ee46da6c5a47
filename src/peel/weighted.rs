//! Single-pass weighted blending approximations.
//!
//! Both variants accumulate `Σ(rgb·a, a)` with additive blending in one geometry pass and never
//! peel. The average variant also counts fragments per pixel and normalizes; the sum variant uses
//! the accumulated values as they are.

use smallvec::smallvec;

use crate::device::framebuffer::FramebufferSet;
use crate::device::pipeline::{DrawCallback, FragmentProgram, GpuState, Outputs, run_fullscreen};
use crate::device::raster::Fragment;
use crate::device::target::RenderTarget;
use crate::foundation::core::Rgba;
use crate::foundation::error::{PeelError, PeelResult};
use crate::foundation::math::saturate;
use crate::peel::lifecycle::Lifecycle;
use crate::peel::plan::{PassPlan, ResolveEquation};
use crate::peel::{FrameStats, PassStats, PeelOpts, PeelingMethod, impl_peeling_algorithm};

#[derive(Debug)]
pub struct WeightedAverage {
    opts: PeelOpts,
    plan: PassPlan,
    lifecycle: Lifecycle,
}

#[derive(Debug)]
pub struct WeightedSum {
    opts: PeelOpts,
    plan: PassPlan,
    lifecycle: Lifecycle,
}

impl WeightedAverage {
    pub fn new(opts: PeelOpts) -> PeelResult<Self> {
        opts.validate()?;
        Ok(Self {
            plan: PassPlan::for_method(PeelingMethod::WeightedAverage, &opts)?,
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
        run_weighted(plan, opts, fb, gpu, draw, output)
    }
}

impl WeightedSum {
    pub fn new(opts: PeelOpts) -> PeelResult<Self> {
        opts.validate()?;
        Ok(Self {
            plan: PassPlan::for_method(PeelingMethod::WeightedSum, &opts)?,
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
        run_weighted(plan, opts, fb, gpu, draw, output)
    }
}

impl_peeling_algorithm!(WeightedAverage);
impl_peeling_algorithm!(WeightedSum);

fn run_weighted(
    plan: &PassPlan,
    opts: &PeelOpts,
    fb: &mut FramebufferSet,
    gpu: &mut GpuState,
    draw: &mut dyn DrawCallback,
    output: &mut RenderTarget,
) -> PeelResult<FrameStats> {
    let mut stats = FrameStats::new(plan.method);
    for pass in &plan.passes {
        let counters = pass.bind(fb, |fb, targets| pass.run(fb, gpu, targets, &Accumulate, draw))?;
        tracing::debug!(fragments = counters.fragments, "weighted accumulation pass");
        stats.passes.push(PassStats {
            index: pass.index,
            kind: pass.kind,
            fragments: counters.fragments,
            samples_passed: counters.samples_passed,
            composite_samples: None,
        });
    }

    let reads = &plan.resolve.reads;
    let background = opts.background;
    match (plan.resolve.equation, reads.as_slice()) {
        (ResolveEquation::WeightedAverage, [accum, coverage]) => {
            let program = AverageResolve {
                accum: fb.get(*accum)?,
                coverage: fb.get(*coverage)?,
                background,
            };
            run_fullscreen(gpu, output, None, None, &program);
        }
        (ResolveEquation::WeightedSum, [accum]) => {
            let program = SumResolve {
                accum: fb.get(*accum)?,
                background,
            };
            run_fullscreen(gpu, output, None, None, &program);
        }
        (equation, _) => {
            return Err(PeelError::config(format!(
                "{equation:?} resolve is not a weighted resolve"
            )));
        }
    }
    Ok(stats)
}

/// `(rgb·a, a)` into the accumulator and `1` into the coverage count.
struct Accumulate;

impl FragmentProgram for Accumulate {
    fn shade(&self, frag: &Fragment, _index: usize) -> Option<Outputs> {
        Some(smallvec![frag.color.premultiplied(), [1.0, 0.0, 0.0, 1.0]])
    }
}

/// Weighted average of a pixel's accumulated fragments over `background`.
///
/// Returns `background` when nothing or only fully transparent fragments were accumulated.
pub fn weighted_average(sum: [f32; 4], count: f32, background: Rgba) -> [f32; 3] {
    let bg = background.rgb();
    let total_alpha = sum[3];
    if count <= 0.0 || total_alpha <= 0.0 {
        return bg;
    }
    let avg_alpha = total_alpha / count;
    let t = (1.0 - avg_alpha).max(0.0).powf(count);
    [0, 1, 2].map(|i| sum[i] / total_alpha * (1.0 - t) + bg[i] * t)
}

/// Accumulated premultiplied sum over `background`, saturated.
pub fn weighted_sum(sum: [f32; 4], background: Rgba) -> [f32; 3] {
    let bg = background.rgb();
    let t = (1.0 - sum[3]).max(0.0);
    [0, 1, 2].map(|i| saturate(sum[i] + bg[i] * t))
}

struct AverageResolve<'a> {
    accum: &'a RenderTarget,
    coverage: &'a RenderTarget,
    background: Rgba,
}

impl FragmentProgram for AverageResolve<'_> {
    fn shade(&self, _frag: &Fragment, index: usize) -> Option<Outputs> {
        let [r, g, b] = weighted_average(
            self.accum.load(index),
            self.coverage.load(index)[0],
            self.background,
        );
        Some(smallvec![[r, g, b, 1.0]])
    }
}

struct SumResolve<'a> {
    accum: &'a RenderTarget,
    background: Rgba,
}

impl FragmentProgram for SumResolve<'_> {
    fn shade(&self, _frag: &Fragment, index: usize) -> Option<Outputs> {
        let [r, g, b] = weighted_sum(self.accum.load(index), self.background);
        Some(smallvec![[r, g, b, 1.0]])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/peel/weighted.rs"]
mod tests;
