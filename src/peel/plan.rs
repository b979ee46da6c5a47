//! Pass plans: the per-method sequence of geometry passes, composite steps and final resolve.
//!
//! A plan is derived once from the method and options. It names every buffer a variant owns,
//! which buffers each pass reads and writes, the blend equation per written attachment and the
//! depth state. Variants execute their plan pass by pass; they only attach the fragment programs.

use crate::device::blend::BlendState;
use crate::device::framebuffer::{BufferRef, BufferRole, FramebufferSet, PassTargets};
use crate::device::pingpong::PingPong;
use crate::device::pipeline::{
    ColorAttachment, CompareFunction, DepthAttachment, DrawCallback, FragmentProgram, GpuState,
    Outputs, PassCounters, run_fullscreen, run_geometry,
};
use crate::device::raster::Fragment;
use crate::device::target::{RenderTarget, TargetFormat};
use crate::foundation::error::{PeelError, PeelResult};
use crate::foundation::math::{DEPTH_CLEAR, MAX_DEPTH};
use crate::peel::{PeelOpts, PeelingMethod};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BufferLayout {
    pub buffer: BufferRef,
    pub format: TargetFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassKind {
    /// First geometry pass: seeds depth bounds or the nearest layer.
    Init,
    /// Geometry pass `layer` (1-based) peeling against the previous pass.
    Peel { layer: u32 },
    /// Single additive pass of the weighted variants.
    Accumulate,
}

/// Full-screen pass that blends `source` into `target`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CompositeStep {
    pub source: BufferRef,
    pub target: BufferRef,
    pub blend: BlendState,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PassDesc {
    pub index: u32,
    pub kind: PassKind,
    /// Buffers sampled by the pass's fragment program.
    pub reads: Vec<BufferRef>,
    pub colors: Vec<ColorAttachment>,
    pub depth: Option<DepthAttachment>,
    /// Composite run right after the geometry pass.
    pub composite: Option<CompositeStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveEquation {
    /// `front.rgb + back.rgb · (1 − front.a)`.
    DualFrontBack,
    /// `blender.rgb + background · blender.a`.
    FrontToBack,
    /// Normalized average with `(1 − A)^n` transmittance.
    WeightedAverage,
    /// `Σrgb·a + background · max(0, 1 − Σa)`.
    WeightedSum,
}

/// Final full-screen pass writing the output target.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ResolveStep {
    /// Buffers read when every planned pass runs; an early exit reads the last written slots.
    pub reads: Vec<BufferRef>,
    pub equation: ResolveEquation,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PassPlan {
    pub method: PeelingMethod,
    pub layers: u32,
    pub buffers: Vec<BufferLayout>,
    pub passes: Vec<PassDesc>,
    pub resolve: ResolveStep,
}

const DEPTH_PAIR: [BufferRef; 2] = pair(BufferRole::MinMaxDepth);
const FRONT_PAIR: [BufferRef; 2] = pair(BufferRole::FrontBlender);
const BACK_TEMP_PAIR: [BufferRef; 2] = pair(BufferRole::BackTemp);
const BACK_BLENDER: BufferRef = BufferRef::single(BufferRole::BackBlender);

const PEEL_DEPTH_PAIR: [BufferRef; 2] = pair(BufferRole::PeelDepth);
const LAYER_PAIR: [BufferRef; 2] = pair(BufferRole::LayerColor);
const COLOR_BLENDER: BufferRef = BufferRef::single(BufferRole::ColorBlender);

const ACCUMULATION: BufferRef = BufferRef::single(BufferRole::Accumulation);
const COVERAGE: BufferRef = BufferRef::single(BufferRole::Coverage);

const fn pair(role: BufferRole) -> [BufferRef; 2] {
    [BufferRef::new(role, 0), BufferRef::new(role, 1)]
}

/// Clear value of the min-max depth buffer: `(-MAX_DEPTH, -MAX_DEPTH)`.
pub(crate) const MIN_MAX_CLEAR: [f32; 4] = [-MAX_DEPTH, -MAX_DEPTH, 0.0, 1.0];

impl PassPlan {
    /// Build the plan of `method` for `opts`. Fails on a zero layer count.
    pub fn for_method(method: PeelingMethod, opts: &PeelOpts) -> PeelResult<Self> {
        if opts.layers == 0 {
            return Err(PeelError::config("layer count must be at least 1"));
        }
        Ok(match method {
            PeelingMethod::DualPeeling => dual(opts),
            PeelingMethod::FrontToBack => front_to_back(opts),
            PeelingMethod::WeightedAverage => weighted(method, opts, true),
            PeelingMethod::WeightedSum => weighted(method, opts, false),
        })
    }

    pub fn geometry_pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn composite_count(&self) -> usize {
        self.passes.iter().filter(|p| p.composite.is_some()).count()
    }

    /// Largest number of color attachments any pass binds at once.
    pub fn max_color_attachments(&self) -> usize {
        self.passes.iter().map(|p| p.colors.len()).max().unwrap_or(0)
    }
}

/// Number of geometry passes dual peeling runs for `layers`: `⌈N/2⌉ + 1`.
pub fn dual_pass_count(layers: u32) -> u32 {
    layers.div_ceil(2) + 1
}

fn dual(opts: &PeelOpts) -> PassPlan {
    let bg = opts.background;
    let mut buffers = Vec::with_capacity(7);
    for b in DEPTH_PAIR {
        buffers.push(BufferLayout {
            buffer: b,
            format: TargetFormat::Rg32Float,
        });
    }
    for b in FRONT_PAIR.into_iter().chain(BACK_TEMP_PAIR).chain([BACK_BLENDER]) {
        buffers.push(BufferLayout {
            buffer: b,
            format: TargetFormat::Rgba32Float,
        });
    }

    let max = |buffer, clear| ColorAttachment {
        buffer,
        blend: Some(BlendState::MAX),
        clear: Some(clear),
    };

    let mut passes = vec![PassDesc {
        index: 0,
        kind: PassKind::Init,
        reads: Vec::new(),
        colors: vec![
            max(DEPTH_PAIR[0], MIN_MAX_CLEAR),
            max(FRONT_PAIR[0], [0.0; 4]),
            ColorAttachment {
                buffer: BACK_BLENDER,
                blend: None,
                clear: Some([bg.r, bg.g, bg.b, 0.0]),
            },
        ],
        depth: None,
        composite: None,
    }];

    let mut slots = PingPong::new([0usize, 1]);
    for layer in 1..dual_pass_count(opts.layers) {
        slots.swap();
        let (curr, prev) = (*slots.current(), *slots.previous());
        passes.push(PassDesc {
            index: layer,
            kind: PassKind::Peel { layer },
            reads: vec![DEPTH_PAIR[prev], FRONT_PAIR[prev]],
            colors: vec![
                max(DEPTH_PAIR[curr], MIN_MAX_CLEAR),
                max(FRONT_PAIR[curr], [0.0; 4]),
                max(BACK_TEMP_PAIR[curr], [0.0; 4]),
            ],
            depth: None,
            composite: Some(CompositeStep {
                source: BACK_TEMP_PAIR[curr],
                target: BACK_BLENDER,
                blend: BlendState::BACK_TO_FRONT,
            }),
        });
    }

    PassPlan {
        method: PeelingMethod::DualPeeling,
        layers: opts.layers,
        buffers,
        passes,
        resolve: ResolveStep {
            reads: vec![FRONT_PAIR[*slots.current()], BACK_BLENDER],
            equation: ResolveEquation::DualFrontBack,
        },
    }
}

fn front_to_back(opts: &PeelOpts) -> PassPlan {
    let mut buffers = Vec::with_capacity(5);
    for b in PEEL_DEPTH_PAIR {
        buffers.push(BufferLayout {
            buffer: b,
            format: TargetFormat::Depth32Float,
        });
    }
    for b in LAYER_PAIR.into_iter().chain([COLOR_BLENDER]) {
        buffers.push(BufferLayout {
            buffer: b,
            format: TargetFormat::Rgba32Float,
        });
    }

    let depth = |buffer| DepthAttachment {
        buffer,
        compare: CompareFunction::Less,
        write: true,
        clear: Some(DEPTH_CLEAR),
    };

    let mut passes = vec![PassDesc {
        index: 0,
        kind: PassKind::Init,
        reads: Vec::new(),
        colors: vec![ColorAttachment {
            buffer: COLOR_BLENDER,
            blend: None,
            clear: Some([0.0, 0.0, 0.0, 1.0]),
        }],
        depth: Some(depth(PEEL_DEPTH_PAIR[0])),
        composite: None,
    }];

    let mut slots = PingPong::new([0usize, 1]);
    for layer in 1..opts.layers {
        slots.swap();
        let (curr, prev) = (*slots.current(), *slots.previous());
        passes.push(PassDesc {
            index: layer,
            kind: PassKind::Peel { layer },
            reads: vec![PEEL_DEPTH_PAIR[prev]],
            colors: vec![ColorAttachment {
                buffer: LAYER_PAIR[curr],
                blend: None,
                clear: Some([0.0; 4]),
            }],
            depth: Some(depth(PEEL_DEPTH_PAIR[curr])),
            composite: Some(CompositeStep {
                source: LAYER_PAIR[curr],
                target: COLOR_BLENDER,
                blend: BlendState::FRONT_TO_BACK,
            }),
        });
    }

    PassPlan {
        method: PeelingMethod::FrontToBack,
        layers: opts.layers,
        buffers,
        passes,
        resolve: ResolveStep {
            reads: vec![COLOR_BLENDER],
            equation: ResolveEquation::FrontToBack,
        },
    }
}

fn weighted(method: PeelingMethod, opts: &PeelOpts, average: bool) -> PassPlan {
    let additive = |buffer| ColorAttachment {
        buffer,
        blend: Some(BlendState::ADDITIVE),
        clear: Some([0.0; 4]),
    };

    let mut buffers = vec![BufferLayout {
        buffer: ACCUMULATION,
        format: TargetFormat::Rgba32Float,
    }];
    let mut colors = vec![additive(ACCUMULATION)];
    let mut reads = vec![ACCUMULATION];
    let equation = if average {
        buffers.push(BufferLayout {
            buffer: COVERAGE,
            format: TargetFormat::R32Float,
        });
        colors.push(additive(COVERAGE));
        reads.push(COVERAGE);
        ResolveEquation::WeightedAverage
    } else {
        ResolveEquation::WeightedSum
    };

    PassPlan {
        method,
        layers: opts.layers,
        buffers,
        passes: vec![PassDesc {
            index: 0,
            kind: PassKind::Accumulate,
            reads: Vec::new(),
            colors,
            depth: None,
            composite: None,
        }],
        resolve: ResolveStep { reads, equation },
    }
}

impl PassDesc {
    /// Buffers checked out for writing by this pass.
    pub fn writes(&self) -> Vec<BufferRef> {
        self.colors
            .iter()
            .map(|c| c.buffer)
            .chain(self.depth.map(|d| d.buffer))
            .collect()
    }

    /// Check this pass's write targets out of `fb` and run `f` with the remaining read view.
    pub(crate) fn bind<R>(
        &self,
        fb: &mut FramebufferSet,
        f: impl FnOnce(&FramebufferSet, &mut PassTargets) -> PeelResult<R>,
    ) -> PeelResult<R> {
        fb.with_pass(&self.writes(), f)
    }

    /// Run the geometry pass over targets already bound with [`PassDesc::bind`].
    pub(crate) fn run(
        &self,
        fb: &FramebufferSet,
        gpu: &mut GpuState,
        targets: &mut PassTargets,
        program: &dyn FragmentProgram,
        draw: &mut dyn DrawCallback,
    ) -> PeelResult<PassCounters> {
        run_geometry(
            fb.viewport(),
            &fb.limits(),
            gpu,
            targets,
            &self.colors,
            self.depth.as_ref(),
            program,
            draw,
        )
    }
}

/// Samples a layer target; fully transparent texels are discarded.
struct LayerSample<'a> {
    source: &'a RenderTarget,
}

impl FragmentProgram for LayerSample<'_> {
    fn shade(&self, _frag: &Fragment, index: usize) -> Option<Outputs> {
        let t = self.source.load(index);
        (t[3] > 0.0).then(|| smallvec::smallvec![t])
    }
}

impl CompositeStep {
    /// Blend `source` into `target`. Samples passed count the non-transparent source texels.
    pub(crate) fn execute(
        &self,
        fb: &mut FramebufferSet,
        gpu: &mut GpuState,
    ) -> PeelResult<PassCounters> {
        fb.with_pass(&[self.target], |fb, targets| {
            let program = LayerSample {
                source: fb.get(self.source)?,
            };
            Ok(run_fullscreen(
                gpu,
                targets.get_mut(0),
                Some(self.target),
                Some(self.blend),
                &program,
            ))
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/peel/plan.rs"]
mod tests;
