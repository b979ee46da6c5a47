//! Peeling algorithms behind one lifecycle: init, reshape, display, dispose.

pub mod dual;
pub mod front_to_back;
pub mod lifecycle;
pub mod plan;
pub mod weighted;

use std::str::FromStr;

use crate::device::framebuffer::{DeviceLimits, FramebufferSet};
use crate::device::pipeline::{DrawCallback, GpuState};
use crate::device::target::RenderTarget;
use crate::foundation::core::{Rgba, Viewport};
use crate::foundation::error::{PeelError, PeelResult};

pub use dual::DualPeeling;
pub use front_to_back::FrontToBackPeeling;
pub use lifecycle::Phase;
pub use plan::{PassKind, PassPlan};
pub use weighted::{WeightedAverage, WeightedSum};

/// Identifier of a peeling variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeelingMethod {
    DualPeeling,
    FrontToBack,
    WeightedAverage,
    WeightedSum,
}

impl PeelingMethod {
    pub const ALL: [Self; 4] = [
        Self::DualPeeling,
        Self::FrontToBack,
        Self::WeightedAverage,
        Self::WeightedSum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DualPeeling => "DUAL_PEELING",
            Self::FrontToBack => "FRONT_TO_BACK",
            Self::WeightedAverage => "WEIGHTED_AVERAGE",
            Self::WeightedSum => "WEIGHTED_SUM",
        }
    }

    /// Whether the layer count changes the number of passes.
    pub fn uses_layers(self) -> bool {
        matches!(self, Self::DualPeeling | Self::FrontToBack)
    }
}

impl std::fmt::Display for PeelingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeelingMethod {
    type Err = PeelError;

    /// Case-insensitive; `-` is accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| {
                PeelError::config(format!(
                    "unknown peeling method {s:?} (expected one of DUAL_PEELING, FRONT_TO_BACK, \
                     WEIGHTED_AVERAGE, WEIGHTED_SUM)"
                ))
            })
    }
}

/// Options fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PeelOpts {
    /// Layer count `N`; ignored by the weighted variants.
    pub layers: u32,
    /// Opaque background the transparent layers are composited onto.
    pub background: Rgba,
    /// Stop peeling early once a pass reports zero samples.
    pub occlusion_query: bool,
    pub limits: DeviceLimits,
}

impl Default for PeelOpts {
    fn default() -> Self {
        Self {
            layers: 4,
            background: Rgba::WHITE,
            occlusion_query: true,
            limits: DeviceLimits::default(),
        }
    }
}

impl PeelOpts {
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    pub fn with_occlusion_query(mut self, enabled: bool) -> Self {
        self.occlusion_query = enabled;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> PeelResult<()> {
        if self.layers == 0 {
            return Err(PeelError::config("layer count must be at least 1"));
        }
        self.background.validate()?;
        if self.background.a != 1.0 {
            return Err(PeelError::config(format!(
                "background must be opaque, got alpha {}",
                self.background.a
            )));
        }
        Ok(())
    }
}

/// Counters of one geometry pass and its composite step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PassStats {
    pub index: u32,
    pub kind: PassKind,
    pub fragments: u64,
    /// Fragments that survived depth test and program.
    pub samples_passed: u64,
    /// Texels the composite step blended, when the pass has one and it ran.
    pub composite_samples: Option<u64>,
}

/// What one `display` did.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FrameStats {
    pub method: PeelingMethod,
    pub passes: Vec<PassStats>,
    /// The plan was cut short by a zero-sample pass.
    pub early_exit: bool,
}

impl FrameStats {
    pub(crate) fn new(method: PeelingMethod) -> Self {
        Self {
            method,
            passes: Vec::new(),
            early_exit: false,
        }
    }

    pub fn geometry_passes(&self) -> usize {
        self.passes.len()
    }

    pub fn composite_passes(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| p.composite_samples.is_some())
            .count()
    }
}

/// Lifecycle shared by every peeling variant.
pub trait PeelingAlgorithm {
    fn method(&self) -> PeelingMethod;

    fn plan(&self) -> &PassPlan;

    fn phase(&self) -> Phase;

    /// Allocate every target at `viewport`.
    fn init(&mut self, viewport: Viewport) -> PeelResult<()>;

    /// Reallocate at `viewport`; no-op when the size is unchanged.
    fn reshape(&mut self, viewport: Viewport) -> PeelResult<()>;

    /// Run the pass plan, invoking `draw` once per geometry pass, and resolve into `output`.
    ///
    /// Device state is back at its defaults when this returns, whether it succeeded or not.
    fn display(
        &mut self,
        draw: &mut dyn DrawCallback,
        output: &mut RenderTarget,
    ) -> PeelResult<FrameStats>;

    /// Release everything. Repeated calls are no-ops.
    fn dispose(&mut self);

    /// Targets owned by the variant; `None` before `init` and after `dispose`.
    fn framebuffers(&self) -> Option<&FramebufferSet>;

    fn gpu_state(&self) -> &GpuState;
}

/// One of the four peeling variants, chosen at construction.
#[derive(Debug)]
pub enum Peeler {
    Dual(DualPeeling),
    FrontToBack(FrontToBackPeeling),
    WeightedAverage(WeightedAverage),
    WeightedSum(WeightedSum),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Peeler::Dual($p) => $body,
            Peeler::FrontToBack($p) => $body,
            Peeler::WeightedAverage($p) => $body,
            Peeler::WeightedSum($p) => $body,
        }
    };
}

impl Peeler {
    pub fn new(method: PeelingMethod, opts: PeelOpts) -> PeelResult<Self> {
        Ok(match method {
            PeelingMethod::DualPeeling => Self::Dual(DualPeeling::new(opts)?),
            PeelingMethod::FrontToBack => Self::FrontToBack(FrontToBackPeeling::new(opts)?),
            PeelingMethod::WeightedAverage => Self::WeightedAverage(WeightedAverage::new(opts)?),
            PeelingMethod::WeightedSum => Self::WeightedSum(WeightedSum::new(opts)?),
        })
    }
}

impl PeelingAlgorithm for Peeler {
    fn method(&self) -> PeelingMethod {
        dispatch!(self, p => p.method())
    }

    fn plan(&self) -> &PassPlan {
        dispatch!(self, p => p.plan())
    }

    fn phase(&self) -> Phase {
        dispatch!(self, p => p.phase())
    }

    fn init(&mut self, viewport: Viewport) -> PeelResult<()> {
        dispatch!(self, p => p.init(viewport))
    }

    fn reshape(&mut self, viewport: Viewport) -> PeelResult<()> {
        dispatch!(self, p => p.reshape(viewport))
    }

    fn display(
        &mut self,
        draw: &mut dyn DrawCallback,
        output: &mut RenderTarget,
    ) -> PeelResult<FrameStats> {
        dispatch!(self, p => p.display(draw, output))
    }

    fn dispose(&mut self) {
        dispatch!(self, p => p.dispose())
    }

    fn framebuffers(&self) -> Option<&FramebufferSet> {
        dispatch!(self, p => p.framebuffers())
    }

    fn gpu_state(&self) -> &GpuState {
        dispatch!(self, p => p.gpu_state())
    }
}

/// Build the variant named by `method`. Unknown identifiers are configuration errors.
pub fn create_algorithm(method: &str, opts: PeelOpts) -> PeelResult<Peeler> {
    Peeler::new(method.parse()?, opts)
}

/// Implements [`PeelingAlgorithm`] for a variant with `lifecycle`, `plan` fields and a
/// `run_frame` method.
macro_rules! impl_peeling_algorithm {
    ($ty:ty) => {
        impl $crate::peel::PeelingAlgorithm for $ty {
            fn method(&self) -> $crate::peel::PeelingMethod {
                self.plan.method
            }

            fn plan(&self) -> &$crate::peel::PassPlan {
                &self.plan
            }

            fn phase(&self) -> $crate::peel::Phase {
                self.lifecycle.phase()
            }

            #[tracing::instrument(skip(self), fields(method = %self.plan.method))]
            fn init(
                &mut self,
                viewport: $crate::foundation::core::Viewport,
            ) -> $crate::foundation::error::PeelResult<()> {
                self.lifecycle.init(&self.plan, viewport)
            }

            #[tracing::instrument(skip(self), fields(method = %self.plan.method))]
            fn reshape(
                &mut self,
                viewport: $crate::foundation::core::Viewport,
            ) -> $crate::foundation::error::PeelResult<()> {
                if self.lifecycle.reshape(viewport)? {
                    tracing::debug!(%viewport, "reshaped");
                }
                Ok(())
            }

            #[tracing::instrument(
                skip_all,
                fields(method = %self.plan.method, viewport = %output.viewport())
            )]
            fn display(
                &mut self,
                draw: &mut dyn $crate::device::pipeline::DrawCallback,
                output: &mut $crate::device::target::RenderTarget,
            ) -> $crate::foundation::error::PeelResult<$crate::peel::FrameStats> {
                let Self {
                    lifecycle,
                    plan,
                    opts,
                    ..
                } = self;
                lifecycle.frame(output.viewport(), |fb, gpu| {
                    Self::run_frame(plan, opts, fb, gpu, draw, output)
                })
            }

            #[tracing::instrument(skip(self), fields(method = %self.plan.method))]
            fn dispose(&mut self) {
                self.lifecycle.dispose();
            }

            fn framebuffers(&self) -> Option<&$crate::device::framebuffer::FramebufferSet> {
                self.lifecycle.framebuffers()
            }

            fn gpu_state(&self) -> &$crate::device::pipeline::GpuState {
                self.lifecycle.gpu_state()
            }
        }
    };
}

pub(crate) use impl_peeling_algorithm;

#[cfg(test)]
#[path = "../../tests/unit/peel/mod.rs"]
mod tests;
