use crate::device::pipeline::DrawCallback;
use crate::device::target::{FrameRGBA, RenderTarget};
use crate::foundation::core::{Rgba, Viewport};
use crate::foundation::error::{PeelError, PeelResult};
use crate::peel::{FrameStats, PeelOpts, Peeler, PeelingAlgorithm, PeelingMethod, Phase};

/// Per-frame driver: owns the viewport and output target and drives one peeling algorithm.
///
/// ```no_run
/// use depthpeel::{PeelOpts, PeelingHost, PeelingMethod, draw_fn};
///
/// let mut host = PeelingHost::new(Some(PeelingMethod::DualPeeling), PeelOpts::default())?;
/// host.init(640, 480)?;
/// let mut draw = draw_fn(|_ctx| Ok(()));
/// host.display(&mut draw)?;
/// let frame = host.frame()?;
/// host.dispose();
/// # Ok::<(), depthpeel::PeelError>(())
/// ```
#[derive(Debug)]
pub struct PeelingHost {
    peeler: Peeler,
    background: Rgba,
    viewport: Option<Viewport>,
    output: Option<RenderTarget>,
    last_stats: Option<FrameStats>,
}

impl PeelingHost {
    /// Method used when the host does not choose one.
    pub const DEFAULT_METHOD: PeelingMethod = PeelingMethod::WeightedAverage;

    pub fn new(method: Option<PeelingMethod>, opts: PeelOpts) -> PeelResult<Self> {
        let method = method.unwrap_or(Self::DEFAULT_METHOD);
        Ok(Self {
            peeler: Peeler::new(method, opts)?,
            background: opts.background,
            viewport: None,
            output: None,
            last_stats: None,
        })
    }

    /// Like [`PeelingHost::new`], with the method given by its identifier.
    pub fn from_identifier(method: Option<&str>, opts: PeelOpts) -> PeelResult<Self> {
        let method = method.map(str::parse).transpose()?;
        Self::new(method, opts)
    }

    pub fn method(&self) -> PeelingMethod {
        self.peeler.method()
    }

    pub fn algorithm(&self) -> &Peeler {
        &self.peeler
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn output(&self) -> Option<&RenderTarget> {
        self.output.as_ref()
    }

    pub fn last_stats(&self) -> Option<&FrameStats> {
        self.last_stats.as_ref()
    }

    #[tracing::instrument(skip(self), fields(method = %self.method()))]
    pub fn init(&mut self, width: i64, height: i64) -> PeelResult<()> {
        let viewport = Viewport::new(width, height)?;
        self.peeler.init(viewport)?;
        self.viewport = Some(viewport);
        self.output = Some(RenderTarget::output(viewport));
        Ok(())
    }

    /// Forward a resize. Unchanged sizes never reach the algorithm.
    #[tracing::instrument(skip(self), fields(method = %self.method()))]
    pub fn reshape(&mut self, width: i64, height: i64) -> PeelResult<()> {
        let viewport = Viewport::new(width, height)?;
        if self.viewport == Some(viewport) {
            return Ok(());
        }
        self.peeler.reshape(viewport)?;
        self.viewport = Some(viewport);
        self.output = Some(RenderTarget::output(viewport));
        Ok(())
    }

    /// Clear the output to the background, run the algorithm and keep its statistics.
    pub fn display(&mut self, draw: &mut dyn DrawCallback) -> PeelResult<&FrameStats> {
        let Some(output) = self.output.as_mut() else {
            return Err(PeelError::lifecycle(match self.peeler.phase() {
                Phase::Disposed => "display after dispose",
                _ => "display before init",
            }));
        };
        output.clear(self.background.to_texel());
        let stats = self.peeler.display(draw, output)?;
        Ok(&*self.last_stats.insert(stats))
    }

    /// Read the last displayed frame back as RGBA8.
    pub fn frame(&self) -> PeelResult<FrameRGBA> {
        self.output
            .as_ref()
            .map(RenderTarget::to_frame_rgba)
            .ok_or_else(|| PeelError::lifecycle("no output target; call init first"))
    }

    /// Release the algorithm's targets and the output. Repeated calls are no-ops.
    pub fn dispose(&mut self) {
        self.peeler.dispose();
        self.output = None;
        self.viewport = None;
    }
}

#[cfg(test)]
#[path = "../tests/unit/host.rs"]
mod tests;
