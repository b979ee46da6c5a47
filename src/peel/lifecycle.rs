use crate::device::framebuffer::{DeviceLimits, FramebufferSet};
use crate::device::pipeline::GpuState;
use crate::foundation::core::Viewport;
use crate::foundation::error::{PeelError, PeelResult};
use crate::peel::plan::PassPlan;

/// Where an algorithm is in the host-driven lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Phase {
    /// Constructed, nothing allocated.
    Created,
    /// Targets allocated at the current viewport; `display` and `reshape` are allowed.
    Ready,
    /// Passes of one `display` are running.
    InFrame,
    /// Everything released; only `dispose` is still accepted.
    Disposed,
}

/// Lifecycle bookkeeping embedded in every peeling variant: phase, owned targets and device state.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    phase: Phase,
    limits: DeviceLimits,
    framebuffers: Option<FramebufferSet>,
    gpu: GpuState,
}

impl Lifecycle {
    pub(crate) fn new(limits: DeviceLimits) -> Self {
        Self {
            phase: Phase::Created,
            limits,
            framebuffers: None,
            gpu: GpuState::default(),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn framebuffers(&self) -> Option<&FramebufferSet> {
        self.framebuffers.as_ref()
    }

    pub(crate) fn gpu_state(&self) -> &GpuState {
        &self.gpu
    }

    /// Allocate every buffer of `plan`. On failure nothing stays allocated.
    pub(crate) fn init(&mut self, plan: &PassPlan, viewport: Viewport) -> PeelResult<()> {
        match self.phase {
            Phase::Created => {}
            Phase::Disposed => return Err(PeelError::lifecycle("init after dispose")),
            Phase::Ready | Phase::InFrame => {
                return Err(PeelError::lifecycle("init called twice"));
            }
        }

        let attachments = plan.max_color_attachments();
        if attachments > self.limits.max_color_attachments as usize {
            return Err(PeelError::allocation(format!(
                "{} needs {attachments} color attachments, device limit is {}",
                plan.method, self.limits.max_color_attachments
            )));
        }

        let mut fb = FramebufferSet::new(viewport, self.limits)?;
        for layout in &plan.buffers {
            fb.allocate(layout.buffer, layout.format)?;
        }
        tracing::debug!(
            method = %plan.method,
            %viewport,
            targets = fb.len(),
            bytes = fb.byte_len(),
            "allocated peeling targets"
        );
        self.framebuffers = Some(fb);
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Reallocate at `viewport`. Returns whether anything changed.
    pub(crate) fn reshape(&mut self, viewport: Viewport) -> PeelResult<bool> {
        match self.phase {
            Phase::Ready => {}
            Phase::Created => return Err(PeelError::lifecycle("reshape before init")),
            Phase::InFrame => return Err(PeelError::lifecycle("reshape during display")),
            Phase::Disposed => return Err(PeelError::lifecycle("reshape after dispose")),
        }
        let fb = self
            .framebuffers
            .as_mut()
            .ok_or_else(|| PeelError::lifecycle("no targets allocated"))?;
        fb.resize(viewport)
    }

    /// Run one frame's passes. Device state is restored to its defaults afterwards, on error too.
    pub(crate) fn frame<R>(
        &mut self,
        viewport: Viewport,
        f: impl FnOnce(&mut FramebufferSet, &mut GpuState) -> PeelResult<R>,
    ) -> PeelResult<R> {
        match self.phase {
            Phase::Ready => {}
            Phase::Created => return Err(PeelError::lifecycle("display before init")),
            Phase::InFrame => return Err(PeelError::lifecycle("display is not reentrant")),
            Phase::Disposed => return Err(PeelError::lifecycle("display after dispose")),
        }
        let fb = self
            .framebuffers
            .as_mut()
            .ok_or_else(|| PeelError::lifecycle("no targets allocated"))?;
        if fb.viewport() != viewport {
            return Err(PeelError::viewport(format!(
                "output target is {viewport}, peeling targets are {}",
                fb.viewport()
            )));
        }

        self.phase = Phase::InFrame;
        let result = f(fb, &mut self.gpu);
        self.gpu.restore_defaults();
        self.phase = Phase::Ready;
        result
    }

    /// Release everything.
    ///
    /// Every pass of a frame, row-parallel composites included, has joined before `frame`
    /// returns, and `dispose` needs `&mut self`, so no submitted work is outstanding here.
    ///
    /// Returns `false` when already disposed.
    pub(crate) fn dispose(&mut self) -> bool {
        if self.phase == Phase::Disposed {
            tracing::warn!("dispose called on an already disposed algorithm; ignored");
            return false;
        }
        if let Some(mut fb) = self.framebuffers.take() {
            fb.release();
        }
        self.gpu.restore_defaults();
        self.phase = Phase::Disposed;
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/peel/lifecycle.rs"]
mod tests;
