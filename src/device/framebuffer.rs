use smallvec::SmallVec;

use crate::device::target::{RenderTarget, TargetFormat, TargetId};
use crate::foundation::core::Viewport;
use crate::foundation::error::{PeelError, PeelResult};

/// Platform limits of the render device. Exceeding one is an allocation error, never a clamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Maximum number of simultaneously allocated render targets per framebuffer set.
    pub max_render_targets: u32,
    /// Maximum number of color attachments bound in one pass.
    pub max_color_attachments: u32,
    /// Maximum width or height of a target.
    pub max_dimension: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_render_targets: 8,
            max_color_attachments: 4,
            max_dimension: 16384,
        }
    }
}

impl DeviceLimits {
    /// Defaults, overridden by `DEPTHPEEL_MAX_RENDER_TARGETS` and `DEPTHPEEL_MAX_DIMENSION`.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|&n| n > 0)
        };
        let mut limits = Self::default();
        if let Some(n) = read("DEPTHPEEL_MAX_RENDER_TARGETS") {
            limits.max_render_targets = n;
        }
        if let Some(n) = read("DEPTHPEEL_MAX_DIMENSION") {
            limits.max_dimension = n;
        }
        limits
    }
}

/// What a buffer is used for inside a peeling variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BufferRole {
    /// Dual peeling `(-near, far)` depth.
    MinMaxDepth,
    /// Dual peeling front-to-back accumulation.
    FrontBlender,
    /// Dual peeling back layer of the current pass.
    BackTemp,
    /// Dual peeling back-to-front accumulation, initialized to the background.
    BackBlender,
    /// Front-to-back peeling depth.
    PeelDepth,
    /// Front-to-back peeling layer color of the current pass.
    LayerColor,
    /// Front-to-back accumulation with transmittance in alpha.
    ColorBlender,
    /// Weighted `Σ(rgb·a, a)`.
    Accumulation,
    /// Weighted average coverage count.
    Coverage,
}

/// A buffer of a variant: its role and, for ping-pong pairs, which of the two slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BufferRef {
    pub role: BufferRole,
    pub slot: u8,
}

impl BufferRef {
    pub const fn new(role: BufferRole, slot: u8) -> Self {
        Self { role, slot }
    }

    pub const fn single(role: BufferRole) -> Self {
        Self { role, slot: 0 }
    }
}

impl std::fmt::Display for BufferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.role, self.slot)
    }
}

#[derive(Debug)]
struct Slot {
    key: BufferRef,
    format: TargetFormat,
    // `None` while checked out for writing by a pass.
    target: Option<RenderTarget>,
}

/// Targets checked out of a [`FramebufferSet`] for writing during one pass.
#[derive(Debug, Default)]
pub struct PassTargets {
    entries: SmallVec<[(BufferRef, RenderTarget); 4]>,
}

impl PassTargets {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: BufferRef) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }

    pub fn get_mut(&mut self, index: usize) -> &mut RenderTarget {
        &mut self.entries[index].1
    }

    pub fn get(&self, index: usize) -> &RenderTarget {
        &self.entries[index].1
    }
}

/// All render targets owned by one peeling variant, sized to one viewport.
///
/// Targets are keyed by [`BufferRef`]. A pass checks its write targets out with
/// [`FramebufferSet::with_pass`]; while checked out they are invisible to
/// [`FramebufferSet::get`], which turns a read of a target being written into a hazard error.
#[derive(Debug)]
pub struct FramebufferSet {
    viewport: Viewport,
    limits: DeviceLimits,
    slots: Vec<Slot>,
    next_id: u64,
    allocations: u64,
}

impl FramebufferSet {
    pub fn new(viewport: Viewport, limits: DeviceLimits) -> PeelResult<Self> {
        check_dimensions(viewport, &limits)?;
        Ok(Self {
            viewport,
            limits,
            slots: Vec::new(),
            next_id: 1,
            allocations: 0,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total allocations performed over the lifetime of this set, resizes included.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    pub fn byte_len(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.target.as_ref())
            .map(RenderTarget::byte_len)
            .sum()
    }

    pub fn allocate(&mut self, key: BufferRef, format: TargetFormat) -> PeelResult<TargetId> {
        if self.slots.iter().any(|s| s.key == key) {
            return Err(PeelError::allocation(format!("{key} is already allocated")));
        }
        if self.slots.len() >= self.limits.max_render_targets as usize {
            return Err(PeelError::allocation(format!(
                "allocating {key} exceeds the device limit of {} render targets",
                self.limits.max_render_targets
            )));
        }
        let target = self.new_target(format);
        let id = target.id();
        tracing::trace!(%key, ?format, id = id.0, viewport = %self.viewport, "allocate render target");
        self.slots.push(Slot {
            key,
            format,
            target: Some(target),
        });
        Ok(id)
    }

    fn new_target(&mut self, format: TargetFormat) -> RenderTarget {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.allocations += 1;
        RenderTarget::new(id, format, self.viewport)
    }

    /// Release every target and reallocate it at `viewport`. Identical sizes are a no-op.
    ///
    /// Returns whether anything was reallocated.
    pub fn resize(&mut self, viewport: Viewport) -> PeelResult<bool> {
        if viewport == self.viewport {
            return Ok(false);
        }
        check_dimensions(viewport, &self.limits)?;
        if let Some(s) = self.slots.iter().find(|s| s.target.is_none()) {
            return Err(PeelError::lifecycle(format!(
                "cannot resize while {} is bound for writing",
                s.key
            )));
        }
        self.viewport = viewport;
        for i in 0..self.slots.len() {
            let format = self.slots[i].format;
            let target = self.new_target(format);
            self.slots[i].target = Some(target);
        }
        tracing::debug!(viewport = %viewport, targets = self.slots.len(), "reallocated render targets");
        Ok(true)
    }

    /// Drop every target. The set stays usable for new allocations.
    pub fn release(&mut self) {
        self.slots.clear();
    }

    pub fn get(&self, key: BufferRef) -> PeelResult<&RenderTarget> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.key == key)
            .ok_or_else(|| PeelError::lifecycle(format!("{key} is not allocated")))?;
        slot.target
            .as_ref()
            .ok_or_else(|| PeelError::hazard(format!("{key} is read while bound for writing")))
    }

    pub fn id(&self, key: BufferRef) -> PeelResult<TargetId> {
        self.get(key).map(RenderTarget::id)
    }

    pub fn targets(&self) -> impl Iterator<Item = (BufferRef, &RenderTarget)> {
        self.slots
            .iter()
            .filter_map(|s| s.target.as_ref().map(|t| (s.key, t)))
    }

    /// Check `writes` out, run `f` with read access to the remaining targets, then check them
    /// back in. Targets are returned even when `f` fails.
    pub fn with_pass<R>(
        &mut self,
        writes: &[BufferRef],
        f: impl FnOnce(&FramebufferSet, &mut PassTargets) -> PeelResult<R>,
    ) -> PeelResult<R> {
        let mut out = self.checkout(writes)?;
        let result = f(self, &mut out);
        self.checkin(out);
        result
    }

    fn checkout(&mut self, writes: &[BufferRef]) -> PeelResult<PassTargets> {
        if writes.len() > self.limits.max_color_attachments as usize + 1 {
            return Err(PeelError::allocation(format!(
                "{} attachments exceed the device limit of {} color attachments",
                writes.len(),
                self.limits.max_color_attachments
            )));
        }
        let mut out = PassTargets::default();
        for &key in writes {
            let taken = self
                .slots
                .iter_mut()
                .find(|s| s.key == key)
                .and_then(|s| s.target.take());
            match taken {
                Some(t) => out.entries.push((key, t)),
                None => {
                    self.checkin(out);
                    return Err(PeelError::hazard(format!(
                        "{key} is missing or bound twice in one pass"
                    )));
                }
            }
        }
        Ok(out)
    }

    fn checkin(&mut self, targets: PassTargets) {
        for (key, target) in targets.entries {
            if let Some(slot) = self.slots.iter_mut().find(|s| s.key == key) {
                slot.target = Some(target);
            }
        }
    }
}

fn check_dimensions(viewport: Viewport, limits: &DeviceLimits) -> PeelResult<()> {
    if viewport.width > limits.max_dimension || viewport.height > limits.max_dimension {
        return Err(PeelError::allocation(format!(
            "viewport {viewport} exceeds the device limit of {} pixels per side",
            limits.max_dimension
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/device/framebuffer.rs"]
mod tests;
