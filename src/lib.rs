#![forbid(unsafe_code)]
//! Order-independent transparency through multi-pass depth peeling.
//!
//! Four interchangeable algorithms ([`PeelingMethod`]) render translucent, intersecting geometry
//! without sorting primitives. Each one runs its [`PassPlan`] on a deterministic software render
//! device: geometry passes re-invoke a host [`DrawCallback`], full-screen passes composite the
//! peeled layers, and a final resolve writes the output target.
//!
//! [`PeelingHost`] drives the host lifecycle (`init`, `reshape`, `display`, `dispose`).

pub mod device;
mod foundation;
pub mod host;
pub mod peel;
pub mod scene;

pub use device::blend::{BlendComponent, BlendFactor, BlendOperation, BlendState};
pub use device::framebuffer::{BufferRef, BufferRole, DeviceLimits, FramebufferSet};
pub use device::pingpong::PingPong;
pub use device::pipeline::{
    CompareFunction, DrawCallback, DrawContext, FragmentProgram, GpuState, draw_fn,
};
pub use device::raster::{Fragment, Vertex, rasterize_triangle};
pub use device::target::{FrameRGBA, RenderTarget, TargetFormat, TargetId};
pub use foundation::core::{Rgba, Texel, Viewport};
pub use foundation::error::{PeelError, PeelResult};
pub use host::PeelingHost;
pub use peel::plan::PassPlan;
pub use peel::{
    DualPeeling, FrameStats, FrontToBackPeeling, PassStats, PeelOpts, Peeler, PeelingAlgorithm,
    PeelingMethod, Phase, WeightedAverage, WeightedSum, create_algorithm,
};
pub use scene::{Camera, Mesh, ObjectDesc, Scene, SceneDesc};
