//! Deterministic software render device: targets, blend stage, rasterizer, pass execution.

pub mod blend;
pub mod framebuffer;
pub mod pingpong;
pub mod pipeline;
pub mod raster;
pub mod target;
