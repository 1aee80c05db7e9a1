/// Renderer module - deferred command queue and per-frame recording

pub mod frame_recorder;
pub mod renderer;

pub use frame_recorder::*;
pub use renderer::*;
