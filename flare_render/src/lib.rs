/*!
# Flare Render

Frame-submission core of the Flare renderer.

This crate holds the platform-agnostic part: backend traits for GPU
resources, a deferred command queue drained once per frame, the
presentation surface state machine, a content-addressed binding layout cache
and render targets. Backends (currently `flare_render_vulkan`) implement the
`GraphicsDevice` and `SwapchainBackend` traits.

## Architecture

- **Engine**: owns the device handle, layout cache and renderer
- **Renderer**: deferred queue of recording closures, frame slot rotation
- **PresentationSurface**: acquire / record / present / recreate state machine
- **BindingLayoutCache**: one layout object per logically identical description
- **RenderTarget**: attachments, render pass and framebuffers, `begin`/`end`
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod binding_layout_cache;
pub mod pipeline_layout;
pub mod presentation;
pub mod renderer;
pub mod render_target;

// Main flare namespace module
pub mod flare {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine instance and logger API
    pub use crate::engine::Engine;

    // Frame submission
    pub use crate::binding_layout_cache::BindingLayoutCache;
    pub use crate::presentation::{PresentationSurface, SurfaceState};
    pub use crate::renderer::{FrameOutcome, FrameRecorder, FrameStats, IndexedDraw, RenderCommand, Renderer};
    pub use crate::render_target::{ColorTargetDesc, DepthTargetDesc, RenderArea, RenderTarget, RenderTargetDesc};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Backend traits and descriptors
    pub mod render {
        pub use crate::graphics_device::*;
    }
}

// Re-export math library at crate root
pub use glam;
