/// Presentation layer consumed by the presentation surface state machine

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{CommandList, Format, Image};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// CPU-waitable GPU completion signal
pub trait Fence: Send + Sync {
    /// Block until the fence is signaled
    fn wait(&self) -> Result<()>;

    /// Return the fence to the unsignaled state
    fn reset(&self) -> Result<()>;

    fn is_signaled(&self) -> Result<bool>;
}

/// Result of asking the presentation engine for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available; `suboptimal` means it still presents but the
    /// chain no longer matches the surface exactly
    Acquired { image_index: u32, suboptimal: bool },
    /// The chain no longer matches the surface and must be recreated
    OutOfDate,
}

/// Result of a present request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// True when the chain should be recreated before the next frame
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Chain of presentable images plus per-slot synchronization
///
/// Each frame slot in `[0, MAX_FRAMES_IN_FLIGHT)` owns an "image available"
/// signal, a "render finished" signal and an in-flight fence. Fences start
/// signaled so the first wait on every slot returns immediately.
pub trait SwapchainBackend: Send {
    fn image_count(&self) -> usize;

    fn extent(&self) -> (u32, u32);

    fn format(&self) -> Format;

    /// Presentable images as views, indexed by image index
    fn images(&self) -> Vec<Arc<dyn Image>>;

    fn in_flight_fence(&self, slot: usize) -> &dyn Fence;

    /// Acquire the next image, signaling the slot's "image available"
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Submit a recorded command list: waits on "image available",
    /// signals "render finished" and the slot's fence
    fn submit(&mut self, slot: usize, command_list: &dyn CommandList) -> Result<()>;

    /// Present `image_index` once the slot's "render finished" signals
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    /// Rebuild the chain at the given size, passing the old chain as a hint
    ///
    /// Every slot fence is signaled afterwards, including one that was reset
    /// for a submit that never reached the queue.
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Block until the device has no pending work
    fn wait_idle(&self) -> Result<()>;
}
