/// Presentation surface state machine
///
/// Drives the swapchain through acquire, record, submit and present for one
/// frame slot at a time, and recreates the chain when the surface changes.
/// Out-of-date and suboptimal results are absorbed here and never surface as
/// errors.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    AcquireOutcome, CommandList, Format, Image, PresentOutcome, SwapchainBackend,
    MAX_FRAMES_IN_FLIGHT,
};
use crate::{engine_debug, engine_error, engine_fatal, engine_info, engine_warn};

/// Where the surface is in its per-frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Ready to start a frame
    Idle,
    /// Waiting for the slot fence or for an image
    AcquirePending,
    /// An image is acquired and commands are being recorded for it
    Recording,
    /// Submitted; present request issued
    Presenting,
    /// The chain no longer matches the surface and must be recreated
    Invalid,
}

pub struct PresentationSurface {
    backend: Box<dyn SwapchainBackend>,
    state: SurfaceState,
    current_slot: usize,
    acquired_image: Option<u32>,
    /// Slot whose fence last covered each presentable image
    images_in_flight: Vec<Option<usize>>,
    pending_extent: (u32, u32),
    resize_pending: bool,
    generation: u64,
}

impl PresentationSurface {
    /// Wrap a freshly created chain; `width`/`height` is the drawable size
    pub fn new(backend: Box<dyn SwapchainBackend>, width: u32, height: u32) -> Self {
        let image_count = backend.image_count();
        engine_info!(
            "flare::surface",
            "Presentation surface created: {} images, {}x{}, {:?}",
            image_count,
            backend.extent().0,
            backend.extent().1,
            backend.format()
        );
        Self {
            backend,
            state: SurfaceState::Idle,
            current_slot: 0,
            acquired_image: None,
            images_in_flight: vec![None; image_count],
            pending_extent: (width, height),
            resize_pending: false,
            generation: 0,
        }
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Frame slot the next (or current) frame records into
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn acquired_image(&self) -> Option<u32> {
        self.acquired_image
    }

    pub fn image_count(&self) -> usize {
        self.backend.image_count()
    }

    pub fn extent(&self) -> (u32, u32) {
        self.backend.extent()
    }

    pub fn format(&self) -> Format {
        self.backend.format()
    }

    /// Incremented each time the chain is recreated
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn images(&self) -> Vec<Arc<dyn Image>> {
        self.backend.images()
    }

    pub fn backend(&self) -> &dyn SwapchainBackend {
        self.backend.as_ref()
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.backend.wait_idle()
    }

    // ===== FRAME CYCLE =====

    /// Start a frame: wait for the slot, acquire an image, and make sure no
    /// other in-flight frame still renders to it
    ///
    /// Returns `Ok(None)` when this tick must be skipped (minimized window
    /// or a chain that had to be recreated). A tick that rebuilds the chain
    /// never acquires, so commands queued against the old extent are dropped
    /// and render targets can resync before the next recording.
    pub fn begin_frame(&mut self) -> Result<Option<u32>> {
        if self.state == SurfaceState::Recording {
            engine_fatal!("flare::surface", "begin_frame() while a frame is already recording");
        }

        if self.pending_extent.0 == 0 || self.pending_extent.1 == 0 {
            return Ok(None);
        }

        if self.state == SurfaceState::Invalid || self.resize_pending {
            self.invalidate()?;
            return Ok(None);
        }

        self.state = SurfaceState::AcquirePending;
        self.backend.in_flight_fence(self.current_slot).wait()?;

        let image_index = match self.backend.acquire_next_image(self.current_slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    engine_debug!("flare::surface", "Acquired suboptimal image {}", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                engine_warn!("flare::surface", "Swapchain out of date on acquire, recreating");
                self.state = SurfaceState::Invalid;
                self.invalidate()?;
                return Ok(None);
            }
        };

        if let Some(owner) = self.images_in_flight[image_index as usize] {
            if owner != self.current_slot {
                self.backend.in_flight_fence(owner).wait()?;
            }
        }

        self.acquired_image = Some(image_index);
        self.state = SurfaceState::Recording;
        Ok(Some(image_index))
    }

    /// Submit the recorded commands for the acquired image and present it
    ///
    /// A failed submit or present leaves the surface `Invalid`; the next
    /// `begin_frame()` waits for the device and rebuilds the chain, which
    /// also restores the slot fences.
    pub fn submit_and_present(&mut self, command_list: &dyn CommandList) -> Result<PresentOutcome> {
        let image_index = match (self.state, self.acquired_image) {
            (SurfaceState::Recording, Some(image_index)) => image_index,
            (state, _) => engine_fatal!(
                "flare::surface",
                "submit_and_present() in state {:?}, expected Recording",
                state
            ),
        };
        let slot = self.current_slot;

        if let Err(err) = self.submit_slot(slot, command_list) {
            engine_error!("flare::surface", "Submit failed for slot {}: {}", slot, err);
            self.acquired_image = None;
            self.state = SurfaceState::Invalid;
            return Err(err);
        }
        self.images_in_flight[image_index as usize] = Some(slot);

        self.state = SurfaceState::Presenting;
        let presented = self.backend.present(slot, image_index);

        self.acquired_image = None;
        self.current_slot = (slot + 1) % MAX_FRAMES_IN_FLIGHT;

        let outcome = match presented {
            Ok(outcome) => outcome,
            Err(err) => {
                engine_error!("flare::surface", "Present failed for image {}: {}", image_index, err);
                self.state = SurfaceState::Invalid;
                return Err(err);
            }
        };

        if outcome.needs_recreate() || self.resize_pending {
            if outcome.needs_recreate() {
                engine_debug!("flare::surface", "Present returned {:?}, recreating", outcome);
            }
            self.state = SurfaceState::Invalid;
            self.invalidate()?;
        } else {
            self.state = SurfaceState::Idle;
        }
        Ok(outcome)
    }

    fn submit_slot(&mut self, slot: usize, command_list: &dyn CommandList) -> Result<()> {
        self.backend.in_flight_fence(slot).reset()?;
        self.backend.submit(slot, command_list)
    }

    /// Abandon a frame whose recording failed
    ///
    /// The acquired image is not submitted; the chain is recreated on the
    /// next `begin_frame()` so the pending acquire is released with it.
    pub fn abort_frame(&mut self) {
        if self.state == SurfaceState::Recording {
            self.acquired_image = None;
            self.state = SurfaceState::Invalid;
        }
    }

    /// Recreate the chain at the pending drawable size
    ///
    /// Stays `Invalid` while the drawable has a zero extent.
    pub fn invalidate(&mut self) -> Result<()> {
        if self.state == SurfaceState::Recording {
            engine_fatal!("flare::surface", "Swapchain recreation requested while recording");
        }

        let (width, height) = self.pending_extent;
        if width == 0 || height == 0 {
            self.state = SurfaceState::Invalid;
            return Ok(());
        }

        self.backend.wait_idle()?;
        self.backend.recreate(width, height)?;

        self.images_in_flight = vec![None; self.backend.image_count()];
        self.acquired_image = None;
        self.resize_pending = false;
        self.generation += 1;
        self.state = SurfaceState::Idle;

        engine_info!(
            "flare::surface",
            "Swapchain recreated at {}x{} (generation {})",
            width,
            height,
            self.generation
        );
        Ok(())
    }

    /// Record a new drawable size; the chain is rebuilt at the next frame
    /// boundary, never in the middle of a recording
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_extent = (width, height);
        self.resize_pending = true;
    }
}

#[cfg(test)]
#[path = "presentation_tests.rs"]
mod tests;
