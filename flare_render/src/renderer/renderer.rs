/// Renderer - deferred command queue drained once per frame
///
/// Application code enqueues closures all frame long with `submit()`.
/// `render_frame()` acquires a presentable image, replays the queue in
/// enqueue order into the frame slot's command list, submits, presents and
/// clears the queue.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    BindingSet, Buffer, CommandList, GraphicsDevice, Pipeline, PresentOutcome, ShaderStageFlags,
    MAX_FRAMES_IN_FLIGHT,
};
use crate::presentation::PresentationSurface;
use crate::renderer::{FrameRecorder, FrameStats};
use crate::{engine_debug, engine_error, engine_info};

/// Deferred render command, replayed with the acquired image index
pub type RenderCommand = Box<dyn FnOnce(&mut FrameRecorder<'_>, u32) -> Result<()> + Send>;

/// What `render_frame()` did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented
    Presented(PresentOutcome),
    /// The surface was not ready; nothing was recorded
    Skipped,
}

impl FrameOutcome {
    pub fn was_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented(_))
    }
}

/// One indexed draw with everything it needs bound first
///
/// Captured by value in the queued closure, so every referenced resource
/// stays alive until the frame is recorded.
#[derive(Clone)]
pub struct IndexedDraw {
    pub pipeline: Arc<dyn Pipeline>,
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    pub binding_sets: Vec<Arc<dyn BindingSet>>,
    pub first_set: u32,
    pub push_constants: Option<(ShaderStageFlags, u32, Vec<u8>)>,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}

pub struct Renderer {
    surface: PresentationSurface,
    command_lists: Vec<Box<dyn CommandList>>,
    queue: Vec<RenderCommand>,
    stats: FrameStats,
    /// Advanced once per application tick
    current_frame_index: usize,
    /// Advanced once per submitted frame
    render_frame_index: usize,
}

impl Renderer {
    /// Create one command list per frame slot
    ///
    /// # Arguments
    ///
    /// * `device` - Device the command lists are allocated from
    /// * `surface` - Presentation surface frames are rendered to
    /// * `queue_capacity_bytes` - Initial queue storage, in bytes of command handles
    pub fn new(
        device: &dyn GraphicsDevice,
        surface: PresentationSurface,
        queue_capacity_bytes: usize,
    ) -> Result<Self> {
        let command_lists = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| device.create_command_list())
            .collect::<Result<Vec<_>>>()?;
        let capacity = queue_capacity_bytes / std::mem::size_of::<RenderCommand>();

        engine_info!(
            "flare::renderer",
            "Renderer created: {} frame slots, command queue capacity {}",
            MAX_FRAMES_IN_FLIGHT,
            capacity
        );

        Ok(Self {
            surface,
            command_lists,
            queue: Vec::with_capacity(capacity),
            stats: FrameStats::default(),
            current_frame_index: 0,
            render_frame_index: 0,
        })
    }

    // ===== QUEUE =====

    /// Enqueue a command for the next rendered frame
    pub fn submit<F>(&mut self, command: F)
    where
        F: FnOnce(&mut FrameRecorder<'_>, u32) -> Result<()> + Send + 'static,
    {
        self.queue.push(Box::new(command));
    }

    pub fn queued_command_count(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue pipeline, buffer and set binds followed by an indexed draw
    pub fn submit_indexed_draw(&mut self, draw: IndexedDraw) {
        self.submit(move |recorder, _image_index| {
            recorder.bind_pipeline(&draw.pipeline)?;
            recorder.bind_vertex_and_index_buffers(&draw.vertex_buffer, &draw.index_buffer)?;
            if !draw.binding_sets.is_empty() {
                recorder.bind_binding_sets(&draw.pipeline, draw.first_set, &draw.binding_sets)?;
            }
            if let Some((stages, offset, data)) = &draw.push_constants {
                recorder.push_constants(&draw.pipeline, *stages, *offset, data)?;
            }
            recorder.draw_indexed(draw.index_count, 1, draw.first_index, draw.vertex_offset)
        });
    }

    // ===== FRAME =====

    /// Record, submit and present one frame
    ///
    /// The queue is empty afterwards whatever happened. A surface that is not
    /// ready (zero extent, out-of-date chain) yields `FrameOutcome::Skipped`.
    pub fn render_frame(&mut self) -> Result<FrameOutcome> {
        self.stats = FrameStats::default();
        let result = self.record_and_present();
        self.queue.clear();

        let outcome = result?;
        if outcome.was_presented() {
            self.render_frame_index = (self.render_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        }
        Ok(outcome)
    }

    /// Advance the logical tick, then render
    pub fn wait_and_render(&mut self) -> Result<FrameOutcome> {
        self.advance_frame();
        self.render_frame()
    }

    fn record_and_present(&mut self) -> Result<FrameOutcome> {
        let image_index = match self.surface.begin_frame()? {
            Some(image_index) => image_index,
            None => {
                engine_debug!(
                    "flare::renderer",
                    "Surface not ready, dropping {} queued commands",
                    self.queue.len()
                );
                return Ok(FrameOutcome::Skipped);
            }
        };

        let slot = self.surface.current_slot();
        let command_list = self.command_lists[slot].as_mut();

        if let Err(err) = Self::record(command_list, &mut self.queue, &mut self.stats, slot, image_index) {
            engine_error!("flare::renderer", "Frame recording failed: {}", err);
            self.surface.abort_frame();
            if let Err(reset_err) = command_list.reset() {
                engine_error!("flare::renderer", "Command list reset after failed recording: {}", reset_err);
            }
            return Err(err);
        }

        let outcome = self.surface.submit_and_present(command_list)?;
        Ok(FrameOutcome::Presented(outcome))
    }

    fn record(
        command_list: &mut dyn CommandList,
        queue: &mut Vec<RenderCommand>,
        stats: &mut FrameStats,
        slot: usize,
        image_index: u32,
    ) -> Result<()> {
        command_list.begin()?;
        {
            let mut recorder = FrameRecorder::new(&mut *command_list, stats, slot);
            for command in queue.drain(..) {
                command(&mut recorder, image_index)?;
            }
        }
        command_list.end()
    }

    // ===== FRAME INDICES =====

    /// Advance the logical tick counter
    pub fn advance_frame(&mut self) {
        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Logical index, advanced by `advance_frame()` even when frames are skipped
    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    /// Render index, advanced only when a frame is submitted
    pub fn render_frame_index(&self) -> usize {
        self.render_frame_index
    }

    // ===== ACCESSORS =====

    /// Stats of the last drained frame
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut PresentationSurface {
        &mut self.surface
    }

    /// Forward a drawable size change to the surface
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
