/// CommandList trait - records GPU commands for one frame slot

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    BindingSet, Buffer, Framebuffer, IndexType, Pipeline, RenderPass, ShaderStageFlags,
};

/// Command recorder
///
/// A command list is reset by `begin`. It keeps a strong reference to every
/// resource recorded into it until the next `begin`, so resources outlive the
/// GPU work that reads them as long as `begin` is only called once the
/// previous submission has completed.
pub trait CommandList: Send {
    /// Reset and start recording
    fn begin(&mut self) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;

    /// Discard whatever was recorded and release retained resources
    ///
    /// Used to abandon a frame whose recording failed part way through.
    fn reset(&mut self) -> Result<()>;

    /// Begin a render pass over `area` of the framebuffer
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind `sets` to consecutive set indices starting at `first_set`
    fn bind_binding_sets(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        first_set: u32,
        sets: &[Arc<dyn BindingSet>],
    ) -> Result<()>;

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `rect`
    pub fn from_rect(rect: Rect2D) -> Self {
        Self {
            x: rect.x as f32,
            y: rect.y as f32,
            width: rect.width as f32,
            height: rect.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}
