//! Graphics device module - backend abstraction traits and descriptors

pub mod config;
pub mod format;
pub mod buffer;
pub mod image;
pub mod sampler;
pub mod shader;
pub mod binding;
pub mod pipeline;
pub mod render_pass;
pub mod command_list;
pub mod swapchain;

pub use config::*;
pub use format::*;
pub use buffer::*;
pub use image::*;
pub use sampler::*;
pub use shader::*;
pub use binding::*;
pub use pipeline::*;
pub use render_pass::*;
pub use command_list::*;
pub use swapchain::*;

use std::sync::Arc;
use crate::error::Result;

/// GPU resource factory implemented by each backend
///
/// Every resource is destroyed when its last handle is dropped.
pub trait GraphicsDevice: Send + Sync {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>>;

    /// Upload mip 0 through a staging buffer; the image ends in
    /// `ShaderReadOnly` with every mip level generated
    fn upload_image(&self, image: &dyn Image, data: &[u8]) -> Result<()>;

    /// One-shot synchronous layout transition of the view's range
    fn transition_image_layout(&self, image: &dyn Image, old: ImageLayout, new: ImageLayout) -> Result<()>;

    /// Blit mip 0 down the chain; expects every level in `TransferDst`
    fn generate_mipmaps(&self, image: &dyn Image) -> Result<()>;

    /// Equal descriptors return the same sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Uncached layout creation; go through `BindingLayoutCache` instead
    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    fn create_binding_set(&self, layout: &Arc<dyn BindingLayout>) -> Result<Arc<dyn BindingSet>>;

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn Pipeline>>;

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn Pipeline>>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    fn create_framebuffer(
        &self,
        render_pass: &Arc<dyn RenderPass>,
        attachments: &[Arc<dyn Image>],
        width: u32,
        height: u32,
    ) -> Result<Arc<dyn Framebuffer>>;

    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// First depth format from `DEPTH_FORMAT_CANDIDATES` usable as an attachment
    fn supported_depth_format(&self) -> Result<Format>;

    fn min_uniform_buffer_offset_alignment(&self) -> u64;

    fn wait_idle(&self) -> Result<()>;
}

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
