/// RenderPass and Framebuffer - Vulkan render pass objects
///
/// Render passes have a single subpass. Framebuffer attachments follow the
/// pass order: color attachments, then depth, then resolve.

use flare_render::flare::{
    Error,
    Result,
    render::{
        AttachmentDesc, Framebuffer as RenderFramebuffer, Image as RenderImage,
        RenderPass as RenderRenderPass, RenderPassDesc,
    },
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{format_to_vk, image_layout_to_vk, load_op_to_vk, sample_count_to_vk, store_op_to_vk};
use crate::vulkan_image::as_vk_image;

/// Vulkan render pass implementation
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

impl RenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        if desc.color_attachments.is_empty() && desc.depth_attachment.is_none() {
            return Err(Error::InvalidResource("Render pass has no attachments".to_string()));
        }
        if desc.resolve_attachment.is_some() && desc.color_attachments.is_empty() {
            return Err(Error::InvalidResource(
                "Resolve attachment needs a color attachment to resolve".to_string(),
            ));
        }

        let mut attachments: Vec<vk::AttachmentDescription> =
            desc.color_attachments.iter().map(attachment_to_vk).collect();

        let color_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len())
            .map(|i| {
                vk::AttachmentReference::default()
                    .attachment(i as u32)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            })
            .collect();

        let depth_ref = desc.depth_attachment.as_ref().map(|depth| {
            attachments.push(attachment_to_vk(depth));
            vk::AttachmentReference::default()
                .attachment(attachments.len() as u32 - 1)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        // Only the first color attachment resolves
        let resolve_refs: Vec<vk::AttachmentReference> = match &desc.resolve_attachment {
            Some(resolve) => {
                attachments.push(attachment_to_vk(resolve));
                let resolve_index = attachments.len() as u32 - 1;
                (0..desc.color_attachments.len())
                    .map(|i| {
                        vk::AttachmentReference::default()
                            .attachment(if i == 0 { resolve_index } else { vk::ATTACHMENT_UNUSED })
                            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if let Some(ref depth_ref) = depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let has_depth = depth_ref.is_some();
        let (stage_mask, access_mask) = if has_depth {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
        };

        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(stage_mask)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_stage_mask(stage_mask)
                .dst_access_mask(access_mask),
            // Attachments sampled by a later pass (offscreen targets, shadow maps)
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(stage_mask)
                .src_access_mask(access_mask)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ),
        ];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&render_pass_info, None)
                .map_err(|e| vk_error(e, "Failed to create render pass"))?
        };

        Ok(Self {
            ctx,
            render_pass,
            desc: desc.clone(),
        })
    }
}

fn attachment_to_vk(attachment: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format_to_vk(attachment.format))
        .samples(sample_count_to_vk(attachment.samples))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
        .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
        .initial_layout(image_layout_to_vk(attachment.initial_layout))
        .final_layout(image_layout_to_vk(attachment.final_layout))
}

impl RenderRenderPass for RenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Downcast an engine render pass to the Vulkan render pass
pub(crate) fn as_vk_render_pass(render_pass: &dyn RenderRenderPass) -> &RenderPass {
    unsafe { &*(render_pass as *const dyn RenderRenderPass as *const RenderPass) }
}

// ===== FRAMEBUFFER =====

/// Vulkan framebuffer implementation
///
/// Holds its attachments and render pass so neither is destroyed while the
/// framebuffer exists.
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    attachments: Vec<Arc<dyn RenderImage>>,
    _render_pass: Arc<dyn RenderRenderPass>,
}

impl Framebuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        render_pass: &Arc<dyn RenderRenderPass>,
        attachments: &[Arc<dyn RenderImage>],
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let expected = render_pass.desc().attachment_count();
        if attachments.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Framebuffer has {} attachments, render pass expects {}",
                attachments.len(),
                expected
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "Invalid framebuffer extent {}x{}",
                width, height
            )));
        }
        if let Some(small) = attachments.iter().find(|a| {
            let (w, h) = a.extent();
            w < width || h < height
        }) {
            return Err(Error::InvalidResource(format!(
                "Attachment {:?} smaller than framebuffer {}x{}",
                small.extent(),
                width,
                height
            )));
        }

        let views: Vec<vk::ImageView> = attachments.iter().map(|a| as_vk_image(a.as_ref()).view).collect();
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(as_vk_render_pass(render_pass.as_ref()).render_pass)
            .attachments(&views)
            .width(width)
            .height(height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(|e| vk_error(e, "Failed to create framebuffer"))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            width,
            height,
            attachments: attachments.to_vec(),
            _render_pass: Arc::clone(render_pass),
        })
    }
}

impl RenderFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachments(&self) -> &[Arc<dyn RenderImage>] {
        &self.attachments
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Downcast an engine framebuffer to the Vulkan framebuffer
pub(crate) fn as_vk_framebuffer(framebuffer: &dyn RenderFramebuffer) -> &Framebuffer {
    unsafe { &*(framebuffer as *const dyn RenderFramebuffer as *const Framebuffer) }
}
