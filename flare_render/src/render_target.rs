/// Render targets: attachment images, a render pass and one framebuffer per
/// instance
///
/// A target either owns its attachment images (offscreen passes such as
/// shadow maps) or wraps the presentable images of a surface, one instance
/// per image. `begin`/`end` enqueue the render pass bracket on the renderer.

use std::sync::Arc;

use glam::{IVec2, UVec2};

use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, ClearValue, Format, Framebuffer, GraphicsDevice, Image, ImageDesc,
    ImageLayout, ImageUsage, LoadOp, Rect2D, RenderPass, RenderPassDesc, SampleCount, StoreOp,
    Viewport,
};
use crate::presentation::PresentationSurface;
use crate::renderer::Renderer;
use crate::{engine_debug, engine_fatal};

/// One color attachment of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTargetDesc {
    pub format: Format,
    /// Layout the attachment is left in when the pass ends
    pub final_layout: ImageLayout,
}

/// Depth attachment of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTargetDesc {
    /// `None` picks the first depth format the device supports
    pub format: Option<Format>,
    pub final_layout: ImageLayout,
    pub store_op: StoreOp,
}

impl Default for DepthTargetDesc {
    fn default() -> Self {
        Self {
            format: None,
            final_layout: ImageLayout::DepthStencilAttachment,
            store_op: StoreOp::DontCare,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub samples: SampleCount,
    /// Ignored by surface targets, which render to the presentable image
    pub color_attachments: Vec<ColorTargetDesc>,
    pub depth: Option<DepthTargetDesc>,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Ignored by surface targets, which get one instance per image
    pub instance_count: usize,
}

impl RenderTargetDesc {
    /// Single-sample, single-instance target with no attachments yet
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: SampleCount::S1,
            color_attachments: Vec::new(),
            depth: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            instance_count: 1,
        }
    }

    pub fn with_color(mut self, format: Format, final_layout: ImageLayout) -> Self {
        self.color_attachments.push(ColorTargetDesc { format, final_layout });
        self
    }

    pub fn with_depth(mut self, depth: DepthTargetDesc) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Region of the target a pass renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderArea {
    pub offset: IVec2,
    /// `None` covers the target from `offset` to its far corner
    pub extent: Option<UVec2>,
}

impl RenderArea {
    pub fn full() -> Self {
        Self::default()
    }

    /// Concrete rectangle for a target of size `width` x `height`
    pub fn resolve(&self, width: u32, height: u32) -> Rect2D {
        let extent = self.extent.unwrap_or_else(|| {
            UVec2::new(
                width.saturating_sub(self.offset.x.max(0) as u32),
                height.saturating_sub(self.offset.y.max(0) as u32),
            )
        });
        Rect2D {
            x: self.offset.x,
            y: self.offset.y,
            width: extent.x,
            height: extent.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetSource {
    Owned,
    /// Wraps the presentable images of the surface generation it was built from
    Surface { generation: u64, format: Format },
}

struct TargetInstance {
    color: Vec<Arc<dyn Image>>,
    depth: Option<Arc<dyn Image>>,
    resolve: Option<Arc<dyn Image>>,
    framebuffer: Arc<dyn Framebuffer>,
}

pub struct RenderTarget {
    desc: RenderTargetDesc,
    source: TargetSource,
    depth_format: Option<Format>,
    render_pass: Arc<dyn RenderPass>,
    instances: Vec<TargetInstance>,
}

impl RenderTarget {
    /// Offscreen target owning `desc.instance_count` sets of attachment images
    pub fn new(device: &dyn GraphicsDevice, desc: RenderTargetDesc) -> Result<Self> {
        if desc.instance_count == 0 {
            engine_fatal!("flare::render_target", "Render target needs at least one instance");
        }
        if desc.color_attachments.is_empty() && desc.depth.is_none() {
            engine_fatal!("flare::render_target", "Render target has no attachments");
        }

        let depth_format = Self::resolve_depth_format(device, &desc)?;
        let pass_desc = Self::pass_desc(&desc, TargetSource::Owned, depth_format);
        let render_pass = device.create_render_pass(&pass_desc)?;

        let mut target = Self {
            desc,
            source: TargetSource::Owned,
            depth_format,
            render_pass,
            instances: Vec::new(),
        };
        target.build_owned_instances(device)?;
        Ok(target)
    }

    /// Target rendering to the surface's presentable images
    ///
    /// Size and instance count come from the surface; with `samples` above
    /// one, multisampled color images resolve into the presentable image.
    pub fn for_surface(
        device: &dyn GraphicsDevice,
        surface: &PresentationSurface,
        mut desc: RenderTargetDesc,
    ) -> Result<Self> {
        let (width, height) = surface.extent();
        desc.width = width;
        desc.height = height;
        desc.instance_count = surface.image_count();

        let source = TargetSource::Surface {
            generation: surface.generation(),
            format: surface.format(),
        };
        let depth_format = Self::resolve_depth_format(device, &desc)?;
        let pass_desc = Self::pass_desc(&desc, source, depth_format);
        let render_pass = device.create_render_pass(&pass_desc)?;

        let mut target = Self {
            desc,
            source,
            depth_format,
            render_pass,
            instances: Vec::new(),
        };
        target.build_surface_instances(device, &surface.images())?;
        Ok(target)
    }

    fn resolve_depth_format(device: &dyn GraphicsDevice, desc: &RenderTargetDesc) -> Result<Option<Format>> {
        match desc.depth {
            Some(DepthTargetDesc { format: Some(format), .. }) => {
                if !format.is_depth() {
                    engine_fatal!("flare::render_target", "{:?} is not a depth format", format);
                }
                Ok(Some(format))
            }
            Some(DepthTargetDesc { format: None, .. }) => device.supported_depth_format().map(Some),
            None => Ok(None),
        }
    }

    fn pass_desc(desc: &RenderTargetDesc, source: TargetSource, depth_format: Option<Format>) -> RenderPassDesc {
        let multisampled = desc.samples != SampleCount::S1;
        let color = |format: Format, final_layout: ImageLayout, store_op: StoreOp| AttachmentDesc {
            format,
            samples: desc.samples,
            load_op: desc.load_op,
            store_op,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: if desc.load_op == LoadOp::Load { final_layout } else { ImageLayout::Undefined },
            final_layout,
        };

        let (color_attachments, resolve_attachment) = match source {
            TargetSource::Owned => (
                desc.color_attachments
                    .iter()
                    .map(|attachment| color(attachment.format, attachment.final_layout, desc.store_op))
                    .collect(),
                None,
            ),
            TargetSource::Surface { format, .. } if multisampled => (
                vec![color(format, ImageLayout::ColorAttachment, StoreOp::DontCare)],
                Some(AttachmentDesc {
                    format,
                    samples: SampleCount::S1,
                    load_op: LoadOp::DontCare,
                    store_op: StoreOp::Store,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::Undefined,
                    final_layout: ImageLayout::PresentSrc,
                }),
            ),
            TargetSource::Surface { format, .. } => (
                vec![color(format, ImageLayout::PresentSrc, desc.store_op)],
                None,
            ),
        };

        let depth_attachment = depth_format.zip(desc.depth).map(|(format, depth)| AttachmentDesc {
            format,
            samples: desc.samples,
            load_op: LoadOp::Clear,
            store_op: depth.store_op,
            stencil_load_op: if format.has_stencil() { LoadOp::Clear } else { LoadOp::DontCare },
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: depth.final_layout,
        });

        RenderPassDesc {
            color_attachments,
            depth_attachment,
            resolve_attachment,
        }
    }

    fn create_attachment(
        device: &dyn GraphicsDevice,
        desc: &RenderTargetDesc,
        format: Format,
        usage: ImageUsage,
    ) -> Result<Arc<dyn Image>> {
        let mut image_desc = ImageDesc::new_2d(desc.width, desc.height, format, usage, 1);
        image_desc.samples = desc.samples;
        device.create_image(&image_desc)
    }

    fn create_depth(&self, device: &dyn GraphicsDevice) -> Result<Option<Arc<dyn Image>>> {
        self.depth_format
            .map(|format| {
                let mut usage = ImageUsage::DEPTH_STENCIL_ATTACHMENT;
                if self.source == TargetSource::Owned {
                    usage |= ImageUsage::SAMPLED;
                }
                Self::create_attachment(device, &self.desc, format, usage)
            })
            .transpose()
    }

    fn create_framebuffer(
        &self,
        device: &dyn GraphicsDevice,
        color: Vec<Arc<dyn Image>>,
        depth: Option<Arc<dyn Image>>,
        resolve: Option<Arc<dyn Image>>,
    ) -> Result<TargetInstance> {
        let attachments: Vec<Arc<dyn Image>> = color
            .iter()
            .chain(depth.iter())
            .chain(resolve.iter())
            .cloned()
            .collect();
        let framebuffer =
            device.create_framebuffer(&self.render_pass, &attachments, self.desc.width, self.desc.height)?;
        Ok(TargetInstance { color, depth, resolve, framebuffer })
    }

    fn build_owned_instances(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        let mut instances = Vec::with_capacity(self.desc.instance_count);
        for _ in 0..self.desc.instance_count {
            let color = self
                .desc
                .color_attachments
                .iter()
                .map(|attachment| {
                    Self::create_attachment(
                        device,
                        &self.desc,
                        attachment.format,
                        ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            let depth = self.create_depth(device)?;
            instances.push(self.create_framebuffer(device, color, depth, None)?);
        }
        self.instances = instances;

        engine_debug!(
            "flare::render_target",
            "Built {} offscreen instance(s) at {}x{}",
            self.instances.len(),
            self.desc.width,
            self.desc.height
        );
        Ok(())
    }

    fn build_surface_instances(&mut self, device: &dyn GraphicsDevice, images: &[Arc<dyn Image>]) -> Result<()> {
        let TargetSource::Surface { format, .. } = self.source else {
            return Ok(());
        };
        let multisampled = self.desc.samples != SampleCount::S1;

        let mut instances = Vec::with_capacity(images.len());
        for image in images {
            let (color, resolve) = if multisampled {
                let msaa = Self::create_attachment(device, &self.desc, format, ImageUsage::COLOR_ATTACHMENT)?;
                (vec![msaa], Some(Arc::clone(image)))
            } else {
                (vec![Arc::clone(image)], None)
            };
            let depth = self.create_depth(device)?;
            instances.push(self.create_framebuffer(device, color, depth, resolve)?);
        }
        self.instances = instances;

        engine_debug!(
            "flare::render_target",
            "Built {} surface instance(s) at {}x{}",
            self.instances.len(),
            self.desc.width,
            self.desc.height
        );
        Ok(())
    }

    // ===== RECORDING =====

    /// Enqueue the start of the render pass
    ///
    /// # Arguments
    ///
    /// * `renderer` - Renderer whose queue receives the command
    /// * `instance` - Framebuffer to render to; `None` selects the acquired
    ///   image for surface targets and instance 0 otherwise
    /// * `area` - Render area; viewport and scissor are set to it
    pub fn begin(&self, renderer: &mut Renderer, instance: Option<usize>, area: RenderArea) {
        if let Some(index) = instance {
            if index >= self.instances.len() {
                engine_fatal!(
                    "flare::render_target",
                    "Instance {} out of range ({} instances)",
                    index,
                    self.instances.len()
                );
            }
        }

        let follows_image = instance.is_none() && matches!(self.source, TargetSource::Surface { .. });
        let fixed = instance.unwrap_or(0);
        let framebuffers: Vec<Arc<dyn Framebuffer>> = self
            .instances
            .iter()
            .map(|instance| Arc::clone(&instance.framebuffer))
            .collect();
        let render_pass = Arc::clone(&self.render_pass);
        let clear_values = self.clear_values();
        let rect = area.resolve(self.desc.width, self.desc.height);

        renderer.submit(move |recorder, image_index| {
            let index = if follows_image { image_index as usize } else { fixed };
            let Some(framebuffer) = framebuffers.get(index) else {
                engine_fatal!(
                    "flare::render_target",
                    "Acquired image {} has no framebuffer ({} instances)",
                    index,
                    framebuffers.len()
                );
            };
            let command_list = recorder.command_list();
            command_list.begin_render_pass(&render_pass, framebuffer, rect, &clear_values)?;
            command_list.set_viewport(Viewport::from_rect(rect))?;
            command_list.set_scissor(rect)
        });
    }

    /// Enqueue the end of the render pass
    pub fn end(&self, renderer: &mut Renderer) {
        renderer.submit(|recorder, _| recorder.command_list().end_render_pass());
    }

    // ===== SIZE CHANGES =====

    /// Rebuild the owned attachments at a new size
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        if self.source != TargetSource::Owned {
            engine_fatal!(
                "flare::render_target",
                "Surface targets follow their surface; use sync_with_surface()"
            );
        }
        if (width, height) == (self.desc.width, self.desc.height) {
            return Ok(());
        }
        self.desc.width = width;
        self.desc.height = height;
        self.build_owned_instances(device)
    }

    /// Rebuild the framebuffers if the surface recreated its chain since this
    /// target was built; returns whether anything was rebuilt
    pub fn sync_with_surface(&mut self, device: &dyn GraphicsDevice, surface: &PresentationSurface) -> Result<bool> {
        let TargetSource::Surface { generation, format } = self.source else {
            return Ok(false);
        };
        if generation == surface.generation() {
            return Ok(false);
        }
        if format != surface.format() {
            engine_fatal!(
                "flare::render_target",
                "Surface format changed from {:?} to {:?}",
                format,
                surface.format()
            );
        }

        let (width, height) = surface.extent();
        self.desc.width = width;
        self.desc.height = height;
        self.desc.instance_count = surface.image_count();
        self.source = TargetSource::Surface { generation: surface.generation(), format };
        self.build_surface_instances(device, &surface.images())?;
        Ok(true)
    }

    // ===== ACCESSORS =====

    /// Clear values in attachment order: depth formats clear depth/stencil,
    /// everything else clears color
    pub fn clear_values(&self) -> Vec<ClearValue> {
        let pass = self.render_pass.desc();
        pass.color_attachments
            .iter()
            .chain(pass.depth_attachment.iter())
            .chain(pass.resolve_attachment.iter())
            .map(|attachment| {
                if attachment.format.is_depth() {
                    ClearValue::DepthStencil {
                        depth: self.desc.clear_depth,
                        stencil: self.desc.clear_stencil,
                    }
                } else {
                    ClearValue::Color(self.desc.clear_color)
                }
            })
            .collect()
    }

    /// Color view `index` of `instance`, for sampling in a later pass
    pub fn color_attachment(&self, instance: usize, index: usize) -> Option<&Arc<dyn Image>> {
        self.instances.get(instance)?.color.get(index)
    }

    pub fn depth_attachment(&self, instance: usize) -> Option<&Arc<dyn Image>> {
        self.instances.get(instance)?.depth.as_ref()
    }

    /// Presentable image a multisampled surface target resolves into
    pub fn resolve_attachment(&self, instance: usize) -> Option<&Arc<dyn Image>> {
        self.instances.get(instance)?.resolve.as_ref()
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn framebuffer(&self, instance: usize) -> Option<&Arc<dyn Framebuffer>> {
        self.instances.get(instance).map(|instance| &instance.framebuffer)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn depth_format(&self) -> Option<Format> {
        self.depth_format
    }

    pub fn desc(&self) -> &RenderTargetDesc {
        &self.desc
    }
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
