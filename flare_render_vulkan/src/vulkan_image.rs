/// Image - Vulkan implementation of the Image trait
///
/// Every `Image` is a view. Views of the same VkImage share one
/// `ImageResource`, which frees the memory when the last view drops.

use flare_render::flare::{
    Error,
    Result,
    render::{Image as RenderImage, ImageDesc, ImageLayout, ImageViewDesc, ImageViewType},
};
use flare_render::engine_err;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{
    aspect_to_vk, format_to_vk, image_layout_to_vk, image_usage_to_vk, layout_transition_masks,
    sample_count_to_vk, view_type_to_vk,
};
use crate::vulkan_swapchain::SwapchainHandle;

/// Who owns the VkImage memory
pub(crate) enum ImageOwner {
    /// Created by the device, freed with the resource
    Allocated(Option<Allocation>),
    /// Presentable image, destroyed with its swapchain
    Swapchain(Arc<SwapchainHandle>),
}

/// The VkImage shared by every view created from it
pub(crate) struct ImageResource {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    owner: ImageOwner,
    desc: ImageDesc,
}

impl Drop for ImageResource {
    fn drop(&mut self) {
        if let ImageOwner::Allocated(allocation) = &mut self.owner {
            if let Some(allocation) = allocation.take() {
                self.ctx.free(allocation);
            }
            unsafe {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}

/// Vulkan image view
pub struct Image {
    resource: Arc<ImageResource>,
    pub(crate) view: vk::ImageView,
    view_desc: ImageViewDesc,
}

impl Image {
    /// Create an image, bind device memory and create its default view
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(Error::InvalidResource(format!(
                "Invalid image extent {}x{} ({} mips, {} layers)",
                desc.width, desc.height, desc.mip_levels, desc.array_layers
            )));
        }
        if desc.cube_compatible && desc.array_layers % 6 != 0 {
            return Err(Error::InvalidResource(format!(
                "Cube-compatible image needs a multiple of 6 layers, got {}",
                desc.array_layers
            )));
        }

        unsafe {
            let flags = if desc.cube_compatible {
                vk::ImageCreateFlags::CUBE_COMPATIBLE
            } else {
                vk::ImageCreateFlags::empty()
            };

            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_levels)
                .array_layers(desc.array_layers)
                .samples(sample_count_to_vk(desc.samples))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| vk_error(e, "Failed to create image"))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate("image", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                ctx.free(allocation);
                ctx.device.destroy_image(image, None);
                return Err(vk_error(e, "Failed to bind image memory"));
            }

            // From here on the resource cleans up after itself
            let resource = Arc::new(ImageResource {
                ctx,
                image,
                owner: ImageOwner::Allocated(Some(allocation)),
                desc: *desc,
            });
            Self::with_view(resource, &desc.view)
        }
    }

    /// Wrap a presentable image owned by `swapchain`
    pub(crate) fn from_swapchain(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        desc: ImageDesc,
        swapchain: Arc<SwapchainHandle>,
    ) -> Result<Self> {
        let resource = Arc::new(ImageResource {
            ctx,
            image,
            owner: ImageOwner::Swapchain(swapchain),
            desc,
        });
        Self::with_view(resource, &desc.view)
    }

    /// New view over `resource`
    fn with_view(resource: Arc<ImageResource>, view_desc: &ImageViewDesc) -> Result<Self> {
        validate_view(&resource.desc, view_desc)?;

        let format = view_desc.format.unwrap_or(resource.desc.format);
        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(resource.image)
            .view_type(view_type_to_vk(view_desc.view_type))
            .format(format_to_vk(format))
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(subresource_range(view_desc));

        let view = unsafe {
            resource
                .ctx
                .device
                .create_image_view(&view_create_info, None)
                .map_err(|e| vk_error(e, "Failed to create image view"))?
        };

        Ok(Self {
            resource,
            view,
            view_desc: *view_desc,
        })
    }

    pub(crate) fn vk_image(&self) -> vk::Image {
        self.resource.image
    }

    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        subresource_range(&self.view_desc)
    }
}

impl RenderImage for Image {
    fn desc(&self) -> &ImageDesc {
        &self.resource.desc
    }

    fn view_desc(&self) -> &ImageViewDesc {
        &self.view_desc
    }

    fn create_view(&self, desc: &ImageViewDesc) -> Result<Arc<dyn RenderImage>> {
        Ok(Arc::new(Self::with_view(Arc::clone(&self.resource), desc)?))
    }

    fn shared_view_count(&self) -> usize {
        Arc::strong_count(&self.resource)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.resource.ctx.device.destroy_image_view(self.view, None);
        }
    }
}

/// Downcast an engine image to the Vulkan view
///
/// Every image handed to this backend was created by it.
pub(crate) fn as_vk_image(image: &dyn RenderImage) -> &Image {
    unsafe { &*(image as *const dyn RenderImage as *const Image) }
}

fn validate_view(desc: &ImageDesc, view: &ImageViewDesc) -> Result<()> {
    let mips_end = view.base_mip_level.checked_add(view.mip_level_count);
    let layers_end = view.base_array_layer.checked_add(view.layer_count);

    if view.mip_level_count == 0 || mips_end.map_or(true, |end| end > desc.mip_levels) {
        return Err(Error::InvalidResource(format!(
            "View mips {}..+{} outside image with {} levels",
            view.base_mip_level, view.mip_level_count, desc.mip_levels
        )));
    }
    if view.layer_count == 0 || layers_end.map_or(true, |end| end > desc.array_layers) {
        return Err(Error::InvalidResource(format!(
            "View layers {}..+{} outside image with {} layers",
            view.base_array_layer, view.layer_count, desc.array_layers
        )));
    }
    match view.view_type {
        ImageViewType::Cube if !desc.cube_compatible || view.layer_count != 6 => Err(Error::InvalidResource(
            "Cube view needs a cube-compatible image and exactly 6 layers".to_string(),
        )),
        ImageViewType::D2 if view.layer_count != 1 => Err(Error::InvalidResource(format!(
            "2D view covers {} layers, use D2Array",
            view.layer_count
        ))),
        _ => Ok(()),
    }
}

fn subresource_range(view: &ImageViewDesc) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_to_vk(view.aspect),
        base_mip_level: view.base_mip_level,
        level_count: view.mip_level_count,
        base_array_layer: view.base_array_layer,
        layer_count: view.layer_count,
    }
}

// ===== RECORDING HELPERS =====

/// Record a layout transition barrier over `range`
pub(crate) unsafe fn record_transition(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old: ImageLayout,
    new: ImageLayout,
) -> Result<()> {
    let masks = layout_transition_masks(old, new).ok_or_else(|| {
        engine_err!("flare::vulkan", "Unsupported layout transition {:?} -> {:?}", old, new)
    })?;

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(image_layout_to_vk(old))
        .new_layout(image_layout_to_vk(new))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);

    device.cmd_pipeline_barrier(
        command_buffer,
        masks.src_stage,
        masks.dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
    Ok(())
}

/// Blit each level of `range` from the one above it
///
/// Expects every level in TRANSFER_DST; leaves every level in SHADER_READ_ONLY.
pub(crate) unsafe fn record_mip_chain(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    desc: &ImageDesc,
    range: vk::ImageSubresourceRange,
) -> Result<()> {
    let first = range.base_mip_level;
    let last = first + range.level_count - 1;
    let level_range = |level: u32| vk::ImageSubresourceRange {
        base_mip_level: level,
        level_count: 1,
        ..range
    };
    let layers = |level: u32| vk::ImageSubresourceLayers {
        aspect_mask: range.aspect_mask,
        mip_level: level,
        base_array_layer: range.base_array_layer,
        layer_count: range.layer_count,
    };

    for level in (first + 1)..=last {
        let src = level - 1;
        record_transition(
            device,
            command_buffer,
            image,
            level_range(src),
            ImageLayout::TransferDst,
            ImageLayout::TransferSrc,
        )?;

        let (src_width, src_height) = desc.mip_extent(src);
        let (dst_width, dst_height) = desc.mip_extent(level);
        let blit = vk::ImageBlit::default()
            .src_subresource(layers(src))
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: src_width as i32, y: src_height as i32, z: 1 },
            ])
            .dst_subresource(layers(level))
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: dst_width as i32, y: dst_height as i32, z: 1 },
            ]);

        device.cmd_blit_image(
            command_buffer,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        record_transition(
            device,
            command_buffer,
            image,
            level_range(src),
            ImageLayout::TransferSrc,
            ImageLayout::ShaderReadOnly,
        )?;
    }

    // The last level was only ever written
    record_transition(
        device,
        command_buffer,
        image,
        level_range(last),
        ImageLayout::TransferDst,
        ImageLayout::ShaderReadOnly,
    )
}
