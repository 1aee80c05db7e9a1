/// Swapchain - Vulkan implementation of the SwapchainBackend trait
///
/// Owns the window surface, the presentable images and the per-slot
/// synchronization used by the presentation surface state machine.

use flare_render::flare::{
    Error,
    Result,
    render::{
        AcquireOutcome, CommandList as RenderCommandList, Config, Fence as RenderFence, Format,
        Image as RenderImage, ImageDesc, ImageUsage, PresentOutcome, SwapchainBackend,
        MAX_FRAMES_IN_FLIGHT,
    },
};
use flare_render::{engine_debug, engine_err, engine_error, engine_info};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_command_list::as_vk_command_list;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, format_from_vk,
};
use crate::vulkan_image::Image;

// ===== OWNED HANDLES =====

/// Window surface, destroyed after every swapchain built on it
pub(crate) struct SurfaceHandle {
    _ctx: Arc<GpuContext>,
    loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// VkSwapchainKHR shared with the presentable images it owns
///
/// A retired chain stays alive until the last of its images is dropped.
pub(crate) struct SwapchainHandle {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    _surface: Arc<SurfaceHandle>,
}

impl Drop for SwapchainHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

// ===== FENCE =====

/// Vulkan fence implementation
pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    fence: vk::Fence,
}

impl VulkanFence {
    fn new_signaled(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe {
            ctx.device
                .create_fence(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create in-flight fence"))?
        };
        Ok(Self { ctx, fence })
    }
}

impl RenderFence for VulkanFence {
    fn wait(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(|e| vk_error(e, "Failed to wait for fence"))
        }
    }

    fn reset(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[self.fence])
                .map_err(|e| vk_error(e, "Failed to reset fence"))
        }
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe {
            self.ctx
                .device
                .get_fence_status(self.fence)
                .map_err(|e| vk_error(e, "Failed to query fence status"))
        }
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

// ===== SWAPCHAIN =====

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    surface: Arc<SurfaceHandle>,
    loader: ash::khr::swapchain::Device,
    handle: Arc<SwapchainHandle>,

    surface_format: vk::SurfaceFormatKHR,
    format: Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<Arc<dyn RenderImage>>,

    /// One per frame slot, signaled by acquire
    image_available: Vec<vk::Semaphore>,
    /// One per swapchain image, signaled by submit and waited on by present
    render_finished: Vec<vk::Semaphore>,
    in_flight: Vec<VulkanFence>,
    /// Image acquired by each slot and not yet submitted
    acquired: [Option<u32>; MAX_FRAMES_IN_FLIGHT],
}

impl Swapchain {
    /// Build a chain on a freshly created surface, taking ownership of it
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        config: &Config,
    ) -> Result<Self> {
        let surface = Arc::new(SurfaceHandle {
            _ctx: Arc::clone(&ctx),
            loader: ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance),
            surface,
        });
        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let (surface_format, present_mode) = unsafe {
            let supported = surface
                .loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.present_queue_family, surface.surface)
                .map_err(|e| vk_error(e, "Failed to query surface support"))?;
            if !supported {
                engine_error!("flare::vulkan", "Present queue family cannot present to this surface");
                return Err(Error::InitializationFailed(
                    "Present queue family cannot present to this surface".to_string(),
                ));
            }

            let formats = surface
                .loader
                .get_physical_device_surface_formats(ctx.physical_device, surface.surface)
                .map_err(|e| {
                    engine_error!("flare::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;

            let present_modes = surface
                .loader
                .get_physical_device_surface_present_modes(ctx.physical_device, surface.surface)
                .map_err(|e| {
                    engine_error!("flare::vulkan", "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?;

            let surface_format = choose_surface_format(&formats).ok_or_else(|| {
                engine_error!("flare::vulkan", "No supported surface format among {:?}", formats);
                Error::InitializationFailed("No supported surface format".to_string())
            })?;

            (surface_format, choose_present_mode(config.present_mode, &present_modes))
        };

        let format = format_from_vk(surface_format.format).ok_or_else(|| {
            Error::InitializationFailed(format!("Unmapped surface format {:?}", surface_format.format))
        })?;

        let in_flight = signaled_fences(&ctx)?;

        let (handle, extent, vk_images) = create_chain(
            &ctx,
            &surface,
            &loader,
            surface_format,
            present_mode,
            vk::SwapchainKHR::null(),
            width,
            height,
        )?;

        let mut swapchain = Self {
            ctx,
            surface,
            loader,
            handle,
            surface_format,
            format,
            present_mode,
            extent,
            images: Vec::new(),
            image_available: Vec::new(),
            render_finished: Vec::new(),
            in_flight,
            acquired: [None; MAX_FRAMES_IN_FLIGHT],
        };
        swapchain.rebuild_images(&vk_images)?;
        swapchain.rebuild_semaphores(vk_images.len())?;

        engine_info!(
            "flare::vulkan",
            "Swapchain created: {}x{} {:?} {:?} ({} images)",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            vk_images.len()
        );
        Ok(swapchain)
    }

    /// Wrap the chain's VkImages as engine images
    fn rebuild_images(&mut self, vk_images: &[vk::Image]) -> Result<()> {
        let desc = ImageDesc::new_2d(
            self.extent.width,
            self.extent.height,
            self.format,
            ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST,
            1,
        );

        self.images = vk_images
            .iter()
            .map(|&image| {
                Image::from_swapchain(Arc::clone(&self.ctx), image, desc, Arc::clone(&self.handle))
                    .map(|image| Arc::new(image) as Arc<dyn RenderImage>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Replace every semaphore, which also drops any pending acquire signal
    fn rebuild_semaphores(&mut self, image_count: usize) -> Result<()> {
        self.destroy_semaphores();

        let create_info = vk::SemaphoreCreateInfo::default();
        unsafe {
            for _ in 0..MAX_FRAMES_IN_FLIGHT {
                let semaphore = self
                    .ctx
                    .device
                    .create_semaphore(&create_info, None)
                    .map_err(|e| vk_error(e, "Failed to create image-available semaphore"))?;
                self.image_available.push(semaphore);
            }
            for _ in 0..image_count {
                let semaphore = self
                    .ctx
                    .device
                    .create_semaphore(&create_info, None)
                    .map_err(|e| vk_error(e, "Failed to create render-finished semaphore"))?;
                self.render_finished.push(semaphore);
            }
        }
        Ok(())
    }

    fn destroy_semaphores(&mut self) {
        unsafe {
            for semaphore in self.image_available.drain(..).chain(self.render_finished.drain(..)) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= MAX_FRAMES_IN_FLIGHT {
            return Err(engine_err!(
                "flare::vulkan",
                "Frame slot {} out of range (max {})",
                slot,
                MAX_FRAMES_IN_FLIGHT
            ));
        }
        Ok(())
    }
}

/// Create a VkSwapchainKHR and fetch its images
#[allow(clippy::too_many_arguments)]
fn create_chain(
    ctx: &GpuContext,
    surface: &Arc<SurfaceHandle>,
    loader: &ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    old_swapchain: vk::SwapchainKHR,
    width: u32,
    height: u32,
) -> Result<(Arc<SwapchainHandle>, vk::Extent2D, Vec<vk::Image>)> {
    unsafe {
        let capabilities = surface
            .loader
            .get_physical_device_surface_capabilities(ctx.physical_device, surface.surface)
            .map_err(|e| {
                engine_error!("flare::vulkan", "Failed to get surface capabilities: {:?}", e);
                Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
            })?;

        let extent = choose_extent(&capabilities, width, height);
        let queue_families = [ctx.graphics_queue_family, ctx.present_queue_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if ctx.graphics_queue_family != ctx.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = loader.create_swapchain(&create_info, None).map_err(|e| {
            engine_error!("flare::vulkan", "Failed to create swapchain: {:?}", e);
            match e {
                vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
                _ => Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e)),
            }
        })?;

        let handle = Arc::new(SwapchainHandle {
            loader: loader.clone(),
            swapchain,
            _surface: Arc::clone(surface),
        });

        let images = loader
            .get_swapchain_images(swapchain)
            .map_err(|e| vk_error(e, "Failed to get swapchain images"))?;

        Ok((handle, extent, images))
    }
}

impl SwapchainBackend for Swapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn format(&self) -> Format {
        self.format
    }

    fn images(&self) -> Vec<Arc<dyn RenderImage>> {
        self.images.clone()
    }

    fn in_flight_fence(&self, slot: usize) -> &dyn RenderFence {
        &self.in_flight[slot % MAX_FRAMES_IN_FLIGHT]
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        self.check_slot(slot)?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.handle.swapchain,
                u64::MAX,
                self.image_available[slot],
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => {
                self.acquired[slot] = Some(image_index);
                Ok(AcquireOutcome::Acquired { image_index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("flare::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(vk_error(e, "Failed to acquire next swapchain image")),
        }
    }

    fn submit(&mut self, slot: usize, command_list: &dyn RenderCommandList) -> Result<()> {
        self.check_slot(slot)?;
        let Some(image_index) = self.acquired[slot].take() else {
            return Err(engine_err!("flare::vulkan", "Submit on slot {} without an acquired image", slot));
        };
        if command_list.is_recording() {
            return Err(engine_err!("flare::vulkan", "Submit of a command list that is still recording"));
        }

        let wait_semaphores = [self.image_available[slot]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[image_index as usize]];
        let command_buffers = [as_vk_command_list(command_list).command_buffer()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue = self.ctx.lock_queue()?;
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], self.in_flight[slot].fence)
                .map_err(|e| vk_error(e, "Failed to submit frame"))
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        self.check_slot(slot)?;
        let Some(&render_finished) = self.render_finished.get(image_index as usize) else {
            return Err(engine_err!(
                "flare::vulkan",
                "Present of image {} out of range (count: {})",
                image_index,
                self.render_finished.len()
            ));
        };

        let swapchains = [self.handle.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [render_finished];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let _queue = self.ctx.lock_queue()?;
            unsafe { self.loader.queue_present(self.ctx.present_queue, &present_info) }
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(vk_error(e, "Failed to present swapchain image")),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;

        // The old chain is retired by passing it as the hint; it is destroyed
        // once the images referencing it are released
        let (handle, extent, vk_images) = create_chain(
            &self.ctx,
            &self.surface,
            &self.loader,
            self.surface_format,
            self.present_mode,
            self.handle.swapchain,
            width,
            height,
        )?;

        self.images.clear();
        self.handle = handle;
        self.extent = extent;
        self.acquired = [None; MAX_FRAMES_IN_FLIGHT];
        self.rebuild_images(&vk_images)?;
        self.rebuild_semaphores(vk_images.len())?;
        // A slot fence reset for a submit that failed would never signal
        self.in_flight = signaled_fences(&self.ctx)?;

        engine_debug!(
            "flare::vulkan",
            "Swapchain recreated: {}x{} ({} images)",
            extent.width,
            extent.height,
            vk_images.len()
        );
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

fn signaled_fences(ctx: &Arc<GpuContext>) -> Result<Vec<VulkanFence>> {
    (0..MAX_FRAMES_IN_FLIGHT)
        .map(|_| VulkanFence::new_signaled(Arc::clone(ctx)))
        .collect()
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_error!("flare::vulkan", "wait_idle before swapchain destruction failed: {:?}", e);
        }
        self.destroy_semaphores();
    }
}
