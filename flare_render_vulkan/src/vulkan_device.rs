/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Creates the instance, picks a physical device and queues, and acts as the
/// factory for every GPU resource. All resources share one `GpuContext`.

use flare_render::flare::{
    Error,
    Result,
    render::{
        select_supported_format, BindingLayout as RenderBindingLayout, BindingLayoutDesc,
        BindingSet as RenderBindingSet, Buffer as RenderBuffer, BufferDesc, BufferUsage,
        CommandList as RenderCommandList, ComputePipelineDesc, Config, Format,
        Framebuffer as RenderFramebuffer, GraphicsDevice, GraphicsPipelineDesc, Image as RenderImage,
        ImageDesc, ImageLayout, MemoryLocation, Pipeline as RenderPipeline, PipelineLayoutDesc,
        RenderPass as RenderRenderPass, RenderPassDesc, Sampler as RenderSampler, SamplerDesc,
        Shader as RenderShader, ShaderDesc, DEPTH_FORMAT_CANDIDATES,
    },
};
use flare_render::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_binding::{BindingLayout, BindingSet, DescriptorAllocator};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{DeviceLimits, GpuContext};
use crate::vulkan_format::format_to_vk;
use crate::vulkan_image::{as_vk_image, record_mip_chain, record_transition, Image};
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::{Framebuffer, RenderPass};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::Swapchain;

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    samplers: SamplerCache,
    descriptors: Arc<DescriptorAllocator>,
}

/// Objects created between the instance and the shared context
struct DeviceObjects {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    allocator: Allocator,
    graphics_queue_family: u32,
    present_queue_family: u32,
    upload_command_pool: vk::CommandPool,
    limits: DeviceLimits,
}

impl VulkanGraphicsDevice {
    /// Create the device for a window
    ///
    /// The window is only used to pick a queue family that can present to
    /// it; swapchains are created separately with `create_swapchain`.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let enable_validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        if config.enable_validation && !enable_validation {
            engine_warn!(
                "flare::vulkan",
                "Validation requested but the 'vulkan-validation' feature is disabled"
            );
        }

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("flare::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("flare::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("flare::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;

            let instance = create_instance(&entry, display_handle.as_raw(), config, enable_validation)?;

            let debug = if enable_validation {
                match crate::debug::create_messenger(&entry, &instance, config) {
                    Ok(debug) => Some(debug),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            // Surface used for present support queries only
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            );
            let objects = surface
                .map_err(|e| {
                    engine_error!("flare::vulkan", "Failed to create surface: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
                })
                .and_then(|surface| {
                    let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
                    let objects = create_device_objects(&instance, &surface_loader, surface);
                    surface_loader.destroy_surface(surface, None);
                    objects
                });

            let objects = match objects {
                Ok(objects) => objects,
                Err(e) => {
                    if let Some((loader, messenger)) = &debug {
                        loader.destroy_debug_utils_messenger(*messenger, None);
                    }
                    crate::debug::cleanup_debug_config();
                    instance.destroy_instance(None);
                    return Err(e);
                }
            };

            let graphics_queue = objects.device.get_device_queue(objects.graphics_queue_family, 0);
            let present_queue = objects.device.get_device_queue(objects.present_queue_family, 0);
            let (debug_utils_loader, debug_messenger) = match debug {
                Some((loader, messenger)) => (Some(loader), Some(messenger)),
                None => (None, None),
            };

            // GpuContext owns destruction from here on
            let ctx = Arc::new(GpuContext {
                entry,
                instance,
                physical_device: objects.physical_device,
                device: objects.device,
                allocator: ManuallyDrop::new(Mutex::new(objects.allocator)),
                graphics_queue,
                graphics_queue_family: objects.graphics_queue_family,
                present_queue,
                present_queue_family: objects.present_queue_family,
                queue_lock: Mutex::new(()),
                upload_command_pool: Mutex::new(objects.upload_command_pool),
                limits: objects.limits,
                debug_utils_loader,
                debug_messenger,
            });

            let descriptors = Arc::new(DescriptorAllocator::new(Arc::clone(&ctx))?);

            Ok(Self {
                samplers: SamplerCache::new(Arc::clone(&ctx)),
                descriptors,
                ctx,
            })
        }
    }

    /// Create a swapchain presenting to `window` at its current inner size
    pub fn create_swapchain(&self, window: &winit::window::Window, config: &Config) -> Result<Swapchain> {
        let display_handle = window.display_handle().map_err(|e| {
            engine_error!("flare::vulkan", "Failed to get display handle for swapchain: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!("flare::vulkan", "Failed to get window handle for swapchain: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;

        let surface = unsafe {
            ash_window::create_surface(
                &self.ctx.entry,
                &self.ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("flare::vulkan", "Failed to create surface for swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?
        };

        let size = window.inner_size();
        Swapchain::new(Arc::clone(&self.ctx), surface, size.width, size.height, config)
    }

    /// Number of distinct samplers created so far
    pub fn cached_sampler_count(&self) -> usize {
        self.samplers.len()
    }

    /// Descriptor pools allocated so far (grows when a pool is exhausted)
    pub fn descriptor_pool_count(&self) -> usize {
        self.descriptors.pool_count()
    }

    fn format_features(&self, format: Format) -> vk::FormatProperties {
        unsafe {
            self.ctx
                .instance
                .get_physical_device_format_properties(self.ctx.physical_device, format_to_vk(format))
        }
    }
}

// ===== CREATION HELPERS =====

unsafe fn create_instance(
    entry: &ash::Entry,
    display_handle: raw_window_handle::RawDisplayHandle,
    config: &Config,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(config.app_name.as_str())
        .map_err(|e| Error::InitializationFailed(format!("Invalid application name: {}", e)))?;
    let (major, minor, patch) = config.app_version;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, major, minor, patch))
        .engine_name(c"Flare")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let mut extension_names: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| {
            engine_error!("flare::vulkan", "Failed to get required extensions: {}", e);
            Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
        })?
        .to_vec();

    let layer_names: Vec<*const c_char> = if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layer_names)
        .enabled_extension_names(&extension_names);

    entry.create_instance(&create_info, None).map_err(|e| {
        engine_error!("flare::vulkan", "Failed to create Vulkan instance: {:?}", e);
        Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
    })
}

unsafe fn create_device_objects(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<DeviceObjects> {
    let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
        engine_error!("flare::vulkan", "Failed to enumerate physical devices: {:?}", e);
        Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    // Best-ranked device that can render, present and create swapchains
    let mut candidates: Vec<(u32, vk::PhysicalDevice, u32, u32)> = physical_devices
        .into_iter()
        .filter(|&physical_device| supports_swapchain(instance, physical_device))
        .filter_map(|physical_device| {
            let families = instance.get_physical_device_queue_family_properties(physical_device);
            let (graphics, present) = select_queue_families(&families, |index| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false)
            })?;
            let properties = instance.get_physical_device_properties(physical_device);
            Some((device_type_rank(properties.device_type), physical_device, graphics, present))
        })
        .collect();
    candidates.sort_by_key(|&(rank, ..)| std::cmp::Reverse(rank));

    let Some(&(_, physical_device, graphics_queue_family, present_queue_family)) = candidates.first() else {
        engine_error!("flare::vulkan", "No Vulkan GPU can render and present to this window");
        return Err(Error::InitializationFailed(
            "No Vulkan GPU can render and present to this window".to_string(),
        ));
    };

    let properties = instance.get_physical_device_properties(physical_device);
    let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy();
    engine_info!(
        "flare::vulkan",
        "Using GPU '{}' ({:?}), graphics family {}, present family {}",
        device_name,
        properties.device_type,
        graphics_queue_family,
        present_queue_family
    );

    // Queues
    let queue_priorities = [1.0];
    let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(&queue_priorities)];
    if present_queue_family != graphics_queue_family {
        queue_create_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(present_queue_family)
                .queue_priorities(&queue_priorities),
        );
    }

    // Optional features, enabled only when supported
    let supported = instance.get_physical_device_features(physical_device);
    let device_features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .depth_clamp(supported.depth_clamp == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);

    let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extension_names)
        .enabled_features(&device_features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(|e| {
            engine_error!("flare::vulkan", "Failed to create logical device: {:?}", e);
            Error::InitializationFailed(format!("Failed to create device: {:?}", e))
        })?;

    let allocator = match Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device: device.clone(),
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: Default::default(),
    }) {
        Ok(allocator) => allocator,
        Err(e) => {
            engine_error!("flare::vulkan", "Failed to create GPU allocator: {:?}", e);
            device.destroy_device(None);
            return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
        }
    };

    let upload_pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    let upload_command_pool = match device.create_command_pool(&upload_pool_info, None) {
        Ok(pool) => pool,
        Err(e) => {
            engine_error!("flare::vulkan", "Failed to create upload command pool: {:?}", e);
            drop(allocator);
            device.destroy_device(None);
            return Err(Error::InitializationFailed(format!(
                "Failed to create upload command pool: {:?}",
                e
            )));
        }
    };

    let limits = DeviceLimits {
        min_uniform_buffer_offset_alignment: properties.limits.min_uniform_buffer_offset_alignment,
        non_coherent_atom_size: properties.limits.non_coherent_atom_size,
        max_sampler_anisotropy: if supported.sampler_anisotropy == vk::TRUE {
            properties.limits.max_sampler_anisotropy
        } else {
            0.0
        },
    };

    Ok(DeviceObjects {
        physical_device,
        device,
        allocator,
        graphics_queue_family,
        present_queue_family,
        upload_command_pool,
        limits,
    })
}

unsafe fn supports_swapchain(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(physical_device)
        .map(|extensions| {
            extensions.iter().any(|ext| {
                CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::swapchain::NAME
            })
        })
        .unwrap_or(false)
}

/// Graphics and present queue families, preferring one family that does both
pub(crate) fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<(u32, u32)> {
    let graphics: Vec<u32> = families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(index, _)| index as u32)
        .collect();
    let present: Vec<u32> = (0..families.len() as u32)
        .filter(|&index| families[index as usize].queue_count > 0 && can_present(index))
        .collect();

    if let Some(&both) = graphics.iter().find(|index| present.contains(index)) {
        return Some((both, both));
    }
    Some((*graphics.first()?, *present.first()?))
}

/// Preference order between physical device types
pub(crate) fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

// ===== GRAPHICS DEVICE =====

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn RenderBuffer>> {
        Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn RenderImage>> {
        Ok(Arc::new(Image::new(Arc::clone(&self.ctx), desc)?))
    }

    fn upload_image(&self, image: &dyn RenderImage, data: &[u8]) -> Result<()> {
        let desc = *image.desc();
        let view = image.view_desc();
        let (width, height) = desc.mip_extent(0);
        let layer_size = width as u64 * height as u64 * desc.format.bytes_per_texel() as u64;
        let expected = layer_size * view.layer_count as u64;
        if (data.len() as u64) < expected {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes, image needs {}",
                data.len(),
                expected
            )));
        }

        let staging = Buffer::new(
            Arc::clone(&self.ctx),
            &BufferDesc::sized(expected, BufferUsage::TRANSFER_SRC, MemoryLocation::CpuToGpu),
        )?;
        staging.map()?;
        let written = staging.write(0, &data[..expected as usize]).and_then(|_| staging.flush());
        staging.unmap();
        written?;

        let vk_image = as_vk_image(image);
        let range = vk_image.subresource_range();
        let handle = vk_image.vk_image();
        let device = &self.ctx.device;

        self.ctx.submit_one_shot("image upload", |cmd| unsafe {
            record_transition(device, cmd, handle, range, ImageLayout::Undefined, ImageLayout::TransferDst)?;

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: range.aspect_mask,
                    mip_level: range.base_mip_level,
                    base_array_layer: range.base_array_layer,
                    layer_count: range.layer_count,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width, height, depth: 1 });

            device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                handle,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            if range.level_count > 1 {
                record_mip_chain(device, cmd, handle, &desc, range)
            } else {
                record_transition(
                    device,
                    cmd,
                    handle,
                    range,
                    ImageLayout::TransferDst,
                    ImageLayout::ShaderReadOnly,
                )
            }
        })?;

        engine_debug!(
            "flare::vulkan",
            "Uploaded {}x{} {:?} ({} layer(s), {} mip(s))",
            width,
            height,
            desc.format,
            range.layer_count,
            range.level_count
        );
        Ok(())
    }

    fn transition_image_layout(&self, image: &dyn RenderImage, old: ImageLayout, new: ImageLayout) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let vk_image = as_vk_image(image);
        let range = vk_image.subresource_range();
        let handle = vk_image.vk_image();
        let device = &self.ctx.device;

        self.ctx.submit_one_shot("layout transition", |cmd| unsafe {
            record_transition(device, cmd, handle, range, old, new)
        })
    }

    fn generate_mipmaps(&self, image: &dyn RenderImage) -> Result<()> {
        let desc = *image.desc();
        let features = self.format_features(desc.format);
        if !features
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            engine_bail!(
                "flare::vulkan",
                "Format {:?} does not support linear blitting for mipmaps",
                desc.format
            );
        }

        let vk_image = as_vk_image(image);
        let range = vk_image.subresource_range();
        let handle = vk_image.vk_image();
        let device = &self.ctx.device;

        self.ctx.submit_one_shot("mipmap generation", |cmd| unsafe {
            record_mip_chain(device, cmd, handle, &desc, range)
        })
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn RenderSampler>> {
        self.samplers.get(desc)
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn RenderShader>> {
        Ok(Arc::new(Shader::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn RenderBindingLayout>> {
        engine_debug!(
            "flare::vulkan",
            "Creating binding layout '{}' ({} slots)",
            desc.label.as_deref().unwrap_or("unnamed"),
            desc.entries.len()
        );
        Ok(Arc::new(BindingLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_binding_set(&self, layout: &Arc<dyn RenderBindingLayout>) -> Result<Arc<dyn RenderBindingSet>> {
        Ok(Arc::new(BindingSet::new(Arc::clone(&self.descriptors), layout)?))
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn RenderPipeline>> {
        Ok(Arc::new(Pipeline::new_graphics(Arc::clone(&self.ctx), desc, layout)?))
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn RenderPipeline>> {
        Ok(Arc::new(Pipeline::new_compute(Arc::clone(&self.ctx), desc, layout)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderRenderPass>> {
        Ok(Arc::new(RenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(
        &self,
        render_pass: &Arc<dyn RenderRenderPass>,
        attachments: &[Arc<dyn RenderImage>],
        width: u32,
        height: u32,
    ) -> Result<Arc<dyn RenderFramebuffer>> {
        Ok(Arc::new(Framebuffer::new(
            Arc::clone(&self.ctx),
            render_pass,
            attachments,
            width,
            height,
        )?))
    }

    fn create_command_list(&self) -> Result<Box<dyn RenderCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.ctx))?))
    }

    fn supported_depth_format(&self) -> Result<Format> {
        select_supported_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            self.format_features(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| Error::InitializationFailed("No supported depth format".to_string()))
    }

    fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.ctx.limits.min_uniform_buffer_offset_alignment
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        // Resources still alive keep the context; only drain the queue here
        if let Err(e) = self.ctx.wait_idle() {
            engine_error!("flare::vulkan", "wait_idle before device destruction failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_families_prefer_shared_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];

        // Family 0 cannot present, family 2 can do both
        let selected = select_queue_families(&families, |index| index != 0);
        assert_eq!(selected, Some((2, 2)));
    }

    #[test]
    fn test_queue_families_split_when_needed() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];

        let selected = select_queue_families(&families, |index| index == 1);
        assert_eq!(selected, Some((0, 1)));
    }

    #[test]
    fn test_queue_families_missing() {
        let families = [family(vk::QueueFlags::COMPUTE)];

        assert_eq!(select_queue_families(&families, |_| true), None);
        assert_eq!(select_queue_families(&[family(vk::QueueFlags::GRAPHICS)], |_| false), None);
    }

    #[test]
    fn test_discrete_gpu_ranked_first() {
        assert!(device_type_rank(vk::PhysicalDeviceType::DISCRETE_GPU)
            > device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU));
        assert!(device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
            > device_type_rank(vk::PhysicalDeviceType::CPU));
    }
}
