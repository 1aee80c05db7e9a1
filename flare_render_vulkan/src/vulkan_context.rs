/// GpuContext - Vulkan objects shared by every resource of one device
///
/// Every buffer, image, pipeline and swapchain holds an `Arc<GpuContext>`.
/// The device, the allocator and the instance are destroyed when the last of
/// them drops, so no resource can outlive the objects it was created from.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use flare_render::flare::{Error, Result};
use flare_render::{engine_debug, engine_err, engine_error};

/// Device limits read once at device creation
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u64,
    pub non_coherent_atom_size: u64,
    pub max_sampler_anisotropy: f32,
}

pub(crate) struct GpuContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped by hand before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,
    /// Serializes every vkQueueSubmit / vkQueuePresentKHR
    pub queue_lock: Mutex<()>,

    /// TRANSIENT + RESET_COMMAND_BUFFER pool for one-shot uploads
    pub upload_command_pool: Mutex<vk::CommandPool>,

    pub limits: DeviceLimits,

    pub debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    pub fn lock_queue(&self) -> Result<MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| Error::BackendError("Queue lock poisoned".to_string()))
    }

    /// Allocate device memory for a buffer or image
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("Allocator lock poisoned".to_string()))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(
                    "flare::vulkan",
                    "Out of GPU memory for '{}' ({:.2} MB): {:?}",
                    name,
                    size_mb,
                    e
                );
                Error::OutOfMemory
            })
    }

    /// Return an allocation; failures are only logged (called from Drop)
    pub fn free(&self, allocation: Allocation) {
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_error!("flare::vulkan", "Failed to free GPU allocation: {:?}", e);
                }
            }
            Err(_) => engine_error!("flare::vulkan", "Allocator lock poisoned, allocation leaked"),
        }
    }

    /// Record with `record`, submit on the graphics queue and block until done
    pub fn submit_one_shot<F>(&self, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| Error::BackendError("Upload command pool lock poisoned".to_string()))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to allocate command buffer for {}: {:?}", label, e))?[0];

            let result = self.record_and_wait(command_buffer, label, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait<F>(&self, command_buffer: vk::CommandBuffer, label: &str, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to begin command buffer for {}: {:?}", label, e))?;

        record(command_buffer)?;

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to end command buffer for {}: {:?}", label, e))?;

        let fence = self
            .device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("flare::vulkan", "Failed to create fence for {}: {:?}", label, e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let submitted = {
            let _queue = self.lock_queue()?;
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], fence)
                .map_err(|e| vk_error(e, &format!("Failed to submit {}", label)))
        };

        let waited = submitted.and_then(|_| {
            self.device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| vk_error(e, &format!("Failed to wait for {}", label)))
        });

        self.device.destroy_fence(fence, None);
        waited
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| vk_error(e, "Failed to wait for device idle"))
        }
    }
}

/// Map a Vulkan error to the engine error, logging it
pub(crate) fn vk_error(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => {
            engine_error!("flare::vulkan", "{}: device lost", context);
            Error::DeviceLost
        }
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!("flare::vulkan", "{}: {:?}", context, result);
            Error::OutOfMemory
        }
        other => engine_err!("flare::vulkan", "{}: {:?}", context, other),
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(mut pool) = self.upload_command_pool.lock() {
                if *pool != vk::CommandPool::null() {
                    self.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // Frees the remaining memory blocks; needs a live device
            ManuallyDrop::drop(&mut self.allocator);

            crate::debug::cleanup_debug_config();
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_debug!("flare::vulkan", "Vulkan device destroyed");
    }
}
