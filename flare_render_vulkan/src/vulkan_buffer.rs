/// Buffer - Vulkan implementation of the Buffer trait

use flare_render::flare::{
    Result,
    Error,
    render::{validate_write, Buffer as RenderBuffer, BufferDesc},
};
use flare_render::{engine_err, engine_fatal};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{buffer_usage_to_vk, memory_location_to_gpu};

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation (taken on drop)
    allocation: Option<Allocation>,
    desc: BufferDesc,
    mapped: AtomicBool,
    /// Host writes are visible without an explicit flush
    coherent: bool,
}

impl Buffer {
    /// Create the buffer and bind freshly allocated memory to it
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        let size = desc.effective_size();
        if size == 0 {
            return Err(engine_err!("flare::vulkan", "Cannot create a zero-sized buffer"));
        }

        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| vk_error(e, "Failed to create buffer"))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate("buffer", requirements, memory_location_to_gpu(desc.memory), true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                ctx.free(allocation);
                ctx.device.destroy_buffer(buffer, None);
                return Err(vk_error(e, "Failed to bind buffer memory"));
            }

            let coherent = allocation
                .memory_properties()
                .contains(vk::MemoryPropertyFlags::HOST_COHERENT);

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                desc: *desc,
                mapped: AtomicBool::new(false),
                coherent,
            })
        }
    }

    fn mapped_ptr(&self) -> Result<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| Error::InvalidResource("Buffer is not CPU-accessible".to_string()))
    }

    /// Flush `[offset, offset + size)`, widened to the non-coherent atom size
    fn flush_range(&self, offset: u64, size: u64) -> Result<()> {
        if self.coherent {
            return Ok(());
        }
        let Some(allocation) = &self.allocation else {
            return Ok(());
        };

        let atom = self.ctx.limits.non_coherent_atom_size.max(1);
        let start = allocation.offset() + offset;
        let aligned_start = start / atom * atom;
        let aligned_end = (start + size).div_ceil(atom) * atom;
        let allocation_end = allocation.offset() + allocation.size();
        let flush_size = if aligned_end > allocation_end {
            vk::WHOLE_SIZE
        } else {
            aligned_end - aligned_start
        };

        unsafe {
            let range = vk::MappedMemoryRange::default()
                .memory(allocation.memory())
                .offset(aligned_start)
                .size(flush_size);
            self.ctx
                .device
                .flush_mapped_memory_ranges(&[range])
                .map_err(|e| vk_error(e, "Failed to flush buffer memory"))
        }
    }
}

impl RenderBuffer for Buffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn map(&self) -> Result<()> {
        if !self.desc.memory.is_host_visible() {
            return Err(Error::InvalidResource(
                "GpuOnly buffers cannot be mapped".to_string(),
            ));
        }
        // gpu-allocator keeps host-visible memory persistently mapped
        self.mapped_ptr()?;
        if self.mapped.swap(true, Ordering::AcqRel) {
            engine_fatal!("flare::vulkan", "Buffer is already mapped");
        }
        Ok(())
    }

    fn unmap(&self) {
        if !self.mapped.swap(false, Ordering::AcqRel) {
            engine_fatal!("flare::vulkan", "Buffer is not mapped");
        }
    }

    fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        validate_write(&self.desc, self.is_mapped(), offset, data.len());
        let ptr = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flush_range(0, self.desc.effective_size())
    }

    fn flush_index(&self, index: u32) -> Result<()> {
        flare_render::flare::render::validate_index(&self.desc, index);
        let stride = self.desc.aligned_instance_size();
        self.flush_range(index as u64 * stride, stride)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Downcast an engine buffer to the Vulkan buffer
pub(crate) fn as_vk_buffer(buffer: &dyn RenderBuffer) -> &Buffer {
    unsafe { &*(buffer as *const dyn RenderBuffer as *const Buffer) }
}
