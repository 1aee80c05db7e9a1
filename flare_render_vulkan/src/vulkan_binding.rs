/// Binding layouts and binding sets - descriptor set layouts and sets
///
/// Sets are allocated from a growing list of descriptor pools shared by
/// the device. Each set is freed back to its pool when dropped.

use flare_render::flare::{
    Error,
    Result,
    render::{
        BindingLayout as RenderBindingLayout, BindingLayoutDesc, BindingSet as RenderBindingSet,
        BindingWrite, BindingWriteQueue,
    },
};
use flare_render::{engine_err, engine_error, engine_info};
use ash::vk;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::as_vk_buffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{binding_type_to_vk, image_layout_to_vk, stage_flags_to_vk};
use crate::vulkan_image::as_vk_image;
use crate::vulkan_sampler::as_vk_sampler;

// ===== BINDING LAYOUT =====

/// Vulkan descriptor set layout
pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    desc: BindingLayoutDesc,
}

impl BindingLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BindingLayoutDesc) -> Result<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .entries
            .iter()
            .map(|slot| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(slot.binding)
                    .descriptor_type(binding_type_to_vk(slot.binding_type))
                    .descriptor_count(slot.count)
                    .stage_flags(stage_flags_to_vk(slot.stage_flags))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create descriptor set layout"))?
        };

        Ok(Self {
            ctx,
            layout,
            desc: desc.clone(),
        })
    }
}

impl RenderBindingLayout for BindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Downcast an engine binding layout to the Vulkan layout
pub(crate) fn as_vk_layout(layout: &dyn RenderBindingLayout) -> &BindingLayout {
    unsafe { &*(layout as *const dyn RenderBindingLayout as *const BindingLayout) }
}

// ===== DESCRIPTOR ALLOCATOR =====

const POOL_MAX_SETS: u32 = 1024;

/// Growing list of descriptor pools
pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = create_descriptor_pool(&ctx.device)?;
        Ok(Self {
            ctx,
            pools: Mutex::new(vec![pool]),
        })
    }

    /// Allocate one set, adding a pool when the current one is exhausted
    fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let mut pools = self
            .pools
            .lock()
            .map_err(|_| Error::BackendError("Descriptor pool lock poisoned".to_string()))?;
        let layouts = [layout];

        unsafe {
            if let Some(&current_pool) = pools.last() {
                let allocate_info = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(current_pool)
                    .set_layouts(&layouts);

                match self.ctx.device.allocate_descriptor_sets(&allocate_info) {
                    Ok(sets) => return Ok((current_pool, sets[0])),
                    Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                    Err(e) => return Err(vk_error(e, "Failed to allocate descriptor set")),
                }
            }

            let new_pool = create_descriptor_pool(&self.ctx.device)?;
            pools.push(new_pool);
            engine_info!(
                "flare::vulkan",
                "Descriptor pool exhausted, created new pool (total: {})",
                pools.len()
            );

            let retry_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(new_pool)
                .set_layouts(&layouts);
            let sets = self
                .ctx
                .device
                .allocate_descriptor_sets(&retry_info)
                .map_err(|e| engine_err!("flare::vulkan", "Failed to allocate descriptor set after pool growth: {:?}", e))?;
            Ok((new_pool, sets[0]))
        }
    }

    fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        // Pools are only destroyed with the allocator, so the lock just orders frees
        let _pools = self.pools.lock();
        unsafe {
            if let Err(e) = self.ctx.device.free_descriptor_sets(pool, &[set]) {
                engine_error!("flare::vulkan", "Failed to free descriptor set: {:?}", e);
            }
        }
    }

    pub(crate) fn pool_count(&self) -> usize {
        self.pools.lock().map(|pools| pools.len()).unwrap_or(0)
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        if let Ok(mut pools) = self.pools.lock() {
            for pool in pools.drain(..) {
                unsafe {
                    self.ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
        }
    }
}

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 2048,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1024,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 1024,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_IMAGE,
            descriptor_count: 256,
        },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .pool_sizes(&pool_sizes)
        .max_sets(POOL_MAX_SETS);

    unsafe {
        device.create_descriptor_pool(&info, None).map_err(|e| {
            engine_error!("flare::vulkan", "Failed to create descriptor pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
        })
    }
}

// ===== BINDING SET =====

/// Vulkan descriptor set
pub struct BindingSet {
    allocator: Arc<DescriptorAllocator>,
    layout: Arc<dyn RenderBindingLayout>,
    pool: vk::DescriptorPool,
    pub(crate) descriptor_set: vk::DescriptorSet,
    queue: BindingWriteQueue,
}

impl BindingSet {
    pub(crate) fn new(allocator: Arc<DescriptorAllocator>, layout: &Arc<dyn RenderBindingLayout>) -> Result<Self> {
        let vk_layout = as_vk_layout(layout.as_ref()).layout;
        let (pool, descriptor_set) = allocator.allocate(vk_layout)?;

        Ok(Self {
            allocator,
            layout: Arc::clone(layout),
            pool,
            descriptor_set,
            queue: BindingWriteQueue::new(layout.desc()),
        })
    }

    fn descriptor_type(&self, binding: u32) -> Result<vk::DescriptorType> {
        self.layout
            .desc()
            .slot(binding)
            .map(|slot| binding_type_to_vk(slot.binding_type))
            .ok_or_else(|| engine_err!("flare::vulkan", "Binding {} missing from layout", binding))
    }
}

impl RenderBindingSet for BindingSet {
    fn layout(&self) -> &Arc<dyn RenderBindingLayout> {
        &self.layout
    }

    fn write(&self, write: BindingWrite) -> Result<()> {
        self.queue.push(write)
    }

    fn commit(&self) -> Result<()> {
        let pending = self.queue.take_pending()?;
        if pending.is_empty() {
            return Ok(());
        }

        // Info arrays must be complete before writes point into them
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for write in &pending {
            match write {
                BindingWrite::Buffer { buffer, offset, range, .. } => {
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(as_vk_buffer(buffer.as_ref()).buffer)
                            .offset(*offset)
                            .range(range.unwrap_or(vk::WHOLE_SIZE)),
                    );
                }
                BindingWrite::Image { image, sampler, layout, .. } => {
                    let mut info = vk::DescriptorImageInfo::default()
                        .image_view(as_vk_image(image.as_ref()).view)
                        .image_layout(image_layout_to_vk(*layout));
                    if let Some(sampler) = sampler {
                        info = info.sampler(as_vk_sampler(sampler.as_ref()).sampler);
                    }
                    image_infos.push(info);
                }
            }
        }

        let mut writes = Vec::with_capacity(pending.len());
        let (mut buffer_index, mut image_index) = (0, 0);
        for write in &pending {
            let descriptor_write = vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_set)
                .dst_binding(write.binding())
                .dst_array_element(write.array_element())
                .descriptor_type(self.descriptor_type(write.binding())?);

            writes.push(match write {
                BindingWrite::Buffer { .. } => {
                    buffer_index += 1;
                    descriptor_write.buffer_info(std::slice::from_ref(&buffer_infos[buffer_index - 1]))
                }
                BindingWrite::Image { .. } => {
                    image_index += 1;
                    descriptor_write.image_info(std::slice::from_ref(&image_infos[image_index - 1]))
                }
            });
        }

        unsafe {
            self.allocator.ctx.device.update_descriptor_sets(&writes, &[]);
        }
        self.queue.retain(pending)
    }

    fn pending_write_count(&self) -> usize {
        self.queue.pending_count()
    }
}

impl Drop for BindingSet {
    fn drop(&mut self) {
        self.allocator.free(self.pool, self.descriptor_set);
    }
}

/// Downcast an engine binding set to the Vulkan set
pub(crate) fn as_vk_binding_set(set: &dyn RenderBindingSet) -> &BindingSet {
    unsafe { &*(set as *const dyn RenderBindingSet as *const BindingSet) }
}
