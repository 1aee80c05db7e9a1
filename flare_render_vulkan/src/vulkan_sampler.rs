/// SamplerCache - VkSampler deduplication for the Vulkan backend
///
/// Equal `SamplerDesc`s share one VkSampler. Typical renderers only need a
/// handful, so entries are kept until the device drops.

use flare_render::flare::{
    Result,
    render::{Sampler as RenderSampler, SamplerDesc},
};
use flare_render::engine_debug;
use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{address_mode_to_vk, compare_op_to_vk, filter_to_vk, mipmap_mode_to_vk};

/// Vulkan sampler
pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl RenderSampler for Sampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Downcast an engine sampler to the Vulkan sampler
pub(crate) fn as_vk_sampler(sampler: &dyn RenderSampler) -> &Sampler {
    unsafe { &*(sampler as *const dyn RenderSampler as *const Sampler) }
}

pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    cache: Mutex<FxHashMap<SamplerDesc, Arc<dyn RenderSampler>>>,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Get or create the sampler for `desc`
    pub(crate) fn get(&self, desc: &SamplerDesc) -> Result<Arc<dyn RenderSampler>> {
        let mut cache = self.cache.lock().map_err(|_| {
            flare_render::flare::Error::BackendError("Sampler cache lock poisoned".to_string())
        })?;

        if let Some(sampler) = cache.get(desc) {
            return Ok(Arc::clone(sampler));
        }

        let sampler: Arc<dyn RenderSampler> = Arc::new(Sampler {
            ctx: Arc::clone(&self.ctx),
            sampler: self.create_vk_sampler(desc)?,
            desc: *desc,
        });
        cache.insert(*desc, Arc::clone(&sampler));
        engine_debug!("flare::vulkan", "Sampler created ({} cached): {:?}", cache.len(), desc);
        Ok(sampler)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn create_vk_sampler(&self, desc: &SamplerDesc) -> Result<vk::Sampler> {
        let address = address_mode_to_vk(desc.address_mode);
        // Shadow maps sample outside the cascade as "lit"
        let border = if desc.compare_op.is_some() {
            vk::BorderColor::FLOAT_OPAQUE_WHITE
        } else {
            vk::BorderColor::FLOAT_OPAQUE_BLACK
        };

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode))
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(border)
            .unnormalized_coordinates(false);

        create_info = match desc.compare_op {
            Some(op) => create_info.compare_enable(true).compare_op(compare_op_to_vk(op)),
            None => create_info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
        };

        let anisotropy = clamp_anisotropy(desc.max_anisotropy, self.ctx.limits.max_sampler_anisotropy);
        create_info = match anisotropy {
            Some(max) => create_info.anisotropy_enable(true).max_anisotropy(max),
            None => create_info.anisotropy_enable(false).max_anisotropy(1.0),
        };

        unsafe {
            self.ctx
                .device
                .create_sampler(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create sampler"))
        }
    }
}

/// Requested anisotropy clamped to the device limit; `None` disables it
pub(crate) fn clamp_anisotropy(requested: u32, device_max: f32) -> Option<f32> {
    if requested <= 1 || device_max < 1.0 {
        None
    } else {
        Some((requested as f32).min(device_max))
    }
}
