/// Shader - Vulkan shader module with SPIR-V reflection

use flare_render::flare::{
    Result,
    render::{
        BindingSlotDesc, BindingType, PushConstantRange, ReflectedBinding, Shader as RenderShader,
        ShaderDesc, ShaderReflection, ShaderStage, ShaderStageFlags,
    },
};
use flare_render::{engine_bail, engine_bail_warn, engine_err};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, GpuContext};

/// Vulkan shader implementation
pub struct Shader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
    /// Entry point as passed to pipeline creation
    pub(crate) entry_point_c: CString,
    reflection: ShaderReflection,
}

impl Shader {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        if desc.code.len() % 4 != 0 {
            engine_bail_warn!(
                "flare::vulkan",
                "Shader code not 4-byte aligned (size: {} bytes)",
                desc.code.len()
            );
        }

        // Copies into u32 words, so the byte slice needs no alignment
        let code = ash::util::read_spv(&mut std::io::Cursor::new(desc.code))
            .map_err(|e| engine_err!("flare::vulkan", "Invalid SPIR-V: {}", e))?;

        let entry_point_c = CString::new(desc.entry_point.as_str())
            .map_err(|e| engine_err!("flare::vulkan", "Invalid entry point name: {}", e))?;

        let reflection = reflect_shader(&code, desc.stage)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create shader module"))?
        };

        Ok(Self {
            ctx,
            module,
            stage: desc.stage,
            entry_point: desc.entry_point.clone(),
            entry_point_c,
            reflection,
        })
    }
}

impl RenderShader for Shader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Downcast an engine shader to the Vulkan shader
pub(crate) fn as_vk_shader(shader: &dyn RenderShader) -> &Shader {
    unsafe { &*(shader as *const dyn RenderShader as *const Shader) }
}

/// Parse SPIR-V and extract resource bindings and push constant blocks
fn reflect_shader(code: &[u32], stage: ShaderStage) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("flare::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let stage_flags = stage.flags();
    let mut reflection = ShaderReflection::default();

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, nbind, .. } => {
                    let binding = ReflectedBinding {
                        set: desc_bind.set(),
                        slot: BindingSlotDesc {
                            binding: desc_bind.bind(),
                            binding_type: spirq_desc_type_to_binding_type(desc_ty)?,
                            // Runtime-sized arrays report 0
                            count: (*nbind).max(1),
                            stage_flags,
                        },
                        name: name.clone(),
                    };
                    // A separate image and sampler on one slot reflect twice
                    if !reflection
                        .bindings
                        .iter()
                        .any(|b| b.set == binding.set && b.slot.binding == binding.slot.binding)
                    {
                        reflection.bindings.push(binding);
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    if let Some(range) = push_constant_range(ty, stage_flags) {
                        if !reflection.push_constants.contains(&range) {
                            reflection.push_constants.push(range);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    reflection.bindings.sort_by_key(|b| (b.set, b.slot.binding));
    Ok(reflection)
}

fn spirq_desc_type_to_binding_type(desc_ty: &spirq::ty::DescriptorType) -> Result<BindingType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::UniformBuffer() => Ok(BindingType::UniformBuffer),
        DescriptorType::StorageBuffer(..) => Ok(BindingType::StorageBuffer),
        DescriptorType::CombinedImageSampler() => Ok(BindingType::CombinedImageSampler),
        DescriptorType::SampledImage() => Ok(BindingType::CombinedImageSampler),
        DescriptorType::Sampler() => Ok(BindingType::CombinedImageSampler),
        DescriptorType::StorageImage(..) => Ok(BindingType::StorageImage),
        other => {
            engine_bail!("flare::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

/// Byte range covered by a push constant block
///
/// Blocks shared between stages often start past offset 0; the range starts
/// at the first member so each stage declares only what it reads.
fn push_constant_range(ty: &spirq::ty::Type, stages: ShaderStageFlags) -> Option<PushConstantRange> {
    let total = ty.nbyte()? as u32;
    let offset = match ty {
        spirq::ty::Type::Struct(st) => st
            .members
            .iter()
            .filter_map(|m| m.offset)
            .min()
            .unwrap_or(0) as u32,
        _ => 0,
    };
    (total > offset).then(|| PushConstantRange {
        stages,
        offset,
        size: total - offset,
    })
}
