/// Shader modules and reflection data

use crate::graphics_device::{BindingSlotDesc, PushConstantRange, ShaderStageFlags};

/// Pipeline stage of a shader module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn flags(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

/// Descriptor for creating a shader module
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    /// SPIR-V bytecode
    pub code: &'a [u8],
    pub stage: ShaderStage,
    pub entry_point: String,
}

/// A resource binding found in a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    /// Descriptor set index
    pub set: u32,
    pub slot: BindingSlotDesc,
    pub name: Option<String>,
}

/// Interface of a shader module as seen by the pipeline layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    pub push_constants: Vec<PushConstantRange>,
}

/// Compiled shader module
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;
    fn entry_point(&self) -> &str;
    fn reflection(&self) -> &ShaderReflection;
}
