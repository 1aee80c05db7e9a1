/// Sampler trait and descriptor

use crate::graphics_device::CompareOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Sampler descriptor; equal descriptors share one backend sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: Filter,
    pub address_mode: AddressMode,
    /// Maximum anisotropy, 0 disables anisotropic filtering
    pub max_anisotropy: u32,
    /// Depth comparison for shadow sampling
    pub compare_op: Option<CompareOp>,
}

impl SamplerDesc {
    pub fn linear_repeat() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: Filter::Linear,
            address_mode: AddressMode::Repeat,
            max_anisotropy: 16,
            compare_op: None,
        }
    }

    pub fn linear_clamp() -> Self {
        Self {
            address_mode: AddressMode::ClampToEdge,
            ..Self::linear_repeat()
        }
    }

    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: Filter::Nearest,
            address_mode: AddressMode::ClampToEdge,
            max_anisotropy: 0,
            compare_op: None,
        }
    }

    /// Hardware PCF sampler for shadow maps
    pub fn shadow_compare() -> Self {
        Self {
            address_mode: AddressMode::ClampToBorder,
            max_anisotropy: 0,
            compare_op: Some(CompareOp::LessOrEqual),
            ..Self::linear_repeat()
        }
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::linear_repeat()
    }
}

/// GPU sampler
pub trait Sampler: Send + Sync {
    fn desc(&self) -> &SamplerDesc;
}
