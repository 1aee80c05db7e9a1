/// Pixel and vertex attribute formats

/// Image and vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    // Color formats
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Depth / stencil formats
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,

    // Vertex attribute formats
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32_UINT,
}

/// Depth formats tried in order when picking a depth attachment format
pub const DEPTH_FORMAT_CANDIDATES: [Format; 3] = [
    Format::D24_UNORM_S8_UINT,
    Format::D32_SFLOAT_S8_UINT,
    Format::D32_SFLOAT,
];

impl Format {
    /// True for depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::D32_SFLOAT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// True when the format carries a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT)
    }

    /// Size of one texel (or one vertex attribute) in bytes
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            Format::R8G8B8A8_SRGB
            | Format::R8G8B8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::B8G8R8A8_UNORM => 4,
            Format::R16G16B16A16_SFLOAT => 8,
            Format::R32G32B32A32_SFLOAT => 16,
            Format::D16_UNORM => 2,
            Format::D32_SFLOAT | Format::D24_UNORM_S8_UINT => 4,
            Format::D32_SFLOAT_S8_UINT => 8,
            Format::R32_SFLOAT | Format::R32_UINT => 4,
            Format::R32G32_SFLOAT => 8,
            Format::R32G32B32_SFLOAT => 12,
        }
    }
}

/// First candidate accepted by `is_supported`, in candidate order
pub fn select_supported_format(
    candidates: &[Format],
    mut is_supported: impl FnMut(Format) -> bool,
) -> Option<Format> {
    candidates.iter().copied().find(|format| is_supported(*format))
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
