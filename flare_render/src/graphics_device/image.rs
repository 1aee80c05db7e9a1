/// Image trait, image and view descriptors
///
/// An `Image` handle is always a *view*. Every view created from the same
/// underlying image shares it through a reference count: the image and its
/// memory are released once, when the last view is dropped.

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::{Format, SampleCount};

bitflags! {
    /// How an image is used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// View dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewType {
    D2,
    D2Array,
    Cube,
}

/// Image aspect seen through a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    Color,
    Depth,
    DepthStencil,
}

impl ImageAspect {
    /// Natural aspect for a format
    pub fn for_format(format: Format) -> Self {
        if format.has_stencil() {
            ImageAspect::DepthStencil
        } else if format.is_depth() {
            ImageAspect::Depth
        } else {
            ImageAspect::Color
        }
    }
}

/// Sub-resource range and interpretation of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewDesc {
    pub view_type: ImageViewType,
    pub aspect: ImageAspect,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    /// Reinterpret the image with another compatible format
    pub format: Option<Format>,
}

impl ImageViewDesc {
    /// View covering every mip level and layer
    pub fn whole(format: Format, mip_levels: u32, array_layers: u32) -> Self {
        Self {
            view_type: if array_layers > 1 { ImageViewType::D2Array } else { ImageViewType::D2 },
            aspect: ImageAspect::for_format(format),
            base_mip_level: 0,
            mip_level_count: mip_levels,
            base_array_layer: 0,
            layer_count: array_layers,
            format: None,
        }
    }

    /// View of a single array layer (e.g. one shadow cascade)
    pub fn single_layer(&self, layer: u32) -> Self {
        Self {
            view_type: ImageViewType::D2,
            base_array_layer: layer,
            layer_count: 1,
            ..*self
        }
    }
}

/// Descriptor for creating an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub usage: ImageUsage,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
    pub cube_compatible: bool,
    /// View created together with the image
    pub view: ImageViewDesc,
}

impl ImageDesc {
    /// Single-layer, single-sample 2D image with a view over all of it
    pub fn new_2d(width: u32, height: u32, format: Format, usage: ImageUsage, mip_levels: u32) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            mip_levels,
            array_layers: 1,
            samples: SampleCount::S1,
            cube_compatible: false,
            view: ImageViewDesc::whole(format, mip_levels, 1),
        }
    }

    /// Extent of mip `level`, never below 1x1
    pub fn mip_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

/// Full mip chain length for an image of the given size
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// A view onto a GPU image
pub trait Image: Send + Sync {
    /// Descriptor of the underlying image
    fn desc(&self) -> &ImageDesc;

    /// Sub-resource range covered by this view
    fn view_desc(&self) -> &ImageViewDesc;

    /// Create another view of the same image
    fn create_view(&self, desc: &ImageViewDesc) -> Result<Arc<dyn Image>>;

    /// Number of live views sharing the underlying image
    fn shared_view_count(&self) -> usize;

    /// Format seen through this view
    fn view_format(&self) -> Format {
        self.view_desc().format.unwrap_or(self.desc().format)
    }

    /// Extent of the first mip level covered by this view
    fn extent(&self) -> (u32, u32) {
        self.desc().mip_extent(self.view_desc().base_mip_level)
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
