/// Render pass and framebuffer objects
///
/// A render pass fixes how each attachment is loaded, stored and
/// transitioned; a framebuffer binds concrete image views to those
/// attachments.

use std::sync::Arc;
use crate::graphics_device::{Format, Image, ImageLayout, SampleCount};

/// What happens to an attachment's content when the pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// What happens to an attachment's content when the pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// One attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: Format,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Cleared on load, stored, then left in `final_layout`
    pub fn cleared(format: Format, samples: SampleCount, final_layout: ImageLayout) -> Self {
        Self {
            format,
            samples,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: if format.has_stencil() { LoadOp::Clear } else { LoadOp::DontCare },
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout,
        }
    }
}

/// Descriptor for creating a render pass with a single subpass
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
    /// Single-sample target the first color attachment resolves into
    pub resolve_attachment: Option<AttachmentDesc>,
}

impl RenderPassDesc {
    /// Number of framebuffer attachments the pass expects
    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len()
            + self.depth_attachment.is_some() as usize
            + self.resolve_attachment.is_some() as usize
    }
}

pub trait RenderPass: Send + Sync {
    fn desc(&self) -> &RenderPassDesc;
}

/// Image views bound to a render pass's attachments
///
/// Attachment order: color attachments, then depth, then resolve.
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn attachments(&self) -> &[Arc<dyn Image>];
}
