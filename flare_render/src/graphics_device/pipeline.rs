/// Pipeline state, pipeline layout and pipeline descriptors

use std::sync::Arc;
use crate::graphics_device::{
    BindingLayout, BindingLayoutDesc, Format, RenderPass, Shader, ShaderStageFlags,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Vertex buffer binding the attribute is read from
    pub binding: u32,
    pub format: Format,
    /// Byte offset inside one vertex
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Single interleaved per-vertex binding; offsets follow attribute order
    pub fn interleaved(formats: &[Format]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    binding: 0,
                    format: *format,
                    offset,
                };
                offset += format.bytes_per_texel();
                attribute
            })
            .collect();

        Self {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: offset,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes,
        }
    }
}

/// Push constant block visible to a set of stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

// ===== FIXED-FUNCTION STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

/// Comparison operator for depth tests and shadow samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Samples per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub slope_factor: f32,
    pub clamp: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    /// Shadow passes enable a bias against acne
    pub depth_bias: Option<DepthBias>,
    /// Clamp instead of clip fragments outside the depth range
    pub depth_clamp: bool,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_bias: None,
            depth_clamp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
        }
    }
}

/// Blend state applied to every color attachment of the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl ColorBlendState {
    /// Standard `src * a + dst * (1 - a)` blending
    pub fn alpha_blending() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultisampleState {
    pub sample_count: SampleCount,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            sample_count: SampleCount::S1,
            alpha_to_coverage: false,
        }
    }
}

// ===== PIPELINE LAYOUT =====

/// Resolved pipeline layout: one cached binding layout per set index
///
/// Holding the `Arc`s keeps the cached layouts referenced for as long as any
/// pipeline built on them is alive.
#[derive(Clone, Default)]
pub struct PipelineLayoutDesc {
    pub binding_layouts: Vec<Arc<dyn BindingLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl PipelineLayoutDesc {
    /// True when both layouts use the same cached layout objects
    pub fn shares_layouts_with(&self, other: &PipelineLayoutDesc) -> bool {
        self.binding_layouts.len() == other.binding_layouts.len()
            && self
                .binding_layouts
                .iter()
                .zip(&other.binding_layouts)
                .all(|(a, b)| Arc::ptr_eq(a, b))
            && self.push_constant_ranges == other.push_constant_ranges
    }
}

impl std::fmt::Debug for PipelineLayoutDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayoutDesc")
            .field("set_count", &self.binding_layouts.len())
            .field("push_constant_ranges", &self.push_constant_ranges)
            .finish()
    }
}

// ===== PIPELINE DESCRIPTORS =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Option<Arc<dyn Shader>>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
    pub multisample: MultisampleState,
    /// Render pass the pipeline is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    pub subpass: u32,
    /// Explicit set layouts; reflection is used when `None`
    pub binding_layouts: Option<Vec<BindingLayoutDesc>>,
    /// Explicit push constant ranges; reflection is used when `None`
    pub push_constant_ranges: Option<Vec<PushConstantRange>>,
}

impl GraphicsPipelineDesc {
    /// Defaults for every fixed-function field
    pub fn new(
        vertex_shader: Arc<dyn Shader>,
        fragment_shader: Option<Arc<dyn Shader>>,
        render_pass: Arc<dyn RenderPass>,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: ColorBlendState::default(),
            multisample: MultisampleState::default(),
            render_pass,
            subpass: 0,
            binding_layouts: None,
            push_constant_ranges: None,
        }
    }

    pub fn shaders(&self) -> Vec<&Arc<dyn Shader>> {
        std::iter::once(&self.vertex_shader)
            .chain(self.fragment_shader.as_ref())
            .collect()
    }
}

/// Descriptor for creating a compute pipeline
#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub shader: Arc<dyn Shader>,
    pub binding_layouts: Option<Vec<BindingLayoutDesc>>,
    pub push_constant_ranges: Option<Vec<PushConstantRange>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Compiled pipeline; destroyed when the last `Arc` drops
pub trait Pipeline: Send + Sync {
    fn bind_point(&self) -> PipelineBindPoint;
    fn layout(&self) -> &PipelineLayoutDesc;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
