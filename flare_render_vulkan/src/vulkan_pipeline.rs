/// Pipeline - Vulkan graphics and compute pipelines

use flare_render::flare::{
    Result,
    render::{
        ComputePipelineDesc, GraphicsPipelineDesc, Pipeline as RenderPipeline, PipelineBindPoint,
        PipelineLayoutDesc, RenderPass as _, Shader as _, ShaderStage,
    },
};
use flare_render::{engine_bail, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_binding::as_vk_layout;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, compare_op_to_vk, cull_mode_to_vk, format_to_vk,
    front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk, sample_count_to_vk,
    shader_stage_to_vk, stage_flags_to_vk, topology_to_vk,
};
use crate::vulkan_render_pass::as_vk_render_pass;
use crate::vulkan_shader::as_vk_shader;

/// Vulkan pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    bind_point: PipelineBindPoint,
    /// Keeps the cached binding layouts alive
    layout: PipelineLayoutDesc,
}

impl Pipeline {
    pub(crate) fn new_graphics(
        ctx: Arc<GpuContext>,
        desc: &GraphicsPipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Self> {
        if desc.vertex_shader.stage() != ShaderStage::Vertex {
            engine_bail!(
                "flare::vulkan",
                "Vertex slot holds a {:?} shader",
                desc.vertex_shader.stage()
            );
        }
        if let Some(fragment) = &desc.fragment_shader {
            if fragment.stage() != ShaderStage::Fragment {
                engine_bail!("flare::vulkan", "Fragment slot holds a {:?} shader", fragment.stage());
            }
        }

        let pipeline_layout = create_pipeline_layout(&ctx, &layout)?;

        let result = unsafe { create_graphics(&ctx, desc, pipeline_layout) };
        match result {
            Ok(pipeline) => Ok(Self {
                ctx,
                pipeline,
                pipeline_layout,
                bind_point: PipelineBindPoint::Graphics,
                layout,
            }),
            Err(e) => {
                unsafe { ctx.device.destroy_pipeline_layout(pipeline_layout, None) };
                Err(e)
            }
        }
    }

    pub(crate) fn new_compute(
        ctx: Arc<GpuContext>,
        desc: &ComputePipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Self> {
        if desc.shader.stage() != ShaderStage::Compute {
            engine_bail!("flare::vulkan", "Compute pipeline given a {:?} shader", desc.shader.stage());
        }

        let pipeline_layout = create_pipeline_layout(&ctx, &layout)?;
        let shader = as_vk_shader(desc.shader.as_ref());

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.module)
            .name(&shader.entry_point_c);
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(pipeline_layout);

        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        match pipelines {
            Ok(pipelines) => Ok(Self {
                ctx,
                pipeline: pipelines[0],
                pipeline_layout,
                bind_point: PipelineBindPoint::Compute,
                layout,
            }),
            Err((_, e)) => {
                unsafe { ctx.device.destroy_pipeline_layout(pipeline_layout, None) };
                Err(vk_error(e, "Failed to create compute pipeline"))
            }
        }
    }
}

impl RenderPipeline for Pipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    fn layout(&self) -> &PipelineLayoutDesc {
        &self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

/// Downcast an engine pipeline to the Vulkan pipeline
pub(crate) fn as_vk_pipeline(pipeline: &dyn RenderPipeline) -> &Pipeline {
    unsafe { &*(pipeline as *const dyn RenderPipeline as *const Pipeline) }
}

fn create_pipeline_layout(ctx: &GpuContext, layout: &PipelineLayoutDesc) -> Result<vk::PipelineLayout> {
    let set_layouts: Vec<vk::DescriptorSetLayout> = layout
        .binding_layouts
        .iter()
        .map(|binding_layout| as_vk_layout(binding_layout.as_ref()).layout)
        .collect();

    let push_constant_ranges: Vec<vk::PushConstantRange> = layout
        .push_constant_ranges
        .iter()
        .map(|range| vk::PushConstantRange {
            stage_flags: stage_flags_to_vk(range.stages),
            offset: range.offset,
            size: range.size,
        })
        .collect();

    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_constant_ranges);

    unsafe {
        ctx.device
            .create_pipeline_layout(&create_info, None)
            .map_err(|e| vk_error(e, "Failed to create pipeline layout"))
    }
}

unsafe fn create_graphics(
    ctx: &GpuContext,
    desc: &GraphicsPipelineDesc,
    pipeline_layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
    let render_pass = as_vk_render_pass(desc.render_pass.as_ref());

    // Shader stages
    let shaders: Vec<_> = desc.shaders().into_iter().map(|s| as_vk_shader(s.as_ref())).collect();
    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = shaders
        .iter()
        .map(|shader| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(shader.stage()))
                .module(shader.module)
                .name(&shader.entry_point_c)
        })
        .collect();

    // Vertex input state
    let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
        .vertex_layout
        .bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: input_rate_to_vk(binding.input_rate),
        })
        .collect();

    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_layout
        .attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(desc.topology))
        .primitive_restart_enable(false);

    // Viewport and scissor are dynamic
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization_state = {
        let mut info = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(desc.rasterization.depth_clamp)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face));
        if let Some(bias) = desc.rasterization.depth_bias {
            info = info
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_slope_factor(bias.slope_factor)
                .depth_bias_clamp(bias.clamp);
        } else {
            info = info.depth_bias_enable(false);
        }
        info
    };

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_stencil.depth_test_enable)
        .depth_write_enable(desc.depth_stencil.depth_write_enable)
        .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(sample_count_to_vk(desc.multisample.sample_count))
        .alpha_to_coverage_enable(desc.multisample.alpha_to_coverage);

    // Same blend state for every color attachment of the pass
    let blend = &desc.color_blend;
    let mut color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(blend.blend_enable);
    if blend.blend_enable {
        color_blend_attachment = color_blend_attachment
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));
    }
    let color_blend_attachments = vec![color_blend_attachment; render_pass.desc().color_attachments.len()];

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(pipeline_layout)
        .render_pass(render_pass.render_pass)
        .subpass(desc.subpass);

    let pipelines = ctx
        .device
        .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        .map_err(|(_, e)| engine_err!("flare::vulkan", "Failed to create graphics pipeline: {:?}", e))?;

    Ok(pipelines[0])
}
