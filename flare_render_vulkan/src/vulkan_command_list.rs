/// CommandList - Vulkan command buffer recorder
///
/// Each list owns its own command pool and a single primary command buffer.

use flare_render::flare::{
    Error,
    Result,
    render::{
        BindingSet as RenderBindingSet, Buffer as RenderBuffer, ClearValue,
        CommandList as RenderCommandList, Framebuffer as RenderFramebuffer, IndexType,
        Pipeline as RenderPipeline, Rect2D, RenderPass as RenderRenderPass,
        ShaderStageFlags, Viewport,
    },
};
use flare_render::engine_error;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_binding::as_vk_binding_set;
use crate::vulkan_buffer::as_vk_buffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{bind_point_to_vk, index_type_to_vk, stage_flags_to_vk};
use crate::vulkan_pipeline::as_vk_pipeline;
use crate::vulkan_render_pass::{as_vk_framebuffer, as_vk_render_pass};

/// Resources referenced by the commands recorded since the last `begin`
#[derive(Default)]
struct Retained {
    render_passes: Vec<Arc<dyn RenderRenderPass>>,
    framebuffers: Vec<Arc<dyn RenderFramebuffer>>,
    pipelines: Vec<Arc<dyn RenderPipeline>>,
    binding_sets: Vec<Arc<dyn RenderBindingSet>>,
    buffers: Vec<Arc<dyn RenderBuffer>>,
}

impl Retained {
    fn clear(&mut self) {
        self.render_passes.clear();
        self.framebuffers.clear();
        self.pipelines.clear();
        self.binding_sets.clear();
        self.buffers.clear();
    }
}

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
    retained: Retained,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_error(e, "Failed to create command pool"))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(vk_error(e, "Failed to allocate command buffer"));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                in_render_pass: false,
                retained: Retained::default(),
            })
        }
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn require_recording(&self, what: &str) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError(format!("{} outside of recording", what)));
        }
        Ok(())
    }

    fn require_render_pass(&self, what: &str) -> Result<()> {
        self.require_recording(what)?;
        if !self.in_render_pass {
            return Err(Error::BackendError(format!("{} outside of a render pass", what)));
        }
        Ok(())
    }
}

impl RenderCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error(e, "Failed to reset command buffer"))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error(e, "Failed to begin command buffer"))?;
        }

        // The previous submission has completed by contract
        self.retained.clear();
        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;
        if self.in_render_pass {
            return Err(Error::BackendError("end inside a render pass".to_string()));
        }

        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| vk_error(e, "Failed to end command buffer"))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error(e, "Failed to reset command buffer"))?;
        }
        self.is_recording = false;
        self.in_render_pass = false;
        self.retained.clear();
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderRenderPass>,
        framebuffer: &Arc<dyn RenderFramebuffer>,
        area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording("begin_render_pass")?;
        if self.in_render_pass {
            return Err(Error::BackendError("Render pass already active".to_string()));
        }

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|clear| match *clear {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(as_vk_render_pass(render_pass.as_ref()).render_pass)
            .framebuffer(as_vk_framebuffer(framebuffer.as_ref()).framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: area.x, y: area.y },
                extent: vk::Extent2D {
                    width: area.width,
                    height: area.height,
                },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }

        self.retained.render_passes.push(Arc::clone(render_pass));
        self.retained.framebuffers.push(Arc::clone(framebuffer));
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            return Err(Error::BackendError("No active render pass".to_string()));
        }

        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }

        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport")?;

        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };

        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor")?;

        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        };

        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn RenderPipeline>) -> Result<()> {
        self.require_recording("bind_pipeline")?;

        let vk_pipeline = as_vk_pipeline(pipeline.as_ref());
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                bind_point_to_vk(pipeline.bind_point()),
                vk_pipeline.pipeline,
            );
        }

        self.retained.pipelines.push(Arc::clone(pipeline));
        Ok(())
    }

    fn bind_binding_sets(
        &mut self,
        pipeline: &Arc<dyn RenderPipeline>,
        first_set: u32,
        sets: &[Arc<dyn RenderBindingSet>],
    ) -> Result<()> {
        self.require_recording("bind_binding_sets")?;

        let set_count = pipeline.layout().binding_layouts.len();
        if first_set as usize + sets.len() > set_count {
            return Err(Error::BackendError(format!(
                "Binding sets {}..{} exceed the pipeline's {} set layouts",
                first_set,
                first_set as usize + sets.len(),
                set_count
            )));
        }

        let descriptor_sets: Vec<vk::DescriptorSet> = sets
            .iter()
            .map(|set| as_vk_binding_set(set.as_ref()).descriptor_set)
            .collect();

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                bind_point_to_vk(pipeline.bind_point()),
                as_vk_pipeline(pipeline.as_ref()).pipeline_layout,
                first_set,
                &descriptor_sets,
                &[],
            );
        }

        self.retained.binding_sets.extend(sets.iter().cloned());
        self.retained.pipelines.push(Arc::clone(pipeline));
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn RenderPipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.require_recording("push_constants")?;

        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                as_vk_pipeline(pipeline.as_ref()).pipeline_layout,
                stage_flags_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn RenderBuffer>, offset: u64) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;

        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[as_vk_buffer(buffer.as_ref()).buffer],
                &[offset],
            );
        }

        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn RenderBuffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer")?;

        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                as_vk_buffer(buffer.as_ref()).buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }

        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) -> Result<()> {
        self.require_render_pass("draw")?;

        unsafe {
            self.ctx
                .device
                .cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()> {
        self.require_render_pass("draw_indexed")?;

        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                0,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.require_recording("dispatch")?;
        if self.in_render_pass {
            return Err(Error::BackendError("dispatch inside a render pass".to_string()));
        }

        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, x, y, z);
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            if self.is_recording {
                engine_error!("flare::vulkan", "Command list dropped while recording");
            }
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Downcast an engine command list to the Vulkan command list
pub(crate) fn as_vk_command_list(command_list: &dyn RenderCommandList) -> &CommandList {
    unsafe { &*(command_list as *const dyn RenderCommandList as *const CommandList) }
}
