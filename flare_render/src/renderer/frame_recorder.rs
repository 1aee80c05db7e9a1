/// FrameRecorder - command list wrapper handed to queued render commands

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    BindingSet, Buffer, CommandList, IndexType, Pipeline, ShaderStageFlags,
};

/// Counters for the last drained frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub vertices: u64,
    pub indices: u64,
    pub pipeline_binds: u32,
    pub binding_set_binds: u32,
    pub buffer_binds: u32,
    pub dispatches: u32,
}

/// Recording context passed to every queued render command
///
/// The helpers forward to the frame slot's command list and count what they
/// record. Commands needing something the helpers do not cover can reach the
/// raw list through [`command_list`](Self::command_list).
pub struct FrameRecorder<'a> {
    command_list: &'a mut dyn CommandList,
    stats: &'a mut FrameStats,
    frame_slot: usize,
}

impl<'a> FrameRecorder<'a> {
    pub fn new(command_list: &'a mut dyn CommandList, stats: &'a mut FrameStats, frame_slot: usize) -> Self {
        Self { command_list, stats, frame_slot }
    }

    /// Raw access to the frame slot's command list (not counted)
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        &mut *self.command_list
    }

    /// Frame slot whose command list is being recorded
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    pub fn stats(&self) -> &FrameStats {
        self.stats
    }

    pub fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.command_list.bind_pipeline(pipeline)?;
        self.stats.pipeline_binds += 1;
        Ok(())
    }

    /// Bind a vertex buffer at binding 0 and a `u32` index buffer, both at offset 0
    pub fn bind_vertex_and_index_buffers(
        &mut self,
        vertex_buffer: &Arc<dyn Buffer>,
        index_buffer: &Arc<dyn Buffer>,
    ) -> Result<()> {
        self.command_list.bind_vertex_buffer(vertex_buffer, 0)?;
        self.command_list.bind_index_buffer(index_buffer, 0, IndexType::U32)?;
        self.stats.buffer_binds += 2;
        Ok(())
    }

    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout the sets are bound against
    /// * `first_set` - Set index of `sets[0]`
    /// * `sets` - Binding sets for consecutive set indices
    pub fn bind_binding_sets(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        first_set: u32,
        sets: &[Arc<dyn BindingSet>],
    ) -> Result<()> {
        self.command_list.bind_binding_sets(pipeline, first_set, sets)?;
        self.stats.binding_set_binds += sets.len() as u32;
        Ok(())
    }

    pub fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.command_list.push_constants(pipeline, stages, offset, data)
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) -> Result<()> {
        self.command_list.draw(vertex_count, instance_count, first_vertex)?;
        self.stats.draw_calls += 1;
        self.stats.vertices += u64::from(vertex_count) * u64::from(instance_count);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> Result<()> {
        self.command_list
            .draw_indexed(index_count, instance_count, first_index, vertex_offset)?;
        self.stats.draw_calls += 1;
        self.stats.indices += u64::from(index_count) * u64::from(instance_count);
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.command_list.dispatch(x, y, z)?;
        self.stats.dispatches += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_recorder_tests.rs"]
mod tests;
