/// Mock graphics device for unit tests (no GPU required)
///
/// Every mock object appends human-readable events to a shared log so tests
/// can assert on the exact order of GPU-facing calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::*;

pub type EventLog = Arc<Mutex<Vec<String>>>;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    desc: BufferDesc,
    pub data: Mutex<Vec<u8>>,
    mapped: AtomicBool,
    pub flushes: AtomicUsize,
}

impl MockBuffer {
    pub fn new(desc: BufferDesc) -> Self {
        Self {
            desc,
            data: Mutex::new(vec![0; desc.effective_size() as usize]),
            mapped: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
        }
    }
}

impl Buffer for MockBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn map(&self) -> Result<()> {
        if !self.desc.memory.is_host_visible() {
            return Err(Error::InvalidResource("buffer is not host visible".to_string()));
        }
        if self.mapped.swap(true, Ordering::AcqRel) {
            crate::engine_fatal!("flare::mock", "Buffer mapped twice");
        }
        Ok(())
    }

    fn unmap(&self) {
        if !self.mapped.swap(false, Ordering::AcqRel) {
            crate::engine_fatal!("flare::mock", "Unmap of a buffer that is not mapped");
        }
    }

    fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        validate_write(&self.desc, self.is_mapped(), offset, data.len());
        let start = offset as usize;
        self.data.lock().unwrap()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush_index(&self, index: u32) -> Result<()> {
        validate_index(&self.desc, index);
        self.flush()
    }
}

// ============================================================================
// Mock Image
// ============================================================================

/// Underlying image shared by every view
pub struct MockImageMemory {
    pub id: usize,
    desc: ImageDesc,
    released: EventLog,
}

impl Drop for MockImageMemory {
    fn drop(&mut self) {
        record(&self.released, format!("release image{}", self.id));
    }
}

pub struct MockImage {
    pub memory: Arc<MockImageMemory>,
    view: ImageViewDesc,
}

impl MockImage {
    pub fn new(desc: ImageDesc, released: EventLog) -> Self {
        Self {
            memory: Arc::new(MockImageMemory { id: next_id(), desc, released }),
            view: desc.view,
        }
    }
}

impl Image for MockImage {
    fn desc(&self) -> &ImageDesc {
        &self.memory.desc
    }

    fn view_desc(&self) -> &ImageViewDesc {
        &self.view
    }

    fn create_view(&self, desc: &ImageViewDesc) -> Result<Arc<dyn Image>> {
        Ok(Arc::new(MockImage {
            memory: Arc::clone(&self.memory),
            view: *desc,
        }))
    }

    fn shared_view_count(&self) -> usize {
        Arc::strong_count(&self.memory)
    }
}

// ============================================================================
// Mock Sampler / Shader
// ============================================================================

pub struct MockSampler {
    desc: SamplerDesc,
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

pub struct MockShader {
    stage: ShaderStage,
    reflection: ShaderReflection,
}

impl MockShader {
    pub fn new(stage: ShaderStage, reflection: ShaderReflection) -> Arc<dyn Shader> {
        Arc::new(Self { stage, reflection })
    }
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        "main"
    }

    fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }
}

// ============================================================================
// Mock Binding Layout / Binding Set
// ============================================================================

pub struct MockBindingLayout {
    pub id: usize,
    desc: BindingLayoutDesc,
}

impl MockBindingLayout {
    pub fn new(desc: BindingLayoutDesc) -> Self {
        Self { id: next_id(), desc }
    }
}

impl BindingLayout for MockBindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

pub struct MockBindingSet {
    layout: Arc<dyn BindingLayout>,
    queue: BindingWriteQueue,
    pub commits: AtomicUsize,
    pub applied_writes: AtomicUsize,
}

impl MockBindingSet {
    pub fn new(layout: &Arc<dyn BindingLayout>) -> Self {
        Self {
            layout: Arc::clone(layout),
            queue: BindingWriteQueue::new(layout.desc()),
            commits: AtomicUsize::new(0),
            applied_writes: AtomicUsize::new(0),
        }
    }

    pub fn bound_count(&self) -> usize {
        self.queue.bound_count()
    }
}

impl BindingSet for MockBindingSet {
    fn layout(&self) -> &Arc<dyn BindingLayout> {
        &self.layout
    }

    fn write(&self, write: BindingWrite) -> Result<()> {
        self.queue.push(write)
    }

    fn commit(&self) -> Result<()> {
        let writes = self.queue.take_pending()?;
        self.applied_writes.fetch_add(writes.len(), Ordering::Relaxed);
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.queue.retain(writes)
    }

    fn pending_write_count(&self) -> usize {
        self.queue.pending_count()
    }
}

// ============================================================================
// Mock Pipeline / Render Pass / Framebuffer
// ============================================================================

pub struct MockPipeline {
    pub id: usize,
    bind_point: PipelineBindPoint,
    layout: PipelineLayoutDesc,
}

impl MockPipeline {
    pub fn new(bind_point: PipelineBindPoint, layout: PipelineLayoutDesc) -> Arc<dyn Pipeline> {
        Arc::new(Self { id: next_id(), bind_point, layout })
    }
}

impl Pipeline for MockPipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    fn layout(&self) -> &PipelineLayoutDesc {
        &self.layout
    }
}

pub struct MockRenderPass {
    desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

pub struct MockFramebuffer {
    pub id: usize,
    width: u32,
    height: u32,
    attachments: Vec<Arc<dyn Image>>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn attachments(&self) -> &[Arc<dyn Image>] {
        &self.attachments
    }
}

// ============================================================================
// Mock Command List
// ============================================================================

pub struct MockCommandList {
    pub id: usize,
    log: EventLog,
    recording: bool,
    in_render_pass: bool,
    retained_pipelines: Vec<Arc<dyn Pipeline>>,
    retained_buffers: Vec<Arc<dyn Buffer>>,
}

impl MockCommandList {
    pub fn new(log: EventLog) -> Self {
        Self {
            id: next_id(),
            log,
            recording: false,
            in_render_pass: false,
            retained_pipelines: Vec::new(),
            retained_buffers: Vec::new(),
        }
    }

    fn push(&self, command: impl std::fmt::Display) {
        record(&self.log, format!("cmd{}:{}", self.id, command));
    }

    fn require_recording(&self, what: &str) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError(format!("{} outside of recording", what)));
        }
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }
        self.retained_pipelines.clear();
        self.retained_buffers.clear();
        self.recording = true;
        self.push("begin");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;
        if self.in_render_pass {
            return Err(Error::BackendError("end inside a render pass".to_string()));
        }
        self.recording = false;
        self.push("end");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn reset(&mut self) -> Result<()> {
        self.recording = false;
        self.in_render_pass = false;
        self.retained_pipelines.clear();
        self.retained_buffers.clear();
        self.push("reset");
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording("begin_render_pass")?;
        if self.in_render_pass {
            return Err(Error::BackendError("Render pass already active".to_string()));
        }
        self.in_render_pass = true;
        self.push(format!(
            "begin_render_pass {}x{} clears={} fb={}x{}",
            area.width,
            area.height,
            clear_values.len(),
            framebuffer.width(),
            framebuffer.height()
        ));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            return Err(Error::BackendError("No active render pass".to_string()));
        }
        self.in_render_pass = false;
        self.push("end_render_pass");
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.push(format!("set_scissor {}x{}", scissor.width, scissor.height));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.require_recording("bind_pipeline")?;
        self.retained_pipelines.push(Arc::clone(pipeline));
        self.push("bind_pipeline");
        Ok(())
    }

    fn bind_binding_sets(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        first_set: u32,
        sets: &[Arc<dyn BindingSet>],
    ) -> Result<()> {
        self.push(format!("bind_binding_sets first={} count={}", first_set, sets.len()));
        Ok(())
    }

    fn push_constants(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.push(format!("push_constants offset={} size={}", offset, data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.retained_buffers.push(Arc::clone(buffer));
        self.push("bind_vertex_buffer");
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, index_type: IndexType) -> Result<()> {
        self.retained_buffers.push(Arc::clone(buffer));
        self.push(format!("bind_index_buffer {:?}", index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32) -> Result<()> {
        self.require_recording("draw")?;
        self.push(format!("draw {} x{}", vertex_count, instance_count));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
    ) -> Result<()> {
        self.require_recording("draw_indexed")?;
        self.push(format!("draw_indexed {} x{}", index_count, instance_count));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.push(format!("dispatch {}x{}x{}", x, y, z));
        Ok(())
    }
}

// ============================================================================
// Mock Fence / Swapchain
// ============================================================================

/// Fence whose wait simulates the GPU finishing the slot's work
///
/// A fence that was reset but never submitted cannot signal; waiting on it
/// panics where a real device would hang.
pub struct MockFence {
    slot: usize,
    signaled: AtomicBool,
    submitted: AtomicBool,
    log: EventLog,
}

impl MockFence {
    pub fn new(slot: usize, log: EventLog) -> Self {
        Self {
            slot,
            signaled: AtomicBool::new(true),
            submitted: AtomicBool::new(false),
            log,
        }
    }

    fn mark_submitted(&self) {
        self.submitted.store(true, Ordering::Release);
    }

    /// Device idle: submitted work has completed
    fn complete(&self) {
        if self.submitted.swap(false, Ordering::AcqRel) {
            self.signaled.store(true, Ordering::Release);
        }
    }
}

impl Fence for MockFence {
    fn wait(&self) -> Result<()> {
        record(&self.log, format!("wait_fence{}", self.slot));
        if self.signaled.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.submitted.swap(false, Ordering::AcqRel) {
            panic!("wait_fence{} would never signal: reset without a submit", self.slot);
        }
        self.signaled.store(true, Ordering::Release);
        record(&self.log, format!("gpu_complete{}", self.slot));
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        record(&self.log, format!("reset_fence{}", self.slot));
        self.signaled.store(false, Ordering::Release);
        self.submitted.store(false, Ordering::Release);
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.signaled.load(Ordering::Acquire))
    }
}

/// Outcomes returned by the next swapchain calls, in order
#[derive(Default)]
pub struct SwapchainScript {
    pub acquires: VecDeque<AcquireOutcome>,
    pub presents: VecDeque<PresentOutcome>,
    pub fail_submit: Option<Error>,
    pub fail_present: Option<Error>,
}

pub struct MockSwapchain {
    log: EventLog,
    released: EventLog,
    extent: (u32, u32),
    fences: Vec<MockFence>,
    images: Vec<Arc<dyn Image>>,
    next_image: u32,
    pub script: Arc<Mutex<SwapchainScript>>,
}

impl MockSwapchain {
    pub fn new(image_count: usize, extent: (u32, u32), log: EventLog) -> Self {
        let released = new_log();
        let fences = (0..MAX_FRAMES_IN_FLIGHT).map(|slot| MockFence::new(slot, log.clone())).collect();
        Self {
            images: Self::build_images(image_count, extent, &released),
            log,
            released,
            extent,
            fences,
            next_image: 0,
            script: Arc::new(Mutex::new(SwapchainScript::default())),
        }
    }

    fn build_images(count: usize, extent: (u32, u32), released: &EventLog) -> Vec<Arc<dyn Image>> {
        (0..count)
            .map(|_| {
                let desc = ImageDesc::new_2d(
                    extent.0,
                    extent.1,
                    Format::B8G8R8A8_SRGB,
                    ImageUsage::COLOR_ATTACHMENT,
                    1,
                );
                Arc::new(MockImage::new(desc, released.clone())) as Arc<dyn Image>
            })
            .collect()
    }
}

impl SwapchainBackend for MockSwapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn format(&self) -> Format {
        Format::B8G8R8A8_SRGB
    }

    fn images(&self) -> Vec<Arc<dyn Image>> {
        self.images.clone()
    }

    fn in_flight_fence(&self, slot: usize) -> &dyn Fence {
        &self.fences[slot]
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let scripted = self.script.lock().unwrap().acquires.pop_front();
        let outcome = scripted.unwrap_or(AcquireOutcome::Acquired {
            image_index: self.next_image,
            suboptimal: false,
        });
        match outcome {
            AcquireOutcome::Acquired { image_index, .. } => {
                self.next_image = (image_index + 1) % self.images.len() as u32;
                record(&self.log, format!("acquire slot{} -> image{}", slot, image_index));
            }
            AcquireOutcome::OutOfDate => {
                record(&self.log, format!("acquire slot{} -> out_of_date", slot));
            }
        }
        Ok(outcome)
    }

    fn submit(&mut self, slot: usize, _command_list: &dyn CommandList) -> Result<()> {
        if let Some(err) = self.script.lock().unwrap().fail_submit.take() {
            return Err(err);
        }
        record(&self.log, format!("submit slot{}", slot));
        self.fences[slot].mark_submitted();
        Ok(())
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> Result<PresentOutcome> {
        if let Some(err) = self.script.lock().unwrap().fail_present.take() {
            return Err(err);
        }
        let outcome = self
            .script
            .lock()
            .unwrap()
            .presents
            .pop_front()
            .unwrap_or(PresentOutcome::Presented);
        record(&self.log, format!("present image{} {:?}", image_index, outcome));
        Ok(outcome)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        record(&self.log, format!("recreate {}x{}", width, height));
        self.extent = (width, height);
        self.images = Self::build_images(self.images.len(), self.extent, &self.released);
        self.fences = (0..MAX_FRAMES_IN_FLIGHT).map(|slot| MockFence::new(slot, self.log.clone())).collect();
        self.next_image = 0;
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        record(&self.log, "wait_idle");
        for fence in &self.fences {
            fence.complete();
        }
        Ok(())
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    pub log: EventLog,
    pub released: EventLog,
    pub depth_format: Format,
    pub min_alignment: u64,
    layouts_created: AtomicUsize,
    samplers: Mutex<FxHashMap<SamplerDesc, Arc<dyn Sampler>>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_log(new_log())
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            released: new_log(),
            depth_format: Format::D32_SFLOAT,
            min_alignment: 256,
            layouts_created: AtomicUsize::new(0),
            samplers: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn layouts_created(&self) -> usize {
        self.layouts_created.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(MockBuffer::new(*desc)))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>> {
        record(&self.log, format!("create_image {}x{} {:?}", desc.width, desc.height, desc.format));
        Ok(Arc::new(MockImage::new(*desc, self.released.clone())))
    }

    fn upload_image(&self, image: &dyn Image, data: &[u8]) -> Result<()> {
        let (width, height) = image.desc().mip_extent(0);
        let expected = (width * height * image.desc().format.bytes_per_texel()) as usize;
        if data.len() < expected {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes, image needs {}",
                data.len(),
                expected
            )));
        }
        record(&self.log, "upload_image");
        Ok(())
    }

    fn transition_image_layout(&self, _image: &dyn Image, old: ImageLayout, new: ImageLayout) -> Result<()> {
        record(&self.log, format!("transition {:?} -> {:?}", old, new));
        Ok(())
    }

    fn generate_mipmaps(&self, image: &dyn Image) -> Result<()> {
        record(&self.log, format!("generate_mipmaps {}", image.desc().mip_levels));
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        let mut samplers = self.samplers.lock().unwrap();
        let sampler = samplers
            .entry(*desc)
            .or_insert_with(|| Arc::new(MockSampler { desc: *desc }));
        Ok(Arc::clone(sampler))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(MockShader::new(desc.stage, ShaderReflection::default()))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        self.layouts_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MockBindingLayout::new(desc.clone())))
    }

    fn create_binding_set(&self, layout: &Arc<dyn BindingLayout>) -> Result<Arc<dyn BindingSet>> {
        Ok(Arc::new(MockBindingSet::new(layout)))
    }

    fn create_graphics_pipeline(
        &self,
        _desc: &GraphicsPipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn Pipeline>> {
        Ok(MockPipeline::new(PipelineBindPoint::Graphics, layout))
    }

    fn create_compute_pipeline(
        &self,
        _desc: &ComputePipelineDesc,
        layout: PipelineLayoutDesc,
    ) -> Result<Arc<dyn Pipeline>> {
        Ok(MockPipeline::new(PipelineBindPoint::Compute, layout))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        record(&self.log, format!("create_render_pass attachments={}", desc.attachment_count()));
        Ok(Arc::new(MockRenderPass { desc: desc.clone() }))
    }

    fn create_framebuffer(
        &self,
        render_pass: &Arc<dyn RenderPass>,
        attachments: &[Arc<dyn Image>],
        width: u32,
        height: u32,
    ) -> Result<Arc<dyn Framebuffer>> {
        if attachments.len() != render_pass.desc().attachment_count() {
            return Err(Error::InvalidResource(format!(
                "framebuffer has {} attachments, render pass expects {}",
                attachments.len(),
                render_pass.desc().attachment_count()
            )));
        }
        record(&self.log, format!("create_framebuffer {}x{}", width, height));
        Ok(Arc::new(MockFramebuffer {
            id: next_id(),
            width,
            height,
            attachments: attachments.to_vec(),
        }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(self.log.clone())))
    }

    fn supported_depth_format(&self) -> Result<Format> {
        Ok(self.depth_format)
    }

    fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.min_alignment
    }

    fn wait_idle(&self) -> Result<()> {
        record(&self.log, "device_wait_idle");
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
