/// Flare Engine - owns the renderer subsystems for one device and surface
///
/// The engine is an explicit instance built by `Engine::init` and torn down
/// by `Engine::shutdown`, in that order. The only process-wide state is the
/// log sink, reachable through the associated logger functions.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;

use winit::dpi::PhysicalSize;

use crate::binding_layout_cache::BindingLayoutCache;
use crate::error::Result;
use crate::graphics_device::{
    BindingLayout, BindingLayoutDesc, BindingSet, ComputePipelineDesc, Config, GraphicsDevice,
    GraphicsPipelineDesc, Pipeline, SwapchainBackend,
};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::pipeline_layout;
use crate::presentation::PresentationSurface;
use crate::renderer::{FrameOutcome, Renderer};

// ===== INTERNAL STATE =====

/// Global log sink (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== PUBLIC API =====

/// Renderer subsystems for one device and one presentation surface
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use flare_render::flare::{Engine, render::Config};
/// use flare_render_vulkan::VulkanGraphicsDevice;
/// # fn run(window: &winit::window::Window) -> flare_render::flare::Result<()> {
/// let config = Config::default();
/// let device = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
/// let swapchain = device.create_swapchain(window, &config)?;
///
/// let mut engine = Engine::init(device, Box::new(swapchain), config)?;
/// engine.render_frame()?;
/// engine.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    device: Arc<dyn GraphicsDevice>,
    layout_cache: BindingLayoutCache,
    renderer: Renderer,
    config: Config,
}

impl Engine {
    /// Build the layout cache, the presentation surface and the renderer
    ///
    /// # Arguments
    ///
    /// * `device` - Backend device every resource is created on
    /// * `swapchain` - Presentation chain for the window being rendered to
    /// * `config` - Engine configuration (queue capacity, backend options)
    pub fn init(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn SwapchainBackend>,
        config: Config,
    ) -> Result<Self> {
        let (width, height) = swapchain.extent();
        let surface = PresentationSurface::new(swapchain, width, height);
        let renderer = Renderer::new(device.as_ref(), surface, config.command_queue_bytes)?;

        crate::engine_info!(
            "flare::engine",
            "Engine initialized for '{}' v{}.{}.{}",
            config.app_name,
            config.app_version.0,
            config.app_version.1,
            config.app_version.2
        );

        Ok(Self {
            device,
            layout_cache: BindingLayoutCache::new(),
            renderer,
            config,
        })
    }

    /// Wait for the GPU, release the renderer, then the cached layouts
    ///
    /// Every pipeline and binding set must be dropped before this call;
    /// a cached layout that is still referenced is fatal.
    pub fn shutdown(self) -> Result<()> {
        let Engine { device, layout_cache, renderer, config } = self;

        device.wait_idle()?;
        renderer.surface().wait_idle()?;
        drop(renderer);

        let layouts = layout_cache.len();
        layout_cache.clear()?;

        crate::engine_info!(
            "flare::engine",
            "Engine for '{}' shut down ({} binding layouts released)",
            config.app_name,
            layouts
        );
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn layout_cache(&self) -> &BindingLayoutCache {
        &self.layout_cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== CONVENIENCE =====

    /// Cached binding layout for `desc`
    pub fn binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        self.layout_cache.get_or_create(self.device.as_ref(), desc)
    }

    /// New binding set on the cached layout for `desc`
    pub fn create_binding_set(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingSet>> {
        let layout = self.binding_layout(desc)?;
        self.device.create_binding_set(&layout)
    }

    pub fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<dyn Pipeline>> {
        pipeline_layout::create_graphics_pipeline(self.device.as_ref(), &self.layout_cache, desc)
    }

    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        pipeline_layout::create_compute_pipeline(self.device.as_ref(), &self.layout_cache, desc)
    }

    /// Resize notification from the windowing layer
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        crate::engine_debug!("flare::engine", "Drawable resized to {}x{}", size.width, size.height);
        self.renderer.resize(size.width, size.height);
    }

    pub fn render_frame(&mut self) -> Result<FrameOutcome> {
        self.renderer.render_frame()
    }

    // ===== LOGGER API =====

    /// Replace the global log sink
    ///
    /// # Example
    ///
    /// ```no_run
    /// use flare_render::flare::Engine;
    /// use flare_render::flare::log::{Logger, LogEntry};
    ///
    /// struct FileLogger;
    ///
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Restore the default colored console logger
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Log without source location (used by `engine_trace!` .. `engine_warn!`)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Log with file:line (used by `engine_error!` and `engine_fatal!`)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
