/*!
# Flare Render - Vulkan Backend

Vulkan implementation of the `flare_render` backend traits, built on `ash`
for the bindings and `gpu-allocator` for device memory.

```no_run
use std::sync::Arc;
use flare_render::flare::{Engine, render::Config};
use flare_render_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> flare_render::flare::Result<()> {
let config = Config::default();
let device = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
let swapchain = device.create_swapchain(window, &config)?;
let mut engine = Engine::init(device, Box::new(swapchain), config)?;
engine.render_frame()?;
engine.shutdown()?;
# Ok(())
# }
```

Validation layers are compiled in with the `vulkan-validation` feature and
enabled at runtime through `Config::enable_validation`.
*/

mod debug;
mod vulkan_binding;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_device;
mod vulkan_format;
mod vulkan_image;
mod vulkan_pipeline;
mod vulkan_render_pass;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_swapchain;

pub use vulkan_device::VulkanGraphicsDevice;
pub use vulkan_swapchain::{Swapchain as VulkanSwapchain, VulkanFence};

// Validation statistics (populated when validation is enabled)
pub use debug::{print_validation_stats_report, validation_stats};
