/// Unit tests for render_target.rs

use crate::graphics_device::mock_graphics_device::{new_log, EventLog, MockGraphicsDevice, MockSwapchain};
use crate::graphics_device::*;
use crate::presentation::PresentationSurface;
use crate::render_target::*;
use crate::renderer::{FrameOutcome, Renderer};
use glam::{IVec2, UVec2};
use std::sync::Arc;

fn setup() -> (MockGraphicsDevice, Renderer, EventLog) {
    let log = new_log();
    let device = MockGraphicsDevice::with_log(log.clone());
    let swapchain = MockSwapchain::new(3, (800, 600), log.clone());
    let surface = PresentationSurface::new(Box::new(swapchain), 800, 600);
    let renderer = Renderer::new(&device, surface, 4096).unwrap();
    (device, renderer, log)
}

fn shadow_desc() -> RenderTargetDesc {
    RenderTargetDesc::new(1024, 1024).with_depth(DepthTargetDesc {
        format: Some(Format::D32_SFLOAT),
        final_layout: ImageLayout::ShaderReadOnly,
        store_op: StoreOp::Store,
    })
}

fn gbuffer_desc() -> RenderTargetDesc {
    RenderTargetDesc::new(640, 480)
        .with_color(Format::R16G16B16A16_SFLOAT, ImageLayout::ShaderReadOnly)
        .with_color(Format::R8G8B8A8_UNORM, ImageLayout::ShaderReadOnly)
        .with_depth(DepthTargetDesc::default())
}

fn commands(log: &EventLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("cmd"))
        .filter_map(|e| e.split_once(':').map(|(_, command)| command.to_string()))
        .collect()
}

// ============================================================================
// OFFSCREEN TARGETS
// ============================================================================

#[test]
fn test_offscreen_target_creates_attachments() {
    let device = MockGraphicsDevice::new();
    let target = RenderTarget::new(&device, gbuffer_desc()).unwrap();

    assert_eq!(target.instance_count(), 1);
    assert_eq!(target.extent(), (640, 480));
    assert_eq!(target.render_pass().desc().attachment_count(), 3);
    assert_eq!(
        target.color_attachment(0, 1).unwrap().desc().format,
        Format::R8G8B8A8_UNORM
    );
    assert!(target.color_attachment(0, 2).is_none());
    assert_eq!(target.framebuffer(0).unwrap().attachments().len(), 3);

    let events = device.events();
    assert_eq!(events.iter().filter(|e| e.starts_with("create_image")).count(), 3);
    assert!(events.contains(&"create_framebuffer 640x480".to_string()));
}

#[test]
fn test_depth_format_from_device_when_unspecified() {
    let mut device = MockGraphicsDevice::new();
    device.depth_format = Format::D24_UNORM_S8_UINT;

    let target = RenderTarget::new(&device, gbuffer_desc()).unwrap();

    assert_eq!(target.depth_format(), Some(Format::D24_UNORM_S8_UINT));
    let depth = target.render_pass().desc().depth_attachment.unwrap();
    assert_eq!(depth.stencil_load_op, LoadOp::Clear);
    assert_eq!(depth.final_layout, ImageLayout::DepthStencilAttachment);
}

#[test]
fn test_depth_only_target_for_shadow_pass() {
    let device = MockGraphicsDevice::new();
    let target = RenderTarget::new(&device, shadow_desc()).unwrap();

    assert!(target.render_pass().desc().color_attachments.is_empty());
    let depth = target.depth_attachment(0).unwrap();
    assert!(depth.desc().usage.contains(ImageUsage::SAMPLED));
    assert_eq!(
        target.clear_values(),
        vec![ClearValue::DepthStencil { depth: 1.0, stencil: 0 }]
    );
}

#[test]
fn test_clear_values_follow_attachment_kind() {
    let device = MockGraphicsDevice::new();
    let mut desc = gbuffer_desc();
    desc.clear_color = [0.1, 0.2, 0.3, 1.0];
    desc.clear_depth = 0.0;

    let target = RenderTarget::new(&device, desc).unwrap();

    assert_eq!(
        target.clear_values(),
        vec![
            ClearValue::Color([0.1, 0.2, 0.3, 1.0]),
            ClearValue::Color([0.1, 0.2, 0.3, 1.0]),
            ClearValue::DepthStencil { depth: 0.0, stencil: 0 },
        ]
    );
}

#[test]
fn test_multiple_instances_have_distinct_images() {
    let device = MockGraphicsDevice::new();
    let mut desc = shadow_desc();
    desc.instance_count = 3;

    let target = RenderTarget::new(&device, desc).unwrap();

    assert_eq!(target.instance_count(), 3);
    let first = target.depth_attachment(0).unwrap();
    let second = target.depth_attachment(1).unwrap();
    assert!(!Arc::ptr_eq(first, second));
}

#[test]
#[should_panic(expected = "no attachments")]
fn test_target_without_attachments_is_fatal() {
    let device = MockGraphicsDevice::new();
    let _ = RenderTarget::new(&device, RenderTargetDesc::new(16, 16));
}

#[test]
#[should_panic(expected = "is not a depth format")]
fn test_color_format_as_depth_is_fatal() {
    let device = MockGraphicsDevice::new();
    let desc = RenderTargetDesc::new(16, 16).with_depth(DepthTargetDesc {
        format: Some(Format::R8G8B8A8_UNORM),
        ..DepthTargetDesc::default()
    });
    let _ = RenderTarget::new(&device, desc);
}

// ============================================================================
// RESIZE AND VIEW LIFETIME
// ============================================================================

#[test]
fn test_resize_rebuilds_owned_attachments() {
    let device = MockGraphicsDevice::new();
    let mut target = RenderTarget::new(&device, gbuffer_desc()).unwrap();

    target.resize(&device, 1280, 720).unwrap();

    assert_eq!(target.extent(), (1280, 720));
    assert_eq!(target.color_attachment(0, 0).unwrap().desc().width, 1280);
    assert_eq!(target.framebuffer(0).unwrap().width(), 1280);
    assert_eq!(device.released().len(), 3);
}

#[test]
fn test_held_view_keeps_image_alive_across_resize() {
    let device = MockGraphicsDevice::new();
    let mut target = RenderTarget::new(&device, shadow_desc()).unwrap();
    let sampled = Arc::clone(target.depth_attachment(0).unwrap());

    target.resize(&device, 2048, 2048).unwrap();
    assert!(device.released().is_empty());

    drop(sampled);
    assert_eq!(device.released().len(), 1);
}

#[test]
fn test_resize_to_same_size_is_noop() {
    let device = MockGraphicsDevice::new();
    let mut target = RenderTarget::new(&device, shadow_desc()).unwrap();
    let before = device.events().len();

    target.resize(&device, 1024, 1024).unwrap();

    assert_eq!(device.events().len(), before);
}

// ============================================================================
// SURFACE TARGETS
// ============================================================================

#[test]
fn test_surface_target_wraps_presentable_images() {
    let (device, renderer, _log) = setup();
    let desc = RenderTargetDesc::new(0, 0).with_depth(DepthTargetDesc::default());

    let target = RenderTarget::for_surface(&device, renderer.surface(), desc).unwrap();

    let images = renderer.surface().images();
    assert_eq!(target.instance_count(), images.len());
    assert_eq!(target.extent(), (800, 600));
    for (instance, image) in images.iter().enumerate() {
        assert!(Arc::ptr_eq(target.color_attachment(instance, 0).unwrap(), image));
        assert!(target.depth_attachment(instance).is_some());
    }
    let color = target.render_pass().desc().color_attachments[0];
    assert_eq!(color.format, Format::B8G8R8A8_SRGB);
    assert_eq!(color.final_layout, ImageLayout::PresentSrc);
}

#[test]
fn test_multisampled_surface_target_resolves_to_presentable_image() {
    let (device, renderer, _log) = setup();
    let mut desc = RenderTargetDesc::new(0, 0).with_depth(DepthTargetDesc::default());
    desc.samples = SampleCount::S4;

    let target = RenderTarget::for_surface(&device, renderer.surface(), desc).unwrap();

    let pass = target.render_pass().desc();
    assert_eq!(pass.attachment_count(), 3);
    assert_eq!(pass.color_attachments[0].samples, SampleCount::S4);
    assert_eq!(pass.resolve_attachment.unwrap().final_layout, ImageLayout::PresentSrc);
    assert!(Arc::ptr_eq(
        target.resolve_attachment(1).unwrap(),
        &renderer.surface().images()[1]
    ));
    assert_eq!(target.color_attachment(1, 0).unwrap().desc().samples, SampleCount::S4);
    assert_eq!(target.clear_values().len(), 3);
}

#[test]
fn test_sync_with_surface_after_recreation() {
    let (device, mut renderer, _log) = setup();
    let mut target = RenderTarget::for_surface(&device, renderer.surface(), RenderTargetDesc::new(0, 0)).unwrap();
    assert!(!target.sync_with_surface(&device, renderer.surface()).unwrap());

    renderer.resize(1024, 768);
    renderer.render_frame().unwrap();

    assert!(target.sync_with_surface(&device, renderer.surface()).unwrap());
    assert_eq!(target.extent(), (1024, 768));
    assert_eq!(target.framebuffer(0).unwrap().width(), 1024);
    assert!(!target.sync_with_surface(&device, renderer.surface()).unwrap());
}

#[test]
fn test_commands_queued_before_recreation_are_never_recorded() {
    let (device, mut renderer, log) = setup();
    let mut target = RenderTarget::for_surface(&device, renderer.surface(), RenderTargetDesc::new(0, 0)).unwrap();

    renderer.resize(1024, 768);
    assert!(!target.sync_with_surface(&device, renderer.surface()).unwrap());
    target.begin(&mut renderer, None, RenderArea::full());
    target.end(&mut renderer);

    // The tick that rebuilds the chain drops the 800x600 pass
    assert_eq!(renderer.render_frame().unwrap(), FrameOutcome::Skipped);
    assert!(commands(&log).is_empty());
    assert_eq!(renderer.surface().extent(), (1024, 768));

    assert!(target.sync_with_surface(&device, renderer.surface()).unwrap());
    target.begin(&mut renderer, None, RenderArea::full());
    target.end(&mut renderer);
    assert!(renderer.render_frame().unwrap().was_presented());

    let recorded = commands(&log);
    assert!(recorded.iter().any(|c| c.starts_with("begin_render_pass 1024x768")));
    assert!(!recorded.iter().any(|c| c.contains("800x600")));
}

#[test]
#[should_panic(expected = "follow their surface")]
fn test_resize_surface_target_is_fatal() {
    let (device, renderer, _log) = setup();
    let mut target = RenderTarget::for_surface(&device, renderer.surface(), RenderTargetDesc::new(0, 0)).unwrap();
    let _ = target.resize(&device, 10, 10);
}

// ============================================================================
// RECORDING
// ============================================================================

#[test]
fn test_begin_end_bracket_recorded_in_order() {
    let (device, mut renderer, log) = setup();
    let desc = RenderTargetDesc::new(0, 0).with_depth(DepthTargetDesc::default());
    let target = RenderTarget::for_surface(&device, renderer.surface(), desc).unwrap();

    target.begin(&mut renderer, None, RenderArea::full());
    renderer.submit(|recorder, _| recorder.draw(3, 1, 0));
    target.end(&mut renderer);
    renderer.render_frame().unwrap();

    assert_eq!(
        commands(&log),
        vec![
            "begin",
            "begin_render_pass 800x600 clears=2 fb=800x600",
            "set_viewport 800x600",
            "set_scissor 800x600",
            "draw 3 x1",
            "end_render_pass",
            "end",
        ]
    );
}

#[test]
fn test_partial_render_area() {
    let (device, mut renderer, log) = setup();
    let target = RenderTarget::new(&device, shadow_desc()).unwrap();

    target.begin(
        &mut renderer,
        Some(0),
        RenderArea { offset: IVec2::new(512, 0), extent: None },
    );
    target.end(&mut renderer);
    renderer.render_frame().unwrap();

    assert!(commands(&log).contains(&"begin_render_pass 512x1024 clears=1 fb=1024x1024".to_string()));
}

#[test]
fn test_render_area_resolve() {
    let area = RenderArea { offset: IVec2::new(100, 50), extent: None };
    assert_eq!(area.resolve(800, 600), Rect2D { x: 100, y: 50, width: 700, height: 550 });

    let explicit = RenderArea { offset: IVec2::ZERO, extent: Some(UVec2::new(64, 32)) };
    assert_eq!(explicit.resolve(800, 600), Rect2D { x: 0, y: 0, width: 64, height: 32 });
}

#[test]
#[should_panic(expected = "out of range")]
fn test_begin_with_missing_instance_is_fatal() {
    let (device, mut renderer, _log) = setup();
    let target = RenderTarget::new(&device, shadow_desc()).unwrap();
    target.begin(&mut renderer, Some(1), RenderArea::full());
}
