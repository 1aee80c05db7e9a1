//! Unit tests for the Engine instance and the global logger API
//!
//! The logger is process-wide; tests that swap it are marked #[serial].

use crate::flare::log::{LogEntry, LogSeverity, Logger};
use crate::flare::{Engine, FrameOutcome};
use crate::graphics_device::mock_graphics_device::{new_log, EventLog, MockGraphicsDevice, MockShader, MockSwapchain};
use crate::graphics_device::*;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use winit::dpi::PhysicalSize;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String, String)>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap()
            .push((entry.severity, entry.source.clone(), entry.message.clone()));
    }
}

fn init_engine() -> (Engine, EventLog) {
    let log = new_log();
    let device = Arc::new(MockGraphicsDevice::with_log(log.clone()));
    let swapchain = MockSwapchain::new(3, (1280, 720), log.clone());
    let config = Config {
        app_name: "engine tests".to_string(),
        command_queue_bytes: 64 * 1024,
        ..Config::default()
    };
    let engine = Engine::init(device, Box::new(swapchain), config).unwrap();
    (engine, log)
}

fn camera_layout() -> BindingLayoutDesc {
    BindingLayoutDesc::new(vec![BindingSlotDesc::new(
        0,
        BindingType::UniformBuffer,
        ShaderStageFlags::VERTEX,
    )])
}

fn textured_pipeline_desc(engine: &Engine) -> GraphicsPipelineDesc {
    let vertex = MockShader::new(
        ShaderStage::Vertex,
        ShaderReflection {
            bindings: vec![ReflectedBinding { set: 0, slot: camera_layout().entries[0], name: None }],
            push_constants: vec![],
        },
    );
    let fragment = MockShader::new(
        ShaderStage::Fragment,
        ShaderReflection {
            bindings: vec![ReflectedBinding {
                set: 1,
                slot: BindingSlotDesc::new(0, BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT),
                name: Some("albedo".to_string()),
            }],
            push_constants: vec![],
        },
    );
    let pass = engine
        .device()
        .create_render_pass(&RenderPassDesc {
            color_attachments: vec![AttachmentDesc::cleared(
                Format::B8G8R8A8_SRGB,
                SampleCount::S1,
                ImageLayout::PresentSrc,
            )],
            depth_attachment: None,
            resolve_attachment: None,
        })
        .unwrap();
    GraphicsPipelineDesc::new(vertex, Some(fragment), pass)
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_init_uses_swapchain_extent_and_config() {
    let (engine, _log) = init_engine();

    assert_eq!(engine.renderer().surface().extent(), (1280, 720));
    assert_eq!(engine.config().app_name, "engine tests");
    assert!(engine.layout_cache().is_empty());
}

#[test]
fn test_render_frame_presents() {
    let (mut engine, log) = init_engine();
    engine.renderer_mut().submit(|recorder, _| recorder.draw(3, 1, 0));

    assert_eq!(engine.render_frame().unwrap(), FrameOutcome::Presented(PresentOutcome::Presented));
    assert!(log.lock().unwrap().iter().any(|e| e == "present image0 Presented"));
}

#[test]
fn test_resize_applies_at_next_frame() {
    let (mut engine, log) = init_engine();

    engine.resize(PhysicalSize::new(1920, 1080));
    assert_eq!(engine.renderer().surface().extent(), (1280, 720));

    assert_eq!(engine.render_frame().unwrap(), FrameOutcome::Skipped);
    assert_eq!(engine.renderer().surface().extent(), (1920, 1080));
    assert!(log.lock().unwrap().iter().any(|e| e == "recreate 1920x1080"));
}

#[test]
fn test_minimized_window_skips_frames() {
    let (mut engine, _log) = init_engine();

    engine.resize(PhysicalSize::new(0, 0));

    assert_eq!(engine.render_frame().unwrap(), FrameOutcome::Skipped);
}

#[test]
fn test_shutdown_waits_then_releases_layouts() {
    let (engine, log) = init_engine();
    let set = engine.create_binding_set(&camera_layout()).unwrap();
    drop(set);
    assert_eq!(engine.layout_cache().len(), 1);

    engine.shutdown().unwrap();

    let events = log.lock().unwrap().clone();
    assert_eq!(events, vec!["device_wait_idle", "wait_idle"]);
}

#[test]
#[should_panic(expected = "still referenced")]
fn test_shutdown_with_live_pipeline_is_fatal() {
    let (engine, _log) = init_engine();
    let _pipeline = engine.create_graphics_pipeline(&textured_pipeline_desc(&engine)).unwrap();

    let _ = engine.shutdown();
}

// ============================================================================
// CONVENIENCE
// ============================================================================

#[test]
fn test_binding_sets_share_cached_layout() {
    let (engine, _log) = init_engine();

    let first = engine.create_binding_set(&camera_layout()).unwrap();
    let second = engine.create_binding_set(&camera_layout().with_label("camera")).unwrap();

    assert!(Arc::ptr_eq(first.layout(), second.layout()));
    assert_eq!(engine.layout_cache().len(), 1);
}

#[test]
fn test_pipeline_layout_matches_binding_set_layout() {
    let (engine, _log) = init_engine();

    let pipeline = engine.create_graphics_pipeline(&textured_pipeline_desc(&engine)).unwrap();
    let camera = engine.create_binding_set(&camera_layout()).unwrap();

    assert!(Arc::ptr_eq(&pipeline.layout().binding_layouts[0], camera.layout()));
    assert_eq!(engine.layout_cache().len(), 2);
}

#[test]
fn test_compute_pipeline_through_engine() {
    let (engine, _log) = init_engine();
    let shader = MockShader::new(ShaderStage::Compute, ShaderReflection::default());

    let pipeline = engine
        .create_compute_pipeline(&ComputePipelineDesc {
            shader,
            binding_layouts: None,
            push_constant_ranges: None,
        })
        .unwrap();

    assert_eq!(pipeline.bind_point(), PipelineBindPoint::Compute);
    assert!(pipeline.layout().binding_layouts.is_empty());
}

// ============================================================================
// LOGGER API
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_engine_messages() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });

    let (engine, _log) = init_engine();
    engine.shutdown().unwrap();

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert!(captured
        .iter()
        .any(|(severity, source, message)| *severity == LogSeverity::Info
            && source == "flare::engine"
            && message.contains("engine tests")));
    assert!(captured.iter().any(|(_, source, _)| source == "flare::renderer"));
}

#[test]
#[serial]
fn test_log_detailed_records_location() {
    let locations = Arc::new(Mutex::new(Vec::new()));

    struct LocationLogger(Arc<Mutex<Vec<(Option<&'static str>, Option<u32>)>>>);
    impl Logger for LocationLogger {
        fn log(&self, entry: &LogEntry) {
            if entry.source == "flare::test" {
                self.0.lock().unwrap().push((entry.file, entry.line));
            }
        }
    }

    Engine::set_logger(LocationLogger(locations.clone()));
    Engine::log(LogSeverity::Info, "flare::test", "plain".to_string());
    Engine::log_detailed(LogSeverity::Error, "flare::test", "located".to_string(), "engine.rs", 42);
    Engine::reset_logger();

    assert_eq!(
        *locations.lock().unwrap(),
        vec![(None, None), (Some("engine.rs"), Some(42))]
    );
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_sink() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });
    Engine::reset_logger();

    Engine::log(LogSeverity::Debug, "flare::test", "after reset".to_string());

    assert!(!entries
        .lock()
        .unwrap()
        .iter()
        .any(|(_, source, _)| source == "flare::test"));
}
