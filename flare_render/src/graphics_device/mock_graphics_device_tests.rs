/// Unit tests for the mock graphics device itself

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::*;

#[test]
fn test_mock_command_list_records_in_order() {
    let device = MockGraphicsDevice::new();
    let mut cmd = device.create_command_list().unwrap();

    cmd.begin().unwrap();
    cmd.draw(3, 1, 0).unwrap();
    cmd.end().unwrap();

    let events = device.events();
    assert_eq!(events.len(), 3);
    assert!(events[0].ends_with(":begin"));
    assert!(events[1].ends_with(":draw 3 x1"));
    assert!(events[2].ends_with(":end"));
}

#[test]
fn test_mock_command_list_rejects_double_begin() {
    let device = MockGraphicsDevice::new();
    let mut cmd = device.create_command_list().unwrap();
    cmd.begin().unwrap();
    assert!(cmd.begin().is_err());
}

#[test]
fn test_mock_command_list_rejects_draw_outside_recording() {
    let device = MockGraphicsDevice::new();
    let mut cmd = device.create_command_list().unwrap();
    assert!(cmd.draw(3, 1, 0).is_err());
}

#[test]
fn test_mock_fence_wait_completes_pending_work() {
    let log = new_log();
    let mut swapchain = MockSwapchain::new(2, (64, 64), log.clone());
    let commands = MockCommandList::new(log.clone());

    assert!(swapchain.in_flight_fence(1).is_signaled().unwrap());
    swapchain.in_flight_fence(1).reset().unwrap();
    assert!(!swapchain.in_flight_fence(1).is_signaled().unwrap());
    swapchain.submit(1, &commands).unwrap();
    swapchain.in_flight_fence(1).wait().unwrap();
    assert!(swapchain.in_flight_fence(1).is_signaled().unwrap());

    let events = log.lock().unwrap().clone();
    assert_eq!(events, vec!["reset_fence1", "submit slot1", "wait_fence1", "gpu_complete1"]);
}

#[test]
#[should_panic(expected = "would never signal")]
fn test_mock_fence_reset_without_submit_never_signals() {
    let fence = MockFence::new(0, new_log());
    fence.reset().unwrap();
    let _ = fence.wait();
}

#[test]
fn test_mock_swapchain_wait_idle_leaves_unsubmitted_fence_unsignaled() {
    let mut swapchain = MockSwapchain::new(2, (64, 64), new_log());
    swapchain.in_flight_fence(2).reset().unwrap();

    swapchain.wait_idle().unwrap();
    assert!(!swapchain.in_flight_fence(2).is_signaled().unwrap());

    swapchain.recreate(64, 64).unwrap();
    assert!(swapchain.in_flight_fence(2).is_signaled().unwrap());
}

#[test]
fn test_mock_swapchain_round_robin_acquire() {
    let mut swapchain = MockSwapchain::new(2, (64, 64), new_log());
    let first = swapchain.acquire_next_image(0).unwrap();
    let second = swapchain.acquire_next_image(1).unwrap();
    let third = swapchain.acquire_next_image(2).unwrap();

    assert_eq!(first, AcquireOutcome::Acquired { image_index: 0, suboptimal: false });
    assert_eq!(second, AcquireOutcome::Acquired { image_index: 1, suboptimal: false });
    assert_eq!(third, AcquireOutcome::Acquired { image_index: 0, suboptimal: false });
}

#[test]
fn test_mock_swapchain_scripted_outcomes() {
    let mut swapchain = MockSwapchain::new(3, (64, 64), new_log());
    {
        let mut script = swapchain.script.lock().unwrap();
        script.acquires.push_back(AcquireOutcome::OutOfDate);
        script.presents.push_back(PresentOutcome::Suboptimal);
    }
    assert_eq!(swapchain.acquire_next_image(0).unwrap(), AcquireOutcome::OutOfDate);
    assert_eq!(swapchain.present(0, 0).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(swapchain.present(0, 0).unwrap(), PresentOutcome::Presented);
}

#[test]
fn test_mock_swapchain_recreate_resizes_images() {
    let mut swapchain = MockSwapchain::new(3, (64, 64), new_log());
    swapchain.recreate(128, 32).unwrap();
    assert_eq!(swapchain.extent(), (128, 32));
    assert!(swapchain.images().iter().all(|image| image.extent() == (128, 32)));
}

#[test]
fn test_mock_device_deduplicates_samplers() {
    let device = MockGraphicsDevice::new();
    let a = device.create_sampler(&SamplerDesc::linear_clamp()).unwrap();
    let b = device.create_sampler(&SamplerDesc::linear_clamp()).unwrap();
    let c = device.create_sampler(&SamplerDesc::nearest_clamp()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert!(!std::sync::Arc::ptr_eq(&a, &c));
}

#[test]
fn test_mock_device_framebuffer_attachment_count_checked() {
    let device = MockGraphicsDevice::new();
    let pass = device
        .create_render_pass(&RenderPassDesc {
            color_attachments: vec![AttachmentDesc::cleared(
                Format::R8G8B8A8_UNORM,
                SampleCount::S1,
                ImageLayout::ShaderReadOnly,
            )],
            depth_attachment: None,
            resolve_attachment: None,
        })
        .unwrap();
    assert!(device.create_framebuffer(&pass, &[], 16, 16).is_err());
}
