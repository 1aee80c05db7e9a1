//! Unit tests for the Vulkan conversion functions
//!
//! Pure mappings only, no GPU required.

use super::*;

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_color_formats_to_vk() {
    assert_eq!(format_to_vk(Format::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(format_to_vk(Format::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(format_to_vk(Format::R16G16B16A16_SFLOAT), vk::Format::R16G16B16A16_SFLOAT);
}

#[test]
fn test_depth_formats_to_vk() {
    assert_eq!(format_to_vk(Format::D16_UNORM), vk::Format::D16_UNORM);
    assert_eq!(format_to_vk(Format::D32_SFLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(format_to_vk(Format::D24_UNORM_S8_UINT), vk::Format::D24_UNORM_S8_UINT);
    assert_eq!(format_to_vk(Format::D32_SFLOAT_S8_UINT), vk::Format::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_vertex_attribute_formats_to_vk() {
    assert_eq!(format_to_vk(Format::R32G32_SFLOAT), vk::Format::R32G32_SFLOAT);
    assert_eq!(format_to_vk(Format::R32G32B32_SFLOAT), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(format_to_vk(Format::R32_UINT), vk::Format::R32_UINT);
}

#[test]
fn test_surface_formats_from_vk() {
    assert_eq!(format_from_vk(vk::Format::B8G8R8A8_SRGB), Some(Format::B8G8R8A8_SRGB));
    assert_eq!(format_from_vk(vk::Format::R8G8B8A8_UNORM), Some(Format::R8G8B8A8_UNORM));
    assert_eq!(format_from_vk(vk::Format::A2B10G10R10_UNORM_PACK32), None);
}

#[test]
fn test_sample_counts() {
    assert_eq!(sample_count_to_vk(SampleCount::S1), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(SampleCount::S4), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count_to_vk(SampleCount::S8), vk::SampleCountFlags::TYPE_8);
}

// ============================================================================
// USAGE FLAGS
// ============================================================================

#[test]
fn test_image_usage_combines_flags() {
    let flags = image_usage_to_vk(ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST | ImageUsage::TRANSFER_SRC);

    assert_eq!(
        flags,
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC
    );
    assert!(!flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
}

#[test]
fn test_buffer_usage_combines_flags() {
    let flags = buffer_usage_to_vk(BufferUsage::VERTEX | BufferUsage::INDEX);

    assert_eq!(flags, vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER);
    assert_eq!(buffer_usage_to_vk(BufferUsage::empty()), vk::BufferUsageFlags::empty());
}

#[test]
fn test_stage_flags() {
    assert_eq!(
        stage_flags_to_vk(ShaderStageFlags::ALL_GRAPHICS),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(shader_stage_to_vk(ShaderStage::Compute), vk::ShaderStageFlags::COMPUTE);
}

#[test]
fn test_aspect_for_depth_stencil() {
    assert_eq!(
        aspect_to_vk(ImageAspect::DepthStencil),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert_eq!(aspect_to_vk(ImageAspect::Depth), vk::ImageAspectFlags::DEPTH);
}

// ============================================================================
// LAYOUT TRANSITIONS
// ============================================================================

#[test]
fn test_upload_transition_masks() {
    let masks = layout_transition_masks(ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();

    assert_eq!(masks.src_access, vk::AccessFlags::empty());
    assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
}

#[test]
fn test_sampling_after_upload_masks() {
    let masks = layout_transition_masks(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly).unwrap();

    assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
    assert!(masks.dst_stage.contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
}

#[test]
fn test_depth_attachment_masks() {
    let masks = layout_transition_masks(ImageLayout::Undefined, ImageLayout::DepthStencilAttachment).unwrap();

    assert!(masks.dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert_eq!(masks.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
}

#[test]
fn test_unsupported_transitions() {
    assert!(layout_transition_masks(ImageLayout::ShaderReadOnly, ImageLayout::Undefined).is_none());
    assert!(layout_transition_masks(ImageLayout::PresentSrc, ImageLayout::TransferDst).is_none());
}

// ============================================================================
// PIPELINE STATE
// ============================================================================

#[test]
fn test_compare_ops() {
    assert_eq!(compare_op_to_vk(CompareOp::Less), vk::CompareOp::LESS);
    assert_eq!(compare_op_to_vk(CompareOp::LessOrEqual), vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(compare_op_to_vk(CompareOp::Always), vk::CompareOp::ALWAYS);
}

#[test]
fn test_blend_state() {
    assert_eq!(blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_op_to_vk(BlendOp::ReverseSubtract), vk::BlendOp::REVERSE_SUBTRACT);
}

#[test]
fn test_rasterization_state() {
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
    assert_eq!(front_face_to_vk(FrontFace::Clockwise), vk::FrontFace::CLOCKWISE);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Line), vk::PolygonMode::LINE);
}

#[test]
fn test_binding_types() {
    assert_eq!(binding_type_to_vk(BindingType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        binding_type_to_vk(BindingType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
    assert_eq!(binding_type_to_vk(BindingType::StorageImage), vk::DescriptorType::STORAGE_IMAGE);
}

// ============================================================================
// PRESENTATION
// ============================================================================

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let supported = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

    assert_eq!(choose_present_mode(PresentMode::Mailbox, &supported), vk::PresentModeKHR::FIFO);
    assert_eq!(choose_present_mode(PresentMode::Immediate, &supported), vk::PresentModeKHR::IMMEDIATE);
}

#[test]
fn test_extent_uses_current_extent_when_fixed() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D { width: 800, height: 600 },
        ..Default::default()
    };

    assert_eq!(choose_extent(&capabilities, 1920, 1080), vk::Extent2D { width: 800, height: 600 });
}

#[test]
fn test_extent_clamped_when_surface_defers() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 1024, height: 1024 },
        ..Default::default()
    };

    assert_eq!(choose_extent(&capabilities, 1920, 600), vk::Extent2D { width: 1024, height: 600 });
}

#[test]
fn test_image_count_respects_maximum() {
    let unbounded = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 0,
        ..Default::default()
    };
    let bounded = vk::SurfaceCapabilitiesKHR {
        min_image_count: 3,
        max_image_count: 3,
        ..Default::default()
    };

    assert_eq!(choose_image_count(&unbounded), 3);
    assert_eq!(choose_image_count(&bounded), 3);
}

#[test]
fn test_surface_format_prefers_srgb() {
    let formats = [
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    ];

    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_surface_format_skips_unknown_formats() {
    let formats = [
        vk::SurfaceFormatKHR {
            format: vk::Format::A2B10G10R10_UNORM_PACK32,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    ];

    assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
    assert!(choose_surface_format(&formats[..1]).is_none());
}
