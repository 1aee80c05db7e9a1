/// Pipeline layout construction from shader reflection
///
/// Reflection from every stage is merged into one binding layout per set
/// index and one list of push constant ranges. Set layouts are resolved
/// through the binding layout cache so pipelines with identical interfaces
/// share layout objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::binding_layout_cache::BindingLayoutCache;
use crate::error::Result;
use crate::graphics_device::{
    BindingLayoutDesc, BindingSlotDesc, ComputePipelineDesc, GraphicsDevice,
    GraphicsPipelineDesc, Pipeline, PipelineLayoutDesc, PushConstantRange, Shader,
};
use crate::{engine_debug, engine_fatal};

/// Union of the bindings reflected by `shaders`, one layout per set index
///
/// Set indices with no bindings get an empty layout so that set numbers
/// stay dense. Stage flags of a binding used by several stages are merged.
pub fn merge_reflections(shaders: &[&dyn Shader]) -> Vec<BindingLayoutDesc> {
    let mut sets: BTreeMap<u32, BTreeMap<u32, BindingSlotDesc>> = BTreeMap::new();

    for shader in shaders {
        for reflected in &shader.reflection().bindings {
            let slots = sets.entry(reflected.set).or_default();
            match slots.get_mut(&reflected.slot.binding) {
                Some(existing) => {
                    if existing.binding_type != reflected.slot.binding_type
                        || existing.count != reflected.slot.count
                    {
                        engine_fatal!(
                            "flare::pipeline",
                            "Binding (set={}, binding={}) declared as {:?}[{}] and {:?}[{}] by different stages",
                            reflected.set,
                            reflected.slot.binding,
                            existing.binding_type,
                            existing.count,
                            reflected.slot.binding_type,
                            reflected.slot.count
                        );
                    }
                    existing.stage_flags |= reflected.slot.stage_flags;
                }
                None => {
                    slots.insert(reflected.slot.binding, reflected.slot);
                }
            }
        }
    }

    let set_count = sets.keys().next_back().map(|last| last + 1).unwrap_or(0);
    (0..set_count)
        .map(|set| {
            let entries = sets
                .get(&set)
                .map(|slots| slots.values().copied().collect())
                .unwrap_or_default();
            BindingLayoutDesc::new(entries)
        })
        .collect()
}

/// Merge push constant ranges by offset, sorted by offset
///
/// Ranges at the same offset must agree on their size.
pub fn merge_push_constant_ranges<'a>(
    ranges: impl IntoIterator<Item = &'a PushConstantRange>,
) -> Vec<PushConstantRange> {
    let mut by_offset: BTreeMap<u32, PushConstantRange> = BTreeMap::new();

    for range in ranges {
        match by_offset.get_mut(&range.offset) {
            Some(existing) => {
                if existing.size != range.size {
                    engine_fatal!(
                        "flare::pipeline",
                        "Push constant block at offset {} has size {} in {:?} but {} in {:?}",
                        range.offset,
                        existing.size,
                        existing.stages,
                        range.size,
                        range.stages
                    );
                }
                existing.stages |= range.stages;
            }
            None => {
                by_offset.insert(range.offset, *range);
            }
        }
    }

    by_offset.into_values().collect()
}

/// Resolve every set layout through the cache
pub fn build_pipeline_layout(
    device: &dyn GraphicsDevice,
    cache: &BindingLayoutCache,
    layouts: &[BindingLayoutDesc],
    push_constant_ranges: Vec<PushConstantRange>,
) -> Result<PipelineLayoutDesc> {
    let binding_layouts = layouts
        .iter()
        .map(|desc| cache.get_or_create(device, desc))
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineLayoutDesc {
        binding_layouts,
        push_constant_ranges,
    })
}

fn resolve_layout(
    device: &dyn GraphicsDevice,
    cache: &BindingLayoutCache,
    shaders: &[&dyn Shader],
    binding_layouts: Option<&Vec<BindingLayoutDesc>>,
    push_constant_ranges: Option<&Vec<PushConstantRange>>,
) -> Result<PipelineLayoutDesc> {
    let layouts = match binding_layouts {
        Some(explicit) => explicit.clone(),
        None => merge_reflections(shaders),
    };
    let ranges = match push_constant_ranges {
        Some(explicit) => merge_push_constant_ranges(explicit),
        None => merge_push_constant_ranges(
            shaders.iter().flat_map(|shader| shader.reflection().push_constants.iter()),
        ),
    };
    build_pipeline_layout(device, cache, &layouts, ranges)
}

/// Build a graphics pipeline whose layout comes from the cache
pub fn create_graphics_pipeline(
    device: &dyn GraphicsDevice,
    cache: &BindingLayoutCache,
    desc: &GraphicsPipelineDesc,
) -> Result<Arc<dyn Pipeline>> {
    let shaders: Vec<&dyn Shader> = desc.shaders().into_iter().map(|shader| &**shader).collect();
    let layout = resolve_layout(
        device,
        cache,
        &shaders,
        desc.binding_layouts.as_ref(),
        desc.push_constant_ranges.as_ref(),
    )?;

    engine_debug!(
        "flare::pipeline",
        "Creating graphics pipeline with {} sets, {} push constant ranges",
        layout.binding_layouts.len(),
        layout.push_constant_ranges.len()
    );
    device.create_graphics_pipeline(desc, layout)
}

/// Build a compute pipeline whose layout comes from the cache
pub fn create_compute_pipeline(
    device: &dyn GraphicsDevice,
    cache: &BindingLayoutCache,
    desc: &ComputePipelineDesc,
) -> Result<Arc<dyn Pipeline>> {
    let layout = resolve_layout(
        device,
        cache,
        &[&*desc.shader],
        desc.binding_layouts.as_ref(),
        desc.push_constant_ranges.as_ref(),
    )?;
    device.create_compute_pipeline(desc, layout)
}

#[cfg(test)]
#[path = "pipeline_layout_tests.rs"]
mod tests;
