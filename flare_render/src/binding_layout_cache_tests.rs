/// Unit tests for binding_layout_cache.rs

use crate::binding_layout_cache::BindingLayoutCache;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::*;
use std::hash::{BuildHasherDefault, Hasher};
use std::sync::Arc;

/// Every key hashes to the same bucket
#[derive(Default)]
struct CollidingHasher;

impl Hasher for CollidingHasher {
    fn finish(&self) -> u64 {
        42
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

fn camera_layout() -> BindingLayoutDesc {
    BindingLayoutDesc::new(vec![BindingSlotDesc::new(
        0,
        BindingType::UniformBuffer,
        ShaderStageFlags::VERTEX,
    )])
}

fn material_layout() -> BindingLayoutDesc {
    BindingLayoutDesc::new(vec![
        BindingSlotDesc::new(0, BindingType::UniformBuffer, ShaderStageFlags::FRAGMENT),
        BindingSlotDesc::new(1, BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT),
        BindingSlotDesc::new(2, BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT),
    ])
}

// ============================================================================
// IDEMPOTENCE
// ============================================================================

#[test]
fn test_equal_keys_return_identical_object() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();

    let first = cache.get_or_create(&device, &camera_layout()).unwrap();
    let second = cache.get_or_create(&device, &camera_layout()).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert_eq!(device.layouts_created(), 1);
}

#[test]
fn test_label_does_not_split_entries() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();

    let plain = cache.get_or_create(&device, &camera_layout()).unwrap();
    let labeled = cache
        .get_or_create(&device, &camera_layout().with_label("per-frame camera"))
        .unwrap();

    assert!(Arc::ptr_eq(&plain, &labeled));
    assert_eq!(cache.len(), 1);
}

// ============================================================================
// NON-INTERFERENCE
// ============================================================================

#[test]
fn test_distinct_keys_get_distinct_objects() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();

    let camera = cache.get_or_create(&device, &camera_layout()).unwrap();
    let material = cache.get_or_create(&device, &material_layout()).unwrap();

    assert!(!Arc::ptr_eq(&camera, &material));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_colliding_hashes_never_alias() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::with_hasher(BuildHasherDefault::<CollidingHasher>::default());

    let base = camera_layout();
    let mut variants = vec![base.clone()];
    for field in 0..4 {
        let mut changed = base.clone();
        let slot = &mut changed.entries[0];
        match field {
            0 => slot.binding = 1,
            1 => slot.binding_type = BindingType::StorageBuffer,
            2 => slot.count = 2,
            _ => slot.stage_flags = ShaderStageFlags::COMPUTE,
        }
        variants.push(changed);
    }

    let layouts: Vec<_> = variants
        .iter()
        .map(|desc| cache.get_or_create(&device, desc).unwrap())
        .collect();

    assert_eq!(cache.len(), variants.len());
    for (i, a) in layouts.iter().enumerate() {
        assert_eq!(a.desc().entries, variants[i].entries);
        for b in layouts.iter().skip(i + 1) {
            assert!(!Arc::ptr_eq(a, b));
        }
    }

    let again = cache.get_or_create(&device, &variants[3]).unwrap();
    assert!(Arc::ptr_eq(&again, &layouts[3]));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_get_or_create_creates_once() {
    let device = Arc::new(MockGraphicsDevice::new());
    let cache = Arc::new(BindingLayoutCache::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let device = Arc::clone(&device);
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.get_or_create(device.as_ref(), &material_layout()).unwrap())
        })
        .collect();

    let layouts: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

    assert_eq!(device.layouts_created(), 1);
    assert!(layouts.iter().all(|layout| Arc::ptr_eq(layout, &layouts[0])));
}

// ============================================================================
// CLEAR
// ============================================================================

#[test]
fn test_clear_after_release() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();

    let layout = cache.get_or_create(&device, &camera_layout()).unwrap();
    assert_eq!(cache.live_reference_count(), 1);
    drop(layout);
    assert_eq!(cache.live_reference_count(), 0);

    cache.clear().unwrap();
    assert!(cache.is_empty());
}

#[test]
#[should_panic(expected = "still referenced")]
fn test_clear_with_live_reference_is_fatal() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();

    let _held = cache.get_or_create(&device, &camera_layout()).unwrap();
    let _ = cache.clear();
}

#[test]
fn test_counts_survive_poisoned_lock() {
    let device = MockGraphicsDevice::new();
    let cache = BindingLayoutCache::new();
    let held = cache.get_or_create(&device, &camera_layout()).unwrap();

    let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _entries = cache.entries.lock().unwrap();
        panic!("creator died while holding the cache");
    }));
    assert!(poisoned.is_err());

    assert_eq!(cache.len(), 1);
    assert!(!cache.is_empty());
    assert_eq!(cache.live_reference_count(), 1);
    assert!(cache.get_or_create(&device, &material_layout()).is_err());
    drop(held);
}
