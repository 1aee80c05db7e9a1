/// Binding layouts and binding sets
///
/// A binding layout describes which resource slots a pipeline expects and at
/// which stages they are visible. A binding set fills those slots with actual
/// resources; writes are buffered until `commit`.

use std::sync::{Arc, Mutex};
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, Image, ImageLayout, Sampler};

/// Kind of resource bound to a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
    StorageImage,
}

impl BindingType {
    pub fn is_buffer(&self) -> bool {
        matches!(self, BindingType::UniformBuffer | BindingType::StorageBuffer)
    }
}

bitflags! {
    /// Shader stages a binding or push constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// One slot of a binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSlotDesc {
    /// Binding index within the set
    pub binding: u32,
    pub binding_type: BindingType,
    /// Array length (1 for a single resource)
    pub count: u32,
    pub stage_flags: ShaderStageFlags,
}

impl BindingSlotDesc {
    pub fn new(binding: u32, binding_type: BindingType, stage_flags: ShaderStageFlags) -> Self {
        Self { binding, binding_type, count: 1, stage_flags }
    }
}

/// Description of a binding layout
#[derive(Debug, Clone, Default)]
pub struct BindingLayoutDesc {
    /// Slots in declaration order
    pub entries: Vec<BindingSlotDesc>,
    /// Diagnostic name, not part of the layout identity
    pub label: Option<String>,
}

impl BindingLayoutDesc {
    pub fn new(entries: Vec<BindingSlotDesc>) -> Self {
        Self { entries, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Identity of the layout: the ordered slot list, nothing else
    pub fn key(&self) -> BindingLayoutKey {
        BindingLayoutKey { entries: self.entries.clone() }
    }

    pub fn slot(&self, binding: u32) -> Option<&BindingSlotDesc> {
        self.entries.iter().find(|entry| entry.binding == binding)
    }
}

/// Cache key of a binding layout
///
/// Hash and equality are element-wise over the ordered slot list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingLayoutKey {
    entries: Vec<BindingSlotDesc>,
}

impl BindingLayoutKey {
    pub fn entries(&self) -> &[BindingSlotDesc] {
        &self.entries
    }
}

/// Immutable binding layout object
pub trait BindingLayout: Send + Sync {
    fn desc(&self) -> &BindingLayoutDesc;
}

// ===== BINDING SET =====

/// A buffered write into a binding set
#[derive(Clone)]
pub enum BindingWrite {
    Buffer {
        binding: u32,
        array_element: u32,
        buffer: Arc<dyn Buffer>,
        offset: u64,
        /// Bound range in bytes (None = rest of the buffer)
        range: Option<u64>,
    },
    Image {
        binding: u32,
        array_element: u32,
        image: Arc<dyn Image>,
        /// Required for combined image samplers
        sampler: Option<Arc<dyn Sampler>>,
        layout: ImageLayout,
    },
}

impl BindingWrite {
    pub fn binding(&self) -> u32 {
        match self {
            BindingWrite::Buffer { binding, .. } | BindingWrite::Image { binding, .. } => *binding,
        }
    }

    pub fn array_element(&self) -> u32 {
        match self {
            BindingWrite::Buffer { array_element, .. }
            | BindingWrite::Image { array_element, .. } => *array_element,
        }
    }
}

impl std::fmt::Debug for BindingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingWrite::Buffer { binding, array_element, offset, range, .. } => f
                .debug_struct("Buffer")
                .field("binding", binding)
                .field("array_element", array_element)
                .field("offset", offset)
                .field("range", range)
                .finish(),
            BindingWrite::Image { binding, array_element, layout, sampler, .. } => f
                .debug_struct("Image")
                .field("binding", binding)
                .field("array_element", array_element)
                .field("layout", layout)
                .field("has_sampler", &sampler.is_some())
                .finish(),
        }
    }
}

/// Write buffering shared by binding set implementations
///
/// Pending writes are validated against the layout when queued. Committed
/// writes keep their resources alive for as long as the set exists.
pub struct BindingWriteQueue {
    layout: BindingLayoutDesc,
    pending: Mutex<Vec<BindingWrite>>,
    bound: Mutex<FxHashMap<(u32, u32), BindingWrite>>,
}

impl BindingWriteQueue {
    pub fn new(layout: &BindingLayoutDesc) -> Self {
        Self {
            layout: layout.clone(),
            pending: Mutex::new(Vec::new()),
            bound: Mutex::new(FxHashMap::default()),
        }
    }

    /// Queue a write; a slot missing from the layout or of another kind is fatal
    pub fn push(&self, write: BindingWrite) -> Result<()> {
        let Some(slot) = self.layout.slot(write.binding()) else {
            crate::engine_fatal!(
                "flare::binding",
                "Binding {} does not exist in layout {:?}",
                write.binding(),
                self.layout.label
            );
        };

        let kind_matches = match &write {
            BindingWrite::Buffer { .. } => slot.binding_type.is_buffer(),
            BindingWrite::Image { sampler, .. } => match slot.binding_type {
                BindingType::CombinedImageSampler => sampler.is_some(),
                BindingType::StorageImage => true,
                _ => false,
            },
        };
        if !kind_matches {
            crate::engine_fatal!(
                "flare::binding",
                "Write {:?} does not match slot type {:?}",
                write,
                slot.binding_type
            );
        }
        if write.array_element() >= slot.count {
            crate::engine_fatal!(
                "flare::binding",
                "Array element {} out of range for binding {} (count = {})",
                write.array_element(),
                slot.binding,
                slot.count
            );
        }

        lock(&self.pending)?.push(write);
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        inspect(&self.pending).len()
    }

    /// Take all pending writes for the backend to apply
    pub fn take_pending(&self) -> Result<Vec<BindingWrite>> {
        Ok(std::mem::take(&mut *lock(&self.pending)?))
    }

    /// Record applied writes so their resources stay alive
    pub fn retain(&self, writes: Vec<BindingWrite>) -> Result<()> {
        let mut bound = lock(&self.bound)?;
        for write in writes {
            bound.insert((write.binding(), write.array_element()), write);
        }
        Ok(())
    }

    /// Number of (binding, element) pairs holding a committed resource
    pub fn bound_count(&self) -> usize {
        inspect(&self.bound).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::BackendError("binding write queue lock poisoned".to_string()))
}

/// Read-only access for counters: a poisoned lock is logged, never reported as empty
fn inspect<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        crate::engine_error!("flare::binding", "Binding write queue lock poisoned, reading through it");
        poisoned.into_inner()
    })
}

/// A concrete set of resources for one binding layout
pub trait BindingSet: Send + Sync {
    fn layout(&self) -> &Arc<dyn BindingLayout>;

    /// Queue a write; nothing reaches the GPU until `commit`
    fn write(&self, write: BindingWrite) -> Result<()>;

    /// Apply every queued write in one batch
    fn commit(&self) -> Result<()>;

    fn pending_write_count(&self) -> usize;

    fn write_buffer(&self, binding: u32, buffer: &Arc<dyn Buffer>, offset: u64, range: Option<u64>) -> Result<()> {
        self.write(BindingWrite::Buffer {
            binding,
            array_element: 0,
            buffer: Arc::clone(buffer),
            offset,
            range,
        })
    }

    fn write_image(
        &self,
        binding: u32,
        image: &Arc<dyn Image>,
        sampler: &Arc<dyn Sampler>,
        layout: ImageLayout,
    ) -> Result<()> {
        self.write(BindingWrite::Image {
            binding,
            array_element: 0,
            image: Arc::clone(image),
            sampler: Some(Arc::clone(sampler)),
            layout,
        })
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
