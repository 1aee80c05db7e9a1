/// Buffer trait and buffer descriptor

use bitflags::bitflags;
use bytemuck::Pod;
use crate::error::Result;

bitflags! {
    /// How a buffer is used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Memory placement of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not mappable
    GpuOnly,
    /// Host-visible, written by the CPU every frame
    CpuToGpu,
    /// Host-visible, read back by the CPU
    GpuToCpu,
}

impl MemoryLocation {
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryLocation::GpuOnly)
    }
}

/// Descriptor for creating a buffer
///
/// A buffer is an array of `instance_count` elements, each padded to
/// `min_offset_alignment` so that any element can be bound at its own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size of one element in bytes
    pub instance_size: u64,
    /// Number of elements
    pub instance_count: u32,
    pub usage: BufferUsage,
    pub memory: MemoryLocation,
    /// Minimum offset alignment (0 or 1 means no padding)
    pub min_offset_alignment: u64,
}

impl BufferDesc {
    /// Single-element buffer of `size` bytes
    pub fn sized(size: u64, usage: BufferUsage, memory: MemoryLocation) -> Self {
        Self {
            instance_size: size,
            instance_count: 1,
            usage,
            memory,
            min_offset_alignment: 1,
        }
    }

    /// Element size rounded up to the alignment
    pub fn aligned_instance_size(&self) -> u64 {
        align_up(self.instance_size, self.min_offset_alignment)
    }

    /// Total size in bytes: `aligned_instance_size * instance_count`
    pub fn effective_size(&self) -> u64 {
        self.aligned_instance_size() * self.instance_count as u64
    }
}

/// Round `size` up to the next multiple of `alignment`
pub fn align_up(size: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// Abort on a write outside the buffer or into unmapped memory
pub fn validate_write(desc: &BufferDesc, mapped: bool, offset: u64, len: usize) {
    if !mapped {
        crate::engine_fatal!("flare::buffer", "Write of {} bytes to a buffer that is not mapped", len);
    }
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= desc.effective_size() => {}
        _ => crate::engine_fatal!(
            "flare::buffer",
            "Write of {} bytes at offset {} exceeds buffer size {}",
            len,
            offset,
            desc.effective_size()
        ),
    }
}

/// Abort on an element index past `instance_count`
pub fn validate_index(desc: &BufferDesc, index: u32) {
    if index >= desc.instance_count {
        crate::engine_fatal!(
            "flare::buffer",
            "Element index {} out of range (instance_count = {})",
            index,
            desc.instance_count
        );
    }
}

/// GPU buffer
///
/// Destroyed when the last `Arc` is dropped. Map/unmap calls must be paired.
pub trait Buffer: Send + Sync {
    fn desc(&self) -> &BufferDesc;

    /// Total size in bytes
    fn size(&self) -> u64 {
        self.desc().effective_size()
    }

    /// Map the buffer into host memory (fatal if already mapped)
    fn map(&self) -> Result<()>;

    /// Unmap the buffer (fatal if not mapped)
    fn unmap(&self);

    fn is_mapped(&self) -> bool;

    /// Copy bytes into the mapped range
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy bytes into element `index`
    fn write_to_index(&self, index: u32, data: &[u8]) -> Result<()> {
        validate_index(self.desc(), index);
        self.write(index as u64 * self.desc().aligned_instance_size(), data)
    }

    /// Make host writes visible to the device
    fn flush(&self) -> Result<()>;

    /// Flush only element `index`
    fn flush_index(&self, index: u32) -> Result<()>;
}

impl<'a> dyn Buffer + 'a {
    /// Copy one plain-old-data value (uniform block, instance data) into element `index`
    pub fn write_pod<T: Pod>(&self, index: u32, value: &T) -> Result<()> {
        self.write_to_index(index, bytemuck::bytes_of(value))
    }

    /// Copy a slice of plain-old-data values (vertices, indices) at a byte offset
    pub fn write_slice<T: Pod>(&self, offset: u64, values: &[T]) -> Result<()> {
        self.write(offset, bytemuck::cast_slice(values))
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
