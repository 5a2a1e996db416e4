//! Buffer management for vertex, index, uniform and storage data
//!
//! Device-local buffers are filled through a staging copy; host-visible
//! buffers stay mapped for their whole lifetime.

use std::ptr::NonNull;

use ash::{vk, Device};
use bytemuck::Pod;

use super::memory::{align_up, find_memory_type};
use super::{VkResultExt, VulkanContext, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<NonNull<u8>>,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create an empty buffer".to_string(),
            });
        }

        let device = context.raw_device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.during("creating buffer")?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = find_memory_type(context.memory_properties(), requirements.memory_type_bits, properties)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                unsafe { device.allocate_memory(&alloc_info, None) }.during("allocating buffer memory")
            })
            .and_then(|memory| {
                match unsafe { device.bind_buffer_memory(buffer, memory, 0) }.during("binding buffer memory") {
                    Ok(()) => Ok(memory),
                    Err(e) => {
                        unsafe { device.free_memory(memory, None) };
                        Err(e)
                    }
                }
            });

        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        log::debug!("Created buffer: {} bytes, {:?}, {:?}", size, usage, properties);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Create a host-visible, coherent buffer that stays mapped
    pub fn host_visible(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let mut buffer = Self::new(
            context,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let ptr = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .during("mapping buffer memory")?;
        buffer.mapped = NonNull::new(ptr.cast::<u8>());
        Ok(buffer)
    }

    /// Create a device-local buffer holding `data`
    ///
    /// Goes through a staging buffer and a one-time copy; returns once the
    /// copy has finished and the staging buffer is gone.
    pub fn device_local_with_data<T: Pod>(
        context: &VulkanContext,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = bytes.len() as vk::DeviceSize;

        let mut staging = Self::host_visible(context, size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write(0, bytes)?;

        let destination = Self::new(
            context,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        context.upload_pool().submit_one_time(|recorder| {
            recorder.cmd_copy_buffer(staging.handle(), destination.handle(), size);
            Ok(())
        })?;

        Ok(destination)
    }

    /// Copy `data` into a mapped buffer at byte `offset`
    pub fn write<T: Pod>(&mut self, offset: vk::DeviceSize, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let Some(mapped) = self.mapped else {
            return Err(VulkanError::InvalidOperation {
                reason: "buffer is not host visible".to_string(),
            });
        };
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes at {} overruns buffer of {}", bytes.len(), offset, self.size),
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr().add(offset as usize), bytes.len());
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Byte offset of each frame slot's region within a shared buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    /// Bytes each slot exposes to shaders
    pub size: vk::DeviceSize,
    /// Distance between slot starts
    pub stride: vk::DeviceSize,
    /// Number of slots
    pub frames: usize,
}

impl SlotLayout {
    /// Lay out `frames` regions of `size` bytes, each starting on `alignment`
    pub fn new(size: vk::DeviceSize, alignment: vk::DeviceSize, frames: usize) -> Self {
        Self {
            size,
            stride: align_up(size, alignment),
            frames,
        }
    }

    /// Start of a slot's region
    pub fn offset(&self, slot: usize) -> vk::DeviceSize {
        self.stride * slot as vk::DeviceSize
    }

    /// Size of the whole backing buffer
    pub fn total_size(&self) -> vk::DeviceSize {
        self.stride * self.frames as vk::DeviceSize
    }
}

/// One mapped buffer partitioned into a region per frame slot
///
/// Slot `i` is only written after slot `i`'s fence has been waited on, so the
/// GPU never reads a region the CPU is filling.
pub struct PerFrameBuffer {
    buffer: Buffer,
    layout: SlotLayout,
}

impl PerFrameBuffer {
    /// Allocate `frames` regions of `size` bytes for the given usage
    pub fn new(
        context: &VulkanContext,
        frames: usize,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let limits = context.physical_device().limits();
        let mut alignment = 1;
        if usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER) {
            alignment = alignment.max(limits.min_uniform_buffer_offset_alignment);
        }
        if usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER) {
            alignment = alignment.max(limits.min_storage_buffer_offset_alignment);
        }

        let layout = SlotLayout::new(size, alignment, frames);
        let buffer = Buffer::host_visible(context, layout.total_size(), usage)?;

        Ok(Self { buffer, layout })
    }

    /// Overwrite a slot's region from the start
    pub fn write<T: Pod>(&mut self, slot: usize, data: &[T]) -> VulkanResult<()> {
        let len = std::mem::size_of_val(data) as vk::DeviceSize;
        if slot >= self.layout.frames || len > self.layout.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "write of {} bytes to slot {} exceeds {} slot(s) of {} bytes",
                    len, slot, self.layout.frames, self.layout.size
                ),
            });
        }
        self.buffer.write(self.layout.offset(slot), data)
    }

    /// Descriptor info covering one slot's region
    pub fn descriptor_info(&self, slot: usize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.handle(),
            offset: self.layout.offset(slot),
            range: self.layout.size,
        }
    }

    /// Slot layout
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_regions_are_aligned_and_disjoint() {
        for &(size, alignment) in &[(64, 256), (300, 256), (256, 256), (12, 16), (80, 1)] {
            let layout = SlotLayout::new(size, alignment, 3);
            for slot in 0..3 {
                let start = layout.offset(slot);
                assert_eq!(start % alignment, 0);
                if slot > 0 {
                    assert!(layout.offset(slot - 1) + layout.size <= start);
                }
                assert!(start + layout.size <= layout.total_size());
            }
        }
    }

    #[test]
    fn test_slot_layout_example() {
        let layout = SlotLayout::new(208, 64, 2);
        assert_eq!(layout.stride, 256);
        assert_eq!(layout.offset(1), 256);
        assert_eq!(layout.total_size(), 512);
    }
}
