//! GPU buffers backed by gpu-allocator.
//!
//! Every buffer the renderer creates is host-visible and persistently mapped:
//! the mesh is written once, the per-frame shader data every frame, and
//! staging buffers once per upload. The mapped pointer is stable for the
//! buffer's lifetime.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkrender_rhi::buffer::{Buffer, BufferUsage};
//! use vkrender_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkrender_rhi::RhiError> {
//! let data = [0u8; 256];
//! let staging = Buffer::new_with_data(device, BufferUsage::Staging, &data)?;
//! assert_eq!(staging.size(), 256);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a buffer is used for; decides usage flags and memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Interleaved vertex and index data in one buffer.
    Mesh,
    /// Per-frame block read by shaders through its device address.
    ShaderData,
    /// Source of a one-time copy.
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Mesh => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER
            }
            BufferUsage::ShaderData => vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        MemoryLocation::CpuToGpu
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Mesh => "mesh",
            BufferUsage::ShaderData => "shader data",
            BufferUsage::Staging => "staging",
        }
    }

    fn has_device_address(self) -> bool {
        self.to_vk_usage()
            .contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
    }
}

/// A `VkBuffer` with its allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
    address: Option<vk::DeviceAddress>,
}

impl Buffer {
    /// Create and bind a mapped buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Zero size is rejected; allocation failure is fatal to the caller.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        // SAFETY: the device is live and buffer_info is fully initialised.
        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        // SAFETY: the buffer was just created from this device.
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().lock().unwrap().allocate(&AllocationCreateDesc {
            name: usage.name(),
            requirements,
            location: usage.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the buffer was never bound or used.
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        // SAFETY: the allocation satisfies the buffer's requirements.
        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            address: None,
        };
        bound?;

        if usage.has_device_address() {
            this.address = Some(this.device.buffer_address(buffer));
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(this)
    }

    /// Create a buffer holding exactly `data`.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_bytes(0, data)?;
        Ok(buffer)
    }

    /// Copy `data` into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the write would run past the end of the buffer.
    pub fn write_bytes(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len(), self.size)?;

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        // SAFETY: the range was checked against the buffer size and the mapping
        // covers the whole allocation. Host-visible CpuToGpu memory is coherent.
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    /// Copy a plain-old-data value into the buffer at `offset`.
    pub fn write<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, value: &T) -> RhiResult<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// GPU address, present for [`BufferUsage::ShaderData`] buffers.
    #[inline]
    pub fn device_address(&self) -> Option<vk::DeviceAddress> {
        self.address
    }
}

fn check_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        ))),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: owners only drop buffers the GPU no longer reads.
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.device.allocator().lock().unwrap().free(allocation)
        {
            tracing::error!("Failed to free {} buffer allocation: {:?}", self.usage.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_usage_is_vertex_and_index() {
        let usage = BufferUsage::Mesh.to_vk_usage();
        assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
        assert!(usage.contains(vk::BufferUsageFlags::INDEX_BUFFER));
        assert!(!BufferUsage::Mesh.has_device_address());
    }

    #[test]
    fn test_shader_data_has_device_address() {
        assert!(BufferUsage::ShaderData.has_device_address());
        assert!(!BufferUsage::Staging.has_device_address());
    }

    #[test]
    fn test_all_buffers_host_visible() {
        for usage in [BufferUsage::Mesh, BufferUsage::ShaderData, BufferUsage::Staging] {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(8, 8, 16).is_ok());
        assert!(check_range(8, 9, 16).is_err());
        assert!(check_range(u64::MAX, 1, 16).is_err());
    }
}
