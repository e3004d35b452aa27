//! Per-frame resources, recycled every [`MAX_FRAMES_IN_FLIGHT`] frames.
//!
//! Each slot owns a command buffer, an acquire semaphore, a fence that
//! starts signaled, and a mapped shader-data buffer with a stable device
//! address. A slot's buffer and command buffer are only touched after its
//! fence has been waited on. Slots live as long as the renderer and are not
//! affected by swapchain recreation.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkrender_rhi::buffer::{Buffer, BufferUsage};
use vkrender_rhi::command::{CommandBuffer, CommandPool};
use vkrender_rhi::device::Device;
use vkrender_rhi::sync::{Fence, Semaphore};
use vkrender_rhi::{RhiError, RhiResult};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::shader_data::ShaderData;

pub struct FrameSlot {
    command_buffer: CommandBuffer,
    image_acquired: Semaphore,
    fence: Fence,
    shader_data: Buffer,
    shader_data_address: vk::DeviceAddress,
}

impl FrameSlot {
    fn new(device: &Arc<Device>, command_buffer: CommandBuffer) -> RhiResult<Self> {
        let shader_data = Buffer::new(
            device.clone(),
            BufferUsage::ShaderData,
            ShaderData::SIZE as vk::DeviceSize,
        )?;
        let shader_data_address = shader_data.device_address().ok_or_else(|| {
            RhiError::InvalidHandle("Shader data buffer has no device address".to_string())
        })?;
        Ok(Self {
            command_buffer,
            image_acquired: Semaphore::new(device.clone())?,
            fence: Fence::new(device.clone(), true)?,
            shader_data,
            shader_data_address,
        })
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_acquired(&self) -> &Semaphore {
        &self.image_acquired
    }

    #[inline]
    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Address pushed to the vertex shader.
    #[inline]
    pub fn shader_data_address(&self) -> vk::DeviceAddress {
        self.shader_data_address
    }

    /// Overwrite the shader data. Only valid after the fence wait.
    pub fn write_shader_data(&self, data: &ShaderData) -> RhiResult<()> {
        self.shader_data.write(0, data)
    }
}

pub struct FrameRing {
    // Slots hold command buffers from `pool`, so they go first.
    slots: Vec<FrameSlot>,
    _pool: CommandPool,
}

impl FrameRing {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new(device.clone(), device.queue_family())?;
        let command_buffers = CommandBuffer::allocate_many(&pool, MAX_FRAMES_IN_FLIGHT as u32)?;

        let slots = command_buffers
            .into_iter()
            .enumerate()
            .map(|(i, command_buffer)| {
                let slot = FrameSlot::new(&device, command_buffer)?;
                debug!(
                    "Frame slot {}: shader data at {:#x}",
                    i, slot.shader_data_address
                );
                Ok(slot)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!("Frame ring created with {} slots", slots.len());
        Ok(Self { slots, _pool: pool })
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }
}
