//! Command pools and command buffer recording.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkrender_rhi::command::{CommandBuffer, CommandPool};
//! use vkrender_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkrender_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.queue_family())?;
//! let cmd = CommandBuffer::allocate(&pool)?;
//! cmd.begin()?;
//! // ... record ...
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Owned `VkCommandPool`. Buffers allocated from it are freed with it.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Pool whose buffers can be reset individually; used for per-frame recording.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Pool for short-lived one-time-submit buffers.
    pub fn new_transient(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT,
        )
    }

    fn with_flags(
        device: Arc<Device>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);
        // SAFETY: the device is live.
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!("Command pool created ({:?})", flags);
        Ok(Self { device, pool })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn allocate(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        // SAFETY: the pool belongs to this device.
        Ok(unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? })
    }

    /// Return a buffer to the pool.
    ///
    /// # Safety
    ///
    /// `buffer` must come from this pool and must not be pending execution.
    pub unsafe fn free(&self, buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &[buffer])
        };
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // SAFETY: owners drain the queue before dropping the pool.
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
    }
}

/// A primary command buffer. Freed together with its pool.
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    pub fn allocate(pool: &CommandPool) -> RhiResult<Self> {
        let buffer = pool.allocate(1)?[0];
        Ok(Self {
            device: pool.device().clone(),
            buffer,
        })
    }

    /// Allocate `count` buffers in one call.
    pub fn allocate_many(pool: &CommandPool, count: u32) -> RhiResult<Vec<Self>> {
        Ok(pool
            .allocate(count)?
            .into_iter()
            .map(|buffer| Self {
                device: pool.device().clone(),
                buffer,
            })
            .collect())
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    // =========================================================================
    // Recording Control
    // =========================================================================

    /// Begin a one-time-submit recording.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: the buffer is in the initial state (fresh or reset).
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        // SAFETY: the buffer is recording.
        unsafe { self.device.handle().end_command_buffer(self.buffer)? };
        Ok(())
    }

    /// Return the buffer to the initial state.
    ///
    /// Only valid once the fence of its last submission has been waited on.
    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: see above; the pool was created with RESET_COMMAND_BUFFER.
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    // =========================================================================
    // Dynamic Rendering
    // =========================================================================

    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo<'_>) {
        // SAFETY: attachments referenced by rendering_info are in attachment layouts.
        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(self.buffer, rendering_info);
        }
    }

    pub fn end_rendering(&self) {
        // SAFETY: paired with begin_rendering.
        unsafe { self.device.handle().cmd_end_rendering(self.buffer) };
    }

    // =========================================================================
    // Binding and State
    // =========================================================================

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: recording; the pipeline outlives the submission.
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    pub fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        // SAFETY: recording; the set was written before recording started.
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        // SAFETY: recording.
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[offset]);
        }
    }

    pub fn bind_index_buffer(
        &self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        // SAFETY: recording.
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, offset, index_type);
        }
    }

    /// Set viewport and scissor to cover `extent`.
    pub fn set_viewport_and_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        // SAFETY: recording; the bound pipeline declares both states dynamic.
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device.handle().cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    pub fn push_constants<T: bytemuck::Pod>(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &T,
    ) {
        // SAFETY: recording; the layout declares a range covering these bytes.
        unsafe {
            self.device.handle().cmd_push_constants(
                self.buffer,
                layout,
                stages,
                offset,
                bytemuck::bytes_of(data),
            );
        }
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    pub fn draw_indexed(&self, index_count: u32, instance_count: u32) {
        // SAFETY: recording inside a rendering scope with pipeline and buffers bound.
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.buffer, index_count, instance_count, 0, 0, 0);
        }
    }

    // =========================================================================
    // Synchronization and Transfer
    // =========================================================================

    /// Record image barriers with synchronization2.
    pub fn image_barriers(&self, barriers: &[vk::ImageMemoryBarrier2<'_>]) {
        let dependency = vk::DependencyInfo::default().image_memory_barriers(barriers);
        // SAFETY: recording; every barrier names a live image.
        unsafe {
            self.device
                .handle()
                .cmd_pipeline_barrier2(self.buffer, &dependency);
        }
    }

    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        // SAFETY: recording; dst is in TRANSFER_DST_OPTIMAL.
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }
}
