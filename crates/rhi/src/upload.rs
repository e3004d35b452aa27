//! Scoped one-time GPU work: record, submit, block until done, release.
//!
//! Used for asset uploads at startup. Each call gets a fresh command buffer
//! and a throwaway fence, neither of which is visible to the render loop.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkrender_rhi::device::Device;
//! use vkrender_rhi::upload::UploadContext;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkrender_rhi::RhiError> {
//! let upload = UploadContext::new(device)?;
//! upload.submit_and_wait(|cmd| {
//!     // record barriers and copies on `cmd`
//!     let _ = cmd;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::RhiResult;
use crate::sync::Fence;

/// Transient command pool for one-shot submissions.
pub struct UploadContext {
    device: Arc<Device>,
    pool: CommandPool,
}

impl UploadContext {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new_transient(device.clone(), device.queue_family())?;
        Ok(Self { device, pool })
    }

    /// Record with `record`, submit, and wait for completion.
    ///
    /// Resources referenced by the recorded commands (staging buffers) may be
    /// released as soon as this returns. The command buffer is freed on every
    /// path, including errors from `record`.
    ///
    /// # Errors
    ///
    /// Propagates errors from `record`, submission and the fence wait.
    pub fn submit_and_wait<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        let cmd = CommandBuffer::allocate(&self.pool)?;
        let result = self.run(&cmd, record);
        // SAFETY: either the submission completed (fence waited) or it never
        // reached the queue; the buffer is not pending in both cases. After a
        // failed wait the device is lost and freeing is still permitted.
        unsafe { self.pool.free(cmd.handle()) };
        result
    }

    fn run<F>(&self, cmd: &CommandBuffer, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        cmd.begin()?;
        record(cmd)?;
        cmd.end()?;

        let fence = Fence::new(self.device.clone(), false)?;
        let cmd_infos = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd.handle())];
        let submit = vk::SubmitInfo2::default().command_buffer_infos(&cmd_infos);
        // SAFETY: the buffer is fully recorded and the fence is fresh.
        unsafe { self.device.submit(&[submit], fence.handle())? };
        fence.wait(u64::MAX)
    }
}
