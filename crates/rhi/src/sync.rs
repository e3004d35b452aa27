//! Fences and binary semaphores.
//!
//! - [`Fence`]: GPU-to-CPU, the host blocks on it.
//! - [`Semaphore`]: GPU-to-GPU ordering between acquire, submit and present;
//!   the host never inspects it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkrender_rhi::device::Device;
//! use vkrender_rhi::sync::Fence;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkrender_rhi::RhiError> {
//! let fence = Fence::new(device, true)?;
//! fence.wait(u64::MAX)?;
//! fence.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Owned binary semaphore.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: the device is live.
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: owners drain the device (or the relevant fence) before dropping.
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Owned fence.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled so the first wait returns at once.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: the device is live.
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// `TIMEOUT` or device loss.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        // SAFETY: the fence is owned by this device.
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: callers only reset after a successful wait, so it is not pending.
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: owners wait on the fence or the device before dropping.
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }
}
