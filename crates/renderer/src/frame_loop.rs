//! The steady-state frame loop.
//!
//! [`FrameLoop`] owns the ordering of a frame: which slot is current, when
//! its fence is waited on, when the shader data may be written, and when the
//! presentation chain has to be rebuilt. The GPU work itself sits behind
//! [`FrameBackend`], so the ordering can be exercised without a device.
//!
//! One call to [`FrameLoop::render`] performs, in order:
//!
//! 1. wait for the slot's fence
//! 2. reset the fence
//! 3. acquire a swapchain image
//! 4. write the slot's shader data
//! 5. record the frame (barriers, rendering scope, one instanced draw)
//! 6. submit, signalling the image's render-complete semaphore and the fence
//! 7. present
//! 8. advance to the next slot
//!
//! Input handling belongs between two calls, so step 4 always sees the
//! latest state.

use tracing::debug;

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::error::RendererResult;
use crate::shader_data::ShaderData;

/// Result of acquiring a swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// Image ready to render into. A suboptimal image is still rendered.
    Image { index: u32, suboptimal: bool },
    /// Surface changed; nothing was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Ok,
    /// Presented (or dropped) but the chain no longer matches the surface.
    RecreateRequired,
}

/// What a call to [`FrameLoop::render`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Zero-sized surface; nothing was touched.
    Skipped,
    /// Acquire reported an out-of-date chain; rebuilt on the next call.
    OutOfDate,
}

/// GPU operations driven by [`FrameLoop`].
///
/// `slot` is always below [`MAX_FRAMES_IN_FLIGHT`]; `image` is an index
/// returned by the preceding [`acquire`](FrameBackend::acquire).
pub trait FrameBackend {
    /// Block until the slot's last submission has completed.
    fn wait_slot(&mut self, slot: usize) -> RendererResult<()>;

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Acquire the next image, signalling the slot's acquire semaphore.
    fn acquire(&mut self, slot: usize) -> RendererResult<Acquired>;

    /// Re-signal a reset fence whose frame was abandoned before submission.
    fn release_slot(&mut self, slot: usize) -> RendererResult<()>;

    fn write_shader_data(&mut self, slot: usize, data: &ShaderData) -> RendererResult<()>;

    /// Record the slot's command buffer targeting `image`.
    fn record(&mut self, slot: usize, image: u32) -> RendererResult<()>;

    /// Submit the slot's commands: wait on its acquire semaphore, signal
    /// `image`'s render-complete semaphore and the slot's fence.
    fn submit(&mut self, slot: usize, image: u32) -> RendererResult<()>;

    /// Present `image` once its render-complete semaphore signals.
    fn present(&mut self, image: u32) -> RendererResult<Presented>;

    /// Rebuild the presentation chain for a `width` x `height` surface.
    /// Frame slots must survive untouched.
    fn recreate(&mut self, width: u32, height: u32) -> RendererResult<()>;
}

pub struct FrameLoop<B> {
    backend: B,
    slot: usize,
    width: u32,
    height: u32,
    resized: bool,
    recreate_pending: bool,
    frames_presented: u64,
}

impl<B: FrameBackend> FrameLoop<B> {
    /// `backend` must already hold a chain built for `width` x `height`.
    pub fn new(backend: B, width: u32, height: u32) -> Self {
        Self {
            backend,
            slot: 0,
            width,
            height,
            resized: false,
            recreate_pending: false,
            frames_presented: 0,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// True when the chain will be rebuilt before the next frame.
    pub fn recreate_pending(&self) -> bool {
        self.resized || self.recreate_pending
    }

    /// Record a new surface size. The chain is rebuilt at the start of the
    /// next [`render`](Self::render) that sees a non-zero size.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resized = true;
    }

    /// Run one frame.
    ///
    /// # Errors
    ///
    /// Out-of-date and suboptimal chains are handled here; every error
    /// returned is fatal.
    pub fn render(&mut self, data: &ShaderData) -> RendererResult<FrameOutcome> {
        if std::mem::take(&mut self.resized) {
            self.recreate_pending = true;
        }
        if self.width == 0 || self.height == 0 {
            return Ok(FrameOutcome::Skipped);
        }
        if self.recreate_pending {
            debug!("Recreating presentation chain at {}x{}", self.width, self.height);
            self.backend.recreate(self.width, self.height)?;
            self.recreate_pending = false;
        }

        let slot = self.slot;
        self.backend.wait_slot(slot)?;
        self.backend.reset_slot(slot)?;

        let (image, suboptimal) = match self.backend.acquire(slot)? {
            Acquired::Image { index, suboptimal } => (index, suboptimal),
            Acquired::OutOfDate => {
                debug!("Swapchain out of date on acquire");
                self.backend.release_slot(slot)?;
                self.recreate_pending = true;
                return Ok(FrameOutcome::OutOfDate);
            }
        };

        self.backend.write_shader_data(slot, data)?;
        self.backend.record(slot, image)?;
        self.backend.submit(slot, image)?;
        let presented = self.backend.present(image)?;

        self.slot = (slot + 1) % MAX_FRAMES_IN_FLIGHT;
        self.frames_presented += 1;

        if suboptimal || presented == Presented::RecreateRequired {
            debug!(
                "Swapchain suboptimal or out of date after frame {}",
                self.frames_presented
            );
            self.recreate_pending = true;
        }
        Ok(FrameOutcome::Presented)
    }
}
