//! Swapchain, per-image render-complete semaphores and the depth buffer.
//!
//! Everything here depends on the surface size and is rebuilt as one unit
//! by [`PresentationChain::recreate`]. Render-complete semaphores are kept
//! per swapchain image rather than per frame slot: the presentation engine
//! may hand images back in any order, and a semaphore can only be reused
//! once the present that waited on it has consumed it.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use vkrender_platform::Surface;
use vkrender_rhi::device::Device;
use vkrender_rhi::image::Image;
use vkrender_rhi::instance::Instance;
use vkrender_rhi::swapchain::Swapchain;
use vkrender_rhi::sync::Semaphore;
use vkrender_rhi::{RhiError, RhiResult};

use crate::frame_loop::{Acquired, Presented};

pub struct PresentationChain {
    device: Arc<Device>,
    render_complete: Vec<Semaphore>,
    depth: Option<Image>,
    swapchain: Swapchain,
    depth_format: vk::Format,
}

impl PresentationChain {
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(
            instance,
            device.clone(),
            surface.handle(),
            surface.loader(),
            extent.width,
            extent.height,
        )?;
        let depth = Image::depth(device.clone(), depth_format, swapchain.extent())?;
        let render_complete = create_semaphores(&device, swapchain.image_count())?;

        Ok(Self {
            device,
            render_complete,
            depth: Some(depth),
            swapchain,
            depth_format,
        })
    }

    /// Tear down and rebuild for a new surface size.
    ///
    /// Waits for the device to go idle, then releases the semaphores, the old
    /// image views and the depth image before the new swapchain is built from
    /// the old one. The old swapchain is destroyed once the new one exists,
    /// and the depth image and per-image semaphores are rebuilt to match it.
    pub fn recreate(&mut self, surface: &Surface, extent: vk::Extent2D) -> RhiResult<()> {
        self.device.wait_idle()?;

        let old_count = self.swapchain.image_count();
        self.render_complete.clear();

        let swapchain = &mut self.swapchain;
        let device = &self.device;
        let depth_format = self.depth_format;
        rebuild_depth_around::<_, RhiError>(
            &mut self.depth,
            || {
                swapchain.recreate(surface.handle(), surface.loader(), extent.width, extent.height)?;
                Ok(swapchain.extent())
            },
            |extent| Image::depth(device.clone(), depth_format, extent),
        )?;
        self.render_complete = create_semaphores(&self.device, self.swapchain.image_count())?;

        let new_extent = self.swapchain.extent();
        info!(
            "Presentation chain rebuilt: {}x{}, {} -> {} images",
            new_extent.width,
            new_extent.height,
            old_count,
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Acquire the next image, signalling `image_acquired`.
    pub fn acquire(&self, image_acquired: vk::Semaphore) -> RhiResult<Acquired> {
        match self.swapchain.acquire_next_image(image_acquired) {
            Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
            Err(e) if e.is_recreate_required() => Ok(Acquired::OutOfDate),
            Err(e) => Err(e),
        }
    }

    /// Present `image` after its render-complete semaphore signals.
    pub fn present(&self, image: u32) -> RhiResult<Presented> {
        let wait = self.render_complete(image)?;
        match self.swapchain.present(image, wait) {
            Ok(false) => Ok(Presented::Ok),
            Ok(true) => Ok(Presented::RecreateRequired),
            Err(e) if e.is_recreate_required() => Ok(Presented::RecreateRequired),
            Err(e) => Err(e),
        }
    }

    pub fn render_complete(&self, image: u32) -> RhiResult<vk::Semaphore> {
        self.render_complete
            .get(image as usize)
            .map(Semaphore::handle)
            .ok_or_else(|| RhiError::InvalidHandle(format!("No swapchain image {}", image)))
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Depth attachment; absent only after a failed rebuild.
    pub fn depth(&self) -> RhiResult<&Image> {
        self.depth
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("Depth buffer not rebuilt".to_string()))
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }
}

fn create_semaphores(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device.clone())).collect()
}

/// Release the old depth image, rebuild the swapchain, then allocate a depth
/// image for the extent the swapchain settled on.
///
/// On failure `depth` stays empty.
fn rebuild_depth_around<D, E>(
    depth: &mut Option<D>,
    rebuild_swapchain: impl FnOnce() -> Result<vk::Extent2D, E>,
    allocate_depth: impl FnOnce(vk::Extent2D) -> Result<D, E>,
) -> Result<(), E> {
    drop(depth.take());
    let extent = rebuild_swapchain()?;
    *depth = Some(allocate_depth(extent)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Depth {
        name: &'static str,
        log: Log,
    }

    impl Drop for Depth {
        fn drop(&mut self) {
            self.log.borrow_mut().push(format!("drop {}", self.name));
        }
    }

    #[test]
    fn test_old_depth_released_before_swapchain_rebuild() {
        let log: Log = Rc::default();
        let mut depth = Some(Depth { name: "old", log: log.clone() });

        rebuild_depth_around::<_, ()>(
            &mut depth,
            || {
                log.borrow_mut().push("swapchain".to_string());
                Ok(vk::Extent2D { width: 640, height: 480 })
            },
            |extent| {
                log.borrow_mut().push(format!("allocate {}x{}", extent.width, extent.height));
                Ok(Depth { name: "new", log: log.clone() })
            },
        )
        .unwrap();

        assert_eq!(
            *log.borrow(),
            ["drop old", "swapchain", "allocate 640x480"]
        );
        assert_eq!(depth.as_ref().map(|d| d.name), Some("new"));
    }

    #[test]
    fn test_failed_swapchain_rebuild_leaves_no_depth() {
        let log: Log = Rc::default();
        let mut depth = Some(Depth { name: "old", log: log.clone() });

        let result = rebuild_depth_around(
            &mut depth,
            || Err("surface lost"),
            |_| -> Result<Depth, &str> { panic!("allocated after a failed rebuild") },
        );

        assert_eq!(result, Err("surface lost"));
        assert!(depth.is_none());
        assert_eq!(*log.borrow(), ["drop old"]);
    }
}
