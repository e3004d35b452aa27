//! Swapchain creation, recreation, acquire and present.
//!
//! Surface parameters are picked once per (re)creation:
//! `B8G8R8A8_SRGB`/`SRGB_NONLINEAR` when offered (else the first format),
//! FIFO presentation, and the surface's minimum image count.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        // SAFETY: surface and physical device are both live.
        let (capabilities, formats) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
            )
        };
        debug!(
            "Surface: {} formats, image count {}..{}, current extent {}x{}",
            formats.len(),
            capabilities.min_image_count,
            capabilities.max_image_count,
            capabilities.current_extent.width,
            capabilities.current_extent.height
        );
        Ok(Self {
            capabilities,
            formats,
        })
    }
}

pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let mut swapchain = Self {
            device,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
        };
        swapchain.build(surface, surface_loader, width, height)?;
        Ok(swapchain)
    }

    /// Rebuild for a new framebuffer size, handing the old swapchain to the driver.
    ///
    /// The caller must ensure the device is idle.
    pub fn recreate(
        &mut self,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        info!("Recreating swapchain for {}x{}", width, height);
        self.build(surface, surface_loader, width, height)
    }

    fn build(
        &mut self,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        let support =
            SwapchainSupportDetails::query(self.device.physical_device(), surface, surface_loader)?;
        let format = choose_surface_format(&support.formats).ok_or_else(|| {
            RhiError::SwapchainError("Surface reports no formats".to_string())
        })?;
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Old views go first; only the old swapchain handle outlives creation.
        self.destroy_image_views();
        self.images.clear();
        // SAFETY: the old swapchain is retired here and destroyed right after.
        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None)? };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain)? };
        self.image_views = create_image_views(&self.device, &self.images, format.format)?;
        self.format = format;
        self.extent = extent;

        info!(
            "Swapchain ready: {}x{}, {:?}, {} images (requested {})",
            extent.width,
            extent.height,
            format.format,
            self.images.len(),
            image_count
        );
        Ok(())
    }

    /// Returns the image index and whether the swapchain is suboptimal.
    ///
    /// `ERROR_OUT_OF_DATE_KHR` comes back as an error for which
    /// [`RhiError::is_recreate_required`] holds.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<(u32, bool)> {
        // SAFETY: the semaphore is unsignaled with no pending wait.
        let acquired = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())?
        };
        Ok(acquired)
    }

    /// Queue `image_index` for presentation. Returns true when suboptimal.
    pub fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> RhiResult<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        // SAFETY: image_index was acquired from this swapchain.
        let suboptimal = unsafe { self.loader.queue_present(self.device.queue(), &present_info)? };
        Ok(suboptimal)
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    fn destroy_image_views(&mut self) {
        for view in self.image_views.drain(..) {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
        debug!("Swapchain destroyed");
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    match preferred {
        Some(&format) => Some(format),
        None => {
            let first = formats.first().copied();
            if let Some(format) = first {
                warn!("B8G8R8A8_SRGB unavailable, using {:?}", format.format);
            }
            first
        }
    }
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    // max_image_count == 0 means unbounded
    if capabilities.max_image_count > 0 {
        capabilities.min_image_count.min(capabilities.max_image_count)
    } else {
        capabilities.min_image_count
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );
            // SAFETY: image belongs to the current swapchain.
            unsafe { device.handle().create_image_view(&create_info, None) }
                .map_err(RhiError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            choose_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::R8G8B8A8_UNORM)
        );
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 1280, 720);
        assert_eq!((extent.width, extent.height), (640, 480));
    }

    #[test]
    fn test_choose_extent_clamps_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 1280, 720);
        assert_eq!((extent.width, extent.height), (1024, 720));
    }

    #[test]
    fn test_determine_image_count_uses_minimum() {
        let bounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&bounded), 3);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unbounded), 2);
    }
}
