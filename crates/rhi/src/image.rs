//! Device-local 2D images with a matching view.
//!
//! Two kinds are needed: the depth attachment, rebuilt on every swapchain
//! recreation, and sampled textures filled once through a staging copy.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Aspect mask for the full view of a depth format.
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D16_UNORM_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
    aspect: vk::ImageAspectFlags,
}

impl Image {
    /// Depth/stencil attachment sized to the swapchain.
    pub fn depth(device: Arc<Device>, format: vk::Format, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::new(
            device,
            "depth",
            format,
            extent,
            1,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            depth_aspect(format),
        )
    }

    /// Sampled texture with `mip_levels` levels, written by transfer.
    pub fn texture(
        device: Arc<Device>,
        format: vk::Format,
        extent: vk::Extent2D,
        mip_levels: u32,
    ) -> RhiResult<Self> {
        Self::new(
            device,
            "texture",
            format,
            extent,
            mip_levels,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )
    }

    fn new(
        device: Arc<Device>,
        name: &str,
        format: vk::Format,
        extent: vk::Extent2D,
        mip_levels: u32,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 || mip_levels == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "Invalid {} image: {}x{} with {} mip levels",
                name, extent.width, extent.height, mip_levels
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        // SAFETY: image_info describes a valid 2D image.
        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().lock().unwrap().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e.into());
            }
        };

        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            format,
            extent,
            mip_levels,
            aspect,
        };

        if let Some(allocation) = &this.allocation {
            // SAFETY: the allocation satisfies the image's requirements.
            unsafe {
                this.device
                    .handle()
                    .bind_image_memory(image, allocation.memory(), allocation.offset())?
            };
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(this.subresource_range());
        this.view = unsafe { this.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created {} image: {}x{}, {:?}, {} mip(s)",
            name, extent.width, extent.height, format, mip_levels
        );
        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(self.aspect)
            .level_count(self.mip_levels)
            .layer_count(1)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // SAFETY: owners drop images only after the GPU is done with them.
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.device.allocator().lock().unwrap().free(allocation)
        {
            tracing::error!("Failed to free image allocation: {:?}", e);
        }
    }
}
