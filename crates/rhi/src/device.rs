//! Logical device, the shared queue and the GPU memory allocator.
//!
//! One queue from one family serves graphics, transfer and presentation.
//! The [`Device`] is shared as `Arc<Device>` by every object created from it,
//! so it is destroyed only after the last of them.
//!
//! # Example
//!
//! ```no_run
//! use vkrender_rhi::device::Device;
//! use vkrender_rhi::instance::Instance;
//! use vkrender_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(&[], false).expect("instance");
//! let surface = vk::SurfaceKHR::null(); // normally created from the window
//! let loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let gpu = select_physical_device(instance.handle(), surface, &loader).expect("gpu");
//! let device = Device::new(&instance, &gpu).expect("device");
//! device.wait_idle().expect("idle");
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, REQUIRED_DEVICE_EXTENSIONS};

/// Depth formats tried in order when creating a depth buffer.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 2] =
    [vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT];

/// Vulkan logical device wrapper.
///
/// The allocator lives behind a `Mutex`; every buffer and image allocates
/// through it.
pub struct Device {
    device: ash::Device,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    queue: vk::Queue,
    queue_family: u32,
}

impl Device {
    /// Create the logical device with the renderer's feature set enabled.
    ///
    /// Enables `VK_KHR_swapchain`, Vulkan 1.2 descriptor indexing (variable
    /// count, runtime arrays, non-uniform sampled-image indexing) and buffer
    /// device address, Vulkan 1.3 synchronization2 and dynamic rendering, and
    /// sampler anisotropy. The allocator is created with buffer device address
    /// support.
    ///
    /// # Errors
    ///
    /// Returns an error if device or allocator creation fails.
    pub fn new(instance: &Instance, gpu: &PhysicalDeviceInfo) -> Result<Arc<Self>, RhiError> {
        let priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(gpu.queue_family)
            .queue_priorities(&priorities)];

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .descriptor_binding_variable_descriptor_count(true)
            .runtime_descriptor_array(true)
            .buffer_device_address(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let extension_names: Vec<_> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features12)
            .push_next(&mut features13);

        // SAFETY: the physical device was enumerated from this instance and every
        // pointer in create_info refers to locals that outlive the call.
        let device = unsafe {
            instance
                .handle()
                .create_device(gpu.device, &create_info, None)?
        };
        // SAFETY: family and index 0 were requested above.
        let queue = unsafe { device.get_device_queue(gpu.queue_family, 0) };
        info!("Logical device created, queue family {}", gpu.queue_family);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: gpu.device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                // SAFETY: nothing else has been created from the device yet.
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };
        debug!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: gpu.device,
            properties: gpu.properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue,
            queue_family: gpu.queue_family,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    /// The graphics + present queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Block until every queue is idle.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        // SAFETY: the device is live; callers do not hold queue locks elsewhere.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submit to the shared queue with synchronization2 semantics.
    ///
    /// # Safety
    ///
    /// Every command buffer and semaphore referenced by `submits` must be valid,
    /// and `fence`, if not null, must be unsignaled and not pending.
    pub unsafe fn submit(
        &self,
        submits: &[vk::SubmitInfo2<'_>],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe { self.device.queue_submit2(self.queue, submits, fence)? };
        Ok(())
    }

    /// GPU address of a buffer created with `SHADER_DEVICE_ADDRESS` usage.
    pub fn buffer_address(&self, buffer: vk::Buffer) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
        // SAFETY: the caller passes a live buffer created with device-address usage.
        unsafe { self.device.get_buffer_device_address(&info) }
    }

    /// First of `candidates` usable as a depth/stencil attachment with optimal tiling.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoDepthFormat`] if none qualifies.
    pub fn find_depth_format(&self, candidates: &[vk::Format]) -> Result<vk::Format, RhiError> {
        let format = select_depth_format(candidates, |format| {
            // SAFETY: the physical device belongs to this instance.
            unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            }
        })?;
        debug!("Depth format: {:?}", format);
        Ok(format)
    }
}

/// Pure part of [`Device::find_depth_format`].
pub fn select_depth_format(
    candidates: &[vk::Format],
    properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format, RhiError> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            properties(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or(RhiError::NoDepthFormat)
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: all objects created from the device hold an Arc to it, so they
        // are gone by now. The allocator must release its memory blocks before
        // the device itself is destroyed.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device and ash::Instance are function tables, the remaining
// fields are plain handles, and the allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_format_prefers_first_candidate() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| {
            props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT_S8_UINT);
    }

    #[test]
    fn test_depth_format_falls_back() {
        let format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |f| {
            if f == vk::Format::D24_UNORM_S8_UINT {
                props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            } else {
                props(vk::FormatFeatureFlags::SAMPLED_IMAGE)
            }
        })
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_depth_format_none_supported() {
        let result = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| {
            props(vk::FormatFeatureFlags::empty())
        });
        assert!(matches!(result, Err(RhiError::NoDepthFormat)));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
