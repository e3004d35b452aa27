//! Physical device (GPU) selection.
//!
//! A device qualifies when it is a discrete or integrated GPU, reports
//! Vulkan 1.3, supports `VK_KHR_swapchain`, exposes every feature listed in
//! [`RequiredFeatures`] and has one queue family that can both draw and
//! present to the window surface. Discrete GPUs win ties.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Device extensions every candidate must support.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// The selected GPU and the queue family used for graphics and presentation.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    /// Family index supporting both graphics and present.
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.properties.api_version;
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field(
                "api_version",
                &format!(
                    "{}.{}.{}",
                    vk::api_version_major(v),
                    vk::api_version_minor(v),
                    vk::api_version_patch(v)
                ),
            )
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

/// Snapshot of the optional features the renderer depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequiredFeatures {
    pub sampler_anisotropy: bool,
    pub descriptor_indexing: bool,
    pub sampled_image_array_non_uniform_indexing: bool,
    pub variable_descriptor_count: bool,
    pub runtime_descriptor_array: bool,
    pub buffer_device_address: bool,
    pub synchronization2: bool,
    pub dynamic_rendering: bool,
}

impl RequiredFeatures {
    /// Query what `device` supports.
    pub fn query(instance: &ash::Instance, device: vk::PhysicalDevice) -> Self {
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features12)
            .push_next(&mut features13);
        // SAFETY: the chained structs live on the stack for the duration of the call.
        unsafe { instance.get_physical_device_features2(device, &mut features2) };
        let core = features2.features;

        Self {
            sampler_anisotropy: core.sampler_anisotropy == vk::TRUE,
            descriptor_indexing: features12.descriptor_indexing == vk::TRUE,
            sampled_image_array_non_uniform_indexing: features12
                .shader_sampled_image_array_non_uniform_indexing
                == vk::TRUE,
            variable_descriptor_count: features12.descriptor_binding_variable_descriptor_count
                == vk::TRUE,
            runtime_descriptor_array: features12.runtime_descriptor_array == vk::TRUE,
            buffer_device_address: features12.buffer_device_address == vk::TRUE,
            synchronization2: features13.synchronization2 == vk::TRUE,
            dynamic_rendering: features13.dynamic_rendering == vk::TRUE,
        }
    }

    /// Names of the features that are not supported.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.sampler_anisotropy, "samplerAnisotropy"),
            (self.descriptor_indexing, "descriptorIndexing"),
            (
                self.sampled_image_array_non_uniform_indexing,
                "shaderSampledImageArrayNonUniformIndexing",
            ),
            (
                self.variable_descriptor_count,
                "descriptorBindingVariableDescriptorCount",
            ),
            (self.runtime_descriptor_array, "runtimeDescriptorArray"),
            (self.buffer_device_address, "bufferDeviceAddress"),
            (self.synchronization2, "synchronization2"),
            (self.dynamic_rendering, "dynamicRendering"),
        ]
        .into_iter()
        .filter_map(|(supported, name)| (!supported).then_some(name))
        .collect()
    }
}

/// Pick the most suitable GPU for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    // SAFETY: the instance is live.
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| evaluate_device(instance, device, surface, surface_loader))
        .max_by_key(|info| device_type_score(info.properties.device_type));

    match best {
        Some(info) => {
            info!(
                "Selected GPU: '{}' ({}), queue family {}",
                info.device_name(),
                info.device_type_name(),
                info.queue_family
            );
            Ok(info)
        }
        None => {
            warn!("No GPU meets the renderer's requirements");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn evaluate_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    // SAFETY: `device` was enumerated from this instance.
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if device_type_score(properties.device_type) == 0 {
        debug!("GPU '{}' skipped: not a discrete or integrated GPU", name);
        return None;
    }
    if !supports_api_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }

    // SAFETY: as above.
    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
    for required in REQUIRED_DEVICE_EXTENSIONS {
        let found = extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == required));
        if !found {
            debug!("GPU '{}' skipped: missing {:?}", name, required);
            return None;
        }
    }

    let missing = RequiredFeatures::query(instance, device).missing();
    if !missing.is_empty() {
        debug!("GPU '{}' skipped: missing features {:?}", name, missing);
        return None;
    }

    // SAFETY: as above.
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_family = pick_queue_family(&families, |index| {
        // SAFETY: `index` is within the family count just queried.
        unsafe { surface_loader.get_physical_device_surface_support(device, index, surface) }
            .unwrap_or(false)
    });
    let Some(queue_family) = queue_family else {
        debug!("GPU '{}' skipped: no graphics+present queue family", name);
        return None;
    };

    Some(PhysicalDeviceInfo {
        device,
        properties,
        queue_family,
    })
}

/// First family with graphics support that can also present.
pub fn pick_queue_family(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|(index, _)| index as u32)
        .find(|&index| supports_present(index))
}

/// Preference order for device types; zero means unsupported.
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 2,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        _ => 0,
    }
}

pub fn supports_api_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_pick_queue_family_needs_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(pick_queue_family(&families, |_| true), Some(1));
        assert_eq!(pick_queue_family(&families, |i| i == 2), Some(2));
        assert_eq!(pick_queue_family(&families, |i| i == 0), None);
    }

    #[test]
    fn test_pick_queue_family_skips_empty_families() {
        let families = [family(vk::QueueFlags::GRAPHICS, 0)];
        assert_eq!(pick_queue_family(&families, |_| true), None);
    }

    #[test]
    fn test_device_type_preference() {
        assert!(
            device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU)
                > device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert_eq!(device_type_score(vk::PhysicalDeviceType::CPU), 0);
        assert_eq!(device_type_score(vk::PhysicalDeviceType::VIRTUAL_GPU), 0);
    }

    #[test]
    fn test_api_version_check() {
        assert!(supports_api_1_3(vk::API_VERSION_1_3));
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!supports_api_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn test_missing_features_listed_by_name() {
        let features = RequiredFeatures {
            sampler_anisotropy: true,
            descriptor_indexing: true,
            sampled_image_array_non_uniform_indexing: true,
            variable_descriptor_count: true,
            runtime_descriptor_array: true,
            buffer_device_address: false,
            synchronization2: true,
            dynamic_rendering: false,
        };
        assert_eq!(
            features.missing(),
            vec!["bufferDeviceAddress", "dynamicRendering"]
        );
        assert_eq!(RequiredFeatures::default().missing().len(), 8);
    }
}
