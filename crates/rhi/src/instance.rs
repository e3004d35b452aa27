//! Vulkan instance, validation layer and debug messenger.
//!
//! ```no_run
//! use vkrender_rhi::instance::Instance;
//!
//! // Surface extensions normally come from the window.
//! let instance = Instance::new(&[], cfg!(debug_assertions)).expect("Vulkan instance");
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, trace, warn};

use crate::error::RhiError;

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the loader entry, the `VkInstance` and the optional debug messenger.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Create a Vulkan 1.3 instance.
    ///
    /// `surface_extensions` are the window-system extensions the platform
    /// layer reports. When `enable_validation` is set but the Khronos layer
    /// is not installed, creation proceeds without it.
    ///
    /// # Errors
    ///
    /// Fails if the loader cannot be found or the driver rejects the instance.
    pub fn new(surface_extensions: &[*const c_char], enable_validation: bool) -> Result<Self, RhiError> {
        // SAFETY: loading the system Vulkan library has no preconditions beyond
        // keeping `entry` alive for as long as the instance, which this struct does.
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && Self::has_validation_layer(&entry)?;
        if enable_validation && !validation {
            warn!("Validation layer requested but not installed, continuing without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vulkan_render")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vkrender")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = surface_extensions.to_vec();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layers = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: every pointer in create_info refers to locals that outlive the call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!("Vulkan instance created (API 1.3, validation: {})", validation);

        let debug_utils = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::create_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    // SAFETY: nothing else has been created from this instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    fn has_validation_layer(entry: &Entry) -> Result<bool, RhiError> {
        // SAFETY: the entry is loaded.
        let layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .any(|layer| {
                layer
                    .layer_name_as_c_str()
                    .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
            }))
    }

    fn create_messenger(
        loader: &ash::ext::debug_utils::Instance,
    ) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        // SAFETY: create_info is fully initialised and the callback is a valid
        // `extern "system"` function for the lifetime of the program.
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        debug!("Debug messenger installed");
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: every child object (surface, device) is owned by structs that
        // are dropped before the instance; the messenger goes first.
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Forwards validation messages to `tracing` at the matching level.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the driver passes a valid callback-data pointer for the duration of the call.
    let data = unsafe { &*p_callback_data };
    let message = if data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        // SAFETY: p_message is a NUL-terminated string owned by the driver.
        unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
    };

    let kind = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "[{}] {}", kind, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "[{}] {}", kind, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "[{}] {}", kind, message);
    } else {
        trace!(target: "vulkan", "[{}] {}", kind, message);
    }

    vk::FALSE
}
