//! Window creation and the Vulkan surface tied to it.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkrender_core::{Error, Result, WindowConfig};

/// Owned `VkSurfaceKHR`, destroyed on drop.
///
/// The instance the surface was created from must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader used for capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle came from ash_window::create_surface on the instance
        // the loader was built from, and nothing else destroys it.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Surface destroyed");
    }
}

/// Resizable application window.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Open a window sized and titled from `config`.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The compositor may not honour the requested size.
        let size = window.inner_size();
        tracing::info!(
            "Window '{}' created: {}x{}",
            config.title,
            size.width,
            size.height
        );

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
        })
    }

    /// Current drawable size in pixels.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True while the window has no drawable area (minimized).
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Record a new size reported by the windowing system.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions the platform needs to present to this window.
    pub fn required_extensions(&self) -> Result<Vec<*const std::ffi::c_char>> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| Error::Vulkan(format!("Failed to enumerate surface extensions: {e}")))?;
        Ok(extensions.to_vec())
    }

    /// Create the presentation surface for this window.
    ///
    /// # Errors
    ///
    /// Fails if the raw handles are unavailable or the driver rejects them.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {e}")))?;

        // SAFETY: entry and instance are live, the raw handles come from a live winit
        // window, and Surface::drop is the single place the surface is destroyed.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
                .map_err(|e| Error::Vulkan(format!("Failed to create surface: {e}")))?
        };

        tracing::info!("Surface created");

        Ok(Surface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}
