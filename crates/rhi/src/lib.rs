//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin owned wrappers over `ash` handles for a Vulkan 1.3 renderer that
//! uses dynamic rendering, synchronization2 and buffer device addresses.
//! Allocation goes through `gpu-allocator`.

mod error;

pub mod barrier;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod upload;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
