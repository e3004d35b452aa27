//! Frame loop and GPU resource lifecycle.
//!
//! - [`frame_ring`]: per-frame slots (fence, acquire semaphore, command
//!   buffer, shader data buffer)
//! - [`presentation`]: swapchain, depth buffer and per-image semaphores,
//!   rebuilt together on resize
//! - [`static_resources`]: mesh, textures, descriptors and pipeline
//! - [`frame_loop`]: the per-frame ordering, generic over [`FrameBackend`]
//! - [`renderer`]: the Vulkan implementation tying it together

mod error;

pub mod frame_loop;
pub mod frame_ring;
pub mod presentation;
pub mod renderer;
pub mod shader_data;
pub mod static_resources;

pub use error::{RendererError, RendererResult};
pub use frame_loop::{Acquired, FrameBackend, FrameLoop, FrameOutcome, Presented};
pub use renderer::Renderer;
pub use shader_data::ShaderData;
pub use vkrender_core::TEXTURE_COUNT;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
