//! Platform layer: window, Vulkan surface and input.
//!
//! - Window management via winit
//! - Surface creation via ash-window
//! - Per-frame input accumulation

mod input;
mod window;

pub use input::{FrameInput, InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};
