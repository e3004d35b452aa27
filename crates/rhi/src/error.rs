//! RHI error type.

use ash::vk;
use thiserror::Error;

/// Errors raised by the Vulkan abstraction layer.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU memory allocation failed
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No physical device offers the required features and queues
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// None of the candidate depth formats supports depth attachments
    #[error("No supported depth format")]
    NoDepthFormat,

    /// Shader module could not be created
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Swapchain could not be created
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid argument or handle
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RhiError {
    /// True when the presentation surface changed and the swapchain must be
    /// rebuilt. Every other error is fatal to the render loop.
    pub fn is_recreate_required(&self) -> bool {
        matches!(self, RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DATE_KHR))
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
