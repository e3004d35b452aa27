//! Renderer error type.

use thiserror::Error;
use vkrender_resources::ResourceError;
use vkrender_rhi::RhiError;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error("Asset error: {0}")]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Core(#[from] vkrender_core::Error),

    /// The configured texture list does not match the descriptor array.
    #[error("Expected {expected} textures, got {found}")]
    TextureCount { expected: usize, found: usize },
}

impl RendererError {
    /// Surface changed; rebuild the presentation chain and keep going.
    pub fn is_recreate_required(&self) -> bool {
        matches!(self, RendererError::Rhi(e) if e.is_recreate_required())
    }
}

pub type RendererResult<T> = Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vkrender_rhi::vk;

    #[test]
    fn test_out_of_date_is_recoverable() {
        let err = RendererError::from(RhiError::from(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert!(err.is_recreate_required());
    }

    #[test]
    fn test_device_lost_is_fatal() {
        let err = RendererError::from(RhiError::from(vk::Result::ERROR_DEVICE_LOST));
        assert!(!err.is_recreate_required());
        let err = RendererError::TextureCount {
            expected: 3,
            found: 2,
        };
        assert!(!err.is_recreate_required());
        assert_eq!(err.to_string(), "Expected 3 textures, got 2");
    }
}
