//! Core utilities shared by the renderer crates.
//!
//! - Error type and result alias
//! - Logging initialization
//! - Frame timing
//! - Configuration loading

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    AssetConfig, Config, DEFAULT_CONFIG_FILE, RendererConfig, TEXTURE_COUNT, WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::{FrameStats, FrameTimer};
