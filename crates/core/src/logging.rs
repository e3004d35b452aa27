//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,vkrender=debug,vkrender_renderer=debug,vkrender_rhi=info";

/// Initialize the global tracing subscriber.
///
/// Filtering honours `RUST_LOG`; without it [`DEFAULT_FILTER`] applies.
/// Calling this twice is harmless, the second registration is ignored.
///
/// # Example
/// ```
/// vkrender_core::init_logging();
/// tracing::info!("renderer starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
