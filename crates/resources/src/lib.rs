//! Asset loading.
//!
//! Parses the model and its textures into plain CPU-side data. Nothing here
//! touches the GPU; the renderer uploads the results once at startup.

mod error;

pub mod mesh;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use mesh::{MAX_MESH_VERTICES, MeshData};
pub use texture::TextureData;
