//! Per-frame shader data block.
//!
//! The vertex shader reads this block through a `buffer_reference` pointer
//! passed as an 8-byte push constant, so the layout follows std430 rules.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use vkrender_scene::{INSTANCE_COUNT, LIGHT_POSITION, Scene};

/// Camera, per-instance transforms, light and selection for one frame.
///
/// # Memory Layout
///
/// - Offset 0: projection matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: model matrices, one per instance (3 x 64 bytes)
/// - Offset 320: light position (16 bytes)
/// - Offset 336: selected instance (4 bytes)
/// - Offset 340: padding (12 bytes)
/// - Total size: 352 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShaderData {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: [Mat4; INSTANCE_COUNT],
    pub light_pos: Vec4,
    pub selected: u32,
    pub _padding: [u32; 3],
}

impl ShaderData {
    pub const SIZE: usize = size_of::<Self>();

    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            projection: scene.camera.projection_matrix(),
            view: scene.camera.view_matrix(),
            model: scene.model_matrices(),
            light_pos: LIGHT_POSITION,
            selected: scene.selected(),
            _padding: [0; 3],
        }
    }
}

impl Default for ShaderData {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            model: [Mat4::IDENTITY; INSTANCE_COUNT],
            light_pos: LIGHT_POSITION,
            selected: 1,
            _padding: [0; 3],
        }
    }
}
