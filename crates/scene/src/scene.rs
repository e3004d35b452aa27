//! The three instanced objects, the camera and the current selection.

use glam::{Mat4, Vec3, Vec4};
use vkrender_platform::FrameInput;

use crate::camera::Camera;
use crate::transform::Transform;

/// Number of drawn instances; one model matrix each.
pub const INSTANCE_COUNT: usize = 3;

/// Spacing between neighbouring instances along X.
pub const INSTANCE_SPACING: f32 = 3.0;

/// Radians of rotation per dragged pixel.
pub const DRAG_SENSITIVITY: f32 = 0.005;

/// Light position written to every frame's uniform block.
pub const LIGHT_POSITION: Vec4 = Vec4::new(0.0, -10.0, 10.0, 0.0);

/// Everything the per-frame uniform block is computed from.
#[derive(Clone, Debug)]
pub struct Scene {
    pub camera: Camera,
    objects: [Transform; INSTANCE_COUNT],
    selected: u32,
}

impl Scene {
    /// Scene for a `width` x `height` surface with the middle object selected.
    pub fn new(width: u32, height: u32) -> Self {
        let objects = std::array::from_fn(|i| {
            Transform::at(Vec3::new((i as f32 - 1.0) * INSTANCE_SPACING, 0.0, 0.0))
        });
        Self {
            camera: Camera::with_extent(width, height),
            objects,
            selected: 1,
        }
    }

    pub fn selected(&self) -> u32 {
        self.selected
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % INSTANCE_COUNT as u32;
    }

    pub fn select_previous(&mut self) {
        self.selected = (self.selected + INSTANCE_COUNT as u32 - 1) % INSTANCE_COUNT as u32;
    }

    pub fn object(&self, index: usize) -> &Transform {
        &self.objects[index]
    }

    /// Apply one frame's worth of input. Selection changes are applied
    /// before the drag so a drag in the same frame rotates the new selection.
    pub fn apply_input(&mut self, input: &FrameInput) {
        let steps = input.selection_steps.rem_euclid(INSTANCE_COUNT as i32);
        for _ in 0..steps {
            self.select_next();
        }
        if input.selection_steps != 0 {
            tracing::debug!("Selected object {}", self.selected);
        }

        self.objects[self.selected as usize].rotate_by_drag(input.drag, DRAG_SENSITIVITY);

        if input.scroll != 0.0 {
            self.camera.dolly(input.scroll);
        }
    }

    pub fn model_matrices(&self) -> [Mat4; INSTANCE_COUNT] {
        std::array::from_fn(|i| self.objects[i].matrix())
    }
}
