//! Camera that orbits a fixed target and dollies along its view axis.

use glam::{Mat4, Vec3};

/// Closest the camera may get to its target.
pub const MIN_DISTANCE: f32 = 1.0;
/// Farthest the camera may get from its target.
pub const MAX_DISTANCE: f32 = 50.0;
/// Distance moved per scroll line.
pub const DOLLY_STEP: f32 = 0.5;

/// A perspective camera looking at `target`.
///
/// Mesh data is loaded with Y pointing down, which already matches Vulkan
/// clip space, so the projection carries no Y flip.
#[derive(Clone, Debug)]
pub struct Camera {
    pub target: Vec3,
    /// Unit vector from the target towards the camera.
    direction: Vec3,
    distance: f32,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            direction: Vec3::Z,
            distance: 10.0,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera for a surface of `width` x `height` pixels.
    pub fn with_extent(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_extent(width, height);
        camera
    }

    /// Update the aspect ratio. A zero-area extent is ignored.
    pub fn set_extent(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn position(&self) -> Vec3 {
        self.target + self.direction * self.distance
    }

    /// Move towards (positive `lines`) or away from the target.
    pub fn dolly(&mut self, lines: f32) {
        self.distance = (self.distance - lines * DOLLY_STEP).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_position() {
        let camera = Camera::new();
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_dolly_moves_closer_and_clamps() {
        let mut camera = Camera::new();
        camera.dolly(2.0);
        assert!((camera.distance() - 9.0).abs() < 1e-6);

        camera.dolly(1000.0);
        assert_eq!(camera.distance(), MIN_DISTANCE);

        camera.dolly(-1000.0);
        assert_eq!(camera.distance(), MAX_DISTANCE);
    }

    #[test]
    fn test_set_extent_updates_aspect() {
        let mut camera = Camera::with_extent(1280, 720);
        assert!((camera.aspect() - 16.0 / 9.0).abs() < 1e-6);
        camera.set_extent(640, 480);
        assert!((camera.aspect() - 4.0 / 3.0).abs() < 1e-6);
        camera.set_extent(0, 480);
        assert!((camera.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_maps_target_in_front() {
        let camera = Camera::new();
        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-5);
    }

    #[test]
    fn test_projection_depth_range_is_zero_to_one() {
        let camera = Camera::new();
        let proj = camera.projection_matrix();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }
}
