//! Per-object transform.
//!
//! ```
//! use vkrender_scene::Transform;
//! use glam::{Vec2, Vec3};
//!
//! let mut t = Transform::at(Vec3::new(3.0, 0.0, 0.0));
//! t.rotate_by_drag(Vec2::new(100.0, 0.0), 0.005);
//! let origin = t.matrix().transform_point3(Vec3::ZERO);
//! assert!((origin - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
//! ```

use glam::{Mat4, Quat, Vec2, Vec3};

/// Position, rotation and scale of one drawn instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Identity rotation and unit scale at `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Model matrix: scale, then rotate, then translate.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Apply a pointer drag of `delta` pixels.
    ///
    /// Horizontal motion spins about the world Y axis, vertical motion tilts
    /// about the world X axis. The result is renormalized so long drags do not
    /// accumulate drift.
    pub fn rotate_by_drag(&mut self, delta: Vec2, radians_per_pixel: f32) {
        if delta == Vec2::ZERO {
            return;
        }
        let yaw = Quat::from_rotation_y(delta.x * radians_per_pixel);
        let pitch = Quat::from_rotation_x(delta.y * radians_per_pixel);
        self.rotation = (yaw * pitch * self.rotation).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_default_is_identity() {
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_matrix_translates() {
        let t = Transform::at(Vec3::new(-3.0, 0.0, 0.0));
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_scale_applied_before_translation() {
        let t = Transform {
            scale: Vec3::splat(2.0),
            ..Transform::at(Vec3::new(0.0, 1.0, 0.0))
        };
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_horizontal_drag_spins_about_y() {
        let mut t = Transform::default();
        t.rotate_by_drag(Vec2::new(FRAC_PI_2 / 0.01, 0.0), 0.01);
        let x = t.rotation * Vec3::X;
        assert!((x - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_vertical_drag_tilts_about_x() {
        let mut t = Transform::default();
        t.rotate_by_drag(Vec2::new(0.0, FRAC_PI_2 / 0.01), 0.01);
        let y = t.rotation * Vec3::Y;
        assert!((y - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn test_zero_drag_is_noop() {
        let mut t = Transform::default();
        t.rotate_by_drag(Vec2::ZERO, 0.01);
        assert_eq!(t.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_rotation_stays_normalized() {
        let mut t = Transform::default();
        for _ in 0..10_000 {
            t.rotate_by_drag(Vec2::new(3.0, -2.0), 0.005);
        }
        assert!((t.rotation.length() - 1.0).abs() < 1e-4);
    }
}
