//! Scene state driven by input: camera, object transforms, selection.

pub mod camera;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use scene::{DRAG_SENSITIVITY, INSTANCE_COUNT, LIGHT_POSITION, Scene};
pub use transform::Transform;
