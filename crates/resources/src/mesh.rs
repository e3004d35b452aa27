//! OBJ mesh loading.
//!
//! Every corner referenced by a face becomes its own vertex; shared
//! positions are not welded. The model is flipped into the renderer's
//! Y-down clip convention here, so the camera does not flip again.

use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::{info, warn};
use vkrender_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// Largest corner count a `u16` index buffer can address.
pub const MAX_MESH_VERTICES: usize = u16::MAX as usize + 1;

/// CPU-side mesh ready to be copied into one vertex+index buffer.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Load shape 0 of an OBJ file.
    ///
    /// # Errors
    ///
    /// Missing file, parse failure, no shapes, or more than
    /// [`MAX_MESH_VERTICES`] corners.
    pub fn load_obj(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj(path, &options).map_err(|e| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if models.len() > 1 {
            warn!("{:?} has {} shapes, only the first is used", path, models.len());
        }
        let model = models
            .first()
            .ok_or_else(|| ResourceError::NoShapes(path.to_path_buf()))?;
        let mesh = &model.mesh;

        let count = mesh.indices.len();
        if count > MAX_MESH_VERTICES {
            return Err(ResourceError::TooManyVertices {
                path: path.to_path_buf(),
                count,
            });
        }

        let vertices: Vec<Vertex> = (0..count)
            .map(|corner| {
                let position = read_vec3(&mesh.positions, mesh.indices[corner]);
                let normal = mesh
                    .normal_indices
                    .get(corner)
                    .map_or(Vec3::ZERO, |&i| read_vec3(&mesh.normals, i));
                let uv = mesh
                    .texcoord_indices
                    .get(corner)
                    .map_or(Vec2::ZERO, |&i| read_vec2(&mesh.texcoords, i));
                corner_vertex(position, normal, uv)
            })
            .collect();
        // count <= MAX_MESH_VERTICES, so every index fits.
        let indices = (0..count).map(|i| i as u16).collect();

        info!(
            "Loaded mesh {:?}: {} vertices ({} triangles)",
            path,
            count,
            count / 3
        );
        Ok(Self { vertices, indices })
    }

    /// Size of the vertex region, which is also where the indices start.
    pub fn vertex_bytes(&self) -> u64 {
        size_of_val(self.vertices.as_slice()) as u64
    }

    pub fn index_bytes(&self) -> u64 {
        size_of_val(self.indices.as_slice()) as u64
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Vertices followed by indices, the layout of the GPU mesh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.vertex_bytes() + self.index_bytes()) as usize);
        bytes.extend_from_slice(bytemuck::cast_slice(&self.vertices));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.indices));
        bytes
    }
}

/// Convert one OBJ corner: negate Y of position and normal, flip V.
fn corner_vertex(position: Vec3, normal: Vec3, uv: Vec2) -> Vertex {
    Vertex::new(
        Vec3::new(position.x, -position.y, position.z),
        Vec3::new(normal.x, -normal.y, normal.z),
        Vec2::new(uv.x, 1.0 - uv.y),
    )
}

fn read_vec3(data: &[f32], index: u32) -> Vec3 {
    let i = index as usize * 3;
    data.get(i..i + 3).map_or(Vec3::ZERO, Vec3::from_slice)
}

fn read_vec2(data: &[f32], index: u32) -> Vec2 {
    let i = index as usize * 2;
    data.get(i..i + 2).map_or(Vec2::ZERO, Vec2::from_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_vertex_flips_y_and_v() {
        let v = corner_vertex(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec2::new(0.25, 0.2),
        );
        assert_eq!(v.position, Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(v.normal, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(v.uv.x, 0.25);
        assert!((v.uv.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_read_out_of_range_is_zero() {
        let data = [1.0, 2.0, 3.0];
        assert_eq!(read_vec3(&data, 0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(read_vec3(&data, 1), Vec3::ZERO);
        assert_eq!(read_vec2(&data, 1), Vec2::ZERO);
    }

    #[test]
    fn test_buffer_layout() {
        let mesh = MeshData {
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1, 2],
        };
        assert_eq!(mesh.vertex_bytes(), 96);
        assert_eq!(mesh.index_bytes(), 6);
        let bytes = mesh.to_bytes();
        assert_eq!(bytes.len(), 102);
        assert_eq!(&bytes[96..98], &0u16.to_le_bytes());
        assert_eq!(&bytes[100..102], &2u16.to_le_bytes());
    }

    #[test]
    fn test_max_vertices_matches_u16() {
        assert_eq!(MAX_MESH_VERTICES - 1, u16::MAX as usize);
    }
}
