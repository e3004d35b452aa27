//! KTX2 texture loading.
//!
//! All mip levels are packed back to back into one byte buffer so the
//! upload path needs a single staging buffer and one copy region per level.

use std::path::Path;

use tracing::info;
use vkrender_rhi::vk;

use crate::error::{ResourceError, ResourceResult};

/// One texture's pixels and the data needed to copy them into an image.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    /// Byte offset of each mip level inside `bytes`, level 0 first.
    pub level_offsets: Vec<u64>,
    pub bytes: Vec<u8>,
}

impl TextureData {
    /// Load a KTX2 file whose payload is not supercompressed.
    pub fn load_ktx2(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::read(path)?;
        let texture = Self::parse_ktx2(path, &file)?;
        info!(
            "Loaded texture {:?}: {}x{}, {:?}, {} mip level(s), {} bytes",
            path,
            texture.width,
            texture.height,
            texture.format,
            texture.mip_levels(),
            texture.bytes.len()
        );
        Ok(texture)
    }

    fn parse_ktx2(path: &Path, file: &[u8]) -> ResourceResult<Self> {
        let unsupported = |reason: &str| ResourceError::UnsupportedTexture {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let reader = ktx2::Reader::new(file).map_err(|e| ResourceError::Ktx2Parse {
            path: path.to_path_buf(),
            message: format!("{:?}", e),
        })?;
        let header = reader.header();

        if header.supercompression_scheme.is_some() {
            return Err(unsupported("supercompressed payloads are not supported"));
        }
        let format = header
            .format
            .ok_or_else(|| unsupported("no VkFormat (Basis Universal payload)"))?;
        if header.pixel_width == 0 || header.pixel_height == 0 {
            return Err(unsupported("zero-sized base level"));
        }

        let (level_offsets, bytes) = pack_levels(reader.levels().map(|level| level.data));

        Ok(Self {
            width: header.pixel_width,
            height: header.pixel_height,
            format: vk::Format::from_raw(format.value() as i32),
            level_offsets,
            bytes,
        })
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.level_offsets.len() as u32
    }

    /// Extent of mip `level`, never smaller than 1x1.
    pub fn level_extent(&self, level: u32) -> vk::Extent2D {
        vk::Extent2D {
            width: mip_dimension(self.width, level),
            height: mip_dimension(self.height, level),
        }
    }

    /// One buffer-to-image copy per level, reading from a staging buffer
    /// that holds `bytes` at offset 0.
    pub fn copy_regions(&self) -> Vec<vk::BufferImageCopy> {
        self.level_offsets
            .iter()
            .enumerate()
            .map(|(level, &offset)| {
                let extent = self.level_extent(level as u32);
                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level as u32)
                            .layer_count(1),
                    )
                    .image_extent(vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: 1,
                    })
            })
            .collect()
    }
}

pub(crate) fn mip_dimension(base: u32, level: u32) -> u32 {
    base.checked_shr(level).unwrap_or(0).max(1)
}

/// Concatenate level payloads, returning each level's starting offset.
pub(crate) fn pack_levels<'a>(levels: impl Iterator<Item = &'a [u8]>) -> (Vec<u64>, Vec<u8>) {
    let mut offsets = Vec::new();
    let mut bytes = Vec::new();
    for data in levels {
        offsets.push(bytes.len() as u64);
        bytes.extend_from_slice(data);
    }
    (offsets, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(width: u32, height: u32, levels: &[&[u8]]) -> TextureData {
        let (level_offsets, bytes) = pack_levels(levels.iter().copied());
        TextureData {
            width,
            height,
            format: vk::Format::R8G8B8A8_SRGB,
            level_offsets,
            bytes,
        }
    }

    #[test]
    fn test_pack_levels_offsets() {
        let (offsets, bytes) = pack_levels([&[1u8; 16][..], &[2u8; 4], &[3u8; 1]].into_iter());
        assert_eq!(offsets, vec![0, 16, 20]);
        assert_eq!(bytes.len(), 21);
        assert_eq!(bytes[16], 2);
    }

    #[test]
    fn test_mip_dimension_floors_at_one() {
        assert_eq!(mip_dimension(256, 0), 256);
        assert_eq!(mip_dimension(256, 3), 32);
        assert_eq!(mip_dimension(256, 9), 1);
        assert_eq!(mip_dimension(3, 40), 1);
    }

    #[test]
    fn test_copy_regions_per_level() {
        let tex = texture(4, 2, &[&[0; 32], &[0; 8], &[0; 4]]);
        let regions = tex.copy_regions();
        assert_eq!(tex.mip_levels(), 3);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[1].buffer_offset, 32);
        assert_eq!(regions[1].image_subresource.mip_level, 1);
        assert_eq!(regions[1].image_extent.width, 2);
        assert_eq!(regions[2].image_extent.height, 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = TextureData::parse_ktx2(Path::new("bad.ktx2"), b"not a ktx2 file").unwrap_err();
        assert!(matches!(err, ResourceError::Ktx2Parse { .. }));
    }
}
