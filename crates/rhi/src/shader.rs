//! SPIR-V shader modules.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

const ENTRY_POINT: &CStr = c"main";
const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Decode a SPIR-V binary into code words, checking alignment and magic.
pub fn decode_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::ShaderError(format!("Invalid SPIR-V: {e}")))?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        _ => Err(RhiError::ShaderError("Missing SPIR-V magic number".into())),
    }
}

/// A shader module with its pipeline stage. Entry point is always `main`.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;
        Self::from_spirv_bytes(device, &bytes, stage)
    }

    pub fn from_spirv_bytes(device: Arc<Device>, bytes: &[u8], stage: ShaderStage) -> RhiResult<Self> {
        let code = decode_spirv(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        // SAFETY: code is a validated word-aligned SPIR-V blob.
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };
        debug!("Created {} shader module ({} words)", stage, code.len());
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        // SAFETY: modules are only needed while pipelines are being created.
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_flags() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_vk_stage(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_decode_spirv_accepts_magic() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_decode_spirv_rejects_misaligned() {
        assert!(decode_spirv(&[0x03, 0x02, 0x23]).is_err());
    }

    #[test]
    fn test_decode_spirv_rejects_bad_magic() {
        let bytes = 0xdead_beefu32.to_le_bytes();
        assert!(matches!(decode_spirv(&bytes), Err(RhiError::ShaderError(_))));
    }
}
