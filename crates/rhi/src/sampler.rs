//! Texture samplers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Clamp the requested anisotropy to what the device allows.
pub fn clamp_anisotropy(requested: f32, device_max: f32) -> f32 {
    requested.clamp(1.0, device_max.max(1.0))
}

/// Trilinear repeat sampler covering `mip_levels` levels.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn linear(device: Arc<Device>, mip_levels: u32, max_anisotropy: f32) -> RhiResult<Self> {
        let anisotropy = clamp_anisotropy(max_anisotropy, device.limits().max_sampler_anisotropy);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(anisotropy)
            .max_lod(mip_levels as f32);
        // SAFETY: sampler anisotropy is enabled at device creation.
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created sampler: {} mip(s), anisotropy {}", mip_levels, anisotropy);
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_sampler(self.sampler, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_anisotropy() {
        assert_eq!(clamp_anisotropy(8.0, 16.0), 8.0);
        assert_eq!(clamp_anisotropy(8.0, 4.0), 4.0);
        assert_eq!(clamp_anisotropy(0.0, 16.0), 1.0);
        assert_eq!(clamp_anisotropy(8.0, 0.0), 1.0);
    }
}
