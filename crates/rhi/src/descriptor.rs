//! Descriptor set layouts, pools and writes.
//!
//! The renderer binds a single set: one variable-length array of combined
//! image samplers read by the fragment shader.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Owned `VkDescriptorSetLayout`.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Create a layout. `binding_flags` is either empty or has one entry per binding.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
        binding_flags: &[vk::DescriptorBindingFlags],
    ) -> RhiResult<Self> {
        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(binding_flags);
        let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        if !binding_flags.is_empty() {
            create_info = create_info.push_next(&mut flags_info);
        }

        // SAFETY: the device is live and create_info only points at locals.
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        // SAFETY: no pipeline layout is being created from it concurrently.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Owned `VkDescriptorPool`. Sets are released with the pool.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        // SAFETY: the device is live.
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!("Created descriptor pool: max_sets={}", max_sets);
        Ok(Self { device, pool })
    }

    /// Allocate one set whose last binding has `variable_count` descriptors.
    pub fn allocate_variable(
        &self,
        layout: &DescriptorSetLayout,
        variable_count: u32,
    ) -> RhiResult<vk::DescriptorSet> {
        let counts = [variable_count];
        let mut variable_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
            .descriptor_counts(&counts);
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts)
            .push_next(&mut variable_info);

        // SAFETY: pool and layout belong to this device.
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets[0])
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // SAFETY: the device is idle at teardown, so no set from this pool is in use.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Binding for an array of `count` combined image samplers with a variable
/// descriptor count.
pub fn sampler_array_binding(
    binding: u32,
    count: u32,
    stage_flags: vk::ShaderStageFlags,
) -> (vk::DescriptorSetLayoutBinding<'static>, vk::DescriptorBindingFlags) {
    (
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(count)
            .stage_flags(stage_flags),
        vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT,
    )
}

#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

/// Write combined image samplers into `set` starting at element 0 of `binding`.
pub fn write_image_samplers(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    images: &[vk::DescriptorImageInfo],
) {
    if images.is_empty() {
        return;
    }
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(images);
    // SAFETY: the set is not bound by any pending command buffer during setup.
    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
    debug!("Wrote {} image sampler(s) to binding {}", images.len(), binding);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_array_binding() {
        let (binding, flags) = sampler_array_binding(0, 3, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_count, 3);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(flags, vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT);
    }

    #[test]
    fn test_image_info() {
        let info = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::READ_ONLY_OPTIMAL,
        );
        assert_eq!(info.image_layout, vk::ImageLayout::READ_ONLY_OPTIMAL);
    }
}
