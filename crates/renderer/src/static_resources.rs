//! Resources uploaded once at startup and only read afterwards: the mesh
//! buffer, the textures with their samplers, the descriptor set that binds
//! them, and the graphics pipeline.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkrender_core::{AssetConfig, RendererConfig, TEXTURE_COUNT};
use vkrender_resources::{MeshData, TextureData};
use vkrender_rhi::barrier::layout_transition;
use vkrender_rhi::buffer::{Buffer, BufferUsage};
use vkrender_rhi::command::CommandBuffer;
use vkrender_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, image_info, sampler_array_binding, write_image_samplers,
};
use vkrender_rhi::device::Device;
use vkrender_rhi::image::Image;
use vkrender_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkrender_rhi::sampler::Sampler;
use vkrender_rhi::shader::{Shader, ShaderStage};
use vkrender_rhi::upload::UploadContext;
use vkrender_rhi::vertex::Vertex;
use vkrender_scene::INSTANCE_COUNT;

use crate::error::{RendererError, RendererResult};

const TEXTURE_BINDING: u32 = 0;
const TEXTURE_LAYOUT: vk::ImageLayout = vk::ImageLayout::READ_ONLY_OPTIMAL;
const PUSH_CONSTANT_SIZE: u32 = size_of::<vk::DeviceAddress>() as u32;

struct MeshBuffer {
    buffer: Buffer,
    index_offset: vk::DeviceSize,
    index_count: u32,
}

// Field order is drop order: pipeline objects, then descriptors, then the
// images and buffers they reference.
pub struct StaticResources {
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    descriptor_set: vk::DescriptorSet,
    _descriptor_pool: DescriptorPool,
    _descriptor_set_layout: DescriptorSetLayout,
    _samplers: Vec<Sampler>,
    textures: Vec<Image>,
    mesh: MeshBuffer,
}

impl StaticResources {
    pub fn new(
        device: Arc<Device>,
        assets: &AssetConfig,
        config: &RendererConfig,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RendererResult<Self> {
        if assets.textures.len() != TEXTURE_COUNT {
            return Err(RendererError::TextureCount {
                expected: TEXTURE_COUNT,
                found: assets.textures.len(),
            });
        }

        let mesh = upload_mesh(&device, &MeshData::load_obj(&assets.mesh)?)?;

        let upload = UploadContext::new(device.clone())?;
        let mut textures = Vec::with_capacity(TEXTURE_COUNT);
        let mut samplers = Vec::with_capacity(TEXTURE_COUNT);
        for path in &assets.textures {
            let data = TextureData::load_ktx2(path)?;
            let image = upload_texture(&device, &upload, &data)?;
            samplers.push(Sampler::linear(
                device.clone(),
                image.mip_levels(),
                config.max_anisotropy,
            )?);
            textures.push(image);
        }
        info!("Uploaded {} textures", textures.len());

        let (binding, flags) = sampler_array_binding(
            TEXTURE_BINDING,
            TEXTURE_COUNT as u32,
            vk::ShaderStageFlags::FRAGMENT,
        );
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &[binding], &[flags])?;
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: TEXTURE_COUNT as u32,
        }];
        let descriptor_pool = DescriptorPool::new(device.clone(), 1, &pool_sizes)?;
        let descriptor_set =
            descriptor_pool.allocate_variable(&descriptor_set_layout, TEXTURE_COUNT as u32)?;
        let image_infos: Vec<_> = textures
            .iter()
            .zip(&samplers)
            .map(|(image, sampler)| image_info(sampler.handle(), image.view(), TEXTURE_LAYOUT))
            .collect();
        write_image_samplers(&device, descriptor_set, TEXTURE_BINDING, &image_infos);
        info!("Descriptor set ready: {} combined image samplers", image_infos.len());

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: PUSH_CONSTANT_SIZE,
        }];
        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[descriptor_set_layout.handle()],
            &push_constant_ranges,
        )?;

        let vertex_shader =
            Shader::from_spirv_file(device.clone(), &assets.vertex_shader, ShaderStage::Vertex)?;
        let fragment_shader =
            Shader::from_spirv_file(device.clone(), &assets.fragment_shader, ShaderStage::Fragment)?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_input(Vertex::binding_description(), &Vertex::attribute_descriptions())
            .cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .color_attachment_format(color_format)
            .depth_attachment_format(depth_format)
            .build(device, &pipeline_layout)?;

        Ok(Self {
            pipeline,
            pipeline_layout,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            _descriptor_set_layout: descriptor_set_layout,
            _samplers: samplers,
            textures,
            mesh,
        })
    }

    /// Bind everything and draw all instances, reading shader data from `shader_data`.
    pub fn draw(&self, cmd: &CommandBuffer, shader_data: vk::DeviceAddress) {
        cmd.bind_graphics_pipeline(self.pipeline.handle());
        cmd.bind_descriptor_set(self.pipeline_layout.handle(), self.descriptor_set);
        cmd.bind_vertex_buffer(self.mesh.buffer.handle(), 0);
        cmd.bind_index_buffer(
            self.mesh.buffer.handle(),
            self.mesh.index_offset,
            vk::IndexType::UINT16,
        );
        cmd.push_constants(
            self.pipeline_layout.handle(),
            vk::ShaderStageFlags::VERTEX,
            0,
            &shader_data,
        );
        cmd.draw_indexed(self.mesh.index_count, INSTANCE_COUNT as u32);
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.mesh.index_count
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

fn upload_mesh(device: &Arc<Device>, mesh: &MeshData) -> RendererResult<MeshBuffer> {
    let buffer = Buffer::new_with_data(device.clone(), BufferUsage::Mesh, &mesh.to_bytes())?;
    info!(
        "Mesh uploaded: {} vertices, {} indices, {} bytes",
        mesh.vertices.len(),
        mesh.indices.len(),
        buffer.size()
    );
    Ok(MeshBuffer {
        buffer,
        index_offset: mesh.vertex_bytes(),
        index_count: mesh.index_count(),
    })
}

/// One transition to transfer-dst, one copy per mip, one transition to read-only.
fn upload_texture(
    device: &Arc<Device>,
    upload: &UploadContext,
    data: &TextureData,
) -> RendererResult<Image> {
    let image = Image::texture(
        device.clone(),
        data.format,
        vk::Extent2D {
            width: data.width,
            height: data.height,
        },
        data.mip_levels(),
    )?;
    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, &data.bytes)?;
    let regions = data.copy_regions();

    upload.submit_and_wait(|cmd| {
        cmd.image_barriers(&[layout_transition(
            image.handle(),
            image.aspect(),
            image.mip_levels(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )]);
        cmd.copy_buffer_to_image(staging.handle(), image.handle(), &regions);
        cmd.image_barriers(&[layout_transition(
            image.handle(),
            image.aspect(),
            image.mip_levels(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            TEXTURE_LAYOUT,
        )]);
        Ok(())
    })?;

    debug!(
        "Texture uploaded: {}x{}, {} mip(s)",
        data.width,
        data.height,
        data.mip_levels()
    );
    Ok(image)
}
