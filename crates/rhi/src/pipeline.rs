//! Pipeline layout and the dynamic-rendering graphics pipeline.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use ash::vk;
//! use vkrender_rhi::device::Device;
//! use vkrender_rhi::pipeline::{GraphicsPipelineBuilder, PipelineLayout};
//! use vkrender_rhi::shader::{Shader, ShaderStage};
//! use vkrender_rhi::vertex::Vertex;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkrender_rhi::RhiError> {
//! let vs = Shader::from_spirv_file(device.clone(), Path::new("mesh.vert.spv"), ShaderStage::Vertex)?;
//! let fs = Shader::from_spirv_file(device.clone(), Path::new("mesh.frag.spv"), ShaderStage::Fragment)?;
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vs)
//!     .fragment_shader(&fs)
//!     .vertex_input(Vertex::binding_description(), &Vertex::attribute_descriptions())
//!     .color_attachment_format(vk::Format::B8G8R8A8_SRGB)
//!     .depth_attachment_format(vk::Format::D32_SFLOAT_S8_UINT)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Owned `VkPipelineLayout`.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        // SAFETY: the device is live and the set layouts belong to it.
        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        debug!(
            "Created pipeline layout: {} set layout(s), {} push constant range(s)",
            set_layouts.len(),
            push_constant_ranges.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        // SAFETY: pipelines created with this layout are dropped first.
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Owned graphics pipeline.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // SAFETY: the device is idle at teardown.
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Builder for a single-subpass pipeline targeting dynamic rendering.
///
/// Viewport and scissor are always dynamic so the pipeline survives
/// swapchain recreation.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_compare_op: vk::CompareOp,
    color_attachment_format: Option<vk::Format>,
    depth_attachment_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
            color_attachment_format: None,
            depth_attachment_format: None,
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn vertex_input(
        mut self,
        binding: vk::VertexInputBindingDescription,
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings = vec![binding];
        self.vertex_attributes = attributes.to_vec();
        self
    }

    pub fn cull_mode(mut self, mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.cull_mode = mode;
        self.front_face = front_face;
        self
    }

    pub fn depth_compare_op(mut self, op: vk::CompareOp) -> Self {
        self.depth_compare_op = op;
        self
    }

    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_format = Some(format);
        self
    }

    /// Enables depth test and write against an attachment of `format`.
    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = Some(format);
        self
    }

    /// Check that everything `build` needs is present.
    pub fn validate(&self) -> RhiResult<()> {
        if self.vertex_shader.is_none() {
            return Err(RhiError::PipelineError("Vertex shader is required".into()));
        }
        if self.fragment_shader.is_none() {
            return Err(RhiError::PipelineError("Fragment shader is required".into()));
        }
        if self.color_attachment_format.is_none() {
            return Err(RhiError::PipelineError(
                "Color attachment format is required".into(),
            ));
        }
        Ok(())
    }

    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        self.validate()?;
        let (Some(vs), Some(fs), Some(color_format)) = (
            self.vertex_shader,
            self.fragment_shader,
            self.color_attachment_format,
        ) else {
            unreachable!("validated above");
        };

        let stages = [vs.stage_create_info(), fs.stage_create_info()];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let has_depth = self.depth_attachment_format.is_some();
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth)
            .depth_write_enable(has_depth)
            .depth_compare_op(self.depth_compare_op);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [color_format];
        let mut rendering =
            vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);
        if let Some(depth_format) = self.depth_attachment_format {
            rendering = rendering.depth_attachment_format(depth_format);
        }

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .push_next(&mut rendering);

        // SAFETY: every state struct referenced by create_info lives until the call returns.
        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?[0]
        };
        info!("Graphics pipeline created");

        Ok(Pipeline { device, pipeline })
    }
}
