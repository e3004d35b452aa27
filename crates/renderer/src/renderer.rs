//! Vulkan renderer: device bootstrap plus the [`FrameBackend`] that records
//! and submits real frames.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use vkrender_core::Config;
use vkrender_platform::{Surface, Window};
use vkrender_rhi::barrier::layout_transition;
use vkrender_rhi::device::{DEPTH_FORMAT_CANDIDATES, Device};
use vkrender_rhi::instance::Instance;
use vkrender_rhi::physical_device::select_physical_device;
use vkrender_rhi::rendering::{DEPTH_ATTACHMENT_LAYOUT, RenderingAttachments};
use vkrender_scene::Scene;

use crate::error::RendererResult;
use crate::frame_loop::{Acquired, FrameBackend, FrameLoop, FrameOutcome, Presented};
use crate::frame_ring::FrameRing;
use crate::presentation::PresentationChain;
use crate::shader_data::ShaderData;
use crate::static_resources::StaticResources;
use crate::MAX_FRAMES_IN_FLIGHT;

// Field order is destruction order.
struct VulkanFrames {
    statics: StaticResources,
    ring: FrameRing,
    chain: PresentationChain,
    surface: Surface,
    device: Arc<Device>,
    clear_color: [f32; 4],
}

impl FrameBackend for VulkanFrames {
    fn wait_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.ring.slot(slot).fence().wait(u64::MAX)?;
        Ok(())
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.ring.slot(slot).fence().reset()?;
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> RendererResult<Acquired> {
        let semaphore = self.ring.slot(slot).image_acquired().handle();
        Ok(self.chain.acquire(semaphore)?)
    }

    fn release_slot(&mut self, slot: usize) -> RendererResult<()> {
        // SAFETY: the fence was just reset and nothing is pending on it; an
        // empty submission signals it once earlier queue work completes.
        unsafe { self.device.submit(&[], self.ring.slot(slot).fence().handle())? };
        Ok(())
    }

    fn write_shader_data(&mut self, slot: usize, data: &ShaderData) -> RendererResult<()> {
        self.ring.slot(slot).write_shader_data(data)?;
        Ok(())
    }

    fn record(&mut self, slot: usize, image: u32) -> RendererResult<()> {
        let frame = self.ring.slot(slot);
        let cmd = frame.command_buffer();
        let swapchain = self.chain.swapchain();
        let color = swapchain.image(image as usize);
        let depth = self.chain.depth()?;
        let extent = self.chain.extent();

        cmd.reset()?;
        cmd.begin()?;

        cmd.image_barriers(&[
            layout_transition(
                color,
                vk::ImageAspectFlags::COLOR,
                1,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            layout_transition(
                depth.handle(),
                depth.aspect(),
                1,
                vk::ImageLayout::UNDEFINED,
                DEPTH_ATTACHMENT_LAYOUT,
            ),
        ]);

        let attachments = RenderingAttachments::new(
            swapchain.image_view(image as usize),
            depth.view(),
            extent,
            self.clear_color,
        );
        cmd.begin_rendering(&attachments.info());
        cmd.set_viewport_and_scissor(extent);
        self.statics.draw(cmd, frame.shader_data_address());
        cmd.end_rendering();

        cmd.image_barriers(&[layout_transition(
            color,
            vk::ImageAspectFlags::COLOR,
            1,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )]);
        cmd.end()?;
        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> RendererResult<()> {
        let frame = self.ring.slot(slot);
        let waits = [vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.image_acquired().handle())
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signals = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.chain.render_complete(image)?)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_buffers =
            [vk::CommandBufferSubmitInfo::default().command_buffer(frame.command_buffer().handle())];
        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);

        // SAFETY: the command buffer is fully recorded and the fence was reset
        // after its last wait.
        unsafe { self.device.submit(&[submit], frame.fence().handle())? };
        Ok(())
    }

    fn present(&mut self, image: u32) -> RendererResult<Presented> {
        Ok(self.chain.present(image)?)
    }

    fn recreate(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.chain
            .recreate(&self.surface, vk::Extent2D { width, height })?;
        Ok(())
    }
}

/// Owns every GPU object and drives one frame per [`render`](Self::render).
pub struct Renderer {
    frames: FrameLoop<VulkanFrames>,
    device: Arc<Device>,
    // Dropped last; everything above was created from it.
    _instance: Instance,
}

impl Renderer {
    /// Bring up Vulkan for `window` and upload the configured assets.
    ///
    /// # Errors
    ///
    /// Any failure here is a setup error: missing features, no suitable GPU
    /// or depth format, missing assets, or shader module creation.
    pub fn new(window: &Window, config: &Config) -> RendererResult<Self> {
        let (width, height) = window.extent();
        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let extensions = window.required_extensions()?;
        let instance = Instance::new(&extensions, config.renderer.validation)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!(
            "Using {} ({}), queue family {}",
            gpu.device_name(),
            gpu.device_type_name(),
            gpu.queue_family
        );
        let device = Device::new(&instance, &gpu)?;
        let depth_format = device.find_depth_format(&DEPTH_FORMAT_CANDIDATES)?;
        debug!("Depth format: {:?}", depth_format);

        let chain = PresentationChain::new(
            &instance,
            device.clone(),
            &surface,
            vk::Extent2D { width, height },
            depth_format,
        )?;
        let ring = FrameRing::new(device.clone())?;
        let statics = StaticResources::new(
            device.clone(),
            &config.assets,
            &config.renderer,
            chain.color_format(),
            depth_format,
        )?;

        info!(
            "Renderer ready: {} swapchain images, {} frame slots, {} indices, {} textures",
            chain.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            statics.index_count(),
            statics.texture_count()
        );

        let backend = VulkanFrames {
            statics,
            ring,
            chain,
            surface,
            device: device.clone(),
            clear_color: config.renderer.clear_color,
        };
        Ok(Self {
            frames: FrameLoop::new(backend, width, height),
            device,
            _instance: instance,
        })
    }

    /// Note a new framebuffer size; the chain is rebuilt before the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("Resize requested: {}x{}", width, height);
        self.frames.request_resize(width, height);
    }

    /// Render and present one frame of `scene`.
    pub fn render(&mut self, scene: &Scene) -> RendererResult<FrameOutcome> {
        self.frames.render(&ShaderData::from_scene(scene))
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames.frames_presented()
    }

}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {}", e);
        }
        info!(
            "Renderer shutting down after {} frames",
            self.frames.frames_presented()
        );
    }
}
