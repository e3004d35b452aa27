//! Attachment setup for dynamic rendering.
//!
//! ```no_run
//! use ash::vk;
//! use vkrender_rhi::command::CommandBuffer;
//! use vkrender_rhi::rendering::RenderingAttachments;
//!
//! # fn example(color: vk::ImageView, depth: vk::ImageView, cmd: &CommandBuffer) {
//! let extent = vk::Extent2D { width: 1280, height: 720 };
//! let attachments = RenderingAttachments::new(color, depth, extent, [0.1, 0.1, 0.15, 1.0]);
//! cmd.begin_rendering(&attachments.info());
//! cmd.end_rendering();
//! # }
//! ```

use ash::vk;

/// Layout the depth attachment is rendered in.
pub const DEPTH_ATTACHMENT_LAYOUT: vk::ImageLayout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;

/// One cleared color target plus a cleared, discarded depth target.
pub struct RenderingAttachments {
    color: [vk::RenderingAttachmentInfo<'static>; 1],
    depth: vk::RenderingAttachmentInfo<'static>,
    render_area: vk::Rect2D,
}

impl RenderingAttachments {
    pub fn new(
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Self {
        let color = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            });
        let depth = vk::RenderingAttachmentInfo::default()
            .image_view(depth_view)
            .image_layout(DEPTH_ATTACHMENT_LAYOUT)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        Self {
            color: [color],
            depth,
            render_area: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            },
        }
    }

    pub fn info(&self) -> vk::RenderingInfo<'_> {
        vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color)
            .depth_attachment(&self.depth)
    }

    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachments_clear_both_targets() {
        let extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let attachments = RenderingAttachments::new(
            vk::ImageView::null(),
            vk::ImageView::null(),
            extent,
            [0.1, 0.2, 0.3, 1.0],
        );
        let info = attachments.info();
        assert_eq!(info.color_attachment_count, 1);
        assert_eq!(info.render_area.extent.width, 640);
        assert_eq!(attachments.color[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachments.depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(unsafe { attachments.depth.clear_value.depth_stencil.depth }, 1.0);
    }
}
