//! Image layout transitions expressed as synchronization2 barriers.
//!
//! The stage and access masks for each transition the renderer performs are
//! kept in one table, [`transition_masks`], so recording code only names the
//! old and new layouts.

use ash::vk;

/// Source and destination scopes of one layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

const DEPTH_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

/// Masks for `old -> new`.
///
/// Unknown pairs fall back to a full `ALL_COMMANDS` barrier.
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> TransitionMasks {
    use vk::ImageLayout as L;
    match (old, new) {
        // Swapchain image: wait for the acquire semaphore's stage, nothing to flush.
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        },
        // The depth buffer is shared by all frames: the previous frame's depth
        // writes must finish before this frame clears it.
        (L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL)
        | (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_stage: DEPTH_STAGES,
            src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_stage: DEPTH_STAGES,
            dst_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        },
        (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => TransitionMasks {
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage: vk::PipelineStageFlags2::NONE,
            dst_access: vk::AccessFlags2::NONE,
        },
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_stage: vk::PipelineStageFlags2::NONE,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::TRANSFER,
            dst_access: vk::AccessFlags2::TRANSFER_WRITE,
        },
        (L::TRANSFER_DST_OPTIMAL, L::READ_ONLY_OPTIMAL)
        | (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_stage: vk::PipelineStageFlags2::TRANSFER,
            src_access: vk::AccessFlags2::TRANSFER_WRITE,
            dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            dst_access: vk::AccessFlags2::SHADER_READ,
        },
        _ => {
            tracing::warn!("Unhandled layout transition: {:?} -> {:?}", old, new);
            TransitionMasks {
                src_stage: vk::PipelineStageFlags2::ALL_COMMANDS,
                src_access: vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
                dst_stage: vk::PipelineStageFlags2::ALL_COMMANDS,
                dst_access: vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
            }
        }
    }
}

/// Build a barrier moving every mip level of `image` from `old` to `new`.
pub fn layout_transition(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> vk::ImageMemoryBarrier2<'static> {
    let masks = transition_masks(old, new);
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(masks.src_stage)
        .src_access_mask(masks.src_access)
        .dst_stage_mask(masks.dst_stage)
        .dst_access_mask(masks.dst_access)
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(mip_levels)
                .base_array_layer(0)
                .layer_count(1),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::ImageLayout as L;

    #[test]
    fn test_color_attachment_waits_on_output_stage() {
        let m = transition_masks(L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(m.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(m.dst_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_depth_transition_orders_against_previous_writes() {
        let m = transition_masks(L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL);
        assert!(m.src_stage.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert!(m.src_access.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert!(m.dst_stage.contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS));
    }

    #[test]
    fn test_present_transition_flushes_color_writes() {
        let m = transition_masks(L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR);
        assert_eq!(m.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(m.dst_stage, vk::PipelineStageFlags2::NONE);
    }

    #[test]
    fn test_upload_transitions() {
        let to_dst = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags2::NONE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags2::TRANSFER);

        let to_read = transition_masks(L::TRANSFER_DST_OPTIMAL, L::READ_ONLY_OPTIMAL);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(to_read.dst_access, vk::AccessFlags2::SHADER_READ);
    }

    #[test]
    fn test_unknown_transition_is_full_barrier() {
        let m = transition_masks(L::GENERAL, L::TRANSFER_SRC_OPTIMAL);
        assert_eq!(m.src_stage, vk::PipelineStageFlags2::ALL_COMMANDS);
        assert_eq!(m.dst_stage, vk::PipelineStageFlags2::ALL_COMMANDS);
    }

    #[test]
    fn test_layout_transition_covers_all_mips() {
        let barrier = layout_transition(
            vk::Image::null(),
            vk::ImageAspectFlags::COLOR,
            5,
            L::UNDEFINED,
            L::TRANSFER_DST_OPTIMAL,
        );
        assert_eq!(barrier.subresource_range.level_count, 5);
        assert_eq!(barrier.new_layout, L::TRANSFER_DST_OPTIMAL);
    }
}
