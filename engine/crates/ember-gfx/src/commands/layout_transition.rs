//! image layout 转换表
//!
//! 只支持引擎中实际出现的几种转换，其余组合返回 `None`，由调用方记录错误并跳过 barrier。

use ash::vk;

use crate::commands::barrier::{GfxBarrierMask, GfxImageBarrier};

/// 查表得到一次 layout 转换需要的 stage 和 access
pub fn transition_mask(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Option<GfxBarrierMask> {
    use vk::AccessFlags2 as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags2 as S;

    let mask = |src_stage, src_access, dst_stage, dst_access| GfxBarrierMask {
        src_stage,
        dst_stage,
        src_access,
        dst_access,
    };

    let m = match (old_layout, new_layout) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => mask(S::TOP_OF_PIPE, A::NONE, S::TRANSFER, A::TRANSFER_WRITE),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            mask(S::TRANSFER, A::TRANSFER_WRITE, S::FRAGMENT_SHADER, A::SHADER_READ)
        }
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => mask(
            S::TOP_OF_PIPE,
            A::NONE,
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        // swapchain image 由 acquire semaphore 在 COLOR_ATTACHMENT_OUTPUT 阶段等待，这里的 src 需要与之衔接
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => mask(
            S::COLOR_ATTACHMENT_OUTPUT,
            A::NONE,
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
        ),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            mask(S::COLOR_ATTACHMENT_OUTPUT, A::COLOR_ATTACHMENT_WRITE, S::FRAGMENT_SHADER, A::SHADER_READ)
        }
        (L::SHADER_READ_ONLY_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL) => mask(
            S::FRAGMENT_SHADER,
            A::SHADER_READ,
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
        ),
        (L::UNDEFINED, L::PRESENT_SRC_KHR) => mask(S::COLOR_ATTACHMENT_OUTPUT, A::NONE, S::BOTTOM_OF_PIPE, A::NONE),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => {
            mask(S::COLOR_ATTACHMENT_OUTPUT, A::COLOR_ATTACHMENT_WRITE, S::BOTTOM_OF_PIPE, A::NONE)
        }
        _ => return None,
    };
    Some(m)
}

/// format 是否带有 stencil 分量
#[inline]
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT | vk::Format::S8_UINT
    )
}

/// format 是否为深度格式
#[inline]
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::X8_D24_UNORM_PACK32
    )
}

/// 根据 format 推导 barrier 的 aspect
pub fn aspect_of_format(format: vk::Format) -> vk::ImageAspectFlags {
    if is_depth_format(format) {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else if format == vk::Format::S8_UINT {
        vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// 生成一个完整的 layout 转换 barrier，不支持的组合会记录错误并返回 `None`
pub fn layout_transition_barrier(
    image: vk::Image,
    format: vk::Format,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Option<GfxImageBarrier> {
    let Some(mask) = transition_mask(old_layout, new_layout) else {
        log::error!("unsupported image layout transition: {:?} -> {:?}", old_layout, new_layout);
        return None;
    };

    Some(
        GfxImageBarrier::new()
            .image(image)
            .layout_transfer(old_layout, new_layout)
            .mask(mask)
            .image_aspect_flag(aspect_of_format(format)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_transitions() {
        let pairs = [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR),
            (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
        ];
        for (old, new) in pairs {
            assert!(transition_mask(old, new).is_some(), "{old:?} -> {new:?}");
        }
    }

    #[test]
    fn test_unsupported_transition_rejected() {
        assert!(transition_mask(vk::ImageLayout::PRESENT_SRC_KHR, vk::ImageLayout::TRANSFER_DST_OPTIMAL).is_none());
        assert!(transition_mask(vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).is_none());
        assert!(
            layout_transition_barrier(
                vk::Image::null(),
                vk::Format::R8G8B8A8_UNORM,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
            .is_none()
        );
    }

    #[test]
    fn test_color_to_shader_read_masks() {
        let mask =
            transition_mask(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .unwrap();
        assert_eq!(mask.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(mask.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(mask.dst_stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(mask.dst_access, vk::AccessFlags2::SHADER_READ);
    }

    #[test]
    fn test_depth_aspect_includes_stencil_when_present() {
        assert_eq!(
            aspect_of_format(vk::Format::D32_SFLOAT_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_of_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_of_format(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_of_format(vk::Format::B8G8R8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_barrier_carries_layouts() {
        let barrier = layout_transition_barrier(
            vk::Image::null(),
            vk::Format::D24_UNORM_S8_UINT,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        let inner = barrier.inner();
        assert_eq!(inner.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(inner.new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert!(inner.subresource_range.aspect_mask.contains(vk::ImageAspectFlags::STENCIL));
    }
}
