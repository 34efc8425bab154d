use ash::vk;
use ember_gfx::commands::command_buffer::GfxCommandBuffer;
use ember_gfx::commands::layout_transition;
use ember_gfx::gfx_context::GfxContext;
use ember_gfx::resources::buffer::MemoryKind;
use ember_gfx::resources::image::{GfxImage, GfxImageCreateInfo};
use ember_gfx::resources::image_view::{GfxImageView, GfxImageViewDesc};
use ember_gfx::resources::sampler::{GfxSampler, GfxSamplerDesc};
use ember_render_interface::pipeline_settings::DefaultRendererSettings;

/// 与 swapchain 同尺寸的 depth/stencil attachment
pub struct DepthTarget {
    image: GfxImage,
    view: GfxImageView,
}
// new & init
impl DepthTarget {
    pub fn new(ctx: &GfxContext, extent: vk::Extent2D, format: vk::Format) -> anyhow::Result<Self> {
        let image_info =
            GfxImageCreateInfo::new_image_2d_info(extent, format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        let mut image = GfxImage::new(ctx, &image_info, MemoryKind::GpuOnly, "depth")?;
        let view = match GfxImageView::new(
            ctx,
            image.handle(),
            GfxImageViewDesc::new_2d(format, layout_transition::aspect_of_format(format)),
            "depth",
        ) {
            Ok(view) => view,
            Err(e) => {
                image.destroy_mut();
                return Err(e);
            }
        };
        Ok(Self { image, view })
    }

    /// 从 candidates 中挑选第一个支持 depth/stencil attachment 的格式
    pub fn choose_format(ctx: &GfxContext) -> anyhow::Result<vk::Format> {
        ctx.find_supported_format(
            DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("no supported depth/stencil format"))
    }

    /// UNDEFINED -> DEPTH_STENCIL_ATTACHMENT
    pub fn record_initial_transition(&self, ctx: &GfxContext, cmd: &GfxCommandBuffer) {
        ctx.transition_image_layout(
            cmd,
            self.image.handle(),
            self.image.format(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        );
    }
}
// getters
impl DepthTarget {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> &GfxImageView {
        &self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// format 带 stencil 时，dynamic rendering 也要挂上 stencil attachment
    #[inline]
    pub fn has_stencil(&self) -> bool {
        layout_transition::has_stencil_component(self.image.format())
    }
}
// destroy
impl DepthTarget {
    pub fn destroy(self) {
        self.view.destroy();
        self.image.destroy();
    }
}

/// 离屏 color target，先作为 color attachment，之后被合成 pass 采样
///
/// 记录当前 layout，避免重复或错误的转换
pub struct OffscreenTarget {
    image: GfxImage,
    view: GfxImageView,
    sampler: GfxSampler,

    layout: vk::ImageLayout,
}
// new & init
impl OffscreenTarget {
    pub fn new(ctx: &GfxContext, extent: vk::Extent2D) -> anyhow::Result<Self> {
        let format = DefaultRendererSettings::OFFSCREEN_COLOR_FORMAT;
        let image_info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        );
        let mut image = GfxImage::new(ctx, &image_info, MemoryKind::GpuOnly, "offscreen-color")?;
        let mut view = match GfxImageView::new(
            ctx,
            image.handle(),
            GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::COLOR),
            "offscreen-color",
        ) {
            Ok(view) => view,
            Err(e) => {
                image.destroy_mut();
                return Err(e);
            }
        };
        let sampler = match GfxSampler::new(ctx, &GfxSamplerDesc::clamp_to_edge(), "offscreen-color") {
            Ok(sampler) => sampler,
            Err(e) => {
                view.destroy_mut();
                image.destroy_mut();
                return Err(e);
            }
        };

        Ok(Self {
            image,
            view,
            sampler,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }
}
// getters
impl OffscreenTarget {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> &GfxImageView {
        &self.view
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}
// tools
impl OffscreenTarget {
    /// 记录到 new_layout 的转换；已经处于该 layout 时跳过
    ///
    /// # return
    /// 是否记录了 barrier
    pub fn transition_to(&mut self, ctx: &GfxContext, cmd: &GfxCommandBuffer, new_layout: vk::ImageLayout) -> bool {
        if !needs_transition(self.layout, new_layout) {
            return false;
        }
        if ctx.transition_image_layout(cmd, self.image.handle(), self.image.format(), self.layout, new_layout) {
            self.layout = new_layout;
            true
        } else {
            false
        }
    }
}
// destroy
impl OffscreenTarget {
    pub fn destroy(mut self) {
        self.sampler.destroy_mut();
        self.view.destroy_mut();
        self.image.destroy_mut();
    }
}

/// 从 current 到 target 是否需要 barrier
#[inline]
pub fn needs_transition(current: vk::ImageLayout, target: vk::ImageLayout) -> bool {
    current != target && target != vk::ImageLayout::UNDEFINED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_transition() {
        assert!(needs_transition(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
        assert!(needs_transition(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        ));
        assert!(!needs_transition(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        ));
        assert!(!needs_transition(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::UNDEFINED));
    }

    #[test]
    fn test_offscreen_ping_pong_is_supported() {
        // 每帧在 COLOR_ATTACHMENT 与 SHADER_READ_ONLY 之间往返
        let sequence = [
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ];
        for pair in sequence.windows(2) {
            assert!(layout_transition::transition_mask(pair[0], pair[1]).is_some(), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_depth_candidates_have_stencil() {
        for format in DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES {
            assert!(layout_transition::has_stencil_component(*format));
        }
    }
}
