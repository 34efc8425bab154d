use ash::vk;

use crate::{
    gfx_context::GfxContext,
    resources::{
        image::GfxImage,
        image_view::{GfxImageView, GfxImageViewDesc},
        sampler::{GfxSampler, GfxSamplerDesc},
    },
};

/// image + view + sampler，可以直接写入 COMBINED_IMAGE_SAMPLER 的 descriptor
pub struct GfxTexture2D {
    image: GfxImage,
    image_view: GfxImageView,
    sampler: GfxSampler,
}
// new & init
impl GfxTexture2D {
    /// 上传 RGBA8 数据，完成后 image 处于 SHADER_READ_ONLY_OPTIMAL
    pub fn from_rgba8(
        ctx: &GfxContext,
        width: u32,
        height: u32,
        pixels: &[u8],
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let name = name.as_ref();
        let format = vk::Format::R8G8B8A8_SRGB;
        let mut image = GfxImage::new_rgba8_with_data(ctx, width, height, pixels, format, name)?;

        let image_view = match GfxImageView::new(
            ctx,
            image.handle(),
            GfxImageViewDesc::new_2d(format, vk::ImageAspectFlags::COLOR),
            format!("{name}-view"),
        ) {
            Ok(view) => view,
            Err(e) => {
                image.destroy_mut();
                return Err(e);
            }
        };

        let sampler = match GfxSampler::new(ctx, &GfxSamplerDesc::default(), format!("{name}-sampler")) {
            Ok(sampler) => sampler,
            Err(e) => {
                image_view.destroy();
                image.destroy_mut();
                return Err(e);
            }
        };

        Ok(Self {
            image,
            image_view,
            sampler,
        })
    }
}
// getters
impl GfxTexture2D {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn image_view(&self) -> &GfxImageView {
        &self.image_view
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }

    #[inline]
    pub fn descriptor_image_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.image_view.handle(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}
// destroy
impl GfxTexture2D {
    pub fn destroy(self) {
        self.sampler.destroy();
        self.image_view.destroy();
        self.image.destroy();
    }
}
