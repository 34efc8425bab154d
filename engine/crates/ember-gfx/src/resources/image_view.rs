use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::{
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx_context::GfxContext,
};

pub struct GfxImageView {
    handle: vk::ImageView,
    gfx_device: Rc<GfxDevice>,

    desc: GfxImageViewDesc,

    name: String,
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImage2DView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImageView {
    pub fn new(
        ctx: &GfxContext,
        image: vk::Image,
        view_desc: GfxImageViewDesc,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let gfx_device = ctx.gfx_device_rc();

        let info = vk::ImageViewCreateInfo {
            image,
            view_type: view_desc.view_type,
            format: view_desc.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: view_desc.aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };

        let handle = unsafe { gfx_device.create_image_view(&info, None) }
            .with_context(|| format!("Failed to create image view: {}", name.as_ref()))?;
        let image_view = Self {
            handle,
            gfx_device,
            desc: view_desc,
            name: name.as_ref().to_string(),
        };
        image_view.gfx_device.set_debug_name(&image_view, &image_view.name);
        Ok(image_view)
    }
}
// destroy
impl GfxImageView {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }
    pub fn destroy_mut(&mut self) {
        if self.handle == vk::ImageView::null() {
            return;
        }
        unsafe {
            self.gfx_device.destroy_image_view(self.handle, None);
        }
        self.handle = vk::ImageView::null();
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        debug_assert!(self.handle == vk::ImageView::null(), "GfxImageView {} must be destroyed manually.", self.name);
    }
}
// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
impl std::fmt::Display for GfxImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image2DView({}, {:?})", self.name, self.handle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// format 可以基于 vk::Image 重解释
    pub(crate) format: vk::Format,
    pub(crate) view_type: vk::ImageViewType,
    /// aspect 决定 view 看到的是 color 还是 depth/stencil
    pub(crate) aspect_mask: vk::ImageAspectFlags,
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }
}
