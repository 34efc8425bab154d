use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::{foundation::device::GfxDevice, gfx_context::GfxContext};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub mipmap_mode: vk::SamplerMipmapMode,
}
impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        }
    }
}
impl GfxSamplerDesc {
    /// 用于 blit 屏幕纹理：不重复采样边缘
    pub fn clamp_to_edge() -> Self {
        Self {
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            ..Default::default()
        }
    }

    fn create_info(&self) -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .address_mode_u(self.address_mode_u)
            .address_mode_v(self.address_mode_v)
            .address_mode_w(self.address_mode_w)
            .mipmap_mode(self.mipmap_mode)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .anisotropy_enable(false)
            .compare_enable(false)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,
    gfx_device: Rc<GfxDevice>,
}
// new & init
impl GfxSampler {
    pub fn new(ctx: &GfxContext, desc: &GfxSamplerDesc, name: impl AsRef<str>) -> anyhow::Result<Self> {
        let gfx_device = ctx.gfx_device_rc();
        let handle = unsafe { gfx_device.create_sampler(&desc.create_info(), None) }
            .with_context(|| format!("Failed to create sampler: {}", name.as_ref()))?;
        gfx_device.set_object_debug_name(handle, name.as_ref());

        Ok(Self { handle, gfx_device })
    }
}
// getters
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}
// destroy
impl GfxSampler {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        if self.handle == vk::Sampler::null() {
            return;
        }
        unsafe {
            self.gfx_device.destroy_sampler(self.handle, None);
        }
        self.handle = vk::Sampler::null();
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        debug_assert!(self.handle == vk::Sampler::null(), "GfxSampler must be destroyed manually.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampler_is_linear_repeat() {
        let ci = GfxSamplerDesc::default().create_info();
        assert_eq!(ci.mag_filter, vk::Filter::LINEAR);
        assert_eq!(ci.min_filter, vk::Filter::LINEAR);
        assert_eq!(ci.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(ci.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(ci.anisotropy_enable, vk::FALSE);
    }

    #[test]
    fn test_clamp_sampler() {
        let desc = GfxSamplerDesc::clamp_to_edge();
        assert_eq!(desc.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(desc.mag_filter, vk::Filter::LINEAR);
    }
}
