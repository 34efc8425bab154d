use anyhow::Context;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx_context::GfxContext};

/// 窗口对应的 surface
///
/// 生命周期与窗口一致，swapchain 重建时不会重建 surface
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
}
impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxSurface {
    pub fn new(
        ctx: &GfxContext,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> anyhow::Result<Self> {
        let surface_pf = ash::khr::surface::Instance::new(ctx.vk_entry(), ctx.instance().ash_instance());

        let handle = unsafe {
            ash_window::create_surface(
                ctx.vk_entry(),
                ctx.instance().ash_instance(),
                raw_display_handle,
                raw_window_handle,
                None,
            )
        }
        .context("Failed to create window surface")?;
        Self::from_handle(ctx, handle, surface_pf)
    }

    /// 没有窗口的 surface，需要 `GfxContext::new_headless` 开启的 extensions
    pub fn new_headless(ctx: &GfxContext) -> anyhow::Result<Self> {
        let surface_pf = ash::khr::surface::Instance::new(ctx.vk_entry(), ctx.instance().ash_instance());
        let headless_pf = ash::ext::headless_surface::Instance::new(ctx.vk_entry(), ctx.instance().ash_instance());

        let handle = unsafe { headless_pf.create_headless_surface(&vk::HeadlessSurfaceCreateInfoEXT::default(), None) }
            .context("Failed to create headless surface")?;
        Self::from_handle(ctx, handle, surface_pf)
    }

    fn from_handle(
        ctx: &GfxContext,
        handle: vk::SurfaceKHR,
        surface_pf: ash::khr::surface::Instance,
    ) -> anyhow::Result<Self> {
        let surface = GfxSurface {
            handle,
            pf: surface_pf,
            physical_device: ctx.physical_device().vk_handle(),
        };
        ctx.gfx_device().set_debug_name(&surface, "main");

        let present_support = unsafe {
            surface.pf.get_physical_device_surface_support(
                surface.physical_device,
                ctx.gfx_queue_family().queue_family_index,
                surface.handle,
            )
        }
        .context("Failed to query surface present support")?;
        if !present_support {
            surface.destroy();
            anyhow::bail!("graphics queue family can not present to the window surface");
        }

        Ok(surface)
    }
}
// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn get_capabilities(&self) -> anyhow::Result<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.pf.get_physical_device_surface_capabilities(self.physical_device, self.handle) }
            .context("Failed to query surface capabilities")
    }

    pub fn get_formats(&self) -> anyhow::Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.pf.get_physical_device_surface_formats(self.physical_device, self.handle) }
            .context("Failed to query surface formats")
    }

    pub fn get_present_modes(&self) -> anyhow::Result<Vec<vk::PresentModeKHR>> {
        unsafe { self.pf.get_physical_device_surface_present_modes(self.physical_device, self.handle) }
            .context("Failed to query surface present modes")
    }
}
// destroy
impl GfxSurface {
    pub fn destroy(self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}
