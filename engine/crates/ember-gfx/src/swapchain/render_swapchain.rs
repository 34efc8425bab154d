use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    foundation::device::GfxDevice,
    gfx_context::GfxContext,
    swapchain::surface::GfxSurface,
};

/// acquire 的结果，`OutOfDate` 时需要重建 swapchain 并放弃这一帧
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireResult {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

/// present 的结果
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}
impl PresentResult {
    #[inline]
    pub fn need_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

pub struct GfxRenderSwapchain {
    swapchain_handle: vk::SwapchainKHR,
    gfx_device: Rc<GfxDevice>,

    swapchain_images: Vec<vk::Image>,
    swapchain_image_index: usize,

    color_format: vk::Format,
    swapchain_extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    pub fn new(
        ctx: &GfxContext,
        surface: &GfxSurface,
        present_mode: vk::PresentModeKHR,
        surface_format: vk::SurfaceFormatKHR,
        window_physical_extent: vk::Extent2D,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GfxRenderSwapchain::new");
        let surface_capabilities = surface.get_capabilities()?;

        let extent = Self::calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height
        );

        let surface_format = Self::choose_surface_format(&surface.get_formats()?, surface_format);
        let present_mode = Self::choose_present_mode(&surface.get_present_modes()?, present_mode);
        let image_count = Self::calculate_image_count(&surface_capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        let gfx_device = ctx.gfx_device_rc();
        let swapchain_handle = unsafe { gfx_device.swapchain().create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;
        gfx_device.set_object_debug_name(swapchain_handle, "main");

        let images = match unsafe { gfx_device.swapchain().get_swapchain_images(swapchain_handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { gfx_device.swapchain().destroy_swapchain(swapchain_handle, None) };
                anyhow::bail!("Failed to get swapchain images: {e:?}");
            }
        };
        for (idx, image) in images.iter().enumerate() {
            gfx_device.set_object_debug_name(*image, format!("swapchain-image-{idx}"));
        }
        log::info!("swapchain created: {} images, {:?}, {:?}", images.len(), surface_format.format, present_mode);

        Ok(Self {
            swapchain_handle,
            gfx_device,
            swapchain_images: images,
            swapchain_image_index: 0,
            swapchain_extent: extent,
            color_format: surface_format.format,
        })
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn present_images(&self) -> &[vk::Image] {
        &self.swapchain_images
    }

    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.swapchain_images[self.swapchain_image_index]
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.swapchain_image_index
    }
}

// tools
impl GfxRenderSwapchain {
    /// 确定 window 的 extent 尺寸
    ///
    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
            let width = window_physical_extent
                .width
                .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
            let height = window_physical_extent
                .height
                .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }

    /// min + 1，max_image_count == 0 表示不限制 image 数量
    pub fn calculate_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
        if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        }
    }

    /// 优先使用 preferred，否则使用第一个可用的格式
    pub fn choose_surface_format(
        available: &[vk::SurfaceFormatKHR],
        preferred: vk::SurfaceFormatKHR,
    ) -> vk::SurfaceFormatKHR {
        available
            .iter()
            .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .or_else(|| available.first())
            .copied()
            .unwrap_or(preferred)
    }

    /// FIFO 是规范保证一定支持的模式，作为回退
    pub fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if available.contains(&preferred) {
            preferred
        } else {
            log::warn!("present mode {:?} not supported, fallback to FIFO", preferred);
            vk::PresentModeKHR::FIFO
        }
    }
}

// update
impl GfxRenderSwapchain {
    /// 无限等待，设备丢失等错误返回 Err
    pub fn acquire_next_image(&mut self, semaphore: &GfxSemaphore) -> anyhow::Result<AcquireResult> {
        let _span = tracy_client::span!("acquire_next_image");
        let result = unsafe {
            self.gfx_device.swapchain().acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, is_suboptimal)) => {
                if is_suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                self.swapchain_image_index = image_index as usize;
                Ok(AcquireResult::Acquired {
                    image_index,
                    suboptimal: is_suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(AcquireResult::OutOfDate)
            }
            Err(e) => {
                log::error!("failed to acquire next swapchain image: {:?}", e);
                Err(anyhow::anyhow!("failed to acquire next swapchain image: {e:?}"))
            }
        }
    }

    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        wait_semaphores: &[&GfxSemaphore],
    ) -> anyhow::Result<PresentResult> {
        let _span = tracy_client::span!("present_image");
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [self.swapchain_image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { self.gfx_device.swapchain().queue_present(queue.handle(), &present_info) };
        match result {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) => {
                log::warn!("swapchain present image index {} is not optimal", self.swapchain_image_index);
                Ok(PresentResult::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(PresentResult::OutOfDate)
            }
            Err(e) => {
                log::error!("failed to present swapchain image: {:?}", e);
                Err(anyhow::anyhow!("failed to present swapchain image: {e:?}"))
            }
        }
    }
}

// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.swapchain().destroy_swapchain(self.swapchain_handle, None);
        }
        self.swapchain_handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.swapchain_handle.is_null(), "GfxRenderSwapchain must be destroyed manually.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_uses_surface_current_extent() {
        let c = caps((800, 600), (1, 1), (4096, 4096));
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(&c, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_clamps_window_extent() {
        let c = caps((u32::MAX, u32::MAX), (100, 100), (1000, 1000));
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(&c, vk::Extent2D { width: 1920, height: 50 });
        assert_eq!(extent, vk::Extent2D { width: 1000, height: 100 });
    }

    #[test]
    fn test_image_count() {
        let mut c = caps((1, 1), (1, 1), (1, 1));
        c.min_image_count = 2;
        c.max_image_count = 0;
        assert_eq!(GfxRenderSwapchain::calculate_image_count(&c), 3);

        c.max_image_count = 2;
        assert_eq!(GfxRenderSwapchain::calculate_image_count(&c), 2);

        c.max_image_count = 8;
        assert_eq!(GfxRenderSwapchain::calculate_image_count(&c), 3);
    }

    #[test]
    fn test_present_mode_fallback() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_surface_format_choice() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&[other, preferred], preferred), preferred);
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&[other], preferred), other);
        assert_eq!(GfxRenderSwapchain::choose_surface_format(&[], preferred), preferred);
    }

    #[test]
    fn test_present_result_recreate() {
        assert!(!PresentResult::Presented.need_recreate());
        assert!(PresentResult::Suboptimal.need_recreate());
        assert!(PresentResult::OutOfDate.need_recreate());
    }
}
