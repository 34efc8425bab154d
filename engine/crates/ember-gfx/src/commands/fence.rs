use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};
use crate::gfx_context::GfxContext;

/// # Destroy
/// 可以 Clone，因此不实现 Drop，需要手动 destroy
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
    gfx_device: Rc<GfxDevice>,
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(ctx: &GfxContext, signaled: bool, debug_name: &str) -> anyhow::Result<Self> {
        let gfx_device = ctx.gfx_device_rc();
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { gfx_device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None) }
            .with_context(|| format!("Failed to create fence: {debug_name}"))?;

        let fence = Self { fence, gfx_device };
        fence.gfx_device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }

    #[inline]
    pub fn destroy(self) {
        unsafe {
            self.gfx_device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence，不设超时
    #[inline]
    pub fn wait(&self) -> anyhow::Result<()> {
        unsafe { self.gfx_device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX) }
            .context("wait_for_fences failed")
    }

    #[inline]
    pub fn reset(&self) -> anyhow::Result<()> {
        unsafe { self.gfx_device.reset_fences(std::slice::from_ref(&self.fence)) }.context("reset_fences failed")
    }
}
