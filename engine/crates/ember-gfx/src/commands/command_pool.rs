use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::commands::command_queue::GfxQueueFamily;
use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};
use crate::gfx_context::GfxContext;

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    _queue_family: GfxQueueFamily,
    gfx_device: Rc<GfxDevice>,

    debug_name: String,
    valid: bool,
}
// new & init
impl GfxCommandPool {
    #[inline]
    pub fn new(
        ctx: &GfxContext,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        Self::new_internal(ctx.gfx_device_rc(), ctx.gfx_queue_family().clone(), flags, debug_name)
    }

    /// 内部构造函数，用于 GfxContext 初始化时使用
    pub(crate) fn new_internal(
        gfx_device: Rc<GfxDevice>,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let pool = unsafe {
            gfx_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family.queue_family_index).flags(flags),
                None,
            )
        }
        .with_context(|| format!("Failed to create command pool: {debug_name}"))?;

        let command_pool = Self {
            handle: pool,
            _queue_family: queue_family,
            gfx_device,
            debug_name: debug_name.to_string(),
            valid: true,
        };
        command_pool.gfx_device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }
}
// destroy
impl GfxCommandPool {
    /// pool 内的 command buffer 会一起被释放
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        if !self.valid {
            return;
        }
        unsafe {
            self.gfx_device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }
}
// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub(crate) fn gfx_device(&self) -> &Rc<GfxDevice> {
        &self.gfx_device
    }
}
// tools
impl GfxCommandPool {
    /// 释放 command buffer，释放之后 command buffer 不能再被使用
    pub fn free_command_buffers(&self, command_buffers: Vec<GfxCommandBuffer>) {
        let command_buffer_handles: Vec<vk::CommandBuffer> =
            command_buffers.iter().map(|cmd| cmd.vk_handle()).collect();
        unsafe {
            self.gfx_device.free_command_buffers(self.handle, &command_buffer_handles);
        }
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(!self.valid, "CommandPool {} must be destroyed manually.", self.debug_name);
    }
}
