use std::cell::Cell;
use std::ffi::CStr;
use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use raw_window_handle::RawDisplayHandle;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        command_queue::{GfxCommandQueue, GfxQueueFamily},
        layout_transition,
        submit_info::GfxSubmitInfo,
    },
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, mem_allocator::MemAllocator,
        physical_device::GfxPhysicalDevice,
    },
};

/// Vulkan 图形上下文
///
/// 管理实例、设备、队列、内存分配器以及 immediate submit 使用的临时 command pool。
/// 以引用的形式传给各个资源的构造函数，资源内部只持有自己需要的 `Rc<GfxDevice>` / `Rc<MemAllocator>`。
///
/// # 初始化流程
/// ```ignore
/// let ctx = GfxContext::new_for_display("MyApp", display_handle)?;
/// let buffer = GfxBuffer::new(&ctx, 1024, usage, MemoryKind::GpuOnly, "buf")?;
/// // 使用...
/// buffer.destroy();
/// ctx.destroy();
/// ```
pub struct GfxContext {
    /// 在 drop 之后会卸载 dll，因此需要确保该字段最后 drop
    vk_entry: ash::Entry,

    instance: GfxInstance,
    physical_device: GfxPhysicalDevice,
    gfx_device: Rc<GfxDevice>,
    debug_msger: Option<GfxDebugMsger>,
    allocator: Option<Rc<MemAllocator>>,

    gfx_queue: GfxCommandQueue,

    /// 临时的 graphics command pool，用于 immediate submit
    temp_graphics_command_pool: GfxCommandPool,

    /// 处于 BeginFrame 和 EndFrame 之间时为 true，此时不允许 immediate submit
    frame_recording: Cell<bool>,
}

// new & init
impl GfxContext {
    const ENGINE_NAME: &'static str = "Ember";

    pub fn new(app_name: &str, instance_extra_exts: &[&'static CStr]) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GfxContext::new");

        let vk_entry = unsafe { ash::Entry::load() }.context("Failed to load vulkan entry")?;
        let instance = GfxInstance::new(&vk_entry, app_name, Self::ENGINE_NAME, instance_extra_exts)?;
        let physical_device = GfxPhysicalDevice::new_descrete_physical_device(instance.ash_instance())?;

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];

        let gfx_device =
            Rc::new(GfxDevice::new(instance.ash_instance(), physical_device.vk_handle(), &queue_create_infos)?);
        let gfx_queue = GfxCommandQueue {
            vk_queue: unsafe { gfx_device.get_device_queue(physical_device.gfx_queue_family.queue_family_index, 0) },
            queue_family: physical_device.gfx_queue_family.clone(),
            gfx_device: gfx_device.clone(),
        };
        log::info!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        let debug_msger = match GfxDebugMsger::new(&vk_entry, instance.ash_instance()) {
            Ok(msger) => Some(msger),
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        };

        let allocator =
            Rc::new(MemAllocator::new(instance.ash_instance(), physical_device.vk_handle(), &gfx_device)?);

        let temp_graphics_command_pool = GfxCommandPool::new_internal(
            gfx_device.clone(),
            physical_device.gfx_queue_family.clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-context-immediate",
        )?;

        {
            gfx_device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            gfx_device.set_object_debug_name(physical_device.vk_handle(), "GfxPhysicalDevice");
            gfx_device.set_object_debug_name(gfx_device.vk_handle(), "GfxDevice");
            gfx_device.set_object_debug_name(gfx_queue.vk_queue, "GfxQueue-gfx");
        }

        Ok(Self {
            vk_entry,
            instance,
            physical_device,
            gfx_device,
            debug_msger,
            allocator: Some(allocator),
            gfx_queue,
            temp_graphics_command_pool,
            frame_recording: Cell::new(false),
        })
    }

    /// 根据窗口系统的 display handle 开启 surface 所需的 instance extensions
    pub fn new_for_display(app_name: &str, display_handle: RawDisplayHandle) -> anyhow::Result<Self> {
        let required = ash_window::enumerate_required_extensions(display_handle)
            .context("Failed to query surface instance extensions")?;
        // ash_window 返回的指针指向静态字符串
        let exts: Vec<&'static CStr> = required.iter().map(|ext| unsafe { CStr::from_ptr(*ext) }).collect();
        Self::new(app_name, &exts)
    }

    /// 不依赖窗口系统，配合 `GfxSurface::new_headless` 使用
    pub fn new_headless(app_name: &str) -> anyhow::Result<Self> {
        Self::new(app_name, &[ash::khr::surface::NAME, ash::ext::headless_surface::NAME])
    }
}
// destroy
impl GfxContext {
    pub fn destroy(mut self) {
        let _span = tracy_client::span!("GfxContext::destroy");
        if let Err(e) = self.gfx_device.wait_idle() {
            log::error!("{e:#}");
        }

        self.temp_graphics_command_pool.destroy_mut();
        if let Some(msger) = self.debug_msger.take() {
            msger.destroy();
        }
        if let Some(allocator) = self.allocator.take() {
            match Rc::try_unwrap(allocator) {
                Ok(allocator) => allocator.destroy(),
                Err(allocator) => {
                    log::error!(
                        "MemAllocator still referenced by {} resources at shutdown",
                        Rc::strong_count(&allocator) - 1
                    );
                    debug_assert!(false, "GPU resources leaked past GfxContext::destroy");
                    std::mem::forget(allocator);
                }
            }
        }

        self.gfx_device.destroy();
        self.physical_device.destroy();
        self.instance.destroy();
    }
}
// getters
impl GfxContext {
    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self.vk_entry
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_device
    }

    #[inline]
    pub fn gfx_device_rc(&self) -> Rc<GfxDevice> {
        self.gfx_device.clone()
    }

    /// 在 destroy 之前一直有效
    #[inline]
    pub fn allocator_rc(&self) -> Rc<MemAllocator> {
        match &self.allocator {
            Some(allocator) => allocator.clone(),
            None => unreachable!("allocator is only taken in GfxContext::destroy"),
        }
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_queue
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.physical_device.gfx_queue_family
    }
}
// tools
impl GfxContext {
    /// 根据给定的格式，返回支持的格式，顺序与 candidates 一致
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format> {
        candidates
            .iter()
            .filter(|f| {
                let props = unsafe {
                    self.instance
                        .ash_instance()
                        .get_physical_device_format_properties(self.physical_device.vk_handle(), **f)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => {
                        log::error!("not supported tiling: {:?}", tiling);
                        false
                    }
                }
            })
            .copied()
            .collect()
    }

    /// 立即执行某个 command，并同步等待执行结果
    ///
    /// 不能在帧录制期间调用
    pub fn immediate_submit<F, R>(&self, name: impl AsRef<str>, func: F) -> anyhow::Result<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("GfxContext::immediate_submit");
        if self.frame_recording.get() {
            anyhow::bail!("immediate_submit({}) called while a frame is being recorded", name.as_ref());
        }

        let command_buffer =
            GfxCommandBuffer::new(&self.temp_graphics_command_pool, &format!("one-time-{}", name.as_ref()))?;

        let result = (|| {
            command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref())?;
            let result = func(&command_buffer);
            command_buffer.end()?;

            self.gfx_queue.submit(vec![GfxSubmitInfo::new(std::slice::from_ref(&command_buffer))], None)?;
            self.gfx_queue.wait_idle()?;
            Ok(result)
        })();

        self.temp_graphics_command_pool.free_command_buffers(vec![command_buffer]);
        result
    }

    /// 在 command buffer 中记录一次 layout 转换，不支持的转换会记录错误并跳过
    ///
    /// # return
    /// 是否记录了 barrier
    pub fn transition_image_layout(
        &self,
        cmd: &GfxCommandBuffer,
        image: vk::Image,
        format: vk::Format,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> bool {
        match layout_transition::layout_transition_barrier(image, format, old_layout, new_layout) {
            Some(barrier) => {
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&barrier));
                true
            }
            None => false,
        }
    }

    pub fn wait_idle(&self) -> anyhow::Result<()> {
        self.gfx_device.wait_idle()
    }

    /// 由 renderer 在 BeginFrame / EndFrame 时设置
    #[inline]
    pub fn set_frame_recording(&self, recording: bool) {
        self.frame_recording.set(recording);
    }

    #[inline]
    pub fn is_frame_recording(&self) -> bool {
        self.frame_recording.get()
    }
}

/// 没有可用的 Vulkan 设备时返回 None，对应的测试直接跳过
#[cfg(test)]
pub(crate) fn try_test_context() -> Option<GfxContext> {
    match GfxContext::new("ember-gfx-test", &[]) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("vulkan unavailable, skipped: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_submit_refused_while_recording() {
        let Some(ctx) = try_test_context() else {
            return;
        };
        ctx.set_frame_recording(true);
        assert!(ctx.immediate_submit("inside-frame", |_| ()).is_err());
        ctx.set_frame_recording(false);
        assert_eq!(ctx.immediate_submit("outside-frame", |_| 7).unwrap(), 7);
        ctx.destroy();
    }
}
