use std::ffi::CStr;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{commands::command_queue::GfxQueueFamily, foundation::debug_messenger::DebugType};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    ///
    /// 不满足 Vulkan 1.3 或者没有 graphics queue 的显卡会被跳过
    pub fn new_descrete_physical_device(instance: &ash::Instance) -> anyhow::Result<Self> {
        let pdevices =
            unsafe { instance.enumerate_physical_devices() }.context("Failed to enumerate physical devices")?;

        pdevices
            .iter()
            .filter_map(|pdevice| match GfxPhysicalDevice::new(*pdevice, instance) {
                Ok(pd) => Some(pd),
                Err(e) => {
                    log::warn!("skip physical device: {e:#}");
                    None
                }
            })
            // 优先使用独立显卡
            .find_or_first(GfxPhysicalDevice::is_descrete_gpu)
            .context("No suitable vulkan physical device found")
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> anyhow::Result<Self> {
        let basic_props = unsafe { instance.get_physical_device_properties(pdevice) };
        let physical_device_name = unsafe { CStr::from_ptr(basic_props.device_name.as_ptr()) };
        log::info!("found gpu: {:?}", physical_device_name);

        if basic_props.api_version < vk::API_VERSION_1_3 {
            anyhow::bail!("{:?} does not support vulkan 1.3", physical_device_name);
        }

        let queue_familiy_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        log::debug!("physical device: queue family props:\n{:#?}", queue_familiy_props);

        // 全能的 Queue：graphics, compute, transfer
        let gfx_queue_family = Self::find_queue_family(
            &queue_familiy_props,
            "gfx",
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::empty(),
        )
        .with_context(|| format!("{:?} has no graphics queue family", physical_device_name))?;

        Ok(Self {
            vk_handle: pdevice,
            basic_props,
            gfx_queue_family,
        })
    }

    /// 找到包含 include_flags 全部能力，并且不含 exclude_flags 的 queue family
    fn find_queue_family(
        queue_familiy_props: &[vk::QueueFamilyProperties],
        name: &str,
        include_flags: vk::QueueFlags,
        exclude_flags: vk::QueueFlags,
    ) -> Option<GfxQueueFamily> {
        queue_familiy_props
            .iter()
            .enumerate()
            .find(|(_, props)| props.queue_flags.contains(include_flags) && (props.queue_flags & exclude_flags).is_empty())
            .map(|(family_idx, props)| GfxQueueFamily {
                name: name.to_string(),
                queue_family_index: family_idx as u32,
                queue_flags: props.queue_flags,
                queue_count: props.queue_count,
            })
    }

    pub fn destroy(self) {
        // 无需销毁
    }
}
// getters
impl GfxPhysicalDevice {
    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
