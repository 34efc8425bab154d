use std::ops::Deref;

use anyhow::Context;
use ash::vk;

/// vk-mem 分配器
///
/// 需要在 Instance 和 Device 创建之后创建，并在它们销毁之前销毁
pub struct MemAllocator {
    inner: vk_mem::Allocator,
}

impl MemAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> anyhow::Result<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci) }.context("Failed to create vk-mem allocator")?;

        Ok(Self { inner: vma })
    }

    pub fn destroy(self) {
        // 通过 drop 触发销毁
    }
}

impl Deref for MemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
