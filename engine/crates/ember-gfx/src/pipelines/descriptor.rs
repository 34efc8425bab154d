//! descriptor 的声明式描述
//!
//! binding 的下标就是它在列表中的位置，stage 固定为 VERTEX | FRAGMENT

use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// binding 指向的资源
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GfxDescriptorResource {
    Image {
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    },
    Buffer {
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GfxDescriptorBinding {
    pub descriptor_type: vk::DescriptorType,
    pub resource: GfxDescriptorResource,
}
impl GfxDescriptorBinding {
    pub const STAGES: vk::ShaderStageFlags =
        vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

    #[inline]
    pub fn combined_image_sampler(view: vk::ImageView, sampler: vk::Sampler, layout: vk::ImageLayout) -> Self {
        Self {
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            resource: GfxDescriptorResource::Image { view, sampler, layout },
        }
    }

    #[inline]
    pub fn storage_buffer(buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        Self {
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            resource: GfxDescriptorResource::Buffer { buffer, range },
        }
    }

    #[inline]
    pub fn uniform_buffer(buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        Self {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            resource: GfxDescriptorResource::Buffer { buffer, range },
        }
    }
}

/// 每个 descriptor type 的数量，按首次出现的顺序排列
pub fn descriptor_pool_sizes(bindings: &[GfxDescriptorBinding]) -> Vec<vk::DescriptorPoolSize> {
    let mut pool_sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        match pool_sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += 1,
            None => pool_sizes.push(vk::DescriptorPoolSize {
                ty: binding.descriptor_type,
                descriptor_count: 1,
            }),
        }
    }
    pool_sizes
}

pub fn descriptor_set_layout_bindings(bindings: &[GfxDescriptorBinding]) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    bindings
        .iter()
        .enumerate()
        .map(|(idx, binding)| vk::DescriptorSetLayoutBinding {
            binding: idx as u32,
            descriptor_type: binding.descriptor_type,
            descriptor_count: 1,
            stage_flags: GfxDescriptorBinding::STAGES,
            ..Default::default()
        })
        .collect()
}

pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
    gfx_device: Rc<GfxDevice>,
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl GfxDescriptorSetLayout {
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        bindings: &[GfxDescriptorBinding],
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let layout_bindings = descriptor_set_layout_bindings(bindings);
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let handle = unsafe { gfx_device.create_descriptor_set_layout(&create_info, None) }
            .with_context(|| format!("Failed to create descriptor set layout: {debug_name}"))?;

        let layout = Self { handle, gfx_device };
        layout.gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_descriptor_set_layout(self.handle, None);
        }
        self.handle = vk::DescriptorSetLayout::null();
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        debug_assert!(
            self.handle == vk::DescriptorSetLayout::null(),
            "GfxDescriptorSetLayout must be destroyed manually."
        );
    }
}

/// 只分配一个 descriptor set 的 pool
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    gfx_device: Rc<GfxDevice>,
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl GfxDescriptorPool {
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        pool_sizes: &[vk::DescriptorPoolSize],
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(1)
            .pool_sizes(pool_sizes);
        let handle = unsafe { gfx_device.create_descriptor_pool(&create_info, None) }
            .with_context(|| format!("Failed to create descriptor pool: {debug_name}"))?;

        let pool = Self { handle, gfx_device };
        pool.gfx_device.set_debug_name(&pool, debug_name);
        Ok(pool)
    }

    pub fn allocate_set(&self, layout: &GfxDescriptorSetLayout, debug_name: &str) -> anyhow::Result<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(std::slice::from_ref(&layout.handle));
        let sets = unsafe { self.gfx_device.allocate_descriptor_sets(&alloc_info) }
            .with_context(|| format!("Failed to allocate descriptor set: {debug_name}"))?;
        let set = sets.into_iter().next().context("descriptor set allocation returned nothing")?;
        self.gfx_device.set_object_debug_name(set, format!("DescriptorSet::{debug_name}"));
        Ok(set)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// 销毁 pool 会一并释放从中分配的 set
    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_descriptor_pool(self.handle, None);
        }
        self.handle = vk::DescriptorPool::null();
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        debug_assert!(self.handle == vk::DescriptorPool::null(), "GfxDescriptorPool must be destroyed manually.");
    }
}

/// image binding 写 image info，其余写 buffer info
///
/// 返回的 info 需要在 update 期间保持存活
pub enum DescriptorWriteInfo {
    Image(vk::DescriptorImageInfo),
    Buffer(vk::DescriptorBufferInfo),
}
impl DescriptorWriteInfo {
    pub fn from_binding(binding: &GfxDescriptorBinding) -> Self {
        match binding.resource {
            GfxDescriptorResource::Image { view, sampler, layout } => Self::Image(vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: layout,
            }),
            GfxDescriptorResource::Buffer { buffer, range } => Self::Buffer(vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bindings() -> Vec<GfxDescriptorBinding> {
        vec![
            GfxDescriptorBinding::storage_buffer(vk::Buffer::null(), 128),
            GfxDescriptorBinding::combined_image_sampler(
                vk::ImageView::null(),
                vk::Sampler::null(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            GfxDescriptorBinding::storage_buffer(vk::Buffer::null(), vk::WHOLE_SIZE),
        ]
    }

    #[test]
    fn test_pool_sizes_counted_per_type() {
        let sizes = descriptor_pool_sizes(&sample_bindings());
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 2);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 1);
    }

    #[test]
    fn test_pool_sizes_empty() {
        assert!(descriptor_pool_sizes(&[]).is_empty());
    }

    #[test]
    fn test_layout_binding_index_is_position() {
        let layout_bindings = descriptor_set_layout_bindings(&sample_bindings());
        let indices: Vec<u32> = layout_bindings.iter().map(|b| b.binding).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(layout_bindings.iter().all(|b| b.descriptor_count == 1));
        assert!(layout_bindings.iter().all(|b| b.stage_flags == vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));
        assert_eq!(layout_bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn test_write_info_kind_follows_resource() {
        let bindings = sample_bindings();
        assert!(matches!(DescriptorWriteInfo::from_binding(&bindings[0]), DescriptorWriteInfo::Buffer(info) if info.range == 128));
        assert!(matches!(
            DescriptorWriteInfo::from_binding(&bindings[1]),
            DescriptorWriteInfo::Image(info) if info.image_layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        ));
    }
}
