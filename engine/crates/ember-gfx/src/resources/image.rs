use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    commands::barrier::{GfxBarrierMask, GfxBufferBarrier, GfxImageBarrier},
    foundation::{debug_messenger::DebugType, mem_allocator::MemAllocator},
    gfx_context::GfxContext,
    resources::buffer::{GfxBuffer, MemoryKind},
};

#[derive(Clone, Debug)]
pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}
// init
impl GfxImageCreateInfo {
    /// 2D image，mip 和 array layer 都为 1
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    /// builder
    #[inline]
    pub fn tiling(mut self, tiling: vk::ImageTiling) -> Self {
        self.inner.tiling = tiling;
        self
    }

    /// builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }
}
// getters
impl GfxImageCreateInfo {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.inner.extent.width,
            height: self.inner.extent.height,
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.inner.format
    }

    #[inline]
    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.inner.usage
    }

    #[inline]
    pub fn creation_info(&self) -> &vk::ImageCreateInfo<'_> {
        &self.inner
    }
}

pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,
    allocator: Rc<MemAllocator>,

    extent: vk::Extent2D,
    format: vk::Format,

    name: String,
    destroyed: bool,
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImage {
    pub fn new(
        ctx: &GfxContext,
        image_info: &GfxImageCreateInfo,
        memory_kind: MemoryKind,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let name = name.as_ref();
        let extent = image_info.extent();
        if extent.width == 0 || extent.height == 0 {
            anyhow::bail!("GfxImage::new({name}): zero sized image {}x{}", extent.width, extent.height);
        }

        let allocator = ctx.allocator_rc();
        let alloc_ci = memory_kind.alloc_create_info();
        let (handle, allocation) = unsafe { allocator.create_image(image_info.creation_info(), &alloc_ci) }
            .map_err(|e| {
                log::error!("failed to allocate image {name} ({}x{}): {e:?}", extent.width, extent.height);
                anyhow::anyhow!("Failed to allocate image {name}: {e:?}")
            })?;

        let image = Self {
            handle,
            allocation,
            allocator,
            extent,
            format: image_info.format(),
            name: name.to_string(),
            destroyed: false,
        };
        ctx.gfx_device().set_debug_name(&image, name);
        Ok(image)
    }

    /// 创建一个 GPU only 的 RGBA8 纹理，并上传像素数据
    ///
    /// 最终 layout 为 SHADER_READ_ONLY_OPTIMAL
    pub fn new_rgba8_with_data(
        ctx: &GfxContext,
        width: u32,
        height: u32,
        pixels: &[u8],
        format: vk::Format,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let image_info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width, height },
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        );
        let mut image = Self::new(ctx, &image_info, MemoryKind::GpuOnly, name)?;
        if let Err(e) = image.upload_rgba8_sync(ctx, pixels) {
            image.destroy_mut();
            return Err(e);
        }
        Ok(image)
    }
}
// destroy
impl GfxImage {
    #[inline]
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        unsafe {
            self.allocator.destroy_image(self.handle, &mut self.allocation);
        }
        self.handle = vk::Image::null();
        self.destroyed = true;
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxImage {} must be destroyed manually.", self.name);
    }
}
// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
// tools
impl GfxImage {
    /// 通过 stage buffer 上传 RGBA8 数据
    ///
    /// layout: UNDEFINED -> TRANSFER_DST -> SHADER_READ_ONLY
    pub fn upload_rgba8_sync(&self, ctx: &GfxContext, pixels: &[u8]) -> anyhow::Result<()> {
        let _span = tracy_client::span!("GfxImage::upload_rgba8_sync");
        let expected = self.extent.width as usize * self.extent.height as usize * 4;
        if pixels.len() != expected {
            anyhow::bail!("image {} expects {} bytes of RGBA8 data, got {}", self.name, expected, pixels.len());
        }

        let stage_buffer =
            GfxBuffer::new_stage_buffer(ctx, pixels.len() as vk::DeviceSize, format!("{}-stage-buffer", self.name))?;
        let result = stage_buffer.write_mapped(0, pixels).and_then(|_| {
            ctx.immediate_submit(format!("{}-transfer-data", self.name), |cmd| {
                ctx.transition_image_layout(
                    cmd,
                    self.handle,
                    self.format,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                );

                let buffer_image_copy = vk::BufferImageCopy2::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(self.extent.into());
                cmd.cmd_copy_buffer_to_image(
                    &vk::CopyBufferToImageInfo2::default()
                        .src_buffer(stage_buffer.vk_buffer())
                        .dst_image(self.handle)
                        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .regions(std::slice::from_ref(&buffer_image_copy)),
                );

                ctx.transition_image_layout(
                    cmd,
                    self.handle,
                    self.format,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                );
            })
        });
        stage_buffer.destroy();
        result
    }

    /// 回读 RGBA8 数据，image 需要带有 TRANSFER_SRC，并且处于 SHADER_READ_ONLY
    ///
    /// 回读结束后 layout 恢复为 SHADER_READ_ONLY
    pub fn read_back_rgba8_sync(&self, ctx: &GfxContext) -> anyhow::Result<Vec<u8>> {
        let _span = tracy_client::span!("GfxImage::read_back_rgba8_sync");
        let size = self.extent.width as vk::DeviceSize * self.extent.height as vk::DeviceSize * 4;
        let readback = GfxBuffer::new(
            ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryKind::GpuToCpu,
            format!("{}-readback", self.name),
        )?;

        let result = ctx
            .immediate_submit(format!("{}-read-back", self.name), |cmd| {
                type StageAccess = (vk::PipelineStageFlags2, vk::AccessFlags2);
                let barrier = |old: vk::ImageLayout, new: vk::ImageLayout, src: StageAccess, dst: StageAccess| {
                    GfxImageBarrier::new()
                        .image(self.handle)
                        .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                        .layout_transfer(old, new)
                        .src_mask(src.0, src.1)
                        .dst_mask(dst.0, dst.1)
                };
                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[barrier(
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        (vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::MEMORY_WRITE),
                        (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ),
                    )],
                );

                let region = vk::BufferImageCopy2::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(self.extent.into());
                cmd.cmd_copy_image_to_buffer(
                    &vk::CopyImageToBufferInfo2::default()
                        .src_image(self.handle)
                        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                        .dst_buffer(readback.vk_buffer())
                        .regions(std::slice::from_ref(&region)),
                );

                cmd.image_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[barrier(
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::NONE),
                        (vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ),
                    )],
                );
                cmd.buffer_memory_barrier(
                    vk::DependencyFlags::empty(),
                    &[GfxBufferBarrier::new().mask(GfxBarrierMask::TRANSFER_TO_HOST_READ).buffer(
                        readback.vk_buffer(),
                        0,
                        vk::WHOLE_SIZE,
                    )],
                );
            })
            .and_then(|_| readback.read_mapped());
        readback.destroy();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx_context::try_test_context;

    #[test]
    fn test_rgba8_upload_reads_back_identical_pixels() {
        let Some(ctx) = try_test_context() else {
            return;
        };
        let extent = vk::Extent2D { width: 4, height: 4 };
        let pixels: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(13)).collect();
        let info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::SAMPLED,
        );
        let image = GfxImage::new(&ctx, &info, MemoryKind::GpuOnly, "round-trip").unwrap();

        image.upload_rgba8_sync(&ctx, &pixels).unwrap();
        assert_eq!(image.read_back_rgba8_sync(&ctx).unwrap(), pixels);
        assert!(image.upload_rgba8_sync(&ctx, &pixels[..60]).is_err());

        image.destroy();
        ctx.destroy();
    }

    #[test]
    fn test_image_2d_info_defaults() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 640, height: 480 },
            vk::Format::B8G8R8A8_SRGB,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        );
        let ci = info.creation_info();
        assert_eq!(ci.extent.depth, 1);
        assert_eq!(ci.mip_levels, 1);
        assert_eq!(ci.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(ci.tiling, vk::ImageTiling::OPTIMAL);
        assert_eq!(info.extent(), vk::Extent2D { width: 640, height: 480 });
    }

    #[test]
    fn test_image_2d_info_builders() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 4, height: 4 },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_SRC,
        )
        .tiling(vk::ImageTiling::LINEAR)
        .samples(vk::SampleCountFlags::TYPE_4);
        assert_eq!(info.creation_info().tiling, vk::ImageTiling::LINEAR);
        assert_eq!(info.creation_info().samples, vk::SampleCountFlags::TYPE_4);
    }
}
