use std::ptr;
use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use vk_mem::Alloc;

use crate::{
    commands::barrier::{GfxBarrierMask, GfxBufferBarrier},
    foundation::{debug_messenger::DebugType, mem_allocator::MemAllocator},
    gfx_context::GfxContext,
};

/// buffer / image 的内存类型
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// device local，CPU 不可见
    GpuOnly,
    /// CPU 顺序写入，GPU 读取，持久映射
    CpuToGpu,
    /// GPU 写入，CPU 读取，持久映射
    GpuToCpu,
}
impl MemoryKind {
    #[inline]
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::GpuOnly)
    }

    pub(crate) fn alloc_create_info(self) -> vk_mem::AllocationCreateInfo {
        match self {
            Self::GpuOnly => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                flags: vk_mem::AllocationCreateFlags::empty(),
                ..Default::default()
            },
            Self::CpuToGpu => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            Self::GpuToCpu => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
        }
    }
}

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,
    allocator: Rc<MemAllocator>,

    size: vk::DeviceSize,
    memory_kind: MemoryKind,

    /// 在初始化阶段写死，只有 host visible 的 buffer 才有值
    map_ptr: Option<*mut u8>,

    debug_name: String,

    _usage: vk::BufferUsageFlags,
    destroyed: bool,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// init
impl GfxBuffer {
    /// 分配失败时返回 Err，不做回退
    pub fn new(
        ctx: &GfxContext,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        memory_kind: MemoryKind,
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let name = name.as_ref();
        if buffer_size == 0 {
            anyhow::bail!("GfxBuffer::new({name}): buffer size must not be zero");
        }

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = memory_kind.alloc_create_info();

        let allocator = ctx.allocator_rc();
        let (buffer, mut alloc) = unsafe { allocator.create_buffer(&buffer_ci, &alloc_ci) }.map_err(|e| {
            log::error!("failed to allocate buffer {name} ({buffer_size} bytes): {e:?}");
            anyhow::anyhow!("Failed to allocate buffer {name}: {e:?}")
        })?;

        let mut mapped_ptr = None;
        if memory_kind.is_host_visible() {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => mapped_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    anyhow::bail!("Failed to map buffer {name}: {e:?}");
                }
            }
        }

        ctx.gfx_device().set_object_debug_name(buffer, format!("Buffer::{name}"));
        Ok(Self {
            handle: buffer,
            allocation: alloc,
            allocator,
            size: buffer_size,
            memory_kind,
            map_ptr: mapped_ptr,
            debug_name: name.to_string(),
            _usage: buffer_usage,
            destroyed: false,
        })
    }

    #[inline]
    pub fn new_stage_buffer(ctx: &GfxContext, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> anyhow::Result<Self> {
        Self::new(ctx, size, vk::BufferUsageFlags::TRANSFER_SRC, MemoryKind::CpuToGpu, debug_name)
    }

    /// 创建 GPU only 的 buffer，并通过 stage buffer 将 data 上传
    pub fn new_device_local_with_data<T: bytemuck::Pod>(
        ctx: &GfxContext,
        usage: vk::BufferUsageFlags,
        data: &[T],
        name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mut buffer = Self::new(
            ctx,
            bytes.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryKind::GpuOnly,
            name,
        )?;
        if let Err(e) = buffer.upload_sync(ctx, bytes) {
            buffer.destroy_mut();
            return Err(e);
        }
        Ok(buffer)
    }
}
// destroy
impl GfxBuffer {
    #[inline]
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        unsafe {
            if self.map_ptr.take().is_some() {
                self.allocator.unmap_memory(&mut self.allocation);
            }
            self.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
        self.handle = vk::Buffer::null();
        self.destroyed = true;
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxBuffer {} must be destroyed manually.", self.debug_name);
    }
}
// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn memory_kind(&self) -> MemoryKind {
        self.memory_kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    /// 通过 mem map 的方式将 data 写入到 buffer 的 offset 处
    pub fn write_mapped(&self, offset: vk::DeviceSize, data: &[u8]) -> anyhow::Result<()> {
        let Some(ptr) = self.map_ptr else {
            anyhow::bail!("buffer {} is not host visible", self.debug_name);
        };
        if offset + data.len() as vk::DeviceSize > self.size {
            anyhow::bail!(
                "write of {} bytes at {} overflows buffer {} ({} bytes)",
                data.len(),
                offset,
                self.debug_name,
                self.size
            );
        }
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        self.allocator
            .flush_allocation(&self.allocation, offset, data.len() as vk::DeviceSize)
            .context("flush_allocation failed")
    }

    /// 读取持久映射的内存
    pub fn read_mapped(&self) -> anyhow::Result<Vec<u8>> {
        let Some(ptr) = self.map_ptr else {
            anyhow::bail!("buffer {} is not host visible", self.debug_name);
        };
        self.allocator
            .invalidate_allocation(&self.allocation, 0, self.size)
            .context("invalidate_allocation failed")?;

        let mut out = vec![0u8; self.size as usize];
        unsafe {
            ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), out.len());
        }
        Ok(out)
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// 同步等待，会阻塞运行，不能在帧录制期间调用
    pub fn upload_sync(&self, ctx: &GfxContext, data: &[u8]) -> anyhow::Result<()> {
        let _span = tracy_client::span!("GfxBuffer::upload_sync");
        if data.len() as vk::DeviceSize > self.size {
            anyhow::bail!("upload of {} bytes overflows buffer {} ({} bytes)", data.len(), self.debug_name, self.size);
        }

        let stage_buffer =
            Self::new_stage_buffer(ctx, data.len() as vk::DeviceSize, format!("{}-stage-buffer", self.debug_name))?;
        let result = stage_buffer.write_mapped(0, data).and_then(|_| {
            ctx.immediate_submit(format!("{}-transfer-data", self.debug_name), |cmd| {
                cmd.cmd_copy_buffer(
                    &stage_buffer,
                    self,
                    &[vk::BufferCopy {
                        size: data.len() as vk::DeviceSize,
                        ..Default::default()
                    }],
                );
            })
        });
        stage_buffer.destroy();
        result
    }

    /// 通过一个 GpuToCpu 的 buffer 回读内容，self 需要带有 TRANSFER_SRC
    pub fn read_back_sync(&self, ctx: &GfxContext) -> anyhow::Result<Vec<u8>> {
        let _span = tracy_client::span!("GfxBuffer::read_back_sync");
        if self.map_ptr.is_some() {
            return self.read_mapped();
        }

        let readback = Self::new(
            ctx,
            self.size,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryKind::GpuToCpu,
            format!("{}-readback", self.debug_name),
        )?;
        let result = ctx
            .immediate_submit(format!("{}-read-back", self.debug_name), |cmd| {
                cmd.cmd_copy_buffer(
                    self,
                    &readback,
                    &[vk::BufferCopy {
                        size: self.size,
                        ..Default::default()
                    }],
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
