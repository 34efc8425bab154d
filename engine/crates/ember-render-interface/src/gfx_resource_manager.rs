use ember_gfx::resources::{buffer::GfxBuffer, texture::GfxTexture2D};
use slotmap::SlotMap;

use crate::{
    frame_counter::FrameCounter,
    handles::{GfxBufferHandle, GfxTextureHandle},
    retire_queue::RetireQueue,
};

/// 资源管理器
///
/// 负责管理 Buffer 和 Texture。
/// 使用 SlotMap 存储资源，对外提供轻量级的 Handle。
/// 稳定运行期间的销毁请求会记录当前帧序号，等到 frames in flight 都结束后再真正销毁。
pub struct GfxResourceManager {
    buffer_pool: SlotMap<GfxBufferHandle, GfxBuffer>,
    textures: SlotMap<GfxTextureHandle, GfxTexture2D>,

    pending_destroy_buffers: RetireQueue<GfxBufferHandle>,
    pending_destroy_textures: RetireQueue<GfxTextureHandle>,

    destroyed: bool,
}
impl Default for GfxResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxResourceManager {
    pub fn new() -> Self {
        let delay = FrameCounter::fif_count() as u64;
        Self {
            buffer_pool: SlotMap::with_key(),
            textures: SlotMap::with_key(),

            pending_destroy_buffers: RetireQueue::new(delay),
            pending_destroy_textures: RetireQueue::new(delay),

            destroyed: false,
        }
    }
}
// destroy
impl GfxResourceManager {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    /// 立即销毁所有资源，调用前需要确保 device 已经 idle
    pub fn destroy_mut(&mut self) {
        let _span = tracy_client::span!("ResourceManager::destroy_all");
        let (buffers, textures) = (self.buffer_pool.len(), self.textures.len());
        if buffers + textures > 0 {
            log::info!("destroy resources: {} buffers, {} textures", buffers, textures);
        }

        for (_, texture) in self.textures.drain() {
            texture.destroy()
        }
        for (_, buffer) in self.buffer_pool.drain() {
            buffer.destroy()
        }

        self.pending_destroy_buffers.drain_all();
        self.pending_destroy_textures.drain_all();

        self.destroyed = true;
    }
}
impl Drop for GfxResourceManager {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxResourceManager must be destroyed manually.");
    }
}
// Subsystem API
impl GfxResourceManager {
    /// 清理已过期的资源
    ///
    /// 在 begin_frame 等待 fence 之后调用：在 `frame_id` 提交的销毁请求，
    /// 当 `frame_id + FIF <= current_frame_id` 时真正销毁。
    pub fn cleanup(&mut self, current_frame_id: u64) {
        let _span = tracy_client::span!("ResourceManager::cleanup");

        for texture_handle in self.pending_destroy_textures.drain_retired(current_frame_id) {
            if let Some(texture) = self.textures.remove(texture_handle) {
                texture.destroy()
            }
        }

        for buffer_handle in self.pending_destroy_buffers.drain_retired(current_frame_id) {
            if let Some(buffer) = self.buffer_pool.remove(buffer_handle) {
                buffer.destroy()
            }
        }
    }

    /// 尚未真正销毁的资源数量
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending_destroy_buffers.len() + self.pending_destroy_textures.len()
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.buffer_pool.len() + self.textures.len()
    }
}
// Buffer API
impl GfxResourceManager {
    pub fn register_buffer(&mut self, buffer: GfxBuffer) -> GfxBufferHandle {
        self.buffer_pool.insert(buffer)
    }

    #[inline]
    pub fn get_buffer(&self, handle: GfxBufferHandle) -> Option<&GfxBuffer> {
        self.buffer_pool.get(handle)
    }

    /// 将 Buffer 加入待销毁队列，在 `current_frame_id` 对应的帧完成后销毁。
    pub fn destroy_buffer(&mut self, handle: GfxBufferHandle, current_frame_id: u64) {
        self.pending_destroy_buffers.push(handle, current_frame_id);
    }
}
// Texture API
impl GfxResourceManager {
    pub fn register_texture(&mut self, texture: GfxTexture2D) -> GfxTextureHandle {
        self.textures.insert(texture)
    }

    #[inline]
    pub fn get_texture(&self, handle: GfxTextureHandle) -> Option<&GfxTexture2D> {
        self.textures.get(handle)
    }

    pub fn destroy_texture(&mut self, handle: GfxTextureHandle, current_frame_id: u64) {
        self.pending_destroy_textures.push(handle, current_frame_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_manager_lifecycle() {
        let mut manager = GfxResourceManager::new();
        assert_eq!(manager.live_count(), 0);
        manager.cleanup(0);
        manager.cleanup(100);
        manager.destroy();
    }

    #[test]
    fn test_destroy_requests_are_queued_until_retired() {
        let mut buffers: SlotMap<GfxBufferHandle, ()> = SlotMap::with_key();
        let stale = buffers.insert(());

        let mut manager = GfxResourceManager::new();
        manager.destroy_buffer(stale, 3);
        assert_eq!(manager.pending_count(), 1);

        // 3 + 2 > 4，仍在 flight 中
        manager.cleanup(4);
        assert_eq!(manager.pending_count(), 1);

        // 未注册的 handle 出队时被忽略
        manager.cleanup(5);
        assert_eq!(manager.pending_count(), 0);
        manager.destroy();
    }
}
