use ember_gfx::commands::fence::GfxFence;
use ember_gfx::commands::semaphore::GfxSemaphore;
use ember_gfx::gfx_context::GfxContext;
use ember_render_interface::frame_counter::FrameCounter;
use ember_render_interface::pipeline_settings::FrameLabel;

/// 记录每个 swapchain image 最近一次被哪个 frame slot 使用
///
/// acquire 得到的 image 可能仍被另一个 slot 的提交占用，此时需要等待那个 slot 的 fence
#[derive(Debug, Clone, Default)]
pub struct ImagesInFlight {
    owners: Vec<Option<usize>>,
}
impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// 将 image 标记为 slot 所有
    ///
    /// # return
    /// 之前占用该 image 的其他 slot，需要在录制前等待它的 fence
    pub fn claim(&mut self, image_index: usize, slot: usize) -> Option<usize> {
        let Some(owner) = self.owners.get_mut(image_index) else {
            log::error!("image index {image_index} out of range ({} images)", self.owners.len());
            return None;
        };
        let prev = owner.replace(slot);
        prev.filter(|prev| *prev != slot)
    }

    #[inline]
    pub fn owner(&self, image_index: usize) -> Option<usize> {
        self.owners.get(image_index).copied().flatten()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.owners.len()
    }
}

/// CPU-GPU 同步对象
///
/// - 每个 frame slot 一个 in-flight fence（创建时 signaled）和一个 image available semaphore
/// - 每个 swapchain image 一个 render finished semaphore，随 swapchain 一起重建
pub struct FrameSync {
    in_flight_fences: Vec<GfxFence>,
    image_available_semaphores: Vec<GfxSemaphore>,

    render_finished_semaphores: Vec<GfxSemaphore>,
    images_in_flight: ImagesInFlight,
}
// new & init
impl FrameSync {
    pub fn new(ctx: &GfxContext, image_count: usize) -> anyhow::Result<Self> {
        let in_flight_fences = FrameCounter::frame_labels()
            .iter()
            .map(|label| GfxFence::new(ctx, true, &format!("in-flight-{label}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let image_available_semaphores = FrameCounter::frame_labels()
            .iter()
            .map(|label| GfxSemaphore::new(ctx, &format!("image-available-{label}")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut sync = Self {
            in_flight_fences,
            image_available_semaphores,
            render_finished_semaphores: vec![],
            images_in_flight: ImagesInFlight::default(),
        };
        sync.rebuild_image_semaphores(ctx, image_count)?;
        Ok(sync)
    }

    /// swapchain 重建后调用，调用前设备需要处于 idle
    pub fn rebuild_image_semaphores(&mut self, ctx: &GfxContext, image_count: usize) -> anyhow::Result<()> {
        self.destroy_image_semaphores();
        self.render_finished_semaphores = (0..image_count)
            .map(|idx| GfxSemaphore::new(ctx, &format!("render-finished-{idx}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.images_in_flight = ImagesInFlight::new(image_count);
        Ok(())
    }
}
// getters
impl FrameSync {
    #[inline]
    pub fn in_flight_fence(&self, label: FrameLabel) -> &GfxFence {
        &self.in_flight_fences[*label]
    }

    #[inline]
    pub fn image_available(&self, label: FrameLabel) -> &GfxSemaphore {
        &self.image_available_semaphores[*label]
    }

    #[inline]
    pub fn render_finished(&self, image_index: usize) -> Option<&GfxSemaphore> {
        self.render_finished_semaphores.get(image_index)
    }

    #[inline]
    pub fn image_semaphore_count(&self) -> usize {
        self.render_finished_semaphores.len()
    }
}
// tools
impl FrameSync {
    /// 等待 image 之前的所有者完成，然后把 image 交给当前 slot
    pub fn wait_image_owner(&mut self, image_index: usize, label: FrameLabel) -> anyhow::Result<()> {
        if let Some(prev) = self.images_in_flight.claim(image_index, *label) {
            let _span = tracy_client::span!("wait_image_owner");
            self.in_flight_fences[prev].wait()?;
        }
        Ok(())
    }
}
// destroy
impl FrameSync {
    /// 随 swapchain 一起销毁，调用前设备需要处于 idle
    pub fn destroy_image_semaphores(&mut self) {
        for semaphore in self.render_finished_semaphores.drain(..) {
            semaphore.destroy();
        }
    }

    pub fn destroy(mut self) {
        self.destroy_image_semaphores();
        for fence in self.in_flight_fences.drain(..) {
            fence.destroy();
        }
        for semaphore in self.image_available_semaphores.drain(..) {
            semaphore.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_needs_no_wait() {
        let mut images = ImagesInFlight::new(3);
        assert_eq!(images.claim(0, 0), None);
        assert_eq!(images.claim(1, 1), None);
        assert_eq!(images.owner(0), Some(0));
        assert_eq!(images.owner(2), None);
    }

    #[test]
    fn test_claim_by_other_slot_returns_previous_owner() {
        let mut images = ImagesInFlight::new(3);
        images.claim(2, 0);
        assert_eq!(images.claim(2, 1), Some(0));
        assert_eq!(images.owner(2), Some(1));
    }

    #[test]
    fn test_claim_by_same_slot_needs_no_wait() {
        let mut images = ImagesInFlight::new(2);
        images.claim(1, 1);
        assert_eq!(images.claim(1, 1), None);
    }

    #[test]
    fn test_claim_out_of_range() {
        let mut images = ImagesInFlight::new(2);
        assert_eq!(images.claim(5, 0), None);
        assert_eq!(images.image_count(), 2);
    }

    #[test]
    fn test_slot_ring_with_more_images_than_slots() {
        // 3 张 image、2 个 slot 轮转，image 依次被不同 slot 复用
        let mut images = ImagesInFlight::new(3);
        let mut waits = vec![];
        for frame in 0..6usize {
            let slot = frame % FrameCounter::fif_count();
            let image = frame % 3;
            waits.push(images.claim(image, slot));
        }
        assert_eq!(waits, vec![None, None, None, Some(0), Some(1), Some(0)]);
    }
}
