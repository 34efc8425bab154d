use crate::pipeline_settings::FrameLabel;

pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
}
impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(0)
    }
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64) -> Self {
        Self { frame_id: init_frame_id }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    const FIF_COUNT: usize = 2;

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; Self::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_alternates() {
        let mut counter = FrameCounter::new(0);
        let mut slots = vec![];
        for _ in 0..5 {
            slots.push(*counter.frame_label());
            counter.next_frame();
        }
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.frame_id(), 5);
    }

    #[test]
    fn test_frame_name() {
        let counter = FrameCounter::new(7);
        assert_eq!(counter.frame_name(), "[F7B]");
    }

    #[test]
    fn test_wrapping() {
        let mut counter = FrameCounter::new(u64::MAX);
        counter.next_frame();
        assert_eq!(counter.frame_id(), 0);
    }
}
