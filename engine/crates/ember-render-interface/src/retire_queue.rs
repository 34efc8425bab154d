/// 按帧序号延迟释放的队列
///
/// 在 `frame_id` 入队的元素，当 `frame_id + delay <= current_frame_id` 时被取出。
/// 此时该帧对应的 fence 已经等待过，GPU 不会再访问这些资源。
pub struct RetireQueue<T> {
    pending: Vec<(T, u64)>,
    delay: u64,
}
impl<T> RetireQueue<T> {
    pub fn new(delay: u64) -> Self {
        Self {
            pending: Vec::new(),
            delay,
        }
    }

    #[inline]
    pub fn push(&mut self, item: T, frame_id: u64) {
        self.pending.push((item, frame_id));
    }

    /// 取出所有已经过期的元素，保持入队顺序
    pub fn drain_retired(&mut self, current_frame_id: u64) -> Vec<T> {
        let delay = self.delay;
        let (retired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, frame_id)| {
                frame_id.checked_add(delay).is_some_and(|retire_at| retire_at <= current_frame_id)
            });
        self.pending = pending;
        retired.into_iter().map(|(item, _)| item).collect()
    }

    /// 不论帧序号，全部取出，用于 device idle 之后
    pub fn drain_all(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|(item, _)| item).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retire_after_delay() {
        let mut queue = RetireQueue::new(2);
        queue.push("a", 10);
        queue.push("b", 11);

        assert!(queue.drain_retired(10).is_empty());
        assert!(queue.drain_retired(11).is_empty());
        assert_eq!(queue.drain_retired(12), vec!["a"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_retired(13), vec!["b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_retire_keeps_order() {
        let mut queue = RetireQueue::new(2);
        queue.push(1, 0);
        queue.push(2, 5);
        queue.push(3, 1);
        assert_eq!(queue.drain_retired(3), vec![1, 3]);
        assert_eq!(queue.drain_retired(100), vec![2]);
    }

    #[test]
    fn test_drain_all_ignores_frame_id() {
        let mut queue = RetireQueue::new(2);
        queue.push(1, 0);
        queue.push(2, 7);
        queue.push(3, 0);
        assert_eq!(queue.drain_all(), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_no_overflow_on_large_frame_id() {
        let mut queue = RetireQueue::new(2);
        queue.push((), u64::MAX);
        assert!(queue.drain_retired(u64::MAX).is_empty());

        queue.push((), u64::MAX - 2);
        assert_eq!(queue.drain_retired(u64::MAX).len(), 1);
        assert_eq!(queue.len(), 1);
    }
}
