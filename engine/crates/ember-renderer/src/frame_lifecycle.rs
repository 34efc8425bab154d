use std::fmt::Display;

/// 一帧内部所处的阶段
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    FrameBegun,
    OffscreenActive,
    OffscreenEnded,
    SwapchainActive,
    SwapchainEnded,
}

/// renderer 对外暴露的帧操作
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOp {
    BeginFrame,
    BeginRenderToTexture,
    EndRenderToTexture,
    BeginRenderToSwapchain,
    EndRenderToSwapchain,
    EndFrame,
}
impl Display for FrameOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BeginFrame => "begin_frame",
            Self::BeginRenderToTexture => "begin_render_to_texture",
            Self::EndRenderToTexture => "end_render_to_texture",
            Self::BeginRenderToSwapchain => "begin_render_to_swapchain",
            Self::EndRenderToSwapchain => "end_render_to_swapchain",
            Self::EndFrame => "end_frame",
        };
        write!(f, "{name}")
    }
}

/// 状态转移表，非法转移返回 `None`
///
/// `EndFrame` 可以直接跟在 `BeginFrame` 之后，此时 swapchain image 只做 layout 转换后 present
pub fn next_state(state: FrameState, op: FrameOp) -> Option<FrameState> {
    use FrameOp as O;
    use FrameState as S;

    match (state, op) {
        (S::Idle, O::BeginFrame) => Some(S::FrameBegun),
        (S::FrameBegun, O::BeginRenderToTexture) => Some(S::OffscreenActive),
        (S::OffscreenActive, O::EndRenderToTexture) => Some(S::OffscreenEnded),
        (S::OffscreenEnded, O::BeginRenderToSwapchain) => Some(S::SwapchainActive),
        (S::SwapchainActive, O::EndRenderToSwapchain) => Some(S::SwapchainEnded),
        (S::SwapchainEnded | S::FrameBegun, O::EndFrame) => Some(S::Idle),
        _ => None,
    }
}

/// 帧状态机
#[derive(Debug, Default)]
pub struct FrameLifecycle {
    state: FrameState,
}
// getters
impl FrameLifecycle {
    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// BeginFrame 与 EndFrame 之间
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.state != FrameState::Idle
    }

    #[inline]
    pub fn can(&self, op: FrameOp) -> bool {
        next_state(self.state, op).is_some()
    }
}
// update
impl FrameLifecycle {
    /// 检查 op 是否合法，不合法时记录错误并返回 false
    ///
    /// 合法时并不立即转移状态，由调用方在 GPU 命令全部记录成功后调用 [`Self::advance`]
    pub fn check(&self, op: FrameOp) -> bool {
        if self.can(op) {
            true
        } else {
            log::error!("{op} called in state {:?}, ignored", self.state);
            false
        }
    }

    pub fn advance(&mut self, op: FrameOp) {
        match next_state(self.state, op) {
            Some(next) => self.state = next,
            None => log::error!("{op} called in state {:?}, ignored", self.state),
        }
    }

    /// 帧被中途放弃时回到 Idle
    #[inline]
    pub fn reset(&mut self) {
        self.state = FrameState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [FrameOp; 6] = [
        FrameOp::BeginFrame,
        FrameOp::BeginRenderToTexture,
        FrameOp::EndRenderToTexture,
        FrameOp::BeginRenderToSwapchain,
        FrameOp::EndRenderToSwapchain,
        FrameOp::EndFrame,
    ];

    #[test]
    fn test_full_frame_sequence() {
        let mut lifecycle = FrameLifecycle::default();
        for op in ALL_OPS {
            assert!(lifecycle.check(op), "{op}");
            lifecycle.advance(op);
        }
        assert_eq!(lifecycle.state(), FrameState::Idle);
        assert!(!lifecycle.is_recording());
    }

    #[test]
    fn test_end_frame_directly_after_begin() {
        let mut lifecycle = FrameLifecycle::default();
        lifecycle.advance(FrameOp::BeginFrame);
        assert!(lifecycle.is_recording());
        assert!(lifecycle.can(FrameOp::EndFrame));
        lifecycle.advance(FrameOp::EndFrame);
        assert_eq!(lifecycle.state(), FrameState::Idle);
    }

    #[test]
    fn test_end_render_to_texture_without_begin_is_noop() {
        let mut lifecycle = FrameLifecycle::default();
        lifecycle.advance(FrameOp::BeginFrame);
        assert!(!lifecycle.check(FrameOp::EndRenderToTexture));
        lifecycle.advance(FrameOp::EndRenderToTexture);
        assert_eq!(lifecycle.state(), FrameState::FrameBegun);
    }

    #[test]
    fn test_only_begin_frame_is_legal_when_idle() {
        for op in ALL_OPS {
            let legal = next_state(FrameState::Idle, op).is_some();
            assert_eq!(legal, op == FrameOp::BeginFrame, "{op}");
        }
    }

    #[test]
    fn test_end_frame_rejected_mid_pass() {
        assert!(next_state(FrameState::OffscreenActive, FrameOp::EndFrame).is_none());
        assert!(next_state(FrameState::OffscreenEnded, FrameOp::EndFrame).is_none());
        assert!(next_state(FrameState::SwapchainActive, FrameOp::EndFrame).is_none());
    }

    #[test]
    fn test_begin_frame_twice_rejected() {
        let mut lifecycle = FrameLifecycle::default();
        lifecycle.advance(FrameOp::BeginFrame);
        lifecycle.advance(FrameOp::BeginFrame);
        assert_eq!(lifecycle.state(), FrameState::FrameBegun);

        lifecycle.reset();
        assert_eq!(lifecycle.state(), FrameState::Idle);
    }
}
