use std::{fmt::Display, ops::Deref};

use ash::vk;

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        // shader 输出会被自动改变： liner -> sRGB
        format: vk::Format::B8G8R8A8_SRGB,
        // 通知 OS，将数值按照 sRGB 空间进行处理和显示
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;
    pub const VSYNC_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] =
        &[vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT];
    /// 离屏 color target 的格式，同时作为 blit 的输入
    pub const OFFSCREEN_COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
    pub const FRAMES_IN_FLIGHT: usize = 2;

    #[inline]
    pub fn present_mode(vsync: bool) -> vk::PresentModeKHR {
        if vsync { Self::VSYNC_PRESENT_MODE } else { Self::DEFAULT_PRESENT_MODE }
    }
}

/// 帧级渲染配置
#[derive(Copy, Clone, Default, Debug)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub frame_extent: vk::Extent2D,
}

/// 帧标签（A/B）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 2] = [0, 1];

    /// 超出范围的值按 FIF 取模
    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx % Self::INDEX.len() {
            0 => Self::A,
            _ => Self::B,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_by_vsync() {
        assert_eq!(DefaultRendererSettings::present_mode(true), vk::PresentModeKHR::FIFO);
        assert_eq!(DefaultRendererSettings::present_mode(false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_frame_label_index() {
        assert_eq!(*FrameLabel::A, 0);
        assert_eq!(*FrameLabel::B, 1);
        assert_eq!(FrameLabel::from_usize(3), FrameLabel::B);
        assert_eq!(FrameLabel::B.to_string(), "B");
    }

    #[test]
    fn test_depth_candidates_have_stencil() {
        assert_eq!(DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES[0], vk::Format::D32_SFLOAT_S8_UINT);
        assert_eq!(DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES[1], vk::Format::D24_UNORM_S8_UINT);
    }
}
