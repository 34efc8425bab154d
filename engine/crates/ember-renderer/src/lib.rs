//! 渲染器
//!
//! 每一帧由两个 pass 组成：
//! 1. 离屏 pass：场景绘制到 offscreen color + depth/stencil
//! 2. 合成 pass：全屏三角形把 offscreen color 采样到 swapchain image
//!
//! 调用顺序由 [`frame_lifecycle::FrameLifecycle`] 约束，乱序调用只记录错误，不会改动 GPU 状态。

pub mod frame_lifecycle;
pub mod frame_sync;
pub mod render_pipelines;
pub mod render_targets;
pub mod renderer;
