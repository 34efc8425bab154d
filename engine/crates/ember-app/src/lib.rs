//! 应用层
//!
//! [`render_app::RenderApp`] 持有 GPU 上下文、renderer 以及场景数据，
//! 每个 tick 按照「分发事件 -> 更新 layer -> 录制一帧」的顺序驱动 [`layer::Layer`]。

pub mod editor_layer;
pub mod layer;
pub mod render_app;
