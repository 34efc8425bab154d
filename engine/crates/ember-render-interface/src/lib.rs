//! renderer 与 GPU 资源之间的边界
//!
//! - [`frame_counter::FrameCounter`]：帧序号以及 frames in flight 的槽位
//! - [`pipeline_settings::DefaultRendererSettings`]：surface / depth / offscreen 的默认格式
//! - [`gfx_resource_manager::GfxResourceManager`]：通过 handle 管理 GPU 资源，按帧序号延迟销毁

pub mod frame_counter;
pub mod gfx_resource_manager;
pub mod handles;
pub mod pipeline_settings;
pub mod retire_queue;
