//! Vulkan RHI (Rendering Hardware Interface) 抽象层
//!
//! 提供对 Vulkan API 的封装，包括设备管理、命令缓冲、描述符、管线、交换链等核心功能。
//!
//! 所有 Vulkan 对象都通过 [`gfx_context::GfxContext`] 创建：context 以参数的形式显式传入，
//! 各个资源内部持有 `Rc<GfxDevice>` / `Rc<MemAllocator>`，并需要手动调用 `destroy`。

pub mod basic;
pub mod commands;
pub mod foundation;
pub mod gfx_context;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
