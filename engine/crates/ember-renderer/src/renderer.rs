use std::path::PathBuf;

use ash::vk;
use ember_asset::mesh::GpuMesh;
use ember_crate_tools::config::EmberConfig;
use ember_gfx::basic::color::LabelColor;
use ember_gfx::commands::barrier::{GfxBarrierMask, GfxBufferBarrier, GfxImageBarrier};
use ember_gfx::commands::command_buffer::GfxCommandBuffer;
use ember_gfx::commands::command_pool::GfxCommandPool;
use ember_gfx::commands::layout_transition;
use ember_gfx::commands::submit_info::GfxSubmitInfo;
use ember_gfx::gfx_context::GfxContext;
use ember_gfx::pipelines::graphics_pipeline::BaseDynamicState;
use ember_gfx::resources::buffer::{GfxBuffer, MemoryKind};
use ember_gfx::resources::image_view::{GfxImageView, GfxImageViewDesc};
use ember_gfx::swapchain::render_swapchain::{AcquireResult, GfxRenderSwapchain, PresentResult};
use ember_gfx::swapchain::surface::GfxSurface;
use ember_render_interface::frame_counter::FrameCounter;
use ember_render_interface::gfx_resource_manager::GfxResourceManager;
use ember_render_interface::pipeline_settings::{DefaultRendererSettings, FrameLabel, FrameSettings};
use glam::{Mat4, Vec4};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::frame_lifecycle::{FrameLifecycle, FrameOp, FrameState};
use crate::frame_sync::FrameSync;
use crate::render_pipelines::{self, ObjPushConstants, RenderPipelines, ViewProjection};
use crate::render_targets::{DepthTarget, OffscreenTarget};

/// 窗口最小化时 extent 为 0，此时不创建 swapchain
#[inline]
pub fn is_presentable_extent(extent: vk::Extent2D) -> bool {
    extent.width > 0 && extent.height > 0
}

/// begin_frame 开始时的决策
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameGate {
    /// 窗口最小化，放弃本帧，旧的 swapchain 不再使用
    Skip,
    Recreate,
    Proceed,
}

#[inline]
pub fn frame_gate(window_extent: vk::Extent2D, has_resources: bool, resize_pending: bool) -> FrameGate {
    if !is_presentable_extent(window_extent) {
        FrameGate::Skip
    } else if resize_pending || !has_resources {
        FrameGate::Recreate
    } else {
        FrameGate::Proceed
    }
}

/// present 之后是否需要重建 swapchain
#[inline]
pub fn needs_recreate(present: PresentResult, resize_pending: bool) -> bool {
    present.need_recreate() || resize_pending
}

/// 当前这一套 extent 资源的数量统计
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExtentResourceStats {
    pub generation: u64,
    pub live: bool,
    pub swapchain_images: usize,
    pub swapchain_views: usize,
    pub command_buffers: usize,
    pub image_semaphores: usize,
}

/// 依赖 swapchain extent 的资源，重建时整体销毁再整体创建
struct ExtentResources {
    swapchain: GfxRenderSwapchain,
    swapchain_views: Vec<GfxImageView>,
    depth: DepthTarget,
    offscreen: OffscreenTarget,
    pipelines: RenderPipelines,

    command_pool: GfxCommandPool,
    /// 每个 swapchain image 一个
    command_buffers: Vec<GfxCommandBuffer>,
}
// new & init
impl ExtentResources {
    /// 创建顺序：swapchain -> depth -> offscreen -> pipelines -> command pool/buffers -> per-image semaphores
    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: &GfxContext,
        surface: &GfxSurface,
        frame_sync: &mut FrameSync,
        present_mode: vk::PresentModeKHR,
        window_extent: vk::Extent2D,
        depth_format: vk::Format,
        vp_buffer: &GfxBuffer,
        shader_dir: &std::path::Path,
    ) -> anyhow::Result<Self> {
        let swapchain = GfxRenderSwapchain::new(
            ctx,
            surface,
            present_mode,
            DefaultRendererSettings::DEFAULT_SURFACE_FORMAT,
            window_extent,
        )?;
        let extent = swapchain.extent();
        let swapchain_views = match Self::create_swapchain_views(ctx, &swapchain) {
            Ok(views) => views,
            Err(e) => {
                swapchain.destroy();
                return Err(e);
            }
        };
        let destroy_swapchain = |swapchain: GfxRenderSwapchain, views: Vec<GfxImageView>| {
            views.into_iter().for_each(GfxImageView::destroy);
            swapchain.destroy();
        };

        let depth = match DepthTarget::new(ctx, extent, depth_format) {
            Ok(depth) => depth,
            Err(e) => {
                destroy_swapchain(swapchain, swapchain_views);
                return Err(e);
            }
        };
        let offscreen = match OffscreenTarget::new(ctx, extent) {
            Ok(offscreen) => offscreen,
            Err(e) => {
                depth.destroy();
                destroy_swapchain(swapchain, swapchain_views);
                return Err(e);
            }
        };

        let object_desc = render_pipelines::object_bundle_desc(shader_dir, depth_format, vp_buffer.vk_buffer());
        let blit_desc = render_pipelines::blit_bundle_desc(
            shader_dir,
            swapchain.color_format(),
            offscreen.view().handle(),
            offscreen.sampler().handle(),
        );
        let pipelines = match RenderPipelines::new(ctx, &object_desc, &blit_desc) {
            Ok(pipelines) => pipelines,
            Err(e) => {
                offscreen.destroy();
                depth.destroy();
                destroy_swapchain(swapchain, swapchain_views);
                return Err(e);
            }
        };

        let command_pool =
            match GfxCommandPool::new(ctx, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER, "render-frame") {
                Ok(pool) => pool,
                Err(e) => {
                    pipelines.destroy();
                    offscreen.destroy();
                    depth.destroy();
                    destroy_swapchain(swapchain, swapchain_views);
                    return Err(e);
                }
            };
        let resources = Self {
            swapchain,
            swapchain_views,
            depth,
            offscreen,
            pipelines,
            command_pool,
            command_buffers: vec![],
        };

        let image_count = resources.swapchain.present_images().len();
        let command_buffers = (0..image_count)
            .map(|idx| GfxCommandBuffer::new(&resources.command_pool, &format!("render-frame-{idx}")))
            .collect::<anyhow::Result<Vec<_>>>();
        let command_buffers = match command_buffers {
            Ok(command_buffers) => command_buffers,
            Err(e) => {
                resources.destroy(frame_sync);
                return Err(e);
            }
        };
        let mut resources = Self {
            command_buffers,
            ..resources
        };

        if let Err(e) = frame_sync.rebuild_image_semaphores(ctx, image_count) {
            resources.destroy(frame_sync);
            return Err(e);
        }
        if let Err(e) = resources.record_initial_transitions(ctx) {
            resources.destroy(frame_sync);
            return Err(e);
        }
        Ok(resources)
    }

    fn create_swapchain_views(
        ctx: &GfxContext,
        swapchain: &GfxRenderSwapchain,
    ) -> anyhow::Result<Vec<GfxImageView>> {
        let mut views = Vec::with_capacity(swapchain.present_images().len());
        for (idx, image) in swapchain.present_images().iter().enumerate() {
            match GfxImageView::new(
                ctx,
                *image,
                GfxImageViewDesc::new_2d(swapchain.color_format(), vk::ImageAspectFlags::COLOR),
                format!("swapchain-{idx}"),
            ) {
                Ok(view) => views.push(view),
                Err(e) => {
                    views.into_iter().for_each(GfxImageView::destroy);
                    return Err(e);
                }
            }
        }
        Ok(views)
    }

    /// offscreen color: UNDEFINED -> COLOR_ATTACHMENT；depth: UNDEFINED -> DEPTH_STENCIL_ATTACHMENT
    fn record_initial_transitions(&mut self, ctx: &GfxContext) -> anyhow::Result<()> {
        let offscreen = &mut self.offscreen;
        let depth = &self.depth;
        ctx.immediate_submit("initial-layout-transitions", |cmd| {
            offscreen.transition_to(ctx, cmd, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            depth.record_initial_transition(ctx, cmd);
        })
    }
}
// destroy
impl ExtentResources {
    /// 与创建相反的顺序，调用前设备需要处于 idle
    fn destroy(self, frame_sync: &mut FrameSync) {
        self.command_pool.destroy();
        self.pipelines.destroy();
        self.offscreen.destroy();
        self.depth.destroy();
        frame_sync.destroy_image_semaphores();
        self.swapchain_views.into_iter().for_each(GfxImageView::destroy);
        self.swapchain.destroy();
    }
}

/// 渲染器
///
/// 持有 surface、swapchain 及其依赖资源、帧同步对象，并通过 [`FrameLifecycle`] 约束每帧的调用顺序：
///
/// ```ignore
/// if renderer.begin_frame(&ctx, &mut rm)? {
///     renderer.begin_render_to_texture(&ctx);
///     // push_object_constants / draw_mesh
///     renderer.end_render_to_texture(&ctx);
///     renderer.begin_render_to_swapchain(&ctx);
///     renderer.end_render_to_swapchain(&ctx);
///     renderer.end_frame(&ctx)?;
/// }
/// ```
pub struct Renderer {
    surface: GfxSurface,
    frame_sync: FrameSync,
    /// 最小化期间为 None
    resources: Option<ExtentResources>,

    /// binding 0，每帧在离屏 pass 开始前通过 cmd_update_buffer 写入
    vp_buffer: GfxBuffer,
    view_projection: ViewProjection,

    lifecycle: FrameLifecycle,
    frame_counter: FrameCounter,

    window_extent: vk::Extent2D,
    /// resize 通知推迟到当前帧结束后处理
    resize_pending: bool,
    /// 成功重建的次数
    swapchain_generation: u64,

    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    shader_dir: PathBuf,
    clear_color: [f32; 4],
}
// new & init
impl Renderer {
    pub fn new(
        ctx: &GfxContext,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        window_extent: vk::Extent2D,
        config: &EmberConfig,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("Renderer::new");
        let surface = GfxSurface::new(ctx, raw_display_handle, raw_window_handle)?;
        Self::with_surface(ctx, surface, window_extent, config)
    }

    /// surface 的所有权转交给 renderer，失败时同样会被销毁
    pub fn with_surface(
        ctx: &GfxContext,
        surface: GfxSurface,
        window_extent: vk::Extent2D,
        config: &EmberConfig,
    ) -> anyhow::Result<Self> {
        let depth_format = match DepthTarget::choose_format(ctx) {
            Ok(format) => format,
            Err(e) => {
                surface.destroy();
                return Err(e);
            }
        };
        let frame_sync = match FrameSync::new(ctx, 0) {
            Ok(sync) => sync,
            Err(e) => {
                surface.destroy();
                return Err(e);
            }
        };
        let vp_buffer = match GfxBuffer::new(
            ctx,
            size_of::<ViewProjection>() as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryKind::GpuOnly,
            "view-projection",
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                frame_sync.destroy();
                surface.destroy();
                return Err(e);
            }
        };

        let mut renderer = Self {
            surface,
            frame_sync,
            resources: None,
            vp_buffer,
            view_projection: ViewProjection::default(),
            lifecycle: FrameLifecycle::default(),
            frame_counter: FrameCounter::new(0),
            window_extent,
            resize_pending: false,
            swapchain_generation: 0,
            depth_format,
            present_mode: DefaultRendererSettings::present_mode(config.vsync),
            shader_dir: config.shader_dir(),
            clear_color: config.clear_color,
        };
        log::info!(
            "renderer: depth format {:?}, present mode {:?}, shaders in {}",
            renderer.depth_format,
            renderer.present_mode,
            renderer.shader_dir.display()
        );

        if let Err(e) = renderer.recreate_swapchain(ctx) {
            renderer.destroy(ctx);
            return Err(e);
        }
        Ok(renderer)
    }
}
// getters
impl Renderer {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        self.frame_counter.frame_label()
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.lifecycle.state()
    }

    #[inline]
    pub fn window_extent(&self) -> vk::Extent2D {
        self.window_extent
    }

    /// 最小化期间返回 None
    pub fn frame_settings(&self) -> Option<FrameSettings> {
        self.resources.as_ref().map(|res| FrameSettings {
            color_format: res.offscreen.format(),
            depth_format: self.depth_format,
            frame_extent: res.swapchain.extent(),
        })
    }

    pub fn extent_resource_stats(&self) -> ExtentResourceStats {
        let res = self.resources.as_ref();
        ExtentResourceStats {
            generation: self.swapchain_generation,
            live: res.is_some(),
            swapchain_images: res.map_or(0, |r| r.swapchain.present_images().len()),
            swapchain_views: res.map_or(0, |r| r.swapchain_views.len()),
            command_buffers: res.map_or(0, |r| r.command_buffers.len()),
            image_semaphores: self.frame_sync.image_semaphore_count(),
        }
    }

    /// 帧录制期间返回当前 swapchain image 对应的 command buffer
    pub fn command_buffer(&self) -> Option<&GfxCommandBuffer> {
        if !self.lifecycle.is_recording() {
            return None;
        }
        let res = self.resources.as_ref()?;
        res.command_buffers.get(res.swapchain.current_image_index())
    }

    /// 当前打开的 pass 所使用的 pipeline layout
    pub fn active_pipeline_layout(&self) -> Option<vk::PipelineLayout> {
        let res = self.resources.as_ref()?;
        match self.lifecycle.state() {
            FrameState::OffscreenActive => Some(res.pipelines.object().pipeline_layout()),
            FrameState::SwapchainActive => Some(res.pipelines.blit().pipeline_layout()),
            _ => None,
        }
    }
}
// setters
impl Renderer {
    /// 在 begin_render_to_texture 之前调用，本帧的离屏 pass 使用该矩阵
    #[inline]
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view_projection = ViewProjection { view, projection };
    }

    #[inline]
    pub fn set_clear_color(&mut self, clear_color: [f32; 4]) {
        self.clear_color = clear_color;
    }

    /// 窗口尺寸变化，重建推迟到当前帧结束
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        log::debug!("window resized to {width}x{height}");
        self.window_extent = vk::Extent2D { width, height };
        self.resize_pending = true;
    }
}
// swapchain
impl Renderer {
    /// 等待 GPU 空闲，然后销毁并重建所有依赖 swapchain extent 的资源
    ///
    /// 窗口尺寸为 0 时什么都不做，直到收到非 0 的尺寸
    pub fn recreate_swapchain(&mut self, ctx: &GfxContext) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Renderer::recreate_swapchain");
        if self.lifecycle.is_recording() {
            log::error!("recreate_swapchain called in state {:?}, ignored", self.lifecycle.state());
            return Ok(());
        }
        if !is_presentable_extent(self.window_extent) {
            log::info!("window extent is zero, swapchain recreation suspended");
            return Ok(());
        }

        ctx.wait_idle()?;
        if let Some(resources) = self.resources.take() {
            resources.destroy(&mut self.frame_sync);
        }

        let resources = ExtentResources::new(
            ctx,
            &self.surface,
            &mut self.frame_sync,
            self.present_mode,
            self.window_extent,
            self.depth_format,
            &self.vp_buffer,
            &self.shader_dir,
        )?;
        log::info!(
            "swapchain recreated: {}x{}, {} images",
            resources.swapchain.extent().width,
            resources.swapchain.extent().height,
            resources.command_buffers.len()
        );
        self.resources = Some(resources);
        self.resize_pending = false;
        self.swapchain_generation += 1;
        Ok(())
    }
}
// frame
impl Renderer {
    /// 等待当前 slot 的 fence，回收过期资源，获取 swapchain image 并开始录制
    ///
    /// # return
    /// false 表示本帧被放弃（swapchain out of date，或者窗口最小化），不要调用其他帧操作
    pub fn begin_frame(&mut self, ctx: &GfxContext, rm: &mut GfxResourceManager) -> anyhow::Result<bool> {
        let _span = tracy_client::span!("Renderer::begin_frame");
        if !self.lifecycle.check(FrameOp::BeginFrame) {
            return Ok(false);
        }
        match frame_gate(self.window_extent, self.resources.is_some(), self.resize_pending) {
            FrameGate::Skip => return Ok(false),
            FrameGate::Recreate => self.recreate_swapchain(ctx)?,
            FrameGate::Proceed => {}
        }
        if self.resources.is_none() {
            return Ok(false);
        }

        let label = self.frame_counter.frame_label();
        {
            let _span = tracy_client::span!("wait_in_flight_fence");
            self.frame_sync.in_flight_fence(label).wait()?;
        }
        rm.cleanup(self.frame_counter.frame_id());

        let Some(res) = self.resources.as_mut() else {
            return Ok(false);
        };
        let image_index = match res.swapchain.acquire_next_image(self.frame_sync.image_available(label))? {
            AcquireResult::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    self.resize_pending = true;
                }
                image_index as usize
            }
            AcquireResult::OutOfDate => {
                self.recreate_swapchain(ctx)?;
                return Ok(false);
            }
        };

        self.frame_sync.wait_image_owner(image_index, label)?;
        let Some(cmd) = res.command_buffers.get(image_index) else {
            anyhow::bail!("no command buffer for swapchain image {image_index}");
        };
        cmd.reset()?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &self.frame_counter.frame_name())?;

        ctx.set_frame_recording(true);
        self.lifecycle.advance(FrameOp::BeginFrame);
        Ok(true)
    }

    /// 写入 view/projection，切换离屏 color 到 COLOR_ATTACHMENT，开始离屏 pass 并绑定 object pipeline
    pub fn begin_render_to_texture(&mut self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::begin_render_to_texture");
        if !self.lifecycle.check(FrameOp::BeginRenderToTexture) {
            return;
        }
        let Some(res) = self.resources.as_mut() else {
            return;
        };
        let Some(cmd) = res.command_buffers.get(res.swapchain.current_image_index()) else {
            return;
        };
        cmd.begin_label("offscreen", LabelColor::COLOR_PASS);

        // 上一帧可能仍在 vertex shader 中读取 buffer
        let vp_size = size_of::<ViewProjection>() as vk::DeviceSize;
        cmd.buffer_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxBufferBarrier::new()
                .mask(GfxBarrierMask {
                    src_stage: vk::PipelineStageFlags2::VERTEX_SHADER,
                    src_access: vk::AccessFlags2::SHADER_READ,
                    dst_stage: vk::PipelineStageFlags2::TRANSFER,
                    dst_access: vk::AccessFlags2::TRANSFER_WRITE,
                })
                .buffer(self.vp_buffer.vk_buffer(), 0, vp_size)],
        );
        cmd.cmd_update_buffer(self.vp_buffer.vk_buffer(), 0, bytemuck::bytes_of(&self.view_projection));
        cmd.buffer_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxBufferBarrier::new()
                .mask(GfxBarrierMask {
                    src_stage: vk::PipelineStageFlags2::TRANSFER,
                    src_access: vk::AccessFlags2::TRANSFER_WRITE,
                    dst_stage: vk::PipelineStageFlags2::VERTEX_SHADER,
                    dst_access: vk::AccessFlags2::SHADER_READ,
                })
                .buffer(self.vp_buffer.vk_buffer(), 0, vp_size)],
        );

        res.offscreen.transition_to(ctx, cmd, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        // 两个 slot 共用同一张 depth，写之前等待上一帧的写完成
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxImageBarrier::new()
                .image(res.depth.image().handle())
                .layout_transfer(
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                )
                .src_mask(
                    vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .dst_mask(
                    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .image_aspect_flag(layout_transition::aspect_of_format(res.depth.format()))],
        );

        let extent = res.swapchain.extent();
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(res.offscreen.view().handle())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(res.depth.view().handle())
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(extent.into())
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);
        if res.depth.has_stencil() {
            rendering_info = rendering_info.stencil_attachment(&depth_attachment);
        }
        cmd.cmd_begin_rendering(&rendering_info);

        let object = res.pipelines.object();
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, object.pipeline());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            object.pipeline_layout(),
            0,
            &[object.descriptor_set()],
            None,
        );
        Self::set_full_viewport(cmd, extent);

        self.lifecycle.advance(FrameOp::BeginRenderToTexture);
    }

    /// 结束离屏 pass，离屏 color 切换到 SHADER_READ_ONLY 供合成 pass 采样
    pub fn end_render_to_texture(&mut self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::end_render_to_texture");
        if !self.lifecycle.check(FrameOp::EndRenderToTexture) {
            return;
        }
        let Some(res) = self.resources.as_mut() else {
            return;
        };
        let Some(cmd) = res.command_buffers.get(res.swapchain.current_image_index()) else {
            return;
        };

        cmd.cmd_end_rendering();
        res.offscreen.transition_to(ctx, cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        cmd.end_label();

        self.lifecycle.advance(FrameOp::EndRenderToTexture);
    }

    /// 开始合成 pass，绑定 blit pipeline 并绘制全屏三角形
    ///
    /// 之后到 `end_render_to_swapchain` 之前，可以继续追加 overlay 的绘制
    pub fn begin_render_to_swapchain(&mut self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::begin_render_to_swapchain");
        if !self.lifecycle.check(FrameOp::BeginRenderToSwapchain) {
            return;
        }
        let Some(res) = self.resources.as_ref() else {
            return;
        };
        let Some(cmd) = res.command_buffers.get(res.swapchain.current_image_index()) else {
            return;
        };
        let Some(view) = res.swapchain_views.get(res.swapchain.current_image_index()) else {
            log::error!("no view for swapchain image {}", res.swapchain.current_image_index());
            return;
        };
        cmd.begin_label("present", LabelColor::COLOR_PASS);

        ctx.transition_image_layout(
            cmd,
            res.swapchain.current_image(),
            res.swapchain.color_format(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );

        let extent = res.swapchain.extent();
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(view.handle())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(extent.into())
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));
        cmd.cmd_begin_rendering(&rendering_info);

        Self::set_full_viewport(cmd, extent);
        let blit = res.pipelines.blit();
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, blit.pipeline());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            blit.pipeline_layout(),
            0,
            &[blit.descriptor_set()],
            None,
        );
        cmd.cmd_draw(3, 1, 0, 0);

        self.lifecycle.advance(FrameOp::BeginRenderToSwapchain);
    }

    /// 结束合成 pass，swapchain image 切换到 PRESENT_SRC
    pub fn end_render_to_swapchain(&mut self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::end_render_to_swapchain");
        if !self.lifecycle.check(FrameOp::EndRenderToSwapchain) {
            return;
        }
        let Some(res) = self.resources.as_ref() else {
            return;
        };
        let Some(cmd) = res.command_buffers.get(res.swapchain.current_image_index()) else {
            return;
        };

        cmd.cmd_end_rendering();
        ctx.transition_image_layout(
            cmd,
            res.swapchain.current_image(),
            res.swapchain.color_format(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        cmd.end_label();

        self.lifecycle.advance(FrameOp::EndRenderToSwapchain);
    }

    /// 结束录制，提交并 present，然后推进 frame slot
    ///
    /// 可以直接跟在 `begin_frame` 之后，此时 swapchain image 只做 UNDEFINED -> PRESENT_SRC 的转换
    pub fn end_frame(&mut self, ctx: &GfxContext) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Renderer::end_frame");
        if !self.lifecycle.check(FrameOp::EndFrame) {
            return Ok(());
        }

        let present_result = self.submit_and_present(ctx);
        self.lifecycle.advance(FrameOp::EndFrame);
        ctx.set_frame_recording(false);
        self.frame_counter.next_frame();

        if needs_recreate(present_result?, self.resize_pending) {
            self.recreate_swapchain(ctx)?;
        }
        Ok(())
    }

    fn submit_and_present(&self, ctx: &GfxContext) -> anyhow::Result<PresentResult> {
        let Some(res) = self.resources.as_ref() else {
            anyhow::bail!("end_frame without swapchain resources");
        };
        let image_index = res.swapchain.current_image_index();
        let Some(cmd) = res.command_buffers.get(image_index) else {
            anyhow::bail!("no command buffer for swapchain image {image_index}");
        };
        let Some(render_finished) = self.frame_sync.render_finished(image_index) else {
            anyhow::bail!("no render finished semaphore for swapchain image {image_index}");
        };

        if self.lifecycle.state() == FrameState::FrameBegun {
            ctx.transition_image_layout(
                cmd,
                res.swapchain.current_image(),
                res.swapchain.color_format(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );
        }
        cmd.end()?;

        let label = self.frame_counter.frame_label();
        let fence = self.frame_sync.in_flight_fence(label);
        fence.reset()?;

        let submit_info = GfxSubmitInfo::new(std::slice::from_ref(cmd))
            .wait(self.frame_sync.image_available(label), vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .signal(render_finished, vk::PipelineStageFlags2::ALL_COMMANDS);
        ctx.gfx_queue().submit(vec![submit_info], Some(fence))?;

        res.swapchain.present_image(ctx.gfx_queue(), &[render_finished])
    }
}
// draw
impl Renderer {
    /// 只能在离屏 pass 中调用
    pub fn push_object_constants(&self, model: Mat4, color: Vec4) {
        if self.lifecycle.state() != FrameState::OffscreenActive {
            log::error!("push_object_constants called in state {:?}, ignored", self.lifecycle.state());
            return;
        }
        let (Some(cmd), Some(layout)) = (self.command_buffer(), self.active_pipeline_layout()) else {
            return;
        };
        let constants = ObjPushConstants { model, color };
        cmd.cmd_push_constants(
            layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            bytemuck::bytes_of(&constants),
        );
    }

    /// 绑定 mesh 的 vertex / index buffer 并绘制，只能在离屏 pass 中调用
    pub fn draw_mesh(&self, mesh: &GpuMesh, rm: &GfxResourceManager) {
        if self.lifecycle.state() != FrameState::OffscreenActive {
            log::error!("draw_mesh called in state {:?}, ignored", self.lifecycle.state());
            return;
        }
        let Some(cmd) = self.command_buffer() else {
            return;
        };
        let (Some(vertex_buffer), Some(index_buffer)) =
            (rm.get_buffer(mesh.vertex_buffer), rm.get_buffer(mesh.index_buffer))
        else {
            log::warn!("draw_mesh: mesh buffers have been released");
            return;
        };

        cmd.cmd_bind_vertex_buffers(0, &[vertex_buffer.vk_buffer()], &[0]);
        cmd.cmd_bind_index_buffer(index_buffer.vk_buffer(), 0, vk::IndexType::UINT32);
        cmd.draw_indexed(mesh.index_count, 0, 1, 0, 0);
    }
}
// tools
impl Renderer {
    fn set_full_viewport(cmd: &GfxCommandBuffer, extent: vk::Extent2D) {
        BaseDynamicState::full_extent(extent).record(cmd);
    }
}
// destroy
impl Renderer {
    pub fn destroy(mut self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::destroy");
        if self.lifecycle.is_recording() {
            log::warn!("renderer destroyed in state {:?}", self.lifecycle.state());
            ctx.set_frame_recording(false);
        }
        if let Err(e) = ctx.wait_idle() {
            log::error!("{e:#}");
        }

        if let Some(resources) = self.resources.take() {
            resources.destroy(&mut self.frame_sync);
        }
        self.frame_sync.destroy();
        self.vp_buffer.destroy();
        self.surface.destroy();
    }
}
