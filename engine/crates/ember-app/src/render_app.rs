use std::time::Instant;

use ash::vk;
use ember_asset::asset_store::AssetStore;
use ember_crate_tools::config::EmberConfig;
use ember_crate_tools::init_log::init_log;
use ember_gfx::gfx_context::GfxContext;
use ember_platform::event_queue::{EventProxy, EventQueue};
use ember_platform::input_event::Event;
use ember_platform::input_state::InputState;
use ember_render_interface::gfx_resource_manager::GfxResourceManager;
use ember_renderer::renderer::Renderer;
use ember_scene::camera::Camera;
use ember_scene::project::Project;
use ember_scene::scene::Scene;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::layer::{Layer, LayerContext, LayerStack, RenderContext};

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

pub struct RenderApp {
    pub gfx: GfxContext,
    pub renderer: Renderer,
    pub resource_manager: GfxResourceManager,
    pub assets: AssetStore,
    pub scene: Scene,
    pub camera: Camera,
    pub project: Option<Project>,

    pub events: EventQueue,
    pub input: InputState,
    layers: LayerStack,

    last_tick: Instant,
    exit_requested: bool,
}
// new & init
impl RenderApp {
    pub fn new(
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        window_extent: vk::Extent2D,
        config: &EmberConfig,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("RenderApp::new");

        let gfx = GfxContext::new_for_display(&config.window_title, raw_display_handle)?;
        let renderer = match Renderer::new(&gfx, raw_display_handle, raw_window_handle, window_extent, config) {
            Ok(renderer) => renderer,
            Err(e) => {
                gfx.destroy();
                return Err(e);
            }
        };

        let project = match config.project_file.as_ref().map(Project::load).transpose() {
            Ok(project) => project,
            Err(e) => {
                log::error!("{e:#}");
                None
            }
        };
        if let Some(project) = &project {
            log::info!("project {} at {}", project.name(), project.root().display());
        }

        let mut camera = Camera::default();
        camera.set_viewport_size(window_extent.width, window_extent.height);

        Ok(Self {
            gfx,
            renderer,
            resource_manager: GfxResourceManager::new(),
            assets: AssetStore::new(),
            scene: Scene::new(),
            camera,
            project,
            events: EventQueue::new(),
            input: InputState::default(),
            layers: LayerStack::new(),
            last_tick: Instant::now(),
            exit_requested: false,
        })
    }

    pub fn init_env() {
        std::panic::set_hook(Box::new(panic_handler));

        init_log();

        tracy_client::Client::start();
        tracy_client::set_thread_name!("MainThread");
    }

    /// 压入 layer 并立即调用 `on_attach`
    pub fn push_layer(&mut self, mut layer: Box<dyn Layer>) {
        let _span = tracy_client::span!("RenderApp::push_layer");
        let mut ctx = LayerContext::new(
            &mut self.scene,
            &mut self.assets,
            &mut self.resource_manager,
            &self.input,
            &mut self.camera,
            self.project.as_ref(),
            self.renderer.frame_id(),
        );
        layer.on_attach(&mut ctx);
        self.exit_requested |= ctx.exit_requested();
        self.layers.push(layer);
    }
}
// getters
impl RenderApp {
    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    #[inline]
    pub fn event_proxy(&self) -> EventProxy {
        self.events.proxy()
    }

    #[inline]
    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }
}
// update
impl RenderApp {
    /// 窗口回调中调用，事件在下一次 tick 时统一处理
    #[inline]
    pub fn push_event(&self, event: Event) {
        self.events.push(event);
    }

    /// 事件 -> 更新 -> 帧
    pub fn tick(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let delta_time = (now - self.last_tick).as_secs_f32();
        self.last_tick = now;

        {
            let _span = tracy_client::span!("Dispatch Events");
            self.dispatch_events();
        }

        let transitions = {
            let _span = tracy_client::span!("Update Layers");
            self.update_layers(delta_time)
        };

        {
            let _span = tracy_client::span!("Upload Assets");
            self.assets.flush_uploads(&self.gfx, &mut self.resource_manager);
        }

        self.renderer.set_camera(self.camera.view_matrix(), self.camera.projection_matrix());
        self.render_frame()?;

        self.apply_transitions(transitions);
        self.input.end_tick();

        tracy_client::frame_mark();
        Ok(())
    }

    fn dispatch_events(&mut self) {
        let input = &mut self.input;
        let renderer = &mut self.renderer;
        let camera = &mut self.camera;
        let exit_requested = &mut self.exit_requested;
        self.events.drain_into(self.layers.layers_mut(), |event| {
            input.on_event(event);
            match *event {
                Event::WindowResize { width, height } => {
                    renderer.notify_resized(width, height);
                    camera.set_viewport_size(width, height);
                }
                Event::WindowClose => *exit_requested = true,
                _ => {}
            }
        });
    }

    /// # return
    /// 各个 layer 发起的替换请求：(layer 下标, 新的 layer)
    fn update_layers(&mut self, delta_time: f32) -> Vec<(usize, Box<dyn Layer>)> {
        let frame_id = self.renderer.frame_id();
        let mut transitions = Vec::new();
        for (index, layer) in self.layers.layers_mut().iter_mut().enumerate() {
            let mut ctx = LayerContext::new(
                &mut self.scene,
                &mut self.assets,
                &mut self.resource_manager,
                &self.input,
                &mut self.camera,
                self.project.as_ref(),
                frame_id,
            );
            layer.on_update(delta_time, &mut ctx);
            self.exit_requested |= ctx.exit_requested();
            if let Some(next) = ctx.take_transition() {
                transitions.push((index, next));
            }
        }
        transitions
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Render Frame");
        if !self.renderer.begin_frame(&self.gfx, &mut self.resource_manager)? {
            return Ok(());
        }

        self.renderer.begin_render_to_texture(&self.gfx);
        {
            let _span = tracy_client::span!("Layers::on_render");
            let mut ctx = RenderContext {
                renderer: &self.renderer,
                resource_manager: &self.resource_manager,
                scene: &self.scene,
                assets: &self.assets,
                camera: &self.camera,
            };
            for layer in self.layers.layers_mut() {
                layer.on_render(&mut ctx);
            }
        }
        self.renderer.end_render_to_texture(&self.gfx);

        self.renderer.begin_render_to_swapchain(&self.gfx);
        {
            let _span = tracy_client::span!("Layers::on_overlay");
            let mut ctx = RenderContext {
                renderer: &self.renderer,
                resource_manager: &self.resource_manager,
                scene: &self.scene,
                assets: &self.assets,
                camera: &self.camera,
            };
            for layer in self.layers.layers_mut() {
                layer.on_overlay(&mut ctx);
            }
        }
        self.renderer.end_render_to_swapchain(&self.gfx);

        self.renderer.end_frame(&self.gfx)
    }

    fn apply_transitions(&mut self, transitions: Vec<(usize, Box<dyn Layer>)>) {
        for (index, next) in transitions {
            let Some(mut prev) = self.layers.replace(index, next) else {
                continue;
            };
            let mut ctx = LayerContext::new(
                &mut self.scene,
                &mut self.assets,
                &mut self.resource_manager,
                &self.input,
                &mut self.camera,
                self.project.as_ref(),
                self.renderer.frame_id(),
            );
            prev.on_detach(&mut ctx);
            self.layers.layers_mut()[index].on_attach(&mut ctx);
            self.exit_requested |= ctx.exit_requested();
        }
    }
}
// destroy
impl RenderApp {
    pub fn destroy(mut self) {
        let _span = tracy_client::span!("RenderApp::destroy");
        if let Err(e) = self.gfx.wait_idle() {
            log::error!("{e:#}");
        }

        let frame_id = self.renderer.frame_id();
        while let Some(mut layer) = self.layers.pop() {
            let mut ctx = LayerContext::new(
                &mut self.scene,
                &mut self.assets,
                &mut self.resource_manager,
                &self.input,
                &mut self.camera,
                self.project.as_ref(),
                frame_id,
            );
            layer.on_detach(&mut ctx);
        }

        self.scene.destroy(&mut self.resource_manager, frame_id);
        self.assets.destroy(&mut self.resource_manager, frame_id);
        // device 已经 idle，延迟队列中的资源可以立即销毁
        self.resource_manager.destroy();
        self.renderer.destroy(&self.gfx);
        self.gfx.destroy();
    }
}
