use ash::vk;
use ember_app::layer::Layer;
use ember_app::render_app::RenderApp;
use ember_crate_tools::config::EmberConfig;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;
use winit::{
    application::ApplicationHandler,
    event::{StartCause, WindowEvent},
    event_loop::ActiveEventLoop,
    window::WindowId,
};

use crate::winit_event_adapter::WinitEventAdapter;

pub struct WinitApp {
    config: EmberConfig,
    /// resumed 之前暂存，RenderApp 创建后依次压入
    pending_layers: Vec<Box<dyn Layer>>,

    render_app: Option<RenderApp>,
    window: Option<Window>,
}
// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口
    pub fn run(layers: Vec<Box<dyn Layer>>) -> anyhow::Result<()> {
        RenderApp::init_env();

        let config = EmberConfig::load_workspace_default();
        let event_loop = winit::event_loop::EventLoop::new()?;

        let mut app = Self {
            config,
            pending_layers: layers,
            render_app: None,
            window: None,
        };

        let result = event_loop.run_app(&mut app);
        log::info!("end run.");
        app.destroy();

        Ok(result?)
    }
}
// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化 RenderApp 并压入 layer
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attr = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(self.config.window_width, self.config.window_height));
        let window = event_loop.create_window(window_attr)?;

        let size = window.inner_size();
        let mut render_app = RenderApp::new(
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
            &self.config,
        )?;
        for layer in self.pending_layers.drain(..) {
            render_app.push_layer(layer);
        }

        self.render_app = Some(render_app);
        self.window = Some(window);
        Ok(())
    }
}
// destroy
impl WinitApp {
    fn destroy(mut self) {
        if let Some(render_app) = self.render_app.take() {
            render_app.destroy();
        }
        self.window = None;
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {}

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init_after_window(event_loop) {
            log::error!("{e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(render_app) = self.render_app.as_mut() else {
            return;
        };

        if let Some(input_event) = WinitEventAdapter::from_winit_event(&event) {
            render_app.push_event(input_event);
        }

        if let WindowEvent::RedrawRequested = event {
            if let Err(e) = render_app.tick() {
                log::error!("{e:#}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.render_app.as_ref().is_some_and(RenderApp::exit_requested) {
            event_loop.exit();
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }

    fn memory_warning(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("memory warning");
    }
}
