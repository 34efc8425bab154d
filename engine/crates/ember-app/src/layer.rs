use ember_asset::asset_store::AssetStore;
use ember_platform::event_queue::EventHandler;
use ember_platform::input_state::InputState;
use ember_render_interface::gfx_resource_manager::GfxResourceManager;
use ember_renderer::renderer::Renderer;
use ember_scene::camera::Camera;
use ember_scene::project::Project;
use ember_scene::scene::Scene;

/// 更新阶段 layer 可以访问的数据
pub struct LayerContext<'a> {
    pub scene: &'a mut Scene,
    pub assets: &'a mut AssetStore,
    pub resource_manager: &'a mut GfxResourceManager,
    pub input: &'a InputState,
    pub camera: &'a mut Camera,
    pub project: Option<&'a Project>,
    /// 用于延迟销毁 GPU 资源
    pub frame_id: u64,

    exit_requested: bool,
    transition: Option<Box<dyn Layer>>,
}
impl<'a> LayerContext<'a> {
    pub fn new(
        scene: &'a mut Scene,
        assets: &'a mut AssetStore,
        resource_manager: &'a mut GfxResourceManager,
        input: &'a InputState,
        camera: &'a mut Camera,
        project: Option<&'a Project>,
        frame_id: u64,
    ) -> Self {
        Self {
            scene,
            assets,
            resource_manager,
            input,
            camera,
            project,
            frame_id,
            exit_requested: false,
            transition: None,
        }
    }

    /// 当前 tick 结束后退出
    #[inline]
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// 在当前帧结束后用 `layer` 替换发起请求的 layer
    ///
    /// 同一个 tick 内多次调用时，只有最后一次生效
    pub fn transition_to(&mut self, layer: Box<dyn Layer>) {
        if let Some(prev) = self.transition.replace(layer) {
            log::warn!("layer transition to {} overridden", prev.name());
        }
    }

    #[inline]
    pub fn take_transition(&mut self) -> Option<Box<dyn Layer>> {
        self.transition.take()
    }
}

/// 录制阶段 layer 可以访问的数据，此时 renderer 已经打开了某个 pass
pub struct RenderContext<'a> {
    pub renderer: &'a Renderer,
    pub resource_manager: &'a GfxResourceManager,
    pub scene: &'a Scene,
    pub assets: &'a AssetStore,
    pub camera: &'a Camera,
}

/// 应用由若干 layer 叠加而成
///
/// 事件从最上层开始传递，更新和绘制从最下层开始
pub trait Layer: EventHandler {
    fn name(&self) -> &str;

    fn on_attach(&mut self, _ctx: &mut LayerContext) {}

    fn on_update(&mut self, _delta_time: f32, _ctx: &mut LayerContext) {}

    /// 离屏 pass 内的绘制
    fn on_render(&mut self, _ctx: &mut RenderContext) {}

    /// swapchain pass 内、合成之后的绘制
    fn on_overlay(&mut self, _ctx: &mut RenderContext) {}

    fn on_detach(&mut self, _ctx: &mut LayerContext) {}
}

/// 最后一个元素是最上层
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
}
impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: Box<dyn Layer>) {
        log::info!("push layer: {}", layer.name());
        self.layers.push(layer);
    }

    pub fn pop(&mut self) -> Option<Box<dyn Layer>> {
        let layer = self.layers.pop()?;
        log::info!("pop layer: {}", layer.name());
        Some(layer)
    }

    /// 替换 `index` 处的 layer，返回被替换的 layer
    pub fn replace(&mut self, index: usize, layer: Box<dyn Layer>) -> Option<Box<dyn Layer>> {
        let slot = self.layers.get_mut(index)?;
        log::info!("transition layer: {} -> {}", slot.name(), layer.name());
        Some(std::mem::replace(slot, layer))
    }

    #[inline]
    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    #[inline]
    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ember_platform::event_queue::EventQueue;
    use ember_platform::input_event::{Event, KeyCode};

    use super::*;

    struct RecordLayer {
        name: &'static str,
        consume: bool,
        log: Rc<RefCell<Vec<String>>>,
    }
    impl EventHandler for RecordLayer {
        fn on_event(&mut self, event: &Event) -> bool {
            self.log.borrow_mut().push(format!("{}:{:?}", self.name, event));
            self.consume
        }
    }
    impl Layer for RecordLayer {
        fn name(&self) -> &str {
            self.name
        }

        fn on_update(&mut self, _delta_time: f32, ctx: &mut LayerContext) {
            self.log.borrow_mut().push(format!("{}:update", self.name));
            if self.consume {
                ctx.request_exit();
            }
        }
    }

    fn record_layer(name: &'static str, consume: bool, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Layer> {
        Box::new(RecordLayer {
            name,
            consume,
            log: log.clone(),
        })
    }

    #[test]
    fn test_events_reach_top_layer_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.push(record_layer("base", false, &log));
        stack.push(record_layer("overlay", true, &log));

        let queue = EventQueue::new();
        queue.push(Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        });
        assert_eq!(queue.drain_into(stack.layers_mut(), |_| {}), 1);

        // overlay 处理了事件，base 看不到
        assert_eq!(*log.borrow(), vec!["overlay:KeyPressed { key: KeyW, repeat: false }".to_string()]);
    }

    #[test]
    fn test_unhandled_event_falls_through() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.push(record_layer("base", false, &log));
        stack.push(record_layer("overlay", false, &log));

        let queue = EventQueue::new();
        queue.push(Event::WindowClose);
        queue.drain_into(stack.layers_mut(), |_| {});

        assert_eq!(*log.borrow(), vec!["overlay:WindowClose".to_string(), "base:WindowClose".to_string()]);
    }

    #[test]
    fn test_replace_and_pop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.push(record_layer("a", false, &log));
        stack.push(record_layer("b", false, &log));

        let old = stack.replace(0, record_layer("c", false, &log)).unwrap();
        assert_eq!(old.name(), "a");
        assert!(stack.replace(5, record_layer("d", false, &log)).is_none());

        let names: Vec<&str> = stack.layers().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["c", "b"]);

        assert_eq!(stack.pop().unwrap().name(), "b");
        assert_eq!(stack.len(), 1);
        assert!(!stack.is_empty());
    }

    #[test]
    fn test_context_exit_and_transition() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = Scene::new();
        let mut assets = AssetStore::new();
        let mut rm = GfxResourceManager::new();
        let input = InputState::default();
        let mut camera = Camera::default();

        {
            let mut ctx = LayerContext::new(&mut scene, &mut assets, &mut rm, &input, &mut camera, None, 0);
            let mut layer = record_layer("exit", true, &log);
            layer.on_update(0.016, &mut ctx);
            assert!(ctx.exit_requested());

            assert!(ctx.take_transition().is_none());
            ctx.transition_to(record_layer("first", false, &log));
            ctx.transition_to(record_layer("second", false, &log));
            assert_eq!(ctx.take_transition().unwrap().name(), "second");
            assert!(ctx.take_transition().is_none());
        }

        assert_eq!(*log.borrow(), vec!["exit:update".to_string()]);
        rm.destroy();
    }
}
