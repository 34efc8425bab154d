use ember_asset::asset::AssetId;
use ember_asset::mesh::MeshAsset;
use ember_platform::event_queue::EventHandler;
use ember_platform::input_event::{Event, KeyCode};
use ember_scene::entity::Entity;
use ember_scene::transform::Transform;
use glam::vec3;

use crate::layer::{Layer, LayerContext, RenderContext};

/// 场景编辑器
///
/// - WASD：移动相机
/// - 按住右键拖动：旋转相机
/// - F5：保存工程
#[derive(Default)]
pub struct EditorLayer {
    save_requested: bool,
}
impl EditorLayer {
    const SEED_MESH_FILE: &'static str = "Cube.obj";

    pub fn new() -> Self {
        Self::default()
    }

    /// 在 (0, 0, -3) 处放置一个 cube
    ///
    /// 有工程时 cube 写到 `<root>/Cube.obj` 并按路径加载，保存后可以被恢复
    pub fn seed_scene(ctx: &mut LayerContext) -> Option<Entity> {
        let mesh = Self::seed_cube_mesh(ctx);
        let entity = ctx.scene.add_object("Cube");
        let (object, ecs) = ctx.scene.object_and_ecs_mut(entity)?;
        *object.get_component_mut::<Transform>(ecs)? = Transform::from_position(vec3(0.0, 0.0, -3.0));
        object.add_asset_component::<MeshAsset>(ecs, mesh);
        Some(entity)
    }

    fn seed_cube_mesh(ctx: &mut LayerContext) -> AssetId {
        let Some(project) = ctx.project else {
            return ctx.assets.create(MeshAsset::cube());
        };
        let path = project.root().join(Self::SEED_MESH_FILE);
        if !path.exists() {
            if let Err(e) = MeshAsset::cube().write_obj(&path) {
                log::error!("{e:#}");
                return ctx.assets.create(MeshAsset::cube());
            }
        }
        match ctx.assets.load::<MeshAsset>(&path) {
            Some(id) => id,
            None => ctx.assets.create(MeshAsset::cube()),
        }
    }

    fn restore_project(ctx: &mut LayerContext) -> usize {
        let Some(project) = ctx.project else {
            return 0;
        };
        if !project.content_path().exists() {
            return 0;
        }
        match project.restore(ctx.scene, ctx.assets) {
            Ok(count) => count,
            Err(e) => {
                log::error!("{e:#}");
                0
            }
        }
    }

    fn update_camera(delta_time: f32, ctx: &mut LayerContext) {
        let input = ctx.input;
        let camera = &mut *ctx.camera;

        let (front, right) = (camera.front(), camera.right());
        let moves = [
            (KeyCode::KeyW, front),
            (KeyCode::KeyS, -front),
            (KeyCode::KeyA, -right),
            (KeyCode::KeyD, right),
        ];
        for (key, direction) in moves {
            if input.is_key_pressed(key) {
                camera.move_by(direction, delta_time);
            }
        }

        if input.is_right_button_pressed() {
            let [dx, dy] = input.mouse_delta();
            if dx != 0.0 || dy != 0.0 {
                camera.rotate(dx as f32, dy as f32, delta_time);
            }
        }
    }
}
impl EventHandler for EditorLayer {
    fn on_event(&mut self, event: &Event) -> bool {
        match *event {
            Event::KeyPressed {
                key: KeyCode::F5,
                repeat: false,
            } => {
                self.save_requested = true;
                true
            }
            _ => false,
        }
    }
}
impl Layer for EditorLayer {
    fn name(&self) -> &str {
        "Editor"
    }

    fn on_attach(&mut self, ctx: &mut LayerContext) {
        let restored = Self::restore_project(ctx);
        if restored > 0 {
            log::info!("restored {} objects", restored);
            return;
        }
        if Self::seed_scene(ctx).is_none() {
            log::error!("failed to seed editor scene");
        }
    }

    fn on_update(&mut self, delta_time: f32, ctx: &mut LayerContext) {
        Self::update_camera(delta_time, ctx);

        if std::mem::take(&mut self.save_requested) {
            match ctx.project {
                Some(project) => {
                    if let Err(e) = project.save(ctx.scene, ctx.assets) {
                        log::error!("{e:#}");
                    }
                }
                None => log::warn!("no project configured, nothing saved"),
            }
        }
    }

    fn on_render(&mut self, ctx: &mut RenderContext) {
        let _span = tracy_client::span!("EditorLayer::on_render");
        for drawable in ctx.scene.drawables(ctx.assets) {
            ctx.renderer.push_object_constants(drawable.model, drawable.material.base_color());
            ctx.renderer.draw_mesh(&drawable.mesh, ctx.resource_manager);
        }
    }
}

#[cfg(test)]
mod tests {
    use ember_asset::asset_store::AssetStore;
    use ember_platform::input_event::MouseButton;
    use ember_platform::input_state::InputState;
    use ember_render_interface::gfx_resource_manager::GfxResourceManager;
    use ember_scene::camera::Camera;
    use ember_scene::project::Project;
    use ember_scene::scene::Scene;
    use glam::Vec3;

    use super::*;

    struct Fixture {
        scene: Scene,
        assets: AssetStore,
        rm: GfxResourceManager,
        input: InputState,
        camera: Camera,
    }
    impl Fixture {
        fn new() -> Self {
            Self {
                scene: Scene::new(),
                assets: AssetStore::new(),
                rm: GfxResourceManager::new(),
                input: InputState::default(),
                camera: Camera::default(),
            }
        }

        fn ctx<'a>(&'a mut self, project: Option<&'a Project>) -> LayerContext<'a> {
            LayerContext::new(
                &mut self.scene,
                &mut self.assets,
                &mut self.rm,
                &self.input,
                &mut self.camera,
                project,
                0,
            )
        }

        fn destroy(self) {
            self.rm.destroy();
        }
    }

    #[test]
    fn test_attach_seeds_cube() {
        let mut fx = Fixture::new();
        let mut layer = EditorLayer::new();
        layer.on_attach(&mut fx.ctx(None));

        assert_eq!(fx.scene.objects().len(), 1);
        let object = &fx.scene.objects()[0];
        assert_eq!(object.name(), "Cube");
        let transform = object.get_component::<Transform>(fx.scene.ecs()).unwrap();
        assert_eq!(transform.position, vec3(0.0, 0.0, -3.0));
        assert!(object.get_asset_component::<MeshAsset>(fx.scene.ecs(), &fx.assets).is_some());
        assert_eq!(fx.assets.len(), 1);

        // mesh 尚未上传，不产生 drawable
        assert!(fx.scene.drawables(&fx.assets).is_empty());
        fx.destroy();
    }

    #[test]
    fn test_f5_is_consumed_once() {
        let mut layer = EditorLayer::new();
        assert!(layer.on_event(&Event::KeyPressed {
            key: KeyCode::F5,
            repeat: false,
        }));
        assert!(!layer.on_event(&Event::KeyPressed {
            key: KeyCode::F5,
            repeat: true,
        }));
        assert!(!layer.on_event(&Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        }));

        let mut fx = Fixture::new();
        layer.on_update(0.0, &mut fx.ctx(None));
        assert!(!layer.save_requested);
        fx.destroy();
    }

    #[test]
    fn test_wasd_moves_camera() {
        let mut fx = Fixture::new();
        fx.input.on_event(&Event::KeyPressed {
            key: KeyCode::KeyW,
            repeat: false,
        });
        let mut layer = EditorLayer::new();
        layer.on_update(1.0, &mut fx.ctx(None));
        // 默认朝向 -Z，速度 5
        assert!(fx.camera.position.abs_diff_eq(vec3(0.0, 0.0, -5.0), 1e-5));

        fx.input.on_event(&Event::KeyReleased { key: KeyCode::KeyW });
        fx.input.on_event(&Event::KeyPressed {
            key: KeyCode::KeyD,
            repeat: false,
        });
        layer.on_update(0.5, &mut fx.ctx(None));
        assert!(fx.camera.position.abs_diff_eq(vec3(2.5, 0.0, -5.0), 1e-5));
        fx.destroy();
    }

    #[test]
    fn test_rotation_needs_right_button() {
        let mut fx = Fixture::new();
        let mut layer = EditorLayer::new();
        fx.input.on_event(&Event::MouseMoved { x: 0.0, y: 0.0 });
        fx.input.on_event(&Event::MouseMoved { x: 10.0, y: 0.0 });
        layer.on_update(0.01, &mut fx.ctx(None));
        assert!(fx.camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));

        fx.input.on_event(&Event::MouseButtonPressed {
            button: MouseButton::Right,
        });
        layer.on_update(0.01, &mut fx.ctx(None));
        assert!(!fx.camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-3));
        fx.destroy();
    }

    #[test]
    fn test_seeded_cube_survives_save_and_restore() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let project = Project::load(dir.join("demo.ember")).unwrap();

        let mut fx = Fixture::new();
        let mut layer = EditorLayer::new();
        layer.on_attach(&mut fx.ctx(Some(&project)));
        assert!(dir.join("Cube.obj").exists());
        layer.on_event(&Event::KeyPressed {
            key: KeyCode::F5,
            repeat: false,
        });
        layer.on_update(0.0, &mut fx.ctx(Some(&project)));
        fx.destroy();

        let records = project.read_content().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asset_paths, vec!["Cube.obj".to_string()]);

        let mut fx = Fixture::new();
        EditorLayer::new().on_attach(&mut fx.ctx(Some(&project)));
        assert_eq!(fx.scene.objects().len(), 1);
        let object = &fx.scene.objects()[0];
        assert_eq!(object.name(), "Cube");
        let mesh = object.get_asset_component::<MeshAsset>(fx.scene.ecs(), &fx.assets).unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        fx.destroy();

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_and_restore_through_project() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tri.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let project = Project::load(dir.join("demo.ember")).unwrap();

        let mut fx = Fixture::new();
        {
            let mut ctx = fx.ctx(Some(&project));
            let mesh = ctx.assets.load::<MeshAsset>(dir.join("tri.obj")).unwrap();
            let entity = ctx.scene.add_object("Tri");
            let (object, ecs) = ctx.scene.object_and_ecs_mut(entity).unwrap();
            object.get_component_mut::<Transform>(ecs).unwrap().position = vec3(1.0, 2.0, 3.0);
            object.add_asset_component::<MeshAsset>(ecs, mesh);
        }
        let mut layer = EditorLayer::new();
        layer.on_event(&Event::KeyPressed {
            key: KeyCode::F5,
            repeat: false,
        });
        layer.on_update(0.0, &mut fx.ctx(Some(&project)));
        assert!(project.content_path().exists());
        fx.destroy();

        // 有内容时不再放置默认 cube
        let mut fx = Fixture::new();
        EditorLayer::new().on_attach(&mut fx.ctx(Some(&project)));
        assert_eq!(fx.scene.objects().len(), 1);
        assert_eq!(fx.scene.objects()[0].name(), "Tri");
        fx.destroy();

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
