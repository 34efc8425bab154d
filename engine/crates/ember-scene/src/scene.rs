use ember_asset::{
    asset::AssetKind,
    asset_store::AssetStore,
    material::MaterialAsset,
    mesh::{GpuMesh, MeshAsset},
};
use ember_render_interface::gfx_resource_manager::GfxResourceManager;
use glam::Mat4;

use crate::{component::Component, ecs::Ecs, entity::Entity, object::Object, transform::Transform};

/// 一次绘制需要的全部数据
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Drawable {
    pub entity: Entity,
    pub mesh: GpuMesh,
    pub model: Mat4,
    pub material: MaterialAsset,
}

/// 持有 [`Ecs`] 以及有序的物体列表
#[derive(Default)]
pub struct Scene {
    ecs: Ecs,
    objects: Vec<Object>,
}
// new & init
impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, name: impl Into<String>) -> Entity {
        let object = Object::new(&mut self.ecs, name);
        let entity = object.entity();
        self.objects.push(object);
        entity
    }

    /// 返回实体独占的组件，需要交给 [`release_components`] 释放
    pub fn remove_object(&mut self, entity: Entity) -> Option<Vec<Component>> {
        let Some(idx) = self.objects.iter().position(|o| o.entity() == entity) else {
            log::error!("object {} is not in the scene", entity);
            return None;
        };
        self.objects.remove(idx);
        self.ecs.destroy_entity(entity)
    }

    /// 移除所有物体，GPU 资源延迟到 `frame_id` 对应的帧结束后销毁
    pub fn clear(&mut self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        let entities: Vec<Entity> = self.objects.iter().map(|o| o.entity()).collect();
        for entity in entities {
            if let Some(components) = self.remove_object(entity) {
                release_components(components, resource_manager, frame_id);
            }
        }
    }

    pub fn destroy(mut self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        self.clear(resource_manager, frame_id);
    }
}
// getters
impl Scene {
    #[inline]
    pub fn ecs(&self) -> &Ecs {
        &self.ecs
    }

    #[inline]
    pub fn ecs_mut(&mut self) -> &mut Ecs {
        &mut self.ecs
    }

    #[inline]
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, entity: Entity) -> Option<&Object> {
        self.objects.iter().find(|o| o.entity() == entity)
    }

    pub fn object_mut(&mut self, entity: Entity) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| o.entity() == entity)
    }

    /// 同时借用 object 和 ecs
    pub fn object_and_ecs_mut(&mut self, entity: Entity) -> Option<(&Object, &mut Ecs)> {
        let object = self.objects.iter().find(|o| o.entity() == entity)?;
        Some((object, &mut self.ecs))
    }
}
// render data
impl Scene {
    /// 收集所有可见且有 GPU mesh 的物体
    ///
    /// mesh：自己持有的优先，其次是共享资产，尚未上传完成的会被跳过。
    /// material：共享资产优先，其次是自己持有的，都没有则使用默认值。
    pub fn drawables(&self, store: &AssetStore) -> Vec<Drawable> {
        let _span = tracy_client::span!("Scene::drawables");
        self.objects
            .iter()
            .filter(|o| o.is_visible())
            .filter_map(|object| {
                let entity = object.entity();
                let mesh = self.resolve_mesh(entity, store)?;
                let model = self
                    .ecs
                    .try_get_component::<Transform>(entity)
                    .map(Transform::model_matrix)
                    .unwrap_or(Mat4::IDENTITY);
                Some(Drawable {
                    entity,
                    mesh,
                    model,
                    material: self.resolve_material(entity, store),
                })
            })
            .collect()
    }

    fn resolve_mesh(&self, entity: Entity, store: &AssetStore) -> Option<GpuMesh> {
        if let Some(mesh) = self.ecs.try_get_component::<GpuMesh>(entity) {
            return Some(*mesh);
        }
        let id = self.ecs.asset_id_of(entity, AssetKind::Mesh)?;
        store.get::<MeshAsset>(id)?.gpu().copied()
    }

    fn resolve_material(&self, entity: Entity, store: &AssetStore) -> MaterialAsset {
        self.ecs
            .asset_id_of(entity, AssetKind::Material)
            .and_then(|id| store.get::<MaterialAsset>(id))
            .or_else(|| self.ecs.try_get_component::<MaterialAsset>(entity))
            .copied()
            .unwrap_or_default()
    }
}

/// 释放实体独占组件中的 GPU 资源
pub fn release_components(components: Vec<Component>, resource_manager: &mut GfxResourceManager, frame_id: u64) {
    for component in components {
        if let Component::Mesh(mesh) = component {
            mesh.release(resource_manager, frame_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use ember_render_interface::handles::GfxBufferHandle;
    use glam::Vec3;

    use super::*;

    fn fake_gpu_mesh() -> GpuMesh {
        GpuMesh {
            vertex_buffer: GfxBufferHandle::default(),
            index_buffer: GfxBufferHandle::default(),
            index_count: 36,
        }
    }

    #[test]
    fn test_add_and_remove_objects_keeps_order() {
        let mut scene = Scene::new();
        let a = scene.add_object("a");
        let b = scene.add_object("b");
        let c = scene.add_object("c");
        assert!(scene.remove_object(b).is_some());
        assert!(scene.remove_object(b).is_none());
        let names: Vec<&str> = scene.objects().iter().map(|o| o.name()).collect();
        assert_eq!(names, ["a", "c"]);
        assert!(scene.ecs().contains(a) && scene.ecs().contains(c));
        assert!(!scene.ecs().contains(b));
    }

    #[test]
    fn test_drawables_filter_visible_with_mesh() {
        let store = AssetStore::new();
        let mut scene = Scene::new();

        let cube = scene.add_object("cube");
        scene.ecs_mut().add(cube, fake_gpu_mesh());
        scene.ecs_mut().get_component_mut::<Transform>(cube).unwrap().position = Vec3::new(0.0, 0.0, -3.0);

        let hidden = scene.add_object("hidden");
        scene.ecs_mut().add(hidden, fake_gpu_mesh());
        scene.object_mut(hidden).unwrap().set_visible(false);

        scene.add_object("empty");

        let drawables = scene.drawables(&store);
        assert_eq!(drawables.len(), 1);
        assert_eq!(drawables[0].entity, cube);
        assert_eq!(drawables[0].mesh.index_count, 36);
        assert_eq!(drawables[0].model, Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)));
        assert_eq!(drawables[0].material, MaterialAsset::default());
    }

    #[test]
    fn test_material_resolution_order() {
        let mut store = AssetStore::new();
        let shared = store.create(MaterialAsset {
            diffuse: Vec3::X,
            ..Default::default()
        });

        let mut scene = Scene::new();
        let e = scene.add_object("cube");
        scene.ecs_mut().add(e, fake_gpu_mesh());
        scene.ecs_mut().add(e, MaterialAsset {
            diffuse: Vec3::Y,
            ..Default::default()
        });
        assert_eq!(scene.drawables(&store)[0].material.diffuse, Vec3::Y);

        scene.ecs_mut().add_asset_component::<MaterialAsset>(e, shared);
        assert_eq!(scene.drawables(&store)[0].material.diffuse, Vec3::X);
    }

    #[test]
    fn test_shared_mesh_waits_for_upload() {
        let mut store = AssetStore::new();
        let mesh = store.create(MeshAsset::cube());
        let mut scene = Scene::new();
        let e = scene.add_object("cube");
        scene.ecs_mut().add_asset_component::<MeshAsset>(e, mesh);
        assert!(scene.drawables(&store).is_empty());
    }

    #[test]
    fn test_clear_releases_owned_meshes() {
        let mut rm = GfxResourceManager::new();
        let mut scene = Scene::new();
        let e = scene.add_object("cube");
        scene.ecs_mut().add(e, fake_gpu_mesh());
        scene.clear(&mut rm, 0);
        assert!(scene.objects().is_empty());
        assert_eq!(rm.pending_count(), 2);
        rm.destroy();
    }
}
