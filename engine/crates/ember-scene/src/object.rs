use ember_asset::{
    asset::{Asset, AssetId},
    asset_store::AssetStore,
};

use crate::{
    component::{AssetRef, Component, ComponentKind, ComponentType},
    ecs::Ecs,
    entity::Entity,
    transform::Transform,
};

/// 场景中的一个具名物体
///
/// 数据都在 [`Ecs`] 中，这里只记录实体以及编辑器需要的名字和可见性
#[derive(Clone, Debug)]
pub struct Object {
    entity: Entity,
    name: String,
    visible: bool,
}
// new & init
impl Object {
    /// 创建实体，并自动添加一个 Transform
    pub fn new(ecs: &mut Ecs, name: impl Into<String>) -> Self {
        let entity = ecs.create_entity();
        ecs.add(entity, Transform::default());
        Self {
            entity,
            name: name.into(),
            visible: true,
        }
    }
}
// getters
impl Object {
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
// ecs forwarding
impl Object {
    pub fn add_component<'a>(&self, ecs: &'a mut Ecs, component: Component) -> Option<&'a mut Component> {
        ecs.add_component(self.entity, component)
    }

    pub fn add<'a, T: ComponentType>(&self, ecs: &'a mut Ecs, component: T) -> Option<&'a mut T> {
        ecs.add(self.entity, component)
    }

    pub fn add_asset_component<A: Asset>(&self, ecs: &mut Ecs, asset_id: AssetId) {
        ecs.add_asset_component::<A>(self.entity, asset_id)
    }

    pub fn has_component<T: ComponentType>(&self, ecs: &Ecs) -> bool {
        ecs.has_component::<T>(self.entity)
    }

    pub fn has_components(&self, ecs: &Ecs, kinds: &[ComponentKind]) -> bool {
        ecs.has_components(self.entity, kinds)
    }

    pub fn get_component<'a, T: ComponentType>(&self, ecs: &'a Ecs) -> Option<&'a T> {
        ecs.get_component::<T>(self.entity)
    }

    pub fn get_component_mut<'a, T: ComponentType>(&self, ecs: &'a mut Ecs) -> Option<&'a mut T> {
        ecs.get_component_mut::<T>(self.entity)
    }

    pub fn get_asset_component<'a, A: Asset>(&self, ecs: &Ecs, store: &'a AssetStore) -> Option<&'a A> {
        ecs.get_asset_component::<A>(self.entity, store)
    }

    pub fn get_all_assets(&self, ecs: &Ecs) -> Vec<AssetRef> {
        ecs.get_all_entity_assets(self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_object_has_transform() {
        let mut ecs = Ecs::new();
        let obj = Object::new(&mut ecs, "Cube");
        assert_eq!(obj.name(), "Cube");
        assert!(obj.is_visible());
        assert!(obj.has_component::<Transform>(&ecs));
        assert_eq!(obj.get_component::<Transform>(&ecs), Some(&Transform::default()));
        // Transform 已存在，重复添加失败
        assert!(obj.add(&mut ecs, Transform::default()).is_none());
    }
}
