use ember_asset::{
    asset::{Asset, AssetId, AssetKind},
    asset_store::AssetStore,
};
use indexmap::IndexMap;

use crate::{
    component::{AssetRef, Component, ComponentKind, ComponentSlot, ComponentType},
    entity::Entity,
};

#[derive(Default)]
struct EntityRecord {
    components: Vec<Component>,
    /// 每种资产类型最多一个引用，保持插入顺序
    assets: IndexMap<AssetKind, AssetId>,
}

/// 实体组件存储
///
/// 组件由实体独占，资产只记录 id，访问时通过 [`AssetStore`] 解析
#[derive(Default)]
pub struct Ecs {
    entities: IndexMap<Entity, EntityRecord>,
}
// entity
impl Ecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity::new();
        self.entities.insert(entity, EntityRecord::default());
        entity
    }

    /// 返回实体独占的组件，调用方负责释放其中的 GPU 资源
    pub fn destroy_entity(&mut self, entity: Entity) -> Option<Vec<Component>> {
        match self.entities.shift_remove(&entity) {
            Some(record) => Some(record.components),
            None => {
                log::error!("Entity {} does not exist.", entity);
                None
            }
        }
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        let record = self.entities.get(&entity);
        if record.is_none() {
            log::error!("Entity {} does not exist.", entity);
        }
        record
    }

    fn record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        let record = self.entities.get_mut(&entity);
        if record.is_none() {
            log::error!("Entity {} does not exist.", entity);
        }
        record
    }
}
// owned components
impl Ecs {
    /// 实体不存在或者已经有同类组件时返回 None
    pub fn add_component(&mut self, entity: Entity, component: Component) -> Option<&mut Component> {
        let record = self.record_mut(entity)?;
        let kind = component.kind();
        if record.components.iter().any(|c| c.kind() == kind) {
            log::error!("Component {:?} already exists on entity: {}", kind, entity);
            return None;
        }
        record.components.push(component);
        record.components.last_mut()
    }

    pub fn add<T: ComponentType>(&mut self, entity: Entity, component: T) -> Option<&mut T> {
        self.add_component(entity, component.into_component()).and_then(T::from_component_mut)
    }

    pub fn has_component<T: ComponentType>(&self, entity: Entity) -> bool {
        self.has_components(entity, &[T::KIND])
    }

    /// 所有 kind 都存在时返回 true
    pub fn has_components(&self, entity: Entity, kinds: &[ComponentKind]) -> bool {
        let Some(record) = self.record(entity) else {
            return false;
        };
        kinds.iter().all(|kind| record.components.iter().any(|c| c.kind() == *kind))
    }

    pub fn get_component<T: ComponentType>(&self, entity: Entity) -> Option<&T> {
        let component = self.record(entity)?.components.iter().find_map(T::from_component);
        if component.is_none() {
            log::error!("Component {:?} does not exist on entity: {}", T::KIND, entity);
        }
        component
    }

    pub fn get_component_mut<T: ComponentType>(&mut self, entity: Entity) -> Option<&mut T> {
        let component = self.record_mut(entity)?.components.iter_mut().find_map(T::from_component_mut);
        if component.is_none() {
            log::error!("Component {:?} does not exist on entity: {}", T::KIND, entity);
        }
        component
    }

    /// 不记录日志的查询，用于可选组件
    pub fn try_get_component<T: ComponentType>(&self, entity: Entity) -> Option<&T> {
        self.entities.get(&entity)?.components.iter().find_map(T::from_component)
    }

    /// 独占组件在前，共享引用在后，各自保持插入顺序
    pub fn slots(&self, entity: Entity) -> Vec<ComponentSlot<'_>> {
        let Some(record) = self.record(entity) else {
            return Vec::new();
        };
        record
            .components
            .iter()
            .map(ComponentSlot::Owned)
            .chain(record.assets.iter().map(|(kind, id)| ComponentSlot::SharedRef(AssetRef { kind: *kind, id: *id })))
            .collect()
    }
}
// shared assets
impl Ecs {
    /// 同类型的旧引用会被替换
    pub fn add_asset_component<A: Asset>(&mut self, entity: Entity, asset_id: AssetId) {
        let Some(record) = self.record_mut(entity) else {
            return;
        };
        if let Some(old) = record.assets.insert(A::KIND, asset_id) {
            log::debug!("entity {} replaces {:?} asset {} with {}", entity, A::KIND, old, asset_id);
        }
    }

    pub fn asset_id_of(&self, entity: Entity, kind: AssetKind) -> Option<AssetId> {
        self.entities.get(&entity)?.assets.get(&kind).copied()
    }

    /// 每次调用都经过 store 查找
    pub fn get_asset_component<'a, A: Asset>(&self, entity: Entity, store: &'a AssetStore) -> Option<&'a A> {
        let id = *self.record(entity)?.assets.get(&A::KIND)?;
        store.get::<A>(id)
    }

    pub fn get_all_entity_assets(&self, entity: Entity) -> Vec<AssetRef> {
        let Some(record) = self.record(entity) else {
            return Vec::new();
        };
        record.assets.iter().map(|(kind, id)| AssetRef { kind: *kind, id: *id }).collect()
    }
}
