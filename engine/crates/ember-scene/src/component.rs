use ember_asset::{
    asset::{AssetId, AssetKind},
    material::MaterialAsset,
    mesh::GpuMesh,
};

use crate::transform::Transform;

/// 实体独占的组件
///
/// 每个实体的每种组件最多一个
#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    Transform(Transform),
    /// 实体自己的材质参数，不与其他实体共享
    Material(MaterialAsset),
    /// 实体自己持有的 GPU mesh，实体销毁时需要释放
    Mesh(GpuMesh),
}
impl Component {
    #[inline]
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Transform(_) => ComponentKind::Transform,
            Self::Material(_) => ComponentKind::Material,
            Self::Mesh(_) => ComponentKind::Mesh,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transform,
    Material,
    Mesh,
}

/// 组件的具体类型与 [`Component`] 之间的转换
pub trait ComponentType: Sized {
    const KIND: ComponentKind;

    fn into_component(self) -> Component;
    fn from_component(component: &Component) -> Option<&Self>;
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! impl_component_type {
    ($ty:ty, $variant:ident) => {
        impl ComponentType for $ty {
            const KIND: ComponentKind = ComponentKind::$variant;

            #[inline]
            fn into_component(self) -> Component {
                Component::$variant(self)
            }

            #[inline]
            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$variant(c) => Some(c),
                    _ => None,
                }
            }

            #[inline]
            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$variant(c) => Some(c),
                    _ => None,
                }
            }
        }
    };
}
impl_component_type!(Transform, Transform);
impl_component_type!(MaterialAsset, Material);
impl_component_type!(GpuMesh, Mesh);

/// 实体对共享资产的引用，每次访问都需要经过 AssetStore
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub id: AssetId,
}

/// 实体身上的一个槽位：独占的组件或者共享资产的引用
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ComponentSlot<'a> {
    Owned(&'a Component),
    SharedRef(AssetRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let c = Transform::default().into_component();
        assert_eq!(c.kind(), ComponentKind::Transform);
        assert_eq!(c.kind(), <Transform as ComponentType>::KIND);
        assert!(Transform::from_component(&c).is_some());
        assert!(MaterialAsset::from_component(&c).is_none());
    }

    #[test]
    fn test_mutable_access() {
        let mut c = MaterialAsset::default().into_component();
        MaterialAsset::from_component_mut(&mut c).unwrap().shininess = 4.0;
        assert_eq!(MaterialAsset::from_component(&c).unwrap().shininess, 4.0);
        assert!(GpuMesh::from_component_mut(&mut c).is_none());
    }
}
