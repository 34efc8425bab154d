//! CPU 侧的场景数据
//!
//! - [`ecs::Ecs`]：实体拥有的组件，以及对共享资产的引用
//! - [`scene::Scene`]：有序的 [`object::Object`] 列表，产出每帧的 [`scene::Drawable`]
//! - [`project::Project`]：`.Content` 文件的读写

pub mod camera;
pub mod component;
pub mod ecs;
pub mod entity;
pub mod object;
pub mod project;
pub mod scene;
pub mod transform;
