//! 共享资产
//!
//! 资产拥有唯一的 [`asset::AssetId`]，由 [`asset_store::AssetStore`] 独占，并以路径去重。
//! 实体通过 id 引用资产，每次访问都经过 store 查找。
//!
//! mesh 和 texture 在 `load` 时完成 CPU 解码，在 `flush_uploads` 时上传到 GPU。

pub mod asset;
pub mod asset_store;
pub mod material;
pub mod mesh;
pub mod texture;
