use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ember_gfx::gfx_context::GfxContext;
use ember_render_interface::gfx_resource_manager::GfxResourceManager;

use crate::asset::{Asset, AssetData, AssetId, LoadStatus};

struct AssetEntry {
    id: AssetId,
    /// 通过 `create` 创建的资产没有路径
    path: Option<PathBuf>,
    status: LoadStatus,
    data: AssetData,
}
impl AssetEntry {
    fn debug_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.id.to_string(),
        }
    }
}

/// 共享资产的唯一所有者
///
/// 同一个路径只会加载一次，之后返回同一个 [`AssetId`]
#[derive(Default)]
pub struct AssetStore {
    entries: Vec<AssetEntry>,
    path_index: HashMap<PathBuf, AssetId>,
}
// new & init
impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件加载，已加载过的路径直接返回之前的 id
    pub fn load<A: Asset>(&mut self, path: impl AsRef<Path>) -> Option<AssetId> {
        let _span = tracy_client::span!("AssetStore::load");
        let path = path.as_ref();
        if let Some(&id) = self.path_index.get(path) {
            let kind = self.entry(id).map(|e| e.data.kind());
            if kind != Some(A::KIND) {
                log::warn!("asset {} is a {:?}, not a {:?}", path.display(), kind, A::KIND);
                return None;
            }
            log::info!("asset already loaded: {}", path.display());
            return Some(id);
        }

        if !A::supports_path(path) {
            log::debug!("no {:?} loader for path: {}", A::KIND, path.display());
            return None;
        }

        let asset = match A::load_from_file(path) {
            Ok(asset) => asset,
            Err(e) => {
                log::error!("failed to load {:?} asset {}: {e:#}", A::KIND, path.display());
                return None;
            }
        };

        let id = self.insert(Some(path.to_path_buf()), asset.into_data());
        self.path_index.insert(path.to_path_buf(), id);
        Some(id)
    }

    /// 注册一个没有路径的资产，例如程序生成的 mesh
    pub fn create<A: Asset>(&mut self, asset: A) -> AssetId {
        self.insert(None, asset.into_data())
    }

    fn insert(&mut self, path: Option<PathBuf>, data: AssetData) -> AssetId {
        let id = AssetId::new();
        let status = if data.needs_upload() { LoadStatus::Uploading } else { LoadStatus::Ready };
        self.entries.push(AssetEntry { id, path, status, data });
        id
    }
}
// getters
impl AssetStore {
    fn entry(&self, id: AssetId) -> Option<&AssetEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get<A: Asset>(&self, id: AssetId) -> Option<&A> {
        let data = self.get_asset_by_id(id)?;
        let asset = A::from_data(data);
        if asset.is_none() {
            log::warn!("asset {} is a {:?}, not a {:?}", id, data.kind(), A::KIND);
        }
        asset
    }

    pub fn get_mut<A: Asset>(&mut self, id: AssetId) -> Option<&mut A> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            log::warn!("asset not found: {}", id);
            return None;
        };
        let kind = entry.data.kind();
        let asset = A::from_data_mut(&mut entry.data);
        if asset.is_none() {
            log::warn!("asset {} is a {:?}, not a {:?}", id, kind, A::KIND);
        }
        asset
    }

    pub fn get_asset_by_id(&self, id: AssetId) -> Option<&AssetData> {
        match self.entry(id) {
            Some(entry) => Some(&entry.data),
            None => {
                log::warn!("asset not found: {}", id);
                None
            }
        }
    }

    pub fn get_asset_path_by_id(&self, id: AssetId) -> Option<&Path> {
        self.entry(id).and_then(|e| e.path.as_deref())
    }

    pub fn status(&self, id: AssetId) -> Option<LoadStatus> {
        self.entry(id).map(|e| e.status)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}
// gpu
impl AssetStore {
    /// 将所有处于 Uploading 的资产上传到 GPU
    ///
    /// 单个资产失败只会标记为 Failed，不影响其他资产
    pub fn flush_uploads(&mut self, ctx: &GfxContext, resource_manager: &mut GfxResourceManager) {
        let _span = tracy_client::span!("AssetStore::flush_uploads");
        for entry in self.entries.iter_mut().filter(|e| e.status == LoadStatus::Uploading) {
            let name = entry.debug_name();
            let result = match &mut entry.data {
                AssetData::Mesh(mesh) => mesh.upload(ctx, resource_manager, &name).map(|_| ()),
                AssetData::Texture(texture) => texture.upload(ctx, resource_manager, &name).map(|_| ()),
                AssetData::Material(_) => Ok(()),
            };
            entry.status = match result {
                Ok(()) => LoadStatus::Ready,
                Err(e) => {
                    log::error!("failed to upload asset {name}: {e:#}");
                    LoadStatus::Failed
                }
            };
        }
    }

    #[inline]
    pub fn has_pending_uploads(&self) -> bool {
        self.entries.iter().any(|e| e.status == LoadStatus::Uploading)
    }

    /// 移除资产，GPU 资源交给 resource manager 延迟销毁
    pub fn unload(&mut self, id: AssetId, resource_manager: &mut GfxResourceManager, frame_id: u64) -> bool {
        let Some(idx) = self.entries.iter().position(|e| e.id == id) else {
            log::warn!("unload: asset not found: {}", id);
            return false;
        };
        let mut entry = self.entries.remove(idx);
        if let Some(path) = &entry.path {
            self.path_index.remove(path);
        }
        Self::release_entry(&mut entry, resource_manager, frame_id);
        true
    }

    pub fn destroy(mut self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        let _span = tracy_client::span!("AssetStore::destroy");
        for mut entry in self.entries.drain(..) {
            Self::release_entry(&mut entry, resource_manager, frame_id);
        }
        self.path_index.clear();
    }

    fn release_entry(entry: &mut AssetEntry, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        match &mut entry.data {
            AssetData::Mesh(mesh) => mesh.release_gpu(resource_manager, frame_id),
            AssetData::Texture(texture) => texture.release_gpu(resource_manager, frame_id),
            AssetData::Material(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{asset::AssetKind, material::MaterialAsset, mesh::MeshAsset, texture::TextureAsset};

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_twice_returns_same_id() {
        let path = temp_file("red.mtl", "Kd 1 0 0\n");
        let mut store = AssetStore::new();
        let a = store.load::<MaterialAsset>(&path).unwrap();
        let b = store.load::<MaterialAsset>(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_asset_path_by_id(a), Some(path.as_path()));
        assert_eq!(store.status(a), Some(LoadStatus::Ready));
    }

    #[test]
    fn test_identical_content_different_paths_are_distinct() {
        let a = temp_file("a.mtl", "Kd 1 0 0\n");
        let b = temp_file("b.mtl", "Kd 1 0 0\n");
        let mut store = AssetStore::new();
        assert_ne!(store.load::<MaterialAsset>(&a), store.load::<MaterialAsset>(&b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unsupported_and_missing_paths() {
        let mut store = AssetStore::new();
        let mtl = temp_file("red.mtl", "Kd 1 0 0\n");
        assert!(store.load::<MeshAsset>(&mtl).is_none());
        let missing = std::env::temp_dir().join(format!("{}.mtl", uuid::Uuid::new_v4()));
        assert!(store.load::<MaterialAsset>(&missing).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_cached_path_of_other_kind_is_rejected() {
        let obj = temp_file("tri.obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        let mut store = AssetStore::new();
        let mesh = store.load::<MeshAsset>(&obj).unwrap();

        assert!(store.load::<MaterialAsset>(&obj).is_none());
        assert!(store.load::<TextureAsset>(&obj).is_none());
        assert_eq!(store.load::<MeshAsset>(&obj), Some(mesh));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_and_typed_get() {
        let mut store = AssetStore::new();
        let cube = store.create(MeshAsset::cube());
        assert_eq!(store.status(cube), Some(LoadStatus::Uploading));
        assert!(store.has_pending_uploads());
        assert_eq!(store.get::<MeshAsset>(cube).map(|m| m.indices.len()), Some(36));
        assert!(store.get::<MaterialAsset>(cube).is_none());
        assert!(store.get_asset_path_by_id(cube).is_none());
        assert_eq!(store.get_asset_by_id(cube).map(|d| d.kind()), Some(AssetKind::Mesh));

        let missing = AssetId::new();
        assert!(store.get_asset_by_id(missing).is_none());
        assert!(store.get::<TextureAsset>(missing).is_none());
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let mut store = AssetStore::new();
        let id = store.create(MaterialAsset::default());
        store.get_mut::<MaterialAsset>(id).unwrap().shininess = 8.0;
        assert_eq!(store.get::<MaterialAsset>(id).unwrap().shininess, 8.0);
        assert!(store.get_mut::<MeshAsset>(id).is_none());
    }

    #[test]
    fn test_unload_frees_path() {
        let path = temp_file("red.mtl", "Kd 1 0 0\n");
        let mut store = AssetStore::new();
        let mut rm = GfxResourceManager::new();
        let first = store.load::<MaterialAsset>(&path).unwrap();
        assert!(store.unload(first, &mut rm, 0));
        assert!(!store.unload(first, &mut rm, 0));

        let second = store.load::<MaterialAsset>(&path).unwrap();
        assert_ne!(first, second);
        store.destroy(&mut rm, 0);
        rm.destroy();
    }
}
