//! 项目文件
//!
//! 场景保存在项目根目录下的 `.Content` 中，所有数值都是小端序：
//!
//! ```text
//! objectCount: u32
//! repeat objectCount:
//!   nameLen: u32, nameBytes[nameLen]
//!   position: 3 x f32, rotation: 3 x f32, scale: 3 x f32
//!   assetCount: u32
//!   repeat assetCount: pathLen: u32, pathBytes[pathLen]
//! ```

use std::path::{Component as PathComponent, Path, PathBuf};

use anyhow::Context;
use ember_asset::{
    asset::Asset, asset_store::AssetStore, material::MaterialAsset, mesh::MeshAsset, texture::TextureAsset,
};
use glam::Vec3;

use crate::{scene::Scene, transform::Transform};

/// `.Content` 中的一个物体
#[derive(Clone, Debug, PartialEq)]
pub struct ContentRecord {
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    /// 根目录内的资产为相对路径，其余为绝对路径
    pub asset_paths: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Project {
    root: PathBuf,
    name: String,
}
// new & init
impl Project {
    pub const CONTENT_FILE_NAME: &'static str = ".Content";

    /// 项目根目录为 `path` 所在目录，项目名为文件名（不含扩展名）
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("invalid project path: {}", path.display()))?
            .to_string();
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { root, name })
    }
}
// getters
impl Project {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn content_path(&self) -> PathBuf {
        self.root.join(Self::CONTENT_FILE_NAME)
    }
}
// save & restore
impl Project {
    /// 只有带路径的资产会被写入，程序生成的资产会被忽略
    pub fn save(&self, scene: &Scene, store: &AssetStore) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Project::save");
        let records: Vec<ContentRecord> = scene
            .objects()
            .iter()
            .map(|object| {
                let transform = scene.ecs().try_get_component::<Transform>(object.entity()).copied().unwrap_or_default();
                let asset_paths = object
                    .get_all_assets(scene.ecs())
                    .iter()
                    .filter_map(|asset_ref| store.get_asset_path_by_id(asset_ref.id))
                    .map(|path| self.stored_path(path))
                    .collect();
                ContentRecord {
                    name: object.name().to_string(),
                    position: transform.position,
                    rotation: transform.rotation,
                    scale: transform.scale,
                    asset_paths,
                }
            })
            .collect();

        let path = self.content_path();
        std::fs::write(&path, encode_content(&records))
            .with_context(|| format!("Failed to write project content: {}", path.display()))?;
        log::info!("saved project {} ({} objects) to {}", self.name, records.len(), path.display());
        Ok(())
    }

    pub fn read_content(&self) -> anyhow::Result<Vec<ContentRecord>> {
        let path = self.content_path();
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read project content: {}", path.display()))?;
        decode_content(&bytes).with_context(|| format!("Corrupted project content: {}", path.display()))
    }

    /// 按照 `.Content` 重新创建物体，并按扩展名加载资产
    ///
    /// # return
    /// 创建的物体数量
    pub fn restore(&self, scene: &mut Scene, store: &mut AssetStore) -> anyhow::Result<usize> {
        let _span = tracy_client::span!("Project::restore");
        let records = self.read_content()?;
        for record in &records {
            let entity = scene.add_object(record.name.clone());
            if let Some(transform) = scene.ecs_mut().get_component_mut::<Transform>(entity) {
                transform.position = record.position;
                transform.rotation = record.rotation;
                transform.scale = record.scale;
            }

            for stored in &record.asset_paths {
                let path = self.resolve_path(stored);
                let ecs = scene.ecs_mut();
                if MeshAsset::supports_path(&path) {
                    if let Some(id) = store.load::<MeshAsset>(&path) {
                        ecs.add_asset_component::<MeshAsset>(entity, id);
                    }
                } else if MaterialAsset::supports_path(&path) {
                    if let Some(id) = store.load::<MaterialAsset>(&path) {
                        ecs.add_asset_component::<MaterialAsset>(entity, id);
                    }
                } else if TextureAsset::supports_path(&path) {
                    if let Some(id) = store.load::<TextureAsset>(&path) {
                        ecs.add_asset_component::<TextureAsset>(entity, id);
                    }
                } else {
                    log::warn!("unknown asset type in project {}: {}", self.name, path.display());
                }
            }
        }
        log::info!("restored {} objects from project {}", records.len(), self.name);
        Ok(records.len())
    }
}
// paths
impl Project {
    /// 严格位于根目录之内时返回相对路径，否则返回绝对路径。与根目录相同视为不在其中
    pub fn stored_path(&self, path: &Path) -> String {
        let root = normalize(&self.root);
        let normalized = normalize(path);
        match normalized.strip_prefix(&root) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative.to_string_lossy().into_owned(),
            _ => normalized.to_string_lossy().into_owned(),
        }
    }

    pub fn resolve_path(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }
}

/// 转为绝对路径并去掉 `.` / `..`，不访问文件系统
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for part in absolute.components() {
        match part {
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn encode_content(records: &[ContentRecord]) -> Vec<u8> {
    fn put_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn put_str(out: &mut Vec<u8>, s: &str) {
        put_u32(out, s.len() as u32);
        out.extend_from_slice(s.as_bytes());
    }
    fn put_vec3(out: &mut Vec<u8>, v: Vec3) {
        for c in v.to_array() {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }

    let mut out = Vec::new();
    put_u32(&mut out, records.len() as u32);
    for record in records {
        put_str(&mut out, &record.name);
        put_vec3(&mut out, record.position);
        put_vec3(&mut out, record.rotation);
        put_vec3(&mut out, record.scale);
        put_u32(&mut out, record.asset_paths.len() as u32);
        for path in &record.asset_paths {
            put_str(&mut out, path);
        }
    }
    out
}

struct ContentReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}
impl<'a> ContentReader<'a> {
    fn take(&mut self, len: usize) -> anyhow::Result<&'a [u8]> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.bytes.len()).with_context(|| {
            format!("unexpected end of data: need {} bytes at offset {}, have {}", len, self.offset, self.bytes.len())
        })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> anyhow::Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn f32(&mut self) -> anyhow::Result<f32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(f32::from_le_bytes(buf))
    }

    fn vec3(&mut self) -> anyhow::Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn string(&mut self) -> anyhow::Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).context("string is not valid UTF-8")
    }
}

pub fn decode_content(bytes: &[u8]) -> anyhow::Result<Vec<ContentRecord>> {
    let mut reader = ContentReader { bytes, offset: 0 };
    let object_count = reader.u32()?;
    let mut records = Vec::new();
    for _ in 0..object_count {
        let name = reader.string()?;
        let position = reader.vec3()?;
        let rotation = reader.vec3()?;
        let scale = reader.vec3()?;
        let asset_count = reader.u32()?;
        let asset_paths = (0..asset_count).map(|_| reader.string()).collect::<anyhow::Result<Vec<_>>>()?;
        records.push(ContentRecord {
            name,
            position,
            rotation,
            scale,
            asset_paths,
        });
    }
    if reader.offset != bytes.len() {
        log::warn!("{} trailing bytes in project content", bytes.len() - reader.offset);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_splits_root_and_name() {
        let project = Project::load("/tmp/games/demo.ember").unwrap();
        assert_eq!(project.name(), "demo");
        assert_eq!(project.root(), Path::new("/tmp/games"));
        assert_eq!(project.content_path(), PathBuf::from("/tmp/games/.Content"));
    }

    #[test]
    fn test_encoding_layout_is_little_endian() {
        let bytes = encode_content(&[ContentRecord {
            name: "Cube".into(),
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            asset_paths: vec!["a.obj".into()],
        }]);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[4, 0, 0, 0]);
        assert_eq!(&bytes[8..12], b"Cube");
        assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
        assert_eq!(bytes.len(), 4 + 4 + 4 + 36 + 4 + 4 + 5);
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let records = vec![
            ContentRecord {
                name: "立方体".into(),
                position: Vec3::new(0.1, -2.5, f32::MIN_POSITIVE),
                rotation: Vec3::new(45.0, 90.0, -0.0),
                scale: Vec3::new(1.0, 2.0, 3.0),
                asset_paths: vec!["meshes/cube.obj".into(), "/abs/red.mtl".into()],
            },
            ContentRecord {
                name: String::new(),
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
                asset_paths: vec![],
            },
        ];
        let bytes = encode_content(&records);
        let decoded = decode_content(&bytes).unwrap();
        assert_eq!(decoded, records);
        assert_eq!(decoded[0].rotation.z.to_bits(), (-0.0f32).to_bits());
        assert_eq!(encode_content(&decoded), bytes);
    }

    #[test]
    fn test_truncated_content_is_error() {
        let bytes = encode_content(&[ContentRecord {
            name: "x".into(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            asset_paths: vec!["a.mtl".into()],
        }]);
        assert!(decode_content(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode_content(&[]).is_err());
    }

    #[test]
    fn test_relative_only_when_strictly_inside() {
        let project = Project::load("/work/proj/demo.ember").unwrap();
        assert_eq!(project.stored_path(Path::new("/work/proj/meshes/cube.obj")), "meshes/cube.obj");
        assert_eq!(project.stored_path(Path::new("/work/proj")), "/work/proj");
        assert_eq!(project.stored_path(Path::new("/work/other/cube.obj")), "/work/other/cube.obj");
        assert_eq!(project.stored_path(Path::new("/work/proj/../other/a.mtl")), "/work/other/a.mtl");

        assert_eq!(project.resolve_path("meshes/cube.obj"), PathBuf::from("/work/proj/meshes/cube.obj"));
        assert_eq!(project.resolve_path("/abs/a.mtl"), PathBuf::from("/abs/a.mtl"));
    }

    #[test]
    fn test_relative_input_outside_root_is_stored_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let project = Project::load(cwd.join("proj").join("demo.ember")).unwrap();

        let stored = project.stored_path(Path::new("other/a.mtl"));
        assert!(Path::new(&stored).is_absolute());
        assert_eq!(project.resolve_path(&stored), cwd.join("other").join("a.mtl"));

        assert_eq!(project.stored_path(Path::new("proj/meshes/cube.obj")), "meshes/cube.obj");
    }

    #[test]
    fn test_save_and_restore_scene() {
        let root = temp_root();
        let inside = root.join("red.mtl");
        std::fs::write(&inside, "Kd 1 0 0\n").unwrap();
        let outside_dir = temp_root();
        let outside = outside_dir.join("blue.mtl");
        std::fs::write(&outside, "Kd 0 0 1\n").unwrap();

        let project = Project::load(root.join("demo.ember")).unwrap();

        let mut store = AssetStore::new();
        let mut scene = Scene::new();
        let a = scene.add_object("a");
        scene.ecs_mut().get_component_mut::<Transform>(a).unwrap().position = Vec3::new(0.0, 0.0, -3.0);
        let red = store.load::<MaterialAsset>(&inside).unwrap();
        scene.ecs_mut().add_asset_component::<MaterialAsset>(a, red);
        let b = scene.add_object("b");
        let blue = store.load::<MaterialAsset>(&outside).unwrap();
        scene.ecs_mut().add_asset_component::<MaterialAsset>(b, blue);
        // 程序生成的资产没有路径，不会写入
        let cube = store.create(MeshAsset::cube());
        scene.ecs_mut().add_asset_component::<MeshAsset>(b, cube);

        project.save(&scene, &store).unwrap();
        let records = project.read_content().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].asset_paths, vec!["red.mtl".to_string()]);
        assert_eq!(records[1].asset_paths, vec![outside.to_string_lossy().into_owned()]);

        let mut restored = Scene::new();
        assert_eq!(project.restore(&mut restored, &mut store).unwrap(), 2);
        let names: Vec<&str> = restored.objects().iter().map(|o| o.name()).collect();
        assert_eq!(names, ["a", "b"]);

        let ra = restored.objects()[0].entity();
        assert_eq!(restored.ecs().get_component::<Transform>(ra).unwrap().position, Vec3::new(0.0, 0.0, -3.0));
        // 同一路径去重，得到同一个资产
        assert_eq!(restored.ecs().get_all_entity_assets(ra)[0].id, red);
        let rb = restored.objects()[1].entity();
        assert_eq!(
            restored.ecs().get_asset_component::<MaterialAsset>(rb, &store).unwrap().diffuse,
            Vec3::new(0.0, 0.0, 1.0)
        );
    }
}
