use std::fmt::Display;
use std::path::Path;

use crate::{material::MaterialAsset, mesh::MeshAsset, texture::TextureAsset};

/// 资产的唯一标识
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(uuid::Uuid);
impl AssetId {
    #[inline]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    #[inline]
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    #[inline]
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}
impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}
impl Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Mesh,
    Texture,
    Material,
}

/// 资源加载状态
///
/// 状态流转: Uploading -> Ready
///                 \-> Failed
///
/// 只在 CPU 上使用的资产（material）创建后即为 Ready
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadStatus {
    /// CPU 解码已完成，等待 `flush_uploads` 上传到 GPU
    Uploading,
    /// 可以用于渲染
    Ready,
    /// GPU 上传失败
    Failed,
}

/// store 中实际保存的资产
pub enum AssetData {
    Mesh(MeshAsset),
    Texture(TextureAsset),
    Material(MaterialAsset),
}
impl AssetData {
    #[inline]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Mesh(_) => AssetKind::Mesh,
            Self::Texture(_) => AssetKind::Texture,
            Self::Material(_) => AssetKind::Material,
        }
    }

    #[inline]
    pub fn needs_upload(&self) -> bool {
        !matches!(self, Self::Material(_))
    }
}

/// 每一种资产类型实现该 trait
///
/// `supports_path` 为 false 表示该类型没有针对这种路径的加载方式
pub trait Asset: Sized {
    const KIND: AssetKind;

    fn supports_path(path: &Path) -> bool;
    fn load_from_file(path: &Path) -> anyhow::Result<Self>;

    fn into_data(self) -> AssetData;
    fn from_data(data: &AssetData) -> Option<&Self>;
    fn from_data_mut(data: &mut AssetData) -> Option<&mut Self>;
}

/// 扩展名是否在列表中，大小写不敏感
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_unique_and_textual() {
        let a = AssetId::new();
        let b = AssetId::new();
        assert_ne!(a, b);
        let text = a.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text, text.to_lowercase());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a/b/cube.OBJ"), &["obj"]));
        assert!(!has_extension(Path::new("a/b/cube"), &["obj"]));
        assert!(!has_extension(Path::new("a/b/cube.mtl"), &["obj"]));
    }
}
