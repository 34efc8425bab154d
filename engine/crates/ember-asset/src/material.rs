use std::path::Path;

use anyhow::Context;
use glam::Vec3;

use crate::asset::{Asset, AssetData, AssetKind, has_extension};

/// Phong 材质参数
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialAsset {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}
impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(1.0),
            shininess: 32.0,
        }
    }
}
impl MaterialAsset {
    /// 解析 `.mtl` 文本，只识别 `Ka` / `Kd` / `Ks` / `Ns`，其余前缀忽略
    pub fn parse_mtl(content: &str) -> Self {
        let mut material = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(prefix) = tokens.next() else {
                continue;
            };
            let values: Vec<f32> = tokens.filter_map(|t| t.parse().ok()).collect();
            match (prefix, values.as_slice()) {
                ("Ka", [r, g, b, ..]) => material.ambient = Vec3::new(*r, *g, *b),
                ("Kd", [r, g, b, ..]) => material.diffuse = Vec3::new(*r, *g, *b),
                ("Ks", [r, g, b, ..]) => material.specular = Vec3::new(*r, *g, *b),
                ("Ns", [s, ..]) => material.shininess = *s,
                ("Ka" | "Kd" | "Ks" | "Ns", _) => log::warn!("malformed mtl line: {}", line),
                _ => {}
            }
        }
        material
    }

    /// 作为 push constant 的颜色
    #[inline]
    pub fn base_color(&self) -> glam::Vec4 {
        self.diffuse.extend(1.0)
    }
}
impl Asset for MaterialAsset {
    const KIND: AssetKind = AssetKind::Material;

    fn supports_path(path: &Path) -> bool {
        has_extension(path, &["mtl"])
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't find the .mtl file: {}", path.display()))?;
        Ok(Self::parse_mtl(&content))
    }

    fn into_data(self) -> AssetData {
        AssetData::Material(self)
    }

    fn from_data(data: &AssetData) -> Option<&Self> {
        match data {
            AssetData::Material(m) => Some(m),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut AssetData) -> Option<&mut Self> {
        match data {
            AssetData::Material(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let m = MaterialAsset::default();
        assert_eq!(m.ambient, Vec3::splat(0.2));
        assert_eq!(m.diffuse, Vec3::splat(0.8));
        assert_eq!(m.specular, Vec3::splat(1.0));
        assert_eq!(m.shininess, 32.0);
    }

    #[test]
    fn test_parse_recognized_prefixes() {
        let m = MaterialAsset::parse_mtl(
            "# comment\n\
             newmtl red\n\
             \tKa 0.1 0.0 0.0  \r\n\
             Kd 1.0 0.0 0.0\n\
             \n\
             Ks 0.5 0.5 0.5\n\
             Ns 96.0\n\
             illum 2\n",
        );
        assert_eq!(m.ambient, Vec3::new(0.1, 0.0, 0.0));
        assert_eq!(m.diffuse, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(m.specular, Vec3::splat(0.5));
        assert_eq!(m.shininess, 96.0);
        assert_eq!(m.base_color(), glam::Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_parse_keeps_defaults_for_missing_and_malformed() {
        let m = MaterialAsset::parse_mtl("Kd 0.3\nNs\n");
        assert_eq!(m, MaterialAsset::default());
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = std::env::temp_dir().join(format!("{}.mtl", uuid::Uuid::new_v4()));
        assert!(MaterialAsset::load_from_file(&path).is_err());
    }

    #[test]
    fn test_supports_path() {
        assert!(MaterialAsset::supports_path(Path::new("x/red.mtl")));
        assert!(!MaterialAsset::supports_path(Path::new("x/red.obj")));
    }
}
