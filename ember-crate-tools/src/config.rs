use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::resource::EmberPath;

/// 引擎启动配置
///
/// 对应工作区根目录下的 `ember.toml`，所有字段都可以省略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmberConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,

    /// 预编译 SPIR-V 所在目录，为空时使用 `engine/shader/.build`
    pub shader_dir: Option<PathBuf>,
    /// 编辑器打开的工程文件
    pub project_file: Option<PathBuf>,

    /// 离屏 pass 的清屏颜色
    pub clear_color: [f32; 4],
    /// true 时使用 FIFO，否则优先 MAILBOX
    pub vsync: bool,
}
impl Default for EmberConfig {
    fn default() -> Self {
        Self {
            window_title: "Ember".to_string(),
            window_width: 1280,
            window_height: 720,
            shader_dir: None,
            project_file: None,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            vsync: false,
        }
    }
}
// new & init
impl EmberConfig {
    pub const DEFAULT_FILE_NAME: &'static str = "ember.toml";

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 文件不存在时返回默认配置，解析失败时记录错误并返回默认配置
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("{e:#}");
                Self::default()
            }
        }
    }

    /// 工作区根目录下的 `ember.toml`
    pub fn load_workspace_default() -> Self {
        Self::load_or_default(&EmberPath::workspace_path().join(Self::DEFAULT_FILE_NAME))
    }
}
// getters
impl EmberConfig {
    #[inline]
    pub fn shader_dir(&self) -> PathBuf {
        self.shader_dir.clone().unwrap_or_else(EmberPath::shader_build_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = EmberConfig::from_toml_str("").unwrap();
        assert_eq!(config, EmberConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_fields() {
        let config = EmberConfig::from_toml_str(
            r#"
            window_title = "editor"
            window_width = 800
            vsync = true
            project_file = "/tmp/demo/demo.ember"
            "#,
        )
        .unwrap();
        assert_eq!(config.window_title, "editor");
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, 720);
        assert!(config.vsync);
        assert_eq!(config.project_file, Some(PathBuf::from("/tmp/demo/demo.ember")));
    }

    #[test]
    fn test_shader_dir_falls_back_to_build_dir() {
        let config = EmberConfig::default();
        assert_eq!(config.shader_dir(), EmberPath::shader_build_dir());

        let config = EmberConfig {
            shader_dir: Some(PathBuf::from("/opt/shaders")),
            ..Default::default()
        };
        assert_eq!(config.shader_dir(), PathBuf::from("/opt/shaders"));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        let config = EmberConfig::load_or_default(&dir.join("missing.toml"));
        assert_eq!(config, EmberConfig::default());
    }

    #[test]
    fn test_from_file_reports_bad_toml() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ember.toml");
        std::fs::write(&path, "window_width = \"wide\"").unwrap();

        assert!(EmberConfig::from_file(&path).is_err());
        assert_eq!(EmberConfig::load_or_default(&path), EmberConfig::default());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
