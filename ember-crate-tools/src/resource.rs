use std::{
    env,
    path::{Path, PathBuf},
};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let shader_dir = EmberPath::shader_build_dir();   // engine/shader/.build
/// ```
pub struct EmberPath {}
// 核心路径
impl EmberPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从当前包的位置推导 workspace 目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| manifest_dir.to_path_buf())
    }
}
// 根目录下
impl EmberPath {
    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }
}
// engine 目录下
impl EmberPath {
    pub fn shader_root_path() -> PathBuf {
        Self::engine_path().join("shader")
    }

    /// 预编译的 SPIR-V 所在目录
    pub fn shader_build_dir() -> PathBuf {
        Self::shader_root_path().join(".build")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_dirs_under_workspace() {
        assert!(EmberPath::engine_path().starts_with(EmberPath::workspace_path()));
        assert!(EmberPath::shader_build_dir().starts_with(EmberPath::shader_root_path()));
        assert!(EmberPath::shader_build_dir().ends_with("engine/shader/.build"));
    }
}
