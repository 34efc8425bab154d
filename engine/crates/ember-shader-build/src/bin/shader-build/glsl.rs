//! GLSL 着色器编译
//!
//! 使用 glslc (来自 Vulkan SDK) 将 GLSL 着色器编译为 SPIR-V

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Shader 的执行阶段，由文件扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}
impl ShaderStage {
    pub fn from_file_name(shader_name: &str) -> Option<Self> {
        let stage = match () {
            _ if shader_name.ends_with(".vert") => Self::Vertex,
            _ if shader_name.ends_with(".geom") => Self::Geometry,
            _ if shader_name.ends_with(".frag") => Self::Fragment,
            _ if shader_name.ends_with(".comp") => Self::Compute,
            _ => return None,
        };
        Some(stage)
    }
}

/// 一个具体的编译任务
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
    pub shader_stage: ShaderStage,
}
impl ShaderCompileTask {
    /// `<src>/a/object.vert` -> `<build>/a/object.vert.spv`
    ///
    /// 不支持的扩展名以及 src 目录之外的文件返回 None
    pub fn new(shader_path: &Path, src_dir: &Path, build_dir: &Path) -> Option<Self> {
        let relative_path = shader_path.strip_prefix(src_dir).ok()?;
        let shader_name = shader_path.file_name()?.to_str()?;
        let shader_stage = ShaderStage::from_file_name(shader_name)?;

        let mut output_path = build_dir.join(relative_path);
        let mut new_ext = output_path.extension()?.to_os_string();
        new_ext.push(".spv");
        output_path.set_extension(new_ext);

        Some(Self {
            shader_path: shader_path.to_path_buf(),
            output_path,
            shader_stage,
        })
    }

    /// 调用 glslc，stderr 中的信息会记录为错误
    pub fn compile(&self, include_dir: &Path) -> anyhow::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output dir: {}", parent.display()))?;
        }

        let output = std::process::Command::new("glslc")
            .arg(format!("-I{}", include_dir.display()))
            .args(["-g", "--target-env=vulkan1.3", "-o"])
            .arg(&self.output_path)
            .arg(&self.shader_path)
            .output()
            .context("Failed to execute glslc")?;

        if !output.stdout.is_empty() {
            log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.stderr.is_empty() {
            log::error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            anyhow::bail!("glslc failed on {}", self.shader_path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(ShaderStage::from_file_name("object.vert"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_file_name("object.frag"), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_file_name("outline.geom"), Some(ShaderStage::Geometry));
        assert_eq!(ShaderStage::from_file_name("common.glsl"), None);
    }

    #[test]
    fn test_output_path_keeps_relative_dirs() {
        let task = ShaderCompileTask::new(
            Path::new("/shader/src/passes/blit.frag"),
            Path::new("/shader/src"),
            Path::new("/shader/.build"),
        )
        .unwrap();
        assert_eq!(task.output_path, PathBuf::from("/shader/.build/passes/blit.frag.spv"));
        assert_eq!(task.shader_stage, ShaderStage::Fragment);
    }

    #[test]
    fn test_files_outside_src_are_skipped() {
        assert!(
            ShaderCompileTask::new(Path::new("/other/object.vert"), Path::new("/shader/src"), Path::new("/b"))
                .is_none()
        );
        assert!(
            ShaderCompileTask::new(Path::new("/shader/src/README.md"), Path::new("/shader/src"), Path::new("/b"))
                .is_none()
        );
    }
}
