use std::collections::HashMap;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::foundation::{debug_messenger::DebugType, device::GfxDevice};

/// # Destroy
///
/// 需要手动调用 `destroy` 方法来释放资源。
pub struct ShaderModule {
    handle: vk::ShaderModule,
    gfx_device: Rc<GfxDevice>,

    #[cfg(debug_assertions)]
    destroyed: bool,
}
impl ShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(gfx_device: Rc<GfxDevice>, path: &Path) -> anyhow::Result<Self> {
        let mut file =
            std::fs::File::open(path).with_context(|| format!("Failed to open shader: {}", path.display()))?;
        let shader_code =
            ash::util::read_spv(&mut file).with_context(|| format!("Invalid spir-v file: {}", path.display()))?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let handle = unsafe { gfx_device.create_shader_module(&shader_module_info, None) }
            .with_context(|| format!("Failed to create shader module: {}", path.display()))?;

        let shader_module = Self {
            handle,
            gfx_device,

            #[cfg(debug_assertions)]
            destroyed: false,
        };
        shader_module.gfx_device.set_debug_name(&shader_module, path.to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_shader_module(self.handle, None);
        }
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}
impl Drop for ShaderModule {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "ShaderModule must be destroyed manually before drop.");
    }
}
impl DebugType for ShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 可以存放多个 ShaderModule，使用路径进行索引
pub struct ShaderModuleCache {
    gfx_device: Rc<GfxDevice>,
    shader_modules: HashMap<PathBuf, ShaderModule>,
}
impl ShaderModuleCache {
    pub fn new(gfx_device: Rc<GfxDevice>) -> Self {
        Self {
            gfx_device,
            shader_modules: HashMap::new(),
        }
    }

    pub fn get_or_load(&mut self, path: &Path) -> anyhow::Result<vk::ShaderModule> {
        if let Some(module) = self.shader_modules.get(path) {
            return Ok(module.handle());
        }
        let module = ShaderModule::new(self.gfx_device.clone(), path)?;
        let handle = module.handle();
        self.shader_modules.insert(path.to_path_buf(), module);
        Ok(handle)
    }

    pub fn destroy(self) {
        self.shader_modules.into_values().for_each(|module| module.destroy());
    }
}

#[derive(Clone, Debug)]
pub struct ShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: PathBuf,
}
impl ShaderStageInfo {
    pub const ENTRY_MAIN: &'static CStr = c"main";

    #[inline]
    pub fn new(stage: vk::ShaderStageFlags, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            entry_point: Self::ENTRY_MAIN,
            path: path.into(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 预编译 shader 的路径：`<dir>/<name>.vert.spv`，`<dir>/<name>.frag.spv`，可选 `<dir>/<name>.geom.spv`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub geometry: Option<PathBuf>,
}
impl ShaderPaths {
    pub fn from_dir(shader_dir: &Path, name: &str) -> Self {
        Self {
            vertex: shader_dir.join(format!("{name}.vert.spv")),
            fragment: shader_dir.join(format!("{name}.frag.spv")),
            geometry: None,
        }
    }

    /// builder
    #[inline]
    pub fn with_geometry(mut self, shader_dir: &Path, name: &str) -> Self {
        self.geometry = Some(shader_dir.join(format!("{name}.geom.spv")));
        self
    }

    pub fn stages(&self) -> Vec<ShaderStageInfo> {
        let mut stages = vec![ShaderStageInfo::new(vk::ShaderStageFlags::VERTEX, &self.vertex)];
        if let Some(geom) = &self.geometry {
            stages.push(ShaderStageInfo::new(vk::ShaderStageFlags::GEOMETRY, geom));
        }
        stages.push(ShaderStageInfo::new(vk::ShaderStageFlags::FRAGMENT, &self.fragment));
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_paths_from_dir() {
        let dir = Path::new("shaders");
        let paths = ShaderPaths::from_dir(dir, "object");
        assert_eq!(paths.vertex, dir.join("object.vert.spv"));
        assert_eq!(paths.fragment, dir.join("object.frag.spv"));
        assert!(paths.geometry.is_none());

        let stages = paths.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage, vk::ShaderStageFlags::VERTEX);
        assert_eq!(stages[1].stage, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(stages[0].entry_point, c"main");
    }

    #[test]
    fn test_shader_paths_with_geometry() {
        let dir = Path::new("shaders");
        let stages = ShaderPaths::from_dir(dir, "outline").with_geometry(dir, "outline").stages();
        let kinds: Vec<_> = stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            kinds,
            vec![vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::GEOMETRY, vk::ShaderStageFlags::FRAGMENT]
        );
        assert_eq!(stages[1].path(), dir.join("outline.geom.spv"));
    }
}
