//! Shader 编译工具
//!
//! 将 `engine/shader/src` 下的所有 GLSL 文件编译为 SPIR-V，输出到 `engine/shader/.build`

mod glsl;

use std::sync::atomic::{AtomicUsize, Ordering};

use ember_crate_tools::init_log::init_log;
use ember_crate_tools::resource::EmberPath;
use glsl::ShaderCompileTask;
use rayon::prelude::*;

fn main() {
    init_log();

    let src_dir = EmberPath::shader_root_path().join("src");
    let include_dir = EmberPath::shader_root_path().join("include");
    let build_dir = EmberPath::shader_build_dir();
    log::info!("Shader src path: {:?}", src_dir);
    log::info!("Shader output path: {:?}", build_dir);

    let failed = AtomicUsize::new(0);
    walkdir::WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| ShaderCompileTask::new(entry.path(), &src_dir, &build_dir))
        .par_bridge() // 并行化编译
        .for_each(|task| {
            log::info!("Compiling shader: {:?}", task.shader_path);
            if let Err(e) = task.compile(&include_dir) {
                log::error!("{e:#}");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        });

    let failed = failed.into_inner();
    if failed > 0 {
        log::error!("Shader compilation finished with {failed} failures.");
        std::process::exit(1);
    }
    log::info!("Shader compilation completed.");
}
