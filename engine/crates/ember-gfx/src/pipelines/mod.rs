pub mod descriptor;
pub mod graphics_pipeline;
pub mod shader;
pub mod shader_bundle;
