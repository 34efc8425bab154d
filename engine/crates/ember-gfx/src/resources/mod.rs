pub mod buffer;
pub mod image;
pub mod image_view;
pub mod sampler;
pub mod texture;
pub mod vertex_layout;
