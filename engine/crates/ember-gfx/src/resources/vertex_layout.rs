use std::mem::offset_of;

use ash::vk;

/// 引擎中唯一的顶点格式
#[repr(C)]
#[derive(Clone, Debug, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}
impl Vertex {
    #[inline]
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// 描述 pipeline 的顶点输入
pub trait GfxVertexLayout {
    fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription>;
    fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription>;
}

/// AoS 布局：position, normal, uv
pub struct VertexLayoutAoS;
impl GfxVertexLayout for VertexLayoutAoS {
    fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            // positions
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            // normals
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, normal) as u32,
            },
            // uvs
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, uv) as u32,
            },
        ]
    }
}

/// 没有顶点输入，例如全屏三角形
pub struct VertexLayoutNone;
impl GfxVertexLayout for VertexLayoutNone {
    fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![]
    }

    fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride_and_offsets() {
        assert_eq!(size_of::<Vertex>(), 32);
        let bindings = VertexLayoutAoS::vertex_input_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 32);

        let attrs = VertexLayoutAoS::vertex_input_attributes();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_vertex_is_pod() {
        let v = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5]);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 32);
        let back: Vertex = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, v);
    }

    #[test]
    fn test_none_layout_is_empty() {
        assert!(VertexLayoutNone::vertex_input_bindings().is_empty());
        assert!(VertexLayoutNone::vertex_input_attributes().is_empty());
    }
}
