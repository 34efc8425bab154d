use std::path::Path;

use anyhow::Context;
use ash::vk;
use ember_gfx::{gfx_context::GfxContext, resources::buffer::GfxBuffer, resources::vertex_layout::Vertex};
use ember_render_interface::{gfx_resource_manager::GfxResourceManager, handles::GfxBufferHandle};
use glam::Vec3;

use crate::asset::{Asset, AssetData, AssetKind, has_extension};

/// 已经上传到 GPU 的 mesh，buffer 由 [`GfxResourceManager`] 持有
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_buffer: GfxBufferHandle,
    pub index_buffer: GfxBufferHandle,
    pub index_count: u32,
}
impl GpuMesh {
    /// 上传顶点和索引数据，两个 buffer 都创建成功后才注册到 resource manager
    pub fn upload(
        ctx: &GfxContext,
        resource_manager: &mut GfxResourceManager,
        vertices: &[Vertex],
        indices: &[u32],
        name: &str,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GpuMesh::upload");
        if vertices.is_empty() || indices.is_empty() {
            anyhow::bail!("mesh {name} has no geometry");
        }

        let vertex_buffer = GfxBuffer::new_device_local_with_data(
            ctx,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vertices,
            format!("{name}-vertex"),
        )?;
        let index_buffer = match GfxBuffer::new_device_local_with_data(
            ctx,
            vk::BufferUsageFlags::INDEX_BUFFER,
            indices,
            format!("{name}-index"),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                vertex_buffer.destroy();
                return Err(e);
            }
        };

        Ok(Self {
            vertex_buffer: resource_manager.register_buffer(vertex_buffer),
            index_buffer: resource_manager.register_buffer(index_buffer),
            index_count: indices.len() as u32,
        })
    }

    /// 交给 resource manager 延迟销毁
    pub fn release(self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        resource_manager.destroy_buffer(self.vertex_buffer, frame_id);
        resource_manager.destroy_buffer(self.index_buffer, frame_id);
    }
}

/// CPU 端的几何数据，上传后持有 [`GpuMesh`]
#[derive(Clone, Debug, Default)]
pub struct MeshAsset {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    gpu: Option<GpuMesh>,
}
// new & init
impl MeshAsset {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            gpu: None,
        }
    }

    /// 边长为 1，中心在原点的立方体，每个面 4 个顶点，CCW 为正面
    pub fn cube() -> Self {
        // (normal, u, v)，u x v == normal
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (normal + u * su + v * sv) * 0.5;
                let uv = [(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5];
                vertices.push(Vertex::new(position.to_array(), normal.to_array(), uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices)
    }

    /// 位于 y = 0 的单位平面，法线朝 +Y
    pub fn plane() -> Self {
        let (normal, u, v) = (Vec3::Y, Vec3::X, Vec3::NEG_Z);
        let vertices = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .into_iter()
            .map(|(su, sv): (f32, f32)| {
                let position = (u * su + v * sv) * 0.5;
                Vertex::new(position.to_array(), normal.to_array(), [(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5])
            })
            .collect();
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// 读取 Wavefront OBJ，三角化并合并所有 model
    pub fn from_obj(path: &Path) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("MeshAsset::from_obj");
        let load_options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &load_options)
            .with_context(|| format!("Failed to load obj file: {}", path.display()))?;

        let mut mesh = Self::default();
        for model in models {
            let m = &model.mesh;
            let base = mesh.vertices.len() as u32;
            let vertex_cnt = m.positions.len() / 3;
            for i in 0..vertex_cnt {
                let position = [m.positions[3 * i], m.positions[3 * i + 1], m.positions[3 * i + 2]];
                let normal = if m.normals.len() >= 3 * (i + 1) {
                    [m.normals[3 * i], m.normals[3 * i + 1], m.normals[3 * i + 2]]
                } else {
                    [0.0; 3]
                };
                let uv = if m.texcoords.len() >= 2 * (i + 1) {
                    [m.texcoords[2 * i], 1.0 - m.texcoords[2 * i + 1]]
                } else {
                    [0.0; 2]
                };
                mesh.vertices.push(Vertex::new(position, normal, uv));
            }
            mesh.indices.extend(m.indices.iter().map(|idx| base + idx));
        }

        if mesh.indices.is_empty() {
            anyhow::bail!("obj file {} contains no triangles", path.display());
        }
        log::info!(
            "loaded obj {}: {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len() / 3
        );
        Ok(mesh)
    }

    /// 写出为 OBJ，每个顶点的 v/vt/vn 使用同一个下标，`from_obj` 可以原样读回
    pub fn write_obj(&self, path: &Path) -> anyhow::Result<()> {
        use std::fmt::Write as _;

        let mut text = String::new();
        for v in &self.vertices {
            let [x, y, z] = v.position;
            let _ = writeln!(text, "v {x} {y} {z}");
        }
        for v in &self.vertices {
            let [u, t] = v.uv;
            let _ = writeln!(text, "vt {u} {}", 1.0 - t);
        }
        for v in &self.vertices {
            let [x, y, z] = v.normal;
            let _ = writeln!(text, "vn {x} {y} {z}");
        }
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
            let _ = writeln!(text, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}");
        }

        std::fs::write(path, text).with_context(|| format!("Failed to write obj file: {}", path.display()))
    }
}
// getters
impl MeshAsset {
    #[inline]
    pub fn gpu(&self) -> Option<&GpuMesh> {
        self.gpu.as_ref()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
// gpu
impl MeshAsset {
    /// 已经上传过则直接返回
    pub fn upload(
        &mut self,
        ctx: &GfxContext,
        resource_manager: &mut GfxResourceManager,
        name: &str,
    ) -> anyhow::Result<GpuMesh> {
        if let Some(gpu) = self.gpu {
            return Ok(gpu);
        }
        let gpu = GpuMesh::upload(ctx, resource_manager, &self.vertices, &self.indices, name)?;
        self.gpu = Some(gpu);
        Ok(gpu)
    }

    pub fn release_gpu(&mut self, resource_manager: &mut GfxResourceManager, frame_id: u64) {
        if let Some(gpu) = self.gpu.take() {
            gpu.release(resource_manager, frame_id);
        }
    }
}
impl Asset for MeshAsset {
    const KIND: AssetKind = AssetKind::Mesh;

    fn supports_path(path: &Path) -> bool {
        has_extension(path, &["obj"])
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        Self::from_obj(path)
    }

    fn into_data(self) -> AssetData {
        AssetData::Mesh(self)
    }

    fn from_data(data: &AssetData) -> Option<&Self> {
        match data {
            AssetData::Mesh(m) => Some(m),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut AssetData) -> Option<&mut Self> {
        match data {
            AssetData::Mesh(m) => Some(m),
            _ => None,
        }
    }
}
