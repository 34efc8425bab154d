use std::path::Path;

use ash::vk;
use ember_gfx::commands::layout_transition;
use ember_gfx::gfx_context::GfxContext;
use ember_gfx::pipelines::descriptor::GfxDescriptorBinding;
use ember_gfx::pipelines::shader::ShaderPaths;
use ember_gfx::pipelines::shader_bundle::{GfxShaderBundle, GfxShaderBundleDesc};
use ember_gfx::resources::vertex_layout::{GfxVertexLayout, VertexLayoutAoS, VertexLayoutNone};
use ember_render_interface::pipeline_settings::DefaultRendererSettings;
use glam::{Mat4, Vec4};

/// 物体 pass 的 push constant，vertex 和 fragment 共用
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjPushConstants {
    pub model: Mat4,
    pub color: Vec4,
}
impl Default for ObjPushConstants {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            color: Vec4::ONE,
        }
    }
}

/// binding 0 的 storage buffer 内容
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewProjection {
    pub view: Mat4,
    pub projection: Mat4,
}
impl Default for ViewProjection {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// 离屏 pass 使用的 object pipeline 描述
///
/// - binding 0：view / projection 的 storage buffer
/// - push constant：model 矩阵与颜色
/// - stencil 总是写入 1
pub fn object_bundle_desc(
    shader_dir: &Path,
    depth_format: vk::Format,
    vp_buffer: vk::Buffer,
) -> GfxShaderBundleDesc {
    let mut desc = GfxShaderBundleDesc::new(ShaderPaths::from_dir(shader_dir, "object"));
    desc.color_formats = vec![DefaultRendererSettings::OFFSCREEN_COLOR_FORMAT];
    desc.depth_format = Some(depth_format);
    desc.stencil_format = layout_transition::has_stencil_component(depth_format).then_some(depth_format);

    desc.bindings =
        vec![GfxDescriptorBinding::storage_buffer(vp_buffer, size_of::<ViewProjection>() as vk::DeviceSize)];
    desc.push_constant_ranges = vec![vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: size_of::<ObjPushConstants>() as u32,
    }];

    desc.vertex_bindings = VertexLayoutAoS::vertex_input_bindings();
    desc.vertex_attributes = VertexLayoutAoS::vertex_input_attributes();

    desc.depth_test = Some(vk::CompareOp::LESS);
    desc.depth_write = true;
    desc.stencil = Some(vk::StencilOpState {
        fail_op: vk::StencilOp::KEEP,
        pass_op: vk::StencilOp::REPLACE,
        depth_fail_op: vk::StencilOp::KEEP,
        compare_op: vk::CompareOp::ALWAYS,
        compare_mask: 0xff,
        write_mask: 0xff,
        reference: 1,
    });

    desc.cull_mode = vk::CullModeFlags::BACK;
    desc.front_face = vk::FrontFace::COUNTER_CLOCKWISE;
    desc
}

/// 合成 pass 使用的全屏三角形 pipeline 描述
///
/// 没有顶点输入，binding 0 采样离屏 color
pub fn blit_bundle_desc(
    shader_dir: &Path,
    swapchain_format: vk::Format,
    offscreen_view: vk::ImageView,
    offscreen_sampler: vk::Sampler,
) -> GfxShaderBundleDesc {
    let mut desc = GfxShaderBundleDesc::new(ShaderPaths::from_dir(shader_dir, "blit"));
    desc.color_formats = vec![swapchain_format];
    desc.bindings = vec![GfxDescriptorBinding::combined_image_sampler(
        offscreen_view,
        offscreen_sampler,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )];
    desc.vertex_bindings = VertexLayoutNone::vertex_input_bindings();
    desc.vertex_attributes = VertexLayoutNone::vertex_input_attributes();
    desc.depth_test = None;
    desc.depth_write = false;
    desc.cull_mode = vk::CullModeFlags::NONE;
    desc
}

/// 依赖 swapchain 尺寸的两个 pipeline
pub struct RenderPipelines {
    object: GfxShaderBundle,
    blit: GfxShaderBundle,
}
// new & init
impl RenderPipelines {
    pub fn new(
        ctx: &GfxContext,
        object_desc: &GfxShaderBundleDesc,
        blit_desc: &GfxShaderBundleDesc,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("RenderPipelines::new");
        let object = GfxShaderBundle::new(ctx, object_desc, "object")?;
        let blit = match GfxShaderBundle::new(ctx, blit_desc, "blit") {
            Ok(blit) => blit,
            Err(e) => {
                object.destroy();
                return Err(e);
            }
        };
        Ok(Self { object, blit })
    }
}
// getters
impl RenderPipelines {
    #[inline]
    pub fn object(&self) -> &GfxShaderBundle {
        &self.object
    }

    #[inline]
    pub fn blit(&self) -> &GfxShaderBundle {
        &self.blit
    }
}
// destroy
impl RenderPipelines {
    pub fn destroy(self) {
        self.blit.destroy();
        self.object.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_layout() {
        assert_eq!(size_of::<ObjPushConstants>(), 80);
        assert_eq!(size_of::<ViewProjection>(), 128);

        let pc = ObjPushConstants {
            model: Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0)),
            color: Vec4::new(0.5, 0.25, 1.0, 1.0),
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&pc));
        // column major，平移位于第 12..15 个分量
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(&floats[16..20], &[0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn test_object_desc() {
        let desc = object_bundle_desc(Path::new("shaders"), vk::Format::D32_SFLOAT_S8_UINT, vk::Buffer::null());
        assert_eq!(desc.color_formats, vec![DefaultRendererSettings::OFFSCREEN_COLOR_FORMAT]);
        assert_eq!(desc.stencil_format, Some(vk::Format::D32_SFLOAT_S8_UINT));
        assert_eq!(desc.bindings.len(), 1);
        assert_eq!(desc.bindings[0].descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(desc.push_constant_ranges[0].size, 80);
        assert_eq!(desc.vertex_attributes.len(), 3);

        let stencil = desc.stencil.unwrap();
        assert_eq!(stencil.pass_op, vk::StencilOp::REPLACE);
        assert_eq!(stencil.compare_op, vk::CompareOp::ALWAYS);
        assert_eq!(stencil.reference, 1);
        assert_eq!(desc.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(desc.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(desc.shaders.vertex.ends_with("object.vert.spv"));
    }

    #[test]
    fn test_object_desc_without_stencil_component() {
        let desc = object_bundle_desc(Path::new("shaders"), vk::Format::D32_SFLOAT, vk::Buffer::null());
        assert_eq!(desc.stencil_format, None);
    }

    #[test]
    fn test_blit_desc() {
        let desc = blit_bundle_desc(
            Path::new("shaders"),
            vk::Format::B8G8R8A8_SRGB,
            vk::ImageView::null(),
            vk::Sampler::null(),
        );
        assert!(desc.vertex_bindings.is_empty());
        assert!(desc.vertex_attributes.is_empty());
        assert_eq!(desc.depth_test, None);
        assert_eq!(desc.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(desc.bindings[0].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert!(desc.shaders.fragment.ends_with("blit.frag.spv"));
    }
}
