use ash::vk;
use itertools::Itertools;

use crate::{
    gfx_context::GfxContext,
    pipelines::{
        descriptor::{
            DescriptorWriteInfo, GfxDescriptorBinding, GfxDescriptorPool, GfxDescriptorSetLayout,
            descriptor_pool_sizes,
        },
        graphics_pipeline::{GraphicsPipeline, GraphicsPipelineCreateInfo, PipelineLayout},
        shader::ShaderPaths,
    },
};

/// 一个 pipeline 及其配套 descriptor 资源的声明式描述
#[derive(Clone, Debug)]
pub struct GfxShaderBundleDesc {
    pub shaders: ShaderPaths,

    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub stencil_format: Option<vk::Format>,

    /// binding index 就是列表中的位置
    pub bindings: Vec<GfxDescriptorBinding>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,

    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    /// None 表示关闭深度测试
    pub depth_test: Option<vk::CompareOp>,
    pub depth_write: bool,
    /// front / back 共用
    pub stencil: Option<vk::StencilOpState>,

    pub extra_dynamic_states: Vec<vk::DynamicState>,

    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub polygon_mode: vk::PolygonMode,
    pub topology: vk::PrimitiveTopology,
}
impl GfxShaderBundleDesc {
    pub fn new(shaders: ShaderPaths) -> Self {
        Self {
            shaders,
            color_formats: vec![],
            depth_format: None,
            stencil_format: None,
            bindings: vec![],
            push_constant_ranges: vec![],
            vertex_bindings: vec![],
            vertex_attributes: vec![],
            depth_test: Some(vk::CompareOp::LESS),
            depth_write: true,
            stencil: None,
            extra_dynamic_states: vec![],
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            polygon_mode: vk::PolygonMode::FILL,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        }
    }

    pub fn pipeline_create_info(&self) -> GraphicsPipelineCreateInfo {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(self.color_formats.clone(), self.depth_format, self.stencil_format)
            .shader_stages(self.shaders.stages())
            .vertex_binding(self.vertex_bindings.clone())
            .vertex_attribute(self.vertex_attributes.clone())
            .topology(self.topology)
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode, self.front_face)
            .depth_test(self.depth_test, self.depth_write)
            .stencil_test(self.stencil)
            .extra_dynamic_states(self.extra_dynamic_states.clone());
        ci
    }
}

/// pipeline + layout + descriptor pool/set/set layout，以及 binding 列表
///
/// set 只在创建时通过 `update_descriptor_sets` 写一次，逐 draw 的变化通过 push constant 传递
pub struct GfxShaderBundle {
    pipeline: Option<GraphicsPipeline>,
    pipeline_layout: Option<PipelineLayout>,
    descriptor_set_layout: Option<GfxDescriptorSetLayout>,
    /// binding 列表为空时不创建 pool 和 set
    descriptor_pool: Option<GfxDescriptorPool>,
    descriptor_set: vk::DescriptorSet,

    bindings: Vec<GfxDescriptorBinding>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
    name: String,
}
// new & init
impl GfxShaderBundle {
    pub fn new(ctx: &GfxContext, desc: &GfxShaderBundleDesc, name: impl AsRef<str>) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GfxShaderBundle::new");
        let name = name.as_ref();
        let gfx_device = ctx.gfx_device_rc();

        let mut bundle = Self {
            pipeline: None,
            pipeline_layout: None,
            descriptor_set_layout: None,
            descriptor_pool: None,
            descriptor_set: vk::DescriptorSet::null(),
            bindings: desc.bindings.clone(),
            push_constant_ranges: desc.push_constant_ranges.clone(),
            name: name.to_string(),
        };

        // 构建失败时，已经创建的部分由 destroy 统一释放
        let result = (|| -> anyhow::Result<()> {
            let set_layout = GfxDescriptorSetLayout::new(gfx_device.clone(), &desc.bindings, name)?;
            let set_layout_handle = set_layout.handle();
            bundle.descriptor_set_layout = Some(set_layout);

            if !desc.bindings.is_empty() {
                let pool = GfxDescriptorPool::new(gfx_device.clone(), &descriptor_pool_sizes(&desc.bindings), name)?;
                let set = match bundle.descriptor_set_layout.as_ref() {
                    Some(layout) => pool.allocate_set(layout, name)?,
                    None => vk::DescriptorSet::null(),
                };
                bundle.descriptor_pool = Some(pool);
                bundle.descriptor_set = set;
            }

            let pipeline_layout = PipelineLayout::new(
                gfx_device.clone(),
                std::slice::from_ref(&set_layout_handle),
                &desc.push_constant_ranges,
                name,
            )?;
            let pipeline_layout_handle = pipeline_layout.handle();
            bundle.pipeline_layout = Some(pipeline_layout);

            let pipeline = GraphicsPipeline::new(
                gfx_device.clone(),
                &desc.pipeline_create_info(),
                pipeline_layout_handle,
                name,
            )?;
            bundle.pipeline = Some(pipeline);
            Ok(())
        })();

        match result {
            Ok(()) => {
                bundle.update_descriptor_sets(ctx);
                Ok(bundle)
            }
            Err(e) => {
                log::error!("failed to build shader bundle {name}: {e:#}");
                bundle.destroy();
                Err(e)
            }
        }
    }

    /// 将 binding 列表写入 descriptor set
    pub fn update_descriptor_sets(&self, ctx: &GfxContext) {
        if self.descriptor_set == vk::DescriptorSet::null() {
            return;
        }

        let infos = self.bindings.iter().map(DescriptorWriteInfo::from_binding).collect_vec();
        let writes = self
            .bindings
            .iter()
            .zip(infos.iter())
            .enumerate()
            .map(|(idx, (binding, info))| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(self.descriptor_set)
                    .dst_binding(idx as u32)
                    .dst_array_element(0)
                    .descriptor_type(binding.descriptor_type);
                match info {
                    DescriptorWriteInfo::Image(image_info) => write.image_info(std::slice::from_ref(image_info)),
                    DescriptorWriteInfo::Buffer(buffer_info) => write.buffer_info(std::slice::from_ref(buffer_info)),
                }
            })
            .collect_vec();

        unsafe {
            ctx.gfx_device().update_descriptor_sets(&writes, &[]);
        }
    }
}
// getters
impl GfxShaderBundle {
    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.as_ref().map_or(vk::Pipeline::null(), |p| p.handle())
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout.as_ref().map_or(vk::PipelineLayout::null(), |l| l.handle())
    }

    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    #[inline]
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout.as_ref().map_or(vk::DescriptorSetLayout::null(), |l| l.handle())
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxDescriptorBinding] {
        &self.bindings
    }

    #[inline]
    pub fn push_constant_ranges(&self) -> &[vk::PushConstantRange] {
        &self.push_constant_ranges
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
// destroy
impl GfxShaderBundle {
    pub fn destroy(mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
        if let Some(layout) = self.pipeline_layout.take() {
            layout.destroy();
        }
        if let Some(pool) = self.descriptor_pool.take() {
            pool.destroy();
        }
        self.descriptor_set = vk::DescriptorSet::null();
        if let Some(set_layout) = self.descriptor_set_layout.take() {
            set_layout.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_desc_defaults_to_back_face_culling() {
        let desc = GfxShaderBundleDesc::new(ShaderPaths::from_dir(Path::new("shaders"), "object"));
        let ci = desc.pipeline_create_info();
        assert_eq!(ci.rasterize_state_info().cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(ci.rasterize_state_info().polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(ci.depth_stencil_info().depth_test_enable, vk::TRUE);
        assert_eq!(ci.depth_stencil_info().stencil_test_enable, vk::FALSE);
    }

    #[test]
    fn test_desc_forwards_pipeline_state() {
        let mut desc = GfxShaderBundleDesc::new(ShaderPaths::from_dir(Path::new("shaders"), "blit"));
        desc.cull_mode = vk::CullModeFlags::NONE;
        desc.polygon_mode = vk::PolygonMode::LINE;
        desc.depth_test = None;
        desc.depth_write = false;
        desc.extra_dynamic_states = vec![vk::DynamicState::DEPTH_BIAS];

        let ci = desc.pipeline_create_info();
        assert_eq!(ci.rasterize_state_info().cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(ci.rasterize_state_info().polygon_mode, vk::PolygonMode::LINE);
        assert_eq!(ci.depth_stencil_info().depth_test_enable, vk::FALSE);
        assert!(ci.dynamic_states().contains(&vk::DynamicState::DEPTH_BIAS));
        assert!(ci.dynamic_states().contains(&vk::DynamicState::LINE_WIDTH));
    }
}
