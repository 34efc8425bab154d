use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_buffer::GfxCommandBuffer,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    pipelines::shader::{ShaderModuleCache, ShaderStageInfo},
};

pub struct PipelineLayout {
    handle: vk::PipelineLayout,
    gfx_device: Rc<GfxDevice>,
}
impl PipelineLayout {
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let pipeline_layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let handle = unsafe { gfx_device.create_pipeline_layout(&pipeline_layout_create_info, None) }
            .with_context(|| format!("Failed to create pipeline layout: {}", debug_name.as_ref()))?;
        let layout = PipelineLayout { handle, gfx_device };
        layout.gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_pipeline_layout(self.handle, None);
        }
        self.handle = vk::PipelineLayout::null();
    }
}
impl Drop for PipelineLayout {
    fn drop(&mut self) {
        debug_assert!(self.handle == vk::PipelineLayout::null(), "PipelineLayout must be destroyed manually.");
    }
}
impl DebugType for PipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

pub struct GraphicsPipeline {
    pipeline: vk::Pipeline,
    gfx_device: Rc<GfxDevice>,
}
impl GraphicsPipeline {
    /// shader module 在 pipeline 创建完成后立即销毁
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        create_info: &GraphicsPipelineCreateInfo,
        pipeline_layout: vk::PipelineLayout,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("GraphicsPipeline::new");

        // dynamic rendering 需要的 framebuffer 信息
        let mut attach_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&create_info.color_attach_formats)
            .depth_attachment_format(create_info.depth_attach_format)
            .stencil_attachment_format(create_info.stencil_attach_format);

        let mut shader_modules_cache = ShaderModuleCache::new(gfx_device.clone());
        let shader_modules = create_info
            .shader_stages
            .iter()
            .map(|stage| shader_modules_cache.get_or_load(stage.path()))
            .collect::<anyhow::Result<Vec<_>>>();
        let shader_modules = match shader_modules {
            Ok(modules) => modules,
            Err(e) => {
                shader_modules_cache.destroy();
                log::error!("{e:#}");
                return Err(e);
            }
        };
        let shader_stages_info = create_info
            .shader_stages
            .iter()
            .zip(shader_modules.iter())
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default().stage(stage.stage).module(*module).name(stage.entry_point)
            })
            .collect_vec();

        // 顶点和 index
        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_binding_desc)
            .vertex_attribute_descriptions(&create_info.vertex_attribute_desc);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(create_info.msaa_sample);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_attach_blend_states = create_info.color_blend_states();
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .blend_constants([0.0, 0.0, 0.0, 0.0])
            .attachments(&color_attach_blend_states);

        let dynamic_states = create_info.dynamic_states();
        let dynamic_state_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&create_info.rasterize_state_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&create_info.depth_stencil_info)
            .layout(pipeline_layout)
            .dynamic_state(&dynamic_state_info)
            .push_next(&mut attach_info);

        let result = unsafe {
            gfx_device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };
        shader_modules_cache.destroy();

        let pipeline = match result {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                log::error!("failed to create graphics pipeline {debug_name}: {e:?}");
                anyhow::bail!("Failed to create graphics pipeline {debug_name}: {e:?}");
            }
        };
        let pipeline = GraphicsPipeline { pipeline, gfx_device };
        pipeline.gfx_device.set_debug_name(&pipeline, debug_name);

        Ok(pipeline)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_pipeline(self.pipeline, None);
        }
        self.pipeline = vk::Pipeline::null();
    }
}
impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        debug_assert!(self.pipeline == vk::Pipeline::null(), "GraphicsPipeline must be destroyed manually.");
    }
}
impl DebugType for GraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}

pub struct GraphicsPipelineCreateInfo {
    /// dynamic render 需要的 framebuffer 信息
    color_attach_formats: Vec<vk::Format>,
    /// format = undefined 表示不使用这个 attachment
    depth_attach_format: vk::Format,
    stencil_attach_format: vk::Format,

    shader_stages: Vec<ShaderStageInfo>,

    vertex_binding_desc: Vec<vk::VertexInputBindingDescription>,
    vertex_attribute_desc: Vec<vk::VertexInputAttributeDescription>,

    primitive_topology: vk::PrimitiveTopology,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,

    msaa_sample: vk::SampleCountFlags,

    depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo<'static>,

    /// 除了 VIEWPORT / SCISSOR / LINE_WIDTH 之外的 dynamic state
    extra_dynamic_states: Vec<vk::DynamicState>,
}
impl Default for GraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            color_attach_formats: vec![],
            depth_attach_format: vk::Format::UNDEFINED,
            stencil_attach_format: vk::Format::UNDEFINED,

            shader_stages: vec![],

            vertex_binding_desc: vec![],
            vertex_attribute_desc: vec![],

            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,

            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                // 按照 OpenGL 的传统，将 CCW 视为 front face
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,

            depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false),
            extra_dynamic_states: vec![],
        }
    }
}
// builder
impl GraphicsPipelineCreateInfo {
    pub const BASE_DYNAMIC_STATES: [vk::DynamicState; 3] =
        [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR, vk::DynamicState::LINE_WIDTH];

    /// builder
    #[inline]
    pub fn attach_info(
        &mut self,
        color_attach_formats: Vec<vk::Format>,
        depth_format: Option<vk::Format>,
        stencil_format: Option<vk::Format>,
    ) -> &mut Self {
        self.color_attach_formats = color_attach_formats;
        self.depth_attach_format = depth_format.unwrap_or(vk::Format::UNDEFINED);
        self.stencil_attach_format = stencil_format.unwrap_or(vk::Format::UNDEFINED);
        self
    }

    #[inline]
    pub fn shader_stages(&mut self, stages: Vec<ShaderStageInfo>) -> &mut Self {
        self.shader_stages = stages;
        self
    }

    /// builder
    #[inline]
    pub fn vertex_binding(&mut self, bindings: Vec<vk::VertexInputBindingDescription>) -> &mut Self {
        self.vertex_binding_desc = bindings;
        self
    }

    /// builder
    #[inline]
    pub fn vertex_attribute(&mut self, attributes: Vec<vk::VertexInputAttributeDescription>) -> &mut Self {
        self.vertex_attribute_desc = attributes;
        self
    }

    #[inline]
    pub fn topology(&mut self, topology: vk::PrimitiveTopology) -> &mut Self {
        self.primitive_topology = topology;
        self
    }

    #[inline]
    pub fn polygon_mode(&mut self, mode: vk::PolygonMode) -> &mut Self {
        self.rasterize_state_info.polygon_mode = mode;
        self
    }

    #[inline]
    pub fn cull_mode(&mut self, mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.rasterize_state_info.cull_mode = mode;
        self.rasterize_state_info.front_face = front_face;
        self
    }

    #[inline]
    pub fn depth_test(&mut self, depth_test_op: Option<vk::CompareOp>, depth_write: bool) -> &mut Self {
        self.depth_stencil_info.depth_test_enable = depth_test_op.map_or(vk::FALSE, |_| vk::TRUE);
        self.depth_stencil_info.depth_compare_op = depth_test_op.unwrap_or(vk::CompareOp::NEVER);
        self.depth_stencil_info.depth_write_enable = if depth_write { vk::TRUE } else { vk::FALSE };
        self
    }

    /// front 和 back 使用相同的 stencil op
    #[inline]
    pub fn stencil_test(&mut self, op: Option<vk::StencilOpState>) -> &mut Self {
        match op {
            Some(op) => {
                self.depth_stencil_info.stencil_test_enable = vk::TRUE;
                self.depth_stencil_info.front = op;
                self.depth_stencil_info.back = op;
            }
            None => self.depth_stencil_info.stencil_test_enable = vk::FALSE,
        }
        self
    }

    #[inline]
    pub fn extra_dynamic_states(&mut self, states: Vec<vk::DynamicState>) -> &mut Self {
        self.extra_dynamic_states = states;
        self
    }
}
// getters
impl GraphicsPipelineCreateInfo {
    /// 基础 dynamic state 加上额外的，去重并保持顺序
    pub fn dynamic_states(&self) -> Vec<vk::DynamicState> {
        Self::BASE_DYNAMIC_STATES.iter().chain(self.extra_dynamic_states.iter()).copied().unique().collect()
    }

    /// 每个 color attachment 都不做混合，写入全部通道
    pub fn color_blend_states(&self) -> Vec<vk::PipelineColorBlendAttachmentState> {
        self.color_attach_formats
            .iter()
            .map(|_| vk::PipelineColorBlendAttachmentState::default().blend_enable(false).color_write_mask(vk::ColorComponentFlags::RGBA))
            .collect()
    }

    #[inline]
    pub fn depth_stencil_info(&self) -> &vk::PipelineDepthStencilStateCreateInfo<'static> {
        &self.depth_stencil_info
    }

    #[inline]
    pub fn rasterize_state_info(&self) -> &vk::PipelineRasterizationStateCreateInfo<'static> {
        &self.rasterize_state_info
    }
}

/// `BASE_DYNAMIC_STATES` 对应的状态值，每次 begin rendering 之后都要完整录制一次
#[derive(Copy, Clone, Debug)]
pub struct BaseDynamicState {
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub line_width: f32,
}
impl BaseDynamicState {
    /// 覆盖整个 extent，线宽为 1.0
    pub fn full_extent(extent: vk::Extent2D) -> Self {
        Self {
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: extent.into(),
            line_width: 1.0,
        }
    }

    pub fn record(&self, cmd: &GfxCommandBuffer) {
        cmd.cmd_set_viewport(0, std::slice::from_ref(&self.viewport));
        cmd.cmd_set_scissor(0, std::slice::from_ref(&self.scissor));
        cmd.cmd_set_line_width(self.line_width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dynamic_state_covers_extent() {
        let state = BaseDynamicState::full_extent(vk::Extent2D {
            width: 1080,
            height: 720,
        });
        assert_eq!((state.viewport.width, state.viewport.height), (1080.0, 720.0));
        assert_eq!((state.viewport.min_depth, state.viewport.max_depth), (0.0, 1.0));
        assert_eq!(state.scissor.offset, vk::Offset2D { x: 0, y: 0 });
        assert_eq!(state.scissor.extent.width, 1080);
        assert_eq!(state.scissor.extent.height, 720);
        assert_eq!(state.line_width, 1.0);
        assert!(GraphicsPipelineCreateInfo::BASE_DYNAMIC_STATES.contains(&vk::DynamicState::LINE_WIDTH));
    }

    #[test]
    fn test_dynamic_states_always_include_base() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        assert_eq!(ci.dynamic_states(), GraphicsPipelineCreateInfo::BASE_DYNAMIC_STATES.to_vec());

        ci.extra_dynamic_states(vec![vk::DynamicState::DEPTH_BIAS, vk::DynamicState::SCISSOR]);
        assert_eq!(
            ci.dynamic_states(),
            vec![
                vk::DynamicState::VIEWPORT,
                vk::DynamicState::SCISSOR,
                vk::DynamicState::LINE_WIDTH,
                vk::DynamicState::DEPTH_BIAS
            ]
        );
    }

    #[test]
    fn test_stencil_builder() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        let op = vk::StencilOpState {
            pass_op: vk::StencilOp::REPLACE,
            compare_op: vk::CompareOp::ALWAYS,
            reference: 1,
            compare_mask: 0xff,
            write_mask: 0xff,
            ..Default::default()
        };
        ci.stencil_test(Some(op));
        assert_eq!(ci.depth_stencil_info().stencil_test_enable, vk::TRUE);
        assert_eq!(ci.depth_stencil_info().front.pass_op, vk::StencilOp::REPLACE);
        assert_eq!(ci.depth_stencil_info().back.reference, 1);

        ci.stencil_test(None);
        assert_eq!(ci.depth_stencil_info().stencil_test_enable, vk::FALSE);
    }

    #[test]
    fn test_blend_state_per_color_attachment() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.attach_info(vec![vk::Format::R8G8B8A8_UNORM, vk::Format::R16G16B16A16_SFLOAT], None, None);
        let states = ci.color_blend_states();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.color_write_mask == vk::ColorComponentFlags::RGBA));
    }

    #[test]
    fn test_depth_test_disable() {
        let mut ci = GraphicsPipelineCreateInfo::default();
        ci.depth_test(None, false);
        assert_eq!(ci.depth_stencil_info().depth_test_enable, vk::FALSE);
        assert_eq!(ci.depth_stencil_info().depth_write_enable, vk::FALSE);
    }
}
