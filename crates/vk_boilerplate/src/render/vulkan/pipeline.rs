//! Graphics pipeline and pipeline layout construction
//!
//! Pipelines are described by a plain [`PipelineState`] with sensible defaults
//! that a sample overrides field by field. Viewport and scissor are always
//! dynamic, so a pipeline survives swapchain resizes untouched.

use ash::{vk, Device};

use super::render_pass::RenderPass;
use super::shader::ShaderModule;
use super::vertex_layout::VertexLayout;
use super::{VkResultExt, VulkanError, VulkanResult};

/// Pipeline layout wrapper with RAII cleanup
pub struct PipelineLayout {
    device: Device,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Create a layout from descriptor set layouts and push constant ranges
    pub fn new(
        device: Device,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.during("creating pipeline layout")?;

        log::debug!(
            "Created pipeline layout: {} set layout(s), {} push constant range(s)",
            set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Get layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Fixed-function state of a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Fill, line or point
    pub polygon_mode: vk::PolygonMode,
    /// Faces to cull
    pub cull_mode: vk::CullModeFlags,
    /// Winding of front faces
    pub front_face: vk::FrontFace,
    /// Must match the render pass attachments
    pub samples: vk::SampleCountFlags,
    /// Test against the depth attachment
    pub depth_test: bool,
    /// Write passing depths
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
    /// Straight alpha blending
    pub blend: bool,
    /// Rasterised line width
    pub line_width: f32,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS,
            blend: false,
            line_width: 1.0,
        }
    }
}

impl PipelineState {
    /// Input assembly without primitive restart
    pub fn input_assembly(&self) -> vk::PipelineInputAssemblyStateCreateInfo {
        vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(self.topology)
            .primitive_restart_enable(false)
            .build()
    }

    /// Rasterisation without depth bias or clamp
    pub fn rasterization(&self) -> vk::PipelineRasterizationStateCreateInfo {
        vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(self.line_width)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .build()
    }

    /// Multisampling without sample shading
    pub fn multisample(&self) -> vk::PipelineMultisampleStateCreateInfo {
        vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(self.samples)
            .build()
    }

    /// Depth state; stencil stays off
    pub fn depth_stencil(&self) -> vk::PipelineDepthStencilStateCreateInfo {
        vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .build()
    }

    /// Standard alpha blending when enabled, pass-through otherwise
    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let builder = vk::PipelineColorBlendAttachmentState::builder().color_write_mask(vk::ColorComponentFlags::RGBA);
        if self.blend {
            builder
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            builder.blend_enable(false).build()
        }
    }
}

/// States set at record time instead of baked into the pipeline
pub fn dynamic_states() -> [vk::DynamicState; 2] {
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
}

/// Everything needed to build a graphics pipeline besides layout and pass
pub struct GraphicsPipelineDesc<'a> {
    /// Vertex stage, entry `main`
    pub vertex_shader: &'a ShaderModule,
    /// Fragment stage, entry `main`
    pub fragment_shader: &'a ShaderModule,
    /// Empty for vertex-less draws
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Attributes of the bindings
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Fixed-function state
    pub state: PipelineState,
}

impl<'a> GraphicsPipelineDesc<'a> {
    /// Shaders only; no vertex input and default state
    pub fn new(vertex_shader: &'a ShaderModule, fragment_shader: &'a ShaderModule) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            state: PipelineState::default(),
        }
    }

    /// Take vertex input from a single buffer of `V`
    pub fn with_vertex<V: VertexLayout>(mut self) -> Self {
        self.vertex_bindings = vec![V::binding_description()];
        self.vertex_attributes = V::attribute_descriptions();
        self
    }

    /// Replace the fixed-function state
    pub fn with_state(mut self, state: PipelineState) -> Self {
        self.state = state;
        self
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Build a pipeline for subpass 0 of `render_pass`
    pub fn new(
        device: Device,
        desc: &GraphicsPipelineDesc<'_>,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
    ) -> VulkanResult<Self> {
        let stages = [desc.vertex_shader.stage_info(), desc.fragment_shader.stage_info()];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);

        let input_assembly = desc.state.input_assembly();

        // Counts only; the actual rectangles are set per command buffer
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = desc.state.rasterization();
        let multisample = desc.state.multisample();
        let depth_stencil = desc.state.depth_stencil();

        let blend_attachments = [desc.state.color_blend_attachment()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic = dynamic_states();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0)
            .build();

        let pipelines = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) }
            .map_err(|(_, result)| result)
            .during("creating graphics pipeline")?;

        let pipeline = single_pipeline(pipelines)?;

        log::debug!("Created graphics pipeline: {:?}", desc.state);

        Ok(Self { device, pipeline })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// The one pipeline a single-info create call should have produced
fn single_pipeline(pipelines: Vec<vk::Pipeline>) -> VulkanResult<vk::Pipeline> {
    match pipelines.as_slice() {
        [pipeline] if *pipeline != vk::Pipeline::null() => Ok(*pipeline),
        _ => Err(VulkanError::InitializationFailed(format!(
            "expected one graphics pipeline, driver returned {:?}",
            pipelines
        ))),
    }
}
