//! Vertex/fragment shader pairs loaded from the compiled shader directory

use ash::vk;
use vk_boilerplate::config::SampleConfig;
use vk_boilerplate::render::vulkan::{
    GraphicsPipeline, GraphicsPipelineDesc, PipelineLayout, PipelineState, RenderPass, ShaderModule, VertexLayout,
    VulkanContext, VulkanResult,
};

/// `<name>.vert.spv` and `<name>.frag.spv`, kept so pipelines can be rebuilt
/// against a new render pass
pub struct ShaderPair {
    vertex: ShaderModule,
    fragment: ShaderModule,
}

impl ShaderPair {
    /// Load both stages of `name`
    pub fn load(context: &VulkanContext, config: &SampleConfig, name: &str) -> VulkanResult<Self> {
        let device = context.raw_device();
        let vertex = ShaderModule::from_file(
            device.clone(),
            vk::ShaderStageFlags::VERTEX,
            config.paths.shader(&format!("{name}.vert.spv")),
        )?;
        let fragment = ShaderModule::from_file(
            device,
            vk::ShaderStageFlags::FRAGMENT,
            config.paths.shader(&format!("{name}.frag.spv")),
        )?;
        Ok(Self { vertex, fragment })
    }

    /// Build a pipeline taking vertices of type `V`
    pub fn pipeline<V: VertexLayout>(
        &self,
        context: &VulkanContext,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
        state: PipelineState,
    ) -> VulkanResult<GraphicsPipeline> {
        let desc = GraphicsPipelineDesc::new(&self.vertex, &self.fragment)
            .with_vertex::<V>()
            .with_state(state);
        GraphicsPipeline::new(context.raw_device(), &desc, layout, render_pass)
    }
}

/// Push constant range covering `T` for the given stages
pub fn push_range<T>(stages: vk::ShaderStageFlags) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: stages,
        offset: 0,
        size: std::mem::size_of::<T>() as u32,
    }
}
