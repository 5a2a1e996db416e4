//! Hard-coded coloured triangle
//!
//! The smallest path through the boilerplate: one device-local vertex
//! buffer, a pipeline with an empty layout and a single draw.

use ash::vk;
use vk_boilerplate::prelude::*;

use crate::shaders::ShaderPair;

/// Clip-space vertices, clockwise on screen with Vulkan's downward Y
pub const VERTICES: [ColorVertex; 3] = [
    ColorVertex {
        position: [0.0, -0.5],
        color: [1.0, 0.0, 0.0],
    },
    ColorVertex {
        position: [0.5, 0.5],
        color: [0.0, 1.0, 0.0],
    },
    ColorVertex {
        position: [-0.5, 0.5],
        color: [0.0, 0.0, 1.0],
    },
];

/// Fixed-function state: no culling so winding does not matter
pub fn pipeline_state() -> PipelineState {
    PipelineState {
        cull_mode: vk::CullModeFlags::NONE,
        ..PipelineState::default()
    }
}

/// Triangle sample state
pub struct Triangle {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
    shaders: ShaderPair,
    vertex_buffer: Buffer,
}

impl Sample for Triangle {
    fn init(ctx: &SampleContext<'_>) -> Result<Self, AppError> {
        let context = ctx.context.as_ref();
        let shaders = ShaderPair::load(context, ctx.config, "triangle")?;
        let layout = PipelineLayout::new(context.raw_device(), &[], &[])?;
        let pipeline = shaders.pipeline::<ColorVertex>(context, &layout, ctx.render_pass, pipeline_state())?;
        let vertex_buffer = Buffer::device_local_with_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, &VERTICES)?;

        Ok(Self {
            pipeline,
            layout,
            shaders,
            vertex_buffer,
        })
    }

    fn record(&mut self, _frame: &FrameInfo, pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()> {
        pass.set_full_viewport();
        pass.cmd_bind_pipeline(self.pipeline.handle());
        pass.cmd_bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        pass.cmd_draw(VERTICES.len() as u32, 1, 0, 0);
        Ok(())
    }

    fn on_render_pass_changed(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()> {
        self.pipeline = self
            .shaders
            .pipeline::<ColorVertex>(context, &self.layout, render_pass, pipeline_state())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_has_nonzero_area() {
        let [a, b, c] = VERTICES.map(|v| v.position);
        let area = ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])) * 0.5;
        assert!(area.abs() > 0.1);
    }

    #[test]
    fn test_triangle_does_not_cull() {
        let state = pipeline_state();
        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert!(state.depth_test);
    }
}
