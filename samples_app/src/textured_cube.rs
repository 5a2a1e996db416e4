//! A single spinning cube sampling one texture
//!
//! The texture is required: if it cannot be read the sample fails to build
//! and the binary exits with an error.

use std::cell::RefCell;
use std::mem::size_of;
use std::rc::Rc;

use ash::vk;
use vk_boilerplate::prelude::*;

use crate::shaders::{push_range, ShaderPair};

/// Texture location under the asset directory
pub const TEXTURE_PATH: &str = "textures/crate.png";

/// Radians per second around the tilted spin axis
const SPIN_SPEED: f32 = 0.6;

/// Model matrix after `time` seconds
pub fn cube_model(time: f32) -> Mat4 {
    let axis = nalgebra::Unit::new_normalize(Vec3::new(0.3, 1.0, 0.1));
    Transform::default()
        .with_rotation(Quat::from_axis_angle(&axis, time * SPIN_SPEED))
        .with_uniform_scale(1.5)
        .to_matrix()
}

fn bindings() -> [BindingDesc; 2] {
    [
        BindingDesc::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        BindingDesc::sampler(1, vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Textured cube sample state
pub struct TexturedCube {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
    shaders: ShaderPair,
    descriptors: DescriptorSetGroup,
    camera_buffer: PerFrameBuffer,
    texture: Texture,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    cube: MeshRange,
    camera: Rc<RefCell<FlyCamera>>,
    elapsed: f32,
}

impl Sample for TexturedCube {
    fn init(ctx: &SampleContext<'_>) -> Result<Self, AppError> {
        let context = ctx.context.as_ref();
        let frames = ctx.frames_in_flight;

        let image = ImageData::from_file(ctx.config.paths.asset(TEXTURE_PATH))?;
        let texture = Texture::from_rgba8(context, image.width, image.height, &image.data)?;
        log::info!("Texture: {}x{}", image.width, image.height);

        let camera_buffer = PerFrameBuffer::new(
            context,
            frames,
            size_of::<CameraUbo>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let descriptors = DescriptorSetGroup::new(context.raw_device(), &bindings(), frames, 0)?;
        for slot in 0..frames {
            descriptors.write_buffer(slot, 0, camera_buffer.descriptor_info(slot))?;
            descriptors.write_image(slot, 1, texture.descriptor_info())?;
        }

        let shaders = ShaderPair::load(context, ctx.config, "textured")?;
        let layout = PipelineLayout::new(
            context.raw_device(),
            &[descriptors.layout()],
            &[push_range::<[[f32; 4]; 4]>(vk::ShaderStageFlags::VERTEX)],
        )?;
        let pipeline = shaders.pipeline::<Vertex>(context, &layout, ctx.render_pass, PipelineState::default())?;

        let mut mesh = MeshData::default();
        let cube = mesh.append(&MeshData::cube());
        let vertex_buffer =
            Buffer::device_local_with_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, &mesh.vertices)?;
        let index_buffer = Buffer::device_local_with_data(context, vk::BufferUsageFlags::INDEX_BUFFER, &mesh.indices)?;

        let camera = Rc::new(RefCell::new(FlyCamera::looking_at(
            &ctx.config.camera,
            Vec3::new(0.0, 1.5, 4.0),
            Vec3::zeros(),
            ctx.extent.width,
            ctx.extent.height,
        )));
        ctx.bus.subscribe_all(&FLY_CAMERA_EVENTS, &camera);

        Ok(Self {
            pipeline,
            layout,
            shaders,
            descriptors,
            camera_buffer,
            texture,
            vertex_buffer,
            index_buffer,
            cube,
            camera,
            elapsed: 0.0,
        })
    }

    fn update(&mut self, delta_time: f32) {
        self.elapsed += delta_time;
    }

    fn record(&mut self, frame: &FrameInfo, pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()> {
        let camera = self.camera.borrow().ubo();
        self.camera_buffer.write(frame.slot, &[camera])?;

        let model: [[f32; 4]; 4] = cube_model(self.elapsed).into();
        pass.set_full_viewport();
        pass.cmd_bind_pipeline(self.pipeline.handle());
        pass.cmd_bind_descriptor_sets(self.layout.handle(), 0, &[self.descriptors.set_for(frame.slot)]);
        pass.cmd_bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        pass.cmd_bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        pass.cmd_push_constants(
            self.layout.handle(),
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&model),
        );
        self.cube.draw(pass, 1, 0);
        Ok(())
    }

    fn on_render_pass_changed(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()> {
        self.pipeline = self
            .shaders
            .pipeline::<Vertex>(context, &self.layout, render_pass, PipelineState::default())?;
        Ok(())
    }

    fn teardown(&mut self) {
        log::debug!(
            "Releasing {}x{} texture",
            self.texture.image().extent().width,
            self.texture.image().extent().height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_model_starts_unrotated() {
        let model = cube_model(0.0);
        assert_relative_eq!(model, Mat4::new_scaling(1.5), epsilon = 1e-6);
    }

    #[test]
    fn test_cube_model_keeps_scale_and_origin() {
        let model = cube_model(2.3);
        let x_axis = model.fixed_view::<3, 1>(0, 0).into_owned();
        assert_relative_eq!(x_axis.norm(), 1.5, epsilon = 1e-5);
        assert_relative_eq!(model[(0, 3)], 0.0);
        assert_relative_eq!(model[(1, 3)], 0.0);
        assert_relative_eq!(model[(2, 3)], 0.0);
    }

    #[test]
    fn test_missing_texture_is_an_error() {
        let result = ImageData::from_file("definitely/not/here/crate.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}
