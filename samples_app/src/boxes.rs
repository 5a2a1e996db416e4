//! Instanced Phong-lit cubes
//!
//! Every cube shares one mesh range and is drawn in a single instanced call;
//! the vertex shader picks its transform out of a storage buffer by instance
//! index. Camera, objects, materials and lights live in per-frame buffers
//! that are rewritten in full every frame.

use std::cell::RefCell;
use std::mem::size_of;
use std::rc::Rc;

use ash::vk;
use vk_boilerplate::prelude::*;

use crate::shaders::{push_range, ShaderPair};

/// Cubes along each side of the grid
pub const GRID_SIDE: usize = 4;
/// Distance between neighbouring cube centres
pub const GRID_SPACING: f32 = 2.0;

const MATERIAL_BINDING: u32 = 2;
const LIGHT_BINDING: u32 = 3;

/// Cube centres on a `side` x `side` grid in the XZ plane, centred on the origin
pub fn grid_positions(side: usize, spacing: f32) -> Vec<Vec3> {
    let half = (side.saturating_sub(1)) as f32 * spacing * 0.5;
    let mut positions = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            positions.push(Vec3::new(col as f32 * spacing - half, 0.0, row as f32 * spacing - half));
        }
    }
    positions
}

/// Per-instance data at `time` seconds; each cube spins at its own rate
pub fn box_objects(positions: &[Vec3], time: f32, material_count: u32) -> Vec<ObjectData> {
    positions
        .iter()
        .enumerate()
        .map(|(i, position)| {
            let speed = 0.5 + 0.25 * (i % 4) as f32;
            let rotation = Quat::from_axis_angle(&Vec3::y_axis(), time * speed);
            let model = Transform::from_position(*position)
                .with_rotation(rotation)
                .with_uniform_scale(1.2)
                .to_matrix();
            ObjectData::new(&model, i as u32 % material_count.max(1))
        })
        .collect()
}

fn default_materials() -> Vec<Material> {
    vec![
        Material::phong(Vec3::new(0.9, 0.3, 0.2), 32.0),
        Material::phong(Vec3::new(0.2, 0.7, 0.3), 16.0),
        Material::phong(Vec3::new(0.2, 0.4, 0.9), 64.0),
        Material::phong(Vec3::new(0.9, 0.8, 0.3), 8.0),
    ]
}

fn default_lights() -> Vec<Light> {
    vec![
        Light::point(Vec3::new(4.0, 5.0, 4.0), Vec3::new(1.0, 0.95, 0.9), 1.5),
        Light::point(Vec3::new(-5.0, 3.0, -2.0), Vec3::new(0.4, 0.5, 1.0), 0.8),
    ]
}

fn bindings() -> [BindingDesc; 4] {
    [
        BindingDesc::uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
        BindingDesc::storage_buffer(1, vk::ShaderStageFlags::VERTEX),
        BindingDesc::storage_buffer(MATERIAL_BINDING, vk::ShaderStageFlags::FRAGMENT),
        BindingDesc::storage_buffer(LIGHT_BINDING, vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Boxes sample state
pub struct Boxes {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
    shaders: ShaderPair,
    descriptors: DescriptorSetGroup,
    camera_buffer: PerFrameBuffer,
    object_buffer: PerFrameBuffer,
    material_buffer: PerFrameBuffer,
    light_buffer: PerFrameBuffer,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    cube: MeshRange,
    positions: Vec<Vec3>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    camera: Rc<RefCell<FlyCamera>>,
    elapsed: f32,
}

impl Sample for Boxes {
    fn init(ctx: &SampleContext<'_>) -> Result<Self, AppError> {
        let context = ctx.context.as_ref();
        let frames = ctx.frames_in_flight;

        let positions = grid_positions(GRID_SIDE, GRID_SPACING);
        let materials = default_materials();
        let lights = default_lights();

        let camera_buffer = PerFrameBuffer::new(
            context,
            frames,
            size_of::<CameraUbo>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let object_buffer = PerFrameBuffer::new(
            context,
            frames,
            (size_of::<ObjectData>() * positions.len()) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let material_buffer = PerFrameBuffer::new(
            context,
            frames,
            (size_of::<Material>() * materials.len()) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let light_buffer = PerFrameBuffer::new(
            context,
            frames,
            (size_of::<Light>() * lights.len()) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;

        let descriptors = DescriptorSetGroup::new(context.raw_device(), &bindings(), frames, 0)?;
        for slot in 0..frames {
            descriptors.write_buffer(slot, 0, camera_buffer.descriptor_info(slot))?;
            descriptors.write_buffer(slot, 1, object_buffer.descriptor_info(slot))?;
            descriptors.write_buffer(slot, MATERIAL_BINDING, material_buffer.descriptor_info(slot))?;
            descriptors.write_buffer(slot, LIGHT_BINDING, light_buffer.descriptor_info(slot))?;
        }

        let shaders = ShaderPair::load(context, ctx.config, "phong")?;
        let layout = PipelineLayout::new(
            context.raw_device(),
            &[descriptors.layout()],
            &[push_range::<u32>(vk::ShaderStageFlags::FRAGMENT)],
        )?;
        let pipeline = shaders.pipeline::<Vertex>(context, &layout, ctx.render_pass, PipelineState::default())?;

        let mut mesh = MeshData::default();
        let cube = mesh.append(&MeshData::cube());
        let vertex_buffer =
            Buffer::device_local_with_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, &mesh.vertices)?;
        let index_buffer = Buffer::device_local_with_data(context, vk::BufferUsageFlags::INDEX_BUFFER, &mesh.indices)?;

        let camera = Rc::new(RefCell::new(FlyCamera::looking_at(
            &ctx.config.camera,
            Vec3::new(0.0, 6.0, 10.0),
            Vec3::zeros(),
            ctx.extent.width,
            ctx.extent.height,
        )));
        ctx.bus.subscribe_all(&FLY_CAMERA_EVENTS, &camera);

        log::info!(
            "Boxes: {} cube(s), {} material(s), {} light(s)",
            positions.len(),
            materials.len(),
            lights.len()
        );

        Ok(Self {
            pipeline,
            layout,
            shaders,
            descriptors,
            camera_buffer,
            object_buffer,
            material_buffer,
            light_buffer,
            vertex_buffer,
            index_buffer,
            cube,
            positions,
            materials,
            lights,
            camera,
            elapsed: 0.0,
        })
    }

    fn update(&mut self, delta_time: f32) {
        self.elapsed += delta_time;
    }

    fn record(&mut self, frame: &FrameInfo, pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()> {
        let slot = frame.slot;
        let camera = self.camera.borrow().ubo();
        let objects = box_objects(&self.positions, self.elapsed, self.materials.len() as u32);

        self.camera_buffer.write(slot, &[camera])?;
        self.object_buffer.write(slot, &objects)?;
        self.material_buffer.write(slot, &self.materials)?;
        self.light_buffer.write(slot, &self.lights)?;

        let light_count = self.lights.len() as u32;
        pass.set_full_viewport();
        pass.cmd_bind_pipeline(self.pipeline.handle());
        pass.cmd_bind_descriptor_sets(self.layout.handle(), 0, &[self.descriptors.set_for(slot)]);
        pass.cmd_bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        pass.cmd_bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        pass.cmd_push_constants(
            self.layout.handle(),
            vk::ShaderStageFlags::FRAGMENT,
            0,
            bytemuck::bytes_of(&light_count),
        );
        self.cube.draw(pass, objects.len() as u32, 0);
        Ok(())
    }

    fn on_render_pass_changed(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()> {
        self.pipeline = self
            .shaders
            .pipeline::<Vertex>(context, &self.layout, render_pass, PipelineState::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_is_centred() {
        let positions = grid_positions(4, 2.0);
        assert_eq!(positions.len(), 16);

        let sum = positions.iter().fold(Vec3::zeros(), |acc, p| acc + p);
        assert_relative_eq!(sum, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(positions[0], Vec3::new(-3.0, 0.0, -3.0));
        assert_relative_eq!(positions[15], Vec3::new(3.0, 0.0, 3.0));
    }

    #[test]
    fn test_single_cube_grid_sits_at_origin() {
        assert_eq!(grid_positions(1, 5.0), vec![Vec3::zeros()]);
        assert!(grid_positions(0, 5.0).is_empty());
    }

    #[test]
    fn test_box_objects_cycle_materials() {
        let positions = grid_positions(3, 1.0);
        let objects = box_objects(&positions, 0.0, 4);
        let indices: Vec<u32> = objects.iter().map(|o| o.material_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_box_objects_translate_to_grid() {
        let positions = grid_positions(2, 4.0);
        let objects = box_objects(&positions, 1.7, 1);
        for (object, position) in objects.iter().zip(&positions) {
            let model = Mat4::from(object.model);
            assert_relative_eq!(model[(0, 3)], position.x, epsilon = 1e-5);
            assert_relative_eq!(model[(1, 3)], position.y, epsilon = 1e-5);
            assert_relative_eq!(model[(2, 3)], position.z, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_descriptor_bindings_match_shader() {
        let bindings = bindings();
        assert_eq!(bindings[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        for desc in &bindings[1..] {
            assert_eq!(desc.ty, vk::DescriptorType::STORAGE_BUFFER);
        }
        assert_eq!(
            bindings.iter().map(|d| d.binding).collect::<Vec<_>>(),
            vec![0, 1, MATERIAL_BINDING, LIGHT_BINDING]
        );
    }
}
