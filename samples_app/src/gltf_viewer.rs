//! glTF scene viewer
//!
//! Every primitive of every mesh is appended to one shared vertex/index
//! buffer pair. Each node instance becomes one draw per primitive, with its
//! world matrix, base colour and texture slot in push constants. All scene
//! images plus a white fallback sit in one variable-count sampler array.

use std::cell::RefCell;
use std::mem::size_of;
use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use vk_boilerplate::assets::GltfMaterial;
use vk_boilerplate::config::SampleConfig;
use vk_boilerplate::prelude::*;

use crate::shaders::{push_range, ShaderPair};

/// Model loaded when no path is given on the command line
pub const DEFAULT_MODEL: &str = "models/cube.gltf";

/// Upper bound of the texture array binding
pub const MAX_TEXTURES: u32 = 1024;

const PUSH_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Per-draw push constant block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawPush {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// Slot in the texture array
    pub texture_index: u32,
    pub _pad: [u32; 3],
}

/// One primitive of one node instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub range: MeshRange,
    pub push: DrawPush,
}

/// Command-line path if given, else the default model under the asset dir
pub fn model_path(arg: Option<String>, config: &SampleConfig) -> PathBuf {
    arg.map_or_else(|| config.paths.asset(DEFAULT_MODEL), PathBuf::from)
}

/// Texture array slot for a material; the fallback sits after the scene's
/// images
pub fn texture_slot(material: Option<&GltfMaterial>, image_count: usize) -> u32 {
    material
        .and_then(|m| m.base_color_texture)
        .filter(|&index| index < image_count)
        .unwrap_or(image_count) as u32
}

/// Shared geometry and the draw list for a scene
pub fn build_draws(scene: &GltfScene) -> (MeshData, Vec<DrawCommand>) {
    let mut geometry = MeshData::default();
    let ranges: Vec<Vec<(MeshRange, Option<usize>)>> = scene
        .meshes
        .iter()
        .map(|mesh| {
            mesh.primitives
                .iter()
                .map(|primitive| (geometry.append(&primitive.to_mesh_data()), primitive.material))
                .collect()
        })
        .collect();

    let mut draws = Vec::new();
    for instance in &scene.instances {
        let Some(primitives) = ranges.get(instance.mesh) else {
            log::warn!("Instance references missing mesh {}", instance.mesh);
            continue;
        };
        for &(range, material) in primitives {
            let material = material.and_then(|index| scene.materials.get(index));
            draws.push(DrawCommand {
                range,
                push: DrawPush {
                    model: instance.world.into(),
                    base_color: material.map_or([1.0; 4], |m| m.base_color_factor),
                    texture_index: texture_slot(material, scene.images.len()),
                    _pad: [0; 3],
                },
            });
        }
    }
    (geometry, draws)
}

/// World-space bounding box of every drawn vertex
pub fn scene_bounds(scene: &GltfScene) -> Option<(Vec3, Vec3)> {
    let mut bounds: Option<(Vec3, Vec3)> = None;
    for instance in &scene.instances {
        let Some(mesh) = scene.meshes.get(instance.mesh) else {
            continue;
        };
        for position in mesh.primitives.iter().flat_map(|p| &p.positions) {
            let world = instance.world.transform_point(&Vec3::from(*position).into()).coords;
            bounds = Some(match bounds {
                Some((min, max)) => (min.inf(&world), max.sup(&world)),
                None => (world, world),
            });
        }
    }
    bounds
}

/// Eye position and target that frame the bounds
fn framing(bounds: Option<(Vec3, Vec3)>) -> (Vec3, Vec3) {
    match bounds {
        Some((min, max)) => {
            let center = (min + max) * 0.5;
            let radius = ((max - min).norm() * 0.5).max(0.1);
            (center + Vec3::new(0.0, radius * 0.5, radius * 2.5), center)
        }
        None => (Vec3::new(0.0, 0.0, 3.0), Vec3::zeros()),
    }
}

fn bindings() -> [BindingDesc; 2] {
    [
        BindingDesc::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        BindingDesc::sampler_array(1, vk::ShaderStageFlags::FRAGMENT, MAX_TEXTURES),
    ]
}

/// Viewer state: shared geometry, textures and the draw list
pub struct GltfViewer {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
    shaders: ShaderPair,
    descriptors: DescriptorSetGroup,
    camera_buffer: PerFrameBuffer,
    textures: Vec<Texture>,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    draws: Vec<DrawCommand>,
    camera: Rc<RefCell<FlyCamera>>,
}

impl Sample for GltfViewer {
    fn init(ctx: &SampleContext<'_>) -> Result<Self, AppError> {
        let context = ctx.context.as_ref();
        let frames = ctx.frames_in_flight;

        let path = model_path(std::env::args().nth(1), ctx.config);
        let scene = GltfScene::load(&path)?;
        let (geometry, draws) = build_draws(&scene);
        if geometry.indices.is_empty() {
            return Err(AssetError::InvalidData(format!("{} has nothing to draw", path.display())).into());
        }

        let mut textures = scene
            .images
            .iter()
            .map(|image| Texture::from_rgba8(context, image.width, image.height, &image.data))
            .collect::<Result<Vec<_>, _>>()?;
        textures.push(Texture::solid(context, [255; 4])?);
        let texture_count = textures.len() as u32;
        if texture_count > MAX_TEXTURES {
            return Err(AssetError::InvalidData(format!(
                "{} texture(s) exceed the array bound of {}",
                texture_count, MAX_TEXTURES
            ))
            .into());
        }

        let camera_buffer = PerFrameBuffer::new(
            context,
            frames,
            size_of::<CameraUbo>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let descriptors = DescriptorSetGroup::new(context.raw_device(), &bindings(), frames, texture_count)?;
        let infos: Vec<vk::DescriptorImageInfo> = textures.iter().map(Texture::descriptor_info).collect();
        for slot in 0..frames {
            descriptors.write_buffer(slot, 0, camera_buffer.descriptor_info(slot))?;
            descriptors.write_image_array(slot, 1, &infos)?;
        }

        let shaders = ShaderPair::load(context, ctx.config, "gltf")?;
        let layout = PipelineLayout::new(
            context.raw_device(),
            &[descriptors.layout()],
            &[push_range::<DrawPush>(PUSH_STAGES)],
        )?;
        let pipeline = shaders.pipeline::<Vertex>(context, &layout, ctx.render_pass, PipelineState::default())?;

        let vertex_buffer =
            Buffer::device_local_with_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, &geometry.vertices)?;
        let index_buffer =
            Buffer::device_local_with_data(context, vk::BufferUsageFlags::INDEX_BUFFER, &geometry.indices)?;

        let (eye, target) = framing(scene_bounds(&scene));
        let camera = Rc::new(RefCell::new(FlyCamera::looking_at(
            &ctx.config.camera,
            eye,
            target,
            ctx.extent.width,
            ctx.extent.height,
        )));
        ctx.bus.subscribe_all(&FLY_CAMERA_EVENTS, &camera);

        log::info!(
            "Viewing {:?}: {} draw(s), {} vertices, {} texture(s)",
            path,
            draws.len(),
            geometry.vertices.len(),
            texture_count
        );

        Ok(Self {
            pipeline,
            layout,
            shaders,
            descriptors,
            camera_buffer,
            textures,
            vertex_buffer,
            index_buffer,
            draws,
            camera,
        })
    }

    fn record(&mut self, frame: &FrameInfo, pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()> {
        let camera = self.camera.borrow().ubo();
        self.camera_buffer.write(frame.slot, &[camera])?;

        pass.set_full_viewport();
        pass.cmd_bind_pipeline(self.pipeline.handle());
        pass.cmd_bind_descriptor_sets(self.layout.handle(), 0, &[self.descriptors.set_for(frame.slot)]);
        pass.cmd_bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        pass.cmd_bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
        for draw in &self.draws {
            pass.cmd_push_constants(self.layout.handle(), PUSH_STAGES, 0, bytemuck::bytes_of(&draw.push));
            draw.range.draw(pass, 1, 0);
        }
        Ok(())
    }

    fn on_render_pass_changed(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()> {
        self.pipeline = self
            .shaders
            .pipeline::<Vertex>(context, &self.layout, render_pass, PipelineState::default())?;
        Ok(())
    }

    fn teardown(&mut self) {
        log::debug!("Releasing {} texture(s)", self.textures.len());
    }
}
