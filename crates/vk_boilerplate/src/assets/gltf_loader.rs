//! glTF 2.0 scene loading
//!
//! Reads `.gltf` (with external or embedded buffers) and `.glb` files into a
//! flat description: meshes with their primitives, one instance per node
//! that references a mesh with the node's world transform, decoded images
//! and base-colour material references.

use std::path::Path;

use crate::assets::{AssetError, ImageData};
use crate::foundation::math::Mat4;
use crate::render::scene::{MeshData, Vertex};

/// One drawable primitive with every attribute the viewer understands
#[derive(Debug, Clone, Default)]
pub struct GltfPrimitive {
    /// POSITION, always present
    pub positions: Vec<[f32; 3]>,
    /// NORMAL, empty when absent
    pub normals: Vec<[f32; 3]>,
    /// xyz tangent, w handedness
    pub tangents: Vec<[f32; 4]>,
    /// TEXCOORD_0
    pub tex_coords: Vec<[f32; 2]>,
    /// COLOR_0 as linear RGBA
    pub colors: Vec<[f32; 4]>,
    /// JOINTS_0
    pub joints: Vec<[u16; 4]>,
    /// WEIGHTS_0
    pub weights: Vec<[f32; 4]>,
    /// Triangle list indices; sequential when the primitive has none
    pub indices: Vec<u32>,
    /// Index into [`GltfScene::materials`]
    pub material: Option<usize>,
}

impl GltfPrimitive {
    /// Interleave into the standard vertex format
    ///
    /// Missing attributes fall back to an up normal, zero UVs and white.
    pub fn to_mesh_data(&self) -> MeshData {
        let vertices = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex {
                position,
                normal: self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                tex_coord: self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                color: self.colors.get(i).copied().unwrap_or([1.0; 4]),
            })
            .collect();
        MeshData::new(vertices, self.indices.clone())
    }
}

/// A glTF mesh: the primitives that survived loading
#[derive(Debug, Clone, Default)]
pub struct GltfMesh {
    /// Mesh name from the file, if any
    pub name: Option<String>,
    /// Triangle primitives in file order
    pub primitives: Vec<GltfPrimitive>,
}

/// A node that draws a mesh
#[derive(Debug, Clone)]
pub struct MeshInstance {
    /// Index into [`GltfScene::meshes`]
    pub mesh: usize,
    /// Parent-to-child composed transform
    pub world: Mat4,
}

/// PBR metallic-roughness base colour
#[derive(Debug, Clone, PartialEq)]
pub struct GltfMaterial {
    /// Linear RGBA multiplier
    pub base_color_factor: [f32; 4],
    /// Index into [`GltfScene::images`]
    pub base_color_texture: Option<usize>,
}

/// Everything the viewer needs from a glTF file
#[derive(Debug, Clone, Default)]
pub struct GltfScene {
    /// Meshes in document order
    pub meshes: Vec<GltfMesh>,
    /// One entry per mesh-bearing node of the default scene
    pub instances: Vec<MeshInstance>,
    /// Materials in document order
    pub materials: Vec<GltfMaterial>,
    /// Decoded images as RGBA8
    pub images: Vec<ImageData>,
}

impl GltfScene {
    /// Load a `.gltf` or `.glb` file and whatever it references
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        log::debug!("Loading glTF from: {:?}", path);

        let (document, buffers, images) = gltf::import(path)?;
        let scene = Self::from_parts(&document, &buffers, images)?;

        log::info!(
            "Loaded glTF {:?}: {} mesh(es), {} instance(s), {} image(s)",
            path,
            scene.meshes.len(),
            scene.instances.len(),
            scene.images.len()
        );
        Ok(scene)
    }

    /// Load a self-contained glTF (usually a GLB) from memory
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AssetError> {
        let (document, buffers, images) = gltf::import_slice(bytes)?;
        Self::from_parts(&document, &buffers, images)
    }

    fn from_parts(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: Vec<gltf::image::Data>,
    ) -> Result<Self, AssetError> {
        let meshes = document
            .meshes()
            .map(|mesh| read_mesh(&mesh, buffers))
            .collect::<Result<Vec<_>, _>>()?;

        let materials = document
            .materials()
            .map(|material| {
                let pbr = material.pbr_metallic_roughness();
                GltfMaterial {
                    base_color_factor: pbr.base_color_factor(),
                    base_color_texture: pbr.base_color_texture().map(|info| info.texture().source().index()),
                }
            })
            .collect();

        let images = images.into_iter().map(convert_image).collect();

        let mut instances = Vec::new();
        let scene = document.default_scene().or_else(|| document.scenes().next());
        if let Some(scene) = scene {
            for node in scene.nodes() {
                collect_instances(&node, &Mat4::identity(), &mut instances);
            }
        }

        Ok(Self {
            meshes,
            instances,
            materials,
            images,
        })
    }

    /// Total primitives drawn across all instances
    pub fn draw_count(&self) -> usize {
        self.instances
            .iter()
            .map(|instance| self.meshes.get(instance.mesh).map_or(0, |mesh| mesh.primitives.len()))
            .sum()
    }
}

fn collect_instances(node: &gltf::Node<'_>, parent: &Mat4, out: &mut Vec<MeshInstance>) {
    let local = Mat4::from(node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        out.push(MeshInstance {
            mesh: mesh.index(),
            world,
        });
    }
    for child in node.children() {
        collect_instances(&child, &world, out);
    }
}

fn read_mesh(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> Result<GltfMesh, AssetError> {
    let mut primitives = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping {:?} primitive {} of mesh {}: only triangles are drawn",
                primitive.mode(),
                primitive.index(),
                mesh.index()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let Some(positions) = reader.read_positions() else {
            log::warn!(
                "Skipping primitive {} of mesh {}: no POSITION attribute",
                primitive.index(),
                mesh.index()
            );
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let vertex_count = positions.len();

        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect::<Vec<_>>(),
            None => (0..vertex_count as u32).collect(),
        };
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(AssetError::InvalidData(format!(
                "mesh {} primitive {}: index {} out of range for {} vertices",
                mesh.index(),
                primitive.index(),
                bad,
                vertex_count
            )));
        }

        primitives.push(GltfPrimitive {
            positions,
            normals: reader.read_normals().map(Iterator::collect).unwrap_or_default(),
            tangents: reader.read_tangents().map(Iterator::collect).unwrap_or_default(),
            tex_coords: reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().collect())
                .unwrap_or_default(),
            colors: reader
                .read_colors(0)
                .map(|c| c.into_rgba_f32().collect())
                .unwrap_or_default(),
            joints: reader.read_joints(0).map(|j| j.into_u16().collect()).unwrap_or_default(),
            weights: reader.read_weights(0).map(|w| w.into_f32().collect()).unwrap_or_default(),
            indices,
            material: primitive.material().index(),
        });
    }

    Ok(GltfMesh {
        name: mesh.name().map(str::to_string),
        primitives,
    })
}

fn convert_image(image: gltf::image::Data) -> ImageData {
    use gltf::image::Format;

    let expand = |channels: usize, fill: &dyn Fn(&[u8]) -> [u8; 4]| -> Vec<u8> {
        image.pixels.chunks_exact(channels).flat_map(fill).collect()
    };

    let data = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => expand(3, &|p| [p[0], p[1], p[2], 255]),
        Format::R8G8 => expand(2, &|p| [p[0], p[1], 0, 255]),
        Format::R8 => expand(1, &|p| [p[0], p[0], p[0], 255]),
        other => {
            log::warn!("Replacing {:?} image with white: only 8-bit channels are supported", other);
            return ImageData::solid_color(1, 1, [255; 4]);
        }
    };

    ImageData {
        data,
        width: image.width,
        height: image.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
        while bytes.len() % 4 != 0 {
            bytes.push(fill);
        }
    }

    fn png_2x2() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    /// Two-node hierarchy, one triangle, one point primitive and a PNG
    fn sample_glb() -> Vec<u8> {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        pad_to_four(&mut bin, 0);
        let png_offset = bin.len();
        let png = png_2x2();
        bin.extend_from_slice(&png);
        pad_to_four(&mut bin, 0);

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [
    {{ "translation": [1.0, 0.0, 0.0], "children": [1] }},
    {{ "translation": [0.0, 2.0, 0.0], "mesh": 0 }}
  ],
  "meshes": [ {{
    "name": "tri",
    "primitives": [
      {{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }},
      {{ "attributes": {{ "POSITION": 0 }}, "mode": 0 }}
    ]
  }} ],
  "materials": [ {{
    "pbrMetallicRoughness": {{
      "baseColorFactor": [1.0, 0.5, 0.25, 1.0],
      "baseColorTexture": {{ "index": 0 }}
    }}
  }} ],
  "textures": [ {{ "source": 0 }} ],
  "images": [ {{ "bufferView": 2, "mimeType": "image/png" }} ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": {png_offset}, "byteLength": {png_len} }}
  ],
  "buffers": [ {{ "byteLength": {bin_len} }} ]
}}"#,
            png_offset = png_offset,
            png_len = png.len(),
            bin_len = bin.len(),
        );
        pack_glb(json, bin)
    }

    fn pack_glb(json: String, bin: Vec<u8>) -> Vec<u8> {
        let mut json = json.into_bytes();
        pad_to_four(&mut json, b' ');

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn test_loads_generated_glb() {
        let scene = GltfScene::from_slice(&sample_glb()).unwrap();

        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name.as_deref(), Some("tri"));
        // Point primitive skipped
        assert_eq!(mesh.primitives.len(), 1);

        let primitive = &mesh.primitives[0];
        assert_eq!(primitive.positions.len(), 3);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.material, Some(0));
        assert!(primitive.normals.is_empty());
    }

    /// One triangle carrying every vertex attribute the loader reads, each
    /// in its own buffer view
    fn skinned_glb() -> Vec<u8> {
        let mut bin = Vec::new();
        let mut views = Vec::new();
        let mut push_view = |bytes: Vec<u8>| {
            views.push(format!(
                r#"{{ "buffer": 0, "byteOffset": {}, "byteLength": {} }}"#,
                bin.len(),
                bytes.len()
            ));
            bin.extend_from_slice(&bytes);
        };
        let floats = |values: &[f32]| values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();

        push_view(floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]));
        push_view(floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
        push_view(floats(&[1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, -1.0]));
        push_view(floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
        push_view(floats(&[1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5]));
        push_view([0u16, 1, 0, 0, 1, 2, 0, 0, 2, 3, 0, 0].iter().flat_map(|j| j.to_le_bytes()).collect());
        push_view(floats(&[1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.25, 0.75, 0.0, 0.0]));

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "mesh": 0 }} ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{
    "POSITION": 0, "NORMAL": 1, "TANGENT": 2, "TEXCOORD_0": 3,
    "COLOR_0": 4, "JOINTS_0": 5, "WEIGHTS_0": 6
  }} }} ] }} ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 4, "componentType": 5126, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 5, "componentType": 5123, "count": 3, "type": "VEC4" }},
    {{ "bufferView": 6, "componentType": 5126, "count": 3, "type": "VEC4" }}
  ],
  "bufferViews": [ {views} ],
  "buffers": [ {{ "byteLength": {bin_len} }} ]
}}"#,
            views = views.join(", "),
            bin_len = bin.len(),
        );
        pack_glb(json, bin)
    }

    #[test]
    fn test_reads_every_vertex_attribute() {
        let scene = GltfScene::from_slice(&skinned_glb()).unwrap();
        let primitive = &scene.meshes[0].primitives[0];

        assert_eq!(primitive.positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(primitive.normals, vec![[0.0, 0.0, 1.0]; 3]);
        assert_eq!(primitive.tangents.len(), 3);
        assert_relative_eq!(primitive.tangents[0][3], 1.0);
        assert_relative_eq!(primitive.tangents[2][3], -1.0);
        assert_eq!(primitive.tex_coords, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(primitive.colors.len(), 3);
        assert_eq!(primitive.colors[1], [0.0, 1.0, 0.0, 1.0]);
        assert_relative_eq!(primitive.colors[2][3], 0.5);
        assert_eq!(primitive.joints, vec![[0, 1, 0, 0], [1, 2, 0, 0], [2, 3, 0, 0]]);
        assert_eq!(primitive.weights.len(), 3);
        for (weights, first) in primitive.weights.iter().zip([1.0, 0.5, 0.25]) {
            assert_relative_eq!(weights[0], first);
            assert_relative_eq!(weights.iter().sum::<f32>(), 1.0);
        }
        // No index accessor: sequential indices
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.material, None);
    }

    #[test]
    fn test_mesh_data_keeps_present_attributes() {
        let scene = GltfScene::from_slice(&skinned_glb()).unwrap();
        let data = scene.meshes[0].primitives[0].to_mesh_data();
        assert_eq!(data.vertices[1].normal, [0.0, 0.0, 1.0]);
        assert_eq!(data.vertices[1].tex_coord, [1.0, 0.0]);
        assert_eq!(data.vertices[1].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_world_transforms_compose_parent_to_child() {
        let scene = GltfScene::from_slice(&sample_glb()).unwrap();

        assert_eq!(scene.instances.len(), 1);
        let world = scene.instances[0].world;
        let origin = world.transform_point(&nalgebra::Point3::origin());
        assert_relative_eq!(origin.coords, nalgebra::Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-6);
        assert_eq!(scene.draw_count(), 1);
    }

    #[test]
    fn test_material_and_image() {
        let scene = GltfScene::from_slice(&sample_glb()).unwrap();

        assert_eq!(
            scene.materials,
            vec![GltfMaterial {
                base_color_factor: [1.0, 0.5, 0.25, 1.0],
                base_color_texture: Some(0),
            }]
        );
        assert_eq!(scene.images.len(), 1);
        let image = &scene.images[0];
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(&image.data[0..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_mesh_data_defaults_missing_attributes() {
        let scene = GltfScene::from_slice(&sample_glb()).unwrap();
        let data = scene.meshes[0].primitives[0].to_mesh_data();
        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(data.vertices[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(data.vertices[1].color, [1.0; 4]);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(GltfScene::from_slice(b"glTF garbage").is_err());
        assert!(matches!(GltfScene::load("missing/model.glb"), Err(AssetError::NotFound(_))));
    }
}
