//! GPU-facing scene data
//!
//! Vertex formats, mesh ranges inside shared vertex/index buffers, and the
//! `#[repr(C)]` blocks the sample shaders read from uniform and storage
//! buffers. Field order and padding follow std140/std430 so the structs can
//! be copied into mapped memory with `bytemuck`.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::offset_of;

use crate::foundation::math::{Mat4, Vec3};
use crate::render::vulkan::vertex_layout::{attribute, VertexLayout};
use crate::render::vulkan::CommandRecorder;

/// Standard vertex used by the lit and textured samples
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
    /// Vertex colour, multiplied into the material
    pub color: [f32; 4],
}

impl Vertex {
    /// White vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            color: [1.0; 4],
        }
    }
}

impl VertexLayout for Vertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
            attribute(3, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Vertex, color)),
        ]
    }
}

/// Position and colour only, for the triangle sample
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    /// Clip-space position
    pub position: [f32; 2],
    /// RGB colour
    pub color: [f32; 3],
}

impl VertexLayout for ColorVertex {
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            attribute(0, vk::Format::R32G32_SFLOAT, offset_of!(ColorVertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(ColorVertex, color)),
        ]
    }
}

/// A contiguous range of a shared index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshRange {
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Added to every index before fetching
    pub vertex_offset: i32,
}

impl MeshRange {
    /// Record an indexed draw of this range
    pub fn draw(&self, recorder: &mut CommandRecorder, instance_count: u32, first_instance: u32) {
        recorder.cmd_draw_indexed(
            self.index_count,
            instance_count,
            self.first_index,
            self.vertex_offset,
            first_instance,
        );
    }
}

/// CPU-side geometry, appended into shared buffers before upload
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Wrap existing geometry
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Append `other` and return where it landed
    pub fn append(&mut self, other: &MeshData) -> MeshRange {
        let range = MeshRange {
            first_index: self.indices.len() as u32,
            index_count: other.indices.len() as u32,
            vertex_offset: self.vertices.len() as i32,
        };
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend_from_slice(&other.indices);
        range
    }

    /// Unit cube centred at the origin with per-face normals
    ///
    /// 24 vertices so each face carries its own normal and UVs; faces wind
    /// counter-clockwise seen from outside.
    pub fn cube() -> Self {
        // (normal, u axis, v axis)
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let n = Vec3::from(normal) * 0.5;
            let u = Vec3::from(u) * 0.5;
            let v = Vec3::from(v) * 0.5;
            let base = vertices.len() as u32;
            for (su, sv, uv) in [(-1.0, -1.0, [0.0, 1.0]), (1.0, -1.0, [1.0, 1.0]), (1.0, 1.0, [1.0, 0.0]), (-1.0, 1.0, [0.0, 0.0])] {
                let p = n + u * su + v * sv;
                vertices.push(Vertex::new([p.x, p.y, p.z], normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }
}

/// Camera block shared by the 3D samples
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUbo {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// `projection * view`
    pub view_projection: [[f32; 4]; 4],
    /// World-space eye position, w unused
    pub position: [f32; 4],
}

impl CameraUbo {
    /// Pack matrices and eye position
    pub fn new(view: &Mat4, projection: &Mat4, position: Vec3) -> Self {
        Self {
            view: (*view).into(),
            projection: (*projection).into(),
            view_projection: (projection * view).into(),
            position: [position.x, position.y, position.z, 1.0],
        }
    }
}

/// Per-object transforms in a storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectData {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model matrix, for normals
    pub normal_matrix: [[f32; 4]; 4],
    /// Index into the material buffer
    pub material_index: u32,
    /// std430 padding
    pub _pad: [u32; 3],
}

impl ObjectData {
    /// Derives the normal matrix; a singular model falls back to identity
    pub fn new(model: &Mat4, material_index: u32) -> Self {
        let normal_matrix = model.try_inverse().unwrap_or_else(Mat4::identity).transpose();
        Self {
            model: (*model).into(),
            normal_matrix: normal_matrix.into(),
            material_index,
            _pad: [0; 3],
        }
    }
}

/// Phong material in a storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    /// rgb ambient colour
    pub ambient: [f32; 4],
    /// rgb diffuse colour
    pub diffuse: [f32; 4],
    /// rgb specular colour, w shininess
    pub specular: [f32; 4],
}

impl Material {
    /// Ambient at a tenth of `color`, grey specular
    pub fn phong(color: Vec3, shininess: f32) -> Self {
        Self {
            ambient: [color.x * 0.1, color.y * 0.1, color.z * 0.1, 1.0],
            diffuse: [color.x, color.y, color.z, 1.0],
            specular: [0.5, 0.5, 0.5, shininess],
        }
    }
}

/// Point light in a storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    /// World position, w unused
    pub position: [f32; 4],
    /// rgb colour, w intensity
    pub color: [f32; 4],
}

impl Light {
    /// Point light at `position`
    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            position: [position.x, position.y, position.z, 1.0],
            color: [color.x, color.y, color.z, intensity],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_geometry() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(cube.vertices[i as usize].position));
            let face_normal = (b - a).cross(&(c - a)).normalize();
            let stored = Vec3::from(cube.vertices[tri[0] as usize].normal);
            // Counter-clockwise from outside
            assert_relative_eq!(face_normal, stored, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_append_offsets() {
        let mut shared = MeshData::default();
        let first = shared.append(&MeshData::cube());
        let second = shared.append(&MeshData::cube());
        assert_eq!(first, MeshRange { first_index: 0, index_count: 36, vertex_offset: 0 });
        assert_eq!(second, MeshRange { first_index: 36, index_count: 36, vertex_offset: 24 });
        assert_eq!(shared.indices.len(), 72);
    }

    #[test]
    fn test_gpu_block_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        assert_eq!(std::mem::size_of::<CameraUbo>(), 208);
        assert_eq!(std::mem::size_of::<ObjectData>() % 16, 0);
        assert_eq!(std::mem::size_of::<Material>(), 48);
        assert_eq!(std::mem::size_of::<Light>(), 32);
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 48);
        let offsets: Vec<u32> = Vertex::attribute_descriptions().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }
}
