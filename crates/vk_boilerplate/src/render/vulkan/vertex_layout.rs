//! Vertex input layouts
//!
//! Vertex types describe their own buffer layout so pipelines can be built
//! from the type alone.

use ash::vk;

/// A vertex type that knows how it is laid out in a vertex buffer
pub trait VertexLayout: bytemuck::Pod {
    /// Attribute descriptions, one per shader input location
    fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription>;

    /// Binding description for a tightly packed per-vertex buffer at binding 0
    fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }
}

/// Attribute at binding 0
pub fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        binding: 0,
        location,
        format,
        offset: offset as u32,
    }
}
