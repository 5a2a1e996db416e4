//! Vulkan rendering backend
//!
//! Thin RAII wrappers over `ash`. Each wrapper owns a clone of the logical
//! device handle and destroys its object on drop; owners declare fields in
//! the order they must be destroyed.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod image;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex_layout;

pub use buffer::{Buffer, PerFrameBuffer, SlotLayout};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{
    LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, Surface, VulkanContext, VulkanInstance,
};
pub use descriptors::{BindingDesc, DescriptorSetGroup};
pub use error::{VkResultExt, VulkanError, VulkanResult};
pub use frame::{AcquireOutcome, FrameBackend, FrameOutcome, FrameScheduler, PresentOutcome, SlotState};
pub use framebuffer::Framebuffer;
pub use image::{DepthBuffer, Image, Texture};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineDesc, PipelineLayout, PipelineState};
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use swapchain::{RebuildStep, Swapchain, SwapchainTarget};
pub use sync::{Fence, FrameSync, Semaphore};
pub use vertex_layout::VertexLayout;
