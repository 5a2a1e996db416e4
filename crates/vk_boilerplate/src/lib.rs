//! # Vulkan sample boilerplate
//!
//! The shared layer under the rendering samples:
//!
//! - **render::vulkan**: device bootstrap, swapchain, buffers and images,
//!   descriptor sets (including variable-count texture arrays), pipelines and
//!   frame-in-flight sequencing
//! - **render**: the swapchain-backed renderer, window, fly camera and scene
//!   data blocks
//! - **events** / **input**: an explicit event bus and window-independent
//!   input types
//! - **assets**: PNG/JPEG textures and glTF scenes
//! - **app**: the [`Sample`](app::Sample) trait and the [`run`](app::run)
//!   driver
//!
//! ```rust,no_run
//! use vk_boilerplate::prelude::*;
//!
//! struct Empty;
//!
//! impl Sample for Empty {
//!     fn init(_ctx: &SampleContext<'_>) -> Result<Self, AppError> {
//!         Ok(Empty)
//!     }
//!
//!     fn record(&mut self, _frame: &FrameInfo, _pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()> {
//!         Ok(())
//!     }
//!
//!     fn on_render_pass_changed(&mut self, _: &VulkanContext, _: &RenderPass) -> VulkanResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), AppError> {
//!     run::<Empty>(SampleConfig::new("Empty", 800, 600))
//! }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod app;
pub mod assets;
pub mod config;
pub mod events;
pub mod foundation;
pub mod input;
pub mod render;

pub use app::{run, AppError, Sample, SampleContext};

/// Common imports for samples
pub mod prelude {
    pub use crate::{
        app::{run, AppError, Sample, SampleContext},
        assets::{AssetError, GltfScene, ImageData},
        config::{Config, SampleConfig},
        events::{Event, EventBus, EventHandler, EventKind},
        foundation::{
            logging,
            math::{Mat4, Mat4Ext, Quat, Transform, Vec3, Vec4},
        },
        input::{Key, Modifiers, MouseButton, MouseButtons},
        render::{
            CameraUbo, ColorVertex, FlyCamera, FrameInfo, Light, Material, MeshData, MeshRange, ObjectData, Vertex,
            FLY_CAMERA_EVENTS,
        },
        render::vulkan::{
            ActiveRenderPass, BindingDesc, Buffer, DescriptorSetGroup, GraphicsPipeline, GraphicsPipelineDesc,
            PerFrameBuffer, PipelineLayout, PipelineState, RenderPass, ShaderModule, Texture, VulkanContext,
            VulkanError, VulkanResult,
        },
    };
}
