//! # Rendering
//!
//! The Vulkan layer shared by every sample:
//! - **vulkan**: RAII wrappers over device objects, descriptors, pipelines
//!   and frame sequencing
//! - **renderer**: swapchain ownership, rebuilds and the per-frame
//!   submit/present loop
//! - **window**: GLFW window and event decoding
//! - **camera**: fly camera driven by the event bus
//! - **scene**: vertex formats and shader-visible data blocks

pub mod camera;
pub mod renderer;
pub mod scene;
pub mod vulkan;
pub mod window;

pub use camera::{FlyCamera, FLY_CAMERA_EVENTS};
pub use renderer::{FrameInfo, RebuildOutcome, Renderer};
pub use scene::{CameraUbo, ColorVertex, Light, Material, MeshData, MeshRange, ObjectData, Vertex};
pub use window::{Window, WindowError};
