//! Asset loading
//!
//! Decodes textures and glTF scenes into plain CPU-side data; uploading is
//! left to the samples.

pub mod gltf_loader;
pub mod image_loader;

pub use gltf_loader::{GltfMaterial, GltfMesh, GltfPrimitive, GltfScene, MeshInstance};
pub use image_loader::ImageData;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Malformed or unreadable glTF
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
