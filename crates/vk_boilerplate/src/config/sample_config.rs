//! Per-sample configuration
//!
//! Each sample starts from a hard-coded [`SampleConfig`] (fixed size and
//! title) and may be overridden by a `samples.toml` next to the executable's
//! working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// File looked up in the working directory by [`SampleConfig::with_overrides`]
pub const OVERRIDE_FILE: &str = "samples.toml";

/// Window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial framebuffer width
    pub width: u32,
    /// Initial framebuffer height
    pub height: u32,
    /// Window title
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Vulkan Sample".to_string(),
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots (2 = double buffering, 3 = triple)
    pub frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Colour the swapchain image is cleared to
    pub clear_color: [f32; 4],
    /// Prefer FIFO over MAILBOX presentation
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            enable_validation: None,
            clear_color: [0.02, 0.02, 0.03, 1.0],
            vsync: false,
        }
    }
}

impl RendererConfig {
    /// Validation resolved against the build type
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

/// Where shaders and assets are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory holding compiled `.spv` files
    pub shader_dir: PathBuf,
    /// Directory holding textures and glTF models
    pub asset_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("target/shaders"),
            asset_dir: PathBuf::from("resources"),
        }
    }
}

impl PathConfig {
    /// Resolve a shader file name against the shader directory
    pub fn shader(&self, name: &str) -> PathBuf {
        self.shader_dir.join(name)
    }

    /// Resolve an asset path against the asset directory
    pub fn asset(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.asset_dir.join(relative)
    }
}

/// Fly camera settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// World units moved per key press
    pub move_speed: f32,
    /// Degrees of rotation per pixel of mouse movement
    pub mouse_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 256.0,
            move_speed: 0.25,
            mouse_sensitivity: 0.1,
        }
    }
}

/// Complete configuration of one sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Shader and asset locations
    pub paths: PathConfig,
    /// Camera settings
    pub camera: CameraConfig,
}

impl Config for SampleConfig {}

impl SampleConfig {
    /// Create a configuration with a fixed window size and title
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            window: WindowConfig {
                width,
                height,
                title: title.into(),
            },
            log_level: "info".to_string(),
            ..Default::default()
        }
    }

    /// Merge `samples.toml` from the working directory if present
    ///
    /// The title always stays the sample's own.
    pub fn with_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(Path::new(OVERRIDE_FILE))
    }

    /// Merge an override file if it exists
    pub fn with_overrides_from(self, path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(self);
        }
        log::info!("Loading config overrides from {}", path.display());
        let mut loaded = Self::load_from_file(path)?;
        loaded.window.title = self.window.title;
        if loaded.log_level.is_empty() {
            loaded.log_level = self.log_level;
        }
        Ok(loaded)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }
        if !(1..=3).contains(&self.renderer.frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be between 1 and 3, got {}",
                self.renderer.frames_in_flight
            )));
        }
        if self.camera.near <= 0.0 || self.camera.near >= self.camera.far {
            return Err(ConfigError::Invalid(format!(
                "camera planes must satisfy 0 < near < far (near = {}, far = {})",
                self.camera.near, self.camera.far
            )));
        }
        Ok(())
    }
}
