//! SPIR-V shader modules
//!
//! Shaders are compiled ahead of time by the build script and loaded from the
//! configured shader directory at runtime.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use ash::{vk, Device};

use super::{VkResultExt, VulkanError, VulkanResult};

/// Entry point every shader in the samples uses
pub const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode SPIR-V bytes into words, checking length and magic number
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(format!("length {} is not a non-zero multiple of 4", bytes.len()));
    }
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(other) => Err(format!("bad magic number {other:#010x}")),
        None => Err("empty module".to_string()),
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, stage: vk::ShaderStageFlags, bytes: &[u8], origin: &str) -> VulkanResult<Self> {
        let code = parse_spirv(bytes).map_err(|reason| VulkanError::Shader {
            path: origin.to_string(),
            reason,
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None) }.during("creating shader module")?;

        log::debug!("Loaded {:?} shader {}", stage, origin);

        Ok(Self { device, module, stage })
    }

    /// Load shader from a SPIR-V file
    pub fn from_file(device: Device, stage: vk::ShaderStageFlags, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| VulkanError::Shader {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(device, stage, &bytes, &path.display().to_string())
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage this module was loaded for
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Stage create info using the `main` entry point
    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_valid_header() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0]);
        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_spirv(&[]).is_err());
        assert!(parse_spirv(&[1, 2, 3]).is_err());
        assert!(parse_spirv(&words_to_bytes(&[0xdead_beef, 0])).is_err());
    }
}
