//! Vulkan-specific error types

use std::panic::Location;

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A Vulkan call failed; carries what was being attempted and where
    #[error("{location}: failed {intent}: {result:?}")]
    Call {
        /// What the call was trying to do
        intent: &'static str,
        /// Source location of the failing call
        location: &'static Location<'static>,
        /// Raw result code
        result: vk::Result,
    },

    /// The Vulkan loader could not be found
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device satisfies the queue/feature/surface requirements
    #[error("No suitable GPU found ({examined} device(s) examined)")]
    NoSuitableDevice {
        /// Number of physical devices enumerated
        examined: usize,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type for bits {type_bits:#b} with {flags:?}")]
    NoSuitableMemoryType {
        /// Memory type bits from the resource requirements
        type_bits: u32,
        /// Requested property flags
        flags: vk::MemoryPropertyFlags,
    },

    /// Only the upload path layout transitions are implemented
    #[error("Unsupported layout transition {from:?} -> {to:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        from: vk::ImageLayout,
        /// Requested layout
        to: vk::ImageLayout,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Shader file could not be read or is not valid SPIR-V
    #[error("Shader {path}: {reason}")]
    Shader {
        /// Offending file
        path: String,
        /// What went wrong
        reason: String,
    },
}

impl VulkanError {
    /// Raw result code, if this error came from the API
    pub fn result(&self) -> Option<vk::Result> {
        match self {
            Self::Api(result) | Self::Call { result, .. } => Some(*result),
            _ => None,
        }
    }

    /// Whether the swapchain no longer matches the surface
    pub fn is_out_of_date(&self) -> bool {
        self.result() == Some(vk::Result::ERROR_OUT_OF_DATE_KHR)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Attach intent and call site to raw `ash` results
pub trait VkResultExt<T> {
    /// Convert an `ash` error into [`VulkanError::Call`]
    fn during(self, intent: &'static str) -> VulkanResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[track_caller]
    fn during(self, intent: &'static str) -> VulkanResult<T> {
        let location = Location::caller();
        self.map_err(|result| {
            log::error!("{location}: failed {intent}: {result:?}");
            VulkanError::Call { intent, location, result }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_during_captures_call_site() {
        let raw: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = raw.during("submitting work").unwrap_err();
        match err {
            VulkanError::Call { intent, location, result } => {
                assert_eq!(intent, "submitting work");
                assert!(location.file().ends_with("error.rs"));
                assert_eq!(result, vk::Result::ERROR_DEVICE_LOST);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_out_of_date_detection() {
        assert!(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR).is_out_of_date());
        assert!(!VulkanError::InitializationFailed("x".into()).is_out_of_date());
    }
}
