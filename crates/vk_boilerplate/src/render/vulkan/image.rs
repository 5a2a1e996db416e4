//! Images, textures and depth buffers
//!
//! Sampled textures are uploaded through a staging buffer. Only the two
//! layout transitions that upload needs are supported.

use ash::{vk, Device, Instance};

use super::buffer::Buffer;
use super::commands::CommandRecorder;
use super::memory::find_memory_type;
use super::{VkResultExt, VulkanContext, VulkanError, VulkanResult};

/// Access masks and pipeline stages for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Accesses that must complete before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that waits on the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier parameters for a layout transition
///
/// Only `UNDEFINED -> TRANSFER_DST_OPTIMAL` and
/// `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL` are known.
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (from, to) => Err(VulkanError::UnsupportedLayoutTransition { from, to }),
    }
}

/// 2D image with bound memory and a default view
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
    aspect: vk::ImageAspectFlags,
}

impl Image {
    /// Create a single-mip, single-layer, optimally tiled device-local image
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_create_info, None) }.during("creating image")?;

        let memory = match Self::bind_memory(&device, context.memory_properties(), image) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view_create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(Self::full_range(aspect));

        let view = match unsafe { device.create_image_view(&view_create_info, None) }.during("creating image view") {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        log::debug!("Created image: {}x{} {:?}", extent.width, extent.height, format);

        Ok(Self {
            device,
            image,
            memory,
            view,
            format,
            extent,
            aspect,
        })
    }

    fn bind_memory(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        image: vk::Image,
    ) -> VulkanResult<vk::DeviceMemory> {
        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { device.allocate_memory(&alloc_info, None) }.during("allocating image memory")?;

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) }.during("binding image memory") {
            unsafe { device.free_memory(memory, None) };
            return Err(e);
        }
        Ok(memory)
    }

    fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Record a layout transition barrier
    pub fn record_transition(
        &self,
        recorder: &mut CommandRecorder,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks = transition_masks(old, new)?;
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(Self::full_range(self.aspect))
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();
        recorder.cmd_image_barrier(masks.src_stage, masks.dst_stage, barrier);
        Ok(())
    }

    /// Get the image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the default view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Sampled image with its own sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image: Image,
}

impl Texture {
    /// Upload tightly packed RGBA8 pixels as an sRGB texture
    pub fn from_rgba8(context: &VulkanContext, width: u32, height: u32, pixels: &[u8]) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture {}x{} needs {} bytes of RGBA8, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            });
        }

        let mut staging =
            Buffer::host_visible(context, pixels.len() as vk::DeviceSize, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write(0, pixels)?;

        let extent = vk::Extent2D { width, height };
        let image = Image::new(
            context,
            extent,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        context.upload_pool().submit_one_time(|recorder| {
            image.record_transition(recorder, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
            recorder.cmd_copy_buffer_to_image(staging.handle(), image.handle(), extent);
            image.record_transition(
                recorder,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        })?;

        let device = context.raw_device();
        let max_anisotropy = context.physical_device().limits().max_sampler_anisotropy;
        let anisotropy = context.physical_device().features.sampler_anisotropy == vk::TRUE;

        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { max_anisotropy.min(16.0) } else { 1.0 })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.create_sampler(&sampler_create_info, None) }.during("creating sampler")?;

        Ok(Self { device, sampler, image })
    }

    /// Upload a solid 1x1 texture
    pub fn solid(context: &VulkanContext, rgba: [u8; 4]) -> VulkanResult<Self> {
        Self::from_rgba8(context, 1, 1, &rgba)
    }

    /// Descriptor info for a combined image sampler binding
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Underlying image
    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Pick the first depth format usable as an optimally tiled attachment
pub fn select_depth_format(instance: &Instance, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::Format> {
    [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ]
    .into_iter()
    .find(|&format| {
        let properties = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
    .ok_or_else(|| VulkanError::InitializationFailed("no supported depth format".to_string()))
}

/// Depth attachment matching a swapchain extent
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// Create a depth buffer of the given size
    pub fn new(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let image = Image::new(
            context,
            extent,
            context.depth_format(),
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        Ok(Self { image })
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type L = vk::ImageLayout;

    #[test]
    fn test_upload_transitions() {
        let to_dst = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(to_dst.src_access, vk::AccessFlags::empty());
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_read = transition_masks(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_read.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_other_transitions_are_rejected() {
        let layouts = [
            L::UNDEFINED,
            L::GENERAL,
            L::COLOR_ATTACHMENT_OPTIMAL,
            L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            L::SHADER_READ_ONLY_OPTIMAL,
            L::TRANSFER_SRC_OPTIMAL,
            L::TRANSFER_DST_OPTIMAL,
            L::PRESENT_SRC_KHR,
        ];
        let supported = [
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL),
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL),
        ];

        for &old in &layouts {
            for &new in &layouts {
                let result = transition_masks(old, new);
                if supported.contains(&(old, new)) {
                    assert!(result.is_ok());
                } else {
                    match result {
                        Err(VulkanError::UnsupportedLayoutTransition { from, to }) => {
                            assert_eq!((from, to), (old, new));
                        }
                        other => panic!("{old:?} -> {new:?} gave {other:?}"),
                    }
                }
            }
        }
    }
}
