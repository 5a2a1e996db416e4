//! Vulkan swapchain management
//!
//! The swapchain with its image views, the per-image depth buffers and
//! framebuffers that render into it, and the ordered plan the renderer
//! follows to rebuild them when the surface changes.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::framebuffer::Framebuffer;
use super::image::DepthBuffer;
use super::{VkResultExt, VulkanContext, VulkanError, VulkanResult};

/// Prefer `B8G8R8A8_SRGB` with the sRGB non-linear colour space, else the
/// first format the surface reports
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Whether a render pass built for `pass_format` no longer matches the
/// format the next swapchain will pick from `formats`
pub fn render_pass_outdated(pass_format: vk::Format, formats: &[vk::SurfaceFormatKHR]) -> Option<bool> {
    choose_surface_format(formats).map(|next| next.format != pass_format)
}

/// Prefer `MAILBOX` unless vsync is requested; `FIFO` is always available
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's extent when it dictates one, else clamp the window's
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the context's surface
    ///
    /// `old` hands the retiring swapchain to the driver; it is still
    /// destroyed by its own `Drop` afterwards.
    pub fn new(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        vsync: bool,
        old: Option<&Swapchain>,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let physical_device = context.physical_device().device;
        let surface = context.surface();

        let caps = surface.capabilities(physical_device)?;
        let format = choose_surface_format(&surface.formats(physical_device)?)
            .ok_or_else(|| VulkanError::InitializationFailed("surface reports no formats".to_string()))?;
        let present_mode = choose_present_mode(&surface.present_modes(physical_device)?, vsync);
        let extent = choose_extent(&caps, window_extent);
        let image_count = choose_image_count(&caps);

        let families = context.queue_families();
        let family_indices = [families.graphics, families.present];
        let (sharing_mode, shared_families) = if families.graphics == families.present {
            (vk::SharingMode::EXCLUSIVE, &family_indices[..0])
        } else {
            (vk::SharingMode::CONCURRENT, &family_indices[..])
        };

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), Swapchain::handle));

        let swapchain_loader = context.swapchain_loader().clone();
        let swapchain = unsafe { swapchain_loader.create_swapchain(&swapchain_create_info, None) }
            .during("creating swapchain")?;

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) }.during("getting swapchain images")
        {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        // Built before the views so a failure part way still cleans up
        let mut this = Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views: Vec::new(),
            format,
            extent,
        };

        for &image in &this.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { this.device.create_image_view(&create_info, None) }
                .during("creating swapchain image view")?;
            this.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {}x{}, {} image(s), {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );

        Ok(this)
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Depth buffers and framebuffers for every swapchain image
///
/// Fields drop top to bottom, framebuffers before the attachments they
/// reference.
pub struct SwapchainTarget {
    framebuffers: Vec<Framebuffer>,
    depth_buffers: Vec<DepthBuffer>,
}

impl SwapchainTarget {
    /// Create per-image depth buffers
    pub fn create_depth_buffers(context: &VulkanContext, swapchain: &Swapchain) -> VulkanResult<Vec<DepthBuffer>> {
        (0..swapchain.image_count())
            .map(|_| DepthBuffer::new(context, swapchain.extent()))
            .collect()
    }

    /// Create per-image framebuffers pairing colour and depth views
    pub fn create_framebuffers(
        device: &Device,
        swapchain: &Swapchain,
        depth_buffers: &[DepthBuffer],
        render_pass: vk::RenderPass,
    ) -> VulkanResult<Vec<Framebuffer>> {
        swapchain
            .image_views()
            .iter()
            .zip(depth_buffers)
            .map(|(&color, depth)| {
                Framebuffer::new(
                    device.clone(),
                    render_pass,
                    &[color, depth.image_view()],
                    swapchain.extent(),
                )
            })
            .collect()
    }

    /// Build depth buffers and framebuffers in one go
    pub fn new(context: &VulkanContext, swapchain: &Swapchain, render_pass: vk::RenderPass) -> VulkanResult<Self> {
        let depth_buffers = Self::create_depth_buffers(context, swapchain)?;
        let framebuffers = Self::create_framebuffers(&context.raw_device(), swapchain, &depth_buffers, render_pass)?;
        Ok(Self {
            framebuffers,
            depth_buffers,
        })
    }

    /// Destroy all framebuffers
    pub fn destroy_framebuffers(&mut self) {
        self.framebuffers.clear();
    }

    /// Destroy all depth buffers; framebuffers must already be gone
    pub fn destroy_depth_buffers(&mut self) {
        debug_assert!(self.framebuffers.is_empty());
        self.depth_buffers.clear();
    }

    /// Install freshly created depth buffers
    pub fn set_depth_buffers(&mut self, depth_buffers: Vec<DepthBuffer>) {
        self.depth_buffers = depth_buffers;
    }

    /// Install freshly created framebuffers
    pub fn set_framebuffers(&mut self, framebuffers: Vec<Framebuffer>) {
        self.framebuffers = framebuffers;
    }

    /// Depth buffers, one per swapchain image
    pub fn depth_buffers(&self) -> &[DepthBuffer] {
        &self.depth_buffers
    }

    /// Framebuffer for a swapchain image
    pub fn framebuffer(&self, image_index: u32) -> Option<&Framebuffer> {
        self.framebuffers.get(image_index as usize)
    }
}

/// One step of a swapchain rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStep {
    /// `vkDeviceWaitIdle`
    WaitIdle,
    /// Drop every framebuffer
    DestroyFramebuffers,
    /// Drop every depth buffer
    DestroyDepthBuffers,
    /// Drop the render pass
    DestroyRenderPass,
    /// Create the new swapchain from the old one, then drop the old one
    ReplaceSwapchain,
    /// Create a render pass for the new colour format
    CreateRenderPass,
    /// Let the sample rebuild pipelines bound to the old render pass
    NotifyRenderPassChanged,
    /// Create depth buffers at the new extent
    CreateDepthBuffers,
    /// Create framebuffers at the new extent
    CreateFramebuffers,
}

/// Ordered steps to rebuild the swapchain and everything sized by it
///
/// Pipelines survive an extent change because viewport and scissor are
/// dynamic; the render pass (and with it the pipelines) is only replaced
/// when the surface colour format changed.
pub fn plan_rebuild(format_changed: bool) -> Vec<RebuildStep> {
    use RebuildStep::*;

    let mut steps = vec![WaitIdle, DestroyFramebuffers, DestroyDepthBuffers];
    if format_changed {
        steps.push(DestroyRenderPass);
    }
    steps.push(ReplaceSwapchain);
    if format_changed {
        steps.push(CreateRenderPass);
        steps.push(NotifyRenderPassChanged);
    }
    steps.push(CreateDepthBuffers);
    steps.push(CreateFramebuffers);
    steps
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn caps(min: u32, max: u32, current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&caps(2, 0, (0, 0))), 3);
        assert_eq!(choose_image_count(&caps(2, 8, (0, 0))), 3);
        assert_eq!(choose_image_count(&caps(3, 3, (0, 0))), 3);
    }

    #[test]
    fn test_extent_follows_surface_or_clamps_window() {
        let window = vk::Extent2D {
            width: 8000,
            height: 600,
        };
        assert_eq!(
            choose_extent(&caps(2, 0, (640, 480)), window),
            vk::Extent2D {
                width: 640,
                height: 480
            }
        );
        assert_eq!(
            choose_extent(&caps(2, 0, (u32::MAX, u32::MAX)), window),
            vk::Extent2D {
                width: 4096,
                height: 600
            }
        );
    }

    #[test]
    fn test_format_and_present_mode_preferences() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[unorm]), Some(unorm));
        assert_eq!(choose_surface_format(&[]), None);

        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
    }

    /// Live-object ledger standing in for a validation layer's object tracker
    #[derive(Default, Debug, Clone, PartialEq, Eq)]
    struct Ledger {
        live: HashMap<&'static str, i32>,
        extent: HashMap<&'static str, u32>,
        idle: bool,
        notified: u32,
    }

    impl Ledger {
        fn steady(images: i32, width: u32) -> Self {
            let mut ledger = Self::default();
            for (kind, count) in [("swapchain", 1), ("framebuffer", images), ("depth", images), ("render_pass", 1)] {
                ledger.live.insert(kind, count);
                ledger.extent.insert(kind, width);
            }
            ledger
        }

        fn destroy(&mut self, kind: &'static str, count: i32) {
            let live = self.live.entry(kind).or_default();
            assert!(*live >= count, "destroying more {kind} than exist");
            *live -= count;
        }

        fn create(&mut self, kind: &'static str, count: i32, width: u32) {
            *self.live.entry(kind).or_default() += count;
            self.extent.insert(kind, width);
        }

        fn apply(&mut self, step: RebuildStep, images: i32, width: u32) {
            match step {
                RebuildStep::WaitIdle => self.idle = true,
                RebuildStep::DestroyFramebuffers => {
                    assert!(self.idle);
                    self.destroy("framebuffer", images);
                }
                RebuildStep::DestroyDepthBuffers => {
                    assert_eq!(self.live["framebuffer"], 0, "depth destroyed while framebuffers reference it");
                    self.destroy("depth", images);
                }
                RebuildStep::DestroyRenderPass => {
                    assert_eq!(self.live["framebuffer"], 0);
                    self.destroy("render_pass", 1);
                }
                RebuildStep::ReplaceSwapchain => {
                    assert_eq!(self.live["framebuffer"], 0, "swapchain replaced under live framebuffers");
                    self.create("swapchain", 1, width);
                    self.destroy("swapchain", 1);
                }
                RebuildStep::CreateRenderPass => self.create("render_pass", 1, width),
                RebuildStep::NotifyRenderPassChanged => {
                    assert_eq!(self.live["render_pass"], 1);
                    self.notified += 1;
                }
                RebuildStep::CreateDepthBuffers => {
                    assert_eq!(self.extent["swapchain"], width, "depth created before the new swapchain");
                    self.create("depth", images, width);
                }
                RebuildStep::CreateFramebuffers => {
                    assert_eq!(self.live["depth"], images);
                    assert_eq!(self.live["render_pass"], 1);
                    self.create("framebuffer", images, width);
                }
            }
        }
    }

    #[test]
    fn test_rebuild_returns_to_baseline() {
        for format_changed in [false, true] {
            let baseline = Ledger::steady(3, 800);
            let mut ledger = baseline.clone();

            let plan = plan_rebuild(format_changed);
            assert_eq!(plan.first(), Some(&RebuildStep::WaitIdle));
            for step in plan {
                ledger.apply(step, 3, 1024);
            }

            assert_eq!(ledger.live, baseline.live, "leaked or double-freed handles");
            for kind in ["swapchain", "framebuffer", "depth"] {
                assert_eq!(ledger.extent[kind], 1024, "{kind} left at the old extent");
            }
            assert_eq!(ledger.notified, u32::from(format_changed));
        }
    }

    #[test]
    fn test_render_pass_outdated_only_on_format_change() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(render_pass_outdated(vk::Format::B8G8R8A8_SRGB, &[unorm, srgb]), Some(false));
        assert_eq!(render_pass_outdated(vk::Format::B8G8R8A8_SRGB, &[unorm]), Some(true));
        assert_eq!(render_pass_outdated(vk::Format::R8G8B8A8_UNORM, &[]), None);
    }

    #[test]
    fn test_extent_change_keeps_render_pass() {
        let plan = plan_rebuild(false);
        assert!(!plan.contains(&RebuildStep::DestroyRenderPass));
        assert!(!plan.contains(&RebuildStep::NotifyRenderPassChanged));
    }

    #[test]
    fn test_repeated_rebuilds_stay_at_baseline() {
        let baseline = Ledger::steady(2, 640);
        let mut ledger = baseline.clone();
        for (i, width) in [700, 900, 300, 1200].into_iter().enumerate() {
            ledger.idle = false;
            for step in plan_rebuild(i % 2 == 1) {
                ledger.apply(step, 2, width);
            }
            assert_eq!(ledger.live, baseline.live);
        }
    }
}
