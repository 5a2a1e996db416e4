//! Swapchain-backed frame renderer
//!
//! Owns the swapchain and everything sized by it, the per-slot command
//! buffers and synchronisation objects, and drives frames through the
//! [`FrameScheduler`]. What gets drawn is up to the caller's record callback.

use std::rc::Rc;

use ash::vk;

use crate::config::RendererConfig;
use crate::render::vulkan::frame::{AcquireOutcome, FrameBackend, FrameOutcome, FrameScheduler, PresentOutcome};
use crate::render::vulkan::swapchain::{plan_rebuild, render_pass_outdated, RebuildStep};
use crate::render::vulkan::{
    ActiveRenderPass, CommandPool, CommandRecorder, FrameSync, RenderPass, Swapchain, SwapchainTarget, VkResultExt,
    VulkanContext, VulkanError, VulkanResult,
};

/// What the record callback learns about the frame it is recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame slot; index per-frame buffers and descriptor sets with this
    pub slot: usize,
    /// Swapchain image being rendered
    pub image_index: u32,
    /// Swapchain extent
    pub extent: vk::Extent2D,
}

/// Callback recording one frame's draws inside the forward render pass
pub type RecordFn<'a> = dyn FnMut(&FrameInfo, &mut ActiveRenderPass<'_>) -> VulkanResult<()> + 'a;

/// Result of [`Renderer::rebuild`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Swapchain matches the window again
    Rebuilt { render_pass_changed: bool },
    /// The window has no area; try again once it is restored
    Postponed,
}

/// Frame loop state for one window
///
/// Fields drop top to bottom: framebuffers before the render pass and
/// swapchain they reference, the context last.
pub struct Renderer {
    scheduler: FrameScheduler,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    frame_sync: Vec<FrameSync>,
    target: SwapchainTarget,
    render_pass: Option<RenderPass>,
    swapchain: Swapchain,
    clear_color: [f32; 4],
    vsync: bool,
    needs_rebuild: bool,
    context: Rc<VulkanContext>,
}

impl Renderer {
    /// Build the swapchain, forward pass and per-slot objects
    pub fn new(context: Rc<VulkanContext>, config: &RendererConfig, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let frames = config.frames_in_flight;
        let swapchain = Swapchain::new(&context, window_extent, config.vsync, None)?;
        let render_pass = RenderPass::new_forward_pass(
            context.raw_device(),
            swapchain.format().format,
            context.depth_format(),
        )?;
        let target = SwapchainTarget::new(&context, &swapchain, render_pass.handle())?;

        let frame_sync = (0..frames)
            .map(|_| FrameSync::new(context.raw_device()))
            .collect::<VulkanResult<Vec<_>>>()?;

        let families = context.queue_families();
        let command_pool = CommandPool::new(context.raw_device(), families.graphics, context.graphics_queue())?;
        let command_buffers = command_pool.allocate_command_buffers(frames as u32)?;

        log::info!(
            "Renderer ready: {} frame(s) in flight, {} swapchain image(s) at {}x{}",
            frames,
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            scheduler: FrameScheduler::new(frames),
            command_buffers,
            command_pool,
            frame_sync,
            target,
            render_pass: Some(render_pass),
            swapchain,
            clear_color: config.clear_color,
            vsync: config.vsync,
            needs_rebuild: false,
            context,
        })
    }

    /// Shared device context
    pub fn context(&self) -> &Rc<VulkanContext> {
        &self.context
    }

    /// The forward render pass pipelines are built against
    pub fn render_pass(&self) -> VulkanResult<&RenderPass> {
        self.render_pass.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "render pass is being rebuilt".to_string(),
        })
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.scheduler.frames_in_flight()
    }

    /// Whether the last frame asked for a swapchain rebuild
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Ask for a rebuild before the next frame
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    /// Run one frame: wait, acquire, record through `record`, submit, present
    pub fn draw_frame(&mut self, record: &mut RecordFn<'_>) -> VulkanResult<FrameOutcome> {
        let render_pass = self.render_pass()?.handle();
        let Self {
            scheduler,
            command_buffers,
            frame_sync,
            target,
            swapchain,
            context,
            clear_color,
            ..
        } = self;

        let mut backend = DeviceFrames {
            context: context.as_ref(),
            swapchain: &*swapchain,
            target: &*target,
            render_pass,
            frame_sync: frame_sync.as_slice(),
            command_buffers: command_buffers.as_slice(),
            clear_color: *clear_color,
            record,
        };

        let outcome = scheduler.run_frame(&mut backend)?;
        if outcome.needs_rebuild() {
            self.needs_rebuild = true;
        }
        Ok(outcome)
    }

    /// Recreate the swapchain and its dependents for the current window size
    ///
    /// Follows [`plan_rebuild`]. The render pass is only replaced when the
    /// surface format changed, in which case `on_render_pass_changed` lets
    /// the caller rebuild its pipelines.
    pub fn rebuild(
        &mut self,
        window_extent: vk::Extent2D,
        on_render_pass_changed: &mut dyn FnMut(&VulkanContext, &RenderPass) -> VulkanResult<()>,
    ) -> VulkanResult<RebuildOutcome> {
        if window_extent.width == 0 || window_extent.height == 0 {
            log::debug!("Postponing swapchain rebuild while the window has no area");
            return Ok(RebuildOutcome::Postponed);
        }

        let physical = self.context.physical_device().device;
        let formats = self.context.surface().formats(physical)?;
        let format_changed = render_pass_outdated(self.render_pass()?.color_format(), &formats)
            .ok_or_else(|| VulkanError::InitializationFailed("surface reports no formats".to_string()))?;

        for step in plan_rebuild(format_changed) {
            match step {
                RebuildStep::WaitIdle => {
                    self.context.wait_idle()?;
                    self.scheduler.retire_all();
                }
                RebuildStep::DestroyFramebuffers => self.target.destroy_framebuffers(),
                RebuildStep::DestroyDepthBuffers => self.target.destroy_depth_buffers(),
                RebuildStep::DestroyRenderPass => self.render_pass = None,
                RebuildStep::ReplaceSwapchain => {
                    let replacement = Swapchain::new(&self.context, window_extent, self.vsync, Some(&self.swapchain))?;
                    self.swapchain = replacement;
                }
                RebuildStep::CreateRenderPass => {
                    self.render_pass = Some(RenderPass::new_forward_pass(
                        self.context.raw_device(),
                        self.swapchain.format().format,
                        self.context.depth_format(),
                    )?);
                }
                RebuildStep::NotifyRenderPassChanged => {
                    let render_pass = self.render_pass()?;
                    on_render_pass_changed(&self.context, render_pass)?;
                }
                RebuildStep::CreateDepthBuffers => {
                    let depth_buffers = SwapchainTarget::create_depth_buffers(&self.context, &self.swapchain)?;
                    self.target.set_depth_buffers(depth_buffers);
                }
                RebuildStep::CreateFramebuffers => {
                    let render_pass = self.render_pass()?.handle();
                    let framebuffers = SwapchainTarget::create_framebuffers(
                        &self.context.raw_device(),
                        &self.swapchain,
                        self.target.depth_buffers(),
                        render_pass,
                    )?;
                    self.target.set_framebuffers(framebuffers);
                }
            }
        }

        self.needs_rebuild = false;
        let extent = self.swapchain.extent();
        log::info!(
            "Rebuilt swapchain at {}x{}{}",
            extent.width,
            extent.height,
            if format_changed { " with a new render pass" } else { "" }
        );

        Ok(RebuildOutcome::Rebuilt {
            render_pass_changed: format_changed,
        })
    }

    /// Block until the GPU has finished every submitted frame
    pub fn wait_idle(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()?;
        self.scheduler.retire_all();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::debug!("Cleaning up renderer");
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device lost while shutting down renderer: {}", e);
        }
        unsafe {
            self.context
                .raw_device()
                .free_command_buffers(self.command_pool.handle(), &self.command_buffers);
        }
    }
}

/// [`FrameBackend`] over the real device for the duration of one frame
struct DeviceFrames<'r, 'f> {
    context: &'r VulkanContext,
    swapchain: &'r Swapchain,
    target: &'r SwapchainTarget,
    render_pass: vk::RenderPass,
    frame_sync: &'r [FrameSync],
    command_buffers: &'r [vk::CommandBuffer],
    clear_color: [f32; 4],
    record: &'r mut RecordFn<'f>,
}

impl FrameBackend for DeviceFrames<'_, '_> {
    fn wait_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.frame_sync[slot].in_flight.wait(u64::MAX)
    }

    fn acquire(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                self.frame_sync[slot].image_available.handle(),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e).during("acquiring swapchain image"),
        }
    }

    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.frame_sync[slot].in_flight.reset()
    }

    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let command_buffer = self.command_buffers[slot];
        unsafe { device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty()) }
            .during("resetting frame command buffer")?;

        let framebuffer = self
            .target
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {image_index}"),
            })?;

        let extent = framebuffer.extent();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let mut recorder = CommandRecorder::new(command_buffer, device);
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        {
            let mut pass = recorder.begin_render_pass(self.render_pass, framebuffer.handle(), render_area, &clear_values)?;
            pass.set_full_viewport();
            let info = FrameInfo {
                slot,
                image_index,
                extent,
            };
            (self.record)(&info, &mut pass)?;
        }
        recorder.finish()?;
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let sync = &self.frame_sync[slot];
        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffers[slot]];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .raw_device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], sync.in_flight.handle())
        }
        .during("submitting frame")
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [self.frame_sync[slot].render_finished.handle()];
        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e).during("presenting swapchain image"),
        }
    }
}
