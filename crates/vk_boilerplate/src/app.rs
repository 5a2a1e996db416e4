//! Sample driver
//!
//! Every sample implements [`Sample`] and hands itself to [`run`], which owns
//! the window, device, renderer and event bus and runs the frame loop until
//! the window closes.

use std::rc::Rc;
use std::time::Instant;

use ash::vk;
use thiserror::Error;

use crate::assets::AssetError;
use crate::config::{ConfigError, SampleConfig};
use crate::events::{Event, EventBus};
use crate::render::renderer::{FrameInfo, RebuildOutcome, Renderer};
use crate::render::vulkan::{ActiveRenderPass, FrameOutcome, RenderPass, VulkanContext, VulkanError, VulkanResult};
use crate::render::window::{Window, WindowError};

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Vulkan call failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Asset loading error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

/// What a sample can reach while it builds its resources
pub struct SampleContext<'a> {
    /// Device, queues and upload pool shared with the renderer
    pub context: &'a Rc<VulkanContext>,
    /// Pass the sample's pipelines must be compatible with
    pub render_pass: &'a RenderPass,
    /// Loaded and validated configuration
    pub config: &'a SampleConfig,
    /// Subscribe handlers here; the bus only holds weak references
    pub bus: &'a EventBus,
    /// Number of slots per-frame resources need
    pub frames_in_flight: usize,
    /// Current swapchain extent
    pub extent: vk::Extent2D,
}

/// A rendering sample
///
/// Resources are RAII-owned by the sample and dropped before the renderer,
/// after the device has gone idle.
pub trait Sample: Sized {
    /// Build the sample's pipelines and resources
    fn init(ctx: &SampleContext<'_>) -> Result<Self, AppError>;

    /// Advance simulation state once per loop iteration
    fn update(&mut self, _delta_time: f32) {}

    /// Write this slot's per-frame data and record the draws
    ///
    /// Called after the slot's fence has been waited on, so per-frame
    /// buffers indexed by `frame.slot` are free to overwrite.
    fn record(&mut self, frame: &FrameInfo, pass: &mut ActiveRenderPass<'_>) -> VulkanResult<()>;

    /// Rebuild anything built against the old render pass
    fn on_render_pass_changed(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()>;

    /// Last call before the sample is dropped; the device is idle
    fn teardown(&mut self) {}
}

/// Run a sample until its window closes
pub fn run<S: Sample>(config: SampleConfig) -> Result<(), AppError> {
    config.validate()?;

    let mut window = Window::new(&config.window)?;
    let context = Rc::new(VulkanContext::new(
        &mut window,
        &config.window.title,
        config.renderer.validation_enabled(),
    )?);
    let mut renderer = Renderer::new(Rc::clone(&context), &config.renderer, window.framebuffer_extent())?;
    let bus = EventBus::new();

    let mut sample = {
        let ctx = SampleContext {
            context: &context,
            render_pass: renderer.render_pass()?,
            config: &config,
            bus: &bus,
            frames_in_flight: renderer.frames_in_flight(),
            extent: renderer.extent(),
        };
        S::init(&ctx)?
    };

    log::info!("Running '{}'", config.window.title);
    let result = frame_loop(&mut window, &mut renderer, &bus, &mut sample);

    // The device must be idle before any sample resource is destroyed
    renderer.wait_idle()?;
    sample.teardown();
    drop(sample);
    drop(renderer);

    log::info!("'{}' finished", config.window.title);
    result
}

fn frame_loop<S: Sample>(
    window: &mut Window,
    renderer: &mut Renderer,
    bus: &EventBus,
    sample: &mut S,
) -> Result<(), AppError> {
    let mut last = Instant::now();
    let mut frames: u64 = 0;
    let mut dropped: u64 = 0;

    while !window.should_close() {
        for event in window.poll_events() {
            if let Event::Resize { .. } = event {
                renderer.request_rebuild();
            }
            bus.notify(&event);
        }

        let now = Instant::now();
        sample.update(now.duration_since(last).as_secs_f32());
        last = now;

        if renderer.needs_rebuild() {
            let outcome = renderer.rebuild(window.framebuffer_extent(), &mut |context, render_pass| {
                sample.on_render_pass_changed(context, render_pass)
            })?;
            if outcome == RebuildOutcome::Postponed {
                window.wait_events();
                continue;
            }
        }

        match renderer.draw_frame(&mut |frame, pass| sample.record(frame, pass))? {
            FrameOutcome::Presented { .. } => frames += 1,
            FrameOutcome::Dropped => dropped += 1,
        }
    }

    log::info!("Presented {} frame(s), dropped {}", frames, dropped);
    Ok(())
}
