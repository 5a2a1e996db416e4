//! Command buffer management
//!
//! Command pools, one-time upload submissions and a recorder with an RAII
//! render pass scope.

use std::ops::{Deref, DerefMut};

use ash::{vk, Device};

use super::{VkResultExt, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
///
/// Each pool remembers the queue its buffers are submitted to.
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
}

impl CommandPool {
    /// Create a new resettable command pool
    pub fn new(device: Device, queue_family_index: u32, queue: vk::Queue) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool =
            unsafe { device.create_command_pool(&pool_create_info, None) }.during("creating command pool")?;

        Ok(Self {
            device,
            command_pool,
            queue,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }.during("allocating command buffers")
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Queue this pool's buffers are submitted to
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Record, submit and wait for a throwaway command buffer
    ///
    /// Blocks on queue idle, so anything the commands touch may be freed as
    /// soon as this returns.
    pub fn submit_one_time<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder) -> VulkanResult<()>,
    {
        let command_buffer = self
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "driver returned no command buffer".to_string(),
            })?;

        let result = (|| {
            let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
            recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
            record(&mut recorder)?;
            recorder.finish()?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            unsafe {
                self.device
                    .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                    .during("submitting one-time commands")?;
                self.device
                    .queue_wait_idle(self.queue)
                    .during("waiting for one-time commands")
            }
        })();

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Buffers from this pool may still be executing
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Command buffer recorder
///
/// Does not own the command buffer; the pool frees it.
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer for recording
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Raw handle of the wrapped buffer
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Begin command recording
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .during("beginning command buffer")?;
        }

        self.recording = true;
        Ok(())
    }

    /// Begin a render pass; it ends when the returned scope is dropped
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        self.ensure_recording()?;

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Ok(ActiveRenderPass {
            recorder: self,
            extent: render_area.extent,
        })
    }

    /// End command recording
    pub fn finish(&mut self) -> VulkanResult<vk::CommandBuffer> {
        self.ensure_recording()?;

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .during("ending command buffer")?;
        }

        self.recording = false;
        Ok(self.command_buffer)
    }

    fn ensure_recording(&self) -> VulkanResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            })
        }
    }

    /// Copy a whole region between buffers
    pub fn cmd_copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
    }

    /// Copy tightly packed pixels into mip 0 of a colour image
    pub fn cmd_copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    /// Record a single image memory barrier
    pub fn cmd_image_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::ImageMemoryBarrier,
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Bind graphics pipeline
    pub fn cmd_bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Bind descriptor sets starting at `first_set`
    pub fn cmd_bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, first_set: u32, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                &[],
            );
        }
    }

    /// Bind vertex buffers
    pub fn cmd_bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, buffers, offsets);
        }
    }

    /// Bind index buffer
    pub fn cmd_bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type);
        }
    }

    /// Push constants to shaders
    pub fn cmd_push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stage_flags: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stage_flags, offset, data);
        }
    }

    /// Set viewport
    pub fn cmd_set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    /// Set scissor
    pub fn cmd_set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    /// Draw non-indexed
    pub fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    /// Draw indexed
    pub fn cmd_draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }
}

/// Render pass scope; ends the pass on drop
///
/// Derefs to [`CommandRecorder`] so draws are recorded the same way inside
/// and outside a pass.
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
    extent: vk::Extent2D,
}

impl ActiveRenderPass<'_> {
    /// Extent of the render area
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Point viewport and scissor at the whole render area
    ///
    /// Pipelines declare both as dynamic state, so this has to run before
    /// the first draw of every frame.
    pub fn set_full_viewport(&mut self) {
        let extent = self.extent;
        self.recorder.cmd_set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        self.recorder.cmd_set_scissor(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });
    }
}

impl Deref for ActiveRenderPass<'_> {
    type Target = CommandRecorder;

    fn deref(&self) -> &Self::Target {
        self.recorder
    }
}

impl DerefMut for ActiveRenderPass<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.recorder
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
