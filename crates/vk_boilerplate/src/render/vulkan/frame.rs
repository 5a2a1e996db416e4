//! Frame-in-flight sequencing
//!
//! Each frame slot cycles Idle → Acquiring → Recording → Submitted and back to
//! Idle once its fence is waited on. The order of device operations lives
//! here, behind [`FrameBackend`], so it can be exercised without a GPU.

use super::VulkanResult;

/// Where a frame slot is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
}

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// What happened to one call of [`FrameScheduler::run_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented {
        slot: usize,
        image_index: u32,
        needs_rebuild: bool,
    },
    /// The swapchain was out of date before anything was recorded
    Dropped,
}

impl FrameOutcome {
    /// Whether the swapchain should be rebuilt before the next frame
    pub fn needs_rebuild(&self) -> bool {
        match self {
            Self::Presented { needs_rebuild, .. } => *needs_rebuild,
            Self::Dropped => true,
        }
    }
}

/// Device operations a frame is made of, addressed by slot
pub trait FrameBackend {
    /// Block until the slot's previous submission has retired
    fn wait_fence(&mut self, slot: usize) -> VulkanResult<()>;
    /// Acquire the next swapchain image, signalling the slot's acquire semaphore
    fn acquire(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;
    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()>;
    /// Reset and record the slot's command buffer for `image_index`
    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;
    /// Submit the slot's command buffer, signalling its fence
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome>;
}

/// Round-robin scheduler over `frames_in_flight` slots
#[derive(Debug)]
pub struct FrameScheduler {
    current: usize,
    states: Vec<SlotState>,
    /// Fence is signalled or will be by a submission; false after a reset
    /// that no submission followed
    fence_armed: Vec<bool>,
}

impl FrameScheduler {
    /// At least one slot, all idle
    pub fn new(frames_in_flight: usize) -> Self {
        let frames_in_flight = frames_in_flight.max(1);
        Self {
            current: 0,
            states: vec![SlotState::Idle; frames_in_flight],
            fence_armed: vec![true; frames_in_flight],
        }
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.states.len()
    }

    /// Slot the next frame will use
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// `None` for an out-of-range slot
    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    /// Mark every slot idle after the device has been drained
    pub fn retire_all(&mut self) {
        self.states.iter_mut().for_each(|s| *s = SlotState::Idle);
    }

    /// Drive one frame through the backend
    ///
    /// An out-of-date acquire drops the frame without resetting the fence or
    /// advancing the slot index, so the next attempt reuses the same slot and
    /// its still-signalled fence.
    ///
    /// If recording or submission fails the slot goes back to Idle with its
    /// fence disarmed, and the next frame on it skips the wait instead of
    /// blocking on a fence nothing will signal.
    pub fn run_frame<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<FrameOutcome> {
        let slot = self.current;

        if self.fence_armed[slot] {
            backend.wait_fence(slot)?;
        } else {
            log::debug!("Slot {} has nothing in flight, skipping fence wait", slot);
        }
        self.states[slot] = SlotState::Acquiring;

        let (image_index, acquire_suboptimal) = match backend.acquire(slot) {
            Ok(AcquireOutcome::Image { index, suboptimal }) => (index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) => {
                self.states[slot] = SlotState::Idle;
                log::warn!("Dropped frame on slot {}: swapchain out of date", slot);
                return Ok(FrameOutcome::Dropped);
            }
            Err(e) => {
                self.states[slot] = SlotState::Idle;
                return Err(e);
            }
        };

        if let Err(e) = backend.reset_fence(slot) {
            self.states[slot] = SlotState::Idle;
            return Err(e);
        }
        self.fence_armed[slot] = false;
        self.states[slot] = SlotState::Recording;

        if let Err(e) = backend.record(slot, image_index).and_then(|()| backend.submit(slot)) {
            self.states[slot] = SlotState::Idle;
            log::error!("Frame on slot {} failed before submission: {}", slot, e);
            return Err(e);
        }
        self.fence_armed[slot] = true;
        self.states[slot] = SlotState::Submitted;

        let present = backend.present(slot, image_index)?;
        let needs_rebuild = acquire_suboptimal || present != PresentOutcome::Presented;

        self.current = (self.current + 1) % self.states.len();

        Ok(FrameOutcome::Presented {
            slot,
            image_index,
            needs_rebuild,
        })
    }
}
