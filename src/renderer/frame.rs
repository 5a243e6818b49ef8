// Frame protocol plumbing
//
// `FrameBackend` is the seam between the begin/end-frame state machine in
// `Renderer` and the Vulkan objects that carry it out. `GraphicsContext`
// is the real implementation; tests drive the protocol with a fake.

use anyhow::Result;

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be recreated
    OutOfDate,
}

/// Result of a successful present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// GPU-side operations the frame protocol is built from.
///
/// `slot` is a frame-in-flight index, `image` a swapchain image index.
pub trait FrameBackend {
    /// Current number of swapchain images.
    fn image_count(&self) -> usize;

    /// Block (without timeout) until the slot's fence signals.
    fn wait_for_fence(&mut self, slot: usize) -> Result<()>;
    fn reset_fence(&mut self, slot: usize) -> Result<()>;

    /// Acquire an image, signalling the slot's image-available semaphore.
    fn acquire_next_image(&mut self, slot: usize) -> Result<Acquire>;

    /// Reset and begin the slot's command buffer and open the render pass on
    /// the image's framebuffer.
    fn begin_commands(&mut self, slot: usize, image: u32, clear_color: [f32; 4]) -> Result<()>;
    fn end_commands(&mut self, slot: usize) -> Result<()>;

    /// Submit the slot's commands: wait on image-available, signal the
    /// image's render-finished semaphore, arm the slot's fence.
    fn submit(&mut self, slot: usize, image: u32) -> Result<()>;
    fn present(&mut self, image: u32) -> Result<PresentOutcome>;

    fn wait_idle(&mut self) -> Result<()>;
    fn recreate_swapchain(&mut self, width: u32, height: u32, vsync: bool) -> Result<()>;
}

/// Where the renderer is in the frame cycle.
#[derive(Debug, Clone)]
pub struct FrameCursor {
    frames_in_flight: usize,
    current_frame: usize,
    image_index: u32,
    frame_started: bool,
    framebuffer_resized: bool,
}

impl FrameCursor {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_frame: 0,
            image_index: 0,
            frame_started: false,
            framebuffer_resized: false,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn is_frame_started(&self) -> bool {
        self.frame_started
    }

    pub fn start(&mut self, image_index: u32) {
        self.image_index = image_index;
        self.frame_started = true;
    }

    /// Close the frame and move to the next slot.
    pub fn finish(&mut self) {
        self.frame_started = false;
        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
    }

    pub fn mark_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    pub fn is_resize_pending(&self) -> bool {
        self.framebuffer_resized
    }

    /// Read and clear the resize flag.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_around_slots() {
        let mut cursor = FrameCursor::new(3);

        let mut seen = Vec::new();
        for image in 0..7 {
            seen.push(cursor.current_frame());
            cursor.start(image);
            cursor.finish();
        }

        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn cursor_needs_at_least_one_slot() {
        let mut cursor = FrameCursor::new(0);
        assert_eq!(cursor.frames_in_flight(), 1);

        cursor.finish();
        assert_eq!(cursor.current_frame(), 0);
    }

    #[test]
    fn resize_flag_is_consumed_once() {
        let mut cursor = FrameCursor::new(2);
        assert!(!cursor.take_resized());

        cursor.mark_resized();
        cursor.mark_resized();
        assert!(cursor.is_resize_pending());
        assert!(cursor.take_resized());
        assert!(!cursor.take_resized());
    }

    #[test]
    fn only_presented_skips_recreation() {
        assert!(!PresentOutcome::Presented.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }
}
