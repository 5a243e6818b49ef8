// Renderer - frame lifecycle on top of the Vulkan objects in `context`
//
// FRAME FLOW:
// 1. Wait for the current slot's fence (CPU stays at most N frames ahead)
// 2. Acquire a swapchain image (out of date -> recreate, skip the frame)
// 3. Wait for whichever slot last rendered into that image
// 4. Record: clear the image inside the render pass
// 5. Submit, present, recreate the swapchain if it no longer fits
//
// Frames in flight and swapchain images are counted independently, so an
// image can still be busy after its slot's fence has been reused. The
// `images_in_flight` back-references close that gap.

pub mod context;
pub mod device;
pub mod frame;
pub mod instance;
pub mod surface;
pub mod swapchain;
pub mod sync;

use anyhow::Result;
use glam::Vec4;
use std::time::Duration;

use crate::config::Config;
use crate::platform::Window;

pub use context::GraphicsContext;
pub use device::{Device, QueueFamilyIndices};
pub use frame::{Acquire, FrameBackend, FrameCursor, PresentOutcome};
pub use instance::Instance;
pub use surface::Surface;
pub use swapchain::SwapChain;

/// Default number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
/// Upper bound accepted from configuration
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 3;

/// Sleep between event polls while the window is minimized
const MINIMIZED_POLL_INTERVAL: Duration = Duration::from_millis(16);

pub struct Renderer {
    cursor: FrameCursor,
    /// Per swapchain image: the slot whose fence guards the last submission into it
    images_in_flight: Vec<Option<usize>>,
    clear_color: Vec4,
    backend: Box<dyn FrameBackend>,
}

impl Renderer {
    pub fn new(window: &dyn Window, config: &Config) -> Result<Self> {
        let frames_in_flight = config.graphics.frames_in_flight();
        let context =
            GraphicsContext::new(window, frames_in_flight, config.debug.validation_layers)?;

        let mut renderer = Self::with_backend(Box::new(context), frames_in_flight);
        renderer.clear_color = Vec4::from_array(config.graphics.clear_color);

        Ok(renderer)
    }

    /// Drive the frame protocol over any backend.
    pub fn with_backend(backend: Box<dyn FrameBackend>, frames_in_flight: usize) -> Self {
        let image_count = backend.image_count();

        Self {
            cursor: FrameCursor::new(frames_in_flight),
            images_in_flight: vec![None; image_count],
            clear_color: Vec4::new(0.5, 0.5, 0.5, 1.0),
            backend,
        }
    }

    /// Open a frame. Returns `Ok(false)` when no frame was started: either
    /// one is already in progress, or the swapchain was out of date and has
    /// just been recreated. Errors are unrecoverable.
    pub fn begin_draw(&mut self, window: &mut dyn Window) -> Result<bool> {
        if self.cursor.is_frame_started() {
            log::error!("Cannot call begin_draw while a frame is already in progress");
            return Ok(false);
        }

        let slot = self.cursor.current_frame();
        if slot >= self.cursor.frames_in_flight() {
            anyhow::bail!(
                "Frame slot {} out of bounds ({} frames in flight)",
                slot,
                self.cursor.frames_in_flight()
            );
        }

        self.backend.wait_for_fence(slot)?;

        let image_index = match self.backend.acquire_next_image(slot)? {
            Acquire::Image { index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired suboptimal swapchain image {}", index);
                }
                index
            }
            Acquire::OutOfDate => {
                log::debug!("Swapchain out of date on acquire, skipping frame");
                self.recreate_swapchain(window)?;
                return Ok(false);
            }
        };

        let image = image_index as usize;
        let Some(&previous) = self.images_in_flight.get(image) else {
            anyhow::bail!(
                "Swapchain image {} out of bounds ({} images)",
                image_index,
                self.images_in_flight.len()
            );
        };

        // The slot fence we just waited on already covers `previous == slot`
        if let Some(previous) = previous.filter(|&previous| previous != slot) {
            self.backend.wait_for_fence(previous)?;
        }

        self.images_in_flight[image] = Some(slot);
        self.backend.reset_fence(slot)?;

        self.backend
            .begin_commands(slot, image_index, self.clear_color.to_array())?;

        self.cursor.start(image_index);
        Ok(true)
    }

    /// Close the frame opened by `begin_draw`: submit, present and recreate
    /// the swapchain when presentation reports it no longer fits.
    pub fn end_draw(&mut self, window: &mut dyn Window) -> Result<bool> {
        if !self.cursor.is_frame_started() {
            log::error!("Cannot call end_draw while no frame is in progress");
            return Ok(false);
        }

        let slot = self.cursor.current_frame();
        let image_index = self.cursor.image_index();

        self.backend.end_commands(slot)?;
        self.backend.submit(slot, image_index)?;

        let stale = match self.backend.present(image_index) {
            Ok(outcome) => outcome.needs_recreate(),
            Err(e) => {
                log::error!("Failed to present swapchain image {}: {:#}", image_index, e);
                false
            }
        };

        // Consumed on every present so one recreation covers both triggers
        let resized = self.cursor.take_resized();
        if stale || resized {
            self.recreate_swapchain(window)?;
        }

        self.cursor.finish();
        Ok(true)
    }

    /// Rebuild the swapchain against the window's current size.
    ///
    /// Blocks, pumping window events, while the window is minimized. Returns
    /// without recreating if the window starts closing in the meantime.
    pub fn recreate_swapchain(&mut self, window: &mut dyn Window) -> Result<()> {
        let (mut width, mut height) = (window.width(), window.height());

        while width == 0 || height == 0 {
            if window.should_close() {
                log::debug!("Window closing while minimized, skipping swapchain recreation");
                return Ok(());
            }

            window.poll_events();
            (width, height) = (window.width(), window.height());

            if width == 0 || height == 0 {
                std::thread::sleep(MINIMIZED_POLL_INTERVAL);
            }
        }

        self.backend.wait_idle()?;
        self.backend
            .recreate_swapchain(width, height, window.is_vsynced())?;

        // Everything is idle, no image is owned by any slot any more
        self.images_in_flight = vec![None; self.backend.image_count()];

        Ok(())
    }

    /// Set the color the next frame is cleared to.
    pub fn clear(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = Vec4::new(r, g, b, a);
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    /// Note a framebuffer size change; the swapchain is rebuilt after the next present.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Framebuffer resized to {}x{}", width, height);
        self.cursor.mark_resized();
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.cursor.is_frame_started()
    }

    pub fn current_frame(&self) -> usize {
        self.cursor.current_frame()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.cursor.frames_in_flight()
    }

    pub fn image_index(&self) -> u32 {
        self.cursor.image_index()
    }

    pub fn image_count(&self) -> usize {
        self.backend.image_count()
    }

    pub fn images_in_flight(&self) -> &[Option<usize>] {
        &self.images_in_flight
    }

    /// Block until the GPU has finished all submitted work.
    pub fn wait_idle(&mut self) -> Result<()> {
        self.backend.wait_idle()
    }
}
