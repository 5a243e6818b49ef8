// Graphics context - every GPU object the renderer owns
//
// Creation order: instance (+ debug messenger) -> surface -> device ->
// swapchain -> command pool -> command buffers -> sync objects.
//
// IMPORTANT: Field order matters for Drop. `Drop::drop` waits for the device
// and releases commands/sync objects; the remaining fields are then dropped
// in declaration order (swapchain, device, surface, instance).

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::device::Device;
use super::frame::{Acquire, FrameBackend, PresentOutcome};
use super::instance::Instance;
use super::surface::Surface;
use super::swapchain::SwapChain;
use super::sync::{self, FrameSync};
use crate::platform::Window;

pub struct GraphicsContext {
    command_pool: vk::CommandPool,
    /// One per frame in flight
    command_buffers: Vec<vk::CommandBuffer>,
    /// One per frame in flight
    frame_sync: Vec<FrameSync>,
    /// One per swapchain image
    render_finished: Vec<vk::Semaphore>,

    swapchain: SwapChain,
    device: Arc<Device>,
    surface: Arc<Surface>,
    instance: Instance,
}

impl GraphicsContext {
    pub fn new(window: &dyn Window, frames_in_flight: usize, enable_validation: bool) -> Result<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(window.title(), &extensions, enable_validation)?;
        let surface = Arc::new(Surface::new(&instance, window)?);
        let device = Device::new(&instance, &surface)?;
        let swapchain = SwapChain::new(
            Arc::clone(&device),
            Arc::clone(&surface),
            window.width(),
            window.height(),
            window.is_vsynced(),
        )?;

        let mut context = Self {
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            frame_sync: Vec::new(),
            render_finished: Vec::new(),
            swapchain,
            device,
            surface,
            instance,
        };

        context.create_command_pool()?;
        context.create_command_buffers(frames_in_flight)?;
        context.create_sync_objects(frames_in_flight)?;

        log::info!(
            "Graphics context ready ({} frames in flight, {} swapchain images)",
            frames_in_flight,
            context.swapchain.image_count()
        );

        Ok(context)
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn swapchain(&self) -> &SwapChain {
        &self.swapchain
    }

    pub fn command_buffer(&self, slot: usize) -> Option<vk::CommandBuffer> {
        self.command_buffers.get(slot).copied()
    }

    fn create_command_pool(&mut self) -> Result<()> {
        let (graphics_family, _) = self
            .device
            .queue_family_indices()
            .resolved()
            .context("Device queue families unresolved")?;

        // Buffers are re-recorded every frame
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);

        self.command_pool = unsafe { self.device.get().create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        Ok(())
    }

    fn create_command_buffers(&mut self, count: usize) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        self.command_buffers = unsafe { self.device.get().allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")?;

        Ok(())
    }

    fn create_sync_objects(&mut self, frames_in_flight: usize) -> Result<()> {
        for _ in 0..frames_in_flight {
            let frame = FrameSync::new(self.device.get())?;
            self.frame_sync.push(frame);
        }

        self.render_finished = sync::create_semaphores(self.device.get(), self.swapchain.image_count())?;

        Ok(())
    }

    fn frame(&self, slot: usize) -> Result<&FrameSync> {
        self.frame_sync
            .get(slot)
            .with_context(|| format!("No sync objects for frame slot {}", slot))
    }

    fn commands(&self, slot: usize) -> Result<vk::CommandBuffer> {
        self.command_buffer(slot)
            .with_context(|| format!("No command buffer for frame slot {}", slot))
    }

    fn framebuffer(&self, image: u32) -> Result<vk::Framebuffer> {
        self.swapchain
            .framebuffers()
            .get(image as usize)
            .copied()
            .with_context(|| format!("No framebuffer for swapchain image {}", image))
    }

    fn render_finished(&self, image: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image as usize)
            .copied()
            .with_context(|| format!("No render-finished semaphore for swapchain image {}", image))
    }
}

impl FrameBackend for GraphicsContext {
    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn wait_for_fence(&mut self, slot: usize) -> Result<()> {
        let fences = [self.frame(slot)?.in_flight_fence];
        unsafe { self.device.get().wait_for_fences(&fences, true, u64::MAX) }
            .context("Failed to wait for in-flight fence")?;
        Ok(())
    }

    fn reset_fence(&mut self, slot: usize) -> Result<()> {
        let fences = [self.frame(slot)?.in_flight_fence];
        unsafe { self.device.get().reset_fences(&fences) }
            .context("Failed to reset in-flight fence")?;
        Ok(())
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<Acquire> {
        let semaphore = self.frame(slot)?.image_available;
        self.swapchain.acquire_next_image(u64::MAX, semaphore)
    }

    fn begin_commands(&mut self, slot: usize, image: u32, clear_color: [f32; 4]) -> Result<()> {
        let device = self.device.get();
        let command_buffer = self.commands(slot)?;
        let framebuffer = self.framebuffer(image)?;

        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .context("Failed to begin recording command buffer")?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            }];

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.swapchain.render_pass())
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: self.swapchain.extent(),
                })
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(())
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        let command_buffer = self.commands(slot)?;

        unsafe {
            self.device.get().cmd_end_render_pass(command_buffer);
            self.device
                .get()
                .end_command_buffer(command_buffer)
                .context("Failed to record command buffer")?;
        }

        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> Result<()> {
        let frame = self.frame(slot)?;
        let wait_semaphores = [frame.image_available];
        let fence = frame.in_flight_fence;
        let signal_semaphores = [self.render_finished(image)?];
        let command_buffers = [self.commands(slot)?];

        // Only color output has to wait for the acquired image
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device
                .get()
                .queue_submit(self.device.graphics_queue(), &[submit_info], fence)
        }
        .context("Failed to submit draw command buffer")?;

        Ok(())
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        let wait_semaphores = [self.render_finished(image)?];
        self.swapchain
            .present(self.device.present_queue(), image, &wait_semaphores)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait()
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        self.swapchain.set_vsync(vsync);
        self.swapchain.recreate(width, height)?;

        // The device is idle after recreate, so the old semaphores are unused
        let image_count = self.swapchain.image_count();
        if image_count != self.render_finished.len() {
            log::debug!(
                "Swapchain image count changed {} -> {}",
                self.render_finished.len(),
                image_count
            );
            sync::destroy_semaphores(self.device.get(), &mut self.render_finished);
            self.render_finished = sync::create_semaphores(self.device.get(), image_count)?;
        }

        Ok(())
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        log::info!("Destroying graphics context...");

        if let Err(e) = self.device.wait() {
            log::error!("Device wait failed during shutdown: {:#}", e);
        }

        let device = self.device.get();
        for frame in self.frame_sync.drain(..) {
            frame.destroy(device);
        }
        sync::destroy_semaphores(device, &mut self.render_finished);

        if self.command_pool != vk::CommandPool::null() {
            // Frees the command buffers with it
            unsafe { device.destroy_command_pool(self.command_pool, None) };
            self.command_buffers.clear();
        }
    }
}
