// Test doubles for the GPU backend and the native window

use anyhow::Result;
use ash::vk;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::CStr;
use std::rc::Rc;

use crate::platform::{EventCallback, ListenerId, ListenerRegistry, Window, WindowEvent};
use crate::renderer::{Acquire, FrameBackend, PresentOutcome};

/// Everything the renderer asked the backend to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    WaitFence(usize),
    ResetFence(usize),
    Acquire(usize),
    BeginCommands {
        slot: usize,
        image: u32,
        clear_color: [f32; 4],
    },
    EndCommands(usize),
    Submit { slot: usize, image: u32 },
    Present(u32),
    WaitIdle,
    Recreate { width: u32, height: u32, vsync: bool },
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Hands out images round-robin unless a result is scripted.
pub struct FakeBackend {
    calls: CallLog,
    image_count: usize,
    next_image: u32,
    acquire_script: VecDeque<Acquire>,
    present_script: VecDeque<Result<PresentOutcome, &'static str>>,
    image_count_after_recreate: Option<usize>,
}

impl FakeBackend {
    pub fn new(image_count: usize) -> (Self, CallLog) {
        let calls = CallLog::default();
        let backend = Self {
            calls: Rc::clone(&calls),
            image_count,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            image_count_after_recreate: None,
        };
        (backend, calls)
    }

    pub fn script_acquire(&mut self, result: Acquire) {
        self.acquire_script.push_back(result);
    }

    pub fn script_present(&mut self, result: Result<PresentOutcome, &'static str>) {
        self.present_script.push_back(result);
    }

    pub fn change_image_count_on_recreate(&mut self, count: usize) {
        self.image_count_after_recreate = Some(count);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl FrameBackend for FakeBackend {
    fn image_count(&self) -> usize {
        self.image_count
    }

    fn wait_for_fence(&mut self, slot: usize) -> Result<()> {
        self.record(Call::WaitFence(slot));
        Ok(())
    }

    fn reset_fence(&mut self, slot: usize) -> Result<()> {
        self.record(Call::ResetFence(slot));
        Ok(())
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<Acquire> {
        self.record(Call::Acquire(slot));

        if let Some(scripted) = self.acquire_script.pop_front() {
            return Ok(scripted);
        }

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(Acquire::Image {
            index,
            suboptimal: false,
        })
    }

    fn begin_commands(&mut self, slot: usize, image: u32, clear_color: [f32; 4]) -> Result<()> {
        self.record(Call::BeginCommands {
            slot,
            image,
            clear_color,
        });
        Ok(())
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        self.record(Call::EndCommands(slot));
        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> Result<()> {
        self.record(Call::Submit { slot, image });
        Ok(())
    }

    fn present(&mut self, image: u32) -> Result<PresentOutcome> {
        self.record(Call::Present(image));

        match self.present_script.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(PresentOutcome::Presented),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.record(Call::WaitIdle);
        Ok(())
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        self.record(Call::Recreate {
            width,
            height,
            vsync,
        });

        if let Some(count) = self.image_count_after_recreate.take() {
            self.image_count = count;
        }
        self.next_image = 0;
        Ok(())
    }
}

/// Window whose size changes and events are scripted per `poll_events` call.
pub struct FakeWindow {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
    pub closed: bool,
    pub polls: usize,
    sizes: VecDeque<(u32, u32)>,
    pending: VecDeque<WindowEvent>,
    close_after_polls: Option<usize>,
    listeners: ListenerRegistry,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            title: "Fake".to_string(),
            width,
            height,
            vsync: false,
            fullscreen: false,
            closed: false,
            polls: 0,
            sizes: VecDeque::new(),
            pending: VecDeque::new(),
            close_after_polls: None,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Apply a new size on a future poll (one entry per poll).
    pub fn resize_on_poll(&mut self, width: u32, height: u32) {
        self.sizes.push_back((width, height));
    }

    /// Deliver an event on the next poll.
    pub fn push_event(&mut self, event: WindowEvent) {
        self.pending.push_back(event);
    }

    /// Emit a close request once `polls` polls have happened.
    pub fn close_after_polls(&mut self, polls: usize) {
        self.close_after_polls = Some(polls);
    }
}

impl Window for FakeWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_vsynced(&self) -> bool {
        self.vsync
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn should_close(&self) -> bool {
        self.closed
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
    }

    fn set_fullscreen(&mut self, enabled: bool) {
        self.fullscreen = enabled;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn poll_events(&mut self) {
        self.polls += 1;

        if let Some((width, height)) = self.sizes.pop_front() {
            self.width = width;
            self.height = height;
            self.pending.push_back(WindowEvent::Resize { width, height });
        }

        if self.close_after_polls == Some(self.polls) {
            self.pending.push_back(WindowEvent::Close);
        }

        while let Some(event) = self.pending.pop_front() {
            self.listeners.dispatch(&event);
        }
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        Ok(Vec::new())
    }

    fn create_surface(&self, _entry: &ash::Entry, _instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        anyhow::bail!("Fake window has no native surface")
    }

    fn add_event_listener(&mut self, callback: EventCallback) -> ListenerId {
        self.listeners.add(callback)
    }

    fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn clear_event_listeners(&mut self) {
        self.listeners.clear();
    }
}
