// Native window backed by winit
//
// The event loop is driven with `pump_app_events` so the application owns the
// main loop: every `poll_events` call drains pending OS messages, translates
// them into `WindowEvent`s and hands them to listeners before returning.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;
use std::sync::OnceLock;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseScrollDelta, WindowEvent as NativeEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode as NativeKey, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window as NativeWindow, WindowId},
};

use super::event::{KeyCode, MouseButton, WindowEvent};
use super::listener::{EventCallback, ListenerId, ListenerRegistry};
use super::{Window, WindowProps};

/// Surface extensions for the platform's display server. Resolved once per
/// process: there is only one kind of native window.
static PLATFORM_EXTENSIONS: OnceLock<Vec<&'static CStr>> = OnceLock::new();

const STARTUP_PUMP_TIMEOUT: Duration = Duration::from_millis(16);
const MAX_STARTUP_PUMPS: usize = 64;

pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
}

/// Everything the winit callbacks touch, kept apart from the event loop so
/// the loop can borrow it mutably while pumping.
struct WindowState {
    props: WindowProps,
    window: Option<NativeWindow>,
    width: u32,
    height: u32,
    should_close: bool,
    creation_error: Option<anyhow::Error>,
    listeners: ListenerRegistry,
}

impl WinitWindow {
    pub fn new(props: WindowProps) -> Result<Self> {
        log::info!(
            "Creating window '{}' ({}x{})",
            props.title,
            props.width,
            props.height
        );

        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;
        let mut state = WindowState::new(props);

        // The native window is created from `resumed`, which the first pumps deliver
        for _ in 0..MAX_STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(STARTUP_PUMP_TIMEOUT), &mut state)
            {
                anyhow::bail!("Event loop exited with code {code} before the window was created");
            }
            if let Some(e) = state.creation_error.take() {
                return Err(e);
            }
            if state.window.is_some() {
                return Ok(Self { event_loop, state });
            }
        }

        anyhow::bail!("Timed out waiting for the platform to create the window")
    }

    fn native(&self) -> Result<&NativeWindow> {
        self.state.window.as_ref().context("Native window not created")
    }
}

impl Window for WinitWindow {
    fn title(&self) -> &str {
        &self.state.props.title
    }

    fn width(&self) -> u32 {
        self.state.width
    }

    fn height(&self) -> u32 {
        self.state.height
    }

    fn is_vsynced(&self) -> bool {
        self.state.props.vsync
    }

    fn is_fullscreen(&self) -> bool {
        self.state.props.fullscreen
    }

    fn should_close(&self) -> bool {
        self.state.should_close
    }

    fn set_title(&mut self, title: &str) {
        self.state.props.title = title.to_string();
        if let Some(window) = &self.state.window {
            window.set_title(title);
        }
    }

    // Takes effect the next time the swapchain is created
    fn set_vsync(&mut self, enabled: bool) {
        self.state.props.vsync = enabled;
    }

    fn set_fullscreen(&mut self, enabled: bool) {
        self.state.props.fullscreen = enabled;
        if let Some(window) = &self.state.window {
            window.set_fullscreen(enabled.then_some(Fullscreen::Borderless(None)));
            log::info!(
                "{} fullscreen mode",
                if enabled { "Entered" } else { "Exited" }
            );
        }
    }

    fn close(&mut self) {
        self.state.should_close = true;
    }

    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);

        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.state.should_close = true;
        }
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        if let Some(extensions) = PLATFORM_EXTENSIONS.get() {
            return Ok(extensions.clone());
        }

        let display = self.native()?.raw_display_handle();
        let extensions = ash_window::enumerate_required_extensions(display)
            .context("Unsupported display server for Vulkan surfaces")?
            .iter()
            // SAFETY: ash-window returns pointers to static, NUL-terminated extension names
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect::<Vec<&'static CStr>>();

        Ok(PLATFORM_EXTENSIONS.get_or_init(|| extensions).clone())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let window = self.native()?;

        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        Ok(surface)
    }

    fn add_event_listener(&mut self, callback: EventCallback) -> ListenerId {
        self.state.listeners.add(callback)
    }

    fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.state.listeners.remove(id)
    }

    fn clear_event_listeners(&mut self) {
        self.state.listeners.clear();
    }
}

impl WindowState {
    fn new(props: WindowProps) -> Self {
        Self {
            width: props.width,
            height: props.height,
            props,
            window: None,
            should_close: false,
            creation_error: None,
            listeners: ListenerRegistry::new(),
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = NativeWindow::default_attributes()
            .with_title(&self.props.title)
            .with_inner_size(PhysicalSize::new(self.props.width, self.props.height))
            .with_resizable(self.props.resizable)
            .with_fullscreen(
                self.props
                    .fullscreen
                    .then_some(Fullscreen::Borderless(None)),
            );

        match event_loop.create_window(attributes) {
            Ok(window) => {
                let size = window.inner_size();
                self.width = size.width;
                self.height = size.height;
                self.window = Some(window);
            }
            Err(e) => {
                self.creation_error =
                    Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: NativeEvent,
    ) {
        match &event {
            NativeEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.width = size.width;
                self.height = size.height;
            }
            NativeEvent::CloseRequested => {
                log::info!("Close requested");
                self.should_close = true;
            }
            _ => {}
        }

        let listeners = &mut self.listeners;
        translate(&event, &mut |translated| listeners.dispatch(&translated));
    }
}

/// Map one native event onto zero or more engine events.
fn translate(event: &NativeEvent, emit: &mut impl FnMut(WindowEvent)) {
    match event {
        NativeEvent::CloseRequested => emit(WindowEvent::Close),
        NativeEvent::Resized(size) => emit(WindowEvent::Resize {
            width: size.width,
            height: size.height,
        }),
        NativeEvent::Focused(true) => emit(WindowEvent::Focus),
        NativeEvent::Focused(false) => emit(WindowEvent::LostFocus),
        NativeEvent::Moved(position) => emit(WindowEvent::Moved {
            x: position.x,
            y: position.y,
        }),
        NativeEvent::KeyboardInput { event, .. } => {
            let key = match event.physical_key {
                PhysicalKey::Code(code) => map_key(code),
                PhysicalKey::Unidentified(_) => KeyCode::Unknown,
            };

            match event.state {
                ElementState::Pressed => {
                    emit(WindowEvent::KeyPressed {
                        key,
                        repeat_count: u8::from(event.repeat),
                    });
                    if let Some(text) = &event.text {
                        for character in text.chars().filter(|c| !c.is_control()) {
                            emit(WindowEvent::KeyTyped { character });
                        }
                    }
                }
                ElementState::Released => emit(WindowEvent::KeyReleased { key }),
            }
        }
        NativeEvent::MouseInput { state, button, .. } => {
            let button = map_mouse_button(*button);
            emit(match state {
                ElementState::Pressed => WindowEvent::MouseButtonPressed { button },
                ElementState::Released => WindowEvent::MouseButtonReleased { button },
            });
        }
        NativeEvent::CursorMoved { position, .. } => emit(WindowEvent::MouseMoved {
            x: position.x as f32,
            y: position.y as f32,
        }),
        NativeEvent::MouseWheel { delta, .. } => {
            let (x_offset, y_offset) = match delta {
                MouseScrollDelta::LineDelta(x, y) => (*x, *y),
                MouseScrollDelta::PixelDelta(position) => (position.x as f32, position.y as f32),
            };
            emit(WindowEvent::MouseScrolled { x_offset, y_offset });
        }
        _ => {}
    }
}

fn map_mouse_button(button: winit::event::MouseButton) -> MouseButton {
    use winit::event::MouseButton as Native;

    match button {
        Native::Left => MouseButton::Left,
        Native::Right => MouseButton::Right,
        Native::Middle => MouseButton::Middle,
        Native::Back => MouseButton::Button4,
        Native::Forward => MouseButton::Button5,
        Native::Other(0..=5) => MouseButton::Button6,
        Native::Other(6) => MouseButton::Button7,
        Native::Other(_) => MouseButton::Button8,
    }
}

fn map_key(code: NativeKey) -> KeyCode {
    match code {
        NativeKey::Tab => KeyCode::Tab,
        NativeKey::Enter | NativeKey::NumpadEnter => KeyCode::Enter,
        NativeKey::ShiftLeft | NativeKey::ShiftRight => KeyCode::Shift,
        NativeKey::ControlLeft | NativeKey::ControlRight => KeyCode::Control,
        NativeKey::AltLeft | NativeKey::AltRight => KeyCode::Alt,
        NativeKey::Escape => KeyCode::Escape,
        NativeKey::Space => KeyCode::Space,

        NativeKey::Digit0 => KeyCode::Digit0,
        NativeKey::Digit1 => KeyCode::Digit1,
        NativeKey::Digit2 => KeyCode::Digit2,
        NativeKey::Digit3 => KeyCode::Digit3,
        NativeKey::Digit4 => KeyCode::Digit4,
        NativeKey::Digit5 => KeyCode::Digit5,
        NativeKey::Digit6 => KeyCode::Digit6,
        NativeKey::Digit7 => KeyCode::Digit7,
        NativeKey::Digit8 => KeyCode::Digit8,
        NativeKey::Digit9 => KeyCode::Digit9,

        NativeKey::KeyA => KeyCode::A,
        NativeKey::KeyB => KeyCode::B,
        NativeKey::KeyC => KeyCode::C,
        NativeKey::KeyD => KeyCode::D,
        NativeKey::KeyE => KeyCode::E,
        NativeKey::KeyF => KeyCode::F,
        NativeKey::KeyG => KeyCode::G,
        NativeKey::KeyH => KeyCode::H,
        NativeKey::KeyI => KeyCode::I,
        NativeKey::KeyJ => KeyCode::J,
        NativeKey::KeyK => KeyCode::K,
        NativeKey::KeyL => KeyCode::L,
        NativeKey::KeyM => KeyCode::M,
        NativeKey::KeyN => KeyCode::N,
        NativeKey::KeyO => KeyCode::O,
        NativeKey::KeyP => KeyCode::P,
        NativeKey::KeyQ => KeyCode::Q,
        NativeKey::KeyR => KeyCode::R,
        NativeKey::KeyS => KeyCode::S,
        NativeKey::KeyT => KeyCode::T,
        NativeKey::KeyU => KeyCode::U,
        NativeKey::KeyV => KeyCode::V,
        NativeKey::KeyW => KeyCode::W,
        NativeKey::KeyX => KeyCode::X,
        NativeKey::KeyY => KeyCode::Y,
        NativeKey::KeyZ => KeyCode::Z,

        NativeKey::Numpad0 => KeyCode::Numpad0,
        NativeKey::Numpad1 => KeyCode::Numpad1,
        NativeKey::Numpad2 => KeyCode::Numpad2,
        NativeKey::Numpad3 => KeyCode::Numpad3,
        NativeKey::Numpad4 => KeyCode::Numpad4,
        NativeKey::Numpad5 => KeyCode::Numpad5,
        NativeKey::Numpad6 => KeyCode::Numpad6,
        NativeKey::Numpad7 => KeyCode::Numpad7,
        NativeKey::Numpad8 => KeyCode::Numpad8,
        NativeKey::Numpad9 => KeyCode::Numpad9,

        NativeKey::F1 => KeyCode::F1,
        NativeKey::F2 => KeyCode::F2,
        NativeKey::F3 => KeyCode::F3,
        NativeKey::F4 => KeyCode::F4,
        NativeKey::F5 => KeyCode::F5,
        NativeKey::F6 => KeyCode::F6,
        NativeKey::F7 => KeyCode::F7,
        NativeKey::F8 => KeyCode::F8,
        NativeKey::F9 => KeyCode::F9,
        NativeKey::F10 => KeyCode::F10,
        NativeKey::F11 => KeyCode::F11,
        NativeKey::F12 => KeyCode::F12,

        NativeKey::ArrowLeft => KeyCode::Left,
        NativeKey::ArrowUp => KeyCode::Up,
        NativeKey::ArrowRight => KeyCode::Right,
        NativeKey::ArrowDown => KeyCode::Down,

        _ => KeyCode::Unknown,
    }
}
