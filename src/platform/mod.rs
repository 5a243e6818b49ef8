// Platform layer - the window contract the renderer and engine consume
//
// The native implementation lives in `winit_window`; everything above this
// module only sees the `Window` trait.

pub mod event;
pub mod listener;
pub mod winit_window;

use anyhow::Result;
use ash::vk;
use std::ffi::CStr;

use crate::config::WindowConfig;

pub use event::{EventKind, KeyCode, MouseButton, WindowEvent};
pub use listener::{EventCallback, ListenerId, ListenerRegistry};
pub use winit_window::WinitWindow;

/// Creation parameters for a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowProps {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub resizable: bool,
    pub fullscreen: bool,
}

impl Default for WindowProps {
    fn default() -> Self {
        Self {
            title: "Ember".to_string(),
            width: 1280,
            height: 720,
            vsync: false,
            resizable: true,
            fullscreen: false,
        }
    }
}

impl From<&WindowConfig> for WindowProps {
    fn from(config: &WindowConfig) -> Self {
        Self {
            title: config.title.clone(),
            width: config.width,
            height: config.height,
            vsync: config.vsync,
            resizable: config.resizable,
            fullscreen: config.fullscreen,
        }
    }
}

/// A native OS window as seen by the renderer and the application loop.
///
/// `width`/`height` are the current framebuffer size in pixels; both are zero
/// while the window is minimized.
pub trait Window {
    fn title(&self) -> &str;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn is_vsynced(&self) -> bool;
    fn is_fullscreen(&self) -> bool;
    fn should_close(&self) -> bool;

    fn set_title(&mut self, title: &str);
    fn set_vsync(&mut self, enabled: bool);
    fn set_fullscreen(&mut self, enabled: bool);
    fn close(&mut self);

    /// Pump pending OS messages, invoking listeners synchronously.
    fn poll_events(&mut self);

    /// Instance extensions needed to create a surface for this window.
    fn required_extensions(&self) -> Result<Vec<&'static CStr>>;

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance)
        -> Result<vk::SurfaceKHR>;

    fn add_event_listener(&mut self, callback: EventCallback) -> ListenerId;
    fn remove_event_listener(&mut self, id: ListenerId) -> bool;
    fn clear_event_listeners(&mut self);
}
