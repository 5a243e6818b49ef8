// =============================================================================
// EMBER - minimal Vulkan engine skeleton
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Application (init / update / draw / shutdown / on_event)       │
// │    └── Engine (main loop)                                       │
// │          ├── Window (winit, event listeners)                    │
// │          └── Renderer (frame protocol)                          │
// │                └── GraphicsContext                              │
// │                      └── Instance, Surface, Device, SwapChain   │
// │                            └── Command buffers + sync objects   │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod config;
pub mod engine;
pub mod logging;
pub mod platform;
pub mod renderer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use engine::{Application, Engine};
pub use platform::{Window, WindowEvent};
pub use renderer::Renderer;
