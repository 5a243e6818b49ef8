// =============================================================================
// EMBER DEMO - clears the window to a slowly cycling color
// =============================================================================
//
// CONTROLS:
//   ESC - quit
//   F11 - toggle fullscreen
//
// Key presses and mouse clicks are logged through typed event listeners.
//
// =============================================================================

use anyhow::Result;
use std::time::Instant;

use ember::config::Config;
use ember::engine::{Application, Engine};
use ember::logging;
use ember::platform::{listener, EventKind, KeyCode, ListenerId, WindowEvent};

fn main() {
    let (config, source) = Config::load();
    logging::init(&config.debug);
    source.report(&config);

    log::info!("Starting Ember");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    if let Err(e) = run(&config) {
        log::error!("FATAL: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let mut engine = Engine::new(config)?;
    let mut app = ColorCycle::new(config);
    engine.run(&mut app)
}

struct ColorCycle {
    title: String,
    show_fps: bool,
    total_time: f32,
    listeners: Vec<ListenerId>,

    frame_count: u32,
    last_fps_update: Instant,
}

impl ColorCycle {
    fn new(config: &Config) -> Self {
        Self {
            title: config.window.title.clone(),
            show_fps: config.debug.show_fps,
            total_time: 0.0,
            listeners: Vec::new(),
            frame_count: 0,
            last_fps_update: Instant::now(),
        }
    }

    /// Refresh the window title with the frame rate once a second.
    fn update_fps(&mut self, engine: &mut Engine) {
        self.frame_count += 1;

        let elapsed = self.last_fps_update.elapsed().as_secs_f32();
        if elapsed < 1.0 {
            return;
        }

        let fps = self.frame_count as f32 / elapsed;
        let window = engine.window_mut();
        let mode = if window.is_fullscreen() { "fullscreen" } else { "windowed" };
        let title = format!("{} - {:.0} FPS [{}]", self.title, fps, mode);
        window.set_title(&title);

        self.frame_count = 0;
        self.last_fps_update = Instant::now();
    }
}

impl Application for ColorCycle {
    fn init(&mut self, engine: &mut Engine) -> Result<()> {
        engine.renderer_mut().clear(0.5, 0.5, 0.5, 1.0);

        let window = engine.window_mut();
        self.listeners.push(window.add_event_listener(listener::typed(
            EventKind::KeyPressed,
            |event| {
                if let WindowEvent::KeyPressed { key, repeat_count } = event {
                    log::info!("Key pressed: {:?} (repeated: {})", key, repeat_count);
                }
                Ok(())
            },
        )));
        self.listeners.push(window.add_event_listener(listener::typed(
            EventKind::MouseButtonPressed,
            |event| {
                if let WindowEvent::MouseButtonPressed { button } = event {
                    log::info!("Mouse button pressed: {:?}", button);
                }
                Ok(())
            },
        )));

        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<()> {
        self.total_time += delta_time;

        let red = 0.2 + 0.1 * self.total_time.sin();
        let green = 0.1 + 0.1 * (self.total_time * 1.3).sin();
        let blue = 0.3 + 0.1 * (self.total_time * 0.7).sin();
        engine.renderer_mut().clear(red, green, blue, 1.0);

        Ok(())
    }

    fn draw(&mut self, engine: &mut Engine) -> Result<()> {
        if self.show_fps {
            self.update_fps(engine);
        }
        Ok(())
    }

    fn shutdown(&mut self, engine: &mut Engine) -> Result<()> {
        let window = engine.window_mut();
        for id in self.listeners.drain(..) {
            window.remove_event_listener(id);
        }

        log::info!("Game shutdown");
        Ok(())
    }

    fn on_event(&mut self, engine: &mut Engine, event: &WindowEvent) -> Result<()> {
        match event {
            WindowEvent::KeyPressed {
                key: KeyCode::Escape,
                ..
            } => {
                log::info!("Escape pressed. Closing application");
                engine.close();
            }
            WindowEvent::KeyPressed {
                key: KeyCode::F11,
                repeat_count: 0,
            } => {
                let window = engine.window_mut();
                let fullscreen = !window.is_fullscreen();
                window.set_fullscreen(fullscreen);
            }
            _ => {}
        }
        Ok(())
    }
}
