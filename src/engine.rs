// Engine - owns the window and renderer and runs the main loop
//
// MAIN LOOP (one iteration):
// 1. Poll window events, react to close/resize, forward to the application
// 2. Application update with the frame delta
// 3. begin_draw -> application draw -> end_draw (skipped when no frame opened)

use anyhow::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use crate::config::Config;
use crate::platform::{ListenerId, Window, WindowEvent, WindowProps, WinitWindow};
use crate::renderer::Renderer;

/// Lifecycle hooks of a concrete application, driven by `Engine::run`.
///
/// Any error returned from `init`, `update`, `draw` or `shutdown` stops the
/// loop and is returned from `run`. Errors from `on_event` are only logged.
pub trait Application {
    fn init(&mut self, engine: &mut Engine) -> Result<()>;
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<()>;
    fn draw(&mut self, engine: &mut Engine) -> Result<()>;
    fn shutdown(&mut self, engine: &mut Engine) -> Result<()>;

    fn on_event(&mut self, _engine: &mut Engine, _event: &WindowEvent) -> Result<()> {
        Ok(())
    }
}

/// IMPORTANT: Field order matters for Drop. The renderer owns the surface
/// created from the window, so it goes first.
pub struct Engine {
    renderer: Renderer,
    window: Box<dyn Window>,
    /// Filled by the window listener during `poll_events`, drained by the loop
    events: Rc<RefCell<VecDeque<WindowEvent>>>,
    listener: ListenerId,
    is_running: bool,
}

impl Engine {
    /// Open the native window and bring up the renderer on it.
    pub fn new(config: &Config) -> Result<Self> {
        let window = WinitWindow::new(WindowProps::from(&config.window))?;
        let renderer = Renderer::new(&window, config)?;

        Ok(Self::from_parts(Box::new(window), renderer))
    }

    /// Assemble an engine from an existing window and a renderer bound to it.
    pub fn from_parts(mut window: Box<dyn Window>, renderer: Renderer) -> Self {
        let events = Rc::new(RefCell::new(VecDeque::new()));

        let queue = Rc::clone(&events);
        let listener = window.add_event_listener(Box::new(
            move |event: &WindowEvent| -> Result<()> {
                queue.borrow_mut().push_back(*event);
                Ok(())
            },
        ));

        log::info!("Successfully initialized engine");

        Self {
            renderer,
            window,
            events,
            listener,
            is_running: true,
        }
    }

    /// Run `app` until it closes the engine or the window is closed.
    pub fn run(&mut self, app: &mut dyn Application) -> Result<()> {
        app.init(self)?;

        let mut last = Instant::now();

        while self.is_running && !self.window.should_close() {
            let now = Instant::now();
            let delta_time = now.duration_since(last).as_secs_f32();
            last = now;

            self.window.poll_events();
            self.handle_events(app);

            app.update(self, delta_time)?;

            if self.renderer.begin_draw(self.window.as_mut())? {
                app.draw(self)?;
                self.renderer.end_draw(self.window.as_mut())?;
            }
        }

        // Nothing may still be using GPU resources the application releases
        self.renderer.wait_idle()?;
        app.shutdown(self)
    }

    /// Stop the main loop after the current iteration.
    pub fn close(&mut self) {
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn window(&self) -> &dyn Window {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> &mut dyn Window {
        self.window.as_mut()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    fn handle_events(&mut self, app: &mut dyn Application) {
        loop {
            let Some(event) = self.events.borrow_mut().pop_front() else {
                break;
            };

            match event {
                WindowEvent::Close => self.close(),
                WindowEvent::Resize { width, height } => self.renderer.resize(width, height),
                _ => {}
            }

            if let Err(e) = app.on_event(self, &event) {
                log::error!("Error handling {:?}: {:#}", event.kind(), e);
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.window.remove_event_listener(self.listener);
        log::info!("Successfully shutdown engine");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::KeyCode;
    use crate::testing::{Call, CallLog, FakeBackend, FakeWindow};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        updates: usize,
        close_after_updates: Option<usize>,
        fail_on_events: bool,
    }

    impl Application for Recorder {
        fn init(&mut self, _engine: &mut Engine) -> Result<()> {
            self.calls.push("init".to_string());
            Ok(())
        }

        fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<()> {
            assert!(delta_time >= 0.0);
            self.updates += 1;
            self.calls.push("update".to_string());

            if self.close_after_updates == Some(self.updates) {
                engine.close();
            }
            Ok(())
        }

        fn draw(&mut self, engine: &mut Engine) -> Result<()> {
            assert!(engine.renderer().is_frame_in_progress());
            self.calls.push("draw".to_string());
            Ok(())
        }

        fn shutdown(&mut self, _engine: &mut Engine) -> Result<()> {
            self.calls.push("shutdown".to_string());
            Ok(())
        }

        fn on_event(&mut self, _engine: &mut Engine, event: &WindowEvent) -> Result<()> {
            self.calls.push(format!("event {:?}", event.kind()));
            if self.fail_on_events {
                anyhow::bail!("listener failure");
            }
            Ok(())
        }
    }

    fn engine(window: FakeWindow) -> (Engine, CallLog) {
        let (backend, calls) = FakeBackend::new(3);
        let renderer = Renderer::with_backend(Box::new(backend), 2);
        (Engine::from_parts(Box::new(window), renderer), calls)
    }

    #[test]
    fn close_event_ends_loop_after_current_iteration() {
        let mut window = FakeWindow::new(800, 600);
        window.close_after_polls(2);
        let (mut engine, _calls) = engine(window);
        let mut app = Recorder::default();

        engine.run(&mut app).unwrap();

        assert_eq!(
            app.calls,
            vec![
                "init",
                "update",
                "draw",
                "event WindowClose",
                "update",
                "draw",
                "shutdown",
            ]
        );
        assert!(!engine.is_running());
    }

    #[test]
    fn application_can_close_engine() {
        let (mut engine, calls) = engine(FakeWindow::new(800, 600));
        let mut app = Recorder {
            close_after_updates: Some(3),
            ..Default::default()
        };

        engine.run(&mut app).unwrap();

        assert_eq!(app.updates, 3);
        let presents = calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Present(_)))
            .count();
        assert_eq!(presents, 3);
        assert_eq!(calls.borrow().last(), Some(&Call::WaitIdle));
    }

    #[test]
    fn resize_event_recreates_swapchain() {
        let mut window = FakeWindow::new(800, 600);
        window.resize_on_poll(1024, 768);
        let (mut engine, calls) = engine(window);
        let mut app = Recorder {
            close_after_updates: Some(2),
            ..Default::default()
        };

        engine.run(&mut app).unwrap();

        let recreations: Vec<Call> = calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Recreate { .. }))
            .cloned()
            .collect();
        assert_eq!(
            recreations,
            vec![Call::Recreate {
                width: 1024,
                height: 768,
                vsync: false,
            }]
        );
        assert_eq!(engine.window().width(), 1024);
    }

    #[test]
    fn failing_event_handler_does_not_stop_loop() {
        let mut window = FakeWindow::new(800, 600);
        window.push_event(WindowEvent::KeyPressed {
            key: KeyCode::A,
            repeat_count: 0,
        });
        let (mut engine, _calls) = engine(window);
        let mut app = Recorder {
            close_after_updates: Some(2),
            fail_on_events: true,
            ..Default::default()
        };

        engine.run(&mut app).unwrap();

        assert_eq!(app.updates, 2);
        assert!(app.calls.contains(&"event KeyPressed".to_string()));
    }

    #[test]
    fn closed_window_skips_loop() {
        let mut window = FakeWindow::new(800, 600);
        window.closed = true;
        let (mut engine, calls) = engine(window);
        let mut app = Recorder::default();

        engine.run(&mut app).unwrap();

        assert_eq!(app.calls, vec!["init", "shutdown"]);
        assert_eq!(*calls.borrow(), vec![Call::WaitIdle]);
    }
}
