//! vkrender: draws three instances of a textured model.
//!
//! Usage: `vkrender [config.toml]`. Escape quits, `+`/`-` cycle the selected
//! instance, left-drag rotates it, the mouse wheel dollies the camera.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vkrender_core::{Config, FrameTimer};
use vkrender_platform::{InputState, Window};
use vkrender_renderer::Renderer;
use vkrender_scene::Scene;

/// Pixel scroll deltas (touchpads) per wheel line.
const PIXELS_PER_LINE: f64 = 20.0;

struct App {
    config: Config,
    // The renderer holds the surface, so it must go before the window.
    renderer: Option<Renderer>,
    window: Option<Window>,
    scene: Scene,
    input: InputState,
    timer: FrameTimer,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let scene = Scene::new(config.window.width, config.window.height);
        Self {
            config,
            renderer: None,
            window: None,
            scene,
            input: InputState::new(),
            timer: FrameTimer::default(),
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        self.renderer = None;
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config.window).context("Failed to create window")?;
        let renderer = Renderer::new(&window, &self.config).context("Failed to create renderer")?;
        let (width, height) = window.extent();
        self.scene.camera.set_extent(width, height);
        self.renderer = Some(renderer);
        self.window = Some(window);
        info!("Initialization complete, entering main loop");
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let frame = self.input.take_frame();
        if frame.quit {
            event_loop.exit();
            return;
        }
        self.scene.apply_input(&frame);

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match renderer.render(&self.scene) {
            Ok(outcome) => {
                if let Some(stats) = self.timer.frame() {
                    debug!(
                        "{:.1} fps ({:.2} ms), {} frames, last {:?}",
                        stats.fps, stats.frame_ms, stats.total_frames, outcome
                    );
                }
            }
            Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("Render failed")),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.input.on_quit();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
                self.scene.camera.set_extent(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                // Held keys repeat, so holding `+` keeps cycling the selection.
                if let PhysicalKey::Code(key) = event.physical_key
                    && event.state == ElementState::Pressed
                {
                    self.input.on_key_pressed(key);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.input.on_mouse_pressed(button.into()),
                ElementState::Released => self.input.on_mouse_released(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.input.on_cursor_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.input.on_cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
                };
                self.input.on_scroll(lines);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Minimized windows get no redraws; the next Resized event restarts them.
        if let Some(window) = self.window.as_ref()
            && !window.is_minimized()
        {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Tear down GPU state while the window still exists.
        self.renderer = None;
        info!("Exited after {} frames", self.timer.total_frames());
    }
}

fn main() -> Result<()> {
    vkrender_core::init_logging();
    info!("Starting vkrender");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
