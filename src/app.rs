//! Windowed viewer: winit event loop driving a [`GpuSimulation`].
//!
//! Keyboard input stands in for a configuration panel and writes into the
//! [`ControlStore`]; the simulation drains its changes before every frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use life_gpu::{
    compute::gpu::{DeviceContext, FrameOutcome, GpuError, GpuSimulation},
    schema::{ConfigError, ControlStore, Controls, Pattern, SimulationConfig},
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

/// Grid width change per `[` / `]` press.
const GRID_WIDTH_STEP: u32 = 8;
/// Smallest grid width reachable from the keyboard.
const MIN_GRID_WIDTH: u32 = 16;
/// Interval change per arrow key press.
const INTERVAL_STEP: Duration = Duration::from_millis(10);
/// Gliders placed by the glider key.
const GLIDER_COUNT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

struct App {
    controls: ControlStore,
    window: Option<Arc<Window>>,
    simulation: Option<GpuSimulation>,
    error: Option<AppError>,
}

impl App {
    fn new(controls: ControlStore) -> Self {
        Self {
            controls,
            window: None,
            simulation: None,
            error: None,
        }
    }

    /// Record a fatal error and leave the event loop.
    fn fail(&mut self, el: &ActiveEventLoop, error: AppError) {
        log::error!("{}", error);
        if let Some(mut simulation) = self.simulation.take() {
            simulation.shutdown();
        }
        self.error = Some(error);
        el.exit();
    }

    fn aspect(&self) -> f64 {
        match &self.window {
            Some(window) => {
                let size = window.inner_size();
                size.height.max(1) as f64 / size.width.max(1) as f64
            }
            None => 1.0,
        }
    }

    fn handle_key(&mut self, el: &ActiveEventLoop, key: Key) {
        let result = match key {
            Key::Named(NamedKey::Escape) => {
                el.exit();
                Ok(())
            }
            Key::Named(NamedKey::Space) => {
                self.controls.toggle_playing();
                log::info!("Playing: {}", self.controls.playing());
                Ok(())
            }
            Key::Named(NamedKey::ArrowUp) => {
                let interval = self.controls.update_interval() + INTERVAL_STEP;
                self.controls.set_update_interval(interval);
                Ok(())
            }
            Key::Named(NamedKey::ArrowDown) => {
                let interval = self.controls.update_interval().saturating_sub(INTERVAL_STEP);
                self.controls.set_update_interval(interval);
                Ok(())
            }
            Key::Character(ref s) => match s.as_str() {
                "]" => {
                    let width = self.controls.grid().width.saturating_add(GRID_WIDTH_STEP);
                    self.controls.set_grid_width(width, self.aspect())
                }
                "[" => {
                    let width = self
                        .controls
                        .grid()
                        .width
                        .saturating_sub(GRID_WIDTH_STEP)
                        .max(MIN_GRID_WIDTH);
                    self.controls.set_grid_width(width, self.aspect())
                }
                c if c.eq_ignore_ascii_case("r") => {
                    self.controls.select_pattern(Pattern::Random);
                    Ok(())
                }
                c if c.eq_ignore_ascii_case("g") => {
                    self.controls.select_pattern(Pattern::Glider {
                        count: GLIDER_COUNT,
                    });
                    Ok(())
                }
                c if c.eq_ignore_ascii_case("c") => {
                    self.controls.select_pattern(Pattern::Blank);
                    Ok(())
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::warn!("Ignoring control change: {}", e);
        }
    }

    fn redraw(&mut self, el: &ActiveEventLoop) {
        let Some(simulation) = self.simulation.as_mut() else {
            return;
        };

        for change in self.controls.take_changes() {
            log::debug!("Control change: {:?}", change);
            if let Err(e) = simulation.handle_change(change, &self.controls) {
                // Resource errors halt scheduling until the next grid change
                log::error!("{}", e);
            }
        }

        match simulation.frame(Instant::now(), &self.controls) {
            Ok(FrameOutcome::Skipped { step, .. }) => {
                log::warn!("Frame for step {} skipped", step);
            }
            Ok(_) => {}
            Err(e) => self.fail(el, e.into()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, el: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Life GPU")
            .with_inner_size(PhysicalSize::new(1280u32, 720u32));

        let window = match el.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                el.exit();
                return;
            }
        };
        let size = window.inner_size();
        self.window = Some(window.clone());

        // Derive the grid height from the window aspect, as the slider does
        let width = self.controls.grid().width;
        if let Err(e) = self.controls.set_grid_width(width, self.aspect()) {
            return self.fail(el, e.into());
        }
        self.controls.take_changes();

        let context = match pollster::block_on(DeviceContext::acquire(
            window.clone(),
            size.width,
            size.height,
        )) {
            Ok(context) => context,
            Err(e) => return self.fail(el, e.into()),
        };

        match GpuSimulation::new(context, &self.controls) {
            Ok(simulation) => self.simulation = Some(simulation),
            Err(e) => return self.fail(el, e.into()),
        }

        window.request_redraw();
    }

    fn window_event(&mut self, el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut simulation) = self.simulation.take() {
                    simulation.shutdown();
                }
                el.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.resize_target(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.handle_key(el, event.logical_key);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(el),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, el: &ActiveEventLoop) {
        el.set_control_flow(ControlFlow::Poll);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window and run until it is closed.
pub fn run(config: SimulationConfig) -> Result<(), AppError> {
    let controls = ControlStore::new(&config)?;
    let event_loop = EventLoop::new()?;
    let mut app = App::new(controls);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
