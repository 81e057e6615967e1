mod app;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use circle_video::error::GpuError;

use crate::app::{App, Cli};

/// How often queued source events are drained while nothing is redrawing.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(30);

struct CircleVideoApp {
    cli: Cli,
    app: Option<App>,
    window: Option<Arc<Window>>,
}

impl CircleVideoApp {
    fn new(cli: Cli) -> Self {
        Self {
            cli,
            app: None,
            window: None,
        }
    }
}

impl ApplicationHandler for CircleVideoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Circle Video")
            .with_transparent(true)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        // Center window on primary monitor
        if let Some(monitor) = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
        {
            let monitor_size = monitor.size();
            let window_size = window.outer_size();
            let monitor_pos = monitor.position();
            let x = (monitor_size.width.saturating_sub(window_size.width)) / 2;
            let y = (monitor_size.height.saturating_sub(window_size.height)) / 2;
            window.set_outer_position(winit::dpi::PhysicalPosition::new(
                monitor_pos.x + x as i32,
                monitor_pos.y + y as i32,
            ));
        }

        self.window = Some(window.clone());

        match App::new(window, &self.cli) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("Circle Video initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize app: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                app.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
                app.window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Space => {
                    app.view.toggle();
                }
                KeyCode::ArrowUp => app.fling_up(),
                KeyCode::ArrowDown => app.fling_down(),
                KeyCode::KeyP => app.toggle_pause(),
                KeyCode::Escape => {
                    app.shutdown();
                    event_loop.exit();
                }
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                app.cursor_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => app.click(),
            WindowEvent::RedrawRequested => match app.render() {
                Ok(()) => {}
                Err(GpuError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    let (width, height) = app.gpu.size();
                    app.resize(width, height);
                    app.window.request_redraw();
                }
                Err(GpuError::Surface(wgpu::SurfaceError::Timeout)) => {
                    log::warn!("Surface timeout");
                }
                Err(e) => {
                    log::error!("Render failed: {e}");
                    app.shutdown();
                    event_loop.exit();
                }
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.app {
            // Ready/end events arrive without a new frame to trigger a redraw.
            if app.pump() > 0 {
                app.window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + EVENT_POLL_INTERVAL));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = CircleVideoApp::new(cli);
    event_loop.run_app(&mut app)?;

    Ok(())
}
