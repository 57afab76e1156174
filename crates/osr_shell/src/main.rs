use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use frame_scheduler::MonotonicClock;
use input::{MouseButtonState, PointerEventPhase, RawPointerInput};
use osr_shell::{
    DemoEngine, NativeKey, NativeKeyboard, ShellArguments, ShellConfig, ShellState, ViewId, gpu,
    pump_engine,
};
use render_protocol::{MouseButton as EngineMouseButton, Point};
use renderer::OsrCompositor;
use ui_thread::{UiTaskRunner, UiTaskSender, ui_task_channel};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowAttributes, WindowId};

type Shell = ShellState<DemoEngine, OsrCompositor>;

const INITIAL_WINDOW_SIZE: PhysicalSize<u32> = PhysicalSize::new(1024, 768);
/// Native wheel delta for one notch.
const WHEEL_DELTA_PER_LINE: f32 = 120.0;

#[derive(Debug, Clone, Copy)]
enum UserEvent {
    TaskPosted,
}

struct App {
    config: ShellConfig,
    shell: Shell,
    runner: UiTaskRunner<Shell>,
    window: Option<Arc<Window>>,
    view_id: Option<ViewId>,
    cursor: (i32, i32),
    buttons: MouseButtonState,
    keyboard: NativeKeyboard,
    started: Instant,
}

impl App {
    fn new(config: ShellConfig, shell: Shell, runner: UiTaskRunner<Shell>) -> Self {
        Self {
            config,
            shell,
            runner,
            window: None,
            view_id: None,
            cursor: (0, 0),
            buttons: MouseButtonState::empty(),
            keyboard: NativeKeyboard::new(),
            started: Instant::now(),
        }
    }

    fn window_id(&self) -> Option<WindowId> {
        self.window.as_ref().map(|w| w.id())
    }

    fn timestamp_millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn send_pointer(&mut self, phase: PointerEventPhase) {
        let Some(view_id) = self.view_id else {
            return;
        };
        let (x, y) = self.cursor;
        let input =
            RawPointerInput::new(phase, x, y, self.timestamp_millis()).with_buttons(self.buttons);
        if let Some(window) = self.shell.window_mut(view_id) {
            window.on_pointer_event(&input);
        }
    }

    fn handle_key(&mut self, event: &winit::event::KeyEvent) {
        let Some(view_id) = self.view_id else {
            return;
        };
        let Some(window) = self.shell.window_mut(view_id) else {
            return;
        };
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        self.keyboard.on_key(
            window,
            NativeKey {
                code,
                pressed: event.state == ElementState::Pressed,
                repeat: event.repeat,
                text: event.text.as_deref(),
            },
        );
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        if self.window.is_some() {
            return;
        }

        let window = Arc::new(
            event_loop
                .create_window(
                    WindowAttributes::default()
                        .with_title(format!("osr_shell - {}", self.config.start_url))
                        .with_inner_size(INITIAL_WINDOW_SIZE)
                        .with_transparent(self.config.background_color.is_transparent()),
                )
                .expect("create window"),
        );

        let compositor = pollster::block_on(gpu::create_compositor(
            window.clone(),
            self.config.compositor_config(),
        ));
        let view_id =
            self.shell
                .create_window(&self.config, compositor, Box::new(MonotonicClock::new()));
        let osr = self
            .shell
            .window_mut(view_id)
            .expect("window registered just now");
        osr.set_device_scale_factor(window.scale_factor() as f32);
        let size = window.inner_size();
        osr.on_size(size.width, size.height);
        if let Ok(origin) = window.inner_position() {
            osr.set_window_origin(Point::new(origin.x, origin.y));
        }
        osr.attach_host(DemoEngine::new(&self.config.start_url));

        if !self.config.external_begin_frame_enabled {
            let interval = Duration::from_micros(osr.scheduler().target_interval_micros());
            post_animation_frame(self.shell.tasks(), interval);
        }

        self.window = Some(window);
        self.view_id = Some(view_id);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            // Tasks run in `about_to_wait`.
            UserEvent::TaskPosted => {}
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id() != Some(window_id) {
            return;
        }
        let Some(view_id) = self.view_id else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.shell.close_window(view_id);
                self.view_id = None;
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(osr) = self.shell.window_mut(view_id) {
                    osr.on_size(new_size.width, new_size.height);
                }
            }
            WindowEvent::Moved(_) => {
                let origin = self
                    .window
                    .as_ref()
                    .and_then(|window| window.inner_position().ok());
                if let (Some(origin), Some(osr)) = (origin, self.shell.window_mut(view_id)) {
                    osr.set_window_origin(Point::new(origin.x, origin.y));
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(osr) = self.shell.window_mut(view_id) {
                    osr.set_device_scale_factor(scale_factor as f32);
                }
            }
            WindowEvent::Focused(focused) => {
                if let Some(osr) = self.shell.window_mut(view_id) {
                    if !focused {
                        osr.keys_mut().release_all();
                        osr.on_capture_lost();
                    }
                    osr.set_focus(focused);
                }
            }
            WindowEvent::Occluded(occluded) => {
                if let Some(osr) = self.shell.window_mut(view_id) {
                    if occluded {
                        osr.hide();
                    } else {
                        osr.show();
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(osr) = self.shell.window_mut(view_id) {
                    osr.on_wm_paint();
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                let modifiers = modifiers.state();
                self.keyboard.on_modifiers_changed(modifiers);
                self.buttons
                    .set(MouseButtonState::SHIFT, modifiers.shift_key());
                self.buttons
                    .set(MouseButtonState::CONTROL, modifiers.control_key());
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(&event);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as i32, position.y as i32);
                self.send_pointer(PointerEventPhase::Move);
            }
            WindowEvent::CursorLeft { .. } => {
                self.send_pointer(PointerEventPhase::Leave);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some((engine_button, flag)) = map_mouse_button(button) else {
                    return;
                };
                let pressed = state == ElementState::Pressed;
                self.buttons.set(flag, pressed);
                let phase = if pressed {
                    PointerEventPhase::Down(engine_button)
                } else {
                    PointerEventPhase::Up(engine_button)
                };
                self.send_pointer(phase);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => lines * WHEEL_DELTA_PER_LINE,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32,
                };
                self.send_pointer(PointerEventPhase::Wheel {
                    delta: delta.round() as i32,
                });
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.runner.run_due(&mut self.shell, Instant::now());
        self.shell.for_each_window(|window| {
            pump_engine(window);
        });
        match self.runner.next_deadline(Instant::now()) {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}

/// Drives the demo page animation in timer mode. External-frame mode animates
/// from `send_external_begin_frame` instead.
fn post_animation_frame(tasks: &UiTaskSender<Shell>, interval: Duration) {
    let posted = tasks.post_delayed(interval, move |shell: &mut Shell| {
        shell.for_each_window(|window| {
            if let Some(engine) = window.host_mut() {
                engine.animate();
            }
        });
        post_animation_frame(shell.tasks(), interval);
    });
    if let Err(error) = posted {
        log::warn!(target: "osr_shell", "animation stopped: {error}");
    }
}

fn map_mouse_button(button: MouseButton) -> Option<(EngineMouseButton, MouseButtonState)> {
    match button {
        MouseButton::Left => Some((EngineMouseButton::Left, MouseButtonState::LEFT_BUTTON)),
        MouseButton::Right => Some((EngineMouseButton::Right, MouseButtonState::RIGHT_BUTTON)),
        MouseButton::Middle => Some((EngineMouseButton::Middle, MouseButtonState::MIDDLE_BUTTON)),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let arguments = ShellArguments::parse();
    let config = ShellConfig::from_arguments(&arguments).context("load shell config")?;
    log::info!(target: "osr_shell", "starting with {config:?}");

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("create event loop")?;
    let proxy = Mutex::new(event_loop.create_proxy());
    let (tasks, runner) = ui_task_channel::<Shell>();
    let tasks = tasks.with_wake(move || {
        let Ok(proxy) = proxy.lock() else {
            return;
        };
        if proxy.send_event(UserEvent::TaskPosted).is_err() {
            log::trace!(target: "osr_shell", "event loop closed; wake dropped");
        }
    });

    let mut app = App::new(config, ShellState::new(tasks), runner);
    event_loop.run_app(&mut app).context("run event loop")?;
    Ok(())
}
