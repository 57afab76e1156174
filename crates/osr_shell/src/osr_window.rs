//! One off-screen-rendered browser view: engine callbacks in, compositor and
//! engine calls out.
//!
//! The window owns the compositor, the frame scheduler, the popup overlay and the
//! input mapper. Everything here runs on the UI thread; deferred work goes
//! through the injected [`WindowTaskPoster`].

use frame_scheduler::{Clock, FramePacingMode, FrameScheduler, ScheduledTick, TickDecision};
use input::{
    InputAction, InputActions, InputMapper, KeyStateSnapshot, MapContext, RawKeyInput,
    RawPointerInput,
};
use render_protocol::{DirtyRegion, PaintElementType, Point, Rect, ScreenInfo};
use renderer::{FrameCompositor, PixelUpdate, PresentError};
use view::{PopupOverlay, device_to_logical, logical_to_device, logical_to_device_rect};

use crate::config::ShellConfig;
use crate::host::{BrowserHost, EngineEventSink, WindowTaskPoster};
use crate::registry::ViewId;

pub struct OsrWindow<H: BrowserHost, C: FrameCompositor> {
    view_id: ViewId,
    host: Option<H>,
    compositor: C,
    scheduler: FrameScheduler,
    clock: Box<dyn Clock>,
    poster: Box<dyn WindowTaskPoster>,
    popup: PopupOverlay,
    mapper: InputMapper,
    keys: KeyStateSnapshot,
    device_scale_factor: f32,
    client_rect: Rect,
    window_origin: Point,
    hidden: bool,
    painting_popup: bool,
}

impl<H: BrowserHost, C: FrameCompositor> OsrWindow<H, C> {
    pub fn new(
        view_id: ViewId,
        config: &ShellConfig,
        compositor: C,
        clock: Box<dyn Clock>,
        poster: Box<dyn WindowTaskPoster>,
    ) -> Self {
        Self {
            view_id,
            host: None,
            compositor,
            scheduler: FrameScheduler::new(config.scheduler_config()),
            clock,
            poster,
            popup: PopupOverlay::new(),
            mapper: InputMapper::new(config.double_click_thresholds()),
            keys: KeyStateSnapshot::new(),
            device_scale_factor: 1.0,
            client_rect: Rect::default(),
            window_origin: Point::default(),
            hidden: false,
            painting_popup: false,
        }
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.host.as_mut()
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    pub fn popup(&self) -> &PopupOverlay {
        &self.popup
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn keys_mut(&mut self) -> &mut KeyStateSnapshot {
        &mut self.keys
    }

    pub fn device_scale_factor(&self) -> f32 {
        self.device_scale_factor
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Binds the engine browser once it exists. A second browser is ignored.
    pub fn attach_host(&mut self, host: H) {
        if self.host.is_some() {
            log::warn!(target: "osr_shell", "view {:?} already has a browser", self.view_id);
            return;
        }
        self.host = Some(host);
        self.on_browser_created();
    }

    pub fn set_device_scale_factor(&mut self, device_scale_factor: f32) {
        debug_assert!(device_scale_factor > 0.0, "device scale factor must be positive");
        if self.device_scale_factor == device_scale_factor {
            return;
        }
        log::debug!(
            target: "osr_shell",
            "view {:?} scale factor {} -> {}",
            self.view_id,
            self.device_scale_factor,
            device_scale_factor
        );
        self.device_scale_factor = device_scale_factor;
        if let Some(host) = self.host.as_mut() {
            host.notify_screen_info_changed();
            host.was_resized();
        }
    }

    /// Client area size in device pixels.
    pub fn on_size(&mut self, width: u32, height: u32) {
        self.client_rect = Rect::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        );
        self.compositor.resize_surface(width, height);
        if let Some(host) = self.host.as_mut() {
            host.was_resized();
        }
    }

    /// Screen position of the client area origin, in device pixels.
    pub fn set_window_origin(&mut self, origin: Point) {
        self.window_origin = origin;
    }

    pub fn show(&mut self) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        if self.hidden {
            host.was_hidden(false);
            self.hidden = false;
        }
        host.set_focus(true);
    }

    pub fn hide(&mut self) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        host.set_focus(false);
        if !self.hidden {
            host.was_hidden(true);
            self.hidden = true;
        }
    }

    pub fn set_focus(&mut self, focus: bool) {
        if let Some(host) = self.host.as_mut() {
            host.set_focus(focus);
        }
    }

    /// Requests a frame; coalesced while a tick is outstanding.
    pub fn invalidate(&mut self) {
        let now = self.clock.now_micros();
        if let Some(decision) = self.scheduler.invalidate(now) {
            self.apply_tick_decision(decision);
        }
    }

    pub fn on_tick(&mut self, tick: ScheduledTick) {
        let now = self.clock.now_micros();
        let decision = self.scheduler.on_tick(tick, now);
        self.apply_tick_decision(decision);
    }

    /// The native window needs repainting: ask the engine for the whole view.
    pub fn on_wm_paint(&mut self) {
        let frame = self
            .host
            .as_mut()
            .and_then(|host| host.invalidate(PaintElementType::View));
        if let Some(frame) = frame {
            frame.deliver_to(self);
        }
    }

    pub fn render(&mut self) {
        let Err(PresentError::Surface(error)) = self.compositor.render() else {
            return;
        };
        match error {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                log::debug!(target: "osr_shell", "surface {error:?}; reconfiguring");
                self.compositor.reconfigure_surface();
                self.invalidate();
            }
            wgpu::SurfaceError::OutOfMemory => {
                panic!("surface acquisition ran out of memory");
            }
            other => {
                log::warn!(target: "osr_shell", "surface acquisition failed: {other:?}");
                self.invalidate();
            }
        }
    }

    pub fn on_pointer_event(&mut self, input: &RawPointerInput) {
        let context = MapContext {
            popup: &self.popup,
            device_scale_factor: self.device_scale_factor,
            keys: &self.keys,
        };
        let actions = self.mapper.map_pointer(input, &context);
        self.apply_input_actions(actions);
    }

    pub fn on_key_event(&mut self, input: &RawKeyInput) {
        if self.host.is_none() {
            return;
        }
        let actions = self.mapper.map_key(input, &self.keys);
        self.apply_input_actions(actions);
    }

    pub fn on_capture_lost(&mut self) {
        let actions = self.mapper.map_capture_lost();
        self.apply_input_actions(actions);
    }

    fn apply_input_actions(&mut self, actions: InputActions) {
        for action in actions {
            match action {
                InputAction::Forward(event) => {
                    if let Some(host) = self.host.as_mut() {
                        host.send_input_event(&event);
                    }
                }
                InputAction::RequestFocus => self.set_focus(true),
                InputAction::IncrementSpin { delta_x, delta_y } => {
                    self.compositor.increment_spin(delta_x, delta_y)
                }
                InputAction::ResetSpin => self.compositor.set_spin(0.0, 0.0),
                InputAction::Invalidate => self.invalidate(),
            }
        }
    }

    fn apply_tick_decision(&mut self, decision: TickDecision) {
        match decision {
            TickDecision::RenderNow => self.render(),
            TickDecision::Reschedule {
                tick,
                after,
                request_external_frame,
            } => {
                self.poster.post_tick(self.view_id, tick, after);
                if !request_external_frame {
                    return;
                }
                if let Some(host) = self.host.as_mut() {
                    host.send_external_begin_frame();
                }
            }
        }
    }

    fn logical_view_size(&self) -> (i32, i32) {
        let width = device_to_logical(self.client_rect.width, self.device_scale_factor).max(1);
        let height = device_to_logical(self.client_rect.height, self.device_scale_factor).max(1);
        (width, height)
    }
}

impl<H: BrowserHost, C: FrameCompositor> EngineEventSink for OsrWindow<H, C> {
    fn on_paint(
        &mut self,
        element: PaintElementType,
        dirty: &DirtyRegion,
        buffer: &[u8],
        width: i32,
        height: i32,
    ) {
        if self.scheduler.mode() == FramePacingMode::ExternalFrame {
            // Keeps the begin-frame timer running.
            self.invalidate();
        }

        let update = PixelUpdate {
            element,
            dirty,
            buffer,
            width,
            height,
        };
        if self.painting_popup {
            self.compositor.on_pixel_update(update, &self.popup);
            return;
        }

        self.compositor.initialize();
        self.compositor.on_pixel_update(update, &self.popup);
        if element == PaintElementType::View {
            self.popup.update_view_size(self.compositor.view_size());
            if self.popup.is_visible() {
                self.painting_popup = true;
                let frame = self
                    .host
                    .as_mut()
                    .and_then(|host| host.invalidate(PaintElementType::Popup));
                if let Some(frame) = frame {
                    frame.deliver_to(self);
                }
                self.painting_popup = false;
            }
        }
        self.render();
    }

    fn on_popup_show(&mut self, show: bool) {
        if show {
            return;
        }
        self.popup.clear();
        let frame = self
            .host
            .as_mut()
            .and_then(|host| host.invalidate(PaintElementType::View));
        if let Some(frame) = frame {
            frame.deliver_to(self);
        }
    }

    fn on_popup_size(&mut self, rect: Rect) {
        let device_rect = logical_to_device_rect(rect, self.device_scale_factor);
        self.popup
            .set_reported_rect(device_rect, self.compositor.view_size());
    }

    fn view_rect(&self) -> Rect {
        let (width, height) = self.logical_view_size();
        Rect::new(0, 0, width, height)
    }

    fn screen_info(&self) -> Option<ScreenInfo> {
        let view_rect = self.view_rect();
        Some(ScreenInfo {
            device_scale_factor: self.device_scale_factor,
            rect: view_rect,
            available_rect: view_rect,
        })
    }

    fn screen_point(&self, view_x: i32, view_y: i32) -> Option<Point> {
        Some(Point::new(
            self.window_origin.x + logical_to_device(view_x, self.device_scale_factor),
            self.window_origin.y + logical_to_device(view_y, self.device_scale_factor),
        ))
    }

    fn on_browser_created(&mut self) {
        if self.host.is_some() && self.scheduler.mode() == FramePacingMode::ExternalFrame {
            // Starts the begin-frame timer.
            self.invalidate();
        }
        // Shown on a later turn so the engine can finish setting up the browser.
        self.poster.post_show(self.view_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use frame_scheduler::ManualClock;
    use input::{MouseButtonState, PointerEventPhase};
    use render_protocol::{EngineInputEvent, MouseButton, MouseEvent};

    use super::*;
    use crate::registry::ViewIdAllocator;
    use crate::test_support::{
        FakeCompositor, FakeHost, HostCall, Posted, RecordingPoster, solid_frame,
    };

    struct Harness {
        window: OsrWindow<FakeHost, FakeCompositor>,
        clock: ManualClock,
        poster: RecordingPoster,
    }

    fn harness(config: ShellConfig) -> Harness {
        let clock = ManualClock::starting_at(1_000_000);
        let poster = RecordingPoster::default();
        let view_id = ViewIdAllocator::new().allocate();
        let mut window = OsrWindow::new(
            view_id,
            &config,
            FakeCompositor::new(),
            Box::new(clock.clone()),
            Box::new(poster.clone()),
        );
        window.attach_host(FakeHost::default());
        window.on_size(200, 100);
        window.host_mut().expect("host attached").take_calls();
        poster.take();
        Harness {
            window,
            clock,
            poster,
        }
    }

    fn host_calls(window: &mut OsrWindow<FakeHost, FakeCompositor>) -> Vec<HostCall> {
        window.host_mut().expect("host attached").take_calls()
    }

    #[test]
    fn scale_change_notifies_engine_once_and_halves_input() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;

        window.set_device_scale_factor(1.0);
        assert!(host_calls(window).is_empty());

        window.set_device_scale_factor(2.0);
        window.set_device_scale_factor(2.0);
        assert_eq!(
            host_calls(window),
            vec![HostCall::NotifyScreenInfoChanged, HostCall::WasResized]
        );

        window.on_pointer_event(&RawPointerInput::new(PointerEventPhase::Move, 100, 60, 10));
        assert_eq!(
            host_calls(window),
            vec![HostCall::Input(EngineInputEvent::MouseMove {
                event: MouseEvent {
                    x: 50,
                    y: 30,
                    modifiers: Default::default(),
                },
                mouse_leave: false,
            })]
        );
    }

    #[test]
    fn view_paint_with_popup_uploads_popup_pixels_before_render() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;
        solid_frame(PaintElementType::View, 50, 100, [1, 1, 1, 0xFF]).deliver_to(window);
        assert_eq!(window.compositor().render_count, 1);
        assert!(window.compositor().initialized);

        window.on_popup_size(Rect::new(-10, 5, 100, 50));
        assert_eq!(window.popup().effective_rect(), Rect::new(0, 5, 40, 50));
        window.host_mut().expect("host").popup_frame =
            Some(solid_frame(PaintElementType::Popup, 100, 50, [9, 9, 9, 0xFF]));
        host_calls(window);

        solid_frame(PaintElementType::View, 50, 100, [1, 1, 1, 0xFF]).deliver_to(window);

        assert_eq!(
            host_calls(window),
            vec![HostCall::Invalidate(PaintElementType::Popup)]
        );
        let texture = &window.compositor().texture;
        assert_eq!(texture.pixel(0, 5), [9, 9, 9, 0xFF]);
        assert_eq!(texture.pixel(39, 54), [9, 9, 9, 0xFF]);
        assert_eq!(texture.pixel(40, 5), [1, 1, 1, 0xFF]);
        assert_eq!(texture.pixel(0, 4), [1, 1, 1, 0xFF]);
        // The popup re-entry uploads only; one render per view paint.
        assert_eq!(window.compositor().render_count, 2);
        assert!(!window.painting_popup);
    }

    #[test]
    fn popup_pointer_events_are_shifted_then_scaled() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;
        solid_frame(PaintElementType::View, 50, 100, [0; 4]).deliver_to(window);
        window.on_popup_size(Rect::new(-10, 5, 100, 50));
        host_calls(window);

        window.on_pointer_event(&RawPointerInput::new(PointerEventPhase::Move, 5, 10, 0));
        assert_eq!(
            host_calls(window),
            vec![HostCall::Input(EngineInputEvent::MouseMove {
                event: MouseEvent {
                    x: -5,
                    y: 10,
                    modifiers: Default::default(),
                },
                mouse_leave: false,
            })]
        );
    }

    #[test]
    fn hiding_the_popup_clears_it_and_repaints_the_view() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;
        solid_frame(PaintElementType::View, 50, 100, [0; 4]).deliver_to(window);
        window.on_popup_size(Rect::new(10, 10, 20, 20));
        assert!(window.popup().is_visible());
        window.host_mut().expect("host").view_frame =
            Some(solid_frame(PaintElementType::View, 50, 100, [2; 4]));
        host_calls(window);

        window.on_popup_show(false);

        assert!(!window.popup().is_visible());
        assert_eq!(
            host_calls(window),
            vec![HostCall::Invalidate(PaintElementType::View)]
        );
        assert_eq!(window.compositor().texture.pixel(15, 15), [2; 4]);
        assert_eq!(window.compositor().render_count, 2);
    }

    #[test]
    fn timer_invalidates_coalesce_into_one_render() {
        let mut harness = harness(ShellConfig::default());
        solid_frame(PaintElementType::View, 20, 20, [0; 4]).deliver_to(&mut harness.window);
        let renders_before = harness.window.compositor().render_count;

        harness.window.invalidate();
        harness.window.invalidate();
        let posted = harness.poster.take();
        assert_eq!(posted.len(), 1);
        let Posted::Tick(view, tick, after) = posted[0] else {
            panic!("expected a tick, got {posted:?}");
        };
        assert_eq!(view, harness.window.view_id());
        assert_eq!(after, Duration::from_micros(1_000_000 / 30));

        harness.clock.advance(33_333);
        harness.window.on_tick(tick);
        assert_eq!(harness.window.compositor().render_count, renders_before + 1);
        assert!(!harness.window.scheduler().is_pending());
        assert!(harness.poster.take().is_empty());
    }

    #[test]
    fn external_mode_keeps_requesting_begin_frames() {
        let config = ShellConfig {
            external_begin_frame_enabled: true,
            windowless_frame_rate: 50,
            ..ShellConfig::default()
        };
        let clock = ManualClock::starting_at(0);
        let poster = RecordingPoster::default();
        let view_id = ViewIdAllocator::new().allocate();
        let mut window = OsrWindow::new(
            view_id,
            &config,
            FakeCompositor::new(),
            Box::new(clock.clone()),
            Box::new(poster.clone()),
        );

        window.attach_host(FakeHost::default());
        assert_eq!(host_calls(&mut window), vec![HostCall::ExternalBeginFrame]);
        let posted = poster.take();
        let Posted::Tick(_, tick, after) = posted[0] else {
            panic!("expected a tick first, got {posted:?}");
        };
        assert_eq!(after, Duration::from_micros(20_000));
        assert_eq!(posted[1], Posted::Show(view_id));

        clock.advance(20_000);
        window.on_tick(tick);
        assert_eq!(host_calls(&mut window), vec![HostCall::ExternalBeginFrame]);
        let posted = poster.take();
        assert!(matches!(
            posted.as_slice(),
            [Posted::Tick(_, _, next_after)] if *next_after == Duration::from_micros(20_000)
        ));
        assert_eq!(window.compositor().render_count, 0);
    }

    #[test]
    fn show_and_hide_report_visibility_only_on_change() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;

        window.show();
        assert_eq!(host_calls(window), vec![HostCall::SetFocus(true)]);

        window.hide();
        window.hide();
        assert_eq!(
            host_calls(window),
            vec![
                HostCall::SetFocus(false),
                HostCall::WasHidden(true),
                HostCall::SetFocus(false),
            ]
        );
        assert!(window.is_hidden());

        window.show();
        assert_eq!(
            host_calls(window),
            vec![HostCall::WasHidden(false), HostCall::SetFocus(true)]
        );
    }

    #[test]
    fn view_geometry_is_reported_in_logical_pixels() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;
        window.set_device_scale_factor(2.0);
        window.set_window_origin(Point::new(100, 200));

        window.on_size(3, 1);
        assert_eq!(window.compositor().surface_size, Some((3, 1)));
        assert_eq!(window.view_rect(), Rect::new(0, 0, 1, 1));

        window.on_size(301, 150);
        let info = window.screen_info().expect("screen info");
        assert_eq!(info.rect, Rect::new(0, 0, 150, 75));
        assert_eq!(info.available_rect, info.rect);
        assert_eq!(info.device_scale_factor, 2.0);
        assert_eq!(window.screen_point(10, 5), Some(Point::new(120, 210)));
    }

    #[test]
    fn shift_drag_spins_the_view_without_engine_input() {
        let mut harness = harness(ShellConfig::default());
        let window = &mut harness.window;
        let shift = MouseButtonState::LEFT_BUTTON | MouseButtonState::SHIFT;

        window.on_pointer_event(
            &RawPointerInput::new(PointerEventPhase::Down(MouseButton::Left), 10, 10, 0)
                .with_buttons(shift),
        );
        window.on_pointer_event(
            &RawPointerInput::new(PointerEventPhase::Move, 14, 7, 5).with_buttons(shift),
        );
        let spin = window.compositor().spin();
        assert_eq!((spin.spin_x(), spin.spin_y()), (-4.0, 3.0));
        assert_eq!(harness.poster.take().len(), 1);

        window.on_capture_lost();
        window.on_pointer_event(&RawPointerInput::new(
            PointerEventPhase::Up(MouseButton::Left),
            14,
            7,
            9,
        ));
        assert!(window.compositor().spin().is_identity());
        assert_eq!(host_calls(window), vec![HostCall::SetFocus(true)]);
    }

    #[test]
    fn lost_surface_is_reconfigured_and_redrawn() {
        let mut harness = harness(ShellConfig::default());
        solid_frame(PaintElementType::View, 20, 20, [0; 4]).deliver_to(&mut harness.window);
        harness.poster.take();

        harness.window.compositor_mut().next_render_error = Some(wgpu::SurfaceError::Lost);
        harness.window.render();

        assert_eq!(harness.window.compositor().reconfigure_count, 1);
        assert_eq!(harness.poster.take().len(), 1);
        assert!(harness.window.scheduler().is_pending());
    }

    #[test]
    fn input_before_the_browser_exists_is_mapped_but_not_sent() {
        let clock = ManualClock::starting_at(0);
        let mut window: OsrWindow<FakeHost, FakeCompositor> = OsrWindow::new(
            ViewIdAllocator::new().allocate(),
            &ShellConfig::default(),
            FakeCompositor::new(),
            Box::new(clock),
            Box::new(RecordingPoster::default()),
        );

        window.on_pointer_event(&RawPointerInput::new(
            PointerEventPhase::Down(MouseButton::Left),
            3,
            3,
            0,
        ));
        window.show();
        window.on_wm_paint();
        assert!(window.host().is_none());
        assert_eq!(window.mapper.click_count(), 1);
        assert!(!window.is_hidden());
    }
}
