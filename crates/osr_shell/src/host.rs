use std::time::Duration;

use frame_scheduler::ScheduledTick;
use render_protocol::{
    DirtyRegion, EngineInputEvent, KeyEvent, MouseButton, MouseEvent, PaintElementType, Point,
    Rect, ScreenInfo,
};

use crate::registry::ViewId;

/// One engine paint: BGRA premultiplied pixels, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintFrame {
    pub element: PaintElementType,
    pub dirty: DirtyRegion,
    pub pixels: Vec<u8>,
    pub width: i32,
    pub height: i32,
}

impl PaintFrame {
    pub fn deliver_to(&self, sink: &mut dyn EngineEventSink) {
        sink.on_paint(
            self.element,
            &self.dirty,
            &self.pixels,
            self.width,
            self.height,
        );
    }
}

/// Shell-to-engine calls for one browser.
pub trait BrowserHost {
    fn send_external_begin_frame(&mut self);
    fn notify_screen_info_changed(&mut self);
    fn was_resized(&mut self);
    fn was_hidden(&mut self, hidden: bool);
    fn set_focus(&mut self, focus: bool);
    /// Requests a repaint of `element`. Engines that paint synchronously return
    /// the frame so the caller can feed it back through `on_paint`.
    fn invalidate(&mut self, element: PaintElementType) -> Option<PaintFrame>;
    fn send_mouse_click(
        &mut self,
        event: &MouseEvent,
        button: MouseButton,
        mouse_up: bool,
        click_count: u32,
    );
    fn send_mouse_move(&mut self, event: &MouseEvent, mouse_leave: bool);
    fn send_mouse_wheel(&mut self, event: &MouseEvent, delta_x: i32, delta_y: i32);
    fn send_key(&mut self, event: &KeyEvent);
    fn send_capture_lost(&mut self);

    fn send_input_event(&mut self, event: &EngineInputEvent) {
        match event {
            EngineInputEvent::MouseClick {
                event,
                button,
                mouse_up,
                click_count,
            } => self.send_mouse_click(event, *button, *mouse_up, *click_count),
            EngineInputEvent::MouseMove { event, mouse_leave } => {
                self.send_mouse_move(event, *mouse_leave)
            }
            EngineInputEvent::MouseWheel {
                event,
                delta_x,
                delta_y,
            } => self.send_mouse_wheel(event, *delta_x, *delta_y),
            EngineInputEvent::Key(event) => self.send_key(event),
            EngineInputEvent::CaptureLost => self.send_capture_lost(),
        }
    }
}

/// Engine-to-shell callbacks. Implementors override the subset they handle.
pub trait EngineEventSink {
    fn on_paint(
        &mut self,
        _element: PaintElementType,
        _dirty: &DirtyRegion,
        _buffer: &[u8],
        _width: i32,
        _height: i32,
    ) {
    }

    fn on_popup_show(&mut self, _show: bool) {}

    fn on_popup_size(&mut self, _rect: Rect) {}

    /// Logical view rectangle.
    fn view_rect(&self) -> Rect {
        Rect::new(0, 0, 1, 1)
    }

    fn screen_info(&self) -> Option<ScreenInfo> {
        None
    }

    fn screen_point(&self, _view_x: i32, _view_y: i32) -> Option<Point> {
        None
    }

    fn on_browser_created(&mut self) {}
}

/// Schedules deferred window work on the UI thread.
pub trait WindowTaskPoster {
    /// Runs `OsrWindow::on_tick(tick)` for `view` after `after`.
    fn post_tick(&self, view: ViewId, tick: ScheduledTick, after: Duration);
    /// Runs `OsrWindow::show` for `view` on a later loop turn.
    fn post_show(&self, view: ViewId);
}
