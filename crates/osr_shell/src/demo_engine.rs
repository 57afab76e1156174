//! Stand-in browser engine for the binary.
//!
//! Paints a BGRA test page: a colour field, a bar sweeping down the page and a
//! marker under the pointer. Animation frames report only the rows that
//! changed. A right-click opens a popup at the pointer; a second one closes it.
//! Engine-to-shell callbacks are queued as [`EngineEvent`]s for the shell to
//! deliver.

use render_protocol::{
    DirtyRegion, KeyEvent, MouseButton, MouseEvent, PaintElementType, Rect, ScreenInfo, Size,
};
use renderer::FrameCompositor;
use view::logical_to_device;

use crate::host::{BrowserHost, EngineEventSink, PaintFrame};
use crate::osr_window::OsrWindow;

const BAR_HEIGHT: i32 = 12;
const BAR_STEP: i32 = 4;
const MARKER_SIZE: i32 = 8;
const POPUP_LOGICAL_SIZE: Size = Size::new(160, 96);

const BAR_BGRA: [u8; 4] = [0x20, 0x20, 0x20, 0xFF];
const MARKER_BGRA: [u8; 4] = [0x00, 0xC0, 0xFF, 0xFF];
const POPUP_BORDER_BGRA: [u8; 4] = [0x40, 0x40, 0x40, 0xFF];
const POPUP_FILL_BGRA: [u8; 4] = [0xF0, 0xF0, 0xF0, 0xFF];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Paint(PaintFrame),
    PopupShow(bool),
    PopupSize(Rect),
}

impl EngineEvent {
    pub fn deliver_to(&self, sink: &mut dyn EngineEventSink) {
        match self {
            EngineEvent::Paint(frame) => frame.deliver_to(sink),
            EngineEvent::PopupShow(show) => sink.on_popup_show(*show),
            EngineEvent::PopupSize(rect) => sink.on_popup_size(*rect),
        }
    }
}

#[derive(Debug)]
pub struct DemoEngine {
    base_bgra: [u8; 4],
    device_scale_factor: f32,
    view_size: Size,
    pixels: Vec<u8>,
    bar_y: i32,
    marker: Option<Rect>,
    popup_logical: Option<Rect>,
    hidden: bool,
    focused: bool,
    needs_screen_info: bool,
    events: Vec<EngineEvent>,
}

impl DemoEngine {
    /// The page colour is derived from `title`, so different URLs look different.
    pub fn new(title: &str) -> Self {
        log::info!(target: "osr_shell", "demo engine showing {title}");
        Self {
            base_bgra: title_colour(title),
            device_scale_factor: 1.0,
            view_size: Size::default(),
            pixels: Vec::new(),
            bar_y: 0,
            marker: None,
            popup_logical: None,
            hidden: false,
            focused: false,
            needs_screen_info: true,
            events: Vec::new(),
        }
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn popup_rect(&self) -> Option<Rect> {
        self.popup_logical
    }

    /// Set after `was_resized` or `notify_screen_info_changed` until the shell
    /// answers with `update_screen_info`.
    pub fn needs_screen_info(&self) -> bool {
        self.needs_screen_info
    }

    pub fn update_screen_info(&mut self, info: ScreenInfo) {
        self.needs_screen_info = false;
        self.device_scale_factor = info.device_scale_factor;
        let size = Size::new(
            logical_to_device(info.rect.width, info.device_scale_factor),
            logical_to_device(info.rect.height, info.device_scale_factor),
        );
        if size == self.view_size {
            return;
        }
        log::debug!(target: "osr_shell", "demo engine view resized to {size:?}");
        self.view_size = size;
        self.bar_y = self.bar_y.min((size.height - BAR_HEIGHT).max(0));
        self.marker = self
            .marker
            .map(|marker| clip_to(marker, size))
            .filter(|marker| !marker.is_empty());
        self.repaint_page();
        if !self.hidden {
            let frame = self.full_view_frame();
            self.events.push(EngineEvent::Paint(frame));
        }
    }

    /// Advances the bar one step and queues a paint of the rows it touched.
    pub fn animate(&mut self) {
        if self.hidden || self.view_size.is_empty() {
            return;
        }
        let previous = self.bar_rect();
        let travel = (self.view_size.height - BAR_HEIGHT).max(1);
        self.bar_y = (self.bar_y + BAR_STEP) % travel;
        let current = self.bar_rect();
        self.repaint_page();

        let dirty: DirtyRegion = [previous, current]
            .into_iter()
            .filter(|rect| !rect.is_empty())
            .collect();
        let frame = self.view_frame(dirty);
        self.events.push(EngineEvent::Paint(frame));
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn bar_rect(&self) -> Rect {
        clip_to(
            Rect::new(0, self.bar_y, self.view_size.width, BAR_HEIGHT),
            self.view_size,
        )
    }

    fn repaint_page(&mut self) {
        let Size { width, height } = self.view_size;
        self.pixels = Vec::with_capacity((width.max(0) * height.max(0)) as usize * 4);
        for y in 0..height {
            let shade = (y * 255 / height.max(1)) as u8;
            for _ in 0..width {
                self.pixels.extend_from_slice(&[
                    self.base_bgra[0],
                    self.base_bgra[1].saturating_sub(shade / 2),
                    self.base_bgra[2],
                    self.base_bgra[3],
                ]);
            }
        }
        let bar = self.bar_rect();
        fill_rect(&mut self.pixels, self.view_size, bar, BAR_BGRA);
        if let Some(marker) = self.marker {
            fill_rect(&mut self.pixels, self.view_size, marker, MARKER_BGRA);
        }
    }

    fn view_frame(&self, dirty: DirtyRegion) -> PaintFrame {
        PaintFrame {
            element: PaintElementType::View,
            dirty,
            pixels: self.pixels.clone(),
            width: self.view_size.width,
            height: self.view_size.height,
        }
    }

    fn full_view_frame(&self) -> PaintFrame {
        self.view_frame(DirtyRegion::single(Rect::from_size(self.view_size)))
    }

    fn popup_frame(&self, logical: Rect) -> PaintFrame {
        let size = Size::new(
            logical_to_device(logical.width, self.device_scale_factor),
            logical_to_device(logical.height, self.device_scale_factor),
        );
        let mut pixels = POPUP_BORDER_BGRA.repeat((size.width * size.height).max(0) as usize);
        let inner = Rect::new(1, 1, size.width - 2, size.height - 2);
        fill_rect(&mut pixels, size, inner, POPUP_FILL_BGRA);
        PaintFrame {
            element: PaintElementType::Popup,
            dirty: DirtyRegion::single(Rect::from_size(size)),
            pixels,
            width: size.width,
            height: size.height,
        }
    }

    fn move_marker(&mut self, event: &MouseEvent) {
        if self.view_size.is_empty() {
            return;
        }
        let x = logical_to_device(event.x, self.device_scale_factor);
        let y = logical_to_device(event.y, self.device_scale_factor);
        let next = clip_to(
            Rect::new(x - MARKER_SIZE / 2, y - MARKER_SIZE / 2, MARKER_SIZE, MARKER_SIZE),
            self.view_size,
        );
        let previous = self
            .marker
            .replace(next)
            .map(|rect| clip_to(rect, self.view_size));
        self.repaint_page();
        let dirty: DirtyRegion = previous
            .into_iter()
            .chain(Some(next))
            .filter(|rect| !rect.is_empty())
            .collect();
        if !dirty.is_empty() && !self.hidden {
            let frame = self.view_frame(dirty);
            self.events.push(EngineEvent::Paint(frame));
        }
    }

    fn toggle_popup(&mut self, event: &MouseEvent) {
        match self.popup_logical.take() {
            Some(_) => {
                log::debug!(target: "osr_shell", "demo popup closed");
                self.events.push(EngineEvent::PopupShow(false));
            }
            None => {
                let rect = Rect::new(
                    event.x,
                    event.y,
                    POPUP_LOGICAL_SIZE.width,
                    POPUP_LOGICAL_SIZE.height,
                );
                log::debug!(target: "osr_shell", "demo popup opened at {rect:?}");
                self.popup_logical = Some(rect);
                self.events.push(EngineEvent::PopupShow(true));
                self.events.push(EngineEvent::PopupSize(rect));
                let frame = self.full_view_frame();
                self.events.push(EngineEvent::Paint(frame));
            }
        }
    }
}

impl BrowserHost for DemoEngine {
    fn send_external_begin_frame(&mut self) {
        self.animate();
    }

    fn notify_screen_info_changed(&mut self) {
        self.needs_screen_info = true;
    }

    fn was_resized(&mut self) {
        self.needs_screen_info = true;
    }

    fn was_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    fn set_focus(&mut self, focus: bool) {
        self.focused = focus;
    }

    fn invalidate(&mut self, element: PaintElementType) -> Option<PaintFrame> {
        if self.view_size.is_empty() {
            return None;
        }
        match element {
            PaintElementType::View => Some(self.full_view_frame()),
            PaintElementType::Popup => self.popup_logical.map(|rect| self.popup_frame(rect)),
        }
    }

    fn send_mouse_click(
        &mut self,
        event: &MouseEvent,
        button: MouseButton,
        mouse_up: bool,
        click_count: u32,
    ) {
        log::trace!(
            target: "osr_shell",
            "demo click {button:?} up={mouse_up} count={click_count} at ({}, {})",
            event.x,
            event.y
        );
        if button == MouseButton::Right && !mouse_up {
            self.toggle_popup(event);
        }
    }

    fn send_mouse_move(&mut self, event: &MouseEvent, mouse_leave: bool) {
        if mouse_leave {
            return;
        }
        self.move_marker(event);
    }

    fn send_mouse_wheel(&mut self, event: &MouseEvent, delta_x: i32, delta_y: i32) {
        log::trace!(
            target: "osr_shell",
            "demo wheel ({delta_x}, {delta_y}) at ({}, {})",
            event.x,
            event.y
        );
    }

    fn send_key(&mut self, event: &KeyEvent) {
        log::trace!(target: "osr_shell", "demo key {event:?}");
    }

    fn send_capture_lost(&mut self) {
        log::trace!(target: "osr_shell", "demo capture lost");
    }
}

/// Answers a pending screen-info query and delivers the engine's queued events
/// to `window`. Returns the number of events delivered.
pub fn pump_engine<C: FrameCompositor>(window: &mut OsrWindow<DemoEngine, C>) -> usize {
    let screen_info = window.screen_info();
    let Some(engine) = window.host_mut() else {
        return 0;
    };
    if engine.needs_screen_info() {
        if let Some(info) = screen_info {
            engine.update_screen_info(info);
        }
    }
    let events = engine.take_events();
    for event in &events {
        event.deliver_to(window);
    }
    events.len()
}

fn title_colour(title: &str) -> [u8; 4] {
    let hash = title
        .bytes()
        .fold(0x811C_9DC5_u32, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        });
    [
        0x80 | (hash as u8),
        0x80 | ((hash >> 8) as u8),
        0x80 | ((hash >> 16) as u8),
        0xFF,
    ]
}

fn clip_to(rect: Rect, size: Size) -> Rect {
    let left = rect.x.max(0);
    let top = rect.y.max(0);
    let right = rect.right().min(size.width);
    let bottom = rect.bottom().min(size.height);
    if right <= left || bottom <= top {
        return Rect::default();
    }
    Rect::new(left, top, right - left, bottom - top)
}

fn fill_rect(pixels: &mut [u8], size: Size, rect: Rect, bgra: [u8; 4]) {
    let rect = clip_to(rect, size);
    for y in rect.y..rect.bottom() {
        let row_start = (y * size.width + rect.x) as usize * 4;
        let row_end = row_start + rect.width as usize * 4;
        for texel in pixels[row_start..row_end].chunks_exact_mut(4) {
            texel.copy_from_slice(&bgra);
        }
    }
}

#[cfg(test)]
mod tests {
    use frame_scheduler::ManualClock;
    use input::{PointerEventPhase, RawPointerInput};

    use super::*;
    use crate::config::ShellConfig;
    use crate::registry::ViewIdAllocator;
    use crate::test_support::{FakeCompositor, RecordingPoster};

    fn screen(width: i32, height: i32, device_scale_factor: f32) -> ScreenInfo {
        let rect = Rect::new(0, 0, width, height);
        ScreenInfo {
            device_scale_factor,
            rect,
            available_rect: rect,
        }
    }

    fn paints(events: &[EngineEvent]) -> Vec<&PaintFrame> {
        events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Paint(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn screen_info_sizes_the_page_in_device_pixels() {
        let mut engine = DemoEngine::new("osr://demo");
        assert!(engine.needs_screen_info());
        assert!(engine.invalidate(PaintElementType::View).is_none());

        engine.update_screen_info(screen(100, 50, 2.0));
        assert_eq!(engine.view_size(), Size::new(200, 100));
        let events = engine.take_events();
        let frames = paints(&events);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].dirty.is_single_full_rect(Size::new(200, 100)));
        assert_eq!(frames[0].pixels.len(), 200 * 100 * 4);

        engine.was_resized();
        assert!(engine.needs_screen_info());
    }

    #[test]
    fn animation_reports_only_the_rows_that_changed() {
        let mut engine = DemoEngine::new("osr://demo");
        engine.update_screen_info(screen(64, 48, 1.0));
        engine.take_events();

        engine.animate();
        let events = engine.take_events();
        let frames = paints(&events);
        assert_eq!(frames.len(), 1);
        let full = Rect::new(0, 0, 64, 48);
        assert_eq!(
            frames[0].dirty.rects(),
            &[
                Rect::new(0, 0, 64, BAR_HEIGHT),
                Rect::new(0, BAR_STEP, 64, BAR_HEIGHT),
            ]
        );
        assert!(frames[0].dirty.rects().iter().all(|rect| full.contains_rect(rect)));
    }

    #[test]
    fn hidden_engine_does_not_animate() {
        let mut engine = DemoEngine::new("osr://demo");
        engine.update_screen_info(screen(64, 48, 1.0));
        engine.take_events();
        engine.was_hidden(true);
        engine.animate();
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn right_click_toggles_the_popup() {
        let mut engine = DemoEngine::new("osr://demo");
        engine.update_screen_info(screen(400, 300, 1.5));
        engine.take_events();
        let click = MouseEvent {
            x: 20,
            y: 30,
            modifiers: Default::default(),
        };

        engine.send_mouse_click(&click, MouseButton::Right, false, 1);
        let events = engine.take_events();
        let popup_rect = Rect::new(20, 30, POPUP_LOGICAL_SIZE.width, POPUP_LOGICAL_SIZE.height);
        assert_eq!(events[0], EngineEvent::PopupShow(true));
        assert_eq!(events[1], EngineEvent::PopupSize(popup_rect));
        let popup = engine
            .invalidate(PaintElementType::Popup)
            .expect("popup frame while open");
        assert_eq!((popup.width, popup.height), (240, 144));
        assert_eq!(popup.pixels[..4], POPUP_BORDER_BGRA);

        engine.send_mouse_click(&click, MouseButton::Right, true, 1);
        assert!(engine.take_events().is_empty());
        engine.send_mouse_click(&click, MouseButton::Right, false, 1);
        assert_eq!(engine.take_events(), vec![EngineEvent::PopupShow(false)]);
        assert!(engine.invalidate(PaintElementType::Popup).is_none());
    }

    #[test]
    fn pointer_marker_dirties_old_and_new_positions() {
        let mut engine = DemoEngine::new("osr://demo");
        engine.update_screen_info(screen(100, 100, 1.0));
        engine.take_events();
        let at = |x, y| MouseEvent {
            x,
            y,
            modifiers: Default::default(),
        };

        engine.send_mouse_move(&at(50, 50), false);
        engine.send_mouse_move(&at(2, 2), false);
        let events = engine.take_events();
        let frames = paints(&events);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1].dirty.rects(),
            &[Rect::new(46, 46, 8, 8), Rect::new(0, 0, 6, 6)]
        );
        let offset = (3 * 100 + 3) * 4;
        assert_eq!(frames[1].pixels[offset..offset + 4], MARKER_BGRA);
    }

    #[test]
    fn pumping_paints_the_page_and_composites_the_popup() {
        let mut window: OsrWindow<DemoEngine, FakeCompositor> = OsrWindow::new(
            ViewIdAllocator::new().allocate(),
            &ShellConfig::default(),
            FakeCompositor::new(),
            Box::new(ManualClock::starting_at(0)),
            Box::new(RecordingPoster::default()),
        );
        window.attach_host(DemoEngine::new("osr://demo"));
        window.on_size(400, 300);

        assert_eq!(pump_engine(&mut window), 1);
        assert_eq!(window.compositor().view_size(), Size::new(400, 300));
        assert_eq!(window.compositor().render_count, 1);
        assert!(!window.host().expect("engine").needs_screen_info());

        window.on_pointer_event(&RawPointerInput::new(
            PointerEventPhase::Down(MouseButton::Right),
            10,
            10,
            0,
        ));
        assert_eq!(pump_engine(&mut window), 3);
        assert!(window.popup().is_visible());
        assert_eq!(window.popup().effective_rect(), Rect::new(10, 10, 160, 96));
        let texture = &window.compositor().texture;
        assert_eq!(texture.pixel(10, 10), POPUP_BORDER_BGRA);
        assert_eq!(texture.pixel(11, 11), POPUP_FILL_BGRA);
        assert_eq!(window.compositor().render_count, 2);
        assert_eq!(pump_engine(&mut window), 0);
    }

    #[test]
    fn marker_near_the_edge_survives_a_shrink() {
        let mut window: OsrWindow<DemoEngine, FakeCompositor> = OsrWindow::new(
            ViewIdAllocator::new().allocate(),
            &ShellConfig::default(),
            FakeCompositor::new(),
            Box::new(ManualClock::starting_at(0)),
            Box::new(RecordingPoster::default()),
        );
        window.attach_host(DemoEngine::new("osr://demo"));
        window.on_size(400, 300);
        pump_engine(&mut window);
        let move_to = |x, y| RawPointerInput::new(PointerEventPhase::Move, x, y, 0);

        window.on_pointer_event(&move_to(390, 290));
        pump_engine(&mut window);
        window.on_size(200, 150);
        pump_engine(&mut window);
        assert_eq!(window.compositor().view_size(), Size::new(200, 150));

        window.on_pointer_event(&move_to(10, 10));
        assert_eq!(pump_engine(&mut window), 1);
        let texture = &window.compositor().texture;
        assert_eq!(texture.pixel(10, 10), MARKER_BGRA);
        assert_ne!(texture.pixel(199, 149), MARKER_BGRA);
    }

    #[test]
    fn shrinking_drops_a_marker_left_outside_the_view() {
        let mut engine = DemoEngine::new("osr://demo");
        engine.update_screen_info(screen(100, 100, 1.0));
        let at = |x, y| MouseEvent {
            x,
            y,
            modifiers: Default::default(),
        };
        engine.send_mouse_move(&at(90, 90), false);
        engine.update_screen_info(screen(50, 50, 1.0));
        engine.take_events();

        engine.send_mouse_move(&at(10, 10), false);
        let events = engine.take_events();
        let frames = paints(&events);
        assert_eq!(frames[0].dirty.rects(), &[Rect::new(6, 6, 8, 8)]);
    }
}
