//! GPU-free fakes for window and shell tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use frame_scheduler::ScheduledTick;
use render_protocol::{
    DirtyRegion, EngineInputEvent, KeyEvent, MouseButton, MouseEvent, PaintElementType, Rect,
    Size,
};
use renderer::{CpuTexture, FrameCompositor, PixelUpdate, PresentError, TextureSync};
use view::{PopupOverlay, SpinTransform};

use crate::host::{BrowserHost, PaintFrame, WindowTaskPoster};
use crate::registry::ViewId;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCall {
    ExternalBeginFrame,
    NotifyScreenInfoChanged,
    WasResized,
    WasHidden(bool),
    SetFocus(bool),
    Invalidate(PaintElementType),
    Input(EngineInputEvent),
}

/// Records every call; `invalidate` answers with the configured frames.
#[derive(Default)]
pub(crate) struct FakeHost {
    pub(crate) calls: Vec<HostCall>,
    pub(crate) view_frame: Option<PaintFrame>,
    pub(crate) popup_frame: Option<PaintFrame>,
}

impl FakeHost {
    pub(crate) fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }
}

impl BrowserHost for FakeHost {
    fn send_external_begin_frame(&mut self) {
        self.calls.push(HostCall::ExternalBeginFrame);
    }

    fn notify_screen_info_changed(&mut self) {
        self.calls.push(HostCall::NotifyScreenInfoChanged);
    }

    fn was_resized(&mut self) {
        self.calls.push(HostCall::WasResized);
    }

    fn was_hidden(&mut self, hidden: bool) {
        self.calls.push(HostCall::WasHidden(hidden));
    }

    fn set_focus(&mut self, focus: bool) {
        self.calls.push(HostCall::SetFocus(focus));
    }

    fn invalidate(&mut self, element: PaintElementType) -> Option<PaintFrame> {
        self.calls.push(HostCall::Invalidate(element));
        match element {
            PaintElementType::View => self.view_frame.clone(),
            PaintElementType::Popup => self.popup_frame.clone(),
        }
    }

    fn send_mouse_click(
        &mut self,
        event: &MouseEvent,
        button: MouseButton,
        mouse_up: bool,
        click_count: u32,
    ) {
        self.calls.push(HostCall::Input(EngineInputEvent::MouseClick {
            event: *event,
            button,
            mouse_up,
            click_count,
        }));
    }

    fn send_mouse_move(&mut self, event: &MouseEvent, mouse_leave: bool) {
        self.calls.push(HostCall::Input(EngineInputEvent::MouseMove {
            event: *event,
            mouse_leave,
        }));
    }

    fn send_mouse_wheel(&mut self, event: &MouseEvent, delta_x: i32, delta_y: i32) {
        self.calls.push(HostCall::Input(EngineInputEvent::MouseWheel {
            event: *event,
            delta_x,
            delta_y,
        }));
    }

    fn send_key(&mut self, event: &KeyEvent) {
        self.calls.push(HostCall::Input(EngineInputEvent::Key(*event)));
    }

    fn send_capture_lost(&mut self) {
        self.calls.push(HostCall::Input(EngineInputEvent::CaptureLost));
    }
}

/// Compositor that mirrors uploads into a [`CpuTexture`] and counts renders.
pub(crate) struct FakeCompositor {
    pub(crate) sync: TextureSync,
    pub(crate) texture: CpuTexture,
    pub(crate) spin: SpinTransform,
    pub(crate) initialized: bool,
    pub(crate) render_count: usize,
    pub(crate) reconfigure_count: usize,
    pub(crate) surface_size: Option<(u32, u32)>,
    pub(crate) next_render_error: Option<wgpu::SurfaceError>,
}

impl FakeCompositor {
    pub(crate) fn new() -> Self {
        Self {
            sync: TextureSync::new(true),
            texture: CpuTexture::default(),
            spin: SpinTransform::default(),
            initialized: false,
            render_count: 0,
            reconfigure_count: 0,
            surface_size: None,
            next_render_error: None,
        }
    }
}

impl FrameCompositor for FakeCompositor {
    fn initialize(&mut self) {
        self.initialized = true;
    }

    fn on_pixel_update(&mut self, update: PixelUpdate<'_>, popup: &PopupOverlay) {
        let result = match update.element {
            PaintElementType::View => self.sync.apply_view(
                &mut self.texture,
                update.dirty,
                update.buffer,
                update.width,
                update.height,
            ),
            PaintElementType::Popup => self.sync.apply_popup(
                &mut self.texture,
                popup.effective_rect(),
                update.buffer,
                update.width,
                update.height,
            ),
        };
        result.expect("fake compositor upload");
    }

    fn render(&mut self) -> Result<(), PresentError> {
        if let Some(error) = self.next_render_error.take() {
            return Err(PresentError::Surface(error));
        }
        if !self.sync.view_size().is_empty() {
            self.render_count += 1;
        }
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_size = Some((width, height));
    }

    fn reconfigure_surface(&mut self) {
        self.reconfigure_count += 1;
    }

    fn set_spin(&mut self, spin_x: f32, spin_y: f32) {
        self.spin.set_spin(spin_x, spin_y).expect("finite spin");
    }

    fn increment_spin(&mut self, delta_x: f32, delta_y: f32) {
        self.spin
            .increment_spin(delta_x, delta_y)
            .expect("finite spin delta");
    }

    fn spin(&self) -> SpinTransform {
        self.spin
    }

    fn view_size(&self) -> Size {
        self.sync.view_size()
    }

    fn update_rect(&self) -> Option<Rect> {
        self.sync.update_rect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Posted {
    Tick(ViewId, ScheduledTick, Duration),
    Show(ViewId),
}

#[derive(Clone, Default)]
pub(crate) struct RecordingPoster {
    posted: Rc<RefCell<Vec<Posted>>>,
}

impl RecordingPoster {
    pub(crate) fn take(&self) -> Vec<Posted> {
        std::mem::take(&mut *self.posted.borrow_mut())
    }
}

impl WindowTaskPoster for RecordingPoster {
    fn post_tick(&self, view: ViewId, tick: ScheduledTick, after: Duration) {
        self.posted.borrow_mut().push(Posted::Tick(view, tick, after));
    }

    fn post_show(&self, view: ViewId) {
        self.posted.borrow_mut().push(Posted::Show(view));
    }
}

pub(crate) fn solid_frame(
    element: PaintElementType,
    width: i32,
    height: i32,
    texel: [u8; 4],
) -> PaintFrame {
    PaintFrame {
        element,
        dirty: DirtyRegion::single(Rect::new(0, 0, width, height)),
        pixels: texel.repeat((width * height) as usize),
        width,
        height,
    }
}
