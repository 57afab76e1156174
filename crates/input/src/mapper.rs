use render_protocol::{EngineInputEvent, MouseButton, MouseEvent, Point};
use smallvec::SmallVec;
use view::{PopupOverlay, device_to_logical};

use crate::click::{ClickTracker, DoubleClickThresholds};
use crate::keyboard::{KeyboardState, RawKeyInput, map_key_event, mouse_modifiers, vk};
use crate::{MouseButtonState, PointerEventPhase, RawPointerInput};

/// Side effects requested by one native input message, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    Forward(EngineInputEvent),
    RequestFocus,
    IncrementSpin { delta_x: f32, delta_y: f32 },
    ResetSpin,
    Invalidate,
}

pub type InputActions = SmallVec<[InputAction; 2]>;

/// Window state the mapper reads while translating one message.
#[derive(Clone, Copy)]
pub struct MapContext<'a> {
    pub popup: &'a PopupOverlay,
    pub device_scale_factor: f32,
    pub keys: &'a dyn KeyboardState,
}

#[derive(Debug, Clone)]
pub struct InputMapper {
    clicks: ClickTracker,
    rotating: bool,
    last_rotation_point: Point,
    last_mouse_down_on_view: bool,
}

impl InputMapper {
    pub fn new(thresholds: DoubleClickThresholds) -> Self {
        Self {
            clicks: ClickTracker::new(thresholds),
            rotating: false,
            last_rotation_point: Point::default(),
            last_mouse_down_on_view: false,
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.rotating
    }

    pub fn click_count(&self) -> u32 {
        self.clicks.click_count()
    }

    pub fn map_pointer(
        &mut self,
        input: &RawPointerInput,
        context: &MapContext<'_>,
    ) -> InputActions {
        let mut actions = InputActions::new();
        if input.is_touch_synthesized() {
            log::trace!(target: "input", "dropping touch-synthesized pointer event {input:?}");
            return actions;
        }

        if matches!(input.phase, PointerEventPhase::Move | PointerEventPhase::Leave) {
            self.clicks
                .on_pointer_motion(input.x, input.y, input.timestamp_millis);
        }

        match input.phase {
            PointerEventPhase::Down(button) => {
                actions.push(InputAction::RequestFocus);
                self.on_button_down(input, button, context, &mut actions);
            }
            PointerEventPhase::Up(button) => {
                self.on_button_up(input, button, context, &mut actions)
            }
            PointerEventPhase::Move => self.on_move(input, context, &mut actions),
            PointerEventPhase::Leave => {
                let event = to_engine_mouse_event(input.x, input.y, input.buttons, context);
                actions.push(InputAction::Forward(EngineInputEvent::MouseMove {
                    event,
                    mouse_leave: true,
                }));
            }
            PointerEventPhase::Wheel { delta } => {
                let (x, y) = context.popup.apply_offset(input.x, input.y);
                let event = to_engine_mouse_event(x, y, input.buttons, context);
                let (delta_x, delta_y) = if context.keys.is_key_down(vk::SHIFT) {
                    (delta, 0)
                } else {
                    (0, delta)
                };
                actions.push(InputAction::Forward(EngineInputEvent::MouseWheel {
                    event,
                    delta_x,
                    delta_y,
                }));
            }
        }
        actions
    }

    pub fn map_key(&self, input: &RawKeyInput, keys: &dyn KeyboardState) -> InputActions {
        let mut actions = InputActions::new();
        actions.push(InputAction::Forward(EngineInputEvent::Key(map_key_event(
            input, keys,
        ))));
        actions
    }

    /// Capture loss mid-rotation belongs to the gesture, not the page.
    pub fn map_capture_lost(&self) -> InputActions {
        let mut actions = InputActions::new();
        if !self.rotating {
            actions.push(InputAction::Forward(EngineInputEvent::CaptureLost));
        }
        actions
    }

    fn on_button_down(
        &mut self,
        input: &RawPointerInput,
        button: MouseButton,
        context: &MapContext<'_>,
        actions: &mut InputActions,
    ) {
        if input.buttons.contains(MouseButtonState::SHIFT) {
            self.rotating = true;
            self.last_rotation_point = Point::new(input.x, input.y);
            log::debug!(target: "input", "rotation gesture started at ({}, {})", input.x, input.y);
            return;
        }

        let click_count =
            self.clicks
                .on_button_down(button, input.x, input.y, input.timestamp_millis);
        self.last_mouse_down_on_view = !context.popup.is_over_popup(input.x, input.y);
        let (x, y) = context.popup.apply_offset(input.x, input.y);
        actions.push(InputAction::Forward(EngineInputEvent::MouseClick {
            event: to_engine_mouse_event(x, y, input.buttons, context),
            button,
            mouse_up: false,
            click_count,
        }));
    }

    fn on_button_up(
        &mut self,
        input: &RawPointerInput,
        button: MouseButton,
        context: &MapContext<'_>,
        actions: &mut InputActions,
    ) {
        if self.rotating {
            self.rotating = false;
            actions.push(InputAction::ResetSpin);
            actions.push(InputAction::Invalidate);
            return;
        }

        let offset = context.popup.offset();
        if self.last_mouse_down_on_view
            && context.popup.is_over_popup(input.x, input.y)
            && offset.x != 0
            && offset.y != 0
        {
            log::trace!(target: "input", "swallowing release over shifted popup");
            return;
        }

        let (x, y) = context.popup.apply_offset(input.x, input.y);
        actions.push(InputAction::Forward(EngineInputEvent::MouseClick {
            event: to_engine_mouse_event(x, y, input.buttons, context),
            button,
            mouse_up: true,
            click_count: self.clicks.click_count(),
        }));
    }

    fn on_move(
        &mut self,
        input: &RawPointerInput,
        context: &MapContext<'_>,
        actions: &mut InputActions,
    ) {
        if self.rotating {
            let delta_x = (input.x - self.last_rotation_point.x) as f32;
            let delta_y = (input.y - self.last_rotation_point.y) as f32;
            self.last_rotation_point = Point::new(input.x, input.y);
            actions.push(InputAction::IncrementSpin { delta_x, delta_y });
            actions.push(InputAction::Invalidate);
            return;
        }

        let (x, y) = context.popup.apply_offset(input.x, input.y);
        actions.push(InputAction::Forward(EngineInputEvent::MouseMove {
            event: to_engine_mouse_event(x, y, input.buttons, context),
            mouse_leave: false,
        }));
    }
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new(DoubleClickThresholds::default())
    }
}

fn to_engine_mouse_event(
    x: i32,
    y: i32,
    buttons: MouseButtonState,
    context: &MapContext<'_>,
) -> MouseEvent {
    MouseEvent {
        x: device_to_logical(x, context.device_scale_factor),
        y: device_to_logical(y, context.device_scale_factor),
        modifiers: mouse_modifiers(buttons, context.keys),
    }
}
