//! Native pointer and key input, mapped into engine input records.
//!
//! Input arrives in device pixels relative to the window client area. The mapper
//! tracks click counts, the shift-drag rotation gesture and popup offsets, then
//! emits [`InputAction`]s for the window glue to carry out.

pub mod click;
pub mod keyboard;
pub mod mapper;

pub use click::{ClickTracker, DoubleClickThresholds};
pub use keyboard::{
    ALTGR_SHIFT_STATE, KeyStateSnapshot, KeyboardState, RawKeyInput, RawKeyKind,
    keyboard_modifiers, map_key_event, mouse_modifiers, vk,
};
pub use mapper::{InputAction, InputActions, InputMapper, MapContext};

use bitflags::bitflags;
use render_protocol::MouseButton;

pub type EventTimestampMillis = u64;

/// Signature stamped into the extra-info word of mouse messages synthesized
/// from touch input. Only native message sources carry that word; the winit
/// binary has no such source and always reports zero, so there the filter
/// never drops anything.
pub const TOUCH_SYNTHESIZED_SIGNATURE: u32 = 0xFF51_5700;

bitflags! {
    /// Button and modifier state carried by a pointer message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtonState: u32 {
        const LEFT_BUTTON = 0x0001;
        const RIGHT_BUTTON = 0x0002;
        const SHIFT = 0x0004;
        const CONTROL = 0x0008;
        const MIDDLE_BUTTON = 0x0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventPhase {
    Down(MouseButton),
    Up(MouseButton),
    Move,
    /// Cursor left the client area. `x`/`y` hold the last known cursor position.
    Leave,
    Wheel {
        delta: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPointerInput {
    pub phase: PointerEventPhase,
    pub x: i32,
    pub y: i32,
    pub timestamp_millis: EventTimestampMillis,
    pub buttons: MouseButtonState,
    /// Extra-info word of the native mouse message, or zero when the source
    /// does not expose one.
    pub extra_info: u32,
}

impl RawPointerInput {
    pub fn new(phase: PointerEventPhase, x: i32, y: i32, timestamp_millis: u64) -> Self {
        Self {
            phase,
            x,
            y,
            timestamp_millis,
            buttons: MouseButtonState::empty(),
            extra_info: 0,
        }
    }

    pub fn with_buttons(mut self, buttons: MouseButtonState) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_extra_info(mut self, extra_info: u32) -> Self {
        self.extra_info = extra_info;
        self
    }

    pub fn is_touch_synthesized(&self) -> bool {
        self.extra_info & TOUCH_SYNTHESIZED_SIGNATURE == TOUCH_SYNTHESIZED_SIGNATURE
    }
}
