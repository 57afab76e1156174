use std::collections::HashMap;

use render_protocol::{EventFlags, KeyEvent, KeyEventType};

use crate::MouseButtonState;

/// Virtual-key codes as reported in `KeyEvent::windows_key_code`.
pub mod vk {
    pub const CLEAR: u16 = 0x0C;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const CAPITAL: u16 = 0x14;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const LWIN: u16 = 0x5B;
    pub const RWIN: u16 = 0x5C;
    pub const NUMPAD0: u16 = 0x60;
    pub const NUMPAD9: u16 = 0x69;
    pub const MULTIPLY: u16 = 0x6A;
    pub const ADD: u16 = 0x6B;
    pub const SUBTRACT: u16 = 0x6D;
    pub const DECIMAL: u16 = 0x6E;
    pub const DIVIDE: u16 = 0x6F;
    pub const NUMLOCK: u16 = 0x90;
    pub const LSHIFT: u16 = 0xA0;
    pub const RSHIFT: u16 = 0xA1;
    pub const LCONTROL: u16 = 0xA2;
    pub const RCONTROL: u16 = 0xA3;
    pub const LMENU: u16 = 0xA4;
    pub const RMENU: u16 = 0xA5;
}

/// Layout shift state meaning "ctrl and alt": the character needs AltGr.
pub const ALTGR_SHIFT_STATE: u8 = 2 | 4;

/// Extended-key bit inside the native key code (bit 8 of the high word).
const EXTENDED_KEY_BIT: i32 = 1 << 24;

const VIRTUAL_KEY_COUNT: usize = 256;

/// Live keyboard state queried while mapping an event.
pub trait KeyboardState {
    fn is_key_down(&self, key: u16) -> bool;
    fn is_key_toggled(&self, key: u16) -> bool;
    /// Shift state the active layout needs to type `character`, if it can.
    fn layout_shift_state(&self, character: char) -> Option<u8>;
}

/// Keyboard state kept by the window from its own key stream.
#[derive(Debug, Clone)]
pub struct KeyStateSnapshot {
    down: [bool; VIRTUAL_KEY_COUNT],
    toggled: [bool; VIRTUAL_KEY_COUNT],
    layout: HashMap<char, u8>,
}

impl KeyStateSnapshot {
    pub fn new() -> Self {
        Self {
            down: [false; VIRTUAL_KEY_COUNT],
            toggled: [false; VIRTUAL_KEY_COUNT],
            layout: HashMap::new(),
        }
    }

    pub fn set_key_down(&mut self, key: u16, down: bool) {
        if let Some(slot) = self.down.get_mut(usize::from(key)) {
            *slot = down;
        }
    }

    pub fn set_key_toggled(&mut self, key: u16, toggled: bool) {
        if let Some(slot) = self.toggled.get_mut(usize::from(key)) {
            *slot = toggled;
        }
    }

    pub fn set_layout_shift_state(&mut self, character: char, shift_state: u8) {
        self.layout.insert(character, shift_state);
    }

    pub fn release_all(&mut self) {
        self.down = [false; VIRTUAL_KEY_COUNT];
    }
}

impl Default for KeyStateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState for KeyStateSnapshot {
    fn is_key_down(&self, key: u16) -> bool {
        self.down.get(usize::from(key)).copied().unwrap_or(false)
    }

    fn is_key_toggled(&self, key: u16) -> bool {
        self.toggled.get(usize::from(key)).copied().unwrap_or(false)
    }

    fn layout_shift_state(&self, character: char) -> Option<u8> {
        self.layout.get(&character).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKeyKind {
    KeyDown,
    KeyUp,
    SysKeyDown,
    SysKeyUp,
    Char,
    SysChar,
}

impl RawKeyKind {
    pub fn is_system(self) -> bool {
        matches!(self, Self::SysKeyDown | Self::SysKeyUp | Self::SysChar)
    }

    pub fn event_type(self) -> KeyEventType {
        match self {
            Self::KeyDown | Self::SysKeyDown => KeyEventType::RawKeyDown,
            Self::KeyUp | Self::SysKeyUp => KeyEventType::KeyUp,
            Self::Char | Self::SysChar => KeyEventType::Char,
        }
    }
}

/// One native key message. `key_code` is the virtual key, or the UTF-16 code
/// unit for character messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyInput {
    pub kind: RawKeyKind,
    pub key_code: u16,
    pub native_key_code: i32,
}

impl RawKeyInput {
    pub fn is_extended(&self) -> bool {
        self.native_key_code & EXTENDED_KEY_BIT != 0
    }
}

pub fn mouse_modifiers(buttons: MouseButtonState, keys: &dyn KeyboardState) -> EventFlags {
    let mut modifiers = EventFlags::empty();
    if buttons.contains(MouseButtonState::CONTROL) {
        modifiers |= EventFlags::CONTROL_DOWN;
    }
    if buttons.contains(MouseButtonState::SHIFT) {
        modifiers |= EventFlags::SHIFT_DOWN;
    }
    if keys.is_key_down(vk::MENU) {
        modifiers |= EventFlags::ALT_DOWN;
    }
    if buttons.contains(MouseButtonState::LEFT_BUTTON) {
        modifiers |= EventFlags::LEFT_MOUSE_BUTTON;
    }
    if buttons.contains(MouseButtonState::MIDDLE_BUTTON) {
        modifiers |= EventFlags::MIDDLE_MOUSE_BUTTON;
    }
    if buttons.contains(MouseButtonState::RIGHT_BUTTON) {
        modifiers |= EventFlags::RIGHT_MOUSE_BUTTON;
    }
    modifiers | lock_modifiers(keys)
}

pub fn keyboard_modifiers(input: &RawKeyInput, keys: &dyn KeyboardState) -> EventFlags {
    let mut modifiers = EventFlags::empty();
    if keys.is_key_down(vk::SHIFT) {
        modifiers |= EventFlags::SHIFT_DOWN;
    }
    if keys.is_key_down(vk::CONTROL) {
        modifiers |= EventFlags::CONTROL_DOWN;
    }
    if keys.is_key_down(vk::MENU) {
        modifiers |= EventFlags::ALT_DOWN;
    }
    modifiers |= lock_modifiers(keys);

    match input.key_code {
        vk::RETURN => {
            if input.is_extended() {
                modifiers |= EventFlags::IS_KEY_PAD;
            }
        }
        vk::INSERT | vk::DELETE | vk::HOME | vk::END | vk::PRIOR | vk::NEXT | vk::UP
        | vk::DOWN | vk::LEFT | vk::RIGHT => {
            // Navigation keys without the extended bit come from the numpad.
            if !input.is_extended() {
                modifiers |= EventFlags::IS_KEY_PAD;
            }
        }
        vk::NUMLOCK
        | vk::NUMPAD0..=vk::NUMPAD9
        | vk::DIVIDE
        | vk::MULTIPLY
        | vk::SUBTRACT
        | vk::ADD
        | vk::DECIMAL
        | vk::CLEAR => {
            modifiers |= EventFlags::IS_KEY_PAD;
        }
        vk::SHIFT => modifiers |= sidedness(keys, vk::LSHIFT, vk::RSHIFT),
        vk::CONTROL => modifiers |= sidedness(keys, vk::LCONTROL, vk::RCONTROL),
        vk::MENU => modifiers |= sidedness(keys, vk::LMENU, vk::RMENU),
        vk::LWIN => modifiers |= EventFlags::IS_LEFT,
        vk::RWIN => modifiers |= EventFlags::IS_RIGHT,
        _ => {}
    }
    modifiers
}

/// Builds the engine key record, folding ctrl+alt into AltGr for characters
/// the layout types with right-alt.
pub fn map_key_event(input: &RawKeyInput, keys: &dyn KeyboardState) -> KeyEvent {
    let kind = input.kind.event_type();
    let character = match kind {
        KeyEventType::Char => char::from_u32(u32::from(input.key_code)),
        _ => None,
    };
    let mut modifiers = keyboard_modifiers(input, keys);

    let uses_altgr = keys.is_key_down(vk::RMENU)
        && character
            .and_then(|character| keys.layout_shift_state(character))
            .is_some_and(|shift_state| shift_state == ALTGR_SHIFT_STATE);
    if kind == KeyEventType::Char && uses_altgr {
        modifiers.remove(EventFlags::CONTROL_DOWN | EventFlags::ALT_DOWN);
        modifiers.insert(EventFlags::ALTGR_DOWN);
    }

    KeyEvent {
        kind,
        modifiers,
        windows_key_code: i32::from(input.key_code),
        native_key_code: input.native_key_code,
        is_system_key: input.kind.is_system(),
        character,
    }
}

fn lock_modifiers(keys: &dyn KeyboardState) -> EventFlags {
    let mut modifiers = EventFlags::empty();
    if keys.is_key_toggled(vk::NUMLOCK) {
        modifiers |= EventFlags::NUM_LOCK_ON;
    }
    if keys.is_key_toggled(vk::CAPITAL) {
        modifiers |= EventFlags::CAPS_LOCK_ON;
    }
    modifiers
}

fn sidedness(keys: &dyn KeyboardState, left: u16, right: u16) -> EventFlags {
    if keys.is_key_down(left) {
        EventFlags::IS_LEFT
    } else if keys.is_key_down(right) {
        EventFlags::IS_RIGHT
    } else {
        EventFlags::empty()
    }
}
