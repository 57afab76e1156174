//! Translation of winit key events into the window's raw key stream.
//!
//! [`NativeKeyboard`] tracks the lock keys and modifier state the window does
//! not see on its own, mirrors every physical key into the window's
//! [`KeyStateSnapshot`](input::KeyStateSnapshot) and learns which shift state
//! the active layout used for each character it produced. That last table is
//! what lets ctrl+alt characters typed with AltGr be reported as AltGr.

use input::{ALTGR_SHIFT_STATE, KeyboardState, RawKeyInput, RawKeyKind, vk};
use renderer::FrameCompositor;
use winit::keyboard::{KeyCode, ModifiersState};

use crate::host::BrowserHost;
use crate::osr_window::OsrWindow;

const EXTENDED_KEY_FLAG: i32 = 1 << 24;

const LAYOUT_SHIFT: u8 = 1;
const LAYOUT_CONTROL: u8 = 2;
const LAYOUT_ALT: u8 = 4;

/// One physical key transition, with the text the layout produced for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeKey<'a> {
    pub code: KeyCode,
    pub pressed: bool,
    pub repeat: bool,
    pub text: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct NativeKeyboard {
    modifiers: ModifiersState,
    caps_lock: bool,
    num_lock: bool,
}

impl NativeKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> ModifiersState {
        self.modifiers
    }

    pub fn on_modifiers_changed(&mut self, modifiers: ModifiersState) {
        self.modifiers = modifiers;
    }

    pub fn on_key<H: BrowserHost, C: FrameCompositor>(
        &mut self,
        window: &mut OsrWindow<H, C>,
        key: NativeKey<'_>,
    ) {
        if let Some(key_code) = virtual_key(key.code) {
            if key.pressed && !key.repeat {
                match key.code {
                    KeyCode::CapsLock => self.caps_lock = !self.caps_lock,
                    KeyCode::NumLock => self.num_lock = !self.num_lock,
                    _ => {}
                }
            }
            let keys = window.keys_mut();
            keys.set_key_down(key_code, key.pressed);
            keys.set_key_toggled(vk::CAPITAL, self.caps_lock);
            keys.set_key_toggled(vk::NUMLOCK, self.num_lock);
            if let Some(generic) = generic_modifier_key(key_code) {
                keys.set_key_down(generic, key.pressed);
            }

            let alt_held = self.modifiers.alt_key() && key_code != vk::MENU;
            let kind = match (key.pressed, alt_held) {
                (true, false) => RawKeyKind::KeyDown,
                (true, true) => RawKeyKind::SysKeyDown,
                (false, false) => RawKeyKind::KeyUp,
                (false, true) => RawKeyKind::SysKeyUp,
            };
            let native_key_code = if is_extended_key(key.code) {
                EXTENDED_KEY_FLAG
            } else {
                0
            };
            window.on_key_event(&RawKeyInput {
                kind,
                key_code,
                native_key_code,
            });
        }

        if !key.pressed {
            return;
        }
        let Some(text) = key.text else {
            return;
        };

        let keys = window.keys_mut();
        let shift_state = layout_shift_state(&*keys);
        for character in text.chars().filter(|character| !character.is_control()) {
            keys.set_layout_shift_state(character, shift_state);
        }

        let kind = if self.modifiers.alt_key() && !self.modifiers.control_key() {
            RawKeyKind::SysChar
        } else {
            RawKeyKind::Char
        };
        for unit in text.encode_utf16() {
            window.on_key_event(&RawKeyInput {
                kind,
                key_code: unit,
                native_key_code: 0,
            });
        }
    }
}

/// Shift state the layout was in when it produced text. Right alt stands for
/// AltGr, which layouts report as ctrl+alt.
fn layout_shift_state(keys: &dyn KeyboardState) -> u8 {
    let mut state = 0;
    if keys.is_key_down(vk::SHIFT) {
        state |= LAYOUT_SHIFT;
    }
    if keys.is_key_down(vk::RMENU) {
        state |= ALTGR_SHIFT_STATE;
    } else {
        if keys.is_key_down(vk::CONTROL) {
            state |= LAYOUT_CONTROL;
        }
        if keys.is_key_down(vk::MENU) {
            state |= LAYOUT_ALT;
        }
    }
    state
}

fn generic_modifier_key(key_code: u16) -> Option<u16> {
    match key_code {
        vk::LSHIFT | vk::RSHIFT => Some(vk::SHIFT),
        vk::LCONTROL | vk::RCONTROL => Some(vk::CONTROL),
        vk::LMENU | vk::RMENU => Some(vk::MENU),
        _ => None,
    }
}

fn is_extended_key(code: KeyCode) -> bool {
    matches!(
        code,
        KeyCode::Insert
            | KeyCode::Delete
            | KeyCode::Home
            | KeyCode::End
            | KeyCode::PageUp
            | KeyCode::PageDown
            | KeyCode::ArrowLeft
            | KeyCode::ArrowUp
            | KeyCode::ArrowRight
            | KeyCode::ArrowDown
            | KeyCode::NumpadEnter
            | KeyCode::NumpadDivide
            | KeyCode::ControlRight
            | KeyCode::AltRight
    )
}

fn virtual_key(code: KeyCode) -> Option<u16> {
    let key = match code {
        KeyCode::KeyA => 0x41,
        KeyCode::KeyB => 0x42,
        KeyCode::KeyC => 0x43,
        KeyCode::KeyD => 0x44,
        KeyCode::KeyE => 0x45,
        KeyCode::KeyF => 0x46,
        KeyCode::KeyG => 0x47,
        KeyCode::KeyH => 0x48,
        KeyCode::KeyI => 0x49,
        KeyCode::KeyJ => 0x4A,
        KeyCode::KeyK => 0x4B,
        KeyCode::KeyL => 0x4C,
        KeyCode::KeyM => 0x4D,
        KeyCode::KeyN => 0x4E,
        KeyCode::KeyO => 0x4F,
        KeyCode::KeyP => 0x50,
        KeyCode::KeyQ => 0x51,
        KeyCode::KeyR => 0x52,
        KeyCode::KeyS => 0x53,
        KeyCode::KeyT => 0x54,
        KeyCode::KeyU => 0x55,
        KeyCode::KeyV => 0x56,
        KeyCode::KeyW => 0x57,
        KeyCode::KeyX => 0x58,
        KeyCode::KeyY => 0x59,
        KeyCode::KeyZ => 0x5A,
        KeyCode::Digit0 => 0x30,
        KeyCode::Digit1 => 0x31,
        KeyCode::Digit2 => 0x32,
        KeyCode::Digit3 => 0x33,
        KeyCode::Digit4 => 0x34,
        KeyCode::Digit5 => 0x35,
        KeyCode::Digit6 => 0x36,
        KeyCode::Digit7 => 0x37,
        KeyCode::Digit8 => 0x38,
        KeyCode::Digit9 => 0x39,
        KeyCode::Numpad0 => vk::NUMPAD0,
        KeyCode::Numpad1 => vk::NUMPAD0 + 1,
        KeyCode::Numpad2 => vk::NUMPAD0 + 2,
        KeyCode::Numpad3 => vk::NUMPAD0 + 3,
        KeyCode::Numpad4 => vk::NUMPAD0 + 4,
        KeyCode::Numpad5 => vk::NUMPAD0 + 5,
        KeyCode::Numpad6 => vk::NUMPAD0 + 6,
        KeyCode::Numpad7 => vk::NUMPAD0 + 7,
        KeyCode::Numpad8 => vk::NUMPAD0 + 8,
        KeyCode::Numpad9 => vk::NUMPAD9,
        KeyCode::NumpadMultiply => vk::MULTIPLY,
        KeyCode::NumpadAdd => vk::ADD,
        KeyCode::NumpadSubtract => vk::SUBTRACT,
        KeyCode::NumpadDecimal => vk::DECIMAL,
        KeyCode::NumpadDivide => vk::DIVIDE,
        KeyCode::NumpadEnter | KeyCode::Enter => vk::RETURN,
        KeyCode::Escape => vk::ESCAPE,
        KeyCode::Space => vk::SPACE,
        KeyCode::Backspace => 0x08,
        KeyCode::Tab => 0x09,
        KeyCode::PageUp => vk::PRIOR,
        KeyCode::PageDown => vk::NEXT,
        KeyCode::End => vk::END,
        KeyCode::Home => vk::HOME,
        KeyCode::ArrowLeft => vk::LEFT,
        KeyCode::ArrowUp => vk::UP,
        KeyCode::ArrowRight => vk::RIGHT,
        KeyCode::ArrowDown => vk::DOWN,
        KeyCode::Insert => vk::INSERT,
        KeyCode::Delete => vk::DELETE,
        KeyCode::CapsLock => vk::CAPITAL,
        KeyCode::NumLock => vk::NUMLOCK,
        KeyCode::ShiftLeft => vk::LSHIFT,
        KeyCode::ShiftRight => vk::RSHIFT,
        KeyCode::ControlLeft => vk::LCONTROL,
        KeyCode::ControlRight => vk::RCONTROL,
        KeyCode::AltLeft => vk::LMENU,
        KeyCode::AltRight => vk::RMENU,
        KeyCode::SuperLeft => vk::LWIN,
        KeyCode::SuperRight => vk::RWIN,
        KeyCode::F1 => 0x70,
        KeyCode::F2 => 0x71,
        KeyCode::F3 => 0x72,
        KeyCode::F4 => 0x73,
        KeyCode::F5 => 0x74,
        KeyCode::F6 => 0x75,
        KeyCode::F7 => 0x76,
        KeyCode::F8 => 0x77,
        KeyCode::F9 => 0x78,
        KeyCode::F10 => 0x79,
        KeyCode::F11 => 0x7A,
        KeyCode::F12 => 0x7B,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use frame_scheduler::ManualClock;
    use render_protocol::{EngineInputEvent, EventFlags, KeyEvent, KeyEventType};

    use super::*;
    use crate::config::ShellConfig;
    use crate::registry::ViewIdAllocator;
    use crate::test_support::{FakeCompositor, FakeHost, HostCall, RecordingPoster};

    fn window() -> OsrWindow<FakeHost, FakeCompositor> {
        let mut window = OsrWindow::new(
            ViewIdAllocator::new().allocate(),
            &ShellConfig::default(),
            FakeCompositor::new(),
            Box::new(ManualClock::starting_at(0)),
            Box::new(RecordingPoster::default()),
        );
        window.attach_host(FakeHost::default());
        window
    }

    fn press<'a>(code: KeyCode, text: Option<&'a str>) -> NativeKey<'a> {
        NativeKey {
            code,
            pressed: true,
            repeat: false,
            text,
        }
    }

    fn release(code: KeyCode) -> NativeKey<'static> {
        NativeKey {
            code,
            pressed: false,
            repeat: false,
            text: None,
        }
    }

    fn char_events(window: &mut OsrWindow<FakeHost, FakeCompositor>) -> Vec<KeyEvent> {
        window
            .host_mut()
            .expect("host attached")
            .take_calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Input(EngineInputEvent::Key(event))
                    if event.kind == KeyEventType::Char =>
                {
                    Some(event)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn right_alt_character_is_reported_as_altgr() {
        let mut window = window();
        let mut keyboard = NativeKeyboard::new();
        keyboard.on_modifiers_changed(ModifiersState::CONTROL | ModifiersState::ALT);
        keyboard.on_key(&mut window, press(KeyCode::ControlLeft, None));
        keyboard.on_key(&mut window, press(KeyCode::AltRight, None));
        keyboard.on_key(&mut window, press(KeyCode::KeyQ, Some("@")));

        let chars = char_events(&mut window);
        assert_eq!(chars.len(), 1);
        assert_eq!(chars[0].character, Some('@'));
        assert!(chars[0].modifiers.contains(EventFlags::ALTGR_DOWN));
        assert!(
            !chars[0]
                .modifiers
                .intersects(EventFlags::CONTROL_DOWN | EventFlags::ALT_DOWN)
        );
    }

    #[test]
    fn ctrl_with_left_alt_keeps_both_modifiers() {
        let mut window = window();
        let mut keyboard = NativeKeyboard::new();
        keyboard.on_modifiers_changed(ModifiersState::CONTROL | ModifiersState::ALT);
        keyboard.on_key(&mut window, press(KeyCode::ControlLeft, None));
        keyboard.on_key(&mut window, press(KeyCode::AltLeft, None));
        keyboard.on_key(&mut window, press(KeyCode::KeyQ, Some("q")));

        let chars = char_events(&mut window);
        assert_eq!(chars.len(), 1);
        assert!(!chars[0].modifiers.contains(EventFlags::ALTGR_DOWN));
        assert!(
            chars[0]
                .modifiers
                .contains(EventFlags::CONTROL_DOWN | EventFlags::ALT_DOWN)
        );
    }

    #[test]
    fn layout_table_records_the_state_that_produced_each_character() {
        let mut window = window();
        let mut keyboard = NativeKeyboard::new();
        keyboard.on_key(&mut window, press(KeyCode::KeyQ, Some("q")));
        keyboard.on_key(&mut window, release(KeyCode::KeyQ));
        keyboard.on_modifiers_changed(ModifiersState::SHIFT);
        keyboard.on_key(&mut window, press(KeyCode::ShiftLeft, None));
        keyboard.on_key(&mut window, press(KeyCode::Digit2, Some("@")));

        let keys = window.keys_mut();
        assert_eq!(keys.layout_shift_state('q'), Some(0));
        assert_eq!(keys.layout_shift_state('@'), Some(LAYOUT_SHIFT));
        assert_eq!(keys.layout_shift_state('#'), None);
    }

    #[test]
    fn lock_keys_toggle_on_first_press_only() {
        let mut window = window();
        let mut keyboard = NativeKeyboard::new();
        keyboard.on_key(&mut window, press(KeyCode::CapsLock, None));
        keyboard.on_key(
            &mut window,
            NativeKey {
                repeat: true,
                ..press(KeyCode::CapsLock, None)
            },
        );
        assert!(window.keys_mut().is_key_toggled(vk::CAPITAL));
        assert!(!window.keys_mut().is_key_toggled(vk::NUMLOCK));
    }
}
