use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub const DIRTY_REGION_INLINE_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Integer rectangle, origin at top-left. Negative extents are treated as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintElementType {
    View,
    Popup,
}

/// Rectangles accompanying one pixel-buffer callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirtyRegion {
    rects: SmallVec<[Rect; DIRTY_REGION_INLINE_CAPACITY]>,
}

impl DirtyRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(rect: Rect) -> Self {
        let mut region = Self::new();
        region.push(rect);
        region
    }

    pub fn push(&mut self, rect: Rect) {
        self.rects.push(rect);
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn first(&self) -> Option<Rect> {
        self.rects.first().copied()
    }

    /// True when the region is exactly one rectangle covering `size`.
    pub fn is_single_full_rect(&self, size: Size) -> bool {
        self.rects.len() == 1 && self.rects[0] == Rect::from_size(size)
    }
}

impl FromIterator<Rect> for DirtyRegion {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        Self {
            rects: iter.into_iter().collect(),
        }
    }
}

bitflags! {
    /// Modifier and state flags attached to engine input records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const CAPS_LOCK_ON = 1 << 0;
        const SHIFT_DOWN = 1 << 1;
        const CONTROL_DOWN = 1 << 2;
        const ALT_DOWN = 1 << 3;
        const LEFT_MOUSE_BUTTON = 1 << 4;
        const MIDDLE_MOUSE_BUTTON = 1 << 5;
        const RIGHT_MOUSE_BUTTON = 1 << 6;
        const COMMAND_DOWN = 1 << 7;
        const NUM_LOCK_ON = 1 << 8;
        const IS_KEY_PAD = 1 << 9;
        const IS_LEFT = 1 << 10;
        const IS_RIGHT = 1 << 11;
        const ALTGR_DOWN = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Pointer record in logical (DIP) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub modifiers: EventFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    RawKeyDown,
    KeyUp,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventType,
    pub modifiers: EventFlags,
    pub windows_key_code: i32,
    pub native_key_code: i32,
    pub is_system_key: bool,
    pub character: Option<char>,
}

/// Input records the shell forwards to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineInputEvent {
    MouseClick {
        event: MouseEvent,
        button: MouseButton,
        mouse_up: bool,
        click_count: u32,
    },
    MouseMove {
        event: MouseEvent,
        mouse_leave: bool,
    },
    MouseWheel {
        event: MouseEvent,
        delta_x: i32,
        delta_y: i32,
    },
    Key(KeyEvent),
    CaptureLost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenInfo {
    pub device_scale_factor: f32,
    pub rect: Rect,
    pub available_rect: Rect,
}

/// 32-bit colour packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgbColor(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    InvalidLength(usize),
    InvalidDigit,
}

impl ArgbColor {
    pub const OPAQUE_WHITE: Self = Self(0xFFFF_FFFF);
    pub const TRANSPARENT: Self = Self(0x0000_0000);

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_transparent(self) -> bool {
        self.alpha() == 0
    }

    /// Parses `AARRGGBB` or `RRGGBB` (opaque), with an optional `#` or `0x` prefix.
    pub fn parse_hex(text: &str) -> Result<Self, ColorParseError> {
        let digits = text
            .strip_prefix('#')
            .or_else(|| text.strip_prefix("0x"))
            .unwrap_or(text);
        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidDigit);
        }
        let alpha = match digits.len() {
            8 => 0,
            6 => 0xFF00_0000,
            other => return Err(ColorParseError::InvalidLength(other)),
        };
        let value = u32::from_str_radix(digits, 16).map_err(|_| ColorParseError::InvalidDigit)?;
        Ok(Self(alpha | value))
    }
}

impl Default for ArgbColor {
    fn default() -> Self {
        Self::OPAQUE_WHITE
    }
}
