//! Vertex data and clip matrices for the compositor passes.

use render_protocol::{Rect, Size};

pub type TransformMatrix4x4 = [f32; 16];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColoredVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Full-viewport quad as a triangle strip. Texture row 0 sits at the top.
pub const VIEW_QUAD_VERTICES: [TexturedVertex; 4] = [
    TexturedVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    TexturedVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    TexturedVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    TexturedVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

/// Background gradient: red along the bottom edge, blue along the top.
pub const BACKGROUND_GRADIENT_VERTICES: [ColoredVertex; 4] = [
    ColoredVertex {
        position: [-1.0, -1.0],
        color: RED,
    },
    ColoredVertex {
        position: [1.0, -1.0],
        color: RED,
    },
    ColoredVertex {
        position: [-1.0, 1.0],
        color: BLUE,
    },
    ColoredVertex {
        position: [1.0, 1.0],
        color: BLUE,
    },
];

pub const OUTLINE_VERTEX_COUNT: usize = 5;

pub const IDENTITY_MATRIX: TransformMatrix4x4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Maps pixel coordinates (origin top-left, y down) onto clip space.
pub fn pixel_clip_matrix_from_size(view_size: Size) -> TransformMatrix4x4 {
    assert!(
        view_size.width > 0 && view_size.height > 0,
        "view size must be positive"
    );
    let width_f32 = view_size.width as f32;
    let height_f32 = view_size.height as f32;
    [
        2.0 / width_f32,
        0.0,
        0.0,
        0.0,
        0.0,
        -2.0 / height_f32,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        -1.0,
        1.0,
        0.0,
        1.0,
    ]
}

/// Closed line strip around `rect` in pixel space. The left edge moves right
/// and the bottom edge moves up by one pixel so both stay on screen.
pub fn update_rect_outline(rect: Rect) -> [ColoredVertex; OUTLINE_VERTEX_COUNT] {
    let left = (rect.x + 1) as f32;
    let right = rect.right() as f32;
    let top = rect.y as f32;
    let bottom = (rect.bottom() - 1) as f32;
    let corner = |x: f32, y: f32| ColoredVertex {
        position: [x, y],
        color: RED,
    };
    [
        corner(left, top),
        corner(right, top),
        corner(right, bottom),
        corner(left, bottom),
        corner(left, top),
    ]
}
