use render_protocol::{Point, Rect};

/// `floor(value * scale)`.
pub fn logical_to_device(value: i32, device_scale_factor: f32) -> i32 {
    debug_assert!(device_scale_factor > 0.0, "device scale factor must be positive");
    (value as f32 * device_scale_factor).floor() as i32
}

/// `floor(value / scale)`.
pub fn device_to_logical(value: i32, device_scale_factor: f32) -> i32 {
    debug_assert!(device_scale_factor > 0.0, "device scale factor must be positive");
    (value as f32 / device_scale_factor).floor() as i32
}

pub fn logical_to_device_point(point: Point, device_scale_factor: f32) -> Point {
    Point::new(
        logical_to_device(point.x, device_scale_factor),
        logical_to_device(point.y, device_scale_factor),
    )
}

pub fn device_to_logical_point(point: Point, device_scale_factor: f32) -> Point {
    Point::new(
        device_to_logical(point.x, device_scale_factor),
        device_to_logical(point.y, device_scale_factor),
    )
}

pub fn logical_to_device_rect(rect: Rect, device_scale_factor: f32) -> Rect {
    Rect::new(
        logical_to_device(rect.x, device_scale_factor),
        logical_to_device(rect.y, device_scale_factor),
        logical_to_device(rect.width, device_scale_factor),
        logical_to_device(rect.height, device_scale_factor),
    )
}

pub fn device_to_logical_rect(rect: Rect, device_scale_factor: f32) -> Rect {
    Rect::new(
        device_to_logical(rect.x, device_scale_factor),
        device_to_logical(rect.y, device_scale_factor),
        device_to_logical(rect.width, device_scale_factor),
        device_to_logical(rect.height, device_scale_factor),
    )
}
