//! Pure planning of pixel-buffer uploads into the view texture.
//!
//! A plan lists texture operations in order. Each write names its destination
//! in the texture and where the source pixels start inside the engine buffer
//! (the skip-pixel/skip-row offsets), with the buffer stride in pixels.

use render_protocol::{DirtyRegion, Point, Rect, Size};
use smallvec::SmallVec;
use thiserror::Error;

pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadPlanError {
    #[error("pixel buffer extent {width}x{height} is not positive")]
    InvalidBufferSize { width: i32, height: i32 },
    #[error("pixel buffer holds {actual} bytes, {expected} required")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("dirty rect {rect:?} lies outside the {view:?} view")]
    DirtyRectOutOfBounds { rect: Rect, view: Size },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionWrite {
    pub dest: Rect,
    pub source_origin: Point,
    pub source_stride: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOp {
    /// Reallocate the texture at this size before writing.
    Respecify(Size),
    Write(RegionWrite),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Full,
    Partial,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    kind: UploadKind,
    ops: SmallVec<[UploadOp; 4]>,
}

impl UploadPlan {
    fn skipped() -> Self {
        Self {
            kind: UploadKind::Skipped,
            ops: SmallVec::new(),
        }
    }

    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn ops(&self) -> &[UploadOp] {
        &self.ops
    }
}

/// Plans a view paint against the texture's current size.
///
/// A size change, or a single dirty rect covering the whole buffer, re-specifies
/// the texture. Otherwise every dirty rect becomes one sub-region write.
pub fn plan_view_upload(
    current_size: Size,
    dirty: &DirtyRegion,
    width: i32,
    height: i32,
    buffer_len: usize,
) -> Result<UploadPlan, UploadPlanError> {
    validate_buffer(width, height, buffer_len)?;
    let view_size = Size::new(width, height);
    let full_rect = Rect::from_size(view_size);

    if current_size != view_size || dirty.is_single_full_rect(view_size) {
        let mut ops = SmallVec::new();
        ops.push(UploadOp::Respecify(view_size));
        ops.push(UploadOp::Write(RegionWrite {
            dest: full_rect,
            source_origin: Point::default(),
            source_stride: width,
        }));
        return Ok(UploadPlan {
            kind: UploadKind::Full,
            ops,
        });
    }

    let mut ops = SmallVec::new();
    for rect in dirty.rects() {
        if !full_rect.contains_rect(rect) {
            return Err(UploadPlanError::DirtyRectOutOfBounds {
                rect: *rect,
                view: view_size,
            });
        }
        if rect.is_empty() {
            continue;
        }
        ops.push(UploadOp::Write(RegionWrite {
            dest: *rect,
            source_origin: rect.origin(),
            source_stride: width,
        }));
    }
    if ops.is_empty() {
        return Ok(UploadPlan::skipped());
    }
    Ok(UploadPlan {
        kind: UploadKind::Partial,
        ops,
    })
}

/// Plans a popup paint. The popup buffer lands at the effective origin and is
/// clipped to both the effective rect and the view.
pub fn plan_popup_upload(
    view_size: Size,
    effective_rect: Rect,
    width: i32,
    height: i32,
    buffer_len: usize,
) -> Result<UploadPlan, UploadPlanError> {
    validate_buffer(width, height, buffer_len)?;
    if effective_rect.is_empty() || view_size.is_empty() {
        return Ok(UploadPlan::skipped());
    }

    let mut x = effective_rect.x;
    let mut y = effective_rect.y;
    let mut skip_pixels = 0;
    let mut skip_rows = 0;
    if x < 0 {
        skip_pixels = -x;
        x = 0;
    }
    if y < 0 {
        skip_rows = -y;
        y = 0;
    }

    let mut visible_width = effective_rect.width.min(width) - skip_pixels;
    let mut visible_height = effective_rect.height.min(height) - skip_rows;
    if x + visible_width > view_size.width {
        visible_width = view_size.width - x;
    }
    if y + visible_height > view_size.height {
        visible_height = view_size.height - y;
    }
    if visible_width <= 0 || visible_height <= 0 {
        return Ok(UploadPlan::skipped());
    }

    let mut ops = SmallVec::new();
    ops.push(UploadOp::Write(RegionWrite {
        dest: Rect::new(x, y, visible_width, visible_height),
        source_origin: Point::new(skip_pixels, skip_rows),
        source_stride: width,
    }));
    Ok(UploadPlan {
        kind: UploadKind::Partial,
        ops,
    })
}

fn validate_buffer(width: i32, height: i32, buffer_len: usize) -> Result<(), UploadPlanError> {
    let invalid = UploadPlanError::InvalidBufferSize { width, height };
    if width <= 0 || height <= 0 {
        return Err(invalid);
    }
    let expected = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(width, height)| width.checked_mul(height))
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .ok_or(invalid)?;
    if buffer_len < expected {
        return Err(UploadPlanError::BufferTooSmall {
            expected,
            actual: buffer_len,
        });
    }
    Ok(())
}
