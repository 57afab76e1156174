use render_protocol::{Point, Rect, Size};

/// Secondary surface (select dropdowns, autocomplete) drawn over the view.
///
/// The engine reports where it believes the popup lives. The compositor draws it
/// at `effective_rect`, which is always inside the view. Pointer events over the
/// effective rect are shifted back into the reported space by `offset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopupOverlay {
    reported_rect: Rect,
    effective_rect: Rect,
    view_size: Size,
}

impl PopupOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported_rect(&self) -> Rect {
        self.reported_rect
    }

    pub fn effective_rect(&self) -> Rect {
        self.effective_rect
    }

    pub fn is_visible(&self) -> bool {
        !self.effective_rect.is_empty()
    }

    pub fn set_reported_rect(&mut self, rect: Rect, view_size: Size) {
        self.reported_rect = rect;
        self.view_size = view_size;
        self.effective_rect = clamp_into_view(rect, view_size);
        log::trace!(
            target: "view",
            "popup reported={:?} effective={:?} view={:?}",
            self.reported_rect,
            self.effective_rect,
            self.view_size
        );
    }

    pub fn update_view_size(&mut self, view_size: Size) {
        if self.view_size == view_size {
            return;
        }
        self.view_size = view_size;
        self.effective_rect = clamp_into_view(self.reported_rect, view_size);
    }

    pub fn clear(&mut self) {
        self.reported_rect = Rect::default();
        self.effective_rect = Rect::default();
    }

    pub fn is_over_popup(&self, x: i32, y: i32) -> bool {
        self.effective_rect.contains(x, y)
    }

    /// `reported.origin - effective.origin`; zero while the popup is not on screen.
    pub fn offset(&self) -> Point {
        if self.effective_rect.is_empty() {
            return Point::default();
        }
        Point::new(
            self.reported_rect.x - self.effective_rect.x,
            self.reported_rect.y - self.effective_rect.y,
        )
    }

    pub fn apply_offset(&self, x: i32, y: i32) -> (i32, i32) {
        if !self.is_over_popup(x, y) {
            return (x, y);
        }
        let offset = self.offset();
        (x + offset.x, y + offset.y)
    }
}

/// Limits the popup to the view size, then trims the leading and trailing
/// overhang. Rects with a non-positive extent never produce a visible popup.
fn clamp_into_view(rect: Rect, view_size: Size) -> Rect {
    if rect.is_empty() || view_size.is_empty() {
        return Rect::default();
    }

    let mut x = rect.x;
    let mut y = rect.y;
    let mut width = rect.width.min(view_size.width);
    let mut height = rect.height.min(view_size.height);

    if x < 0 {
        width = width.saturating_add(x);
        x = 0;
    }
    if y < 0 {
        height = height.saturating_add(y);
        y = 0;
    }
    if x.saturating_add(width) > view_size.width {
        width = view_size.width.saturating_sub(x);
    }
    if y.saturating_add(height) > view_size.height {
        height = view_size.height.saturating_sub(y);
    }

    if width <= 0 || height <= 0 {
        return Rect::default();
    }
    Rect::new(x, y, width, height)
}
