use render_protocol::MouseButton;

use crate::EventTimestampMillis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleClickThresholds {
    pub distance_x: i32,
    pub distance_y: i32,
    pub interval_millis: u64,
}

impl Default for DoubleClickThresholds {
    fn default() -> Self {
        Self {
            distance_x: 4,
            distance_y: 4,
            interval_millis: 500,
        }
    }
}

/// Multi-click detection. A press extends the click run when it is close to
/// the previous press in both space and time and uses the same button.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    thresholds: DoubleClickThresholds,
    last_x: i32,
    last_y: i32,
    last_button: Option<MouseButton>,
    last_time_millis: EventTimestampMillis,
    count: u32,
}

impl ClickTracker {
    pub fn new(thresholds: DoubleClickThresholds) -> Self {
        Self {
            thresholds,
            last_x: 0,
            last_y: 0,
            last_button: None,
            last_time_millis: 0,
            count: 0,
        }
    }

    pub fn thresholds(&self) -> DoubleClickThresholds {
        self.thresholds
    }

    pub fn click_count(&self) -> u32 {
        self.count
    }

    pub fn cancels_previous_click(
        &self,
        x: i32,
        y: i32,
        time_millis: EventTimestampMillis,
    ) -> bool {
        (self.last_x - x).abs() > self.thresholds.distance_x / 2
            || (self.last_y - y).abs() > self.thresholds.distance_y / 2
            || time_millis.saturating_sub(self.last_time_millis) > self.thresholds.interval_millis
    }

    /// Moves and leaves break a click run once the cursor strays too far or too long.
    pub fn on_pointer_motion(&mut self, x: i32, y: i32, time_millis: EventTimestampMillis) {
        if self.cancels_previous_click(x, y, time_millis) {
            self.count = 1;
            self.last_x = 0;
            self.last_y = 0;
            self.last_time_millis = 0;
        }
    }

    /// Records a press and returns the click count to report with it.
    pub fn on_button_down(
        &mut self,
        button: MouseButton,
        x: i32,
        y: i32,
        time_millis: EventTimestampMillis,
    ) -> u32 {
        let cancel = self.cancels_previous_click(x, y, time_millis);
        if !cancel && self.last_button == Some(button) {
            self.count += 1;
        } else {
            self.count = 1;
            self.last_x = x;
            self.last_y = y;
        }
        self.last_time_millis = time_millis;
        self.last_button = Some(button);
        self.count
    }
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(DoubleClickThresholds::default())
    }
}
