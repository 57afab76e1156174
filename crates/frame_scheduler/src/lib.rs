use std::time::{Duration, Instant};

pub type TimestampMicros = u64;

pub const MIN_FRAME_RATE: u32 = 1;
pub const MAX_FRAME_RATE: u32 = 240;
pub const DEFAULT_FRAME_RATE: u32 = 30;

const MICROS_PER_SECOND: u64 = 1_000_000;

pub trait Clock {
    fn now_micros(&self) -> TimestampMicros;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> TimestampMicros {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
mod manual_clock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::{Clock, TimestampMicros};

    /// Shared hand-driven clock; clones observe the same time.
    #[derive(Debug, Clone, Default)]
    pub struct ManualClock {
        now: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn starting_at(now: TimestampMicros) -> Self {
            let clock = Self::default();
            clock.set(now);
            clock
        }

        pub fn set(&self, now: TimestampMicros) {
            self.now.store(now, Ordering::SeqCst);
        }

        pub fn advance(&self, delta: TimestampMicros) {
            self.now.fetch_add(delta, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_micros(&self) -> TimestampMicros {
            self.now.load(Ordering::SeqCst)
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual_clock::ManualClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePacingMode {
    /// The shell renders on its own timer after each invalidate.
    TimerDriven,
    /// The shell keeps asking the engine for frames; paints drive rendering.
    ExternalFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSchedulerConfig {
    pub mode: FramePacingMode,
    pub target_frame_rate: u32,
}

impl Default for FrameSchedulerConfig {
    fn default() -> Self {
        Self {
            mode: FramePacingMode::TimerDriven,
            target_frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

/// Payload carried by a posted tick. `last_timestamp_micros` is `None` for the
/// tick started by `invalidate`: there is no previous tick to correct against,
/// so the first wait is the full `delay_micros` whatever the clock reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub last_timestamp_micros: Option<TimestampMicros>,
    pub delay_micros: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Render immediately; the scheduler is idle again.
    RenderNow,
    /// Post `tick` back to the scheduler after `after`.
    Reschedule {
        tick: ScheduledTick,
        after: Duration,
        request_external_frame: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending,
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    mode: FramePacingMode,
    target_frame_rate: u32,
    state: SchedulerState,
}

impl FrameScheduler {
    pub fn new(config: FrameSchedulerConfig) -> Self {
        Self {
            mode: config.mode,
            target_frame_rate: clamp_frame_rate(config.target_frame_rate),
            state: SchedulerState::Idle,
        }
    }

    pub fn mode(&self) -> FramePacingMode {
        self.mode
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == SchedulerState::Pending
    }

    pub fn target_frame_rate(&self) -> u32 {
        self.target_frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.target_frame_rate = clamp_frame_rate(frame_rate);
    }

    pub fn target_interval_micros(&self) -> u64 {
        MICROS_PER_SECOND / u64::from(self.target_frame_rate)
    }

    /// Requests a frame. Returns `None` when a tick is already outstanding.
    pub fn invalidate(&mut self, now: TimestampMicros) -> Option<TickDecision> {
        if self.is_pending() {
            log::trace!(target: "frame_scheduler", "invalidate coalesced into pending tick");
            return None;
        }
        let tick = ScheduledTick {
            last_timestamp_micros: None,
            delay_micros: self.target_interval_micros(),
        };
        Some(self.on_tick(tick, now))
    }

    /// Runs one scheduled tick.
    pub fn on_tick(&mut self, tick: ScheduledTick, now: TimestampMicros) -> TickDecision {
        if self.is_pending() && self.mode == FramePacingMode::TimerDriven {
            self.state = SchedulerState::Idle;
            return TickDecision::RenderNow;
        }

        let next_delay_micros = match tick.last_timestamp_micros {
            Some(last) => now.saturating_sub(last).min(tick.delay_micros),
            None => tick.delay_micros,
        };
        self.state = SchedulerState::Pending;

        log::trace!(
            target: "frame_scheduler",
            "tick rescheduled: mode={:?} delay_us={} next_us={}",
            self.mode,
            tick.delay_micros,
            next_delay_micros
        );
        TickDecision::Reschedule {
            tick: ScheduledTick {
                last_timestamp_micros: Some(now),
                delay_micros: tick.delay_micros,
            },
            after: Duration::from_micros(next_delay_micros),
            request_external_frame: self.mode == FramePacingMode::ExternalFrame,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(FrameSchedulerConfig::default())
    }
}

fn clamp_frame_rate(frame_rate: u32) -> u32 {
    frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(mode: FramePacingMode, target_frame_rate: u32) -> FrameScheduler {
        FrameScheduler::new(FrameSchedulerConfig {
            mode,
            target_frame_rate,
        })
    }

    fn expect_reschedule(decision: TickDecision) -> (ScheduledTick, Duration, bool) {
        match decision {
            TickDecision::Reschedule {
                tick,
                after,
                request_external_frame,
            } => (tick, after, request_external_frame),
            TickDecision::RenderNow => panic!("expected reschedule, got render-now"),
        }
    }

    #[test]
    fn invalidate_schedules_one_tick_after_the_nominal_interval() {
        let mut scheduler = scheduler(FramePacingMode::TimerDriven, 50);

        let decision = scheduler
            .invalidate(1_000)
            .expect("idle scheduler accepts invalidate");
        let (tick, after, request_external_frame) = expect_reschedule(decision);

        assert_eq!(after, Duration::from_micros(20_000));
        assert_eq!(tick.last_timestamp_micros, Some(1_000));
        assert_eq!(tick.delay_micros, 20_000);
        assert!(!request_external_frame);
        assert!(scheduler.is_pending());
    }

    #[test]
    fn invalidate_near_the_clock_origin_waits_the_full_interval() {
        let mut scheduler = scheduler(FramePacingMode::TimerDriven, 50);

        let (tick, after, _) = expect_reschedule(scheduler.invalidate(5).expect("invalidate"));

        assert_eq!(after, Duration::from_micros(20_000));
        assert_eq!(tick.last_timestamp_micros, Some(5));
    }

    #[test]
    fn second_invalidate_while_pending_is_coalesced() {
        let mut scheduler = scheduler(FramePacingMode::TimerDriven, 60);

        assert!(scheduler.invalidate(0).is_some());
        assert!(scheduler.invalidate(10).is_none());
        assert!(scheduler.invalidate(20).is_none());
        assert_eq!(scheduler.state(), SchedulerState::Pending);
    }

    #[test]
    fn timer_driven_tick_renders_and_returns_to_idle() {
        let mut scheduler = scheduler(FramePacingMode::TimerDriven, 30);
        let (tick, _, _) = expect_reschedule(scheduler.invalidate(500).expect("invalidate"));

        let decision = scheduler.on_tick(tick, 34_000);

        assert_eq!(decision, TickDecision::RenderNow);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.invalidate(34_100).is_some());
    }

    #[test]
    fn external_frame_ticks_keep_a_steady_interval() {
        let mut scheduler = scheduler(FramePacingMode::ExternalFrame, 40);
        let interval = 25_000;
        let mut now = 3_000_000;
        let (mut tick, after, request_external_frame) =
            expect_reschedule(scheduler.invalidate(now).expect("invalidate"));
        assert!(request_external_frame);
        assert_eq!(after, Duration::from_micros(interval));

        for _ in 0..5 {
            now += interval;
            let (next_tick, after, request_external_frame) =
                expect_reschedule(scheduler.on_tick(tick, now));
            assert_eq!(after, Duration::from_micros(interval));
            assert!(request_external_frame);
            assert_eq!(next_tick.last_timestamp_micros, Some(now));
            tick = next_tick;
        }
        assert!(scheduler.is_pending());
    }

    #[test]
    fn early_tick_shortens_the_next_delay() {
        let mut scheduler = scheduler(FramePacingMode::ExternalFrame, 50);
        let (tick, _, _) = expect_reschedule(scheduler.invalidate(100_000).expect("invalidate"));

        let (_, after, _) = expect_reschedule(scheduler.on_tick(tick, 108_000));
        assert_eq!(after, Duration::from_micros(8_000));
    }

    #[test]
    fn late_tick_never_waits_longer_than_the_interval() {
        let mut scheduler = scheduler(FramePacingMode::ExternalFrame, 50);
        let (tick, _, _) = expect_reschedule(scheduler.invalidate(100_000).expect("invalidate"));

        let (_, after, _) = expect_reschedule(scheduler.on_tick(tick, 190_000));
        assert_eq!(after, Duration::from_micros(20_000));
    }

    #[test]
    fn frame_rate_is_clamped_to_a_usable_range() {
        let mut scheduler = scheduler(FramePacingMode::TimerDriven, 0);
        assert_eq!(scheduler.target_frame_rate(), MIN_FRAME_RATE);
        assert_eq!(scheduler.target_interval_micros(), 1_000_000);

        scheduler.set_frame_rate(10_000);
        assert_eq!(scheduler.target_frame_rate(), MAX_FRAME_RATE);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(5);
        let observer = clock.clone();
        clock.advance(10);
        assert_eq!(observer.now_micros(), 15);
    }
}
