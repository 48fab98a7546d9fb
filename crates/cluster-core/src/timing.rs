//! Frame pacing and frame-rate measurement

use embassy_time::{Duration, Instant};

/// Budget of one frame at 60 Hz
pub const FRAME_INTERVAL: Duration = Duration::from_micros(1_000_000 / 60);
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Tells the caller how long to sleep to hold a fixed frame budget.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    frame_start: Option<Instant>,
}

impl FramePacer {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            frame_start: None,
        }
    }

    /// Mark the start of a frame.
    pub fn begin(&mut self, now: Instant) {
        self.frame_start = Some(now);
    }

    /// Time left in the current frame budget, zero when overrun.
    pub fn remaining(&self, now: Instant) -> Duration {
        let Some(start) = self.frame_start else {
            return Duration::from_ticks(0);
        };
        let elapsed = now.saturating_duration_since(start);
        self.interval
            .checked_sub(elapsed)
            .unwrap_or(Duration::from_ticks(0))
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(FRAME_INTERVAL)
    }
}

/// Counts frames and reports the rate once per second.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
    last_fps: u32,
}

impl FpsCounter {
    pub const fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            last_fps: 0,
        }
    }

    /// Count one frame. Returns the rate when a one-second window closes.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_WINDOW {
            return None;
        }

        let fps = (u64::from(self.frames) * 1000 / elapsed.as_millis().max(1)) as u32;
        self.last_fps = fps;
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }

    pub fn last_fps(&self) -> u32 {
        self.last_fps
    }
}
