//! Rolling oil-pressure history recorded at 1 Hz.
//!
//! The log keeps the most recent thirty minutes and exposes them as
//! minute-long pages of sixty points so a chart can page back through them.

use embassy_time::{Duration, Instant};

/// Points in one chart page.
pub const POINTS_PER_MINUTE: usize = 60;

/// Thirty minutes at one point per second.
pub const DEFAULT_LOG_CAPACITY: usize = 30 * POINTS_PER_MINUTE;

const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Rolling 1 Hz pressure log.
#[derive(Debug, Clone)]
pub struct PressureLog<const CAP: usize = DEFAULT_LOG_CAPACITY> {
    slots: [f32; CAP],
    next: usize,
    len: usize,
    last_logged: Option<Instant>,
}

impl<const CAP: usize> PressureLog<CAP> {
    pub const fn new() -> Self {
        const { assert!(CAP >= POINTS_PER_MINUTE, "log must hold at least one minute") };
        Self {
            slots: [0.0; CAP],
            next: 0,
            len: 0,
            last_logged: None,
        }
    }

    /// Record `value` if at least one second passed since the last entry.
    ///
    /// Returns `true` when a point was stored.
    pub fn record(&mut self, now: Instant, value: f32) -> bool {
        if let Some(last) = self.last_logged
            && now.saturating_duration_since(last) < LOG_INTERVAL
        {
            return false;
        }

        self.slots[self.next] = value;
        self.next = (self.next + 1) % CAP;
        self.len = (self.len + 1).min(CAP);
        self.last_logged = Some(now);
        true
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of complete minute pages available.
    pub const fn minute_count(&self) -> usize {
        self.len / POINTS_PER_MINUTE
    }

    /// One minute page, oldest point first. Page 0 is the most recent minute.
    pub fn minute(&self, page: usize) -> Option<impl Iterator<Item = f32> + '_> {
        if page >= self.minute_count() {
            return None;
        }

        let back = (page + 1) * POINTS_PER_MINUTE;
        let start = (self.next + CAP - back) % CAP;
        Some((0..POINTS_PER_MINUTE).map(move |i| self.slots[(start + i) % CAP]))
    }

    /// Newest point in the log.
    pub fn latest(&self) -> Option<f32> {
        (self.len > 0).then(|| self.slots[(self.next + CAP - 1) % CAP])
    }
}

impl<const CAP: usize> Default for PressureLog<CAP> {
    fn default() -> Self {
        Self::new()
    }
}
