use embassy_time::{Duration, Instant};

/// Default averaging window for the bus voltage
pub const VIN_SAMPLE_WINDOW: Duration = Duration::from_millis(1000);

/// Time-weighted moving average of the bus input voltage.
///
/// Each reading moves the average by `dt / window` of the way toward it, so
/// the response does not depend on how often the filter is fed. Non-positive
/// readings are treated as dropouts and replaced by the last valid reading.
#[derive(Debug, Clone)]
pub struct VinFilter {
    window: Duration,
    last_valid: f32,
    filtered: f32,
    last_update: Option<Instant>,
}

impl VinFilter {
    /// `initial` seeds both the average and the dropout fallback.
    pub const fn new(initial: f32, window: Duration) -> Self {
        Self {
            window,
            last_valid: initial,
            filtered: initial,
            last_update: None,
        }
    }

    pub fn update(&mut self, now: Instant, raw: f32) -> f32 {
        let raw = if raw > 0.0 {
            self.last_valid = raw;
            raw
        } else {
            self.last_valid
        };

        let alpha = match self.last_update {
            None => 1.0,
            Some(last) => {
                let dt = now.saturating_duration_since(last).as_micros() as f32;
                let window = self.window.as_micros().max(1) as f32;
                (dt / window).min(1.0)
            }
        };

        self.filtered += (raw - self.filtered) * alpha;
        self.last_update = Some(now);
        self.filtered
    }

    pub fn value(&self) -> f32 {
        self.filtered
    }
}

impl Default for VinFilter {
    fn default() -> Self {
        Self::new(4.8, VIN_SAMPLE_WINDOW)
    }
}
