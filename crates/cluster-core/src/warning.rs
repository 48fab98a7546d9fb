//! Low oil pressure under cornering load
//!
//! Oil surge in long corners can starve the pickup. The monitor raises a
//! warning when lateral load and low pressure coincide for long enough and
//! remembers the most recent event for the menu.

use embassy_time::{Duration, Instant};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calibration::Reading;
use crate::motion::{GDirection, MotionReading};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarningConfig {
    /// G above which the condition can qualify
    pub g_threshold: f32,
    /// Pressure at or below which the condition can qualify
    pub pressure_floor_bar: f32,
    pub dwell_ms: u32,
    /// How long the warning stays up after the condition clears
    pub grace_ms: u32,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            g_threshold: 1.0,
            pressure_floor_bar: 3.0,
            dwell_ms: 500,
            grace_ms: 3000,
        }
    }
}

/// Summary of the last completed low-pressure span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPressureEvent {
    pub peak_g: f32,
    pub direction: GDirection,
    pub duration_s: f32,
    pub min_pressure_bar: f32,
}

/// Warning visibility after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningStatus {
    pub visible: bool,
    /// Visibility differs from the previous update
    pub changed: bool,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    start: Instant,
    peak_g: f32,
    min_pressure_bar: f32,
    direction: GDirection,
}

#[derive(Debug, Clone)]
pub struct LowPressureMonitor {
    config: WarningConfig,
    current: Option<Accumulator>,
    visible: bool,
    hold_until: Option<Instant>,
    last_event: Option<LowPressureEvent>,
}

impl LowPressureMonitor {
    pub fn new(config: WarningConfig) -> Self {
        Self {
            config,
            current: None,
            visible: false,
            hold_until: None,
            last_event: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_event(&self) -> Option<&LowPressureEvent> {
        self.last_event.as_ref()
    }

    pub fn update(&mut self, now: Instant, motion: &MotionReading, pressure: Reading) -> WarningStatus {
        let low_pressure = pressure
            .ok()
            .filter(|bar| *bar <= self.config.pressure_floor_bar);

        let visible = match low_pressure {
            Some(bar) if motion.g_force > self.config.g_threshold => {
                self.accumulate(now, motion, bar)
            }
            _ => self.clear(now),
        };

        let changed = visible != self.visible;
        self.visible = visible;
        WarningStatus { visible, changed }
    }

    fn accumulate(&mut self, now: Instant, motion: &MotionReading, bar: f32) -> bool {
        let acc = self.current.get_or_insert(Accumulator {
            start: now,
            peak_g: motion.g_force,
            min_pressure_bar: bar,
            direction: motion.direction,
        });
        acc.peak_g = acc.peak_g.max(motion.g_force);
        acc.min_pressure_bar = acc.min_pressure_bar.min(bar);

        let dwell = Duration::from_millis(self.config.dwell_ms.into());
        let confirmed = now.saturating_duration_since(acc.start) >= dwell;
        if confirmed && !self.visible {
            warn!(
                "Low oil pressure {} bar at {} G {}",
                acc.min_pressure_bar,
                acc.peak_g,
                acc.direction.label()
            );
        }
        confirmed || self.in_grace(now)
    }

    fn clear(&mut self, now: Instant) -> bool {
        if let Some(acc) = self.current.take() {
            let duration = now.saturating_duration_since(acc.start);
            let event = LowPressureEvent {
                peak_g: acc.peak_g,
                direction: acc.direction,
                duration_s: duration.as_millis() as f32 / 1000.0,
                min_pressure_bar: acc.min_pressure_bar,
            };
            info!(
                "Low pressure event: {} G {} for {} s, min {} bar",
                event.peak_g,
                event.direction.label(),
                event.duration_s,
                event.min_pressure_bar
            );
            self.last_event = Some(event);

            // Only a confirmed span starts a new hold
            if duration >= Duration::from_millis(self.config.dwell_ms.into()) {
                self.hold_until = Some(now + Duration::from_millis(self.config.grace_ms.into()));
            }
        }
        self.in_grace(now)
    }

    fn in_grace(&self, now: Instant) -> bool {
        self.hold_until.is_some_and(|until| now < until)
    }
}

impl Default for LowPressureMonitor {
    fn default() -> Self {
        Self::new(WarningConfig::default())
    }
}
