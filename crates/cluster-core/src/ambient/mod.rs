//! Ambient light controller
//!
//! Turns noisy lux readings into a backlight mode and level. The controller
//! throttles itself: [`AmbientLightController::update`] does nothing until
//! its sample interval has elapsed, so the frame loop may call it every frame.

mod filter;

pub use filter::{
    AmbientFilterStrategy, EwmaFilter, LUX_WINDOW, LuxPrefill, MedianFilter, OUTLIER_MAD_FACTOR,
};

use embassy_time::{Duration, Instant};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::brightness::{BrightnessMode, BrightnessState};

/// Delay between blanking the backlight and sampling the light sensor
pub const ALS_SETTLE_US: u32 = 500;
/// Persisted key of the screen self-illumination coefficient
pub const K_SCREEN_KEY: &str = "k_screen";

/// Lux boundaries between the brightness modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LuxThresholds {
    /// At or above: Day
    pub day: f32,
    /// At or above: Dusk, below: Night
    pub dusk: f32,
}

impl LuxThresholds {
    pub fn mode_for(&self, lux: f32) -> BrightnessMode {
        if lux >= self.day {
            BrightnessMode::Day
        } else if lux >= self.dusk {
            BrightnessMode::Dusk
        } else {
            BrightnessMode::Night
        }
    }

    /// Piecewise-linear duty cycle through the mode levels.
    ///
    /// Zero lux maps to the Night level, the dusk threshold to the Dusk level
    /// and the day threshold (and above) to the Day level.
    pub fn level_for(&self, lux: f32) -> u8 {
        let night = f32::from(BrightnessMode::Night.level());
        let dusk = f32::from(BrightnessMode::Dusk.level());
        let day = f32::from(BrightnessMode::Day.level());

        let level = if lux >= self.day {
            day
        } else if lux >= self.dusk {
            dusk + (day - dusk) * (lux - self.dusk) / (self.day - self.dusk)
        } else if lux > 0.0 {
            night + (dusk - night) * lux / self.dusk
        } else {
            night
        };
        libm::roundf(level).clamp(0.0, 255.0) as u8
    }
}

impl Default for LuxThresholds {
    fn default() -> Self {
        Self {
            day: 15.0,
            dusk: 10.0,
        }
    }
}

/// How filtered lux becomes a brightness decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModePolicy {
    /// Three discrete modes; a new mode must be seen on `confirm_samples`
    /// consecutive updates before it is applied.
    Discrete { confirm_samples: u8 },
    /// Continuous duty cycle; the live target only moves when the new target
    /// differs from it by more than `margin_ratio` of the current target.
    HysteresisBand { margin_ratio: f32 },
}

impl Default for ModePolicy {
    fn default() -> Self {
        Self::Discrete { confirm_samples: 2 }
    }
}

/// Brightness chosen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientDecision {
    pub mode: BrightnessMode,
    pub level: u8,
}

/// Closed-loop ambient brightness controller.
pub struct AmbientLightController<F> {
    filter: F,
    policy: ModePolicy,
    thresholds: LuxThresholds,
    interval: Duration,
    k_screen: f32,
    last_update: Option<Instant>,
    force_next: bool,
    pending: Option<(BrightnessMode, u8)>,
    latest_lux: Option<u16>,
    filtered_lux: Option<f32>,
}

impl<F: AmbientFilterStrategy> AmbientLightController<F> {
    pub fn new(filter: F, policy: ModePolicy, thresholds: LuxThresholds, interval: Duration) -> Self {
        Self {
            filter,
            policy,
            thresholds,
            interval,
            k_screen: 0.0,
            last_update: None,
            force_next: false,
            pending: None,
            latest_lux: None,
            filtered_lux: None,
        }
    }

    pub fn set_k_screen(&mut self, k_screen: f32) {
        self.k_screen = k_screen.max(0.0);
    }

    pub fn k_screen(&self) -> f32 {
        self.k_screen
    }

    /// Last raw reading from the light sensor
    pub fn latest_lux(&self) -> Option<u16> {
        self.latest_lux
    }

    /// Last output of the smoothing filter
    pub fn filtered_lux(&self) -> Option<f32> {
        self.filtered_lux
    }

    /// Whether the next [`update`](Self::update) call would do any work.
    pub fn is_due(&self, now: Instant) -> bool {
        self.force_next
            || self
                .last_update
                .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Make the next update run immediately and apply its decision without
    /// confirmation.
    pub fn request_immediate(&mut self) {
        self.force_next = true;
    }

    /// Feed one lux reading.
    ///
    /// `backlight_level` is the level the backlight was lit at while the
    /// sensor integrated; pass 0 when it was blanked for the read. Returns a
    /// decision only when the brightness should change.
    pub fn update(
        &mut self,
        now: Instant,
        raw_lux: u16,
        backlight_level: u8,
        state: &BrightnessState,
    ) -> Option<AmbientDecision> {
        if !self.is_due(now) {
            return None;
        }
        let forced = core::mem::take(&mut self.force_next);
        self.last_update = Some(now);
        self.latest_lux = Some(raw_lux);

        let corrected =
            (f32::from(raw_lux) - self.k_screen * f32::from(backlight_level)).max(0.0);
        let filtered = self.filter.filter(corrected);
        self.filtered_lux = Some(filtered);
        debug!("lux raw={} corrected={} filtered={}", raw_lux, corrected, filtered);

        let decision = match self.policy {
            ModePolicy::Discrete { confirm_samples } => {
                self.decide_discrete(filtered, confirm_samples, forced, state)
            }
            ModePolicy::HysteresisBand { margin_ratio } => {
                self.decide_band(filtered, margin_ratio, forced, state)
            }
        };

        if let Some(d) = decision {
            info!("ambient: {} lux -> {} ({})", filtered, d.mode.label(), d.level);
        }
        decision
    }

    fn decide_discrete(
        &mut self,
        lux: f32,
        confirm_samples: u8,
        forced: bool,
        state: &BrightnessState,
    ) -> Option<AmbientDecision> {
        let candidate = self.thresholds.mode_for(lux);
        let decision = AmbientDecision {
            mode: candidate,
            level: candidate.level(),
        };

        if forced {
            self.pending = None;
            return Some(decision);
        }
        if candidate == state.mode {
            self.pending = None;
            return None;
        }

        let seen = match self.pending {
            Some((mode, count)) if mode == candidate => count.saturating_add(1),
            _ => 1,
        };
        if seen >= confirm_samples.max(1) {
            self.pending = None;
            Some(decision)
        } else {
            self.pending = Some((candidate, seen));
            None
        }
    }

    fn decide_band(
        &mut self,
        lux: f32,
        margin_ratio: f32,
        forced: bool,
        state: &BrightnessState,
    ) -> Option<AmbientDecision> {
        let decision = AmbientDecision {
            mode: self.thresholds.mode_for(lux),
            level: self.thresholds.level_for(lux),
        };
        if forced {
            return Some(decision);
        }

        let current = f32::from(state.target_level);
        let delta = libm::fabsf(f32::from(decision.level) - current);
        (delta > current * margin_ratio).then_some(decision)
    }
}

/// Screen self-illumination per backlight step, from lux measured with the
/// backlight at 0 and at 255.
pub fn screen_coefficient(lux_dark: u16, lux_full: u16) -> f32 {
    ((f32::from(lux_full) - f32::from(lux_dark)) / 255.0).max(0.0)
}
