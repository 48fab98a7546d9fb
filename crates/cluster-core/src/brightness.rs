//! Backlight brightness modes, shared brightness state and the level ramp

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Discrete backlight mode chosen by the ambient controller or the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrightnessMode {
    Day,
    Dusk,
    Night,
}

impl BrightnessMode {
    /// Backlight duty cycle for this mode
    pub const fn level(self) -> u8 {
        match self {
            Self::Day => 255,
            Self::Dusk => 200,
            Self::Night => 60,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Dusk => "Dusk",
            Self::Night => "Night",
        }
    }
}

/// Brightness shared between the controllers and the backlight.
///
/// `target_level` is where the ramp is heading; `current_level` is what the
/// backlight is driven with right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessState {
    pub mode: BrightnessMode,
    pub current_level: u8,
    pub target_level: u8,
}

impl BrightnessState {
    pub const fn new(mode: BrightnessMode) -> Self {
        Self {
            mode,
            current_level: mode.level(),
            target_level: mode.level(),
        }
    }

    /// Select a mode and ramp toward its level.
    pub fn set_mode(&mut self, mode: BrightnessMode) {
        self.mode = mode;
        self.target_level = mode.level();
    }

    /// Select a target level without changing the mode.
    pub fn set_target(&mut self, level: u8) {
        self.target_level = level;
    }

    /// Jump straight to `level`, bypassing the ramp.
    pub fn force_level(&mut self, level: u8) {
        self.current_level = level;
        self.target_level = level;
    }

    pub fn is_settled(&self) -> bool {
        self.current_level == self.target_level
    }
}

impl Default for BrightnessState {
    fn default() -> Self {
        Self::new(BrightnessMode::Day)
    }
}

pub const DEFAULT_RAMP_STEP: u8 = 13;
pub const DEFAULT_RAMP_INTERVAL: Duration = Duration::from_millis(40);

/// Moves the live level toward the target in bounded steps so the backlight
/// driver never sees a full-scale jump.
#[derive(Debug, Clone)]
pub struct BrightnessRamp {
    step: u8,
    interval: Duration,
    last_step: Option<Instant>,
}

impl BrightnessRamp {
    pub const fn new(step: u8, interval: Duration) -> Self {
        Self {
            step,
            interval,
            last_step: None,
        }
    }

    /// Advance one step if due. Returns the new level when it changed.
    pub fn update(&mut self, now: Instant, state: &mut BrightnessState) -> Option<u8> {
        if state.is_settled() {
            return None;
        }
        if let Some(last) = self.last_step
            && now.saturating_duration_since(last) < self.interval
        {
            return None;
        }

        let current = state.current_level;
        let target = state.target_level;
        state.current_level = if target > current {
            current.saturating_add(self.step).min(target)
        } else {
            current.saturating_sub(self.step).max(target)
        };
        self.last_step = Some(now);
        Some(state.current_level)
    }
}

impl Default for BrightnessRamp {
    fn default() -> Self {
        Self::new(DEFAULT_RAMP_STEP, DEFAULT_RAMP_INTERVAL)
    }
}
