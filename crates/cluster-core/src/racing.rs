//! Racing-mode detector
//!
//! Sustained horizontal G switches the cluster to full brightness. The mode
//! stays active while qualifying G keeps arriving and times out once it stops.

use embassy_time::{Duration, Instant};
use log::info;
use serde::{Deserialize, Serialize};

use crate::brightness::BrightnessMode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RacingConfig {
    /// G at or above which a sample qualifies
    pub start_threshold_g: f32,
    /// How long qualifying G must persist before activation
    pub hold_ms: u32,
    /// Inactivity after the last qualifying sample before deactivation
    pub timeout_ms: u32,
}

impl Default for RacingConfig {
    fn default() -> Self {
        Self {
            start_threshold_g: 1.1,
            hold_ms: 100,
            timeout_ms: 180_000,
        }
    }
}

/// What `force_stop` does to the remembered mode when racing is not active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForceStopPolicy {
    /// Remember the caller's current mode as the previous mode
    #[default]
    SnapshotCurrentMode,
    /// Leave the previous snapshot untouched
    KeepSnapshot,
}

/// Transition reported by [`RacingMode::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacingEvent {
    /// Racing started; the caller should apply Day brightness
    Started,
    /// Racing timed out; the caller should restore brightness
    Finished { prev_mode: BrightnessMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacingModeState {
    pub active: bool,
    pub start: Option<Instant>,
    pub hold_since: Option<Instant>,
    pub last_qualifying: Option<Instant>,
    pub prev_mode: BrightnessMode,
}

#[derive(Debug, Clone)]
pub struct RacingMode {
    config: RacingConfig,
    state: RacingModeState,
}

impl RacingMode {
    pub fn new(config: RacingConfig) -> Self {
        Self {
            config,
            state: RacingModeState {
                active: false,
                start: None,
                hold_since: None,
                last_qualifying: None,
                prev_mode: BrightnessMode::Day,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> &RacingModeState {
        &self.state
    }

    /// Mode that was in effect when racing last started
    pub fn prev_mode(&self) -> BrightnessMode {
        self.state.prev_mode
    }

    /// Feed one G sample.
    pub fn update(&mut self, now: Instant, g_force: f32, current_mode: BrightnessMode) -> Option<RacingEvent> {
        let qualifies = g_force >= self.config.start_threshold_g;

        if self.state.active {
            if qualifies {
                self.state.last_qualifying = Some(now);
            }
            let timeout = Duration::from_millis(self.config.timeout_ms.into());
            let quiet = self
                .state
                .last_qualifying
                .map_or(Duration::MAX, |last| now.saturating_duration_since(last));
            if quiet >= timeout {
                self.clear();
                info!("Racing mode finished, restoring {}", self.state.prev_mode.label());
                return Some(RacingEvent::Finished {
                    prev_mode: self.state.prev_mode,
                });
            }
            return None;
        }

        if !qualifies {
            self.state.hold_since = None;
            return None;
        }

        let since = *self.state.hold_since.get_or_insert(now);
        let hold = Duration::from_millis(self.config.hold_ms.into());
        if now.saturating_duration_since(since) < hold {
            return None;
        }

        self.state.active = true;
        self.state.start = Some(now);
        self.state.last_qualifying = Some(now);
        self.state.hold_since = None;
        self.state.prev_mode = current_mode;
        info!("Racing mode started at {} G", g_force);
        Some(RacingEvent::Started)
    }

    /// Leave racing immediately without restoring brightness.
    ///
    /// Returns `true` when racing was active. When it was not, `policy`
    /// decides whether `current_mode` replaces the remembered mode.
    pub fn force_stop(&mut self, current_mode: BrightnessMode, policy: ForceStopPolicy) -> bool {
        let was_active = self.state.active;
        self.clear();

        if was_active {
            info!("Racing mode force-stopped");
        } else if policy == ForceStopPolicy::SnapshotCurrentMode {
            self.state.prev_mode = current_mode;
        }
        was_active
    }

    fn clear(&mut self) {
        self.state.active = false;
        self.state.start = None;
        self.state.hold_since = None;
        self.state.last_qualifying = None;
    }
}

impl Default for RacingMode {
    fn default() -> Self {
        Self::new(RacingConfig::default())
    }
}
