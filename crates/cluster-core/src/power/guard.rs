//! Supply-voltage brightness guards
//!
//! A guard can only lower or cap the backlight. Three policies share the
//! [`VoltageGuardPolicy`] interface and are chosen when the cluster is built.

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::brightness::{BrightnessMode, BrightnessState};

/// What a guard did to the brightness during [`VoltageGuardPolicy::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    None,
    /// Supply sagged; brightness dropped to the Night level
    ReduceBrightness,
    /// Recovery ramp moved the live level
    StepBrightness(u8),
    /// Recovery finished and the pre-sag mode is back
    RestoreBrightness(BrightnessMode),
}

/// A brightness guard driven by the bus input voltage.
pub trait VoltageGuardPolicy {
    /// Periodic supervision, called once per frame.
    fn poll(&mut self, now: Instant, vin: f32, state: &mut BrightnessState) -> GuardAction;

    /// Apply a requested mode through the guard.
    ///
    /// Returns `true` when the requested mode's level is now the target.
    fn apply_brightness_mode(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        vin: f32,
        state: &mut BrightnessState,
    ) -> bool;

    /// Apply a requested mode at a specific level, such as a point on the
    /// ambient duty-cycle curve.
    ///
    /// Returns `true` when `level` is now the target.
    fn apply_brightness_level(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        level: u8,
        vin: f32,
        state: &mut BrightnessState,
    ) -> bool {
        if !self.apply_brightness_mode(now, mode, vin, state) {
            return false;
        }
        state.set_target(level);
        true
    }

    /// While `true` the ambient controller must not touch the brightness.
    fn is_overriding(&self) -> bool {
        false
    }

    /// Whether radio transmit power should be reduced.
    fn radio_throttled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatefulGuardConfig {
    /// Below this the guard cuts brightness
    pub low_v: f32,
    /// At or above this recovery starts
    pub recover_v: f32,
    pub check_interval_ms: u32,
    pub recover_step: u8,
    pub recover_step_interval_ms: u32,
}

impl Default for StatefulGuardConfig {
    fn default() -> Self {
        Self {
            low_v: 4.5,
            recover_v: 4.7,
            check_interval_ms: 200,
            recover_step: 10,
            recover_step_interval_ms: 100,
        }
    }
}

/// Bookkeeping of the stateful guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbusGuardState {
    pub is_low: bool,
    pub is_recovering: bool,
    /// Mode in effect before the sag, restored after recovery
    pub prev_mode: BrightnessMode,
    pub recover_level: u8,
    pub last_check: Option<Instant>,
    pub last_step: Option<Instant>,
}

/// Normal, Low, Recovering state machine with a stepped recovery ramp.
#[derive(Debug, Clone)]
pub struct StatefulGuard {
    config: StatefulGuardConfig,
    state: VbusGuardState,
}

impl StatefulGuard {
    pub fn new(config: StatefulGuardConfig) -> Self {
        Self {
            config,
            state: VbusGuardState {
                is_low: false,
                is_recovering: false,
                prev_mode: BrightnessMode::Day,
                recover_level: BrightnessMode::Night.level(),
                last_check: None,
                last_step: None,
            },
        }
    }

    pub fn state(&self) -> &VbusGuardState {
        &self.state
    }

    fn step_recovery(&mut self, now: Instant, brightness: &mut BrightnessState) -> GuardAction {
        let interval = Duration::from_millis(self.config.recover_step_interval_ms.into());
        if self
            .state
            .last_step
            .is_some_and(|last| now.saturating_duration_since(last) < interval)
        {
            return GuardAction::None;
        }
        self.state.last_step = Some(now);

        let target = self.state.prev_mode.level();
        let level = self
            .state
            .recover_level
            .saturating_add(self.config.recover_step)
            .min(target);
        self.state.recover_level = level;

        if level >= target {
            self.state.is_recovering = false;
            brightness.set_mode(self.state.prev_mode);
            brightness.force_level(target);
            info!(
                "Supply recovered, brightness restored to {}",
                self.state.prev_mode.label()
            );
            return GuardAction::RestoreBrightness(self.state.prev_mode);
        }

        brightness.force_level(level);
        GuardAction::StepBrightness(level)
    }
}

impl Default for StatefulGuard {
    fn default() -> Self {
        Self::new(StatefulGuardConfig::default())
    }
}

impl VoltageGuardPolicy for StatefulGuard {
    fn poll(&mut self, now: Instant, vin: f32, brightness: &mut BrightnessState) -> GuardAction {
        let check_interval = Duration::from_millis(self.config.check_interval_ms.into());
        let check_due = self
            .state
            .last_check
            .is_none_or(|last| now.saturating_duration_since(last) >= check_interval);

        if check_due {
            self.state.last_check = Some(now);

            // A non-positive reading means the monitor has nothing yet
            if vin > 0.0 && vin < self.config.low_v {
                if self.state.is_low {
                    return GuardAction::None;
                }
                if !self.state.is_recovering {
                    self.state.prev_mode = brightness.mode;
                }
                self.state.is_low = true;
                self.state.is_recovering = false;
                self.state.recover_level = BrightnessMode::Night.level();
                brightness.mode = BrightnessMode::Night;
                brightness.force_level(BrightnessMode::Night.level());
                warn!(
                    "Supply low ({} V), brightness cut from {}",
                    vin,
                    self.state.prev_mode.label()
                );
                return GuardAction::ReduceBrightness;
            }

            if self.state.is_low && vin >= self.config.recover_v {
                self.state.is_low = false;
                self.state.is_recovering = true;
                self.state.last_step = Some(now);
                self.state.recover_level = brightness.current_level;
                info!("Supply back at {} V, recovering brightness", vin);
                return GuardAction::None;
            }
        }

        if self.state.is_recovering {
            return self.step_recovery(now, brightness);
        }
        GuardAction::None
    }

    fn apply_brightness_mode(
        &mut self,
        _now: Instant,
        mode: BrightnessMode,
        _vin: f32,
        brightness: &mut BrightnessState,
    ) -> bool {
        if self.is_overriding() {
            // Remembered so recovery lands on the latest request
            self.state.prev_mode = mode;
            return false;
        }
        brightness.set_mode(mode);
        true
    }

    fn is_overriding(&self) -> bool {
        self.state.is_low || self.state.is_recovering
    }

    fn radio_throttled(&self) -> bool {
        self.is_overriding()
    }
}

/// Stateless check: a mode change is skipped outright when the supply is low.
#[derive(Debug, Clone)]
pub struct InstantGuard {
    threshold_v: f32,
}

impl InstantGuard {
    pub const fn new(threshold_v: f32) -> Self {
        Self { threshold_v }
    }
}

impl Default for InstantGuard {
    fn default() -> Self {
        Self::new(4.5)
    }
}

impl VoltageGuardPolicy for InstantGuard {
    fn poll(&mut self, _now: Instant, _vin: f32, _state: &mut BrightnessState) -> GuardAction {
        GuardAction::None
    }

    fn apply_brightness_mode(
        &mut self,
        _now: Instant,
        mode: BrightnessMode,
        vin: f32,
        brightness: &mut BrightnessState,
    ) -> bool {
        if vin > 0.0 && vin < self.threshold_v {
            debug!("Skipping {} at {} V", mode.label(), vin);
            return false;
        }
        brightness.set_mode(mode);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiseCapConfig {
    pub min_for_rise_v: f32,
    pub hysteresis_v: f32,
    /// Highest level allowed while the supply is weak
    pub cap: u8,
    pub retry_after_ms: u32,
}

impl Default for RiseCapConfig {
    fn default() -> Self {
        Self {
            min_for_rise_v: 4.8,
            hysteresis_v: 0.1,
            cap: 80,
            retry_after_ms: 1000,
        }
    }
}

/// Final level for a brightness request given the supply voltage.
///
/// Decreases are always allowed. Increases are allowed above the rise band,
/// capped below it, and held inside it.
pub fn decide_capped_level(
    current: u8,
    requested: u8,
    vin: f32,
    min_for_rise_v: f32,
    hysteresis_v: f32,
    cap: u8,
) -> u8 {
    if requested <= current {
        return requested;
    }
    if vin >= min_for_rise_v + hysteresis_v {
        return requested;
    }
    if vin < min_for_rise_v - hysteresis_v {
        return requested.min(cap);
    }
    current
}

/// Allows brightness rises only when the supply can carry them.
///
/// A suppressed rise is retried from [`poll`](VoltageGuardPolicy::poll) once
/// the retry delay has passed.
#[derive(Debug, Clone)]
pub struct RiseCapGuard {
    config: RiseCapConfig,
    next_retry: Option<Instant>,
    pending: Option<(BrightnessMode, u8)>,
}

impl RiseCapGuard {
    pub const fn new(config: RiseCapConfig) -> Self {
        Self {
            config,
            next_retry: None,
            pending: None,
        }
    }

    fn apply(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        requested: u8,
        vin: f32,
        brightness: &mut BrightnessState,
    ) -> bool {
        let current = brightness.target_level;
        let rising = requested > current;

        if rising && self.next_retry.is_some_and(|at| now < at) {
            self.pending = Some((mode, requested));
            return false;
        }

        let decided = decide_capped_level(
            current,
            requested,
            vin,
            self.config.min_for_rise_v,
            self.config.hysteresis_v,
            self.config.cap,
        );

        brightness.mode = mode;
        brightness.set_target(decided);

        if rising && decided < requested {
            self.next_retry = Some(now + Duration::from_millis(self.config.retry_after_ms.into()));
            self.pending = Some((mode, requested));
            debug!("Rise to {} held at {} ({} V)", requested, decided, vin);
            false
        } else {
            self.next_retry = None;
            self.pending = None;
            true
        }
    }
}

impl Default for RiseCapGuard {
    fn default() -> Self {
        Self::new(RiseCapConfig::default())
    }
}

impl VoltageGuardPolicy for RiseCapGuard {
    fn poll(&mut self, now: Instant, vin: f32, brightness: &mut BrightnessState) -> GuardAction {
        let Some((mode, level)) = self.pending else {
            return GuardAction::None;
        };
        if self.next_retry.is_some_and(|at| now < at) {
            return GuardAction::None;
        }

        let before = brightness.target_level;
        if self.apply(now, mode, level, vin, brightness) {
            GuardAction::RestoreBrightness(mode)
        } else if brightness.target_level != before {
            GuardAction::StepBrightness(brightness.target_level)
        } else {
            GuardAction::None
        }
    }

    fn apply_brightness_mode(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        vin: f32,
        brightness: &mut BrightnessState,
    ) -> bool {
        self.apply(now, mode, mode.level(), vin, brightness)
    }

    fn apply_brightness_level(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        level: u8,
        vin: f32,
        brightness: &mut BrightnessState,
    ) -> bool {
        self.apply(now, mode, level, vin, brightness)
    }
}
