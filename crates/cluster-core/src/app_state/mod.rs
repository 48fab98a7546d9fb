//! Frame-level orchestration of the cluster
//!
//! [`Cluster`] owns every state machine of the core and runs them in a fixed
//! order once per frame against the collaborators in a [`Board`]. The caller
//! owns the loop, the clock and the display; it gets a [`ClusterSnapshot`]
//! back from each [`Cluster::poll`].

mod board;
mod snapshot;

pub use board::*;
pub use snapshot::*;

use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::ambient::{
    AmbientFilterStrategy, AmbientLightController, K_SCREEN_KEY, screen_coefficient,
};
use crate::brightness::{BrightnessMode, BrightnessRamp, BrightnessState};
use crate::calibration::{FaultKind, Reading};
use crate::config::{
    CalibrationStore, ClusterConfig, ConfigError, ConfiguredFilter, ConfiguredGuard,
};
use crate::gauges::Gauges;
use crate::motion::MotionClassifier;
use crate::power::{PowerRailFaults, VinFilter, VoltageGuardPolicy};
use crate::racing::{RacingEvent, RacingMode};
use crate::sampling::SampleAggregator;
use crate::sensors::{
    Accelerometer, AmbientLightSensor, AnalogFrontEnd, Backlight, Channel, RadioPower, SensorError,
    SupplyMonitor,
};
use crate::storage::PressureLog;
use crate::warning::{LowPressureEvent, LowPressureMonitor, WarningStatus};

/// Supply voltage assumed until the first reading arrives
const NOMINAL_VIN: f32 = 4.8;

/// Condition that stops the frame loop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    #[error("Power rail fault: {0}")]
    PowerRail(PowerRailFaults),
}

/// Failure of the screen self-illumination calibration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("Ambient light sensor not available")]
    NoLightSensor,
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Config error: {0}")]
    Config(ConfigError),
}

impl From<SensorError> for CalibrationError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<ConfigError> for CalibrationError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Read failures already reported, so a dead peripheral warns once.
#[derive(Debug, Clone, Copy, Default)]
struct ReadFailures {
    power: bool,
    rail: bool,
    imu: bool,
    light: bool,
}

/// Report a read failure on its first occurrence only.
fn note_failure(flag: &mut bool, e: &SensorError) {
    if !*flag {
        warn!("{}", e);
        *flag = true;
    }
}

/// The sensing and control core.
pub struct Cluster<F, G> {
    config: ClusterConfig,
    samples: SampleAggregator,
    gauges: Gauges,
    brightness: BrightnessState,
    ramp: BrightnessRamp,
    ambient: AmbientLightController<F>,
    guard: G,
    vin: VinFilter,
    motion: MotionClassifier,
    racing: RacingMode,
    warning: LowPressureMonitor,
    warning_status: WarningStatus,
    pressure_log: PressureLog,
    manual: bool,
    radio_throttled: bool,
    applied_level: Option<u8>,
    failures: ReadFailures,
}

impl Cluster<ConfiguredFilter, ConfiguredGuard> {
    /// Build the cluster with the filter and guard selected by `config`.
    pub fn from_config(config: ClusterConfig) -> Self {
        let filter = config.ambient.build_filter();
        let guard = config.guard.build_policy();
        Self::new(config, filter, guard)
    }
}

impl<F: AmbientFilterStrategy, G: VoltageGuardPolicy> Cluster<F, G> {
    pub fn new(config: ClusterConfig, filter: F, guard: G) -> Self {
        let ambient = &config.ambient;
        Self {
            samples: SampleAggregator::new(config.sampling.temperature_interval()),
            gauges: Gauges::new(&config.gauges),
            brightness: BrightnessState::default(),
            ramp: BrightnessRamp::new(ambient.ramp_step, ambient.ramp_interval()),
            ambient: AmbientLightController::new(
                filter,
                ambient.policy,
                ambient.thresholds,
                ambient.interval(),
            ),
            guard,
            vin: VinFilter::new(
                NOMINAL_VIN,
                Duration::from_millis(config.guard.vin_window_ms.into()),
            ),
            motion: MotionClassifier::new(
                config.motion.calibration_samples,
                config.motion.pure_direction_ratio,
            ),
            racing: RacingMode::new(config.racing),
            warning: LowPressureMonitor::new(config.warning),
            warning_status: WarningStatus {
                visible: false,
                changed: false,
            },
            pressure_log: PressureLog::new(),
            manual: false,
            radio_throttled: false,
            applied_level: None,
            failures: ReadFailures::default(),
            config,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn brightness(&self) -> &BrightnessState {
        &self.brightness
    }

    pub fn gauges(&self) -> &Gauges {
        &self.gauges
    }

    pub fn samples(&self) -> &SampleAggregator {
        &self.samples
    }

    pub fn racing(&self) -> &RacingMode {
        &self.racing
    }

    pub fn motion(&self) -> &MotionClassifier {
        &self.motion
    }

    pub fn guard(&self) -> &G {
        &self.guard
    }

    pub fn pressure_log(&self) -> &PressureLog {
        &self.pressure_log
    }

    pub fn last_low_pressure_event(&self) -> Option<&LowPressureEvent> {
        self.warning.last_event()
    }

    pub fn k_screen(&self) -> f32 {
        self.ambient.k_screen()
    }

    /// Restore the persisted screen self-illumination coefficient.
    pub fn load_k_screen<S: CalibrationStore>(&mut self, store: &mut S) {
        let k = store.load_float(K_SCREEN_KEY, 0.0);
        self.ambient.set_k_screen(k);
        info!("k_screen = {}", self.ambient.k_screen());
    }

    /// Run one frame.
    ///
    /// Every collaborator failure except a power-rail fault is absorbed
    /// here; the affected channel shows a fault or keeps its last value.
    pub fn poll<A, L, I, P, B, R, D>(
        &mut self,
        now: Instant,
        board: &mut Board<A, L, I, P, B, R, D>,
    ) -> Result<ClusterSnapshot, FatalError>
    where
        A: AnalogFrontEnd,
        L: AmbientLightSensor,
        I: Accelerometer,
        P: SupplyMonitor,
        B: Backlight,
        R: RadioPower,
        D: DelayNs,
    {
        self.check_power_rail(board)?;
        let vin = self.read_vin(now, board);

        if let Some(imu) = board.imu.as_mut() {
            match imu.get_accel() {
                Ok(accel) => {
                    self.motion.update(accel);
                    self.failures.imu = false;
                }
                Err(e) => note_failure(&mut self.failures.imu, &e),
            }
        }
        let motion = self.motion.latest();

        self.samples.acquire(now, board.adc.as_mut());
        self.gauges.update(now, &self.samples);

        self.guard.poll(now, vin, &mut self.brightness);
        self.handle_racing(now, motion.g_force, vin, board.light.is_some());

        if !self.manual && !self.guard.is_overriding() && !self.racing.is_active() {
            self.run_ambient(now, vin, board);
        }

        self.ramp.update(now, &mut self.brightness);
        if self.applied_level != Some(self.brightness.current_level) {
            board.backlight.set_brightness(self.brightness.current_level);
            self.applied_level = Some(self.brightness.current_level);
        }

        let throttled = self.guard.radio_throttled();
        if throttled != self.radio_throttled {
            if let Some(radio) = board.radio.as_mut() {
                radio.set_tx_throttled(throttled);
            }
            info!("Radio TX throttled: {}", throttled);
            self.radio_throttled = throttled;
        }

        let pressure = self.conditioned_pressure();
        self.warning_status = self.warning.update(now, &motion, pressure);
        self.pressure_log.record(now, pressure.value());

        Ok(self.snapshot())
    }

    fn check_power_rail<A, L, I, P, B, R, D>(
        &mut self,
        board: &mut Board<A, L, I, P, B, R, D>,
    ) -> Result<(), FatalError>
    where
        P: SupplyMonitor,
    {
        let Some(power) = board.power.as_mut() else {
            return Ok(());
        };
        match power.power_faults() {
            Ok(faults) if !faults.is_empty() => {
                for line in faults.lines() {
                    error!("{}", line);
                }
                Err(FatalError::PowerRail(faults))
            }
            Ok(_) => {
                self.failures.rail = false;
                Ok(())
            }
            Err(e) => {
                note_failure(&mut self.failures.rail, &e);
                Ok(())
            }
        }
    }

    fn read_vin<A, L, I, P, B, R, D>(
        &mut self,
        now: Instant,
        board: &mut Board<A, L, I, P, B, R, D>,
    ) -> f32
    where
        P: SupplyMonitor,
    {
        let raw = match board.power.as_mut().map(|p| p.get_vin()) {
            Some(Ok(v)) => {
                self.failures.power = false;
                v
            }
            Some(Err(e)) => {
                note_failure(&mut self.failures.power, &e);
                0.0
            }
            None => 0.0,
        };
        // Non-positive readings fall back to the last valid value
        self.vin.update(now, raw)
    }

    fn handle_racing(&mut self, now: Instant, g_force: f32, vin: f32, has_light: bool) {
        match self.racing.update(now, g_force, self.brightness.mode) {
            Some(RacingEvent::Started) => {
                self.guard
                    .apply_brightness_mode(now, BrightnessMode::Day, vin, &mut self.brightness);
            }
            Some(RacingEvent::Finished { prev_mode }) => {
                if has_light && !self.manual {
                    self.ambient.request_immediate();
                } else {
                    self.guard
                        .apply_brightness_mode(now, prev_mode, vin, &mut self.brightness);
                }
            }
            None => {}
        }
    }

    fn run_ambient<A, L, I, P, B, R, D>(
        &mut self,
        now: Instant,
        vin: f32,
        board: &mut Board<A, L, I, P, B, R, D>,
    ) where
        L: AmbientLightSensor,
        B: Backlight,
        D: DelayNs,
    {
        if !self.ambient.is_due(now) {
            return;
        }
        let Some(light) = board.light.as_mut() else {
            return;
        };

        let lit = self.brightness.current_level;
        let (lux, lit_during_read) = if self.config.ambient.blank_backlight {
            board.backlight.set_brightness(0);
            board.delay.delay_us(self.config.ambient.settle_us);
            let lux = light.get_lux();
            board.backlight.set_brightness(lit);
            (lux, 0)
        } else {
            (light.get_lux(), lit)
        };

        let lux = match lux {
            Ok(lux) => {
                self.failures.light = false;
                lux
            }
            Err(e) => {
                note_failure(&mut self.failures.light, &e);
                return;
            }
        };

        if let Some(decision) = self.ambient.update(now, lux, lit_during_read, &self.brightness) {
            self.guard.apply_brightness_level(
                now,
                decision.mode,
                decision.level,
                vin,
                &mut self.brightness,
            );
        }
    }

    fn conditioned_pressure(&self) -> Reading {
        self.samples
            .average(Channel::OilPressure)
            .map(|r| self.gauges.condition_pressure(r))
            .unwrap_or(Reading::Fault(FaultKind::Disconnected))
    }

    /// Manual brightness selection from the UI.
    ///
    /// Stops racing mode without restoring its snapshot and suspends the
    /// ambient controller until [`resume_auto_brightness`](Self::resume_auto_brightness).
    /// Returns whether the guard let the mode through.
    pub fn manual_brightness(&mut self, now: Instant, mode: BrightnessMode) -> bool {
        if self
            .racing
            .force_stop(self.brightness.mode, self.config.force_stop)
        {
            info!("Racing mode stopped by manual brightness");
        }
        self.manual = true;
        let vin = self.vin.value();
        self.guard
            .apply_brightness_mode(now, mode, vin, &mut self.brightness)
    }

    /// Hand brightness back to the ambient controller.
    pub fn resume_auto_brightness(&mut self) {
        if self.manual {
            self.manual = false;
            self.ambient.request_immediate();
        }
    }

    pub fn is_manual_brightness(&self) -> bool {
        self.manual
    }

    /// Measure how much the screen lights its own ambient sensor and persist
    /// the coefficient.
    ///
    /// Reads lux with the backlight off and at full level, then restores the
    /// live level.
    pub fn calibrate_screen_offset<A, L, I, P, B, R, D, S>(
        &mut self,
        board: &mut Board<A, L, I, P, B, R, D>,
        store: &mut S,
    ) -> Result<f32, CalibrationError>
    where
        L: AmbientLightSensor,
        B: Backlight,
        D: DelayNs,
        S: CalibrationStore,
    {
        let light = board.light.as_mut().ok_or(CalibrationError::NoLightSensor)?;
        let settle = self.config.ambient.settle_us;

        board.backlight.set_brightness(0);
        board.delay.delay_us(settle);
        let dark = light.get_lux();

        board.backlight.set_brightness(u8::MAX);
        board.delay.delay_us(settle);
        let full = light.get_lux();

        board.backlight.set_brightness(self.brightness.current_level);
        let (dark, full) = (dark?, full?);

        let k = screen_coefficient(dark, full);
        self.ambient.set_k_screen(k);
        store.save_float(K_SCREEN_KEY, k)?;
        info!("Screen calibration: dark={} full={} k_screen={}", dark, full, k);
        Ok(k)
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            pressure: self.gauges.pressure.latest(),
            water_temp: self.gauges.water_temp.latest(),
            oil_temp: self.gauges.oil_temp.latest(),
            brightness: self.brightness,
            racing_active: self.racing.is_active(),
            motion: self.motion.latest(),
            low_pressure: self.warning_status,
            last_low_pressure_event: self.warning.last_event().copied(),
            vin: self.vin.value(),
            guard_overriding: self.guard.is_overriding(),
            manual_brightness: self.manual,
            latest_lux: self.ambient.latest_lux(),
            filtered_lux: self.ambient.filtered_lux(),
            oil_critical_time: self.gauges.oil_temp.critical_time(),
        }
    }
}
