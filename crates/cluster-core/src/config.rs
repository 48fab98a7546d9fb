//! Cluster configuration and its persistence
//!
//! All tunables live in [`ClusterConfig`], grouped per subsystem. The config
//! is stored as a postcard blob through the [`CalibrationStore`] collaborator;
//! a missing or corrupt blob falls back to defaults.

use embassy_time::{Duration, Instant};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::ambient::{
    AmbientFilterStrategy, EwmaFilter, LuxPrefill, LuxThresholds, MedianFilter, ModePolicy,
};
use crate::brightness::{BrightnessMode, BrightnessState};
use crate::gauges::GaugeConfig;
use crate::power::{
    GuardAction, InstantGuard, RiseCapConfig, RiseCapGuard, StatefulGuard, StatefulGuardConfig,
    VoltageGuardPolicy,
};
use crate::racing::{ForceStopPolicy, RacingConfig};
use crate::warning::WarningConfig;

/// Key of the persisted configuration blob
pub const CONFIG_KEY: &str = "cluster_cfg";
/// Largest encoded configuration accepted
pub const MAX_CONFIG_BYTES: usize = 512;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to encode configuration")]
    Encode,
    #[error("Failed to decode configuration")]
    Decode,
    #[error("Configuration does not fit the buffer")]
    BufferTooSmall,
    #[error("Storage error: {0}")]
    Storage(&'static str),
}

impl From<postcard::Error> for ConfigError {
    fn from(e: postcard::Error) -> Self {
        match e {
            postcard::Error::SerializeBufferFull => Self::BufferTooSmall,
            postcard::Error::SerdeSerCustom
            | postcard::Error::SerializeSeqLengthUnknown
            | postcard::Error::WontImplement
            | postcard::Error::NotYetImplemented => Self::Encode,
            _ => Self::Decode,
        }
    }
}

/// Persistent key/value storage for calibration values.
pub trait CalibrationStore {
    fn load_float(&mut self, key: &str, default: f32) -> f32;

    fn save_float(&mut self, key: &str, value: f32) -> Result<(), ConfigError>;

    /// Copy a stored blob into `buf`, returning its length, or `None` if absent.
    fn load_blob(&mut self, _key: &str, _buf: &mut [u8]) -> Result<Option<usize>, ConfigError> {
        Ok(None)
    }

    fn save_blob(&mut self, _key: &str, _data: &[u8]) -> Result<(), ConfigError> {
        Err(ConfigError::Storage("blob storage not supported"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature_interval_ms: u32,
    pub adc_settle_us: u32,
}

impl SamplingConfig {
    pub fn temperature_interval(&self) -> Duration {
        Duration::from_millis(self.temperature_interval_ms.into())
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature_interval_ms: 500,
            adc_settle_us: 50,
        }
    }
}

/// Smoothing strategy of the ambient controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterKind {
    Median { prefill: LuxPrefill },
    Ewma { alpha: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientConfig {
    pub filter: FilterKind,
    pub policy: ModePolicy,
    pub thresholds: LuxThresholds,
    pub interval_ms: u32,
    /// Blank the backlight while the light sensor integrates
    pub blank_backlight: bool,
    pub settle_us: u32,
    pub ramp_step: u8,
    pub ramp_interval_ms: u32,
}

impl AmbientConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.into())
    }

    pub fn ramp_interval(&self) -> Duration {
        Duration::from_millis(self.ramp_interval_ms.into())
    }

    pub fn build_filter(&self) -> ConfiguredFilter {
        match self.filter {
            FilterKind::Median { prefill } => ConfiguredFilter::Median(MedianFilter::new(prefill)),
            FilterKind::Ewma { alpha } => ConfiguredFilter::Ewma(EwmaFilter::new(alpha)),
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::Median {
                prefill: LuxPrefill::Zero,
            },
            policy: ModePolicy::default(),
            thresholds: LuxThresholds::default(),
            interval_ms: 500,
            blank_backlight: true,
            settle_us: crate::ambient::ALS_SETTLE_US,
            ramp_step: crate::brightness::DEFAULT_RAMP_STEP,
            ramp_interval_ms: 40,
        }
    }
}

/// Which supply guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardKind {
    Stateful,
    Instant,
    RiseCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    pub kind: GuardKind,
    pub stateful: StatefulGuardConfig,
    pub instant_threshold_v: f32,
    pub rise_cap: RiseCapConfig,
    pub vin_window_ms: u32,
}

impl GuardConfig {
    pub fn build_policy(&self) -> ConfiguredGuard {
        match self.kind {
            GuardKind::Stateful => ConfiguredGuard::Stateful(StatefulGuard::new(self.stateful)),
            GuardKind::Instant => {
                ConfiguredGuard::Instant(InstantGuard::new(self.instant_threshold_v))
            }
            GuardKind::RiseCap => ConfiguredGuard::RiseCap(RiseCapGuard::new(self.rise_cap)),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            kind: GuardKind::Stateful,
            stateful: StatefulGuardConfig::default(),
            instant_threshold_v: 4.5,
            rise_cap: RiseCapConfig::default(),
            vin_window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub calibration_samples: u16,
    pub pure_direction_ratio: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            calibration_samples: crate::motion::CALIBRATION_SAMPLES,
            pure_direction_ratio: crate::motion::PURE_DIRECTION_RATIO,
        }
    }
}

/// Every tunable of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub sampling: SamplingConfig,
    pub ambient: AmbientConfig,
    pub guard: GuardConfig,
    pub motion: MotionConfig,
    pub racing: RacingConfig,
    pub force_stop: ForceStopPolicy,
    pub warning: WarningConfig,
    pub gauges: GaugeConfig,
}

impl ClusterConfig {
    /// Encode into `buf`, returning the used prefix.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        Ok(postcard::to_slice(self, buf)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)
    }

    /// Load the persisted config, falling back to defaults.
    pub fn load<S: CalibrationStore>(store: &mut S) -> Self {
        let mut buf = [0u8; MAX_CONFIG_BYTES];
        match store.load_blob(CONFIG_KEY, &mut buf) {
            Ok(Some(len)) => match buf.get(..len).map(Self::decode) {
                Some(Ok(config)) => {
                    info!("Loaded configuration ({} bytes)", len);
                    config
                }
                Some(Err(e)) => {
                    warn!("Stored configuration unreadable ({}), using defaults", e);
                    Self::default()
                }
                None => {
                    warn!("Stored configuration too large, using defaults");
                    Self::default()
                }
            },
            Ok(None) => {
                info!("No stored configuration, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read configuration ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save<S: CalibrationStore>(&self, store: &mut S) -> Result<(), ConfigError> {
        let mut buf = [0u8; MAX_CONFIG_BYTES];
        let used = self.encode(&mut buf)?;
        store.save_blob(CONFIG_KEY, used)
    }
}

/// Ambient filter selected from [`AmbientConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredFilter {
    Median(MedianFilter),
    Ewma(EwmaFilter),
}

impl AmbientFilterStrategy for ConfiguredFilter {
    fn filter(&mut self, lux: f32) -> f32 {
        match self {
            Self::Median(f) => f.filter(lux),
            Self::Ewma(f) => f.filter(lux),
        }
    }

    fn value(&self) -> Option<f32> {
        match self {
            Self::Median(f) => f.value(),
            Self::Ewma(f) => f.value(),
        }
    }
}

/// Supply guard selected from [`GuardConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredGuard {
    Stateful(StatefulGuard),
    Instant(InstantGuard),
    RiseCap(RiseCapGuard),
}

impl VoltageGuardPolicy for ConfiguredGuard {
    fn poll(&mut self, now: Instant, vin: f32, state: &mut BrightnessState) -> GuardAction {
        match self {
            Self::Stateful(g) => g.poll(now, vin, state),
            Self::Instant(g) => g.poll(now, vin, state),
            Self::RiseCap(g) => g.poll(now, vin, state),
        }
    }

    fn apply_brightness_mode(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        vin: f32,
        state: &mut BrightnessState,
    ) -> bool {
        match self {
            Self::Stateful(g) => g.apply_brightness_mode(now, mode, vin, state),
            Self::Instant(g) => g.apply_brightness_mode(now, mode, vin, state),
            Self::RiseCap(g) => g.apply_brightness_mode(now, mode, vin, state),
        }
    }

    fn apply_brightness_level(
        &mut self,
        now: Instant,
        mode: BrightnessMode,
        level: u8,
        vin: f32,
        state: &mut BrightnessState,
    ) -> bool {
        match self {
            Self::Stateful(g) => g.apply_brightness_level(now, mode, level, vin, state),
            Self::Instant(g) => g.apply_brightness_level(now, mode, level, vin, state),
            Self::RiseCap(g) => g.apply_brightness_level(now, mode, level, vin, state),
        }
    }

    fn is_overriding(&self) -> bool {
        match self {
            Self::Stateful(g) => g.is_overriding(),
            Self::Instant(g) => g.is_overriding(),
            Self::RiseCap(g) => g.is_overriding(),
        }
    }

    fn radio_throttled(&self) -> bool {
        match self {
            Self::Stateful(g) => g.radio_throttled(),
            Self::Instant(g) => g.radio_throttled(),
            Self::RiseCap(g) => g.radio_throttled(),
        }
    }
}
