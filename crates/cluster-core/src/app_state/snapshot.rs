use embassy_time::Duration;

use crate::brightness::BrightnessState;
use crate::gauges::GaugeReading;
use crate::motion::MotionReading;
use crate::warning::{LowPressureEvent, WarningStatus};

/// Read-only view of the cluster, refreshed once per frame for the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSnapshot {
    pub pressure: GaugeReading,
    pub water_temp: GaugeReading,
    pub oil_temp: GaugeReading,
    pub brightness: BrightnessState,
    pub racing_active: bool,
    pub motion: MotionReading,
    pub low_pressure: WarningStatus,
    pub last_low_pressure_event: Option<LowPressureEvent>,
    /// Filtered bus voltage
    pub vin: f32,
    /// Supply guard is holding the brightness
    pub guard_overriding: bool,
    pub manual_brightness: bool,
    pub latest_lux: Option<u16>,
    pub filtered_lux: Option<f32>,
    pub oil_critical_time: Duration,
}
