//! Display-side gauge pipeline
//!
//! Each gauge smooths the channel average for display, keeps a recorded
//! maximum and decides whether the value moved enough to be worth a redraw.

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use crate::calibration::{FaultKind, Reading};
use crate::metrics::AlertLevel;
use crate::sampling::SampleAggregator;
use crate::sensors::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    pub pressure_alpha: f32,
    pub temperature_alpha: f32,
    /// Minimum change that triggers a redraw
    pub pressure_change: f32,
    pub water_temp_change: f32,
    pub oil_temp_change: f32,
    /// Pressure is clamped to this for display
    pub pressure_display_max_bar: f32,
    /// Averages at or above this are treated as a shorted sender
    pub pressure_over_limit_bar: f32,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            pressure_alpha: 0.3,
            temperature_alpha: 0.1,
            pressure_change: 0.05,
            water_temp_change: 0.05,
            oil_temp_change: 0.1,
            pressure_display_max_bar: 15.0,
            pressure_over_limit_bar: 11.0,
        }
    }
}

/// Redraw decision for one gauge.
#[derive(Debug, Clone, Default)]
pub struct ChangeGate {
    threshold: f32,
    drawn: Option<(f32, f32, bool)>,
}

impl ChangeGate {
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            drawn: None,
        }
    }

    /// Returns `true` on the first call, when `value` moved by at least the
    /// threshold since the last redraw, or when the maximum or fault state
    /// changed.
    pub fn check(&mut self, value: f32, max: f32, faulted: bool) -> bool {
        let redraw = match self.drawn {
            None => true,
            Some((drawn, drawn_max, drawn_fault)) => {
                libm::fabsf(value - drawn) >= self.threshold
                    || max != drawn_max
                    || faulted != drawn_fault
            }
        };
        if redraw {
            self.drawn = Some((value, max, faulted));
        }
        redraw
    }
}

/// What the display shows for one quantity this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeReading {
    pub channel: Channel,
    /// Smoothed value, zero while faulted or before the first sample
    pub value: f32,
    pub max: f32,
    pub fault: Option<FaultKind>,
    pub alert: AlertLevel,
    pub redraw: bool,
}

#[derive(Debug, Clone)]
pub struct Gauge {
    channel: Channel,
    alpha: f32,
    smoothed: Option<f32>,
    max: f32,
    gate: ChangeGate,
    critical_time: Duration,
    last_update: Option<Instant>,
    latest: GaugeReading,
}

impl Gauge {
    pub fn new(channel: Channel, alpha: f32, change_threshold: f32) -> Self {
        Self {
            channel,
            alpha,
            smoothed: None,
            max: 0.0,
            gate: ChangeGate::new(change_threshold),
            critical_time: Duration::from_ticks(0),
            last_update: None,
            latest: GaugeReading {
                channel,
                value: 0.0,
                max: 0.0,
                fault: None,
                alert: AlertLevel::Normal,
                redraw: false,
            },
        }
    }

    pub fn latest(&self) -> GaugeReading {
        self.latest
    }

    /// Total time spent at [`AlertLevel::Critical`]
    pub fn critical_time(&self) -> Duration {
        self.critical_time
    }

    /// Fold one channel average into the gauge.
    ///
    /// A fault zeroes the displayed value and resets the recorded maximum so a
    /// transient short cannot leave an inflated peak behind.
    pub fn update(&mut self, now: Instant, average: Option<Reading>) -> GaugeReading {
        let (value, fault) = match average {
            None => (0.0, None),
            Some(Reading::Fault(kind)) => {
                self.smoothed = None;
                self.max = 0.0;
                (0.0, Some(kind))
            }
            Some(Reading::Ok(v)) => {
                let s = match self.smoothed {
                    None => v,
                    Some(prev) => prev + self.alpha * (v - prev),
                };
                self.smoothed = Some(s);
                self.max = self.max.max(v);
                (s, None)
            }
        };

        let alert = match (average, fault) {
            (Some(_), None) => AlertLevel::assess(self.channel, value),
            _ => AlertLevel::Normal,
        };
        if alert == AlertLevel::Critical
            && let Some(last) = self.last_update
        {
            self.critical_time += now.saturating_duration_since(last);
        }
        self.last_update = Some(now);

        self.latest = GaugeReading {
            channel: self.channel,
            value,
            max: self.max,
            fault,
            alert,
            redraw: self.gate.check(value, self.max, fault.is_some()),
        };
        self.latest
    }
}

/// The three gauges of the cluster.
#[derive(Debug, Clone)]
pub struct Gauges {
    pub pressure: Gauge,
    pub water_temp: Gauge,
    pub oil_temp: Gauge,
    pressure_display_max_bar: f32,
    pressure_over_limit_bar: f32,
}

impl Gauges {
    pub fn new(config: &GaugeConfig) -> Self {
        Self {
            pressure: Gauge::new(
                Channel::OilPressure,
                config.pressure_alpha,
                config.pressure_change,
            ),
            water_temp: Gauge::new(
                Channel::WaterTemp,
                config.temperature_alpha,
                config.water_temp_change,
            ),
            oil_temp: Gauge::new(
                Channel::OilTemp,
                config.temperature_alpha,
                config.oil_temp_change,
            ),
            pressure_display_max_bar: config.pressure_display_max_bar,
            pressure_over_limit_bar: config.pressure_over_limit_bar,
        }
    }

    pub fn update(&mut self, now: Instant, samples: &SampleAggregator) {
        let pressure = samples
            .average(Channel::OilPressure)
            .map(|r| self.condition_pressure(r));
        self.pressure.update(now, pressure);
        self.water_temp
            .update(now, samples.average(Channel::WaterTemp));
        self.oil_temp.update(now, samples.average(Channel::OilTemp));
    }

    /// Pressure average as the rest of the cluster should see it.
    pub fn condition_pressure(&self, reading: Reading) -> Reading {
        match reading {
            Reading::Ok(bar) if bar >= self.pressure_over_limit_bar => {
                Reading::Fault(FaultKind::OutOfRange)
            }
            Reading::Ok(bar) => Reading::Ok(bar.min(self.pressure_display_max_bar)),
            fault => fault,
        }
    }

    pub fn get(&self, channel: Channel) -> &Gauge {
        match channel {
            Channel::OilPressure => &self.pressure,
            Channel::WaterTemp => &self.water_temp,
            Channel::OilTemp => &self.oil_temp,
        }
    }
}

impl Default for Gauges {
    fn default() -> Self {
        Self::new(&GaugeConfig::default())
    }
}
