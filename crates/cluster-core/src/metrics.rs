//! Alert levels for gauge readings
//!
//! Maps a calibrated reading to a coarse severity used by the display to pick
//! gauge colors and by the gauge pipeline to track time spent critical.

use crate::sensors::Channel;

/// Severity of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AlertLevel {
    /// Within the expected operating range
    #[default]
    Normal,
    /// Elevated, worth watching
    Caution,
    /// Outside the safe range
    Critical,
}

impl AlertLevel {
    /// Assess one reading.
    ///
    /// Temperatures are in °C, pressure in bar:
    /// - Oil temperature: caution from 110, critical from 120
    /// - Water temperature: caution from 100, critical from 110
    /// - Oil pressure: caution from 8 (low pressure is handled by the
    ///   low-pressure monitor, which needs the G context)
    pub fn assess(channel: Channel, value: f32) -> Self {
        match channel {
            Channel::OilTemp => {
                if value >= 120.0 {
                    Self::Critical
                } else if value >= 110.0 {
                    Self::Caution
                } else {
                    Self::Normal
                }
            }
            Channel::WaterTemp => {
                if value >= 110.0 {
                    Self::Critical
                } else if value >= 100.0 {
                    Self::Caution
                } else {
                    Self::Normal
                }
            }
            Channel::OilPressure => {
                if value >= 8.0 {
                    Self::Caution
                } else {
                    Self::Normal
                }
            }
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Caution => "Caution",
            Self::Critical => "Critical",
        }
    }
}
