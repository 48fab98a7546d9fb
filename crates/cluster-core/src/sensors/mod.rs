//! Hardware collaborator traits and sensor channel definitions
//!
//! The core never talks to a bus directly. A board crate implements these
//! traits against its drivers; the simulator and the tests implement them
//! with scripted values.

mod adc;

pub use adc::{ADC_SETTLE_US, AdcSampler};

use thiserror_no_std::Error;

use crate::calibration::{self, Reading};
use crate::power::PowerRailFaults;

/// Analog channels wired to the external ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    OilPressure,
    WaterTemp,
    OilTemp,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::OilPressure, Channel::WaterTemp, Channel::OilTemp];

    /// Multiplexer input the sender is wired to
    pub const fn adc_input(self) -> u8 {
        match self {
            Self::OilTemp => 0,
            Self::WaterTemp => 1,
            Self::OilPressure => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OilPressure => "Oil pressure",
            Self::WaterTemp => "Water temp",
            Self::OilTemp => "Oil temp",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::OilPressure => "bar",
            Self::WaterTemp | Self::OilTemp => "C",
        }
    }

    /// Convert a measured sender voltage for this channel.
    pub fn calibrate(self, volts: f32) -> Reading {
        match self {
            Self::OilPressure => calibration::voltage_to_pressure(volts),
            Self::WaterTemp | Self::OilTemp => calibration::voltage_to_temperature(volts),
        }
    }
}

/// One conversion result as delivered by the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub channel: Channel,
    pub counts: i16,
    /// Milliseconds since boot
    pub timestamp: u32,
}

impl RawSample {
    pub fn reading(&self) -> Reading {
        self.channel
            .calibrate(calibration::adc_to_voltage(self.counts))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} is not available")]
    Unavailable { sensor: &'static str },
}

/// External ADC with a channel multiplexer.
pub trait AnalogFrontEnd {
    /// Read raw counts from one channel.
    fn read_channel(&mut self, channel: Channel) -> Result<i16, SensorError>;
}

/// Ambient light sensor.
pub trait AmbientLightSensor {
    fn get_lux(&mut self) -> Result<u16, SensorError>;
}

/// Three-axis accelerometer reporting in g.
pub trait Accelerometer {
    fn get_accel(&mut self) -> Result<[f32; 3], SensorError>;
}

/// Power management chip.
pub trait SupplyMonitor {
    /// Bus input voltage in volts
    fn get_vin(&mut self) -> Result<f32, SensorError>;

    /// Latched fault flags. Boards without fault reporting keep the default.
    fn power_faults(&mut self) -> Result<PowerRailFaults, SensorError> {
        Ok(PowerRailFaults::empty())
    }
}

/// Display backlight PWM.
pub trait Backlight {
    fn set_brightness(&mut self, level: u8);
}

/// Radio transmit power control used while the supply sags.
pub trait RadioPower {
    fn set_tx_throttled(&mut self, throttled: bool);
}

impl<T: AnalogFrontEnd + ?Sized> AnalogFrontEnd for &mut T {
    fn read_channel(&mut self, channel: Channel) -> Result<i16, SensorError> {
        (**self).read_channel(channel)
    }
}
