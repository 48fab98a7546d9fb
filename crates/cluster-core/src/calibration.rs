//! Conversion from raw ADC counts to physical units
//!
//! All functions here are pure. Faults are reported through [`Reading`]
//! instead of sentinel values so that aggregation and display code can test
//! the tag rather than compare against a magic temperature.

use serde::{Deserialize, Serialize};

/// ADC full-scale input range at the configured gain (volts)
pub const ADC_FULL_SCALE_V: f32 = 6.144;
/// Largest positive count of the 12-bit signed converter
pub const ADC_MAX_COUNTS: f32 = 2047.0;

/// Nominal sensor supply rail
pub const SUPPLY_V: f32 = 5.0;
/// Voltage lost across the sensor harness
pub const CABLE_DROP_V: f32 = 0.137;
const DROP_CORRECTION: f32 = SUPPLY_V / (SUPPLY_V - CABLE_DROP_V);

/// Measured voltage at or above which the pressure sender is considered shorted
pub const PRESSURE_SHORT_V: f32 = 4.9;
/// Sender output at zero pressure
pub const PRESSURE_ZERO_V: f32 = 0.5;
/// Datasheet slope in bar per volt
pub const PRESSURE_SLOPE: f32 = 2.5;

// Thermistor divider and beta-equation constants
const SERIES_RESISTOR_OHM: f32 = 10_000.0;
const NOMINAL_RESISTANCE_OHM: f32 = 10_000.0;
const NOMINAL_TEMPERATURE_K: f32 = 298.16;
const BETA: f32 = 3380.0;
const KELVIN_OFFSET: f32 = 273.16;

/// Why a reading could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Voltage near zero, sender unplugged or open circuit
    Disconnected,
    /// Voltage near the supply rail
    ShortCircuit,
    /// Conversion produced a value outside the physical range
    OutOfRange,
}

impl FaultKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::ShortCircuit => "Short circuit",
            Self::OutOfRange => "Out of range",
        }
    }
}

/// A calibrated physical value or the fault that prevented it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Ok(f32),
    Fault(FaultKind),
}

impl Reading {
    /// Value for display; faults read as zero.
    pub fn value(self) -> f32 {
        match self {
            Self::Ok(v) => v,
            Self::Fault(_) => 0.0,
        }
    }

    pub fn ok(self) -> Option<f32> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Fault(_) => None,
        }
    }

    pub fn fault(self) -> Option<FaultKind> {
        match self {
            Self::Ok(_) => None,
            Self::Fault(kind) => Some(kind),
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Scale raw converter counts to volts.
pub fn adc_to_voltage(counts: i16) -> f32 {
    f32::from(counts) * ADC_FULL_SCALE_V / ADC_MAX_COUNTS
}

/// Compensate for the harness voltage drop.
pub fn drop_corrected(volts: f32) -> f32 {
    volts * DROP_CORRECTION
}

/// Convert oil pressure sender voltage to bar.
///
/// The short-circuit and zero-offset thresholds are compared against the
/// measured voltage; the slope is applied to the drop-corrected voltage.
/// Never returns a negative value.
pub fn voltage_to_pressure(volts: f32) -> Reading {
    if volts.is_nan() {
        return Reading::Fault(FaultKind::OutOfRange);
    }
    if volts >= PRESSURE_SHORT_V {
        return Reading::Fault(FaultKind::ShortCircuit);
    }
    if volts < PRESSURE_ZERO_V {
        return Reading::Ok(0.0);
    }

    let bar = PRESSURE_SLOPE * (drop_corrected(volts) - PRESSURE_ZERO_V);
    Reading::Ok(bar.max(0.0))
}

/// Convert thermistor divider voltage to degrees Celsius.
///
/// Uses the beta form of the Steinhart-Hart equation.
pub fn voltage_to_temperature(volts: f32) -> Reading {
    let v = drop_corrected(volts);
    if v.is_nan() {
        return Reading::Fault(FaultKind::OutOfRange);
    }
    if v <= 0.0 {
        return Reading::Fault(FaultKind::Disconnected);
    }
    if v >= SUPPLY_V {
        return Reading::Fault(FaultKind::ShortCircuit);
    }

    let resistance = SERIES_RESISTOR_OHM * v / (SUPPLY_V - v);
    let kelvin =
        BETA / (libm::logf(resistance / NOMINAL_RESISTANCE_OHM) + BETA / NOMINAL_TEMPERATURE_K);
    let celsius = kelvin - KELVIN_OFFSET;

    if celsius.is_finite() {
        Reading::Ok(celsius)
    } else {
        Reading::Fault(FaultKind::OutOfRange)
    }
}
