//! Hardware collaborators handed to the cluster each frame

use log::{error, info};

use crate::sensors::SensorError;

/// Every peripheral the cluster talks to.
///
/// Optional peripherals are `None` when they failed to initialize. They are
/// not retried: retrying a dead bus device every frame would eat the frame
/// budget, so the affected readings stay at zero or fault for the whole run.
pub struct Board<A, L, I, P, B, R, D> {
    pub adc: Option<A>,
    pub light: Option<L>,
    pub imu: Option<I>,
    pub power: Option<P>,
    pub backlight: B,
    pub radio: Option<R>,
    pub delay: D,
}

impl<A, L, I, P, B, R, D> Board<A, L, I, P, B, R, D> {
    /// Board with only the mandatory backlight and delay.
    pub fn new(backlight: B, delay: D) -> Self {
        Self {
            adc: None,
            light: None,
            imu: None,
            power: None,
            backlight,
            radio: None,
            delay,
        }
    }

    pub fn with_adc(mut self, adc: Result<A, SensorError>) -> Self {
        self.adc = init_peripheral("ADC", adc);
        self
    }

    pub fn with_light(mut self, light: Result<L, SensorError>) -> Self {
        self.light = init_peripheral("Ambient light sensor", light);
        self
    }

    pub fn with_imu(mut self, imu: Result<I, SensorError>) -> Self {
        self.imu = init_peripheral("IMU", imu);
        self
    }

    pub fn with_power(mut self, power: Result<P, SensorError>) -> Self {
        self.power = init_peripheral("Power monitor", power);
        self
    }

    pub fn with_radio(mut self, radio: R) -> Self {
        self.radio = Some(radio);
        self
    }
}

/// Keep a peripheral that initialized, log and drop one that did not.
pub fn init_peripheral<T>(name: &'static str, result: Result<T, SensorError>) -> Option<T> {
    match result {
        Ok(peripheral) => {
            info!("{} ready", name);
            Some(peripheral)
        }
        Err(e) => {
            error!("{} init failed, disabled for this run: {}", name, e);
            None
        }
    }
}
