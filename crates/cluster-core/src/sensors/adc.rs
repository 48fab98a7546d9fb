use embedded_hal::delay::DelayNs;

use super::{AnalogFrontEnd, Channel, SensorError};

/// Multiplexer settling time between the dummy and the real conversion
pub const ADC_SETTLE_US: u32 = 50;

/// Double-sampling wrapper around an ADC.
///
/// Switching the multiplexer leaves charge on the sample capacitor, so the
/// first conversion after a channel change is discarded. The wrapper issues a
/// dummy conversion, waits for the input to settle, then returns the second
/// conversion.
pub struct AdcSampler<A, D> {
    adc: A,
    delay: D,
    settle_us: u32,
}

impl<A: AnalogFrontEnd, D: DelayNs> AdcSampler<A, D> {
    pub fn new(adc: A, delay: D) -> Self {
        Self {
            adc,
            delay,
            settle_us: ADC_SETTLE_US,
        }
    }

    pub fn with_settle_us(mut self, settle_us: u32) -> Self {
        self.settle_us = settle_us;
        self
    }

    pub fn into_inner(self) -> (A, D) {
        (self.adc, self.delay)
    }
}

impl<A: AnalogFrontEnd, D: DelayNs> AnalogFrontEnd for AdcSampler<A, D> {
    fn read_channel(&mut self, channel: Channel) -> Result<i16, SensorError> {
        self.adc.read_channel(channel)?;
        self.delay.delay_us(self.settle_us);
        self.adc.read_channel(channel)
    }
}
