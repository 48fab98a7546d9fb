//! Per-channel sample aggregation
//!
//! Pressure is sampled every frame so the gauge feels responsive. The thermal
//! channels change slowly and are sampled on a fixed interval, which lets a
//! ten-sample window cover about five seconds without wasting bus time.

use embassy_time::{Duration, Instant};
use log::warn;

use crate::calibration::{FaultKind, Reading};
use crate::sensors::{AnalogFrontEnd, Channel, RawSample};
use crate::storage::RingBuffer;

/// Samples averaged for oil pressure
pub const PRESSURE_SAMPLES: usize = 5;
/// Samples averaged for each temperature channel
pub const TEMPERATURE_SAMPLES: usize = 10;
/// Default thermal sampling interval
pub const DEFAULT_TEMPERATURE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
struct ChannelSamples<const N: usize> {
    buffer: RingBuffer<N>,
    fault: Option<FaultKind>,
}

impl<const N: usize> ChannelSamples<N> {
    const fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
            fault: None,
        }
    }

    fn record(&mut self, reading: Reading) {
        match reading {
            Reading::Ok(value) => {
                self.buffer.push(value);
                self.fault = None;
            }
            Reading::Fault(kind) => self.fault = Some(kind),
        }
    }

    fn reading(&self) -> Option<Reading> {
        if let Some(kind) = self.fault {
            return Some(Reading::Fault(kind));
        }
        self.buffer.mean().map(Reading::Ok)
    }
}

/// Ring buffers for every analog channel plus their fault state.
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    pressure: ChannelSamples<PRESSURE_SAMPLES>,
    water_temp: ChannelSamples<TEMPERATURE_SAMPLES>,
    oil_temp: ChannelSamples<TEMPERATURE_SAMPLES>,
    temperature_interval: Duration,
    last_temperature: Option<Instant>,
}

impl SampleAggregator {
    pub const fn new(temperature_interval: Duration) -> Self {
        Self {
            pressure: ChannelSamples::new(),
            water_temp: ChannelSamples::new(),
            oil_temp: ChannelSamples::new(),
            temperature_interval,
            last_temperature: None,
        }
    }

    /// Read every channel that is due and fold the results into the buffers.
    ///
    /// `adc` is `None` when the converter failed to initialize; every channel
    /// then reports [`FaultKind::Disconnected`] for the rest of the run.
    pub fn acquire<A: AnalogFrontEnd>(&mut self, now: Instant, adc: Option<&mut A>) {
        let Some(adc) = adc else {
            for channel in Channel::ALL {
                self.record(channel, Reading::Fault(FaultKind::Disconnected));
            }
            return;
        };

        self.sample(now, adc, Channel::OilPressure);

        let temperatures_due = self
            .last_temperature
            .is_none_or(|last| now.saturating_duration_since(last) >= self.temperature_interval);
        if temperatures_due {
            self.sample(now, adc, Channel::WaterTemp);
            self.sample(now, adc, Channel::OilTemp);
            self.last_temperature = Some(now);
        }
    }

    fn sample<A: AnalogFrontEnd>(&mut self, now: Instant, adc: &mut A, channel: Channel) {
        match adc.read_channel(channel) {
            Ok(counts) => self.ingest(RawSample {
                channel,
                counts,
                timestamp: now.as_millis() as u32,
            }),
            Err(e) => {
                if self.fault(channel).is_none() {
                    warn!("{} read failed: {}", channel.label(), e);
                }
                self.record(channel, Reading::Fault(FaultKind::Disconnected));
            }
        }
    }

    /// Calibrate one raw sample and store it.
    pub fn ingest(&mut self, sample: RawSample) {
        let reading = sample.reading();
        if let Reading::Fault(kind) = reading
            && self.fault(sample.channel) != Some(kind)
        {
            warn!("{}: {}", sample.channel.label(), kind.label());
        }
        self.record(sample.channel, reading);
    }

    fn record(&mut self, channel: Channel, reading: Reading) {
        match channel {
            Channel::OilPressure => self.pressure.record(reading),
            Channel::WaterTemp => self.water_temp.record(reading),
            Channel::OilTemp => self.oil_temp.record(reading),
        }
    }

    /// Mean of the channel's window, or its fault.
    ///
    /// `None` until the first good sample arrives.
    pub fn average(&self, channel: Channel) -> Option<Reading> {
        match channel {
            Channel::OilPressure => self.pressure.reading(),
            Channel::WaterTemp => self.water_temp.reading(),
            Channel::OilTemp => self.oil_temp.reading(),
        }
    }

    /// Fault reported by the channel's latest sample.
    pub fn fault(&self, channel: Channel) -> Option<FaultKind> {
        match channel {
            Channel::OilPressure => self.pressure.fault,
            Channel::WaterTemp => self.water_temp.fault,
            Channel::OilTemp => self.oil_temp.fault,
        }
    }
}

impl Default for SampleAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE_INTERVAL)
    }
}
