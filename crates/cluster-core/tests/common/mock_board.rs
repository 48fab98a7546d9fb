//! Scripted mock hardware for driving the cluster frame loop

use cluster_core::app_state::Board;
use cluster_core::calibration::{ADC_FULL_SCALE_V, ADC_MAX_COUNTS, CABLE_DROP_V, SUPPLY_V};
use cluster_core::power::PowerRailFaults;
use cluster_core::sensors::{
    Accelerometer, AmbientLightSensor, AnalogFrontEnd, Backlight, Channel, RadioPower,
    SensorError, SupplyMonitor,
};
use embedded_hal::delay::DelayNs;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Records operations performed on the mock peripherals
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Backlight driven to a level
    SetBrightness(u8),
    /// Blocking delay in microseconds
    DelayUs(u32),
    /// Ambient light sensor sampled
    ReadLux,
    /// Radio transmit power changed
    TxThrottled(bool),
}

/// Shared state for the mock peripherals (uses interior mutability)
#[derive(Debug)]
struct MockState {
    /// Raw ADC counts per channel, `None` fails the read
    counts: HashMap<Channel, Option<i16>>,

    /// Ambient lux and how much the screen adds per backlight step
    lux: u16,
    screen_glow: f32,
    fail_light: bool,

    accel: [f32; 3],
    vin: f32,
    rail_faults: PowerRailFaults,

    backlight: u8,

    /// Operations log for verification
    operations: Vec<Operation>,
}

impl MockState {
    fn new() -> Self {
        let mut counts = HashMap::new();
        counts.insert(Channel::OilPressure, Some(pressure_counts(4.0)));
        counts.insert(Channel::WaterTemp, Some(temperature_counts(85.0)));
        counts.insert(Channel::OilTemp, Some(temperature_counts(95.0)));

        Self {
            counts,
            lux: 400,
            screen_glow: 0.0,
            fail_light: false,
            // Mounted flat: gravity on Z
            accel: [0.0, 0.0, 1.0],
            vin: 5.0,
            rail_faults: PowerRailFaults::empty(),
            backlight: 0,
            operations: Vec::new(),
        }
    }
}

/// ADC counts the converter reports for a pressure sender at `bar`.
pub fn pressure_counts(bar: f32) -> i16 {
    volts_to_counts(bar / 2.5 + 0.5)
}

/// ADC counts the converter reports for a thermistor at `celsius`.
pub fn temperature_counts(celsius: f32) -> i16 {
    let kelvin = celsius + 273.16;
    let resistance = 10_000.0 * (3380.0 * (1.0 / kelvin - 1.0 / 298.16)).exp();
    volts_to_counts(SUPPLY_V * resistance / (10_000.0 + resistance))
}

fn volts_to_counts(volts: f32) -> i16 {
    let measured = volts * (SUPPLY_V - CABLE_DROP_V) / SUPPLY_V;
    (measured * ADC_MAX_COUNTS / ADC_FULL_SCALE_V).round() as i16
}

/// Test-side handle for scripting the hardware and inspecting what the
/// cluster did to it
#[derive(Clone)]
pub struct MockHandle {
    state: Rc<RefCell<MockState>>,
}

impl MockHandle {
    pub fn set_pressure_bar(&self, bar: f32) {
        self.set_counts(Channel::OilPressure, Some(pressure_counts(bar)));
    }

    pub fn set_temperature_c(&self, channel: Channel, celsius: f32) {
        self.set_counts(channel, Some(temperature_counts(celsius)));
    }

    /// Raw counts for a channel; `None` makes the read fail
    pub fn set_counts(&self, channel: Channel, counts: Option<i16>) {
        self.state.borrow_mut().counts.insert(channel, counts);
    }

    pub fn set_lux(&self, lux: u16) {
        self.state.borrow_mut().lux = lux;
    }

    pub fn set_screen_glow(&self, lux_per_step: f32) {
        self.state.borrow_mut().screen_glow = lux_per_step;
    }

    pub fn fail_light(&self, fail: bool) {
        self.state.borrow_mut().fail_light = fail;
    }

    /// Lateral acceleration in g with the board mounted flat
    pub fn set_lateral_g(&self, g: f32) {
        self.state.borrow_mut().accel = [0.0, g, 1.0];
    }

    pub fn set_vin(&self, vin: f32) {
        self.state.borrow_mut().vin = vin;
    }

    pub fn set_rail_faults(&self, faults: PowerRailFaults) {
        self.state.borrow_mut().rail_faults = faults;
    }

    /// Level the backlight was last driven to
    pub fn backlight(&self) -> u8 {
        self.state.borrow().backlight
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state.borrow().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.state.borrow_mut().operations.clear();
    }
}

pub struct MockAdc {
    state: Rc<RefCell<MockState>>,
}

impl AnalogFrontEnd for MockAdc {
    fn read_channel(&mut self, channel: Channel) -> Result<i16, SensorError> {
        self.state
            .borrow()
            .counts
            .get(&channel)
            .copied()
            .flatten()
            .ok_or(SensorError::ReadFailed {
                sensor: "ADS1015",
                operation: "conversion",
                details: "no acknowledge",
            })
    }
}

pub struct MockLight {
    state: Rc<RefCell<MockState>>,
}

impl AmbientLightSensor for MockLight {
    fn get_lux(&mut self) -> Result<u16, SensorError> {
        let mut state = self.state.borrow_mut();
        state.operations.push(Operation::ReadLux);
        if state.fail_light {
            return Err(SensorError::ReadFailed {
                sensor: "LTR-553",
                operation: "lux read",
                details: "bus timeout",
            });
        }
        let glow = state.screen_glow * f32::from(state.backlight);
        Ok((f32::from(state.lux) + glow) as u16)
    }
}

pub struct MockImu {
    state: Rc<RefCell<MockState>>,
}

impl Accelerometer for MockImu {
    fn get_accel(&mut self) -> Result<[f32; 3], SensorError> {
        Ok(self.state.borrow().accel)
    }
}

pub struct MockPower {
    state: Rc<RefCell<MockState>>,
}

impl SupplyMonitor for MockPower {
    fn get_vin(&mut self) -> Result<f32, SensorError> {
        Ok(self.state.borrow().vin)
    }

    fn power_faults(&mut self) -> Result<PowerRailFaults, SensorError> {
        Ok(self.state.borrow().rail_faults)
    }
}

pub struct MockBacklight {
    state: Rc<RefCell<MockState>>,
}

impl Backlight for MockBacklight {
    fn set_brightness(&mut self, level: u8) {
        let mut state = self.state.borrow_mut();
        state.backlight = level;
        state.operations.push(Operation::SetBrightness(level));
    }
}

pub struct MockRadio {
    state: Rc<RefCell<MockState>>,
}

impl RadioPower for MockRadio {
    fn set_tx_throttled(&mut self, throttled: bool) {
        self.state
            .borrow_mut()
            .operations
            .push(Operation::TxThrottled(throttled));
    }
}

pub struct MockDelay {
    state: Rc<RefCell<MockState>>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.state.borrow_mut().operations.push(Operation::DelayUs(us));
    }
}

pub type MockBoard =
    Board<MockAdc, MockLight, MockImu, MockPower, MockBacklight, MockRadio, MockDelay>;

/// A board with every peripheral present
pub fn create_mock_board() -> (MockBoard, MockHandle) {
    let state = Rc::new(RefCell::new(MockState::new()));
    let board = Board::new(
        MockBacklight {
            state: state.clone(),
        },
        MockDelay {
            state: state.clone(),
        },
    )
    .with_adc(Ok(MockAdc {
        state: state.clone(),
    }))
    .with_light(Ok(MockLight {
        state: state.clone(),
    }))
    .with_imu(Ok(MockImu {
        state: state.clone(),
    }))
    .with_power(Ok(MockPower {
        state: state.clone(),
    }))
    .with_radio(MockRadio {
        state: state.clone(),
    });

    (board, MockHandle { state })
}
