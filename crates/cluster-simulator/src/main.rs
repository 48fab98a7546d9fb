//! Desktop simulator for the instrument cluster core.
//!
//! Drives `cluster-core` with synthetic hardware at a paced 60 Hz and logs a
//! snapshot once per second. The scenario loops every [`SCENARIO_LENGTH_S`]
//! seconds and walks the cluster through dusk and night, a supply brownout,
//! a long corner with a pressure dip and a disconnected temperature sender.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info cargo run -p cluster-simulator -- [seconds]
//! ```
//!
//! The optional argument limits the run time (default 90 s).

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use embassy_time::{Delay, Instant};
use log::{error, info};

use cluster_core::app_state::{Board, Cluster, ClusterSnapshot};
use cluster_core::calibration::{ADC_FULL_SCALE_V, ADC_MAX_COUNTS, CABLE_DROP_V, SUPPLY_V};
use cluster_core::config::{CalibrationStore, ClusterConfig, ConfigError};
use cluster_core::power::PowerRailFaults;
use cluster_core::sensors::{
    AdcSampler, Accelerometer, AmbientLightSensor, AnalogFrontEnd, Backlight, Channel,
    RadioPower, SensorError, SupplyMonitor,
};
use cluster_core::timing::{FpsCounter, FramePacer};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

const DEFAULT_RUN_S: u64 = 90;
const SCENARIO_LENGTH_S: f32 = 90.0;

/// Lux added to the ambient sensor per backlight step
const SCREEN_GLOW_PER_STEP: f32 = 0.04;

/// Seconds since start, shared by every synthetic peripheral.
#[derive(Clone, Default)]
struct ScenarioClock(Rc<Cell<f32>>);

impl ScenarioClock {
    fn set(&self, secs: f32) {
        self.0.set(secs % SCENARIO_LENGTH_S);
    }

    fn t(&self) -> f32 {
        self.0.get()
    }

    fn between(&self, from: f32, to: f32) -> bool {
        (from..to).contains(&self.t())
    }
}

fn pressure_bar(clock: &ScenarioClock) -> f32 {
    let t = clock.t();
    if clock.between(58.0, 61.0) {
        // Oil surge away from the pickup
        return 2.4;
    }
    4.5 + 1.5 * (t / 4.0).sin()
}

fn water_temp_c(clock: &ScenarioClock) -> f32 {
    85.0 + 6.0 * (clock.t() / 30.0).sin()
}

fn oil_temp_c(clock: &ScenarioClock) -> f32 {
    95.0 + 8.0 * (clock.t() / 45.0).sin()
}

fn ambient_lux(clock: &ScenarioClock) -> f32 {
    match clock.t() {
        t if t < 20.0 => 400.0,
        t if t < 30.0 => 12.0,
        t if t < 40.0 => 3.0,
        _ => 250.0,
    }
}

// ---------------------------------------------------------------------------
// Synthetic hardware
// ---------------------------------------------------------------------------

fn volts_to_counts(volts: f32) -> i16 {
    // Harness drop seen by the converter
    let measured = volts * (SUPPLY_V - CABLE_DROP_V) / SUPPLY_V;
    (measured * ADC_MAX_COUNTS / ADC_FULL_SCALE_V).round() as i16
}

fn pressure_volts(bar: f32) -> f32 {
    bar / 2.5 + 0.5
}

fn thermistor_volts(celsius: f32) -> f32 {
    const BETA: f32 = 3380.0;
    const T0: f32 = 298.16;
    let kelvin = celsius + 273.16;
    let resistance = 10_000.0 * (BETA * (1.0 / kelvin - 1.0 / T0)).exp();
    SUPPLY_V * resistance / (10_000.0 + resistance)
}

struct SimAdc {
    clock: ScenarioClock,
}

impl AnalogFrontEnd for SimAdc {
    fn read_channel(&mut self, channel: Channel) -> Result<i16, SensorError> {
        let volts = match channel {
            Channel::OilPressure => pressure_volts(pressure_bar(&self.clock)),
            // Sender unplugged
            Channel::WaterTemp if self.clock.between(70.0, 76.0) => 0.0,
            Channel::WaterTemp => thermistor_volts(water_temp_c(&self.clock)),
            Channel::OilTemp => thermistor_volts(oil_temp_c(&self.clock)),
        };
        Ok(volts_to_counts(volts))
    }
}

struct SimLight {
    clock: ScenarioClock,
    backlight: Rc<Cell<u8>>,
}

impl AmbientLightSensor for SimLight {
    fn get_lux(&mut self) -> Result<u16, SensorError> {
        let glow = SCREEN_GLOW_PER_STEP * f32::from(self.backlight.get());
        Ok((ambient_lux(&self.clock) + glow).round() as u16)
    }
}

struct SimImu {
    clock: ScenarioClock,
}

impl Accelerometer for SimImu {
    fn get_accel(&mut self) -> Result<[f32; 3], SensorError> {
        let t = self.clock.t();
        // Gravity on z, longitudinal on x, lateral on y
        let lateral = if self.clock.between(55.0, 66.0) {
            1.3
        } else {
            0.1 * (t * 1.7).sin()
        };
        let longitudinal = 0.15 * (t * 0.9).cos();
        Ok([longitudinal, lateral, 1.0])
    }
}

struct SimPower {
    clock: ScenarioClock,
}

impl SupplyMonitor for SimPower {
    fn get_vin(&mut self) -> Result<f32, SensorError> {
        if self.clock.between(45.0, 50.0) {
            Ok(4.2)
        } else {
            Ok(5.0)
        }
    }

    fn power_faults(&mut self) -> Result<PowerRailFaults, SensorError> {
        Ok(PowerRailFaults::empty())
    }
}

struct SimBacklight {
    level: Rc<Cell<u8>>,
}

impl Backlight for SimBacklight {
    fn set_brightness(&mut self, level: u8) {
        self.level.set(level);
    }
}

struct SimRadio;

impl RadioPower for SimRadio {
    fn set_tx_throttled(&mut self, throttled: bool) {
        info!("Radio TX power {}", if throttled { "reduced" } else { "normal" });
    }
}

#[derive(Default)]
struct MemoryStore {
    floats: HashMap<String, f32>,
    blobs: HashMap<String, Vec<u8>>,
}

impl CalibrationStore for MemoryStore {
    fn load_float(&mut self, key: &str, default: f32) -> f32 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    fn save_float(&mut self, key: &str, value: f32) -> Result<(), ConfigError> {
        self.floats.insert(key.to_owned(), value);
        Ok(())
    }

    fn load_blob(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, ConfigError> {
        let Some(data) = self.blobs.get(key) else {
            return Ok(None);
        };
        let dst = buf
            .get_mut(..data.len())
            .ok_or(ConfigError::BufferTooSmall)?;
        dst.copy_from_slice(data);
        Ok(Some(data.len()))
    }

    fn save_blob(&mut self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

fn log_snapshot(t: f32, fps: u32, snap: &ClusterSnapshot) {
    let gauge = |g: &cluster_core::gauges::GaugeReading| match g.fault {
        Some(fault) => fault.label().to_owned(),
        None => format!("{:.2} {} (max {:.2})", g.value, g.channel.unit(), g.max),
    };
    info!(
        "t={:5.1}s fps={} | P {} | W {} | O {}",
        t,
        fps,
        gauge(&snap.pressure),
        gauge(&snap.water_temp),
        gauge(&snap.oil_temp)
    );
    info!(
        "  brightness {} {}->{} | vin {:.2} V{} | lux {:?} | G {:.2} {}{}{}",
        snap.brightness.mode.label(),
        snap.brightness.current_level,
        snap.brightness.target_level,
        snap.vin,
        if snap.guard_overriding { " (guard)" } else { "" },
        snap.latest_lux,
        snap.motion.g_force,
        snap.motion.direction.label(),
        if snap.racing_active { " RACING" } else { "" },
        if snap.low_pressure.visible {
            " LOW PRESSURE"
        } else {
            ""
        },
    );
}

fn log_warning_change(snap: &ClusterSnapshot) {
    if snap.low_pressure.visible {
        info!("Low oil pressure warning shown");
        return;
    }
    match snap.last_low_pressure_event {
        Some(event) => info!(
            "Low oil pressure warning cleared: {:.2} G {} for {:.1} s, min {:.2} bar",
            event.peak_g,
            event.direction.label(),
            event.duration_s,
            event.min_pressure_bar
        ),
        None => info!("Low oil pressure warning cleared"),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let run_s = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RUN_S);
    info!("Starting cluster simulator for {} s", run_s);

    let clock = ScenarioClock::default();
    let backlight_level = Rc::new(Cell::new(0u8));

    let mut store = MemoryStore::default();
    let config = ClusterConfig::load(&mut store);
    if let Err(e) = config.save(&mut store) {
        error!("Failed to persist configuration: {}", e);
    }

    let adc = AdcSampler::new(
        SimAdc {
            clock: clock.clone(),
        },
        Delay,
    )
    .with_settle_us(config.sampling.adc_settle_us);

    let mut board = Board::new(
        SimBacklight {
            level: backlight_level.clone(),
        },
        Delay,
    )
    .with_adc(Ok(adc))
    .with_light(Ok(SimLight {
        clock: clock.clone(),
        backlight: backlight_level.clone(),
    }))
    .with_imu(Ok(SimImu {
        clock: clock.clone(),
    }))
    .with_power(Ok(SimPower {
        clock: clock.clone(),
    }))
    .with_radio(SimRadio);

    let mut cluster = Cluster::from_config(config);
    cluster.load_k_screen(&mut store);
    match cluster.calibrate_screen_offset(&mut board, &mut store) {
        Ok(k) => info!("Screen offset calibrated: {:.4} lux/step", k),
        Err(e) => error!("Screen offset calibration failed: {}", e),
    }

    let mut pacer = FramePacer::default();
    let mut fps = FpsCounter::new();
    let start = Instant::now();

    loop {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(start);
        if elapsed.as_secs() >= run_s {
            break;
        }
        pacer.begin(now);
        clock.set(elapsed.as_micros() as f32 / 1_000_000.0);

        let snapshot = match cluster.poll(now, &mut board) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("{}", e);
                break;
            }
        };

        if snapshot.low_pressure.changed {
            log_warning_change(&snapshot);
        }
        if let Some(rate) = fps.tick(now) {
            log_snapshot(clock.t(), rate, &snapshot);
        }

        let remaining = pacer.remaining(Instant::now());
        std::thread::sleep(std::time::Duration::from_micros(remaining.as_micros()));
    }

    let log = cluster.pressure_log();
    info!(
        "Pressure log: {} points over {} minute page(s), latest {:?}",
        log.len(),
        log.minute_count(),
        log.latest()
    );
    info!("Simulator exiting");
}
