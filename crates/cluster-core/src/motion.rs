//! Accelerometer orientation detection and G-force classification
//!
//! The unit may be mounted in any orientation. The first samples after boot
//! are averaged to find the gravity offset of every axis; the axis carrying
//! the largest offset is taken as vertical and the other two become the
//! vehicle's lateral and longitudinal axes.

use log::info;
use serde::{Deserialize, Serialize};

/// Samples averaged before the calibration is frozen
pub const CALIBRATION_SAMPLES: u16 = 20;
/// Minor/major component ratio below which a direction is treated as pure
pub const PURE_DIRECTION_RATIO: f32 = 0.75;

/// Direction of the horizontal acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GDirection {
    #[default]
    Right,
    Left,
    Front,
    Rear,
    RightFront,
    RightRear,
    LeftFront,
    LeftRear,
}

impl GDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Right => "Right",
            Self::Left => "Left",
            Self::Front => "Front",
            Self::Rear => "Rear",
            Self::RightFront => "Right/Front",
            Self::RightRear => "Right/Rear",
            Self::LeftFront => "Left/Front",
            Self::LeftRear => "Left/Rear",
        }
    }

    /// Classify a lateral/longitudinal pair.
    ///
    /// A component smaller than `ratio` times the other is ignored; otherwise
    /// the direction is diagonal, so equal components such as (1, 1) read as
    /// `RightFront` rather than `Right`. A zero vector reads as `Right`.
    pub fn classify(lateral: f32, longitudinal: f32, ratio: f32) -> Self {
        let abs_lat = libm::fabsf(lateral);
        let abs_lon = libm::fabsf(longitudinal);
        let right = lateral >= 0.0;
        let front = longitudinal >= 0.0;

        if abs_lon < abs_lat * ratio || (abs_lat == 0.0 && abs_lon == 0.0) {
            if right { Self::Right } else { Self::Left }
        } else if abs_lat < abs_lon * ratio {
            if front { Self::Front } else { Self::Rear }
        } else {
            match (right, front) {
                (true, true) => Self::RightFront,
                (true, false) => Self::RightRear,
                (false, true) => Self::LeftFront,
                (false, false) => Self::LeftRear,
            }
        }
    }
}

/// Mounting orientation learned at boot. Frozen for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCalibration {
    /// Index of the gravity-bearing axis (0 = X, 1 = Y, 2 = Z)
    pub vertical_axis: usize,
    pub axis_offsets: [f32; 3],
}

impl MotionCalibration {
    pub fn from_offsets(axis_offsets: [f32; 3]) -> Self {
        let mut vertical_axis = 0;
        for axis in 1..3 {
            if libm::fabsf(axis_offsets[axis]) > libm::fabsf(axis_offsets[vertical_axis]) {
                vertical_axis = axis;
            }
        }
        Self {
            vertical_axis,
            axis_offsets,
        }
    }

    /// Axis index carrying left/right acceleration
    pub const fn lateral_axis(&self) -> usize {
        match self.vertical_axis {
            1 => 0,
            _ => 1,
        }
    }

    /// Axis index carrying front/rear acceleration
    pub const fn longitudinal_axis(&self) -> usize {
        match self.vertical_axis {
            2 => 0,
            _ => 2,
        }
    }
}

/// Horizontal acceleration for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionReading {
    /// Magnitude of the lateral and longitudinal components
    pub g_force: f32,
    pub lateral: f32,
    pub longitudinal: f32,
    pub direction: GDirection,
}

/// Calibrates on the first samples, then classifies every sample.
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    sums: [f32; 3],
    collected: u16,
    samples_needed: u16,
    ratio: f32,
    calibration: Option<MotionCalibration>,
    latest: MotionReading,
}

impl MotionClassifier {
    pub fn new(samples_needed: u16, ratio: f32) -> Self {
        Self {
            sums: [0.0; 3],
            collected: 0,
            samples_needed: samples_needed.max(1),
            ratio,
            calibration: None,
            latest: MotionReading::default(),
        }
    }

    pub fn calibration(&self) -> Option<&MotionCalibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn latest(&self) -> MotionReading {
        self.latest
    }

    /// Feed one accelerometer sample in g.
    ///
    /// Reads as zero G until calibration completes.
    pub fn update(&mut self, accel: [f32; 3]) -> MotionReading {
        let Some(cal) = self.calibration else {
            self.collect(accel);
            return self.latest;
        };

        let lateral = accel[cal.lateral_axis()] - cal.axis_offsets[cal.lateral_axis()];
        let longitudinal =
            accel[cal.longitudinal_axis()] - cal.axis_offsets[cal.longitudinal_axis()];

        self.latest = MotionReading {
            g_force: libm::sqrtf(lateral * lateral + longitudinal * longitudinal),
            lateral,
            longitudinal,
            direction: GDirection::classify(lateral, longitudinal, self.ratio),
        };
        self.latest
    }

    fn collect(&mut self, accel: [f32; 3]) {
        for (sum, value) in self.sums.iter_mut().zip(accel) {
            *sum += value;
        }
        self.collected += 1;

        if self.collected >= self.samples_needed {
            let n = f32::from(self.collected);
            let cal = MotionCalibration::from_offsets(self.sums.map(|s| s / n));
            info!(
                "Motion calibrated: vertical axis {}, offsets {:?}",
                cal.vertical_axis, cal.axis_offsets
            );
            self.calibration = Some(cal);
        }
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(CALIBRATION_SAMPLES, PURE_DIRECTION_RATIO)
    }
}
