//! Lux smoothing strategies

use log::debug;
use serde::{Deserialize, Serialize};

use crate::storage::RingBuffer;

/// Window used by the median filter
pub const LUX_WINDOW: usize = 6;
/// Deviation, in multiples of the window MAD, beyond which a sample is an outlier
pub const OUTLIER_MAD_FACTOR: f32 = 5.0;
/// Lower bound on the MAD so a perfectly flat window still tolerates sensor noise
const MAD_FLOOR_LUX: f32 = 1.0;

/// Smoothing applied to screen-compensated lux before the mode decision.
pub trait AmbientFilterStrategy {
    /// Feed one sample and return the filtered value.
    fn filter(&mut self, lux: f32) -> f32;

    /// Last filtered value, if any sample was fed.
    fn value(&self) -> Option<f32>;
}

/// Exponentially weighted moving average seeded with the first sample.
#[derive(Debug, Clone)]
pub struct EwmaFilter {
    alpha: f32,
    state: Option<f32>,
}

impl EwmaFilter {
    /// `alpha` is clamped to `(0, 1]`; smaller is slower.
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            state: None,
        }
    }
}

impl AmbientFilterStrategy for EwmaFilter {
    fn filter(&mut self, lux: f32) -> f32 {
        let next = match self.state {
            None => lux,
            Some(s) => s + self.alpha * (lux - s),
        };
        self.state = Some(next);
        next
    }

    fn value(&self) -> Option<f32> {
        self.state
    }
}

/// What the median window holds before the first real sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LuxPrefill {
    /// Window starts at zero lux, biasing the first decisions toward Night
    #[default]
    Zero,
    /// Window is filled with the first sample
    FirstSample,
}

/// Sliding median with single-sample outlier rejection.
///
/// A sample further than [`OUTLIER_MAD_FACTOR`] times the window's median
/// absolute deviation from the median is replaced by the last accepted
/// sample. Two outliers in a row are never both rejected, so a genuine step
/// change passes after one sample. Rejection is off until every zero-prefill
/// slot has been replaced by a real sample.
#[derive(Debug, Clone)]
pub struct MedianFilter<const N: usize = LUX_WINDOW> {
    window: RingBuffer<N>,
    last_accepted: Option<f32>,
    rejected_previous: bool,
    /// Window slots still holding prefill
    prefill_left: usize,
}

impl<const N: usize> MedianFilter<N> {
    pub const fn new(prefill: LuxPrefill) -> Self {
        let (window, prefill_left) = match prefill {
            LuxPrefill::Zero => (RingBuffer::filled(0.0), N),
            LuxPrefill::FirstSample => (RingBuffer::new(), 0),
        };
        Self {
            window,
            last_accepted: None,
            rejected_previous: false,
            prefill_left,
        }
    }

    fn is_outlier(&self, lux: f32) -> bool {
        let (Some(median), Some(mad)) = (self.window.median(), self.window.median_abs_deviation())
        else {
            return false;
        };
        libm::fabsf(lux - median) > OUTLIER_MAD_FACTOR * mad.max(MAD_FLOOR_LUX)
    }
}

impl<const N: usize> AmbientFilterStrategy for MedianFilter<N> {
    fn filter(&mut self, lux: f32) -> f32 {
        let accepted = if self.prefill_left == 0 && !self.rejected_previous && self.is_outlier(lux)
        {
            let substitute = self
                .last_accepted
                .or(self.window.median())
                .unwrap_or(lux);
            debug!("lux outlier {} replaced by {}", lux, substitute);
            self.rejected_previous = true;
            substitute
        } else {
            self.rejected_previous = false;
            self.last_accepted = Some(lux);
            lux
        };

        self.window.push(accepted);
        self.prefill_left = self.prefill_left.saturating_sub(1);
        self.window.median().unwrap_or(accepted)
    }

    fn value(&self) -> Option<f32> {
        self.last_accepted.and(self.window.median())
    }
}
