//! Fixed-capacity circular sample window.

use core::cmp::Ordering;

/// Fixed-capacity ring buffer of `f32` samples.
///
/// The buffer has no partial state: the first [`push`](Self::push) fills every
/// slot with that value so the window never averages toward zero on a cold
/// start, and each later push overwrites the oldest slot. Use
/// [`filled`](Self::filled) to start from an explicit pre-fill instead.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    slots: [f32; N],
    /// Slot the next push overwrites (also the oldest sample)
    next: usize,
    primed: bool,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer that primes itself on the first push.
    pub const fn new() -> Self {
        const { assert!(N > 0, "ring buffer capacity must be non-zero") };
        Self {
            slots: [0.0; N],
            next: 0,
            primed: false,
        }
    }

    /// Create a buffer already primed with `value` in every slot.
    pub const fn filled(value: f32) -> Self {
        const { assert!(N > 0, "ring buffer capacity must be non-zero") };
        Self {
            slots: [value; N],
            next: 0,
            primed: true,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn is_primed(&self) -> bool {
        self.primed
    }

    /// Add a sample, overwriting the oldest one.
    pub fn push(&mut self, value: f32) {
        if !self.primed {
            self.slots = [value; N];
            self.next = 0;
            self.primed = true;
            return;
        }

        self.slots[self.next] = value;
        self.next = (self.next + 1) % N;
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<f32> {
        self.primed.then(|| self.slots[(self.next + N - 1) % N])
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..N).map(move |i| self.slots[(self.next + i) % N])
    }

    /// Unweighted mean over the whole window.
    pub fn mean(&self) -> Option<f32> {
        if !self.primed {
            return None;
        }
        let sum: f32 = self.slots.iter().sum();
        Some(sum / N as f32)
    }

    /// Median over the whole window; even capacities average the middle pair.
    pub fn median(&self) -> Option<f32> {
        self.primed.then(|| median_of(self.slots))
    }

    /// Median absolute deviation around the window median.
    pub fn median_abs_deviation(&self) -> Option<f32> {
        let median = self.median()?;
        let deviations = self.slots.map(|v| libm::fabsf(v - median));
        Some(median_of(deviations))
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn median_of<const N: usize>(mut values: [f32; N]) -> f32 {
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = N / 2;
    if N % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
