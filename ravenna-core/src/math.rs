//! Bounded sliding-window aggregates for smoothing noisy measurements.

use heapless::{HistoryBuffer, Vec};

/// Default number of samples retained by the aggregates.
pub const SAMPLE_HISTORY: usize = 64;

/// A value a [`SlidingMedian`] can average when the window holds an even
/// number of samples.
pub trait MedianSample: Copy + Ord {
    fn midpoint(self, other: Self) -> Self;
}

macro_rules! impl_median_sample {
    ($($t:ty),*) => {
        $(impl MedianSample for $t {
            fn midpoint(self, other: $t) -> $t {
                ((self as i128 + other as i128) / 2) as $t
            }
        })*
    };
}

impl_median_sample!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Keeps the most recent `N` observations and answers their median. An
/// even-length window answers the midpoint of the two middle samples.
#[derive(Default)]
pub struct SlidingMedian<T, const N: usize = SAMPLE_HISTORY> {
    samples: HistoryBuffer<T, N>,
}

impl<T: MedianSample, const N: usize> SlidingMedian<T, N> {
    pub fn new() -> SlidingMedian<T, N> {
        SlidingMedian { samples: HistoryBuffer::new() }
    }

    pub fn observe(&mut self, value: T) {
        self.samples.write(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }

    pub fn median(&self) -> Option<T> {
        let mut samples = Vec::<T, N>::new();
        samples.extend(self.samples.iter().copied());
        samples.sort_unstable();

        let mid = samples.len() / 2;
        if samples.is_empty() {
            None
        } else if samples.len() % 2 == 0 {
            Some(samples[mid - 1].midpoint(samples[mid]))
        } else {
            Some(samples[mid])
        }
    }
}

/// Keeps the most recent `N` observations and answers their mean.
#[derive(Default)]
pub struct SlidingAverage<const N: usize = SAMPLE_HISTORY> {
    samples: HistoryBuffer<f64, N>,
}

impl<const N: usize> SlidingAverage<N> {
    pub fn new() -> SlidingAverage<N> {
        SlidingAverage { samples: HistoryBuffer::new() }
    }

    pub fn observe(&mut self, value: f64) {
        self.samples.write(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.len() == 0 {
            return None;
        }
        let sum: f64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as f64)
    }
}
