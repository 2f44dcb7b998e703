//! Rolling window statistics for one tracked metric.

use contracts::{DropOldestRing, WindowSnapshot};

/// Outcome of testing a value against the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    pub mean: f64,
    pub std_dev: f64,
    /// |v - mean| / std_dev; infinite when std_dev is 0
    pub sigmas: f64,
}

/// Fixed-size trailing sample set
///
/// Statistics are recomputed from the retained samples, shifted by the
/// oldest one, so a constant stream yields exactly its value with zero
/// deviation and an evicted outlier leaves no residue.
#[derive(Debug)]
pub struct WindowState {
    samples: DropOldestRing<f64>,
}

impl WindowState {
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: DropOldestRing::new(window_size),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.samples.push(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn sum(&self) -> f64 {
        self.samples.iter().sum()
    }

    /// (mean, population std_dev); (0, 0) when empty
    pub fn stats(&self) -> (f64, f64) {
        let Some(&shift) = self.samples.iter().next() else {
            return (0.0, 0.0);
        };
        let n = self.samples.len() as f64;
        let (s1, s2) = self.samples.iter().fold((0.0, 0.0), |(s1, s2), &x| {
            let d = x - shift;
            (s1 + d, s2 + d * d)
        });
        let mean = shift + s1 / n;
        let variance = ((s2 - s1 * s1 / n) / n).max(0.0);
        (mean, variance.sqrt())
    }

    /// Moving average
    pub fn mean(&self) -> f64 {
        self.stats().0
    }

    pub fn std_dev(&self) -> f64 {
        self.stats().1
    }

    /// Test `value` before it is pushed
    ///
    /// Returns `Some` iff the window holds at least `min_samples` and
    /// `|value - mean| > k * std_dev`.
    pub fn assess(&self, value: f64, k: f64, min_samples: usize) -> Option<Deviation> {
        if self.samples.len() < min_samples.max(1) {
            return None;
        }
        let (mean, std_dev) = self.stats();
        let distance = (value - mean).abs();
        if distance > k * std_dev {
            let sigmas = if std_dev > 0.0 {
                distance / std_dev
            } else {
                f64::INFINITY
            };
            Some(Deviation {
                mean,
                std_dev,
                sigmas,
            })
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let (mean, std_dev) = self.stats();
        WindowSnapshot {
            samples: self.len(),
            mean,
            std_dev,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
