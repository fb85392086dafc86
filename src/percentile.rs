use std::collections::VecDeque;

use ordered_float::OrderedFloat;

/// Keeps the most recent delay samples around so that the utility layer can ask for percentiles.
#[derive(Clone, Debug)]
pub struct PercentileTracker {
    samples: VecDeque<f64>,
    window: usize,
}

impl PercentileTracker {
    /// Creates a tracker that remembers at most `window` samples.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window.min(4096)),
            window,
        }
    }

    /// Records a sample, evicting the oldest one if the window is full.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples in arrival order, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear()
    }

    /// Nearest-rank percentile over the window. `p` is in `[0, 100]`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<OrderedFloat<f64>> =
            self.samples.iter().copied().map(OrderedFloat).collect();
        sorted.sort_unstable();
        let rank = (p.clamp(0.0, 100.0) / 100.0 * sorted.len() as f64).ceil() as usize;
        Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)].into_inner())
    }
}
