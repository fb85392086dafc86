use std::cmp::Ordering;

use probability::distribution::{Gaussian, Inverse};

/// A time-decayed exponential moving average.
///
/// Every sample enters with weight 1, and the accumulated weight of older samples shrinks by
/// `exp(-elapsed / horizon)`, where `elapsed` is the distance between the stamp of this update and
/// the stamp of the previous one. Callers stamp updates in round-trip units (`now / min_rtt`), so
/// the estimate forgets history faster when updates are sparse, while samples taken at the same
/// instant are averaged evenly. A decayed variance is kept alongside the mean.
#[derive(Clone, Debug)]
pub struct EmaCalculator {
    mean: f64,
    variance: f64,
    // accumulated weight of everything blended in so far
    weight: f64,
    horizon: f64,
    last_stamp: f64,
}

impl EmaCalculator {
    /// Creates a calculator that already holds the given estimate.
    pub fn new(initial: f64, horizon: f64) -> Self {
        Self {
            mean: initial,
            variance: 0.0,
            weight: 1.0,
            horizon: horizon.max(f64::MIN_POSITIVE),
            last_stamp: 0.0,
        }
    }

    /// Creates a calculator whose first sample becomes its estimate.
    pub fn new_unset(horizon: f64) -> Self {
        let mut this = Self::new(0.0, horizon);
        this.reset();
        this
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.variance = 0.0;
        self.weight = 0.0;
        self.last_stamp = 0.0;
    }

    /// Whether at least one sample (or a forced value) has been recorded since the last reset.
    pub fn is_set(&self) -> bool {
        self.weight > 0.0
    }

    /// Blends in a sample taken at `stamp`.
    pub fn update(&mut self, sample: f64, stamp: f64) {
        // f64::max drops a NaN operand, so a garbage stamp degrades to "no time passed"
        let elapsed = (stamp - self.last_stamp).max(0.0);
        self.weight = self.weight * (-elapsed / self.horizon).exp() + 1.0;
        let alpha = 1.0 / self.weight;
        let diff = sample - self.mean;
        let incr = alpha * diff;
        self.mean += incr;
        self.variance = (1.0 - alpha) * (self.variance + diff * incr);
        self.last_stamp = self.last_stamp.max(stamp);
    }

    /// Replaces the estimate outright.
    pub fn force_set(&mut self, value: f64, stamp: f64) {
        self.mean = value;
        self.variance = 0.0;
        self.weight = 1.0;
        self.last_stamp = stamp;
    }

    /// The current estimate, or zero if nothing was recorded yet.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Inverse CDF, assuming the samples are normally distributed around the estimate.
    pub fn inverse_cdf(&self, p: f64) -> f64 {
        let sigma = self.variance.sqrt().max(1e-9);
        Gaussian::new(self.mean, sigma).inverse(p.clamp(0.0, 1.0))
    }
}

impl From<&EmaCalculator> for f64 {
    fn from(ema: &EmaCalculator) -> f64 {
        ema.mean
    }
}

impl From<EmaCalculator> for f64 {
    fn from(ema: EmaCalculator) -> f64 {
        ema.mean
    }
}

impl PartialEq<f64> for EmaCalculator {
    fn eq(&self, other: &f64) -> bool {
        self.mean == *other
    }
}

impl PartialOrd<f64> for EmaCalculator {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.mean.partial_cmp(other)
    }
}

impl PartialEq<EmaCalculator> for f64 {
    fn eq(&self, other: &EmaCalculator) -> bool {
        *self == other.mean
    }
}

impl PartialOrd<EmaCalculator> for f64 {
    fn partial_cmp(&self, other: &EmaCalculator) -> Option<Ordering> {
        self.partial_cmp(&other.mean)
    }
}
