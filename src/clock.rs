use std::{sync::Arc, time::Instant};

use parking_lot::Mutex;

/// A source of millisecond timestamps, relative to an epoch that is reset at the start of every
/// flow.
pub trait Clock {
    /// Milliseconds since the epoch.
    fn now(&self) -> f64;

    /// Moves the epoch to "now".
    fn reset_epoch(&mut self);
}

/// Wall-clock time, measured with a monotonic clock.
#[derive(Clone, Debug)]
pub struct RealClock {
    epoch: Instant,
}

impl RealClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RealClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn reset_epoch(&mut self) {
        self.epoch = Instant::now();
    }
}

/// A tick counter that only moves when somebody moves it.
///
/// Clones share the same tick, so a driver can keep a handle and step time while the controller
/// owns another.
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    tick: Arc<Mutex<f64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current tick.
    pub fn set(&self, tick: f64) {
        *self.tick.lock() = tick;
    }

    /// Moves the current tick forward by `delta`.
    pub fn advance(&self, delta: f64) -> f64 {
        let mut tick = self.tick.lock();
        *tick += delta;
        *tick
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        *self.tick.lock()
    }

    fn reset_epoch(&mut self) {
        self.set(0.0)
    }
}
