use probability::distribution::{Exponential, Inverse, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How the computed intersend time gets perturbed before the driver sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Pass the interval through unchanged.
    #[default]
    None,
    /// Draw from an exponential distribution whose mean is the interval.
    Exponential,
    /// Draw uniformly from half to one-and-a-half times the interval.
    Uniform,
}

/// Randomizes pacing intervals with its own, seedable RNG.
#[derive(Clone, Debug)]
pub struct IntersendRandomizer {
    jitter: Jitter,
    rng: ChaCha8Rng,
}

impl IntersendRandomizer {
    /// Creates a new randomizer.
    pub fn new(jitter: Jitter, seed: u64) -> Self {
        Self {
            jitter,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Applies the jitter to an interval. Zero stays zero.
    pub fn randomize(&mut self, intersend: f64) -> f64 {
        if intersend <= 0.0 || !intersend.is_finite() {
            return intersend;
        }
        match self.jitter {
            Jitter::None => intersend,
            Jitter::Exponential => {
                let p = self.rng.gen::<f64>();
                Exponential::new(1.0 / intersend).inverse(p)
            }
            Jitter::Uniform => {
                let p = self.rng.gen::<f64>();
                Uniform::new(0.5 * intersend, 1.5 * intersend).inverse(p)
            }
        }
    }
}
