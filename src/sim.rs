//! Noise sampling for simulations and demos.
//!
//! The filters themselves never draw randomness; the sampler lives here so
//! demo binaries and integration tests can perturb simulated controls and
//! measurements reproducibly from a seed.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Seeded zero-mean Gaussian sampler.
#[derive(Clone, Debug)]
pub struct GaussianSampler {
    rng: StdRng,
}

impl GaussianSampler {
    /// Create a sampler from a seed; equal seeds yield equal draw sequences.
    pub fn new(seed: u64) -> Self {
        GaussianSampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One zero-mean draw with the given standard deviation.
    pub fn scalar(&mut self, std: f64) -> f64 {
        let unit: f64 = self.rng.sample(StandardNormal);
        unit * std
    }

    /// A zero-mean vector draw with one standard deviation per axis.
    pub fn vector(&mut self, stds: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(stds.len(), stds.iter().map(|&std| self.scalar(std)))
    }
}
