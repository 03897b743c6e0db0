/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// utilities module
//
// various functions that can be of use across the app
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::ConfigError;
use rand::distributions::Uniform;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

// A selection of distributions for a person's age
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeDistribution {
    Fixed(f64),               // everybody the same age
    Normal { mean: f64, sdev: f64 }, // truncated at zero
    Uniform { min: f64, max: f64 },  // range first, range last
}

impl AgeDistribution {
    /// Checks the parameters once so `sample` never has to fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            AgeDistribution::Fixed(age) if age < 0.0 || !age.is_finite() => {
                Err(ConfigError::invalid("age", format!("fixed age {} is negative", age)))
            }
            AgeDistribution::Normal { mean, sdev } if !(sdev >= 0.0) || !mean.is_finite() => Err(
                ConfigError::invalid("age", format!("normal({}, {}) is not a distribution", mean, sdev)),
            ),
            AgeDistribution::Uniform { min, max } if !(min >= 0.0 && min <= max) => Err(
                ConfigError::invalid("age", format!("uniform range {}..{} is empty or negative", min, max)),
            ),
            _ => Ok(()),
        }
    }

    // draw an age - never negative
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let age = match *self {
            AgeDistribution::Fixed(age) => age,
            AgeDistribution::Normal { mean, sdev } => match Normal::new(mean, sdev) {
                Ok(normal) => normal.sample(rng),
                Err(_) => mean,
            },
            AgeDistribution::Uniform { min, max } => {
                if min < max {
                    Uniform::new(min, max).sample(rng)
                } else {
                    min
                }
            }
        };
        age.max(0.0)
    }
}

impl Default for AgeDistribution {
    // the nursing home population of the reference run
    fn default() -> Self {
        AgeDistribution::Normal {
            mean: 80.0,
            sdev: 6.66,
        }
    }
}

/// True with probability `p`; `p` outside [0, 1] saturates.
pub fn bernoulli<R: Rng>(rng: &mut R, p: f64) -> bool {
    if p <= 0.0 {
        false
    } else if p >= 1.0 {
        true
    } else {
        rng.gen::<f64>() < p
    }
}
