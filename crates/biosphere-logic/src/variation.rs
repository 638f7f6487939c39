//! Multiplicative variation factors.
//!
//! A factor of `1.0` means "no variation". Bounds are given as fractions
//! above (`upper`) and below (`lower`) one, so `upper = 0.1, lower = 0.1`
//! describes factors between 0.9 and 1.1.
//!
//! Gaussian samples use the Box-Muller transform over the caller's stream
//! instead of pulling in a distributions crate.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of standard deviations spanned by `[1 - lower, 1 + upper]`.
pub const DEFAULT_STDEV_RANGE: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    Normal,
    Exponential,
    Uniform,
}

/// Configured bounds for one variation factor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationSpec {
    pub upper: f64,
    pub lower: f64,
    pub distribution: Distribution,
    pub stdev_range: Option<f64>,
}

impl VariationSpec {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample(rng, self.upper, self.lower, self.distribution, self.stdev_range)
    }
}

/// Draw one standard normal value.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-300);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Draw from an exponential distribution with the given mean.
pub fn exponential<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> f64 {
    let u: f64 = rng.gen::<f64>().max(1e-300);
    -mean * u.ln()
}

/// Sample a multiplicative factor around one.
///
/// * `Normal`: centered between `1 - lower` and `1 + upper`, with the
///   interval covering `stdev_range` standard deviations.
/// * `Exponential`: one-sided, `1 + Exp(upper / 3)` when `upper > 0`,
///   otherwise `1 - Exp(lower / 3)`.
/// * `Uniform`: uniform over `[1 - lower, 1 + upper]`.
///
/// Factors are never negative.
pub fn sample<R: Rng + ?Sized>(
    rng: &mut R,
    upper: f64,
    lower: f64,
    distribution: Distribution,
    stdev_range: Option<f64>,
) -> f64 {
    let hi = 1.0 + upper;
    let lo = 1.0 - lower;
    let value = match distribution {
        Distribution::Normal => {
            let mean = (hi + lo) / 2.0;
            let stdev = (hi - lo) / stdev_range.unwrap_or(DEFAULT_STDEV_RANGE);
            if stdev <= 0.0 {
                mean
            } else {
                mean + stdev * standard_normal(rng)
            }
        }
        Distribution::Exponential => {
            if upper > 0.0 {
                1.0 + exponential(rng, upper / 3.0)
            } else if lower > 0.0 {
                1.0 - exponential(rng, lower / 3.0)
            } else {
                1.0
            }
        }
        Distribution::Uniform => {
            if hi > lo {
                rng.gen_range(lo..hi)
            } else {
                lo
            }
        }
    };
    value.max(0.0)
}
